//! Exported GPIO lines under the sysfs GPIO class directory.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use tracing::{debug, error};

use crate::error::{ProbeError, ProbeResult};
use crate::types::GpioLine;

/// Read every exported `gpio<N>` line. Lines whose `value` or `direction`
/// can't be read are skipped.
pub fn list_gpio(gpio_dir: &Path) -> ProbeResult<Vec<GpioLine>> {
    let entries = fs::read_dir(gpio_dir).map_err(|e| {
        error!(dir = %gpio_dir.display(), error = %e, "unable to read the list of exported GPIO's");
        ProbeError::GpioList
    })?;

    let mut lines: Vec<GpioLine> = entries
        .filter_map(Result::ok)
        .filter_map(|entry| {
            let name = entry.file_name();
            let number = pin_number(name.to_str()?)?;
            read_line(&entry.path(), number)
        })
        .collect();
    lines.sort_by_key(|l| l.number);
    Ok(lines)
}

// "gpio17" -> 17; "gpiochip0", "export" -> None
fn pin_number(name: &str) -> Option<u32> {
    name.strip_prefix("gpio")?.parse().ok()
}

fn read_line(dir: &Path, number: u32) -> Option<GpioLine> {
    let value = fs::read_to_string(dir.join("value")).ok()?;
    let direction = fs::read_to_string(dir.join("direction")).ok()?;
    let value = match value.trim() {
        "0" => 0,
        "1" => 1,
        other => {
            debug!(gpio = number, value = other, "skipping line with odd value");
            return None;
        }
    };
    let direction = match direction.trim() {
        d @ ("in" | "out") => d.to_string(),
        other => {
            debug!(gpio = number, direction = other, "skipping line with odd direction");
            return None;
        }
    };
    Some(GpioLine {
        number,
        value,
        direction,
    })
}

/// What `SetGPIO` asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpioAction {
    Value(&'static str),
    Direction(&'static str),
}

/// Parse `"<pin> <1|0|in|out>"`.
pub fn parse_set_args(args: &str) -> ProbeResult<(u32, GpioAction)> {
    let mut it = args.split_whitespace();
    let pin = it
        .next()
        .and_then(|p| p.parse::<u32>().ok())
        .ok_or(ProbeError::GpioArgs)?;
    let action = match it.next() {
        Some("1") => GpioAction::Value("1"),
        Some("0") => GpioAction::Value("0"),
        Some("in") => GpioAction::Direction("in"),
        Some("out") => GpioAction::Direction("out"),
        _ => return Err(ProbeError::GpioArgs),
    };
    if it.next().is_some() {
        return Err(ProbeError::GpioArgs);
    }
    Ok((pin, action))
}

/// Apply a `SetGPIO` request. Arguments are fully validated before anything
/// is written; the pin must already be exported.
pub fn set_gpio(gpio_dir: &Path, args: &str) -> ProbeResult<()> {
    let (pin, action) = parse_set_args(args)?;
    let line_dir = gpio_dir.join(format!("gpio{pin}"));
    let (file, payload, err) = match action {
        GpioAction::Value(v) => ("value", v, ProbeError::GpioValue),
        GpioAction::Direction(d) => ("direction", d, ProbeError::GpioDirection),
    };
    let path = line_dir.join(file);
    // no create: sysfs attributes exist or the pin isn't exported
    let result = OpenOptions::new()
        .write(true)
        .truncate(true)
        .open(&path)
        .and_then(|mut f| f.write_all(payload.as_bytes()));
    if let Err(e) = result {
        error!(path = %path.display(), error = %e, "unable to change GPIO {file}");
        return Err(err);
    }
    debug!(gpio = pin, file, payload, "GPIO updated");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn export(root: &Path, pin: u32, value: &str, direction: &str) {
        let dir = root.join(format!("gpio{pin}"));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("value"), format!("{value}\n")).unwrap();
        fs::write(dir.join("direction"), format!("{direction}\n")).unwrap();
    }

    fn fake_gpio() -> TempDir {
        let tmp = TempDir::new().unwrap();
        export(tmp.path(), 17, "0", "in");
        export(tmp.path(), 4, "1", "out");
        fs::create_dir_all(tmp.path().join("gpiochip0")).unwrap();
        fs::write(tmp.path().join("export"), "").unwrap();
        tmp
    }

    #[test]
    fn lists_exported_lines_sorted() {
        let tmp = fake_gpio();
        let lines = list_gpio(tmp.path()).unwrap();
        assert_eq!(
            lines,
            vec![
                GpioLine { number: 4, value: 1, direction: "out".into() },
                GpioLine { number: 17, value: 0, direction: "in".into() },
            ]
        );
        for l in &lines {
            assert!(l.value <= 1);
            assert!(l.direction == "in" || l.direction == "out");
        }
    }

    #[test]
    fn unreadable_line_is_skipped() {
        let tmp = fake_gpio();
        fs::create_dir_all(tmp.path().join("gpio22")).unwrap();
        fs::write(tmp.path().join("gpio22/value"), "1\n").unwrap();
        // no direction file
        let lines = list_gpio(tmp.path()).unwrap();
        assert!(lines.iter().all(|l| l.number != 22));
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn missing_class_dir_fails() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(list_gpio(&tmp.path().join("nope")), Err(ProbeError::GpioList));
    }

    #[test]
    fn set_value_and_direction() {
        let tmp = fake_gpio();
        set_gpio(tmp.path(), "17 1").unwrap();
        set_gpio(tmp.path(), "17 out").unwrap();
        let lines = list_gpio(tmp.path()).unwrap();
        let l = lines.iter().find(|l| l.number == 17).unwrap();
        assert_eq!(l.value, 1);
        assert_eq!(l.direction, "out");
    }

    #[test]
    fn bad_args_leave_state_alone() {
        let tmp = fake_gpio();
        let before = list_gpio(tmp.path()).unwrap();
        for args in ["4 2", "4 high", "4", "", "x 1", "4 1 extra", "-4 1"] {
            assert_eq!(set_gpio(tmp.path(), args), Err(ProbeError::GpioArgs), "{args:?}");
        }
        assert_eq!(list_gpio(tmp.path()).unwrap(), before);
    }

    #[test]
    fn unexported_pin_fails_per_kind() {
        let tmp = fake_gpio();
        assert_eq!(set_gpio(tmp.path(), "5 1"), Err(ProbeError::GpioValue));
        assert_eq!(set_gpio(tmp.path(), "5 in"), Err(ProbeError::GpioDirection));
        assert!(!tmp.path().join("gpio5").exists());
    }
}
