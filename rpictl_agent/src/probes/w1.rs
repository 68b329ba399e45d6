//! Dallas 1-wire temperature sensors.
//!
//! With root privileges the bus is re-enumerated first: every bound slave is
//! removed, a search is triggered, and we wait for the sensors to come back
//! before reading them. Without privileges whatever is bound gets read.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use tracing::{debug, error, info};

use crate::error::{ProbeError, ProbeResult};
use crate::types::TempSensor;

/// Family codes we know how to read, with the name reported to the client.
const FAMILIES: [(&str, &str); 2] = [("28", "Dallas DS18B20"), ("10", "Dallas DS1820")];

/// True when the daemon may rescan the bus.
pub fn privileged() -> bool {
    nix::unistd::geteuid().is_root()
}

/// Remove every registered slave and ask the master to search again.
pub fn rescan_bus(bus_master: &Path) -> ProbeResult<()> {
    let slaves = fs::read_to_string(bus_master.join("w1_master_slaves")).map_err(|e| {
        error!(error = %e, "unable to read the list of registered 1-wire sensors");
        ProbeError::W1SlaveList
    })?;

    for slave in slaves.lines().map(str::trim).filter(|s| !s.is_empty()) {
        write_attr(&bus_master.join("w1_master_remove"), slave).map_err(|e| {
            error!(slave, error = %e, "unable to remove previously registered 1-wire sensor");
            ProbeError::W1Remove
        })?;
    }

    write_attr(&bus_master.join("w1_master_search"), "1").map_err(|e| {
        error!(error = %e, "unable to rescan 1-wire sensors");
        ProbeError::W1Rescan
    })?;
    Ok(())
}

fn write_attr(path: &Path, payload: &str) -> std::io::Result<()> {
    let mut f = OpenOptions::new().write(true).truncate(true).open(path)?;
    f.write_all(payload.as_bytes())
}

/// Full probe: optional rescan plus settle delay, then read.
pub async fn scan_temp_sensors(
    bus_master: &Path,
    devices_dir: &Path,
    rescan: bool,
    settle: Duration,
) -> ProbeResult<Vec<TempSensor>> {
    if rescan {
        rescan_bus(bus_master)?;
        // sensors need time to re-register on the bus
        tokio::time::sleep(settle).await;
    } else {
        debug!("not privileged, reading currently bound 1-wire sensors");
    }
    read_sensors(devices_dir)
}

/// Read every supported sensor below the bus-master directory.
pub fn read_sensors(devices_dir: &Path) -> ProbeResult<Vec<TempSensor>> {
    let entries = fs::read_dir(devices_dir).map_err(|e| {
        error!(dir = %devices_dir.display(), error = %e, "can't open 'w1_bus_master1' directory");
        ProbeError::W1MasterDir
    })?;

    let mut sensors: Vec<TempSensor> = entries
        .filter_map(Result::ok)
        .filter(|e| e.path().is_dir())
        .filter_map(|entry| {
            let id = entry.file_name().to_str()?.to_string();
            let kind = family_name(&id)?;
            let raw = fs::read_to_string(entry.path().join("w1_slave")).ok()?;
            let parsed = parse_w1_slave(&raw);
            if parsed.is_none() {
                info!(sensor = %id, "malformed w1_slave contents, skipping");
            }
            let (crc, celsius) = parsed?;
            Some(TempSensor {
                kind: kind.to_string(),
                id,
                celsius,
                crc,
            })
        })
        .collect();
    sensors.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(sensors)
}

fn family_name(id: &str) -> Option<&'static str> {
    FAMILIES
        .iter()
        .find(|(code, _)| id.starts_with(code))
        .map(|(_, name)| *name)
}

/// Parse the two-line `w1_slave` status:
///
/// ```text
/// 72 01 4b 46 7f ff 0e 10 57 : crc=57 YES
/// 72 01 4b 46 7f ff 0e 10 57 t=23125
/// ```
///
/// Returns the CRC verdict and the reading in degrees Celsius.
pub fn parse_w1_slave(raw: &str) -> Option<(String, f64)> {
    let mut lines = raw.lines();
    let crc = match lines.next()?.split_whitespace().last()? {
        v @ ("YES" | "NO") => v.to_string(),
        _ => return None,
    };
    let (_, milli) = lines.next()?.rsplit_once("t=")?;
    let milli: f64 = milli.trim().parse().ok()?;
    Some((crc, milli / 1000.0))
}
