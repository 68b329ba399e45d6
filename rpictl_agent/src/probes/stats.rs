//! System statistics: kernel, uptime, load, memory, disk, CPU temperature
//! and CPU utilisation.

use std::fs;
use std::path::Path;
use std::time::Duration;

use tracing::{debug, warn};

use crate::board::BoardContext;
use crate::config::ProbeConfig;
use crate::error::ProbeResult;
use crate::probes::{disks, net};
use crate::types::SystemStats;

/// Reported when a sampled value can't be read.
pub const UNAVAILABLE: i32 = -1;

/// Aggregate CPU tick counters from the first line of `/proc/stat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuTimes {
    /// user + nice + system + irq + softirq + steal + guest + guest_nice
    pub work: u64,
    /// work + idle + iowait
    pub total: u64,
}

/// Parse `cpu  user nice system idle iowait irq softirq steal guest guest_nice`.
/// Kernels that print fewer columns get zeros for the missing ones.
pub fn parse_cpu_times(stat: &str) -> Option<CpuTimes> {
    let line = stat.lines().next()?;
    let mut it = line.split_whitespace();
    if it.next()? != "cpu" {
        return None;
    }
    let mut v = [0u64; 10];
    let mut n = 0;
    for (slot, tok) in v.iter_mut().zip(it) {
        *slot = tok.parse().ok()?;
        n += 1;
    }
    if n < 4 {
        return None;
    }
    let [user, nice, system, idle, iowait, irq, softirq, steal, guest, guest_nice] = v;
    let work = user + nice + system + irq + softirq + steal + guest + guest_nice;
    Some(CpuTimes {
        work,
        total: work + idle + iowait,
    })
}

pub fn read_cpu_times(path: &Path) -> Option<CpuTimes> {
    let stat = fs::read_to_string(path).ok()?;
    parse_cpu_times(&stat)
}

/// Percentage of busy ticks between two samples.
pub fn cpu_usage_between(before: CpuTimes, after: CpuTimes) -> Option<f64> {
    let total = after.total.checked_sub(before.total)?;
    let work = after.work.checked_sub(before.work)?;
    if total == 0 {
        return None;
    }
    Some(work as f64 / total as f64 * 100.0)
}

/// Sample twice, `gap` apart. Either sample failing yields [`UNAVAILABLE`].
pub async fn sample_cpu_usage(stat: &Path, gap: Duration) -> i32 {
    let Some(before) = read_cpu_times(stat) else {
        warn!(path = %stat.display(), "first cpu sample failed");
        return UNAVAILABLE;
    };
    tokio::time::sleep(gap).await;
    let Some(after) = read_cpu_times(stat) else {
        warn!(path = %stat.display(), "second cpu sample failed");
        return UNAVAILABLE;
    };
    cpu_usage_between(before, after)
        .map(|pct| pct.round() as i32)
        .unwrap_or(UNAVAILABLE)
}

/// `(total - free) / total * 100`; `None` when there is nothing to measure.
pub fn mem_usage_pct(total: u64, free: u64) -> Option<f64> {
    if total == 0 {
        return None;
    }
    Some(total.saturating_sub(free) as f64 / total as f64 * 100.0)
}

pub fn format_uptime(secs: u64) -> String {
    let hrs = secs / 3600;
    let min = secs / 60 - hrs * 60;
    let sec = secs - 60 * (hrs * 60 + min);
    format!("{hrs}h {min}m {sec}s")
}

pub fn format_load(load: [f64; 3]) -> String {
    format!("{:.2} {:.2} {:.2}", load[0], load[1], load[2])
}

/// Millidegrees from a thermal zone, as whole degrees.
pub fn read_cpu_temp(zone: &Path) -> i32 {
    fs::read_to_string(zone)
        .ok()
        .and_then(|s| s.trim().parse::<i64>().ok())
        .map(|milli| (milli / 1000) as i32)
        .unwrap_or_else(|| {
            debug!(path = %zone.display(), "cpu temperature unavailable");
            UNAVAILABLE
        })
}

/// Compose the `GetStatistics` record.
pub async fn collect_statistics(board: &BoardContext, cfg: &ProbeConfig) -> ProbeResult<SystemStats> {
    let snap = board.snapshot()?;
    let paths = &cfg.paths;

    let mac_addr = net::list_net_devices(&paths.net_dir, net::not_loopback)
        .ok()
        .and_then(|devs| devs.into_iter().next())
        .map(|d| d.mac_address)
        .unwrap_or_default();

    let (used_space_pct, free_space_pct) = disks::list_filesystems(&paths.mounts, |m| m == "/")
        .ok()
        .and_then(|fs| fs.into_iter().next())
        .map(|root| {
            let total = root.used_bytes.saturating_add(root.free_bytes);
            (
                mem_usage_pct(total, root.free_bytes).unwrap_or(0.0),
                mem_usage_pct(total, root.used_bytes).unwrap_or(0.0),
            )
        })
        .unwrap_or((0.0, 0.0));

    let pct = |total, free| mem_usage_pct(total, free).map(|p| p.round() as i32).unwrap_or(0);

    Ok(SystemStats {
        kernel: snap.kernel,
        uptime: format_uptime(snap.uptime_secs),
        serial: board.serial().to_string(),
        mac_addr,
        used_space_pct,
        free_space_pct,
        ram_usage_pct: pct(snap.total_ram, snap.free_ram),
        swap_usage_pct: pct(snap.total_swap, snap.free_swap),
        cpu_load: format_load(snap.load),
        cpu_temp_c: read_cpu_temp(&paths.thermal_zone),
        cpu_usage_pct: sample_cpu_usage(&paths.proc_stat, cfg.cpu_sample_gap).await,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn cpu_usage_from_two_samples() {
        let a = CpuTimes { work: 100, total: 200 };
        let b = CpuTimes { work: 150, total: 260 };
        let pct = cpu_usage_between(a, b).unwrap();
        assert!((pct - 83.333).abs() < 0.01, "{pct}");
        assert_eq!(cpu_usage_between(a, a), None);
        // counters went backwards (reset)
        assert_eq!(cpu_usage_between(b, a), None);
    }

    #[test]
    fn parses_proc_stat_first_line() {
        let stat = "cpu  10 1 5 100 4 2 3 1 7 8\ncpu0 10 1 5 100 4 2 3 1 7 8\nintr 1\n";
        assert_eq!(
            parse_cpu_times(stat),
            Some(CpuTimes { work: 10 + 1 + 5 + 2 + 3 + 1 + 7 + 8, total: 37 + 100 + 4 })
        );
        // old kernel: only user nice system idle
        assert_eq!(
            parse_cpu_times("cpu 1 2 3 4\n"),
            Some(CpuTimes { work: 6, total: 10 })
        );
        assert_eq!(parse_cpu_times("intr 1 2 3\n"), None);
        assert_eq!(parse_cpu_times("cpu 1 x 3 4\n"), None);
        assert_eq!(parse_cpu_times(""), None);
    }

    #[test]
    fn memory_percentages() {
        assert_eq!(mem_usage_pct(1000, 750), Some(25.0));
        assert_eq!(mem_usage_pct(0, 0), None);
        assert_eq!(mem_usage_pct(100, 100), Some(0.0));
    }

    #[test]
    fn uptime_and_load_formatting() {
        assert_eq!(format_uptime(4599), "1h 16m 39s");
        assert_eq!(format_uptime(59), "0h 0m 59s");
        assert_eq!(format_uptime(90_061), "25h 1m 1s");
        assert_eq!(format_load([0.0, 0.01, 0.05]), "0.00 0.01 0.05");
    }

    #[test]
    fn thermal_zone_reading() {
        let tmp = TempDir::new().unwrap();
        let zone = tmp.path().join("temp");
        fs::write(&zone, "44388\n").unwrap();
        assert_eq!(read_cpu_temp(&zone), 44);
        assert_eq!(read_cpu_temp(&tmp.path().join("missing")), UNAVAILABLE);
    }

    #[tokio::test]
    async fn sampling_failure_is_sentinel() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(
            sample_cpu_usage(&tmp.path().join("stat"), Duration::ZERO).await,
            UNAVAILABLE
        );
        let stat = tmp.path().join("stat");
        fs::write(&stat, "cpu 1 2 3 4\n").unwrap();
        // identical samples: no ticks elapsed
        assert_eq!(sample_cpu_usage(&stat, Duration::ZERO).await, UNAVAILABLE);
    }
}
