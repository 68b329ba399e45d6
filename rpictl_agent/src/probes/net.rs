//! Network interfaces and their hardware addresses.

use std::fs;
use std::path::Path;

use tracing::error;

use crate::error::{ProbeError, ProbeResult};
use crate::types::NetDevice;

/// Interfaces under the net class directory whose name passes `include`.
/// Hidden entries and interfaces without a readable `address` are skipped.
pub fn list_net_devices<F>(net_dir: &Path, include: F) -> ProbeResult<Vec<NetDevice>>
where
    F: Fn(&str) -> bool,
{
    let entries = fs::read_dir(net_dir).map_err(|e| {
        error!(dir = %net_dir.display(), error = %e, "unable to read the list of network devices");
        ProbeError::NetDevices
    })?;

    let mut devices: Vec<NetDevice> = entries
        .filter_map(Result::ok)
        .filter_map(|entry| {
            let name = entry.file_name().to_str()?.to_string();
            if name.starts_with('.') || !include(&name) {
                return None;
            }
            let mac = fs::read_to_string(entry.path().join("address")).ok()?;
            Some(NetDevice {
                name,
                mac_address: mac.trim().to_string(),
            })
        })
        .collect();
    devices.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(devices)
}

/// Everything except loopback.
pub fn not_loopback(name: &str) -> bool {
    name != "lo"
}
