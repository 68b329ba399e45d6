//! Filesystem usage for every mounted filesystem in the mount table.

use std::fs;
use std::path::Path;

use nix::sys::statvfs::statvfs;
use tracing::{debug, error};

use crate::error::{ProbeError, ProbeResult};
use crate::types::FilesystemEntry;

/// Mounted filesystems whose mount path passes `include`. Mounts that can't
/// be stat'ed (stale network mounts, permission) are skipped.
pub fn list_filesystems<F>(mount_table: &Path, include: F) -> ProbeResult<Vec<FilesystemEntry>>
where
    F: Fn(&str) -> bool,
{
    let table = fs::read_to_string(mount_table).map_err(|e| {
        error!(path = %mount_table.display(), error = %e, "unable to read the mount table");
        ProbeError::MountTable
    })?;

    Ok(parse_mounts(&table)
        .into_iter()
        .filter(|(_, mountpoint)| include(mountpoint))
        .filter_map(|(device, mountpoint)| {
            let st = match statvfs(mountpoint.as_str()) {
                Ok(st) => st,
                Err(e) => {
                    debug!(mountpoint = %mountpoint, error = %e, "statvfs failed, skipping");
                    return None;
                }
            };
            let (used_bytes, free_bytes) = usage(
                st.blocks() as u64,
                st.blocks_free() as u64,
                st.fragment_size() as u64,
            );
            Some(FilesystemEntry {
                device,
                mountpoint,
                used_bytes,
                free_bytes,
            })
        })
        .collect())
}

/// `(used, free)` in bytes from block counts.
pub fn usage(total_blocks: u64, free_blocks: u64, block_size: u64) -> (u64, u64) {
    let used = total_blocks.saturating_sub(free_blocks).saturating_mul(block_size);
    let free = free_blocks.saturating_mul(block_size);
    (used, free)
}

/// `(device, mountpoint)` pairs from `/proc/mounts` syntax.
pub fn parse_mounts(table: &str) -> Vec<(String, String)> {
    table
        .lines()
        .filter_map(|line| {
            let mut it = line.split_whitespace();
            let device = it.next()?;
            let mountpoint = it.next()?;
            Some((unescape(device), unescape(mountpoint)))
        })
        .collect()
}

// The kernel writes space, tab, newline and backslash as \ooo octal.
fn unescape(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 3 < bytes.len() {
            let oct = &bytes[i + 1..i + 4];
            if oct.iter().all(|b| (b'0'..=b'7').contains(b)) {
                let v = oct.iter().fold(0u32, |acc, b| acc * 8 + u32::from(b - b'0'));
                if let Ok(b) = u8::try_from(v) {
                    out.push(b);
                    i += 4;
                    continue;
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn usage_from_blocks() {
        assert_eq!(usage(1000, 250, 4096), (750 * 4096, 250 * 4096));
        assert_eq!(usage(0, 0, 4096), (0, 0));
        // inconsistent counters never underflow
        assert_eq!(usage(10, 20, 512), (0, 20 * 512));
    }

    #[test]
    fn parses_mount_lines_with_escapes() {
        let table = "/dev/root / ext4 rw,noatime 0 0\n\
                     /dev/sda1 /media/usb\\040stick vfat rw 0 0\n\
                     broken\n";
        assert_eq!(
            parse_mounts(table),
            vec![
                ("/dev/root".to_string(), "/".to_string()),
                ("/dev/sda1".to_string(), "/media/usb stick".to_string()),
            ]
        );
    }

    #[test]
    fn stats_included_mounts_and_skips_dead_ones() {
        let tmp = TempDir::new().unwrap();
        let live = tmp.path().join("live");
        fs::create_dir_all(&live).unwrap();
        let table = format!(
            "/dev/fake {} ext4 rw 0 0\n/dev/gone {} ext4 rw 0 0\n/dev/root / ext4 rw 0 0\n",
            live.display(),
            tmp.path().join("gone").display()
        );
        let mounts = tmp.path().join("mounts");
        fs::write(&mounts, table).unwrap();

        let prefix = tmp.path().to_string_lossy().into_owned();
        let list = list_filesystems(&mounts, |m| m.starts_with(&prefix)).unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].device, "/dev/fake");
        assert!(list[0].free_bytes > 0);

        let all = list_filesystems(&mounts, |_| true).unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn missing_mount_table_fails() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(
            list_filesystems(&tmp.path().join("mounts"), |_| true),
            Err(ProbeError::MountTable)
        );
    }
}
