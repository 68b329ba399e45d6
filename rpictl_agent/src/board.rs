//! Board identity and the slow-changing system snapshot.
//!
//! Revision and serial come from `/proc/cpuinfo` once at startup. Kernel
//! release, uptime, load and memory counters are cached and re-read at most
//! once per refresh interval, however many clients ask.

use std::fs;
use std::path::Path;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use sysinfo::System;
use tracing::{error, info, warn};

use crate::error::{ProbeError, ProbeResult};

/// What the kernel reports through uname(2)/sysinfo(2).
#[derive(Debug, Clone, PartialEq)]
pub struct SystemSnapshot {
    pub kernel: String,
    pub uptime_secs: u64,
    pub load: [f64; 3],
    pub total_ram: u64,
    pub free_ram: u64,
    pub total_swap: u64,
    pub free_swap: u64,
}

pub trait SnapshotSource: Send + Sync {
    fn read(&self) -> ProbeResult<SystemSnapshot>;
}

/// Production source backed by sysinfo.
pub struct SysinfoSource;

impl SnapshotSource for SysinfoSource {
    fn read(&self) -> ProbeResult<SystemSnapshot> {
        let kernel = System::kernel_version().ok_or_else(|| {
            warn!("kernel release unavailable");
            ProbeError::Statistics
        })?;
        let mut sys = System::new();
        sys.refresh_memory();
        let load = System::load_average();
        Ok(SystemSnapshot {
            kernel,
            uptime_secs: System::uptime(),
            load: [load.one, load.five, load.fifteen],
            total_ram: sys.total_memory(),
            free_ram: sys.free_memory(),
            total_swap: sys.total_swap(),
            free_swap: sys.free_swap(),
        })
    }
}

pub struct BoardContext {
    revision: String,
    serial: String,
    ttl: Duration,
    source: Box<dyn SnapshotSource>,
    cache: Mutex<Option<(Instant, SystemSnapshot)>>,
}

impl BoardContext {
    /// Parse the board identity and take the first snapshot.
    pub fn load(cpuinfo: &Path, ttl: Duration, source: Box<dyn SnapshotSource>) -> Self {
        let (revision, serial) = match fs::read_to_string(cpuinfo) {
            Ok(text) => parse_cpuinfo(&text),
            Err(e) => {
                error!(path = %cpuinfo.display(), error = %e, "can't check board revision");
                (None, None)
            }
        };
        match revision.as_deref() {
            Some(rev) => info!(revision = rev, "board revision"),
            None => error!("board revision not found"),
        }
        let ctx = Self {
            revision: revision.unwrap_or_default(),
            serial: serial.unwrap_or_default(),
            ttl,
            source,
            cache: Mutex::new(None),
        };
        if let Err(e) = ctx.snapshot() {
            warn!(error = %e, "initial system snapshot failed");
        }
        ctx
    }

    pub fn revision(&self) -> &str {
        &self.revision
    }

    pub fn serial(&self) -> &str {
        &self.serial
    }

    pub fn snapshot(&self) -> ProbeResult<SystemSnapshot> {
        self.snapshot_at(Instant::now())
    }

    /// Cached snapshot, re-read only when older than the refresh interval.
    pub fn snapshot_at(&self, now: Instant) -> ProbeResult<SystemSnapshot> {
        let mut cache = self.cache.lock().map_err(|_| ProbeError::Statistics)?;
        if let Some((at, snap)) = cache.as_ref() {
            if now.saturating_duration_since(*at) < self.ttl {
                return Ok(snap.clone());
            }
        }
        let snap = self.source.read()?;
        *cache = Some((now, snap.clone()));
        Ok(snap)
    }
}

/// `(revision, serial)` from `/proc/cpuinfo`.
pub fn parse_cpuinfo(text: &str) -> (Option<String>, Option<String>) {
    let mut revision = None;
    let mut serial = None;
    for line in text.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        match key.trim() {
            "Revision" => revision = Some(value.to_string()),
            "Serial" => serial = Some(value.to_string()),
            _ => {}
        }
    }
    (revision, serial)
}
