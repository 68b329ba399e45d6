//! Process table scraped from `/proc/<pid>/status`, plus SIGKILL.

use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};

use nix::sys::signal::{kill, Signal};
use nix::unistd::{Pid, Uid, User};
use tracing::{debug, error, info, warn};

use crate::error::{ProbeError, ProbeResult};
use crate::types::ProcessEntry;

/// Resolve a uid through the system account database.
pub fn user_name(uid: u32) -> Option<String> {
    User::from_uid(Uid::from_raw(uid)).ok().flatten().map(|u| u.name)
}

/// List processes. `resolve_user` maps a real uid to an account name;
/// processes that exit mid-scan are silently dropped.
pub fn list_processes<F>(proc_dir: &Path, resolve_user: F) -> ProbeResult<Vec<ProcessEntry>>
where
    F: Fn(u32) -> Option<String>,
{
    let entries = fs::read_dir(proc_dir).map_err(|e| {
        error!(dir = %proc_dir.display(), error = %e, "unable to read the list of processes");
        ProbeError::ProcessList
    })?;

    let mut procs: Vec<ProcessEntry> = entries
        .filter_map(Result::ok)
        .filter_map(|entry| {
            let pid: u32 = entry.file_name().to_str()?.parse().ok()?;
            let status = fs::read_to_string(entry.path().join("status")).ok()?;
            Some(parse_status(pid, &status, &resolve_user))
        })
        .collect();
    procs.sort_by_key(|p| p.pid);
    Ok(procs)
}

/// Pull `Name`, `State` and the real `Uid` out of a status file.
pub fn parse_status<F>(pid: u32, status: &str, resolve_user: F) -> ProcessEntry
where
    F: Fn(u32) -> Option<String>,
{
    let mut entry = ProcessEntry {
        pid,
        user: None,
        name: String::new(),
        state: String::new(),
    };
    for line in status.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        match key {
            "Name" => entry.name = value.trim().to_string(),
            "State" => entry.state = value.trim().to_string(),
            "Uid" => {
                entry.user = value
                    .split_whitespace()
                    .next()
                    .and_then(|uid| uid.parse::<u32>().ok())
                    .and_then(&resolve_user);
            }
            _ => {}
        }
    }
    entry
}

/// Parse a `KillProcess` argument and SIGKILL it.
pub fn kill_process(args: &str) -> ProbeResult<u32> {
    let pid = args
        .trim()
        .parse::<i32>()
        .ok()
        .filter(|pid| *pid > 0)
        .ok_or_else(|| {
            error!(args, "can't kill selected process: bad pid");
            ProbeError::Kill
        })?;
    kill(Pid::from_raw(pid), Signal::SIGKILL).map_err(|e| {
        error!(pid, error = %e, "can't kill selected process");
        ProbeError::Kill
    })?;
    info!(pid, "sent SIGKILL");
    Ok(pid as u32)
}

/// How long a KillProcess reply waits for the signalled pid to die.
pub const KILL_WAIT: Duration = Duration::from_secs(1);
const KILL_POLL: Duration = Duration::from_millis(10);

/// True once `pid` has no status file or is a zombie.
pub fn has_exited(proc_dir: &Path, pid: u32) -> bool {
    match fs::read_to_string(proc_dir.join(pid.to_string()).join("status")) {
        Ok(status) => is_zombie(&parse_status(pid, &status, |_| None)),
        Err(_) => true,
    }
}

pub fn is_zombie(entry: &ProcessEntry) -> bool {
    entry.state.starts_with('Z')
}

/// SIGKILL is delivered asynchronously; poll until the pid is gone or
/// reaped-pending, at most `limit`.
pub async fn wait_for_exit(proc_dir: &Path, pid: u32, limit: Duration) -> bool {
    let deadline = Instant::now() + limit;
    loop {
        if has_exited(proc_dir, pid) {
            debug!(pid, "killed process gone");
            return true;
        }
        if Instant::now() >= deadline {
            warn!(pid, "process still alive after SIGKILL");
            return false;
        }
        tokio::time::sleep(KILL_POLL).await;
    }
}
