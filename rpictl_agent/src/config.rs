//! Command line flags and environment overrides, resolved once at startup.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_EVENT_SOCKET: &str = "/run/rpictl_agent/events.sock";
pub const DEFAULT_MAX_REPLY: usize = 65_536;
/// BoardContext never refreshes more often than this.
pub const MIN_BOARD_TTL: Duration = Duration::from_secs(120);

/// Raspberry Control daemon
#[derive(Parser, Debug, Clone)]
#[command(name = "rpictl_agent", version, about = "Raspberry Control Daemon")]
pub struct Args {
    /// Use SSL to encrypt the connection between client and server
    #[arg(short = 's', long = "use-ssl")]
    pub use_ssl: bool,

    /// Don't detach into the background
    #[arg(short = 'n', long = "no-daemon")]
    pub no_daemon: bool,

    /// Show JSON objects in the daemon log
    #[arg(short = 'j', long = "show-json")]
    pub show_json: bool,

    /// Port number
    #[arg(short = 'p', long, default_value_t = DEFAULT_PORT)]
    pub port: u16,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            use_ssl: false,
            no_daemon: false,
            show_json: false,
            port: DEFAULT_PORT,
        }
    }
}

/// Where the probes look. Everything hangs off one root so tests can point
/// the whole set at a temporary tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbePaths {
    pub gpio_dir: PathBuf,
    /// Control files of the first 1-wire master (`w1_master_slaves`, ...).
    pub w1_bus_master: PathBuf,
    /// Sensor directories of the first 1-wire master.
    pub w1_devices_dir: PathBuf,
    pub proc_dir: PathBuf,
    pub mounts: PathBuf,
    pub net_dir: PathBuf,
    pub thermal_zone: PathBuf,
    pub proc_stat: PathBuf,
    pub cpuinfo: PathBuf,
}

impl ProbePaths {
    pub fn under(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            gpio_dir: root.join("sys/class/gpio"),
            w1_bus_master: root.join("sys/bus/w1/devices/w1_bus_master1"),
            w1_devices_dir: root.join("sys/devices/w1_bus_master1"),
            proc_dir: root.join("proc"),
            mounts: root.join("proc/mounts"),
            net_dir: root.join("sys/class/net"),
            thermal_zone: root.join("sys/class/thermal/thermal_zone0/temp"),
            proc_stat: root.join("proc/stat"),
            cpuinfo: root.join("proc/cpuinfo"),
        }
    }
}

impl Default for ProbePaths {
    fn default() -> Self {
        Self::under("/")
    }
}

/// Knobs the probes and mutators need at call time.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    pub paths: ProbePaths,
    /// Wait after a 1-wire rescan before reading sensors.
    pub settle_delay: Duration,
    /// Gap between the two /proc/stat samples.
    pub cpu_sample_gap: Duration,
    pub irsend: PathBuf,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            paths: ProbePaths::default(),
            settle_delay: Duration::from_secs(1),
            cpu_sample_gap: Duration::from_secs(1),
            irsend: PathBuf::from("irsend"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub port: u16,
    pub use_ssl: bool,
    pub daemonize: bool,
    pub show_json: bool,
    pub probes: ProbeConfig,
    pub event_socket: PathBuf,
    pub max_reply: usize,
    pub board_ttl: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self::from_lookup(&Args::default(), |_| None)
    }
}

impl AgentConfig {
    pub fn from_env(args: &Args) -> Self {
        Self::from_lookup(args, |key| std::env::var(key).ok())
    }

    /// Build from flags plus a key lookup (the environment in production).
    pub fn from_lookup<F>(args: &Args, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut probes = ProbeConfig::default();
        if let Some(root) = lookup("RPICTL_AGENT_SYSROOT").filter(|v| !v.is_empty()) {
            probes.paths = ProbePaths::under(root);
        }
        if let Some(prog) = lookup("RPICTL_AGENT_IRSEND").filter(|v| !v.is_empty()) {
            probes.irsend = PathBuf::from(prog);
        }
        let event_socket = lookup("RPICTL_AGENT_EVENT_SOCKET")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_EVENT_SOCKET));
        let max_reply = lookup("RPICTL_AGENT_MAX_REPLY")
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(DEFAULT_MAX_REPLY);
        let board_ttl = lookup("RPICTL_AGENT_BOARD_TTL_SECS")
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(MIN_BOARD_TTL)
            .max(MIN_BOARD_TTL);

        Self {
            port: args.port,
            use_ssl: args.use_ssl,
            daemonize: !args.no_daemon,
            show_json: args.show_json,
            probes,
            event_socket,
            max_reply,
            board_ttl,
        }
    }
}
