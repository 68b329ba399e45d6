//! Fake board tree shared by the integration tests.
#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::time::Duration;

use rpictl_agent::board::{BoardContext, SnapshotSource, SystemSnapshot};
use rpictl_agent::config::{AgentConfig, ProbeConfig, ProbePaths};
use rpictl_agent::error::ProbeResult;
use tempfile::TempDir;

pub const CPUINFO: &str = "processor\t: 0\nHardware\t: BCM2835\nRevision\t: a02082\nSerial\t\t: 00000000c0ffee42\n";

pub struct FixedSource;

impl SnapshotSource for FixedSource {
    fn read(&self) -> ProbeResult<SystemSnapshot> {
        Ok(SystemSnapshot {
            kernel: "6.1.21-v8+".into(),
            uptime_secs: 4599,
            load: [0.0, 0.01, 0.05],
            total_ram: 1000,
            free_ram: 750,
            total_swap: 0,
            free_swap: 0,
        })
    }
}

fn write(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
}

/// A sysroot with one GPIO line, one DS18B20, one process, two interfaces.
pub fn sysroot() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();

    write(root, "proc/cpuinfo", CPUINFO);
    write(root, "sys/class/gpio/gpio17/value", "0\n");
    write(root, "sys/class/gpio/gpio17/direction", "out\n");
    fs::create_dir_all(root.join("sys/class/gpio/gpiochip0")).unwrap();

    write(root, "sys/bus/w1/devices/w1_bus_master1/w1_master_slaves", "28-000005e2fdc3\n");
    write(root, "sys/bus/w1/devices/w1_bus_master1/w1_master_remove", "");
    write(root, "sys/bus/w1/devices/w1_bus_master1/w1_master_search", "");
    write(
        root,
        "sys/devices/w1_bus_master1/28-000005e2fdc3/w1_slave",
        "72 01 4b 46 7f ff 0e 10 57 : crc=57 YES\n72 01 4b 46 7f ff 0e 10 57 t=23125\n",
    );

    write(root, "proc/1/status", "Name:\tinit\nState:\tS (sleeping)\nUid:\t0\t0\t0\t0\n");
    write(root, "proc/stat", "cpu  10 1 5 100 4 2 3 1 0 0\n");
    write(root, "proc/mounts", "/dev/root / ext4 rw,noatime 0 0\n");
    write(root, "sys/class/net/lo/address", "00:00:00:00:00:00\n");
    write(root, "sys/class/net/eth0/address", "b8:27:eb:13:aa:b3\n");
    write(root, "sys/class/thermal/thermal_zone0/temp", "44388\n");
    tmp
}

pub fn config(root: &Path) -> AgentConfig {
    AgentConfig {
        daemonize: false,
        probes: ProbeConfig {
            paths: ProbePaths::under(root),
            settle_delay: Duration::ZERO,
            cpu_sample_gap: Duration::ZERO,
            irsend: "true".into(),
        },
        event_socket: root.join("events.sock"),
        ..AgentConfig::default()
    }
}

pub fn board(root: &Path) -> BoardContext {
    BoardContext::load(
        &root.join("proc/cpuinfo"),
        Duration::from_secs(120),
        Box::new(FixedSource),
    )
}
