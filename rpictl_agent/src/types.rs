//! Data types sent to the client over WebSocket.
//! Keep this module minimal and stable: it defines the wire format.
//! Field names follow what the Android client reads, not Rust naming.

use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct GpioLine {
    #[serde(rename = "gpio")]
    pub number: u32,
    pub value: u8,
    pub direction: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TempSensor {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
    #[serde(rename = "temp")]
    pub celsius: f64,
    pub crc: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ProcessEntry {
    pub pid: u32,
    // absent when the uid has no account entry
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub user: Option<String>,
    pub name: String,
    pub state: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct FilesystemEntry {
    pub device: String,
    pub mountpoint: String,
    pub used_bytes: u64,
    pub free_bytes: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct NetDevice {
    pub name: String,
    pub mac_address: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SystemStats {
    pub kernel: String,
    pub uptime: String,
    pub serial: String,
    pub mac_addr: String,
    #[serde(rename = "used_space")]
    pub used_space_pct: f64,
    #[serde(rename = "free_space")]
    pub free_space_pct: f64,
    #[serde(rename = "ram_usage")]
    pub ram_usage_pct: i32,
    #[serde(rename = "swap_usage")]
    pub swap_usage_pct: i32,
    pub cpu_load: String,
    #[serde(rename = "cpu_temp")]
    pub cpu_temp_c: i32,
    #[serde(rename = "cpu_usage")]
    pub cpu_usage_pct: i32,
}

// ---------- Reply envelopes ----------

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct GpioReply {
    #[serde(rename = "GPIOState")]
    pub lines: Vec<GpioLine>,
    #[serde(rename = "Revision")]
    pub revision: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TempSensorsReply {
    #[serde(rename = "TempSensors")]
    pub sensors: Vec<TempSensor>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ProcessesReply {
    #[serde(rename = "Processes")]
    pub processes: Vec<ProcessEntry>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct StatisticsReply {
    #[serde(rename = "Statistics")]
    pub statistics: SystemStats,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct FilesystemsReply {
    #[serde(rename = "Filesystems")]
    pub filesystems: Vec<FilesystemEntry>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct NetDevicesReply {
    #[serde(rename = "NetDevices")]
    pub devices: Vec<NetDevice>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ErrorReply {
    #[serde(rename = "Error")]
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct NotificationFrame {
    #[serde(rename = "Notification")]
    pub message: String,
}

/// Everything the router can answer with.
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum Reply {
    Gpio(GpioReply),
    TempSensors(TempSensorsReply),
    Processes(ProcessesReply),
    Statistics(StatisticsReply),
    Filesystems(FilesystemsReply),
    NetDevices(NetDevicesReply),
    Error(ErrorReply),
    /// Success with nothing to send back (SendIR).
    #[serde(skip)]
    Empty,
}

impl Reply {
    pub fn error(message: impl Into<String>) -> Self {
        Reply::Error(ErrorReply {
            error: message.into(),
        })
    }
}
