//! Error types for the agent.
//!
//! `ProbeError` is what every probe and mutator returns on failure. Its
//! `Display` text is sent to the client verbatim inside `{"Error": ...}`,
//! so wording changes here are wire-visible.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    #[error("Unable to read the list of exported GPIO's")]
    GpioList,

    #[error("Unable to change GPIO value")]
    GpioValue,

    #[error("Unable to change GPIO direction")]
    GpioDirection,

    /// Bad `SetGPIO` argument; nothing was written.
    #[error("Unsupported value - please report a bug")]
    GpioArgs,

    #[error("Unable to read the list of registered 1-wire sensors")]
    W1SlaveList,

    #[error("Unable to remove previously registered 1-wire sensor")]
    W1Remove,

    #[error("Unable to rescan 1-wire sensors")]
    W1Rescan,

    #[error("Can't open 'w1_bus_master1' directory")]
    W1MasterDir,

    #[error("Unable to read the list of processes")]
    ProcessList,

    #[error("Can't kill selected process")]
    Kill,

    #[error("Unable to read the list of mounted filesystems")]
    MountTable,

    #[error("Unable to read the list of network devices")]
    NetDevices,

    #[error("Unable to collect system statistics")]
    Statistics,

    #[error("Can't prepare LIRC command")]
    IrArgs,

    #[error("Can't send signal - please check server's log")]
    IrSend,

    #[error("Can't prepare valid JSON object")]
    Encode,
}

/// Result of any probe or mutator.
pub type ProbeResult<T> = std::result::Result<T, ProbeError>;

/// Per-connection failures. Every variant ends the connection.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("frame of {len} bytes exceeds the {limit} byte limit")]
    FrameTooLarge { len: usize, limit: usize },

    #[error("partial write: {written} of {expected} bytes")]
    ShortWrite { written: usize, expected: usize },

    #[error("transport error: {0}")]
    Transport(String),
}
