//! Request decoding and reply encoding for the JSON wire protocol.
//!
//! Requests look like `{"RunCommand": {"cmd": "GetGPIO", "args": ""}}`.
//! Every reply goes through [`encode_reply`] so field order and naming come
//! from the typed records in `types.rs`.

use serde::Deserialize;
use serde_json::Value;
use tracing::{error, warn};

use crate::error::ProbeError;
use crate::types::{NotificationFrame, Reply};

pub const PARSE_ERROR: &str = "Could not parse command";
pub const SHAPE_ERROR: &str = "Could not parse command - not valid JSON data";

/// One decoded request. Lives for a single dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub name: String,
    pub args: String,
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "RunCommand")]
    run_command: RunCommand,
}

#[derive(Deserialize)]
struct RunCommand {
    cmd: String,
    args: String,
}

/// Decode a request frame. On failure the ready-made error reply is returned.
pub fn decode_command(frame: &[u8]) -> Result<Command, Reply> {
    let root: Value = match serde_json::from_slice(frame) {
        Ok(v) => v,
        Err(e) => {
            warn!(line = e.line(), column = e.column(), error = %e, "request parser error");
            return Err(Reply::error(PARSE_ERROR));
        }
    };
    match serde_json::from_value::<Envelope>(root) {
        Ok(env) => Ok(Command {
            name: env.run_command.cmd,
            args: env.run_command.args,
        }),
        Err(e) => {
            warn!(error = %e, "request is not a RunCommand object");
            Err(Reply::error(SHAPE_ERROR))
        }
    }
}

/// Serialize a reply. `Reply::Empty` encodes to zero bytes.
pub fn encode_reply(reply: &Reply) -> Vec<u8> {
    if matches!(reply, Reply::Empty) {
        return Vec::new();
    }
    match serde_json::to_vec(reply) {
        Ok(bytes) => bytes,
        Err(e) => {
            error!(error = %e, "can't prepare valid JSON object");
            encode_reply(&Reply::error(ProbeError::Encode.to_string()))
        }
    }
}

/// The broadcast frame for a notification text.
pub fn notification_frame(message: &str) -> String {
    let frame = NotificationFrame {
        message: message.to_string(),
    };
    serde_json::to_string(&frame).unwrap_or_default()
}
