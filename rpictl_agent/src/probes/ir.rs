//! Infrared remote commands through LIRC's `irsend`.
//!
//! The client payload (`<remote> <code> [code...]`) is split on whitespace
//! into the argument vector; no shell is involved.

use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;
use tracing::{error, info};

use crate::error::{ProbeError, ProbeResult};

pub async fn send_ir(program: &Path, args: &str) -> ProbeResult<()> {
    let words: Vec<&str> = args.split_whitespace().collect();
    let code = words.join(" ");
    if words.is_empty() {
        error!("can't prepare LIRC command: empty remote code");
        return Err(ProbeError::IrArgs);
    }

    let status = Command::new(program)
        .arg("SEND_ONCE")
        .args(&words)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .status()
        .await;

    match status {
        Ok(s) if s.success() => {
            info!(code, "IR signal sent");
            Ok(())
        }
        Ok(s) => {
            error!(code, status = %s, "can't send signal");
            Err(ProbeError::IrSend)
        }
        Err(e) => {
            error!(program = %program.display(), error = %e, "can't run IR sender");
            Err(ProbeError::IrSend)
        }
    }
}
