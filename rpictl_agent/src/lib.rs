//! Raspberry Pi remote control agent.
//!
//! Clients speak JSON over a WebSocket (`raspberry_control_protocol`):
//! each `{"RunCommand":{"cmd":..,"args":..}}` request gets at most one
//! reply, and system events are pushed to idle clients as notifications.

pub mod board;
pub mod config;
pub mod error;
pub mod notify;
pub mod probes;
pub mod proto;
pub mod router;
pub mod session;
pub mod state;
pub mod tls;
pub mod types;
pub mod ws;
