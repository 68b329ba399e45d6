//! Per-connection request/reply state machine.
//!
//! A session owns a single outbound buffer. It is `Idle` while the buffer is
//! empty and `Replying` while a reply (or a notification) waits for the
//! socket to become writable. Loading a new reply while `Replying` replaces
//! the old one outright; bytes of two replies never mix.
//!
//! The transport drives it with four events: frame received
//! ([`Session::accept_frame`] then [`Session::load_reply`]), socket writable
//! ([`Session::on_writable`]), write finished ([`Session::complete_write`])
//! and close (drop).

use tracing::{debug, warn};

use crate::error::SessionError;
use crate::proto::encode_reply;
use crate::types::Reply;

/// Largest request frame accepted; anything bigger closes the connection.
pub const MAX_PAYLOAD: usize = 10_000;

/// Floor for the reply buffer so the overflow error itself always fits.
const MIN_REPLY_CAPACITY: usize = 256;

pub const REPLY_TOO_LARGE: &str = "Reply too large for session buffer";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Replying,
}

#[derive(Debug)]
pub struct Session {
    id: u64,
    buf: Vec<u8>,
    capacity: usize,
}

impl Session {
    pub fn new(id: u64, capacity: usize) -> Self {
        let capacity = capacity.max(MIN_REPLY_CAPACITY);
        Self {
            id,
            buf: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> SessionState {
        if self.buf.is_empty() {
            SessionState::Idle
        } else {
            SessionState::Replying
        }
    }

    /// Bytes waiting to be written (0 when idle).
    pub fn pending_len(&self) -> usize {
        self.buf.len()
    }

    /// Frame-size gate, checked before the frame reaches the router.
    pub fn accept_frame(&self, len: usize) -> Result<(), SessionError> {
        if len > MAX_PAYLOAD {
            warn!(session = self.id, len, limit = MAX_PAYLOAD, "packet too big, hanging up");
            return Err(SessionError::FrameTooLarge {
                len,
                limit: MAX_PAYLOAD,
            });
        }
        Ok(())
    }

    /// Buffer a reply. Returns `true` when the transport should be asked for
    /// a writable event; an empty reply leaves the session idle.
    pub fn load_reply(&mut self, reply: &[u8]) -> bool {
        if self.state() == SessionState::Replying {
            debug!(session = self.id, dropped = self.buf.len(), "undelivered reply overwritten");
        }
        self.buf.clear();
        if reply.len() > self.capacity {
            warn!(
                session = self.id,
                len = reply.len(),
                capacity = self.capacity,
                "reply does not fit the session buffer"
            );
            self.buf
                .extend_from_slice(&encode_reply(&Reply::error(REPLY_TOO_LARGE)));
        } else {
            self.buf.extend_from_slice(reply);
        }
        !self.buf.is_empty()
    }

    /// The socket can take data. An idle session picks up the current
    /// notification, if any; a pending reply is never pre-empted.
    /// Returns the bytes to write.
    pub fn on_writable(&mut self, notification: Option<&str>) -> Option<&[u8]> {
        if self.state() == SessionState::Idle {
            let note = notification.filter(|n| !n.is_empty())?;
            if note.len() > self.capacity {
                warn!(session = self.id, len = note.len(), "notification too large, dropped");
                return None;
            }
            self.buf.extend_from_slice(note.as_bytes());
        }
        Some(&self.buf)
    }

    /// Record how much of the pending buffer the transport wrote. The
    /// buffer is cleared either way; a short write is fatal for the
    /// connection.
    pub fn complete_write(&mut self, written: usize) -> Result<(), SessionError> {
        let expected = self.buf.len();
        self.buf.clear();
        debug!(session = self.id, written, "bytes written");
        if written < expected {
            warn!(session = self.id, written, expected, "partial write");
            return Err(SessionError::ShortWrite { written, expected });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOTE: &str = r#"{"Notification":"[UDisks] DeviceAdded"}"#;

    #[test]
    fn request_reply_cycle() {
        let mut s = Session::new(1, 1024);
        assert_eq!(s.state(), SessionState::Idle);
        assert!(s.accept_frame(100).is_ok());
        assert!(s.load_reply(br#"{"Error":"Not supported command"}"#));
        assert_eq!(s.state(), SessionState::Replying);

        let out = s.on_writable(None).unwrap().to_vec();
        assert_eq!(out, br#"{"Error":"Not supported command"}"#.to_vec());
        s.complete_write(out.len()).unwrap();
        assert_eq!(s.state(), SessionState::Idle);
        assert_eq!(s.pending_len(), 0);
    }

    #[test]
    fn oversized_frame_is_fatal() {
        let s = Session::new(1, 1024);
        assert!(s.accept_frame(MAX_PAYLOAD).is_ok());
        assert!(matches!(
            s.accept_frame(MAX_PAYLOAD + 1),
            Err(SessionError::FrameTooLarge { len, .. }) if len == MAX_PAYLOAD + 1
        ));
    }

    #[test]
    fn second_reply_overwrites_without_mixing() {
        let mut s = Session::new(1, 1024);
        let long = br#"{"Processes":[{"pid":1,"name":"init","state":"S (sleeping)"}]}"#;
        let short = br#"{"Error":"x"}"#;
        s.load_reply(long);
        s.load_reply(short);
        assert_eq!(s.on_writable(None).unwrap(), short);
        assert_eq!(s.pending_len(), short.len());
    }

    #[test]
    fn empty_reply_stays_idle() {
        let mut s = Session::new(1, 1024);
        assert!(!s.load_reply(b""));
        assert_eq!(s.state(), SessionState::Idle);
        assert!(s.on_writable(None).is_none());
    }

    #[test]
    fn notification_only_when_idle() {
        let mut s = Session::new(1, 1024);
        assert_eq!(s.on_writable(Some(NOTE)).unwrap(), NOTE.as_bytes());
        s.complete_write(NOTE.len()).unwrap();

        s.load_reply(br#"{"TempSensors":[]}"#);
        assert_eq!(s.on_writable(Some(NOTE)).unwrap(), br#"{"TempSensors":[]}"#);
        s.complete_write(18).unwrap();

        assert!(s.on_writable(Some("")).is_none());
        assert!(s.on_writable(None).is_none());
    }

    #[test]
    fn short_write_is_fatal_and_clears() {
        let mut s = Session::new(1, 1024);
        s.load_reply(b"{\"Statistics\":{}}");
        assert!(matches!(
            s.complete_write(3),
            Err(SessionError::ShortWrite { written: 3, expected: 17 })
        ));
        assert_eq!(s.state(), SessionState::Idle);
    }

    #[test]
    fn reply_over_capacity_becomes_error() {
        let mut s = Session::new(1, 300);
        let big = vec![b'x'; 301];
        assert!(s.load_reply(&big));
        let out = s.on_writable(None).unwrap();
        let v: serde_json::Value = serde_json::from_slice(out).unwrap();
        assert_eq!(v["Error"], REPLY_TOO_LARGE);
    }
}
