//! System-event notifications pushed to every connected client.
//!
//! External producers write newline-delimited JSON `{"interface","signal"}`
//! records to a Unix socket. The event loop turns each record into a short
//! text, stores it in a single last-write-wins slot and, when the slot is
//! pending, wakes every session so idle ones write it out.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::proto::notification_frame;

pub const UNKNOWN_EVENT: &str = "(not set)";

/// A raw event as delivered by a producer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SystemEvent {
    pub interface: String,
    pub signal: String,
}

/// Map an event onto the text clients see.
pub fn notification_text(event: &SystemEvent) -> String {
    if event.interface == "org.freedesktop.UDisks" && event.signal == "DeviceAdded" {
        return "[UDisks] DeviceAdded".to_string();
    }
    if event.signal == "JobQueuedLocal" {
        return "[CUPS] JobQueuedLocal".to_string();
    }
    UNKNOWN_EVENT.to_string()
}

#[derive(Debug, Default)]
struct Slot {
    message: String,
    pending: bool,
}

/// Global notification slot plus the wake-up channel sessions subscribe to.
pub struct Broadcaster {
    slot: Mutex<Slot>,
    writable: watch::Sender<u64>,
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl Broadcaster {
    pub fn new() -> Self {
        let (writable, _) = watch::channel(0);
        Self {
            slot: Mutex::new(Slot::default()),
            writable,
        }
    }

    /// Replace the current notification (last write wins) and mark it pending.
    pub fn publish(&self, text: &str) {
        let frame = notification_frame(text);
        if let Ok(mut slot) = self.slot.lock() {
            slot.message = frame;
            slot.pending = true;
        }
    }

    /// If a notification is pending, clear the flag and request a writable
    /// event on every session. Returns whether a broadcast was scheduled.
    pub fn tick(&self) -> bool {
        let fire = match self.slot.lock() {
            Ok(mut slot) => std::mem::replace(&mut slot.pending, false),
            Err(_) => false,
        };
        if fire {
            self.writable.send_modify(|gen| *gen = gen.wrapping_add(1));
        }
        fire
    }

    /// The encoded notification frame, if one was ever published.
    pub fn current(&self) -> Option<String> {
        let slot = self.slot.lock().ok()?;
        (!slot.message.is_empty()).then(|| slot.message.clone())
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.writable.subscribe()
    }

    /// Number of sessions currently subscribed.
    pub fn sessions(&self) -> usize {
        self.writable.receiver_count()
    }
}

/// Consume events until cancelled or every producer is gone.
pub async fn run_event_loop(
    broadcaster: Arc<Broadcaster>,
    mut events: mpsc::Receiver<SystemEvent>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("event loop shutting down");
                break;
            }
            event = events.recv() => {
                let Some(event) = event else {
                    debug!("event channel closed");
                    break;
                };
                let text = notification_text(&event);
                info!(interface = %event.interface, signal = %event.signal, %text, "system event");
                broadcaster.publish(&text);
            }
        }
        if broadcaster.tick() {
            debug!(sessions = broadcaster.sessions(), "notification scheduled");
        }
    }
}

/// Bind the producer socket. A stale socket file is replaced and the parent
/// directory created when missing.
pub fn bind_event_socket(path: &Path) -> std::io::Result<UnixListener> {
    if path.exists() {
        std::fs::remove_file(path)?;
    }
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    UnixListener::bind(path)
}

/// Accept producers until cancelled, forwarding every parsed record.
pub async fn serve_event_socket(
    listener: UnixListener,
    path: PathBuf,
    events: mpsc::Sender<SystemEvent>,
    cancel: CancellationToken,
) {
    info!(socket = %path.display(), "listening for system events");
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, _)) => {
                    tokio::spawn(read_producer(stream, events.clone(), cancel.clone()));
                }
                Err(e) => error!(error = %e, "failed to accept event producer"),
            }
        }
    }
    if let Err(e) = std::fs::remove_file(&path) {
        debug!(error = %e, "event socket already gone");
    }
}

async fn read_producer(
    stream: UnixStream,
    events: mpsc::Sender<SystemEvent>,
    cancel: CancellationToken,
) {
    let mut lines = BufReader::new(stream).lines();
    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => return,
            line = lines.next_line() => line,
        };
        match line {
            Ok(Some(line)) if line.trim().is_empty() => continue,
            Ok(Some(line)) => match serde_json::from_str::<SystemEvent>(&line) {
                Ok(event) => {
                    if events.send(event).await.is_err() {
                        return;
                    }
                }
                Err(e) => warn!(error = %e, "malformed system event"),
            },
            Ok(None) => return,
            Err(e) => {
                warn!(error = %e, "event producer read failed");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::AsyncWriteExt;

    fn event(interface: &str, signal: &str) -> SystemEvent {
        SystemEvent {
            interface: interface.into(),
            signal: signal.into(),
        }
    }

    #[test]
    fn event_mapping() {
        assert_eq!(
            notification_text(&event("org.freedesktop.UDisks", "DeviceAdded")),
            "[UDisks] DeviceAdded"
        );
        assert_eq!(
            notification_text(&event("org.cups.cupsd.Notifier", "JobQueuedLocal")),
            "[CUPS] JobQueuedLocal"
        );
        assert_eq!(
            notification_text(&event("org.freedesktop.UDisks", "DeviceRemoved")),
            UNKNOWN_EVENT
        );
    }

    #[test]
    fn last_write_wins_and_tick_wakes_once() {
        let b = Broadcaster::new();
        let mut rx = b.subscribe();
        assert_eq!(b.current(), None);
        assert!(!b.tick());

        b.publish("[UDisks] DeviceAdded");
        b.publish("[CUPS] JobQueuedLocal");
        assert_eq!(
            b.current().unwrap(),
            r#"{"Notification":"[CUPS] JobQueuedLocal"}"#
        );

        assert!(b.tick());
        assert!(rx.has_changed().unwrap());
        rx.borrow_and_update();
        assert!(!b.tick());
        assert!(!rx.has_changed().unwrap());
        assert_eq!(b.sessions(), 1);
    }

    #[tokio::test]
    async fn socket_to_broadcast() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("run").join("events.sock");
        let cancel = CancellationToken::new();
        let broadcaster = Arc::new(Broadcaster::new());
        let mut rx = broadcaster.subscribe();

        let (tx, events) = mpsc::channel(8);
        let listener = bind_event_socket(&path).unwrap();
        tokio::spawn(serve_event_socket(listener, path.clone(), tx, cancel.clone()));
        tokio::spawn(run_event_loop(broadcaster.clone(), events, cancel.clone()));

        let mut producer = UnixStream::connect(&path).await.unwrap();
        producer
            .write_all(b"not json\n{\"interface\":\"org.freedesktop.UDisks\",\"signal\":\"DeviceAdded\"}\n")
            .await
            .unwrap();

        tokio::time::timeout(Duration::from_secs(5), rx.changed())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            broadcaster.current().unwrap(),
            r#"{"Notification":"[UDisks] DeviceAdded"}"#
        );
        cancel.cancel();
    }
}
