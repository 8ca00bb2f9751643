//! Human-readable status notifications.
//!
//! [`Notifier`] wraps a [`tokio::sync::broadcast`] channel. Every
//! notification is also logged through `tracing`, so a caller that never
//! subscribes still sees the stream in the log. Publishing never blocks and
//! notifications sent while nobody is subscribed are dropped.

use std::fmt::{Display, Formatter};

use chrono::{DateTime, SecondsFormat, Utc};
use tokio::sync::broadcast;
use tracing::{info, warn};

const DEFAULT_CAPACITY: usize = 256;

/// Classification of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    /// Supervisor started.
    Startup,
    /// Worker forked.
    Fork,
    /// Worker reported online.
    Online,
    /// Worker control channel closed.
    Disconnect,
    /// Worker process exited.
    Exit,
    /// Slot left exited with no replacement.
    Exhausted,
    /// Uncaught fault in the supervising process.
    Fault,
    /// Shutdown signal received.
    Shutdown,
    /// State file write failed.
    PersistenceFailure,
    /// Every slot has exited and nothing will be replaced.
    Stopped,
}

/// One timestamped notification line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// When the notification was raised.
    pub at: DateTime<Utc>,
    /// Classification.
    pub kind: NotificationKind,
    /// Message text without timestamp.
    pub message: String,
}

impl Display for Notification {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} :: {}",
            self.at.to_rfc3339_opts(SecondsFormat::Millis, true),
            self.message
        )
    }
}

/// Broadcast sender for notifications.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: broadcast::Sender<Notification>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl Notifier {
    /// Notifier with the given buffer capacity (clamped to at least 1).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Receiver observing notifications emitted after this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }

    /// Log and broadcast a notification.
    pub fn emit(&self, kind: NotificationKind, message: impl Into<String>) {
        let notification = Notification {
            at: Utc::now(),
            kind,
            message: message.into(),
        };
        match kind {
            NotificationKind::Fault
            | NotificationKind::Exhausted
            | NotificationKind::PersistenceFailure => {
                warn!(kind = ?kind, "{}", notification.message);
            }
            _ => info!(kind = ?kind, "{}", notification.message),
        }
        let _ = self.tx.send(notification);
    }
}
