//! Lifecycle events consumed by the supervisor.
//!
//! All events reach the supervisor through one unbounded `mpsc` channel
//! and are handled strictly in arrival order.

use tokio::sync::mpsc;

use crate::models::worker::SlotId;

/// Sending half of the supervisor's event channel.
pub type EventSender = mpsc::UnboundedSender<ClusterEvent>;

/// Receiving half of the supervisor's event channel.
pub type EventReceiver = mpsc::UnboundedReceiver<ClusterEvent>;

/// Events emitted by spawners, signal listeners and the panic hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClusterEvent {
    /// Worker announced itself ready.
    Online {
        /// Slot the worker occupies.
        slot: SlotId,
        /// Worker pid.
        pid: u32,
    },
    /// Worker control channel closed.
    Disconnect {
        /// Slot the worker occupies.
        slot: SlotId,
        /// Worker pid.
        pid: u32,
    },
    /// Worker process exited.
    Exit {
        /// Slot the worker occupied.
        slot: SlotId,
        /// Worker pid.
        pid: u32,
        /// Exit code, absent when killed by a signal.
        code: Option<i32>,
        /// Terminating signal name, if any.
        signal: Option<String>,
    },
    /// Uncaught fault inside the supervising process.
    Fault {
        /// Fault description.
        message: String,
    },
    /// Graceful shutdown requested.
    Shutdown,
}

/// Create the supervisor's event channel.
#[must_use]
pub fn channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}
