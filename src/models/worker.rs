//! Worker handle model and lifecycle helpers.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Stable logical identity of one pool position.
///
/// A slot survives replacement of its worker process; the OS pid does not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlotId(pub u32);

impl Display for SlotId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Last known status of a worker process.
///
/// Serialized with the labels the snapshot file uses; a worker that has
/// not reported in yet renders as an empty string.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum WorkerStatus {
    /// Forked, not yet online.
    #[serde(rename = "")]
    Spawning,
    /// Worker announced itself ready.
    #[serde(rename = "online")]
    Online,
    /// Control channel closed; process may still be running.
    #[serde(rename = "disconnect")]
    Disconnected,
    /// Process exited.
    #[serde(rename = "exit")]
    Exited,
}

impl WorkerStatus {
    /// Whether the process behind this status may still be running.
    #[must_use]
    pub fn is_live(self) -> bool {
        !matches!(self, Self::Exited)
    }
}

/// Identity and last known status of one worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerHandle {
    /// Logical slot, stable across replacements.
    pub slot: SlotId,
    /// OS process id of the current occupant.
    pub pid: u32,
    /// Last known status.
    pub status: WorkerStatus,
    /// Replacements issued for this slot's lineage so far.
    pub restart_count: u32,
    /// Why the worker exited; set only on exit.
    pub died_reason: Option<String>,
}

impl WorkerHandle {
    /// Handle for a freshly forked worker.
    #[must_use]
    pub fn spawned(slot: SlotId, pid: u32, restart_count: u32) -> Self {
        Self {
            slot,
            pid,
            status: WorkerStatus::Spawning,
            restart_count,
            died_reason: None,
        }
    }

    /// Record an exit with the reason derived from the exit code and signal.
    pub fn mark_exited(&mut self, code: Option<i32>, signal: Option<&str>) {
        self.status = WorkerStatus::Exited;
        self.died_reason = Some(died_reason(code, signal));
    }
}

/// Exit code as shown to operators; `none` when the process had no code.
#[must_use]
pub fn exit_code_label(code: Option<i32>) -> String {
    code.map_or_else(|| "none".to_owned(), |c| c.to_string())
}

/// Human-readable reason for a worker exit.
#[must_use]
pub fn died_reason(code: Option<i32>, signal: Option<&str>) -> String {
    let code = exit_code_label(code);
    let signal = signal.unwrap_or("none");
    format!("The worker died with exit code {code}, and signal {signal}")
}
