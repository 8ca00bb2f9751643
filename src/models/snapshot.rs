//! Point-in-time rendering of pool state.

use serde::{Deserialize, Serialize};

use super::worker::{SlotId, WorkerHandle, WorkerStatus};
use crate::orchestrator::registry::WorkerRegistry;

/// Overall status of the cluster.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ClusterStatus {
    /// Workers are being kept alive.
    Running,
    /// Shutdown requested; waiting for workers to leave.
    Draining,
    /// No live workers remain and none will be replaced.
    Stopped,
}

/// Summary of one registry entry as written to the state file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkerSummary {
    /// Slot id.
    pub worker_id: SlotId,
    /// OS pid of the current occupant.
    pub pid: u32,
    /// Last known status.
    pub status: WorkerStatus,
    /// Died reason, present only for exited workers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl From<&WorkerHandle> for WorkerSummary {
    fn from(handle: &WorkerHandle) -> Self {
        let reason = if handle.status == WorkerStatus::Exited {
            Some(handle.died_reason.clone().unwrap_or_default())
        } else {
            None
        };
        Self {
            worker_id: handle.slot,
            pid: handle.pid,
            status: handle.status,
            reason,
        }
    }
}

/// Complete snapshot of the pool, rebuilt from the registry on every
/// transition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionSnapshot {
    /// Configured pool size.
    pub cluster_size: usize,
    /// Pid of the supervising process.
    pub master_process_id: u32,
    /// Overall cluster status.
    pub cluster_status: ClusterStatus,
    /// One entry per registry slot, in slot order.
    pub workers: Vec<WorkerSummary>,
}

impl SessionSnapshot {
    /// Render the whole registry at this instant.
    #[must_use]
    pub fn capture(
        cluster_size: usize,
        master_process_id: u32,
        cluster_status: ClusterStatus,
        registry: &WorkerRegistry,
    ) -> Self {
        Self {
            cluster_size,
            master_process_id,
            cluster_status,
            workers: registry.iter().map(WorkerSummary::from).collect(),
        }
    }

    /// Number of workers whose process may still be running.
    #[must_use]
    pub fn live_workers(&self) -> usize {
        self.workers.iter().filter(|w| w.status.is_live()).count()
    }
}
