//! Restart decision for exited workers.
//!
//! A slot is replaced only while auto-restart is enabled and its lineage
//! has used fewer replacements than the configured limit. A limit of zero
//! therefore forbids every restart. The carried-forward count belongs to
//! the replacement in the same slot, so the limit bounds restarts per slot
//! rather than across the pool.

use crate::config::ClusterConfig;
use crate::models::worker::WorkerHandle;

/// Outcome of a restart decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartDecision {
    /// Whether the slot gets a replacement worker.
    pub replace: bool,
    /// Restart count the replacement carries.
    pub next_restart_count: u32,
}

/// Stateless restart policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct RestartPolicy;

impl RestartPolicy {
    /// Decide whether the exited `handle` is replaced.
    #[must_use]
    pub fn decide(handle: &WorkerHandle, config: &ClusterConfig) -> RestartDecision {
        let replace = config.auto_restart && handle.restart_count < config.auto_restart_limit;
        RestartDecision {
            replace,
            next_restart_count: handle.restart_count.saturating_add(1),
        }
    }
}
