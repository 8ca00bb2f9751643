//! Restart decisions for exited workers.

use cluster_keeper::models::worker::{SlotId, WorkerHandle};
use cluster_keeper::orchestrator::RestartPolicy;
use cluster_keeper::ClusterConfig;

fn config(auto_restart: bool, limit: u32) -> ClusterConfig {
    ClusterConfig {
        worker_count: 1,
        auto_restart,
        auto_restart_limit: limit,
        ..ClusterConfig::default()
    }
}

fn exited(restart_count: u32) -> WorkerHandle {
    let mut handle = WorkerHandle::spawned(SlotId(1), 100, restart_count);
    handle.mark_exited(Some(1), None);
    handle
}

#[test]
fn replaces_while_under_limit() {
    let decision = RestartPolicy::decide(&exited(0), &config(true, 3));
    assert!(decision.replace);
    assert_eq!(decision.next_restart_count, 1);
}

#[test]
fn stops_at_limit() {
    let decision = RestartPolicy::decide(&exited(3), &config(true, 3));
    assert!(!decision.replace);
}

#[test]
fn zero_limit_never_restarts() {
    let decision = RestartPolicy::decide(&exited(0), &config(true, 0));
    assert!(!decision.replace);
}

#[test]
fn auto_restart_off_never_restarts() {
    let decision = RestartPolicy::decide(&exited(0), &config(false, 10));
    assert!(!decision.replace);
}

#[test]
fn lineage_allows_exactly_limit_replacements() {
    let cfg = config(true, 2);
    let mut count = 0;
    let mut replacements = 0;
    loop {
        let decision = RestartPolicy::decide(&exited(count), &cfg);
        if !decision.replace {
            break;
        }
        replacements += 1;
        count = decision.next_restart_count;
    }
    assert_eq!(replacements, 2);
}

#[test]
fn count_saturates() {
    let decision = RestartPolicy::decide(&exited(u32::MAX), &config(true, u32::MAX));
    assert!(!decision.replace);
    assert_eq!(decision.next_restart_count, u32::MAX);
}
