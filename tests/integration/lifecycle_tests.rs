//! Supervisor event loop from startup to a stopped cluster.

use cluster_keeper::models::snapshot::ClusterStatus;
use cluster_keeper::models::worker::{SlotId, WorkerStatus};
use cluster_keeper::notify::{NotificationKind, Notifier};
use cluster_keeper::orchestrator::{ClusterEvent, Supervisor};
use cluster_keeper::persistence::StatePersister;
use cluster_keeper::ClusterError;
use serial_test::serial;

use super::test_helpers::{persisted_config, test_config, wait_for, FakeSpawner, WAIT};

#[tokio::test]
async fn shutdown_drains_and_returns_stopped_snapshot() {
    let notifier = Notifier::default();
    let mut rx = notifier.subscribe();
    let spawner = FakeSpawner::cooperative();
    let mut supervisor = Supervisor::new(test_config(3, true, 3), spawner.clone(), notifier);
    let events = supervisor.sender();
    supervisor.start();

    let run = tokio::spawn(supervisor.run());
    for _ in 0..3 {
        wait_for(&mut rx, NotificationKind::Online).await;
    }
    events.send(ClusterEvent::Shutdown).expect("supervisor listening");

    let snapshot = tokio::time::timeout(WAIT, run)
        .await
        .expect("run finishes")
        .expect("task joins")
        .expect("run succeeds");

    assert_eq!(snapshot.cluster_status, ClusterStatus::Stopped);
    assert_eq!(snapshot.workers.len(), 3);
    assert!(snapshot.workers.iter().all(|w| w.status == WorkerStatus::Exited));
    assert_eq!(spawner.fork_count(), 3);
    assert!(spawner.kills().is_empty());
}

#[tokio::test]
async fn grace_period_force_kills_stubborn_workers() {
    let spawner = FakeSpawner::stubborn();
    let mut config = test_config(2, true, 3);
    config.shutdown_grace_seconds = Some(0);
    let mut supervisor = Supervisor::new(config, spawner.clone(), Notifier::default());
    let events = supervisor.sender();
    supervisor.start();
    events.send(ClusterEvent::Shutdown).expect("supervisor listening");

    let snapshot = tokio::time::timeout(WAIT, supervisor.run())
        .await
        .expect("run finishes")
        .expect("run succeeds");

    assert_eq!(snapshot.cluster_status, ClusterStatus::Stopped);
    assert_eq!(spawner.kills(), vec![SlotId(1), SlotId(2)]);
    assert!(snapshot.workers.iter().all(|w| w
        .reason
        .as_deref()
        .is_some_and(|r| r.ends_with("signal SIGKILL"))));
    assert_eq!(spawner.fork_count(), 2);
}

#[tokio::test]
async fn exhausted_pool_stops_without_shutdown() {
    let notifier = Notifier::default();
    let mut supervisor = Supervisor::new(test_config(2, true, 1), FakeSpawner::failing(), notifier);
    supervisor.start();

    let snapshot = tokio::time::timeout(WAIT, supervisor.run())
        .await
        .expect("run finishes")
        .expect("run succeeds");

    assert_eq!(snapshot.cluster_status, ClusterStatus::Stopped);
    assert_eq!(snapshot.live_workers(), 0);
}

#[tokio::test]
async fn crash_loop_respects_limit_inside_event_loop() {
    let notifier = Notifier::default();
    let mut rx = notifier.subscribe();
    let spawner = FakeSpawner::cooperative();
    let mut supervisor = Supervisor::new(test_config(1, true, 2), spawner.clone(), notifier);
    let events = supervisor.sender();
    supervisor.start();
    let run = tokio::spawn(supervisor.run());

    // Crash whichever worker currently holds slot 1 until the budget runs out.
    for _ in 0..3 {
        let online = wait_for(&mut rx, NotificationKind::Online).await;
        let pid: u32 = online
            .message
            .trim_start_matches("Worker ")
            .trim_end_matches(" is online")
            .parse()
            .expect("pid in message");
        events
            .send(ClusterEvent::Exit {
                slot: SlotId(1),
                pid,
                code: Some(1),
                signal: None,
            })
            .expect("supervisor listening");
    }

    let exhausted = wait_for(&mut rx, NotificationKind::Exhausted).await;
    assert_eq!(exhausted.message, "Maximum restart limit reached for worker 1");

    let snapshot = tokio::time::timeout(WAIT, run)
        .await
        .expect("run finishes")
        .expect("task joins")
        .expect("run succeeds");
    assert_eq!(snapshot.cluster_status, ClusterStatus::Stopped);
    assert_eq!(spawner.fork_count(), 3);
}

#[tokio::test]
async fn state_file_reflects_final_status() {
    let temp = tempfile::tempdir().expect("tempdir");
    let config = persisted_config(temp.path(), 2);
    let persister = StatePersister::new(&config.state_file);
    let mut supervisor = Supervisor::new(config, FakeSpawner::cooperative(), Notifier::default());
    let events = supervisor.sender();
    supervisor.start();
    events.send(ClusterEvent::Shutdown).expect("supervisor listening");

    let snapshot = tokio::time::timeout(WAIT, supervisor.run())
        .await
        .expect("run finishes")
        .expect("run succeeds");

    let written = persister.read().expect("state file");
    assert_eq!(written, snapshot);
    assert_eq!(written.cluster_status, ClusterStatus::Stopped);
}

#[tokio::test]
#[serial]
async fn panic_in_event_loop_is_reported_as_fault() {
    let notifier = Notifier::default();
    let mut rx = notifier.subscribe();
    let supervisor_notifier = notifier.clone();
    let mut supervisor =
        Supervisor::new(test_config(1, false, 0), FakeSpawner::panicking(), supervisor_notifier);
    let events = supervisor.sender();
    supervisor.start();
    events.send(ClusterEvent::Shutdown).expect("supervisor listening");

    let err = tokio::time::timeout(WAIT, supervisor.run_guarded())
        .await
        .expect("run finishes")
        .expect_err("event loop panicked");

    assert!(matches!(err, ClusterError::Supervisor(_)));
    assert!(err.to_string().contains("control channel to slot 1 exploded"));
    let fault = wait_for(&mut rx, NotificationKind::Fault).await;
    assert_eq!(
        fault.message,
        "Uncaught exception: control channel to slot 1 exploded"
    );
}
