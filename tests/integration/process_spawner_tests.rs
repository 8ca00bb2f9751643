//! Real child processes driven through `ProcessSpawner`.
//!
//! Workers are small `sh` scripts that speak the line protocol.
#![cfg(unix)]

use std::ffi::OsString;

use cluster_keeper::ipc::ControlMessage;
use cluster_keeper::models::worker::SlotId;
use cluster_keeper::orchestrator::events;
use cluster_keeper::orchestrator::{ClusterEvent, ProcessSpawner, WorkerSpawner};
use cluster_keeper::ClusterError;

use super::test_helpers::next_event as next;

fn script(body: &str) -> ProcessSpawner {
    ProcessSpawner::new("sh", vec![OsString::from("-c"), OsString::from(body)])
}

#[tokio::test]
async fn quit_round_trip_ends_in_clean_exit() {
    let (tx, mut rx) = events::channel();
    let mut spawner = script(r#"echo online; read msg; [ "$msg" = quit ] && exit 0; exit 9"#);

    let pid = spawner.fork(SlotId(1), tx).expect("fork");
    assert_eq!(next(&mut rx).await, ClusterEvent::Online { slot: SlotId(1), pid });

    spawner.send(SlotId(1), ControlMessage::Quit).expect("send quit");

    assert_eq!(next(&mut rx).await, ClusterEvent::Disconnect { slot: SlotId(1), pid });
    assert_eq!(
        next(&mut rx).await,
        ClusterEvent::Exit {
            slot: SlotId(1),
            pid,
            code: Some(0),
            signal: None
        }
    );
}

#[tokio::test]
async fn worker_sees_its_slot() {
    let (tx, mut rx) = events::channel();
    let mut spawner = script(r#"[ "$CLUSTER_KEEPER_WORKER_SLOT" = 4 ] && echo online; exit 0"#);

    let pid = spawner.fork(SlotId(4), tx).expect("fork");

    assert_eq!(next(&mut rx).await, ClusterEvent::Online { slot: SlotId(4), pid });
}

#[tokio::test]
async fn explicit_disconnect_is_reported_once() {
    let (tx, mut rx) = events::channel();
    let mut spawner = script("echo online; echo disconnect; exit 3");

    let pid = spawner.fork(SlotId(2), tx).expect("fork");

    assert_eq!(next(&mut rx).await, ClusterEvent::Online { slot: SlotId(2), pid });
    assert_eq!(next(&mut rx).await, ClusterEvent::Disconnect { slot: SlotId(2), pid });
    assert_eq!(
        next(&mut rx).await,
        ClusterEvent::Exit {
            slot: SlotId(2),
            pid,
            code: Some(3),
            signal: None
        }
    );
}

#[tokio::test]
async fn application_output_is_not_an_event() {
    let (tx, mut rx) = events::channel();
    let mut spawner = script("echo listening on 3000; echo online; exit 0");

    let pid = spawner.fork(SlotId(1), tx).expect("fork");

    assert_eq!(next(&mut rx).await, ClusterEvent::Online { slot: SlotId(1), pid });
}

#[tokio::test]
async fn kill_reports_signal() {
    let (tx, mut rx) = events::channel();
    let mut spawner = script("echo online; exec sleep 30");

    let pid = spawner.fork(SlotId(1), tx).expect("fork");
    assert_eq!(next(&mut rx).await, ClusterEvent::Online { slot: SlotId(1), pid });

    spawner.kill(SlotId(1)).expect("kill");

    assert_eq!(next(&mut rx).await, ClusterEvent::Disconnect { slot: SlotId(1), pid });
    assert_eq!(
        next(&mut rx).await,
        ClusterEvent::Exit {
            slot: SlotId(1),
            pid,
            code: None,
            signal: Some("SIGKILL".into())
        }
    );
}

#[tokio::test]
async fn missing_program_is_spawn_error() {
    let (tx, _rx) = events::channel();
    let mut spawner = ProcessSpawner::new("/nonexistent/cluster-keeper-worker", Vec::new());

    let err = spawner.fork(SlotId(1), tx).expect_err("spawn fails");
    assert!(matches!(err, ClusterError::Spawn(_)));
}

#[tokio::test]
async fn unknown_slot_is_not_found() {
    let mut spawner = script("exit 0");

    let err = spawner
        .send(SlotId(7), ControlMessage::Quit)
        .expect_err("no such slot");
    assert!(matches!(err, ClusterError::NotFound(_)));
}
