//! End-to-end run of the `cluster-keeper` demo binary as a worker.
//!
//! The test process acts as master: it supervises the compiled binary
//! through `ProcessSpawner`, so each child takes the worker role, serves
//! HTTP on a shared port and exits when told to quit.
#![cfg(unix)]

use std::ffi::OsString;

use cluster_keeper::diagnostics::{HEALTHCHECK_BODY, HEALTHCHECK_PATH, STATS_PATH};
use cluster_keeper::models::snapshot::ClusterStatus;
use cluster_keeper::models::worker::WorkerStatus;
use cluster_keeper::notify::{NotificationKind, Notifier};
use cluster_keeper::orchestrator::{ClusterEvent, ProcessSpawner, Supervisor};

use super::test_helpers::{persisted_config, wait_for, WAIT};

async fn free_port() -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral");
    listener.local_addr().expect("local addr").port()
}

async fn get_with_retry(url: &str) -> reqwest::Response {
    let mut last_err = None;
    for _ in 0..50 {
        match reqwest::get(url).await {
            Ok(resp) => return resp,
            Err(err) => last_err = Some(err),
        }
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    }
    panic!("{url} never answered: {last_err:?}");
}

#[tokio::test]
async fn workers_serve_and_drain_on_quit() {
    let temp = tempfile::tempdir().expect("tempdir");
    let port = free_port().await;
    let config = persisted_config(temp.path(), 2);
    let config_path = temp.path().join("config.toml");
    std::fs::write(
        &config_path,
        format!(
            "worker_count = 2\nhttp_port = {port}\nstate_file = '{}'\n",
            config.state_file.display()
        ),
    )
    .expect("write config");

    let spawner = ProcessSpawner::new(
        env!("CARGO_BIN_EXE_cluster-keeper"),
        vec![OsString::from("--config"), config_path.into_os_string()],
    );
    let notifier = Notifier::default();
    let mut rx = notifier.subscribe();
    let mut supervisor = Supervisor::new(config, spawner, notifier);
    let events = supervisor.sender();
    supervisor.start();
    let run = tokio::spawn(supervisor.run());

    wait_for(&mut rx, NotificationKind::Online).await;
    wait_for(&mut rx, NotificationKind::Online).await;

    let base_url = format!("http://127.0.0.1:{port}");
    let hello = get_with_retry(&format!("{base_url}/")).await;
    let body = hello.text().await.expect("hello body");
    assert!(body.starts_with("Process ") && body.ends_with(" says hello!"), "{body}");

    let health = get_with_retry(&format!("{base_url}{HEALTHCHECK_PATH}")).await;
    assert_eq!(health.text().await.expect("health body"), HEALTHCHECK_BODY);

    let stats: serde_json::Value = get_with_retry(&format!("{base_url}{STATS_PATH}"))
        .await
        .json()
        .await
        .expect("stats json");
    assert_eq!(stats["cluster_size"], 2);
    assert_eq!(stats["master_process_id"], std::process::id());
    assert_eq!(stats["workers"][0]["status"], "online");
    assert_eq!(stats["workers"][1]["status"], "online");

    events.send(ClusterEvent::Shutdown).expect("supervisor listening");
    let snapshot = tokio::time::timeout(WAIT, run)
        .await
        .expect("workers drain in time")
        .expect("task joins")
        .expect("run succeeds");

    assert_eq!(snapshot.cluster_status, ClusterStatus::Stopped);
    for worker in &snapshot.workers {
        assert_eq!(worker.status, WorkerStatus::Exited);
        assert_eq!(
            worker.reason.as_deref(),
            Some("The worker died with exit code 0, and signal none")
        );
    }
}
