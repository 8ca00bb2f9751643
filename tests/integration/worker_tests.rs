//! `WorkerContext` bookkeeping and the shared-port listener workers bind.

use std::net::SocketAddr;

use cluster_keeper::models::worker::SlotId;
use cluster_keeper::worker::bind_shared;
use cluster_keeper::WorkerContext;

#[test]
fn context_describes_current_process() {
    let ctx = WorkerContext::new(SlotId(3));

    assert_eq!(ctx.slot(), SlotId(3));
    assert_eq!(ctx.pid(), std::process::id());
    assert!(!ctx.quit_requested());
}

#[test]
fn quit_token_is_shared_between_clones() {
    let ctx = WorkerContext::new(SlotId(1));
    let clone = ctx.clone();

    ctx.quit_token().cancel();

    assert!(clone.quit_requested());
}

#[tokio::test]
async fn ephemeral_bind_succeeds() {
    let listener = bind_shared(SocketAddr::from(([127, 0, 0, 1], 0))).expect("bind");
    assert_ne!(listener.local_addr().expect("addr").port(), 0);
}

#[cfg(unix)]
#[tokio::test]
async fn shared_port_accepts_second_listener() {
    let first = bind_shared(SocketAddr::from(([127, 0, 0, 1], 0))).expect("first bind");
    let addr = first.local_addr().expect("addr");

    let second = bind_shared(addr).expect("second bind on same port");

    assert_eq!(second.local_addr().expect("addr").port(), addr.port());
}
