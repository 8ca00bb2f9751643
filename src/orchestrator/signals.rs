//! Process signal and panic wiring for the master role.
//!
//! Both paths only enqueue a [`ClusterEvent`]; the supervisor decides what
//! happens next on its own event loop.

use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::events::{ClusterEvent, EventSender};

/// Spawn a task that turns shutdown signals into [`ClusterEvent::Shutdown`].
///
/// On Unix the trigger is `SIGQUIT`; elsewhere it is Ctrl-C. The task ends
/// once the supervisor's channel closes.
#[must_use]
pub fn spawn_shutdown_listener(events: EventSender) -> JoinHandle<()> {
    tokio::spawn(listen(events))
}

#[cfg(unix)]
async fn listen(events: EventSender) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut quit = match signal(SignalKind::quit()) {
        Ok(stream) => stream,
        Err(err) => {
            warn!(%err, "failed to register SIGQUIT handler, using ctrl-c only");
            listen_ctrl_c(events).await;
            return;
        }
    };

    while quit.recv().await.is_some() {
        info!("SIGQUIT received");
        if events.send(ClusterEvent::Shutdown).is_err() {
            break;
        }
    }
}

#[cfg(not(unix))]
async fn listen(events: EventSender) {
    listen_ctrl_c(events).await;
}

async fn listen_ctrl_c(events: EventSender) {
    while tokio::signal::ctrl_c().await.is_ok() {
        info!("ctrl-c received");
        if events.send(ClusterEvent::Shutdown).is_err() {
            break;
        }
    }
}

/// Forward panics raised anywhere in the master process to the supervisor
/// as [`ClusterEvent::Fault`], then run the previously installed hook.
///
/// The supervisor survives panics on other threads and tasks. A panic in
/// its own event loop ends the loop; [`Supervisor::run_guarded`] reports
/// that one and the event sent here goes unread.
///
/// [`Supervisor::run_guarded`]: super::Supervisor::run_guarded
pub fn install_fault_hook(events: EventSender) {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = events.send(ClusterEvent::Fault {
            message: info.to_string(),
        });
        previous(info);
    }));
}
