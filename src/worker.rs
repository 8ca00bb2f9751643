//! Worker-role entry point.
//!
//! A worker announces itself with an `online` line on stdout, starts
//! listening on stdin for control messages and then invokes the caller's
//! callback exactly once. Receiving `quit` (or losing the master) cancels
//! the context's quit token; how the callback reacts is up to it.

use std::future::Future;
use std::io::{BufRead, Write};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::net::{TcpListener, TcpSocket};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::ipc::ControlMessage;
use crate::models::worker::SlotId;
use crate::{ClusterError, Result};

const LISTEN_BACKLOG: u32 = 1024;

/// Handle a worker's callback receives to describe itself.
#[derive(Debug, Clone)]
pub struct WorkerContext {
    slot: SlotId,
    pid: u32,
    quit: CancellationToken,
    disconnected: Arc<AtomicBool>,
}

impl WorkerContext {
    /// Context for the worker occupying `slot` in this process.
    #[must_use]
    pub fn new(slot: SlotId) -> Self {
        Self {
            slot,
            pid: std::process::id(),
            quit: CancellationToken::new(),
            disconnected: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Slot this worker occupies.
    #[must_use]
    pub fn slot(&self) -> SlotId {
        self.slot
    }

    /// This process's pid.
    #[must_use]
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Token cancelled when the master asks this worker to quit.
    #[must_use]
    pub fn quit_token(&self) -> CancellationToken {
        self.quit.clone()
    }

    /// Whether a quit request has arrived.
    #[must_use]
    pub fn quit_requested(&self) -> bool {
        self.quit.is_cancelled()
    }

    /// Tell the master this worker is closing its control channel.
    ///
    /// Only the first call writes anything.
    ///
    /// # Errors
    ///
    /// Returns `ClusterError::Ipc` if stdout cannot be written.
    pub fn disconnect(&self) -> Result<()> {
        if self.disconnected.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        send_control(ControlMessage::Disconnect)
    }

    /// Watch stdin for control lines on a detached thread.
    ///
    /// A plain thread is used so a pending stdin read never holds up
    /// runtime shutdown once the callback returns.
    fn spawn_control_listener(&self) -> Result<()> {
        let quit = self.quit.clone();
        std::thread::Builder::new()
            .name("control-listener".into())
            .spawn(move || {
                for line in std::io::stdin().lock().lines() {
                    match line {
                        Ok(line) if ControlMessage::parse(&line) == Some(ControlMessage::Quit) => {
                            info!("quit requested by master");
                            quit.cancel();
                        }
                        Ok(line) => debug!(line = %line, "ignoring unknown control line"),
                        Err(err) => {
                            warn!(%err, "control channel read failed");
                            quit.cancel();
                            return;
                        }
                    }
                }
                info!("control channel closed by master");
                quit.cancel();
            })
            .map(|_| ())
            .map_err(|err| ClusterError::Ipc(format!("failed to start control listener: {err}")))
    }
}

/// Write one control line to stdout.
fn send_control(message: ControlMessage) -> Result<()> {
    let mut out = std::io::stdout().lock();
    out.write_all(message.to_line().as_bytes())
        .and_then(|()| out.flush())
        .map_err(|err| ClusterError::Ipc(format!("failed to send {message}: {err}")))
}

/// Run the worker role for `slot`.
///
/// Without a callback the worker announces itself and returns. A failing
/// callback disconnects the worker before the error is returned.
///
/// # Errors
///
/// Returns `ClusterError::Ipc` if the online announcement fails, or the
/// callback's own error.
pub async fn run_worker<F, Fut>(slot: SlotId, callback: Option<F>) -> Result<()>
where
    F: FnOnce(WorkerContext) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let ctx = WorkerContext::new(slot);
    ctx.spawn_control_listener()?;
    send_control(ControlMessage::Online)?;
    info!(slot = %slot, pid = ctx.pid(), "worker online");

    let Some(callback) = callback else {
        debug!("no worker callback supplied");
        return Ok(());
    };

    let result = callback(ctx.clone()).await;

    if let Err(err) = &result {
        error!(slot = %slot, %err, "worker callback failed");
        if let Err(disconnect_err) = ctx.disconnect() {
            warn!(%disconnect_err, "failed to disconnect after callback failure");
        }
    }
    result
}

/// Bind a listener that other workers can bind to as well.
///
/// On Unix the socket sets `SO_REUSEPORT`, leaving connection distribution
/// between workers to the kernel.
///
/// # Errors
///
/// Returns `ClusterError::Io` if the socket cannot be created or bound.
pub fn bind_shared(addr: SocketAddr) -> Result<TcpListener> {
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    socket.set_reuseaddr(true)?;
    #[cfg(unix)]
    socket.set_reuseport(true)?;
    socket.bind(addr)?;
    Ok(socket.listen(LISTEN_BACKLOG)?)
}
