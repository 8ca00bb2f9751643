//! Worker process spawner.
//!
//! [`WorkerSpawner`] is the seam between the supervisor and the OS process
//! facility. [`ProcessSpawner`] re-executes a program (by default the
//! current binary) with [`WORKER_SLOT_ENV`] set, so the child takes the
//! worker role. Each child gets a monitor task that owns the `Child`:
//!
//! - the first `online` stdout line becomes [`ClusterEvent::Online`],
//! - a `disconnect` line or stdout EOF becomes [`ClusterEvent::Disconnect`],
//! - process exit becomes [`ClusterEvent::Exit`] (after a disconnect, if
//!   one was not already reported),
//! - control messages queued through [`WorkerSpawner::send`] are written to
//!   the child's stdin.

use std::collections::HashMap;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::mpsc;
use tracing::{debug, info, info_span, warn, Instrument};

use super::events::{ClusterEvent, EventSender};
use crate::ipc::{ControlMessage, WORKER_SLOT_ENV};
use crate::models::worker::SlotId;
use crate::{ClusterError, Result};

/// Process facility used by the supervisor.
///
/// Implementations must report every forked worker's lifecycle through the
/// supplied event sender, tagging each event with the worker's pid.
pub trait WorkerSpawner: Send {
    /// Start a worker for `slot` and return its pid.
    ///
    /// # Errors
    ///
    /// Returns `ClusterError::Spawn` if the process cannot be started.
    fn fork(&mut self, slot: SlotId, events: EventSender) -> Result<u32>;

    /// Deliver a control message to the worker in `slot`.
    ///
    /// # Errors
    ///
    /// Returns `ClusterError::NotFound` for an unknown slot or
    /// `ClusterError::Ipc` if the worker's channel is closed.
    fn send(&mut self, slot: SlotId, message: ControlMessage) -> Result<()>;

    /// Forcibly terminate the worker in `slot`.
    ///
    /// # Errors
    ///
    /// Same conditions as [`send`](Self::send).
    fn kill(&mut self, slot: SlotId) -> Result<()>;
}

/// Request routed to a worker's monitor task.
#[derive(Debug, Clone, Copy)]
enum WorkerControl {
    Send(ControlMessage),
    Kill,
}

/// Spawner backed by real OS processes.
#[derive(Debug)]
pub struct ProcessSpawner {
    program: PathBuf,
    args: Vec<OsString>,
    controls: HashMap<SlotId, mpsc::UnboundedSender<WorkerControl>>,
}

impl ProcessSpawner {
    /// Spawner running `program` with `args` for every worker.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>, args: Vec<OsString>) -> Self {
        Self {
            program: program.into(),
            args,
            controls: HashMap::new(),
        }
    }

    /// Spawner re-executing the current binary with the current arguments.
    ///
    /// # Errors
    ///
    /// Returns `ClusterError::Spawn` if the executable path is unavailable.
    pub fn current_exe() -> Result<Self> {
        let program = std::env::current_exe()
            .map_err(|err| ClusterError::Spawn(format!("cannot resolve current exe: {err}")))?;
        Ok(Self::new(program, std::env::args_os().skip(1).collect()))
    }

    fn control(&self, slot: SlotId, control: WorkerControl) -> Result<()> {
        let tx = self
            .controls
            .get(&slot)
            .ok_or_else(|| ClusterError::NotFound(format!("no worker in slot {slot}")))?;
        tx.send(control)
            .map_err(|_| ClusterError::Ipc(format!("worker in slot {slot} is gone")))
    }
}

impl WorkerSpawner for ProcessSpawner {
    fn fork(&mut self, slot: SlotId, events: EventSender) -> Result<u32> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .env(WORKER_SLOT_ENV, slot.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|err| {
            ClusterError::Spawn(format!("failed to spawn {}: {err}", self.program.display()))
        })?;
        let pid = child
            .id()
            .ok_or_else(|| ClusterError::Spawn("worker exited before reporting a pid".into()))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ClusterError::Spawn("failed to capture worker stdin".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ClusterError::Spawn("failed to capture worker stdout".into()))?;

        let (tx, rx) = mpsc::unbounded_channel();
        self.controls.insert(slot, tx);

        tokio::spawn(
            monitor_worker(slot, pid, child, stdin, stdout, rx, events)
                .instrument(info_span!("worker_monitor", slot = %slot, pid)),
        );

        info!(slot = %slot, pid, "worker process spawned");
        Ok(pid)
    }

    fn send(&mut self, slot: SlotId, message: ControlMessage) -> Result<()> {
        self.control(slot, WorkerControl::Send(message))
    }

    fn kill(&mut self, slot: SlotId) -> Result<()> {
        self.control(slot, WorkerControl::Kill)
    }
}

enum Step {
    Line(std::io::Result<Option<String>>),
    Control(Option<WorkerControl>),
    Exited(std::io::Result<ExitStatus>),
}

/// Own one child until it exits, translating its stdio into events.
async fn monitor_worker(
    slot: SlotId,
    pid: u32,
    mut child: Child,
    mut stdin: ChildStdin,
    stdout: ChildStdout,
    mut controls: mpsc::UnboundedReceiver<WorkerControl>,
    events: EventSender,
) {
    let mut lines = BufReader::new(stdout).lines();
    let mut reading = true;
    let mut controls_open = true;
    let mut disconnected = false;

    loop {
        // Buffered stdout is drained before the exit is acted on.
        let step = tokio::select! {
            biased;
            line = lines.next_line(), if reading => Step::Line(line),
            control = controls.recv(), if controls_open => Step::Control(control),
            status = child.wait() => Step::Exited(status),
        };

        match step {
            Step::Line(Ok(Some(line))) => match ControlMessage::parse(&line) {
                Some(ControlMessage::Online) => {
                    let _ = events.send(ClusterEvent::Online { slot, pid });
                }
                Some(ControlMessage::Disconnect) => {
                    report_disconnect(slot, pid, &events, &mut disconnected);
                }
                _ => info!(output = %line, "worker output"),
            },
            Step::Line(Ok(None)) => {
                reading = false;
                report_disconnect(slot, pid, &events, &mut disconnected);
            }
            Step::Line(Err(err)) => {
                warn!(%err, "failed to read worker stdout");
                reading = false;
                report_disconnect(slot, pid, &events, &mut disconnected);
            }
            Step::Control(Some(WorkerControl::Send(message))) => {
                let line = message.to_line();
                let written = match stdin.write_all(line.as_bytes()).await {
                    Ok(()) => stdin.flush().await,
                    Err(err) => Err(err),
                };
                if let Err(err) = written {
                    warn!(%err, %message, "failed to deliver control message");
                }
            }
            Step::Control(Some(WorkerControl::Kill)) => {
                warn!("force-killing worker");
                if let Err(err) = child.start_kill() {
                    warn!(%err, "failed to kill worker");
                }
            }
            Step::Control(None) => controls_open = false,
            Step::Exited(result) => {
                report_disconnect(slot, pid, &events, &mut disconnected);
                let (code, signal) = match result {
                    Ok(status) => (status.code(), exit_signal(status)),
                    Err(err) => {
                        warn!(%err, "error waiting for worker process");
                        (None, None)
                    }
                };
                debug!(?code, ?signal, "worker process exited");
                let _ = events.send(ClusterEvent::Exit {
                    slot,
                    pid,
                    code,
                    signal,
                });
                break;
            }
        }
    }
}

fn report_disconnect(slot: SlotId, pid: u32, events: &EventSender, disconnected: &mut bool) {
    if !*disconnected {
        *disconnected = true;
        let _ = events.send(ClusterEvent::Disconnect { slot, pid });
    }
}

#[cfg(unix)]
fn exit_signal(status: ExitStatus) -> Option<String> {
    use std::os::unix::process::ExitStatusExt;

    status.signal().map(|raw| {
        nix::sys::signal::Signal::try_from(raw)
            .map_or_else(|_| raw.to_string(), |sig| sig.as_str().to_owned())
    })
}

#[cfg(not(unix))]
fn exit_signal(_status: ExitStatus) -> Option<String> {
    None
}
