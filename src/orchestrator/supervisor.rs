//! Worker pool supervisor.
//!
//! The supervisor owns the [`WorkerRegistry`] and is its only writer. It
//! consumes [`ClusterEvent`]s one at a time from a single channel, so no
//! registry access is ever concurrent. Events raised while another event is
//! being handled (a failed fork reported as an exit) go through an internal
//! FIFO and are handled before the next channel event.
//!
//! ## Transitions
//! ```text
//! fork ──► Spawning ──online──► Online ──disconnect──► Disconnected
//!              │                   │                        │
//!              └───────────────────┴──────── exit ──────────┘
//!                                             │
//!                        RestartPolicy::decide ├─ replace ─► fork (same slot, count + 1)
//!                                             └─ keep ────► Exited
//! ```
//!
//! Every transition rebuilds the snapshot from the whole registry and, when
//! diagnostics are attached, rewrites the state file.

use std::any::Any;
use std::collections::VecDeque;

use tokio::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};

use super::events::{self, ClusterEvent, EventReceiver, EventSender};
use super::policy::RestartPolicy;
use super::registry::WorkerRegistry;
use super::spawner::WorkerSpawner;
use crate::config::ClusterConfig;
use crate::ipc::ControlMessage;
use crate::models::snapshot::{ClusterStatus, SessionSnapshot};
use crate::models::worker::{exit_code_label, SlotId, WorkerHandle, WorkerStatus};
use crate::notify::{NotificationKind, Notifier};
use crate::persistence::StatePersister;
use crate::{ClusterError, Result};

/// Exit code recorded when a worker could not be forked at all.
pub const SPAWN_FAILURE_CODE: i32 = 1;

/// Event-driven owner of the worker pool.
pub struct Supervisor<S: WorkerSpawner> {
    config: ClusterConfig,
    spawner: S,
    registry: WorkerRegistry,
    persister: Option<StatePersister>,
    notifier: Notifier,
    status: ClusterStatus,
    master_pid: u32,
    events_tx: EventSender,
    events_rx: Option<EventReceiver>,
    pending: VecDeque<ClusterEvent>,
    shutdown_deadline: Option<Instant>,
}

enum Next {
    Event(Option<ClusterEvent>),
    GraceElapsed,
}

impl<S: WorkerSpawner> Supervisor<S> {
    /// Build a supervisor; nothing is forked until [`start`](Self::start).
    ///
    /// The state file is only written when `config.diagnostics_attached`
    /// is set.
    #[must_use]
    pub fn new(config: ClusterConfig, spawner: S, notifier: Notifier) -> Self {
        let (events_tx, events_rx) = events::channel();
        let persister = config
            .diagnostics_attached
            .then(|| StatePersister::new(&config.state_file));
        Self {
            config,
            spawner,
            registry: WorkerRegistry::new(),
            persister,
            notifier,
            status: ClusterStatus::Running,
            master_pid: std::process::id(),
            events_tx,
            events_rx: Some(events_rx),
            pending: VecDeque::new(),
            shutdown_deadline: None,
        }
    }

    /// Sender for feeding events into this supervisor.
    #[must_use]
    pub fn sender(&self) -> EventSender {
        self.events_tx.clone()
    }

    /// Current registry contents.
    #[must_use]
    pub fn registry(&self) -> &WorkerRegistry {
        &self.registry
    }

    /// Effective configuration; `auto_restart` reads `false` after shutdown.
    #[must_use]
    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    /// Current cluster status.
    #[must_use]
    pub fn status(&self) -> ClusterStatus {
        self.status
    }

    /// Spawner in use.
    #[must_use]
    pub fn spawner(&self) -> &S {
        &self.spawner
    }

    /// Render the registry at this instant.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot::capture(
            self.config.worker_count,
            self.master_pid,
            self.status,
            &self.registry,
        )
    }

    /// Fork the configured number of workers into slots `1..=worker_count`.
    pub fn start(&mut self) {
        self.notifier.emit(
            NotificationKind::Startup,
            format!(
                "Master started on pid {}, forking {} processes",
                self.master_pid, self.config.worker_count
            ),
        );
        for index in 1..=self.config.worker_count {
            let slot = SlotId(u32::try_from(index).unwrap_or(u32::MAX));
            self.fork_slot(slot, 0);
        }
        self.persist();
        self.drain_pending();
    }

    /// Handle one event plus anything it enqueues.
    pub fn handle(&mut self, event: ClusterEvent) {
        self.pending.push_back(event);
        self.drain_pending();
    }

    /// Consume events until the cluster stops, returning the final snapshot.
    ///
    /// # Errors
    ///
    /// Returns `ClusterError::Config` if called twice on the same supervisor.
    pub async fn run(mut self) -> Result<SessionSnapshot> {
        let mut rx = self
            .events_rx
            .take()
            .ok_or_else(|| ClusterError::Config("supervisor is already running".into()))?;
        let span = info_span!("supervisor", master_pid = self.master_pid);

        async move {
            while self.status != ClusterStatus::Stopped {
                let next = match self.shutdown_deadline {
                    Some(deadline) => tokio::select! {
                        event = rx.recv() => Next::Event(event),
                        () = tokio::time::sleep_until(deadline) => Next::GraceElapsed,
                    },
                    None => Next::Event(rx.recv().await),
                };
                match next {
                    Next::Event(Some(event)) => self.handle(event),
                    Next::Event(None) => break,
                    Next::GraceElapsed => self.force_stop(),
                }
            }
            info!(status = ?self.status, "supervisor finished");
            Ok(self.snapshot())
        }
        .instrument(span)
        .await
    }

    /// Run the event loop on its own task.
    ///
    /// A panic inside the loop is announced as a fault notification and
    /// returned as an error instead of unwinding into the caller.
    ///
    /// # Errors
    ///
    /// Returns `ClusterError::Supervisor` if the loop panicked or its task
    /// was cancelled, otherwise whatever [`run`](Self::run) returns.
    pub async fn run_guarded(self) -> Result<SessionSnapshot>
    where
        S: 'static,
    {
        let notifier = self.notifier.clone();
        match tokio::spawn(self.run()).await {
            Ok(result) => result,
            Err(err) if err.is_panic() => {
                let message = panic_message(err.into_panic().as_ref());
                notifier.emit(
                    NotificationKind::Fault,
                    format!("Uncaught exception: {message}"),
                );
                Err(ClusterError::Supervisor(format!(
                    "event loop panicked: {message}"
                )))
            }
            Err(err) => Err(ClusterError::Supervisor(format!(
                "event loop task failed: {err}"
            ))),
        }
    }

    /// Stop restarting workers and ask every live worker to quit.
    ///
    /// Idempotent: only the first call has any effect.
    pub fn shutdown(&mut self) {
        if self.status != ClusterStatus::Running {
            debug!(status = ?self.status, "shutdown already in progress");
            return;
        }
        self.config.auto_restart = false;
        self.status = ClusterStatus::Draining;
        self.notifier.emit(
            NotificationKind::Shutdown,
            "QUIT received, will exit once all workers have finished current requests",
        );

        let live: Vec<SlotId> = self.registry.live().map(|h| h.slot).collect();
        for slot in live {
            if let Err(err) = self.spawner.send(slot, ControlMessage::Quit) {
                warn!(slot = %slot, %err, "failed to send quit to worker");
            }
        }

        if let Some(grace) = self.config.shutdown_grace() {
            self.shutdown_deadline = Some(Instant::now() + grace);
        }
        self.persist();
        self.check_stopped();
    }

    /// Kill every worker still live after the shutdown grace period.
    pub fn force_stop(&mut self) {
        self.shutdown_deadline = None;
        let live: Vec<SlotId> = self.registry.live().map(|h| h.slot).collect();
        if !live.is_empty() {
            warn!(count = live.len(), "grace period elapsed, killing remaining workers");
        }
        for slot in live {
            if let Err(err) = self.spawner.kill(slot) {
                warn!(slot = %slot, %err, "failed to kill worker");
            }
        }
    }

    fn drain_pending(&mut self) {
        while let Some(event) = self.pending.pop_front() {
            self.dispatch(event);
        }
    }

    fn dispatch(&mut self, event: ClusterEvent) {
        match event {
            ClusterEvent::Online { slot, pid } => self.on_online(slot, pid),
            ClusterEvent::Disconnect { slot, pid } => self.on_disconnect(slot, pid),
            ClusterEvent::Exit {
                slot,
                pid,
                code,
                signal,
            } => self.on_exit(slot, pid, code, signal.as_deref()),
            ClusterEvent::Fault { message } => self.on_fault(&message),
            ClusterEvent::Shutdown => self.shutdown(),
        }
    }

    /// Whether `pid` is the live occupant of `slot`.
    fn is_current(&self, slot: SlotId, pid: u32) -> bool {
        self.registry
            .get(slot)
            .is_some_and(|h| h.pid == pid && h.status.is_live())
    }

    fn fork_slot(&mut self, slot: SlotId, restart_count: u32) {
        self.notifier.emit(
            NotificationKind::Fork,
            format!("Forking a new worker for slot {slot}...!"),
        );
        match self.spawner.fork(slot, self.events_tx.clone()) {
            Ok(pid) => {
                self.registry
                    .insert(WorkerHandle::spawned(slot, pid, restart_count));
            }
            Err(err) => {
                warn!(slot = %slot, %err, "fork failed, treating as exit");
                self.registry
                    .insert(WorkerHandle::spawned(slot, 0, restart_count));
                self.pending.push_back(ClusterEvent::Exit {
                    slot,
                    pid: 0,
                    code: Some(SPAWN_FAILURE_CODE),
                    signal: None,
                });
            }
        }
    }

    fn on_online(&mut self, slot: SlotId, pid: u32) {
        if !self.is_current(slot, pid) {
            debug!(slot = %slot, pid, "ignoring online from stale worker");
            return;
        }
        self.registry.update(slot, |h| h.status = WorkerStatus::Online);
        self.notifier
            .emit(NotificationKind::Online, format!("Worker {pid} is online"));
        self.persist();
    }

    fn on_disconnect(&mut self, slot: SlotId, pid: u32) {
        if !self.is_current(slot, pid) {
            debug!(slot = %slot, pid, "ignoring disconnect from stale worker");
            return;
        }
        self.registry
            .update(slot, |h| h.status = WorkerStatus::Disconnected);
        self.notifier.emit(
            NotificationKind::Disconnect,
            format!("Worker {slot} with PID {pid} disconnected."),
        );
        self.persist();
    }

    fn on_exit(&mut self, slot: SlotId, pid: u32, code: Option<i32>, signal: Option<&str>) {
        if !self.is_current(slot, pid) {
            debug!(slot = %slot, pid, "ignoring exit from stale worker");
            return;
        }
        self.registry.update(slot, |h| h.mark_exited(code, signal));
        let Some(handle) = self.registry.get(slot).cloned() else {
            return;
        };

        let decision = RestartPolicy::decide(&handle, &self.config);
        let cause = signal.map_or_else(
            || format!("exit code {}", exit_code_label(code)),
            ToOwned::to_owned,
        );
        let note = if decision.replace { ", Restarting...!" } else { "" };
        self.notifier.emit(
            NotificationKind::Exit,
            format!("Worker {slot} died with {cause}{note}"),
        );
        self.persist();

        if decision.replace {
            self.fork_slot(slot, decision.next_restart_count);
            self.persist();
            return;
        }

        let message = if self.config.auto_restart {
            format!("Maximum restart limit reached for worker {slot}")
        } else {
            format!("Auto-restart is off, worker {slot} will not be replaced")
        };
        self.notifier.emit(NotificationKind::Exhausted, message);
        self.check_stopped();
    }

    fn on_fault(&mut self, message: &str) {
        self.notifier.emit(
            NotificationKind::Fault,
            format!("Uncaught exception: {message}"),
        );
        // The master has no current worker to disconnect.
        warn!("fault raised in master role; no worker targeted");
    }

    fn check_stopped(&mut self) {
        if self.status == ClusterStatus::Stopped || self.registry.live().next().is_some() {
            return;
        }
        self.status = ClusterStatus::Stopped;
        self.shutdown_deadline = None;
        self.notifier.emit(
            NotificationKind::Stopped,
            "All workers have exited, cluster stopped",
        );
        self.persist();
    }

    /// Write the current snapshot before the next event is handled.
    fn persist(&self) {
        let Some(persister) = &self.persister else {
            return;
        };
        if let Err(err) = persister.write(&self.snapshot()) {
            self.notifier.emit(
                NotificationKind::PersistenceFailure,
                format!("failed to write cluster state: {err}"),
            );
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|msg| (*msg).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_owned())
}
