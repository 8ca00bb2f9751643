//! Role-aware entry point tying the supervisor and worker sides together.
//!
//! The same binary runs in both roles. The master forks copies of itself
//! with [`WORKER_SLOT_ENV`] set; those copies take the worker role and run
//! the caller's callback. Configuration and diagnostics attachment happen
//! identically in both roles, so the worker-hosted stats route reads the
//! file the master writes.

use std::future::Future;

use axum::Router;
use tokio::sync::broadcast;
use tracing::info;

use crate::config::ClusterConfig;
use crate::diagnostics;
use crate::ipc::WORKER_SLOT_ENV;
use crate::models::snapshot::SessionSnapshot;
use crate::models::worker::SlotId;
use crate::notify::{Notification, Notifier};
use crate::orchestrator::signals;
use crate::orchestrator::{ProcessSpawner, Supervisor};
use crate::persistence::StatePersister;
use crate::worker::{self, WorkerContext};
use crate::{ClusterError, Result};

/// Which side of the pool this process is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Supervising process.
    Master,
    /// Worker occupying the given slot.
    Worker(SlotId),
}

impl Role {
    /// Determine the role from [`WORKER_SLOT_ENV`].
    ///
    /// # Errors
    ///
    /// Returns `ClusterError::Config` if the variable is set but is not a
    /// slot number.
    pub fn detect() -> Result<Self> {
        match std::env::var(WORKER_SLOT_ENV) {
            Ok(raw) => raw
                .trim()
                .parse::<u32>()
                .map(|n| Self::Worker(SlotId(n)))
                .map_err(|err| {
                    ClusterError::Config(format!("invalid {WORKER_SLOT_ENV} value '{raw}': {err}"))
                }),
            Err(_) => Ok(Self::Master),
        }
    }
}

/// A worker pool: configuration, notifications and optional diagnostics.
#[derive(Debug)]
pub struct Cluster {
    config: ClusterConfig,
    notifier: Notifier,
}

impl Cluster {
    /// Cluster with `config`; nothing starts until [`run`](Self::run).
    #[must_use]
    pub fn new(config: ClusterConfig) -> Self {
        Self {
            config,
            notifier: Notifier::default(),
        }
    }

    /// Effective configuration.
    #[must_use]
    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    /// Receiver for status notifications emitted after this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.notifier.subscribe()
    }

    /// Register the diagnostics routes on `router` and enable snapshot
    /// persistence.
    pub fn attach_diagnostics<S>(&mut self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        self.config.diagnostics_attached = true;
        diagnostics::routes(router, StatePersister::new(&self.config.state_file))
    }

    /// Run whichever role this process has.
    ///
    /// In the master role the callback is ignored and this returns once
    /// every worker has exited for good. In the worker role the callback is
    /// invoked exactly once.
    ///
    /// # Errors
    ///
    /// Returns role detection, spawn setup or worker callback failures.
    pub async fn run<F, Fut>(self, callback: Option<F>) -> Result<()>
    where
        F: FnOnce(WorkerContext) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        match Role::detect()? {
            Role::Master => self.run_master().await.map(|_| ()),
            Role::Worker(slot) => worker::run_worker(slot, callback).await,
        }
    }

    /// Supervise a pool of re-executed copies of the current binary.
    ///
    /// # Errors
    ///
    /// Returns `ClusterError::Spawn` if the current executable cannot be
    /// resolved, or `ClusterError::Supervisor` if the event loop panicked.
    pub async fn run_master(self) -> Result<SessionSnapshot> {
        self.config.validate()?;
        let spawner = ProcessSpawner::current_exe()?;
        let mut supervisor = Supervisor::new(self.config, spawner, self.notifier);

        signals::install_fault_hook(supervisor.sender());
        let listener = signals::spawn_shutdown_listener(supervisor.sender());

        supervisor.start();
        let result = supervisor.run_guarded().await;
        listener.abort();

        if let Ok(snapshot) = &result {
            info!(workers = snapshot.workers.len(), "cluster stopped");
        }
        result
    }
}
