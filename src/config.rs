//! Cluster configuration parsing and validation.

use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::{ClusterError, Result};

fn default_worker_count() -> usize {
    std::thread::available_parallelism().map_or(1, NonZeroUsize::get)
}

fn default_auto_restart_limit() -> u32 {
    3
}

fn default_state_file() -> PathBuf {
    std::env::temp_dir()
        .join("cluster-keeper")
        .join("state.json")
}

fn default_http_port() -> u16 {
    3000
}

/// Supervisor configuration parsed from `config.toml`.
///
/// Every key is optional. `diagnostics_attached` is never read from the
/// file; it flips to `true` when a diagnostics router is attached.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ClusterConfig {
    /// Number of worker processes to keep in the pool.
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    /// Whether exited workers are replaced.
    #[serde(default)]
    pub auto_restart: bool,
    /// Maximum replacements per slot lineage.
    #[serde(default = "default_auto_restart_limit")]
    pub auto_restart_limit: u32,
    /// Location of the persisted session snapshot.
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,
    /// Port the demo application listens on.
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    /// Grace period after shutdown before live workers are killed; unset
    /// means workers are never forced.
    #[serde(default)]
    pub shutdown_grace_seconds: Option<u64>,
    /// Set once diagnostics routes are registered.
    #[serde(skip)]
    pub diagnostics_attached: bool,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
            auto_restart: false,
            auto_restart_limit: default_auto_restart_limit(),
            state_file: default_state_file(),
            http_port: default_http_port(),
            shutdown_grace_seconds: None,
            diagnostics_attached: false,
        }
    }
}

impl ClusterConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `ClusterError::Config` if the file cannot be read, contains
    /// invalid TOML, or fails validation.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| ClusterError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `ClusterError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Grace period applied after shutdown, if any.
    #[must_use]
    pub fn shutdown_grace(&self) -> Option<Duration> {
        self.shutdown_grace_seconds.map(Duration::from_secs)
    }

    /// Reject configurations the supervisor cannot run.
    ///
    /// # Errors
    ///
    /// Returns `ClusterError::Config` when `worker_count` is zero.
    pub fn validate(&self) -> Result<()> {
        if self.worker_count == 0 {
            return Err(ClusterError::Config(
                "worker_count must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}
