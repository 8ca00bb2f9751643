//! Error types shared across the crate.

use std::fmt::{Display, Formatter};

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Shared crate result type.
pub type Result<T> = std::result::Result<T, ClusterError>;

/// Error enumeration covering every supervisor and worker failure mode.
#[derive(Debug)]
pub enum ClusterError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// Worker process could not be forked.
    Spawn(String),
    /// Control channel failure between master and worker.
    Ipc(String),
    /// State file could not be written or serialized.
    Persistence(String),
    /// Diagnostics endpoint could not read or parse the state file.
    Diagnostics(String),
    /// Requested slot or entity does not exist.
    NotFound(String),
    /// File-system or I/O operation failure.
    Io(String),
    /// Worker callback reported a failure.
    Worker(String),
    /// Supervisor event loop ended abnormally.
    Supervisor(String),
}

impl Display for ClusterError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Spawn(msg) => write!(f, "spawn: {msg}"),
            Self::Ipc(msg) => write!(f, "ipc: {msg}"),
            Self::Persistence(msg) => write!(f, "persistence: {msg}"),
            Self::Diagnostics(msg) => write!(f, "diagnostics: {msg}"),
            Self::NotFound(msg) => write!(f, "not found: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
            Self::Worker(msg) => write!(f, "worker: {msg}"),
            Self::Supervisor(msg) => write!(f, "supervisor: {msg}"),
        }
    }
}

impl std::error::Error for ClusterError {}

impl From<toml::de::Error> for ClusterError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<std::io::Error> for ClusterError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for ClusterError {
    fn from(err: serde_json::Error) -> Self {
        Self::Persistence(format!("invalid state json: {err}"))
    }
}

impl IntoResponse for ClusterError {
    fn into_response(self) -> Response {
        (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
    }
}
