#![forbid(unsafe_code)]

//! Supervisor for a fixed-size pool of worker processes sharing one
//! listening endpoint, with bounded auto-restart, a persisted status
//! snapshot, HTTP diagnostics and cooperative shutdown.

pub mod cluster;
pub mod config;
pub mod diagnostics;
pub mod errors;
pub mod ipc;
pub mod models;
pub mod notify;
pub mod orchestrator;
pub mod persistence;
pub mod worker;

pub use cluster::{Cluster, Role};
pub use config::ClusterConfig;
pub use errors::{ClusterError, Result};
pub use worker::WorkerContext;
