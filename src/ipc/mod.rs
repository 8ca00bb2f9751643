//! Master/worker control channel.
//!
//! Each worker's stdin and stdout carry newline-terminated control lines.
//! The master writes `quit`; the worker writes `online` and `disconnect`.
//! Any other stdout line is application output and is forwarded to the
//! master log. Worker logs go to stderr so they never mix with control
//! traffic.

pub mod message;

pub use message::{ControlMessage, WORKER_SLOT_ENV};
