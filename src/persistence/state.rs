//! Best-effort session snapshot file.
//!
//! The supervisor rewrites the whole file on every lifecycle transition.
//! Each write lands in a temporary file next to the target and is renamed
//! over it, so readers never see a half-written document. Readers always go
//! back to the file rather than to supervisor memory, which lets the
//! diagnostics routes run in worker processes.
//!
//! Writes are synchronous and run inline on the supervisor's event loop,
//! so successive versions of the file follow transition order and the last
//! one on disk is always the latest snapshot. The document is a few hundred
//! bytes.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::models::snapshot::SessionSnapshot;
use crate::{ClusterError, Result};

/// Writer and reader for the snapshot file at a fixed path.
#[derive(Debug, Clone)]
pub struct StatePersister {
    path: PathBuf,
}

impl StatePersister {
    /// Persister targeting `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Target path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the file with `snapshot`, blocking until the rename is done.
    ///
    /// # Errors
    ///
    /// Returns `ClusterError::Persistence` if the directory cannot be
    /// created or the temporary file cannot be written or renamed.
    pub fn write(&self, snapshot: &SessionSnapshot) -> Result<()> {
        let body = serde_json::to_vec(snapshot)
            .map_err(|err| ClusterError::Persistence(format!("failed to serialize: {err}")))?;

        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir).map_err(|err| {
            ClusterError::Persistence(format!("failed to create {}: {err}", dir.display()))
        })?;

        let mut tmp = NamedTempFile::new_in(dir).map_err(|err| {
            ClusterError::Persistence(format!(
                "failed to open temp file in {}: {err}",
                dir.display()
            ))
        })?;
        tmp.write_all(&body)
            .and_then(|()| tmp.flush())
            .map_err(|err| ClusterError::Persistence(format!("failed to write state: {err}")))?;
        tmp.persist(&self.path).map_err(|err| {
            ClusterError::Persistence(format!(
                "failed to replace {}: {}",
                self.path.display(),
                err.error
            ))
        })?;
        Ok(())
    }

    /// Read the raw JSON document.
    ///
    /// # Errors
    ///
    /// Returns `ClusterError::Diagnostics` if the file is missing or is not
    /// valid JSON.
    pub fn read_value(&self) -> Result<serde_json::Value> {
        let raw = fs::read(&self.path).map_err(|err| {
            ClusterError::Diagnostics(format!("cannot read {}: {err}", self.path.display()))
        })?;
        serde_json::from_slice(&raw)
            .map_err(|err| ClusterError::Diagnostics(format!("malformed state file: {err}")))
    }

    /// Read and decode the snapshot.
    ///
    /// # Errors
    ///
    /// Returns `ClusterError::Diagnostics` if the file is missing or does
    /// not hold a snapshot.
    pub fn read(&self) -> Result<SessionSnapshot> {
        serde_json::from_value(self.read_value()?)
            .map_err(|err| ClusterError::Diagnostics(format!("malformed state file: {err}")))
    }
}
