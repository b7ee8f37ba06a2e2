//! Run-wide product log at `.modrun/run.log`.
//!
//! Distinct from tracing: tracing is dev diagnostics on stderr controlled by
//! `RUST_LOG`; the run log is an always-written artifact, one timestamped
//! line per dispatch event, appended across runs.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct RunLog {
    path: PathBuf,
}

impl RunLog {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create run log dir {}", parent.display()))?;
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one timestamped line. Logging failures are reported but never
    /// abort the run.
    pub fn line(&self, message: &str) {
        let stamped = format!("{} {}\n", Utc::now().to_rfc3339(), message);
        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut file| file.write_all(stamped.as_bytes()));
        if let Err(err) = result {
            warn!(err = %err, path = %self.path.display(), "failed to append run log");
        }
    }
}
