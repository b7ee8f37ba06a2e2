//! Worker invocation adapter.
//!
//! The [`Worker`] trait decouples the dispatcher from the actual worker
//! backend. The real backend appends per-item arguments to a configured
//! command and classifies the subprocess exit; the dry-run backend
//! short-circuits to success without spawning anything. Tests use scripted
//! workers.

use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::instrument;

use crate::core::outcome::{FailureKind, TaskOutcome};
use crate::io::process::{ProcessGroups, run_logged};

/// Parameters for one worker invocation.
#[derive(Debug, Clone)]
pub struct InvokeRequest {
    /// Per-item arguments appended to the worker command. The analysis phase
    /// passes a single opaque instruction string; the file phases pass paths.
    pub args: Vec<String>,
    /// Per-item log artifact receiving combined stdout/stderr.
    pub log_path: PathBuf,
    /// Hard deadline; `None` = unbounded.
    pub timeout: Option<Duration>,
}

/// Abstraction over worker execution backends.
pub trait Worker: Send + Sync {
    fn invoke(&self, request: &InvokeRequest) -> Result<TaskOutcome>;
}

/// Worker that spawns a configured command as an isolated subprocess.
pub struct CommandWorker {
    command: Vec<String>,
    workdir: PathBuf,
    groups: ProcessGroups,
}

impl CommandWorker {
    pub fn new(command: Vec<String>, workdir: impl Into<PathBuf>, groups: ProcessGroups) -> Self {
        Self {
            command,
            workdir: workdir.into(),
            groups,
        }
    }
}

impl Worker for CommandWorker {
    #[instrument(skip_all, fields(log = %request.log_path.display()))]
    fn invoke(&self, request: &InvokeRequest) -> Result<TaskOutcome> {
        let (program, prefix_args) = self
            .command
            .split_first()
            .context("worker command is empty")?;
        let mut cmd = Command::new(program);
        cmd.args(prefix_args)
            .args(&request.args)
            .current_dir(&self.workdir);

        let exit = run_logged(cmd, &request.log_path, request.timeout, &self.groups)?;
        if exit.timed_out {
            return Ok(TaskOutcome::Failure(FailureKind::Timeout));
        }
        if exit.success() {
            return Ok(TaskOutcome::Success);
        }
        Ok(TaskOutcome::Failure(FailureKind::WorkerExit(exit.code)))
    }
}

/// Preview backend: reports success without spawning or logging anything.
pub struct DryRunWorker;

impl Worker for DryRunWorker {
    fn invoke(&self, _request: &InvokeRequest) -> Result<TaskOutcome> {
        Ok(TaskOutcome::Success)
    }
}
