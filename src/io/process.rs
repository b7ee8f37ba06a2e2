//! Subprocess execution with per-item log capture, hard timeouts, and
//! group-wide termination.
//!
//! Workers are opaque and offer no cooperative shutdown, so each one runs in
//! its own process group. On deadline (or interrupt) the whole group is
//! signalled and reaped; graceful shutdown is never assumed.

use std::collections::HashSet;
use std::fs::{self, File};
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::{debug, warn};
use wait_timeout::ChildExt;

/// Terminal state of one worker process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerExit {
    /// Exit code; `None` when terminated by a signal.
    pub code: Option<i32>,
    /// True when the orchestrator killed the process on deadline.
    pub timed_out: bool,
}

impl WorkerExit {
    pub fn success(&self) -> bool {
        !self.timed_out && self.code == Some(0)
    }
}

/// Process groups of currently running workers, shared between the dispatcher
/// and the interrupt handler so an interrupt can terminate every in-flight
/// worker proactively.
#[derive(Debug, Clone, Default)]
pub struct ProcessGroups {
    inner: Arc<Mutex<HashSet<u32>>>,
}

impl ProcessGroups {
    pub fn new() -> Self {
        Self::default()
    }

    fn register(&self, pid: u32) {
        if let Ok(mut groups) = self.inner.lock() {
            groups.insert(pid);
        }
    }

    fn unregister(&self, pid: u32) {
        if let Ok(mut groups) = self.inner.lock() {
            groups.remove(&pid);
        }
    }

    /// Signal every registered group. Safe to call repeatedly; groups that
    /// already exited are ignored.
    pub fn kill_all(&self) {
        let pids: Vec<u32> = match self.inner.lock() {
            Ok(groups) => groups.iter().copied().collect(),
            Err(_) => return,
        };
        for pid in pids {
            kill_group(pid);
        }
    }
}

/// Run a command with combined stdout/stderr redirected to `log_path`,
/// enforcing `timeout` (`None` = unbounded wait).
///
/// The child is placed in its own process group (Unix); if the deadline
/// elapses the whole group is killed and reaped, so worker-spawned
/// grandchildren do not linger.
pub fn run_logged(
    mut cmd: Command,
    log_path: &Path,
    timeout: Option<Duration>,
    groups: &ProcessGroups,
) -> Result<WorkerExit> {
    if let Some(parent) = log_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create log dir {}", parent.display()))?;
    }
    let log = File::create(log_path)
        .with_context(|| format!("create log file {}", log_path.display()))?;
    let log_err = log
        .try_clone()
        .with_context(|| format!("clone log handle {}", log_path.display()))?;

    cmd.stdin(Stdio::null())
        .stdout(Stdio::from(log))
        .stderr(Stdio::from(log_err));
    isolate_process_group(&mut cmd);

    debug!(timeout_secs = timeout.map(|t| t.as_secs()), "spawning worker");
    let started = Instant::now();
    let mut child = cmd.spawn().context("spawn worker")?;
    let pid = child.id();
    groups.register(pid);

    let result = wait_child(&mut child, pid, timeout);
    groups.unregister(pid);
    let exit = result?;
    debug!(
        exit_code = ?exit.code,
        timed_out = exit.timed_out,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "worker finished"
    );
    Ok(exit)
}

fn wait_child(
    child: &mut std::process::Child,
    pid: u32,
    timeout: Option<Duration>,
) -> Result<WorkerExit> {
    let status = match timeout {
        None => child.wait().context("wait for worker")?,
        Some(limit) => match child.wait_timeout(limit).context("wait for worker")? {
            Some(status) => status,
            None => {
                warn!(timeout_secs = limit.as_secs(), "worker timed out, killing group");
                kill_group(pid);
                // Fallback for the direct child if the group signal missed it.
                let _ = child.kill();
                let status = child.wait().context("reap worker after kill")?;
                return Ok(WorkerExit {
                    code: status.code(),
                    timed_out: true,
                });
            }
        },
    };
    Ok(WorkerExit {
        code: status.code(),
        timed_out: false,
    })
}

#[cfg(unix)]
fn isolate_process_group(cmd: &mut Command) {
    use std::os::unix::process::CommandExt;
    cmd.process_group(0);
}

#[cfg(not(unix))]
fn isolate_process_group(_cmd: &mut Command) {}

#[cfg(unix)]
fn kill_group(pid: u32) {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;
    // ESRCH just means the group already exited.
    let _ = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL);
}

#[cfg(not(unix))]
fn kill_group(_pid: u32) {}
