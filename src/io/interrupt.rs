//! Interrupt delivery: Ctrl-C sets a shared flag and kills in-flight workers.
//!
//! Workers run in their own process groups, so the terminal's SIGINT never
//! reaches them; the handler must terminate them explicitly. The dispatcher
//! observes the flag, stops launching, and drains what remains.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use tracing::warn;

use crate::io::process::ProcessGroups;

/// Shared cancellation flag, cloneable across threads.
#[derive(Debug, Clone, Default)]
pub struct InterruptFlag {
    inner: Arc<AtomicBool>,
}

impl InterruptFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        self.inner.store(true, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.inner.load(Ordering::SeqCst)
    }
}

/// Install the process-wide Ctrl-C handler. Call once, from `main`.
pub fn install_handler(flag: InterruptFlag, groups: ProcessGroups) -> Result<()> {
    ctrlc::set_handler(move || {
        warn!("interrupt received, terminating in-flight workers");
        flag.set();
        groups.kill_all();
    })
    .context("install interrupt handler")
}
