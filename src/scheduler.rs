//! Generic bounded-concurrency dispatcher.
//!
//! One scheduler serves all three phases: a [`Phase`] supplies the item
//! source, the skip/launch decision, the worker invocation, and the outcome
//! recording. The dispatcher owns ordering and slot accounting: launches
//! follow queue order, at most `parallel` workers run at once, and every item
//! is routed to exactly one recorded outcome. Completion order is
//! unconstrained; recording happens only on the dispatcher thread.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::core::outcome::{FailureKind, RunCounters, SkipReason, TaskOutcome};
use crate::io::interrupt::InterruptFlag;
use crate::io::process::ProcessGroups;
use crate::io::run_log::RunLog;

/// Dispatcher knobs resolved from config and CLI flags.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Concurrency limit; `1` runs fully synchronous without worker threads.
    pub parallel: usize,
    /// Optional throttle between consecutive launches.
    pub launch_delay: Option<Duration>,
    /// Slot-wait poll interval.
    pub poll_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            parallel: 1,
            launch_delay: None,
            poll_interval: Duration::from_millis(100),
        }
    }
}

/// Pre-launch decision for one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Launch,
    Skip(SkipReason),
}

/// One parameterization of the scheduler (analysis, validation, conversion).
///
/// `invoke` runs on a worker thread when `parallel > 1`; `build_items`,
/// `classify`, and `record` always run on the dispatcher thread.
pub trait Phase: Send + Sync + 'static {
    type Item: Clone + Send + Sync + 'static;

    fn name(&self) -> &'static str;

    /// Human-readable item label for logs and summaries.
    fn label(&self, item: &Self::Item) -> String;

    /// Ordered work list; the dispatcher launches in exactly this order.
    fn build_items(&self) -> Result<Vec<Self::Item>>;

    fn classify(&self, item: &Self::Item) -> Disposition;

    fn invoke(&self, item: &Self::Item) -> Result<TaskOutcome>;

    fn record(&self, item: &Self::Item, outcome: &TaskOutcome) -> Result<()>;
}

/// Result of dispatching one phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseSummary {
    pub name: &'static str,
    pub counters: RunCounters,
    pub interrupted: bool,
}

struct ActiveWorker<I> {
    item: I,
    handle: JoinHandle<TaskOutcome>,
}

/// Dispatch every item of `phase` under the configured concurrency bound.
///
/// Per-item failures are recorded and never abort siblings. An interrupt
/// stops further launches, terminates the tracked process groups, drains the
/// active set, and still returns the counters accumulated so far.
pub fn run_phase<P: Phase>(
    phase: Arc<P>,
    config: &SchedulerConfig,
    interrupt: &InterruptFlag,
    groups: &ProcessGroups,
    run_log: &RunLog,
) -> Result<PhaseSummary> {
    let items = phase.build_items()?;
    let mut counters = RunCounters {
        total: items.len() as u64,
        ..RunCounters::default()
    };
    let mut active: Vec<ActiveWorker<P::Item>> = Vec::new();
    let mut interrupted = false;

    debug!(
        phase = phase.name(),
        items = items.len(),
        parallel = config.parallel,
        "dispatching"
    );
    run_log.line(&format!(
        "[{}] dispatching {} items (parallel {})",
        phase.name(),
        items.len(),
        config.parallel
    ));

    for item in items {
        if interrupt.is_set() {
            interrupted = true;
            break;
        }

        if let Disposition::Skip(reason) = phase.classify(&item) {
            settle(
                phase.as_ref(),
                run_log,
                &mut counters,
                &item,
                &TaskOutcome::Skipped(reason),
            )?;
            continue;
        }

        if config.parallel <= 1 {
            let outcome = invoke_outcome(phase.as_ref(), &item);
            settle(phase.as_ref(), run_log, &mut counters, &item, &outcome)?;
        } else {
            while active.len() >= config.parallel && !interrupt.is_set() {
                reap_finished(phase.as_ref(), run_log, &mut counters, &mut active)?;
                if active.len() >= config.parallel {
                    thread::sleep(config.poll_interval);
                }
            }
            if interrupt.is_set() {
                interrupted = true;
                break;
            }
            let worker_phase = Arc::clone(&phase);
            let worker_item = item.clone();
            let handle =
                thread::spawn(move || invoke_outcome(worker_phase.as_ref(), &worker_item));
            active.push(ActiveWorker { item, handle });
        }

        if let Some(delay) = config.launch_delay
            && !interrupt.is_set()
        {
            thread::sleep(delay);
        }
    }

    // Drain: reap everything still in flight, killing it first on interrupt.
    while !active.is_empty() {
        if interrupt.is_set() {
            interrupted = true;
            groups.kill_all();
        }
        reap_finished(phase.as_ref(), run_log, &mut counters, &mut active)?;
        if !active.is_empty() {
            thread::sleep(config.poll_interval);
        }
    }
    if interrupt.is_set() {
        interrupted = true;
    }

    run_log.line(&format!("[{}] {}", phase.name(), counters));
    Ok(PhaseSummary {
        name: phase.name(),
        counters,
        interrupted,
    })
}

fn invoke_outcome<P: Phase>(phase: &P, item: &P::Item) -> TaskOutcome {
    match phase.invoke(item) {
        Ok(outcome) => outcome,
        Err(err) => {
            warn!(
                phase = phase.name(),
                item = %phase.label(item),
                err = format!("{err:#}"),
                "worker invocation failed"
            );
            TaskOutcome::Failure(FailureKind::WorkerExit(None))
        }
    }
}

fn reap_finished<P: Phase>(
    phase: &P,
    run_log: &RunLog,
    counters: &mut RunCounters,
    active: &mut Vec<ActiveWorker<P::Item>>,
) -> Result<()> {
    let mut idx = 0;
    while idx < active.len() {
        if !active[idx].handle.is_finished() {
            idx += 1;
            continue;
        }
        let worker = active.swap_remove(idx);
        let outcome = match worker.handle.join() {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(phase = phase.name(), "worker thread panicked");
                TaskOutcome::Failure(FailureKind::WorkerExit(None))
            }
        };
        settle(phase, run_log, counters, &worker.item, &outcome)?;
    }
    Ok(())
}

fn settle<P: Phase>(
    phase: &P,
    run_log: &RunLog,
    counters: &mut RunCounters,
    item: &P::Item,
    outcome: &TaskOutcome,
) -> Result<()> {
    phase
        .record(item, outcome)
        .with_context(|| format!("record outcome for {}", phase.label(item)))?;
    counters.record(outcome);
    run_log.line(&format!(
        "[{}] {}: {}",
        phase.name(),
        phase.label(item),
        outcome
    ));
    Ok(())
}
