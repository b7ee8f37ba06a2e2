//! Outcome classification and run-scoped counters.

use std::fmt;

/// Why a worker invocation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Forcibly terminated after exceeding its deadline.
    Timeout,
    /// Worker exited nonzero (`None` when killed by a signal).
    WorkerExit(Option<i32>),
}

/// Why an item was skipped without launching a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    AlreadyAnalyzed,
    FilteredOut,
}

/// Classified result of one scheduled item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Success,
    Skipped(SkipReason),
    Failure(FailureKind),
}

impl fmt::Display for TaskOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskOutcome::Success => f.write_str("success"),
            TaskOutcome::Skipped(SkipReason::AlreadyAnalyzed) => f.write_str("skipped (done)"),
            TaskOutcome::Skipped(SkipReason::FilteredOut) => f.write_str("skipped (filtered)"),
            TaskOutcome::Failure(FailureKind::Timeout) => f.write_str("failed (timeout)"),
            TaskOutcome::Failure(FailureKind::WorkerExit(Some(code))) => {
                write!(f, "failed (exit {code})")
            }
            TaskOutcome::Failure(FailureKind::WorkerExit(None)) => f.write_str("failed (signal)"),
        }
    }
}

/// Process-lifetime counters for one phase. Never persisted across runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunCounters {
    pub success: u64,
    pub failed: u64,
    pub skipped: u64,
    pub total: u64,
}

impl RunCounters {
    pub fn record(&mut self, outcome: &TaskOutcome) {
        match outcome {
            TaskOutcome::Success => self.success += 1,
            TaskOutcome::Skipped(_) => self.skipped += 1,
            TaskOutcome::Failure(_) => self.failed += 1,
        }
    }

    /// Number of items that have been routed to a terminal outcome so far.
    pub fn recorded(&self) -> u64 {
        self.success + self.failed + self.skipped
    }
}

impl fmt::Display for RunCounters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} succeeded, {} failed, {} skipped ({} total)",
            self.success, self.failed, self.skipped, self.total
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_route_each_outcome() {
        let mut counters = RunCounters {
            total: 3,
            ..RunCounters::default()
        };
        counters.record(&TaskOutcome::Success);
        counters.record(&TaskOutcome::Skipped(SkipReason::AlreadyAnalyzed));
        counters.record(&TaskOutcome::Failure(FailureKind::Timeout));

        assert_eq!(counters.success, 1);
        assert_eq!(counters.skipped, 1);
        assert_eq!(counters.failed, 1);
        assert_eq!(counters.recorded(), 3);
    }

    #[test]
    fn outcome_display_is_stable() {
        assert_eq!(TaskOutcome::Success.to_string(), "success");
        assert_eq!(
            TaskOutcome::Failure(FailureKind::WorkerExit(Some(7))).to_string(),
            "failed (exit 7)"
        );
        assert_eq!(
            TaskOutcome::Failure(FailureKind::Timeout).to_string(),
            "failed (timeout)"
        );
    }
}
