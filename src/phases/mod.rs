//! Phase parameterizations of the generic scheduler.

pub mod analysis;
pub mod conversion;
pub mod validation;

use std::time::Duration;

use crate::core::item::Complexity;
use crate::io::config::TimeoutConfig;

/// Per-complexity timeout table after applying any CLI override.
///
/// `--timeout SECONDS` replaces all three tiers; `--no-timeout` sets them to
/// zero. A zero entry means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutTable {
    low_secs: u64,
    medium_secs: u64,
    high_secs: u64,
}

impl TimeoutTable {
    pub fn new(cfg: &TimeoutConfig, override_secs: Option<u64>) -> Self {
        match override_secs {
            Some(secs) => Self {
                low_secs: secs,
                medium_secs: secs,
                high_secs: secs,
            },
            None => Self {
                low_secs: cfg.low_secs,
                medium_secs: cfg.medium_secs,
                high_secs: cfg.high_secs,
            },
        }
    }

    pub fn for_complexity(&self, complexity: Complexity) -> Option<Duration> {
        let secs = match complexity {
            Complexity::Low => self.low_secs,
            Complexity::Medium => self.medium_secs,
            Complexity::High => self.high_secs,
        };
        (secs > 0).then(|| Duration::from_secs(secs))
    }
}
