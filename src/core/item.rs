//! Work item model: identity, complexity tiers, default timeouts.

use std::fmt;

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};

/// Complexity tier of a work item. Drives queue ordering (`low < medium <
/// high`) and the default per-item timeout.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Low,
    #[default]
    Medium,
    High,
}

impl Complexity {
    /// Default worker timeout for this tier, in seconds.
    pub fn default_timeout_secs(self) -> u64 {
        match self {
            Complexity::Low => 300,
            Complexity::Medium => 600,
            Complexity::High => 900,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Complexity::Low => "low",
            Complexity::Medium => "medium",
            Complexity::High => "high",
        }
    }

    pub fn parse(raw: &str) -> Result<Self> {
        match raw {
            "low" => Ok(Complexity::Low),
            "medium" => Ok(Complexity::Medium),
            "high" => Ok(Complexity::High),
            other => Err(anyhow!("unknown complexity '{other}'")),
        }
    }
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a work item: `(id, parent_id)`. A bare top-level item has
/// `parent_id = None`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ItemKey {
    pub id: String,
    pub parent_id: Option<String>,
}

impl ItemKey {
    pub fn top_level(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            parent_id: None,
        }
    }

    pub fn child(parent: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            parent_id: Some(parent.into()),
        }
    }

    pub fn is_child(&self) -> bool {
        self.parent_id.is_some()
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.parent_id {
            Some(parent) => write!(f, "{parent}/{}", self.id),
            None => f.write_str(&self.id),
        }
    }
}

/// One schedulable unit derived from the module document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub key: ItemKey,
    pub complexity: Complexity,
    pub analyzed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complexity_orders_low_medium_high() {
        assert!(Complexity::Low < Complexity::Medium);
        assert!(Complexity::Medium < Complexity::High);
    }

    #[test]
    fn complexity_defaults_to_medium() {
        assert_eq!(Complexity::default(), Complexity::Medium);
    }

    #[test]
    fn default_timeouts_follow_tier() {
        assert_eq!(Complexity::Low.default_timeout_secs(), 300);
        assert_eq!(Complexity::Medium.default_timeout_secs(), 600);
        assert_eq!(Complexity::High.default_timeout_secs(), 900);
    }

    #[test]
    fn parse_rejects_unknown_tier() {
        assert!(Complexity::parse("severe").is_err());
        assert_eq!(Complexity::parse("high").expect("parse"), Complexity::High);
    }

    #[test]
    fn key_display_uses_parent_slash_id() {
        assert_eq!(ItemKey::top_level("Payroll").to_string(), "Payroll");
        assert_eq!(
            ItemKey::child("Employee", "Profile").to_string(),
            "Employee/Profile"
        );
    }
}
