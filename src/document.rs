//! Module document model: the persisted completion record.
//!
//! The document is a JSON array of top-level module records, each optionally
//! owning one level of sub-module records. `(id, parent_id)` identifies an
//! item; `analyzed` only moves false→true during normal operation (an explicit
//! reset is the sole true→false transition).

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::item::{Complexity, ItemKey, WorkItem};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SubModuleRecord {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complexity: Option<Complexity>,
    #[serde(default)]
    pub analyzed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ModuleRecord {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complexity: Option<Complexity>,
    #[serde(default)]
    pub analyzed: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sub_modules: Vec<SubModuleRecord>,
}

/// Ordered collection of top-level module records (serialized as a JSON array).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Document {
    pub modules: Vec<ModuleRecord>,
}

impl Document {
    /// Flatten to work items in document order: each top-level module followed
    /// by its sub-modules as listed. This order defines filter precedence.
    pub fn work_items(&self) -> Vec<WorkItem> {
        let mut items = Vec::new();
        for module in &self.modules {
            items.push(WorkItem {
                key: ItemKey::top_level(&module.name),
                complexity: module.complexity.unwrap_or_default(),
                analyzed: module.analyzed,
            });
            for sub in &module.sub_modules {
                items.push(WorkItem {
                    key: ItemKey::child(&module.name, &sub.name),
                    complexity: sub.complexity.unwrap_or_default(),
                    analyzed: sub.analyzed,
                });
            }
        }
        items
    }

    pub fn find(&self, key: &ItemKey) -> Option<WorkItem> {
        self.work_items().into_iter().find(|item| item.key == *key)
    }

    /// Apply `mutate` to the `analyzed` flag of the matching item. Returns
    /// false when no item matches.
    pub fn with_analyzed_mut<F: FnOnce(&mut bool)>(&mut self, key: &ItemKey, mutate: F) -> bool {
        match &key.parent_id {
            None => {
                if let Some(module) = self.modules.iter_mut().find(|m| m.name == key.id) {
                    mutate(&mut module.analyzed);
                    return true;
                }
                false
            }
            Some(parent) => {
                let Some(module) = self.modules.iter_mut().find(|m| m.name == *parent) else {
                    return false;
                };
                if let Some(sub) = module.sub_modules.iter_mut().find(|s| s.name == key.id) {
                    mutate(&mut sub.analyzed);
                    return true;
                }
                false
            }
        }
    }

    /// Clear every `analyzed` flag. Only reachable via the explicit reset.
    pub fn reset_analyzed(&mut self) {
        for module in &mut self.modules {
            module.analyzed = false;
            for sub in &mut module.sub_modules {
                sub.analyzed = false;
            }
        }
    }
}

/// Module and sub-module names become item keys, log file names, and
/// `id|parentId|complexity` retry records, so the separators are reserved.
pub fn valid_name(name: &str) -> bool {
    static NAME_RE: OnceLock<Regex> = OnceLock::new();
    let re = NAME_RE.get_or_init(|| Regex::new(r"^[^|/\s][^|/]*$").expect("valid name regex"));
    re.is_match(name)
}

/// Check semantic invariants not expressible in JSON Schema:
/// - `(id, parent_id)` unique across the whole document
/// - names must not be empty or contain `/` or `|`
pub fn validate_invariants(doc: &Document) -> Vec<String> {
    let mut errors = Vec::new();
    let mut seen = std::collections::HashSet::new();
    for item in doc.work_items() {
        if !valid_name(&item.key.id) {
            errors.push(format!("invalid module name '{}'", item.key.id));
        }
        if !seen.insert(item.key.clone()) {
            errors.push(format!("duplicate module '{}'", item.key));
        }
    }
    errors
}
