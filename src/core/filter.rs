//! Single-item filter: `--module NAME` or `--module PARENT/SUB`.

use anyhow::{Result, anyhow};

use crate::core::item::ItemKey;
use crate::document::{Document, valid_name};

/// Parsed filter string. A bare name may match either a top-level module or a
/// sub-module; a composite names one sub-module exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterSpec {
    Bare(String),
    Composite { parent: String, id: String },
}

impl FilterSpec {
    pub fn parse(raw: &str) -> Result<Self> {
        let mut parts = raw.split('/');
        let first = parts.next().unwrap_or_default();
        let second = parts.next();
        if parts.next().is_some() {
            return Err(anyhow!(
                "filter '{raw}' has too many '/' (expected NAME or PARENT/SUB)"
            ));
        }
        match second {
            None => {
                ensure_name(first, raw)?;
                Ok(FilterSpec::Bare(first.to_string()))
            }
            Some(sub) => {
                ensure_name(first, raw)?;
                ensure_name(sub, raw)?;
                Ok(FilterSpec::Composite {
                    parent: first.to_string(),
                    id: sub.to_string(),
                })
            }
        }
    }

    /// Resolve against the document to one concrete item key.
    ///
    /// A bare name can match both a top-level module and a like-named
    /// sub-module under a different parent; the first match in document order
    /// wins (a module is visited before its sub-modules, sub-modules before
    /// the next top-level module). Returns `None` when nothing matches.
    pub fn resolve(&self, doc: &Document) -> Option<ItemKey> {
        match self {
            FilterSpec::Bare(name) => doc
                .work_items()
                .into_iter()
                .find(|item| item.key.id == *name)
                .map(|item| item.key),
            FilterSpec::Composite { parent, id } => {
                let key = ItemKey::child(parent.clone(), id.clone());
                doc.find(&key).map(|item| item.key)
            }
        }
    }
}

fn ensure_name(name: &str, raw: &str) -> Result<()> {
    if !valid_name(name) {
        return Err(anyhow!("invalid module name '{name}' in filter '{raw}'"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::item::Complexity;
    use crate::document::{ModuleRecord, SubModuleRecord};
    use crate::test_support::sample_document;

    #[test]
    fn parses_bare_and_composite() {
        assert_eq!(
            FilterSpec::parse("Employee").expect("bare"),
            FilterSpec::Bare("Employee".to_string())
        );
        assert_eq!(
            FilterSpec::parse("Employee/Profile").expect("composite"),
            FilterSpec::Composite {
                parent: "Employee".to_string(),
                id: "Profile".to_string()
            }
        );
    }

    #[test]
    fn rejects_malformed_filters() {
        assert!(FilterSpec::parse("").is_err());
        assert!(FilterSpec::parse("a/b/c").is_err());
        assert!(FilterSpec::parse("/Sub").is_err());
        assert!(FilterSpec::parse("Employee/").is_err());
    }

    #[test]
    fn composite_resolves_exactly_one_child() {
        let doc = sample_document();
        let key = FilterSpec::parse("Employee/Profile")
            .expect("parse")
            .resolve(&doc)
            .expect("resolve");
        assert_eq!(key, ItemKey::child("Employee", "Profile"));
    }

    #[test]
    fn bare_name_prefers_first_match_in_document_order() {
        // "Shared" exists both as a sub-module of Alpha and as a top-level
        // module listed later; document order picks the Alpha child.
        let doc = Document {
            modules: vec![
                ModuleRecord {
                    name: "Alpha".to_string(),
                    complexity: Some(Complexity::Low),
                    analyzed: false,
                    sub_modules: vec![SubModuleRecord {
                        name: "Shared".to_string(),
                        complexity: None,
                        analyzed: false,
                    }],
                },
                ModuleRecord {
                    name: "Shared".to_string(),
                    complexity: None,
                    analyzed: false,
                    sub_modules: Vec::new(),
                },
            ],
        };
        let key = FilterSpec::parse("Shared")
            .expect("parse")
            .resolve(&doc)
            .expect("resolve");
        assert_eq!(key, ItemKey::child("Alpha", "Shared"));
    }

    #[test]
    fn unresolvable_filter_returns_none() {
        let doc = sample_document();
        assert!(
            FilterSpec::parse("Ghost")
                .expect("parse")
                .resolve(&doc)
                .is_none()
        );
        assert!(
            FilterSpec::parse("Payroll/Profile")
                .expect("parse")
                .resolve(&doc)
                .is_none()
        );
    }
}
