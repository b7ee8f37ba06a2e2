//! Retry queue storage: the set of outstanding failed items.
//!
//! Persisted as one `id|parentId|complexity` line per record. The set is
//! keyed by `(id, parent_id)` so repeated failures of the same item upsert
//! instead of accumulating duplicates.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result, anyhow};
use tracing::debug;

use crate::core::item::{Complexity, ItemKey};

/// One observed failure eligible for a retry run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureRecord {
    pub key: ItemKey,
    pub complexity: Complexity,
}

/// Keyed, persisted retry set.
pub struct RetryStore {
    path: PathBuf,
    inner: Mutex<BTreeMap<ItemKey, Complexity>>,
}

impl RetryStore {
    /// Load the retry set from disk; a missing file is an empty set.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let mut records = BTreeMap::new();
        if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("read retry list {}", path.display()))?;
            for (lineno, line) in contents.lines().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                let record = parse_line(line).with_context(|| {
                    format!("parse retry list {} line {}", path.display(), lineno + 1)
                })?;
                records.insert(record.key, record.complexity);
            }
        }
        debug!(path = %path.display(), records = records.len(), "retry set loaded");
        Ok(Self {
            path,
            inner: Mutex::new(records),
        })
    }

    /// Insert or replace the record for an item and persist.
    pub fn upsert(&self, record: FailureRecord) -> Result<()> {
        let mut records = self.lock()?;
        records.insert(record.key, record.complexity);
        write_records(&self.path, &records)
    }

    /// Current outstanding records in deterministic key order.
    pub fn records(&self) -> Result<Vec<FailureRecord>> {
        Ok(self
            .lock()?
            .iter()
            .map(|(key, complexity)| FailureRecord {
                key: key.clone(),
                complexity: *complexity,
            })
            .collect())
    }

    /// Drain the set: return every record and persist the now-empty file.
    ///
    /// A retry run calls this before dispatch so items that fail again are
    /// freshly re-added and items that succeed never reappear.
    pub fn take_all(&self) -> Result<Vec<FailureRecord>> {
        let mut records = self.lock()?;
        let drained: Vec<FailureRecord> = records
            .iter()
            .map(|(key, complexity)| FailureRecord {
                key: key.clone(),
                complexity: *complexity,
            })
            .collect();
        records.clear();
        write_records(&self.path, &records)?;
        Ok(drained)
    }

    /// Empty the set (part of the explicit reset operation).
    pub fn clear(&self) -> Result<()> {
        let mut records = self.lock()?;
        records.clear();
        write_records(&self.path, &records)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.lock()?.is_empty())
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<ItemKey, Complexity>>> {
        self.inner
            .lock()
            .map_err(|_| anyhow!("retry store lock poisoned"))
    }
}

fn parse_line(line: &str) -> Result<FailureRecord> {
    let mut fields = line.split('|');
    let (Some(id), Some(parent), Some(complexity), None) = (
        fields.next(),
        fields.next(),
        fields.next(),
        fields.next(),
    ) else {
        return Err(anyhow!("expected 'id|parentId|complexity', got '{line}'"));
    };
    if id.is_empty() {
        return Err(anyhow!("empty id in '{line}'"));
    }
    Ok(FailureRecord {
        key: ItemKey {
            id: id.to_string(),
            parent_id: (!parent.is_empty()).then(|| parent.to_string()),
        },
        complexity: Complexity::parse(complexity)?,
    })
}

fn write_records(path: &Path, records: &BTreeMap<ItemKey, Complexity>) -> Result<()> {
    let mut buf = String::new();
    for (key, complexity) in records {
        buf.push_str(&key.id);
        buf.push('|');
        if let Some(parent) = &key.parent_id {
            buf.push_str(parent);
        }
        buf.push('|');
        buf.push_str(complexity.as_str());
        buf.push('\n');
    }
    let tmp_path = path.with_extension("list.tmp");
    fs::write(&tmp_path, buf)
        .with_context(|| format!("write temp retry list {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path)
        .with_context(|| format!("replace retry list {}", path.display()))?;
    Ok(())
}
