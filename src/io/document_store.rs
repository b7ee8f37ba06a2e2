//! Document load/save with schema + invariant validation, and the serialized
//! mutation store.
//!
//! The document file is the one piece of shared mutable state in a run. Every
//! mutation goes through [`DocumentStore`], which holds the in-memory document
//! behind a mutex and persists atomically (temp file + rename) before the
//! lock is released. Concurrent completions therefore serialize instead of
//! racing read-full/write-full cycles, so no successful completion can be
//! overwritten by a stale writer.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result, anyhow};
use jsonschema::validator_for;
use serde_json::Value;
use tracing::debug;

use crate::core::item::ItemKey;
use crate::document::{Document, validate_invariants};

const MODULES_SCHEMA: &str = include_str!("../../schemas/modules.schema.json");

/// The completion store file is absent. Fatal unless a discovery fallback is
/// configured; callers downcast to distinguish it from other load errors.
#[derive(Debug, Clone)]
pub struct MissingDocumentError {
    pub path: PathBuf,
}

impl fmt::Display for MissingDocumentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "missing module document {}", self.path.display())
    }
}

impl std::error::Error for MissingDocumentError {}

/// Load and validate the document from disk (schema + invariants).
pub fn load_document(path: &Path) -> Result<Document> {
    if !path.exists() {
        return Err(MissingDocumentError {
            path: path.to_path_buf(),
        }
        .into());
    }
    let contents =
        fs::read_to_string(path).with_context(|| format!("read document {}", path.display()))?;
    let value: Value = serde_json::from_str(&contents)
        .with_context(|| format!("parse document {}", path.display()))?;
    validate_schema(&value)?;
    let doc: Document = serde_json::from_value(value)
        .with_context(|| format!("deserialize document {}", path.display()))?;
    let errors = validate_invariants(&doc);
    if !errors.is_empty() {
        return Err(anyhow!("document invariants failed: {}", errors.join("; ")));
    }
    Ok(doc)
}

/// Atomically write the document to disk (temp file + rename).
pub fn write_document(path: &Path, doc: &Document) -> Result<()> {
    let mut buf = serde_json::to_string_pretty(doc)?;
    buf.push('\n');
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, buf)
        .with_context(|| format!("write temp document {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path)
        .with_context(|| format!("replace document {}", path.display()))?;
    Ok(())
}

fn validate_schema(value: &Value) -> Result<()> {
    let schema: Value = serde_json::from_str(MODULES_SCHEMA).context("parse bundled schema")?;
    let compiled = validator_for(&schema).map_err(|err| anyhow!("invalid schema: {err}"))?;
    let messages: Vec<String> = compiled
        .iter_errors(value)
        .map(|err| err.to_string())
        .collect();
    if !messages.is_empty() {
        return Err(anyhow!(
            "document schema validation failed: {}",
            messages.join("; ")
        ));
    }
    Ok(())
}

/// Serializing store for the module document.
pub struct DocumentStore {
    path: PathBuf,
    inner: Mutex<Document>,
}

impl DocumentStore {
    /// Load the document once and take ownership of it for the run.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let doc = load_document(&path)?;
        debug!(path = %path.display(), modules = doc.modules.len(), "document loaded");
        Ok(Self {
            path,
            inner: Mutex::new(doc),
        })
    }

    /// Wrap an in-memory document (test construction).
    pub fn with_document(path: impl Into<PathBuf>, doc: Document) -> Self {
        Self {
            path: path.into(),
            inner: Mutex::new(doc),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read-only copy of the current document.
    pub fn snapshot(&self) -> Result<Document> {
        Ok(self.lock()?.clone())
    }

    /// Mark one item analyzed and persist. Idempotent: repeating for the same
    /// item leaves the identical final state.
    pub fn set_analyzed(&self, key: &ItemKey) -> Result<()> {
        let mut doc = self.lock()?;
        if !doc.with_analyzed_mut(key, |analyzed| *analyzed = true) {
            return Err(anyhow!("document has no item '{key}'"));
        }
        write_document(&self.path, &doc)?;
        debug!(item = %key, "marked analyzed");
        Ok(())
    }

    /// Clear every `analyzed` flag and persist. The explicit reset operation,
    /// never invoked as a side effect of analysis.
    pub fn reset(&self) -> Result<()> {
        let mut doc = self.lock()?;
        doc.reset_analyzed();
        write_document(&self.path, &doc)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Document>> {
        self.inner
            .lock()
            .map_err(|_| anyhow!("document store lock poisoned"))
    }
}
