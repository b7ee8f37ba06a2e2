//! Phase A: module analysis against the persistent completion store.

use std::sync::Arc;

use anyhow::{Context, Result};
use minijinja::{Environment, context};

use crate::core::item::{ItemKey, WorkItem};
use crate::core::outcome::TaskOutcome;
use crate::io::document_store::DocumentStore;
use crate::io::paths::StatePaths;
use crate::io::retry::{FailureRecord, RetryStore};
use crate::io::worker::{InvokeRequest, Worker};
use crate::phases::TimeoutTable;
use crate::scheduler::{Disposition, Phase};

/// Renders the opaque per-item instruction handed to the worker.
pub struct InstructionTemplate {
    env: Environment<'static>,
}

impl InstructionTemplate {
    pub fn new(template: &str) -> Result<Self> {
        let mut env = Environment::new();
        env.add_template_owned("instruction".to_string(), template.to_string())
            .context("compile worker instruction template")?;
        Ok(Self { env })
    }

    pub fn render(&self, item: &WorkItem) -> Result<String> {
        let tmpl = self
            .env
            .get_template("instruction")
            .context("load worker instruction template")?;
        tmpl.render(context! {
            module => item.key.id,
            parent => item.key.parent_id.clone().unwrap_or_default(),
            complexity => item.complexity.as_str(),
        })
        .with_context(|| format!("render instruction for {}", item.key))
    }
}

pub struct AnalysisPhase {
    items: Vec<WorkItem>,
    store: Arc<DocumentStore>,
    retry: Arc<RetryStore>,
    worker: Arc<dyn Worker>,
    paths: StatePaths,
    filter: Option<ItemKey>,
    timeouts: TimeoutTable,
    instruction: InstructionTemplate,
    dry_run: bool,
}

impl AnalysisPhase {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        items: Vec<WorkItem>,
        store: Arc<DocumentStore>,
        retry: Arc<RetryStore>,
        worker: Arc<dyn Worker>,
        paths: StatePaths,
        filter: Option<ItemKey>,
        timeouts: TimeoutTable,
        instruction: InstructionTemplate,
        dry_run: bool,
    ) -> Self {
        Self {
            items,
            store,
            retry,
            worker,
            paths,
            filter,
            timeouts,
            instruction,
            dry_run,
        }
    }
}

impl Phase for AnalysisPhase {
    type Item = WorkItem;

    fn name(&self) -> &'static str {
        "analysis"
    }

    fn label(&self, item: &WorkItem) -> String {
        item.key.to_string()
    }

    fn build_items(&self) -> Result<Vec<WorkItem>> {
        Ok(self.items.clone())
    }

    fn classify(&self, item: &WorkItem) -> Disposition {
        if let Some(filter) = &self.filter
            && item.key != *filter
        {
            return Disposition::Skip(crate::core::outcome::SkipReason::FilteredOut);
        }
        if item.analyzed {
            return Disposition::Skip(crate::core::outcome::SkipReason::AlreadyAnalyzed);
        }
        Disposition::Launch
    }

    fn invoke(&self, item: &WorkItem) -> Result<TaskOutcome> {
        let instruction = self.instruction.render(item)?;
        self.worker.invoke(&InvokeRequest {
            args: vec![instruction],
            log_path: self.paths.item_log_path(&item.key.to_string()),
            timeout: self.timeouts.for_complexity(item.complexity),
        })
    }

    fn record(&self, item: &WorkItem, outcome: &TaskOutcome) -> Result<()> {
        // Dry runs simulate outcomes without touching any persisted state.
        match outcome {
            TaskOutcome::Success => {
                if !self.dry_run {
                    self.store.set_analyzed(&item.key)?;
                }
                Ok(())
            }
            TaskOutcome::Failure(_) => {
                if self.dry_run {
                    return Ok(());
                }
                self.retry.upsert(FailureRecord {
                    key: item.key.clone(),
                    complexity: item.complexity,
                })
            }
            TaskOutcome::Skipped(_) => Ok(()),
        }
    }
}
