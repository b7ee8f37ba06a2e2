//! Orchestration of a full run: reset, retry wiring, and phase sequencing.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use tracing::{info, warn};

use crate::core::filter::FilterSpec;
use crate::core::item::{ItemKey, WorkItem};
use crate::core::queue::{build_queue, order_items};
use crate::document::Document;
use crate::io::config::{Config, load_config};
use crate::io::document_store::{DocumentStore, MissingDocumentError};
use crate::io::interrupt::InterruptFlag;
use crate::io::paths::StatePaths;
use crate::io::process::{ProcessGroups, run_logged};
use crate::io::retry::RetryStore;
use crate::io::run_log::RunLog;
use crate::io::session::write_session;
use crate::io::worker::{CommandWorker, DryRunWorker, Worker};
use crate::phases::TimeoutTable;
use crate::phases::analysis::{AnalysisPhase, InstructionTemplate};
use crate::phases::conversion::ConversionPhase;
use crate::phases::validation::ValidationPhase;
use crate::scheduler::{PhaseSummary, SchedulerConfig, run_phase};

/// Semantically invalid operator input: an unknown or malformed module
/// filter, or a config file that fails validation. Distinct from fatal
/// runtime errors so `main` can exit 2.
#[derive(Debug)]
pub struct UsageError(pub String);

impl fmt::Display for UsageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for UsageError {}

/// Which of the three phases this run executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseSelection {
    pub analysis: bool,
    pub validation: bool,
    pub conversion: bool,
}

impl Default for PhaseSelection {
    fn default() -> Self {
        Self {
            analysis: true,
            validation: true,
            conversion: true,
        }
    }
}

/// Decoded CLI surface handed to the driver.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub root: PathBuf,
    pub dry_run: bool,
    pub reset: bool,
    pub module_filter: Option<String>,
    pub retry_failed: bool,
    pub delay_secs: Option<u64>,
    pub parallel: Option<u32>,
    /// `Some(0)` from `--no-timeout`, `Some(n)` from `--timeout n`.
    pub timeout_override: Option<u64>,
    pub selection: PhaseSelection,
}

impl RunOptions {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            dry_run: false,
            reset: false,
            module_filter: None,
            retry_failed: false,
            delay_secs: None,
            parallel: None,
            timeout_override: None,
            selection: PhaseSelection::default(),
        }
    }
}

/// What a run produced, for the final summary.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub phases: Vec<PhaseSummary>,
    pub interrupted: bool,
    pub reset_performed: bool,
}

#[derive(Debug, Serialize)]
struct QueueSnapshotEntry {
    id: String,
    #[serde(rename = "parentId")]
    parent_id: Option<String>,
    complexity: String,
    analyzed: bool,
}

/// Execute a full run per the decoded options.
pub fn run(
    opts: &RunOptions,
    interrupt: &InterruptFlag,
    groups: &ProcessGroups,
) -> Result<RunReport> {
    let paths = StatePaths::new(&opts.root);
    paths.ensure_layout()?;
    let cfg = load_config(&paths.config_path).map_err(|err| UsageError(format!("{err:#}")))?;
    let retry = Arc::new(RetryStore::open(&paths.retry_path)?);

    if opts.reset {
        let store = open_store(&paths, &cfg, groups)?;
        store.reset()?;
        retry.clear()?;
        info!("reset complete: analyzed flags cleared, retry set emptied");
        return Ok(RunReport {
            reset_performed: true,
            ..RunReport::default()
        });
    }

    write_session(&paths.session_path)?;
    let run_log = RunLog::open(&paths.run_log_path)?;
    run_log.line(&format!(
        "run started (dry_run={}, retry_failed={})",
        opts.dry_run, opts.retry_failed
    ));

    let scheduler_config = SchedulerConfig {
        parallel: opts.parallel.unwrap_or(1).clamp(1, cfg.max_parallel) as usize,
        launch_delay: opts.delay_secs.filter(|s| *s > 0).map(Duration::from_secs),
        poll_interval: Duration::from_millis(cfg.poll_interval_ms),
    };
    let timeouts = TimeoutTable::new(&cfg.timeouts, opts.timeout_override);

    let mut report = RunReport::default();

    if opts.selection.analysis {
        let store = Arc::new(open_store(&paths, &cfg, groups)?);
        let doc = store.snapshot()?;
        let filter = resolve_filter(opts.module_filter.as_deref(), &doc)?;
        let items = if opts.retry_failed {
            retry_items(&retry, &doc, opts.dry_run)?
        } else {
            build_queue(&doc)
        };
        write_queue_snapshot(&paths, &items)?;

        let worker = make_worker(opts.dry_run, cfg.worker.command.clone(), &opts.root, groups);
        let phase = Arc::new(AnalysisPhase::new(
            items,
            store,
            Arc::clone(&retry),
            worker,
            paths.clone(),
            filter,
            timeouts,
            InstructionTemplate::new(&cfg.worker.instruction)?,
            opts.dry_run,
        ));
        let summary = run_phase(phase, &scheduler_config, interrupt, groups, &run_log)?;
        report.interrupted |= summary.interrupted;
        report.phases.push(summary);
    }

    if opts.selection.validation && !report.interrupted {
        let worker = make_worker(
            opts.dry_run,
            cfg.validation.command.clone(),
            &opts.root,
            groups,
        );
        let phase = Arc::new(ValidationPhase::new(
            opts.root.join(&cfg.validation.source_dir),
            cfg.validation.extension.clone(),
            worker,
            paths.clone(),
            timeouts.for_complexity(crate::core::item::Complexity::Medium),
        ));
        let summary = run_phase(phase, &scheduler_config, interrupt, groups, &run_log)?;
        report.interrupted |= summary.interrupted;
        report.phases.push(summary);
    }

    if opts.selection.conversion && !report.interrupted {
        let worker = make_worker(
            opts.dry_run,
            cfg.conversion.command.clone(),
            &opts.root,
            groups,
        );
        let phase = Arc::new(ConversionPhase::new(
            opts.root.join(&cfg.validation.source_dir),
            cfg.validation.extension.clone(),
            opts.root.join(&cfg.conversion.output_dir),
            cfg.conversion.output_extension.clone(),
            cfg.conversion.template.clone(),
            worker,
            paths.clone(),
            timeouts.for_complexity(crate::core::item::Complexity::Medium),
            opts.dry_run,
        ));
        let summary = run_phase(phase, &scheduler_config, interrupt, groups, &run_log)?;
        report.interrupted |= summary.interrupted;
        report.phases.push(summary);
    }

    run_log.line(if report.interrupted {
        "run interrupted"
    } else {
        "run finished"
    });
    Ok(report)
}

fn make_worker(
    dry_run: bool,
    command: Vec<String>,
    root: &Path,
    groups: &ProcessGroups,
) -> Arc<dyn Worker> {
    if dry_run {
        Arc::new(DryRunWorker)
    } else {
        Arc::new(CommandWorker::new(command, root, groups.clone()))
    }
}

/// Open the document store, running the configured discovery fallback when
/// the document is missing. Discovery generates the document out-of-band and
/// the run still errors out asking for review.
fn open_store(paths: &StatePaths, cfg: &Config, groups: &ProcessGroups) -> Result<DocumentStore> {
    let doc_path = paths.root.join(&cfg.document_path);
    match DocumentStore::open(&doc_path) {
        Ok(store) => Ok(store),
        Err(err) if err.downcast_ref::<MissingDocumentError>().is_some() => {
            if cfg.discovery.command.is_empty() {
                return Err(err);
            }
            warn!(document = %doc_path.display(), "document missing, running discovery fallback");
            let mut cmd = Command::new(&cfg.discovery.command[0]);
            cmd.args(&cfg.discovery.command[1..]).current_dir(&paths.root);
            let exit = run_logged(
                cmd,
                &paths.logs_dir.join("discovery.log"),
                None,
                groups,
            )
            .context("run discovery fallback")?;
            if !exit.success() {
                return Err(anyhow!(
                    "discovery fallback failed (exit {:?}); see {}",
                    exit.code,
                    paths.logs_dir.join("discovery.log").display()
                ));
            }
            Err(anyhow!(
                "module document was missing; discovery generated {} - review it and re-run",
                doc_path.display()
            ))
        }
        Err(err) => Err(err),
    }
}

fn resolve_filter(raw: Option<&str>, doc: &Document) -> Result<Option<ItemKey>> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let spec = FilterSpec::parse(raw).map_err(|err| UsageError(format!("{err:#}")))?;
    let key = spec
        .resolve(doc)
        .ok_or_else(|| UsageError(format!("module '{raw}' not found in document")))?;
    Ok(Some(key))
}

/// Join the retry set back against the document. A real run drains the set
/// before dispatch so re-failures are freshly re-added and successes never
/// reappear; a dry run reads it without persisting anything. Items no longer
/// present in the document are dropped.
fn retry_items(retry: &RetryStore, doc: &Document, dry_run: bool) -> Result<Vec<WorkItem>> {
    let records = if dry_run {
        retry.records()?
    } else {
        retry.take_all()?
    };
    let mut items = Vec::new();
    for record in records {
        match doc.find(&record.key) {
            Some(current) => items.push(WorkItem {
                key: record.key,
                complexity: record.complexity,
                analyzed: current.analyzed,
            }),
            None => {
                warn!(item = %record.key, "retry record no longer in document, dropping");
            }
        }
    }
    Ok(order_items(items))
}

fn write_queue_snapshot(paths: &StatePaths, items: &[WorkItem]) -> Result<()> {
    let entries: Vec<QueueSnapshotEntry> = items
        .iter()
        .map(|item| QueueSnapshotEntry {
            id: item.key.id.clone(),
            parent_id: item.key.parent_id.clone(),
            complexity: item.complexity.as_str().to_string(),
            analyzed: item.analyzed,
        })
        .collect();
    let mut buf = serde_json::to_string_pretty(&entries)?;
    buf.push('\n');
    let tmp_path = paths.queue_snapshot_path.with_extension("json.tmp");
    std::fs::write(&tmp_path, buf)
        .with_context(|| format!("write temp queue snapshot {}", tmp_path.display()))?;
    std::fs::rename(&tmp_path, &paths.queue_snapshot_path).with_context(|| {
        format!(
            "replace queue snapshot {}",
            paths.queue_snapshot_path.display()
        )
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::item::Complexity;
    use crate::io::retry::FailureRecord;
    use crate::test_support::sample_document;

    #[test]
    fn retry_items_join_against_the_document_and_clear_the_set() {
        let temp = tempfile::tempdir().expect("tempdir");
        let retry = RetryStore::open(temp.path().join("retry.list")).expect("open");
        retry
            .upsert(FailureRecord {
                key: ItemKey::child("Employee", "Profile"),
                complexity: Complexity::Medium,
            })
            .expect("upsert");
        retry
            .upsert(FailureRecord {
                key: ItemKey::top_level("Removed"),
                complexity: Complexity::Low,
            })
            .expect("upsert");

        let items = retry_items(&retry, &sample_document(), false).expect("items");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].key, ItemKey::child("Employee", "Profile"));
        assert!(retry.is_empty().expect("empty"));
    }

    #[test]
    fn dry_run_retry_items_leave_the_set_untouched() {
        let temp = tempfile::tempdir().expect("tempdir");
        let retry = RetryStore::open(temp.path().join("retry.list")).expect("open");
        retry
            .upsert(FailureRecord {
                key: ItemKey::top_level("Payroll"),
                complexity: Complexity::High,
            })
            .expect("upsert");

        let items = retry_items(&retry, &sample_document(), true).expect("items");
        assert_eq!(items.len(), 1);
        assert_eq!(retry.records().expect("records").len(), 1);
    }

    #[test]
    fn resolve_filter_reports_usage_errors() {
        let doc = sample_document();
        let err = resolve_filter(Some("Ghost"), &doc).unwrap_err();
        assert!(err.downcast_ref::<UsageError>().is_some());

        let err = resolve_filter(Some("a/b/c"), &doc).unwrap_err();
        assert!(err.downcast_ref::<UsageError>().is_some());

        let key = resolve_filter(Some("Employee/Profile"), &doc)
            .expect("resolve")
            .expect("key");
        assert_eq!(key, ItemKey::child("Employee", "Profile"));
    }
}
