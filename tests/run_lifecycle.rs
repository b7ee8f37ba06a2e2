//! End-to-end lifecycle tests driving full runs against a temporary
//! workspace with shell-based workers.

use std::fs;
use std::path::Path;

use anyhow::Result;

use modrun::core::item::ItemKey;
use modrun::document::Document;
use modrun::driver::{self, PhaseSelection, RunOptions, RunReport, UsageError};
use modrun::io::config::{Config, load_config, write_config};
use modrun::io::document_store::{MissingDocumentError, load_document, write_document};
use modrun::io::interrupt::InterruptFlag;
use modrun::io::paths::StatePaths;
use modrun::io::process::ProcessGroups;
use modrun::io::retry::RetryStore;
use modrun::test_support::sample_document;

struct Workspace {
    temp: tempfile::TempDir,
    paths: StatePaths,
}

impl Workspace {
    fn new() -> Self {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = StatePaths::new(temp.path());
        paths.ensure_layout().expect("layout");
        write_document(&temp.path().join("modules.json"), &sample_document())
            .expect("write document");

        let mut cfg = Config::default();
        cfg.poll_interval_ms = 10;
        cfg.worker.command = vec!["true".to_string()];
        cfg.validation.command = vec!["true".to_string()];
        cfg.conversion.command = vec!["true".to_string()];
        cfg.discovery.command = Vec::new();
        write_config(&paths.config_path, &cfg).expect("write config");

        Self { temp, paths }
    }

    fn root(&self) -> &Path {
        self.temp.path()
    }

    fn amend_config(&self, amend: impl FnOnce(&mut Config)) {
        let mut cfg = load_config(&self.paths.config_path).expect("load config");
        amend(&mut cfg);
        write_config(&self.paths.config_path, &cfg).expect("write config");
    }

    fn options(&self) -> RunOptions {
        RunOptions::new(self.root())
    }

    fn run(&self, opts: &RunOptions) -> Result<RunReport> {
        driver::run(opts, &InterruptFlag::new(), &ProcessGroups::new())
    }

    fn document(&self) -> Document {
        load_document(&self.root().join("modules.json")).expect("load document")
    }

    fn retry(&self) -> RetryStore {
        RetryStore::open(&self.paths.retry_path).expect("open retry")
    }
}

fn analysis_only() -> PhaseSelection {
    PhaseSelection {
        analysis: true,
        validation: false,
        conversion: false,
    }
}

#[test]
fn full_run_marks_every_item_analyzed() {
    let ws = Workspace::new();
    let mut opts = ws.options();
    opts.selection = analysis_only();

    let report = ws.run(&opts).expect("run");
    assert_eq!(report.phases.len(), 1);
    let analysis = &report.phases[0];
    assert_eq!(analysis.name, "analysis");
    assert_eq!(analysis.counters.success, 4);
    assert_eq!(analysis.counters.total, 4);
    assert!(!report.interrupted);

    assert!(ws.document().work_items().iter().all(|item| item.analyzed));
    assert!(ws.retry().is_empty().expect("retry"));
    // The pending queue was snapshotted before dispatch, with no temp files
    // left behind.
    assert!(ws.paths.queue_snapshot_path.exists());
    assert!(ws.paths.session_path.exists());
    assert!(!ws.paths.queue_snapshot_path.with_extension("json.tmp").exists());
    assert!(!ws.paths.session_path.with_extension("json.tmp").exists());
}

#[test]
fn second_run_skips_completed_items() {
    let ws = Workspace::new();
    let mut opts = ws.options();
    opts.selection = analysis_only();

    ws.run(&opts).expect("first run");
    let report = ws.run(&opts).expect("second run");

    let analysis = &report.phases[0];
    assert_eq!(analysis.counters.success, 0);
    assert_eq!(analysis.counters.skipped, 4);
}

#[test]
fn failures_populate_the_retry_set() {
    let ws = Workspace::new();
    ws.amend_config(|cfg| {
        cfg.worker.command = vec!["sh".to_string(), "-c".to_string(), "exit 3".to_string()];
    });
    let mut opts = ws.options();
    opts.selection = analysis_only();

    let report = ws.run(&opts).expect("run");
    assert_eq!(report.phases[0].counters.failed, 4);

    let records = ws.retry().records().expect("records");
    assert_eq!(records.len(), 4);
    assert!(ws.document().work_items().iter().all(|item| !item.analyzed));
}

#[test]
fn retry_failed_drains_the_set_on_success() {
    let ws = Workspace::new();
    ws.amend_config(|cfg| {
        cfg.worker.command = vec!["false".to_string()];
    });
    let mut opts = ws.options();
    opts.selection = analysis_only();
    ws.run(&opts).expect("failing run");
    assert_eq!(ws.retry().records().expect("records").len(), 4);

    ws.amend_config(|cfg| {
        cfg.worker.command = vec!["true".to_string()];
    });
    opts.retry_failed = true;
    let report = ws.run(&opts).expect("retry run");

    assert_eq!(report.phases[0].counters.success, 4);
    assert!(ws.retry().is_empty().expect("retry"));
    assert!(ws.document().work_items().iter().all(|item| item.analyzed));
}

#[test]
fn dry_run_mutates_no_state() {
    let ws = Workspace::new();
    let mut opts = ws.options();
    opts.selection = analysis_only();
    opts.dry_run = true;

    let report = ws.run(&opts).expect("run");
    assert_eq!(report.phases[0].counters.success, 4);

    assert!(ws.document().work_items().iter().all(|item| !item.analyzed));
    assert!(ws.retry().is_empty().expect("retry"));
}

#[test]
fn dry_run_of_a_retry_run_preserves_the_retry_set() {
    let ws = Workspace::new();
    ws.amend_config(|cfg| {
        cfg.worker.command = vec!["false".to_string()];
    });
    let mut opts = ws.options();
    opts.selection = analysis_only();
    ws.run(&opts).expect("failing run");
    assert_eq!(ws.retry().records().expect("records").len(), 4);

    opts.retry_failed = true;
    opts.dry_run = true;
    let report = ws.run(&opts).expect("dry retry run");
    assert_eq!(report.phases[0].counters.success, 4);

    // Previewing a retry run leaves the failure list intact on disk.
    assert_eq!(ws.retry().records().expect("records").len(), 4);
    assert!(ws.document().work_items().iter().all(|item| !item.analyzed));
}

#[test]
fn reset_clears_flags_and_retry_set() {
    let ws = Workspace::new();
    let mut opts = ws.options();
    opts.selection = analysis_only();
    ws.run(&opts).expect("run");
    assert!(ws.document().work_items().iter().all(|item| item.analyzed));

    let mut reset_opts = ws.options();
    reset_opts.reset = true;
    let report = ws.run(&reset_opts).expect("reset");
    assert!(report.reset_performed);
    assert!(report.phases.is_empty());
    assert!(ws.document().work_items().iter().all(|item| !item.analyzed));
    assert!(ws.retry().is_empty().expect("retry"));
}

#[test]
fn module_filter_runs_a_single_item() {
    let ws = Workspace::new();
    let mut opts = ws.options();
    opts.selection = analysis_only();
    opts.module_filter = Some("Employee/Profile".to_string());

    let report = ws.run(&opts).expect("run");
    let counters = &report.phases[0].counters;
    assert_eq!(counters.success, 1);
    assert_eq!(counters.skipped, 3);

    let doc = ws.document();
    for item in doc.work_items() {
        assert_eq!(item.analyzed, item.key == ItemKey::child("Employee", "Profile"));
    }
}

#[test]
fn unknown_module_filter_is_a_usage_error() {
    let ws = Workspace::new();
    let mut opts = ws.options();
    opts.selection = analysis_only();
    opts.module_filter = Some("Ghost".to_string());

    let err = ws.run(&opts).unwrap_err();
    assert!(err.downcast_ref::<UsageError>().is_some());
    assert!(ws.document().work_items().iter().all(|item| !item.analyzed));
}

#[test]
fn timed_out_worker_counts_as_failed() {
    let ws = Workspace::new();
    ws.amend_config(|cfg| {
        cfg.worker.command = vec!["sleep".to_string(), "30".to_string()];
    });
    let mut opts = ws.options();
    opts.selection = analysis_only();
    opts.module_filter = Some("Payroll".to_string());
    opts.timeout_override = Some(1);

    let report = ws.run(&opts).expect("run");
    let counters = &report.phases[0].counters;
    assert_eq!(counters.failed, 1);
    assert_eq!(counters.skipped, 3);

    let records = ws.retry().records().expect("records");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].key, ItemKey::top_level("Payroll"));
}

#[test]
fn parallel_analysis_still_records_everything() {
    let ws = Workspace::new();
    let mut opts = ws.options();
    opts.selection = analysis_only();
    opts.parallel = Some(4);

    let report = ws.run(&opts).expect("run");
    assert_eq!(report.phases[0].counters.recorded(), 4);
    assert!(ws.document().work_items().iter().all(|item| item.analyzed));
}

#[test]
fn validation_phase_covers_discovered_files() {
    let ws = Workspace::new();
    let docs = ws.root().join("docs");
    fs::create_dir_all(docs.join("sub")).expect("mkdir");
    fs::write(docs.join("a.md"), "a").expect("write");
    fs::write(docs.join("sub/b.md"), "b").expect("write");
    fs::write(docs.join("notes.txt"), "skip").expect("write");

    let mut opts = ws.options();
    opts.selection = PhaseSelection {
        analysis: false,
        validation: true,
        conversion: false,
    };

    let report = ws.run(&opts).expect("run");
    let validation = &report.phases[0];
    assert_eq!(validation.name, "validation");
    assert_eq!(validation.counters.success, 2);
    assert_eq!(validation.counters.total, 2);
}

#[test]
fn conversion_phase_writes_a_mirrored_tree() {
    let ws = Workspace::new();
    let docs = ws.root().join("docs");
    fs::create_dir_all(docs.join("guides")).expect("mkdir");
    fs::write(docs.join("guides/intro.md"), "doc").expect("write");

    ws.amend_config(|cfg| {
        // $0 = source, $1 = template, $2 = output path.
        cfg.conversion.command = vec![
            "sh".to_string(),
            "-c".to_string(),
            r#"touch "$2""#.to_string(),
        ];
    });
    let mut opts = ws.options();
    opts.selection = PhaseSelection {
        analysis: false,
        validation: false,
        conversion: true,
    };

    let report = ws.run(&opts).expect("run");
    assert_eq!(report.phases[0].counters.success, 1);
    assert!(ws.root().join("converted/guides/intro.docx").exists());
}

#[test]
fn missing_document_without_fallback_is_fatal() {
    let ws = Workspace::new();
    fs::remove_file(ws.root().join("modules.json")).expect("remove");
    let mut opts = ws.options();
    opts.selection = analysis_only();

    let err = ws.run(&opts).unwrap_err();
    assert!(err.downcast_ref::<MissingDocumentError>().is_some());
}

#[test]
fn missing_document_triggers_the_discovery_fallback() {
    let ws = Workspace::new();
    fs::remove_file(ws.root().join("modules.json")).expect("remove");
    ws.amend_config(|cfg| {
        cfg.discovery.command = vec![
            "sh".to_string(),
            "-c".to_string(),
            r#"printf '[{"name": "Found"}]\n' > modules.json"#.to_string(),
        ];
    });
    let mut opts = ws.options();
    opts.selection = analysis_only();

    let err = ws.run(&opts).unwrap_err();
    // The run still fails, pointing at the generated document for review.
    assert!(err.to_string().contains("review"));
    let doc = ws.document();
    assert_eq!(doc.modules.len(), 1);
    assert_eq!(doc.modules[0].name, "Found");
}

#[test]
fn preset_interrupt_launches_nothing() {
    let ws = Workspace::new();
    let mut opts = ws.options();
    opts.selection = analysis_only();

    let interrupt = InterruptFlag::new();
    interrupt.set();
    let report = driver::run(&opts, &interrupt, &ProcessGroups::new()).expect("run");

    assert!(report.interrupted);
    assert!(ws.document().work_items().iter().all(|item| !item.analyzed));
}
