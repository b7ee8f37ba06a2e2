//! Phase B: source file validation.
//!
//! No persisted completion state: every run re-discovers and re-evaluates the
//! full file set, and outcomes only feed the run-scoped counters.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use crate::core::outcome::TaskOutcome;
use crate::io::discover::discover_files;
use crate::io::paths::StatePaths;
use crate::io::worker::{InvokeRequest, Worker};
use crate::scheduler::{Disposition, Phase};

pub struct ValidationPhase {
    source_dir: PathBuf,
    extension: String,
    worker: Arc<dyn Worker>,
    paths: StatePaths,
    timeout: Option<Duration>,
}

impl ValidationPhase {
    pub fn new(
        source_dir: PathBuf,
        extension: String,
        worker: Arc<dyn Worker>,
        paths: StatePaths,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            source_dir,
            extension,
            worker,
            paths,
            timeout,
        }
    }
}

impl Phase for ValidationPhase {
    type Item = PathBuf;

    fn name(&self) -> &'static str {
        "validation"
    }

    fn label(&self, item: &PathBuf) -> String {
        item.strip_prefix(&self.paths.root)
            .unwrap_or(item)
            .display()
            .to_string()
    }

    fn build_items(&self) -> Result<Vec<PathBuf>> {
        discover_files(&self.source_dir, &self.extension)
    }

    fn classify(&self, _item: &PathBuf) -> Disposition {
        Disposition::Launch
    }

    fn invoke(&self, item: &PathBuf) -> Result<TaskOutcome> {
        self.worker.invoke(&InvokeRequest {
            args: vec![item.display().to_string()],
            log_path: self.paths.item_log_path(&self.label(item)),
            timeout: self.timeout,
        })
    }

    fn record(&self, _item: &PathBuf, _outcome: &TaskOutcome) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    use crate::test_support::ScriptedWorker;

    #[test]
    fn builds_items_from_discovered_files() {
        let temp = tempfile::tempdir().expect("tempdir");
        let source = temp.path().join("docs");
        fs::create_dir_all(&source).expect("mkdir");
        fs::write(source.join("a.md"), "a").expect("write");
        fs::write(source.join("b.txt"), "b").expect("write");

        let phase = ValidationPhase::new(
            source,
            "md".to_string(),
            Arc::new(ScriptedWorker::succeeding()),
            StatePaths::new(temp.path()),
            None,
        );

        let items = phase.build_items().expect("items");
        assert_eq!(items.len(), 1);
        assert!(items[0].ends_with("a.md"));
        assert_eq!(phase.classify(&items[0]), Disposition::Launch);
    }

    #[test]
    fn invoke_passes_the_source_path() {
        let temp = tempfile::tempdir().expect("tempdir");
        let worker = Arc::new(ScriptedWorker::succeeding());
        let phase = ValidationPhase::new(
            temp.path().join("docs"),
            "md".to_string(),
            worker.clone(),
            StatePaths::new(temp.path()),
            Some(Duration::from_secs(600)),
        );

        let file = temp.path().join("docs").join("guide.md");
        phase.invoke(&file).expect("invoke");
        let calls = worker.calls();
        assert_eq!(calls[0].args, vec![file.display().to_string()]);
        assert_eq!(calls[0].timeout, Some(Duration::from_secs(600)));
    }

    #[test]
    fn labels_are_relative_to_the_workspace() {
        let temp = tempfile::tempdir().expect("tempdir");
        let phase = ValidationPhase::new(
            temp.path().join("docs"),
            "md".to_string(),
            Arc::new(ScriptedWorker::succeeding()),
            StatePaths::new(temp.path()),
            None,
        );
        let label = phase.label(&temp.path().join("docs/guide.md"));
        assert_eq!(label, "docs/guide.md");
    }
}
