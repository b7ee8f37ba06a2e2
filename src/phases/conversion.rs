//! Phase C: file conversion into a mirrored output tree.
//!
//! Each discovered source maps deterministically to an output path under the
//! output root, preserving the directory structure and swapping the
//! extension. Outcomes are counters-only; the module document is never
//! involved.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::core::outcome::TaskOutcome;
use crate::io::discover::discover_files;
use crate::io::paths::StatePaths;
use crate::io::worker::{InvokeRequest, Worker};
use crate::scheduler::{Disposition, Phase};

/// Map a source file to its output artifact: mirror the directory structure
/// of `source_root` under `output_root` and swap the extension.
pub fn mirror_output_path(
    source_root: &Path,
    source: &Path,
    output_root: &Path,
    output_extension: &str,
) -> Result<PathBuf> {
    let relative = source.strip_prefix(source_root).with_context(|| {
        format!(
            "source {} is outside {}",
            source.display(),
            source_root.display()
        )
    })?;
    Ok(output_root.join(relative.with_extension(output_extension)))
}

pub struct ConversionPhase {
    source_dir: PathBuf,
    extension: String,
    output_dir: PathBuf,
    output_extension: String,
    template: String,
    worker: Arc<dyn Worker>,
    paths: StatePaths,
    timeout: Option<Duration>,
    dry_run: bool,
}

impl ConversionPhase {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        source_dir: PathBuf,
        extension: String,
        output_dir: PathBuf,
        output_extension: String,
        template: String,
        worker: Arc<dyn Worker>,
        paths: StatePaths,
        timeout: Option<Duration>,
        dry_run: bool,
    ) -> Self {
        Self {
            source_dir,
            extension,
            output_dir,
            output_extension,
            template,
            worker,
            paths,
            timeout,
            dry_run,
        }
    }
}

impl Phase for ConversionPhase {
    type Item = PathBuf;

    fn name(&self) -> &'static str {
        "conversion"
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
        let output = mirror_output_path(
            &self.source_dir,
            item,
            &self.output_dir,
            &self.output_extension,
        )?;
        if !self.dry_run
            && let Some(parent) = output.parent()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("create output dir {}", parent.display()))?;
        }
        self.worker.invoke(&InvokeRequest {
            args: vec![
                item.display().to_string(),
                self.template.clone(),
                output.display().to_string(),
            ],
            log_path: self.paths.item_log_path(&self.label(item)),
            timeout: self.timeout,
        })
    }

    fn record(&self, _item: &PathBuf, _outcome: &TaskOutcome) -> Result<()> {
        Ok(())
    }
}
