//! State directory layout under `.modrun/`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Resolved locations of every orchestrator-owned artifact.
#[derive(Debug, Clone)]
pub struct StatePaths {
    pub root: PathBuf,
    pub modrun_dir: PathBuf,
    pub state_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub config_path: PathBuf,
    pub queue_snapshot_path: PathBuf,
    pub retry_path: PathBuf,
    pub session_path: PathBuf,
    pub run_log_path: PathBuf,
}

impl StatePaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let modrun_dir = root.join(".modrun");
        let state_dir = modrun_dir.join("state");
        let logs_dir = modrun_dir.join("logs");
        Self {
            root,
            config_path: modrun_dir.join("config.toml"),
            run_log_path: modrun_dir.join("run.log"),
            queue_snapshot_path: state_dir.join("queue.json"),
            retry_path: state_dir.join("retry.list"),
            session_path: state_dir.join("session.json"),
            modrun_dir,
            state_dir,
            logs_dir,
        }
    }

    /// Create the state directories if missing.
    pub fn ensure_layout(&self) -> Result<()> {
        for dir in [&self.modrun_dir, &self.state_dir, &self.logs_dir] {
            fs::create_dir_all(dir)
                .with_context(|| format!("create directory {}", dir.display()))?;
        }
        Ok(())
    }

    /// Per-item log artifact path. Labels may contain `/` (child items, file
    /// paths), which is flattened so every log lives directly in `logs/`.
    pub fn item_log_path(&self, label: &str) -> PathBuf {
        self.logs_dir.join(format!("{}.log", sanitize(label)))
    }
}

fn sanitize(label: &str) -> String {
    label
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}
