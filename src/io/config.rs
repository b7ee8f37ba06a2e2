//! Orchestrator configuration stored under `.modrun/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Hard cap on `--parallel`, regardless of configuration.
pub const MAX_PARALLEL: u32 = 8;

/// Orchestrator configuration (TOML).
///
/// This file is intended to be edited by humans and must remain stable and
/// automatable. Missing fields default to sensible values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Path to the module document, relative to the workspace root.
    pub document_path: PathBuf,

    /// Upper bound for `--parallel` (itself capped at 8).
    pub max_parallel: u32,

    /// Dispatcher slot-wait poll interval in milliseconds.
    pub poll_interval_ms: u64,

    pub worker: WorkerConfig,
    pub discovery: DiscoveryConfig,
    pub timeouts: TimeoutConfig,
    pub validation: ValidationConfig,
    pub conversion: ConversionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct WorkerConfig {
    /// Analysis worker command; the rendered instruction is appended as the
    /// final argument.
    pub command: Vec<String>,
    /// Minijinja template for the per-item instruction. Variables: `module`,
    /// `parent` (empty for top-level items), `complexity`.
    pub instruction: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Fallback command run when the module document is missing. It must
    /// generate the document out-of-band; the run still exits asking for
    /// review. Empty = no fallback (missing document is fatal).
    pub command: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Per-complexity worker timeouts in seconds; `0` means unbounded.
    pub low_secs: u64,
    pub medium_secs: u64,
    pub high_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ValidationConfig {
    /// Validation command; the source file path is appended.
    pub command: Vec<String>,
    /// Directory scanned for source documents.
    pub source_dir: PathBuf,
    /// File extension selected by discovery (without the dot).
    pub extension: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ConversionConfig {
    /// Conversion command; source path, template reference, and output path
    /// are appended in that order.
    pub command: Vec<String>,
    /// Template reference handed to the conversion collaborator.
    pub template: String,
    /// Output root mirroring the source directory structure.
    pub output_dir: PathBuf,
    /// Extension of produced artifacts (without the dot).
    pub output_extension: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            command: vec!["claude".to_string(), "-p".to_string()],
            instruction: "Analyze the {{ module }} module\
                {% if parent %} of {{ parent }}{% endif %}."
                .to_string(),
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            low_secs: 300,
            medium_secs: 600,
            high_secs: 900,
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            command: vec!["pandoc".to_string(), "--verbose".to_string(), "-o".to_string(), "/dev/null".to_string()],
            source_dir: PathBuf::from("docs"),
            extension: "md".to_string(),
        }
    }
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            command: vec!["scripts/convert-doc".to_string()],
            template: "templates/reference.docx".to_string(),
            output_dir: PathBuf::from("converted"),
            output_extension: "docx".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            document_path: PathBuf::from("modules.json"),
            max_parallel: MAX_PARALLEL,
            poll_interval_ms: 100,
            worker: WorkerConfig::default(),
            discovery: DiscoveryConfig::default(),
            timeouts: TimeoutConfig::default(),
            validation: ValidationConfig::default(),
            conversion: ConversionConfig::default(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.max_parallel == 0 || self.max_parallel > MAX_PARALLEL {
            return Err(anyhow!("max_parallel must be in 1..={MAX_PARALLEL}"));
        }
        if self.poll_interval_ms == 0 {
            return Err(anyhow!("poll_interval_ms must be > 0"));
        }
        for (name, command) in [
            ("worker.command", &self.worker.command),
            ("validation.command", &self.validation.command),
            ("conversion.command", &self.conversion.command),
        ] {
            if command.is_empty() || command[0].trim().is_empty() {
                return Err(anyhow!("{name} must be a non-empty array"));
            }
        }
        if self.worker.instruction.trim().is_empty() {
            return Err(anyhow!("worker.instruction must not be empty"));
        }
        if self.validation.extension.trim().is_empty() {
            return Err(anyhow!("validation.extension must not be empty"));
        }
        if self.conversion.output_extension.trim().is_empty() {
            return Err(anyhow!("conversion.output_extension must not be empty"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `Config::default()`.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        let cfg = Config::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: Config =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &Config) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, buf)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        let cfg = Config::default();
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(&path, "max_parallel = 2\n[worker]\ncommand = [\"true\"]\n").expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.max_parallel, 2);
        assert_eq!(cfg.worker.command, vec!["true".to_string()]);
        assert_eq!(cfg.timeouts, TimeoutConfig::default());
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut cfg = Config {
            max_parallel: 0,
            ..Config::default()
        };
        assert!(cfg.validate().is_err());

        cfg.max_parallel = 4;
        cfg.worker.command = Vec::new();
        assert!(cfg.validate().is_err());
    }
}
