//! Session-start stamp at `.modrun/state/session.json`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    pub started_at: DateTime<Utc>,
    pub pid: u32,
}

/// Record the start of the current run, replacing any previous stamp.
pub fn write_session(path: &Path) -> Result<Session> {
    let session = Session {
        started_at: Utc::now(),
        pid: std::process::id(),
    };
    let mut buf = serde_json::to_string_pretty(&session)?;
    buf.push('\n');
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create session dir {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, buf)
        .with_context(|| format!("write temp session {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path)
        .with_context(|| format!("replace session {}", path.display()))?;
    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("session.json");
        let written = write_session(&path).expect("write");

        let contents = fs::read_to_string(&path).expect("read");
        let loaded: Session = serde_json::from_str(&contents).expect("parse");
        assert_eq!(loaded, written);
        assert_eq!(loaded.pid, std::process::id());
        assert!(!temp.path().join("session.json.tmp").exists());
    }
}
