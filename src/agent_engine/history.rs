use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::PathBuf;

use crate::agent_engine::chat::ChatEntry;
use crate::errors::SheetPilotResult;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub ts: i64,
    pub playground: String,
    #[serde(flatten)]
    pub entry: ChatEntry,
}

/// Append-only JSONL transcript of one shell session.
pub struct SessionHistory {
    pub session_id: String,
    file_path: Option<PathBuf>,
}

impl SessionHistory {
    /// A history that writes under the user's data directory.
    pub fn new() -> Self {
        let session_id = uuid::Uuid::new_v4().to_string();
        let file_path = data_dir_or_cwd().join(format!("session_{session_id}.jsonl"));
        Self {
            session_id,
            file_path: Some(file_path),
        }
    }

    /// A history that writes into `dir`.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        let session_id = uuid::Uuid::new_v4().to_string();
        let file_path = dir.into().join(format!("session_{session_id}.jsonl"));
        Self {
            session_id,
            file_path: Some(file_path),
        }
    }

    /// A history that records nothing.
    pub fn disabled() -> Self {
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            file_path: None,
        }
    }

    pub fn file_path(&self) -> Option<&PathBuf> {
        self.file_path.as_ref()
    }

    /// Append one chat entry to the JSONL file.
    pub fn append(&self, playground: &str, entry: &ChatEntry) -> SheetPilotResult<()> {
        let Some(path) = &self.file_path else {
            return Ok(());
        };
        let record = HistoryEntry {
            ts: chrono::Utc::now().timestamp_millis(),
            playground: playground.to_string(),
            entry: entry.clone(),
        };
        let line = serde_json::to_string(&record)?;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        writeln!(file, "{}", line)?;
        tracing::trace!(path = %path.display(), "history entry flushed");
        Ok(())
    }
}

impl Default for SessionHistory {
    fn default() -> Self {
        Self::new()
    }
}

/// `<data_local_dir>/sheetpilot/sessions`, falling back to the working directory.
fn data_dir_or_cwd() -> PathBuf {
    if let Some(data_dir) = dirs::data_local_dir() {
        let d = data_dir.join("sheetpilot").join("sessions");
        if std::fs::create_dir_all(&d).is_ok() {
            return d;
        }
    }
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}
