use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::runner::EngineError;

/// One completed scan, persisted after the run finishes. Never mutated once
/// appended.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScanSession {
    pub id: u64,
    pub url: String,
    pub mode: String,
    pub wordlist: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub total_requests: u64,
    pub found_count: u64,
    pub config: Value,
    pub results: Vec<Value>,
}

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("failed to read history '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write history '{path}': {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode history '{path}': {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode session: {source}")]
    Encode {
        #[source]
        source: serde_json::Error,
    },
}

/// Append-only session store backed by a single JSON file. Session ids
/// auto-increment; `list` reads the whole file once and returns the most
/// recent sessions first.
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, EngineError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| EngineError::HistoryOpen {
                path: path.display().to_string(),
                source: e,
            })?;
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Vec<ScanSession>, HistoryError> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(HistoryError::Read {
                    path: self.path.display().to_string(),
                    source: e,
                })
            }
        };
        serde_json::from_str(&contents).map_err(|e| HistoryError::Decode {
            path: self.path.display().to_string(),
            source: e,
        })
    }

    /// Appends a finalized session and returns its assigned id. Prior
    /// sessions are never mutated or deleted.
    pub async fn record(&self, mut session: ScanSession) -> Result<u64, HistoryError> {
        let mut sessions = self.load().await?;
        let id = sessions.iter().map(|s| s.id).max().unwrap_or(0) + 1;
        session.id = id;
        sessions.push(session);
        let encoded = serde_json::to_string_pretty(&sessions)
            .map_err(|e| HistoryError::Encode { source: e })?;
        tokio::fs::write(&self.path, encoded)
            .await
            .map_err(|e| HistoryError::Write {
                path: self.path.display().to_string(),
                source: e,
            })?;
        tracing::info!(id, path = %self.path.display(), "scan session recorded");
        Ok(id)
    }

    /// Most recent sessions first, at most `limit` of them.
    pub async fn list(&self, limit: usize) -> Result<Vec<ScanSession>, HistoryError> {
        let mut sessions = self.load().await?;
        sessions.sort_by(|a, b| b.id.cmp(&a.id));
        sessions.truncate(limit);
        Ok(sessions)
    }
}
