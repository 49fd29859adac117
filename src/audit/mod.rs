// ABOUTME: Append-only audit log of finished rollout attempts.
// ABOUTME: JSON Lines on disk, one attempt per line, synced on every append.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::rollout::RolloutAttempt;
use crate::types::{EnvironmentName, Revision};

#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("audit log I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode audit record: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Durable history of rollout attempts.
#[derive(Debug)]
pub struct AuditLog {
    path: PathBuf,
    append: Mutex<()>,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            append: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> AuditError {
        AuditError::Io {
            path: self.path.clone(),
            source,
        }
    }

    /// Append one finished attempt. Returns only after the line is on disk.
    pub async fn append(&self, attempt: &RolloutAttempt) -> Result<(), AuditError> {
        let mut line = serde_json::to_vec(attempt)?;
        line.push(b'\n');

        let _guard = self.append.lock().await;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(e))?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| self.io_error(e))?;
        file.write_all(&line).await.map_err(|e| self.io_error(e))?;
        file.sync_data().await.map_err(|e| self.io_error(e))?;

        tracing::debug!(
            attempt = %attempt.id.short(),
            environment = %attempt.environment,
            "audit record appended"
        );
        Ok(())
    }

    /// Every record in append order. Unparseable lines are skipped.
    pub async fn records(&self) -> Result<Vec<RolloutAttempt>, AuditError> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.io_error(e)),
        };

        let records = contents
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .filter_map(|(index, line)| match serde_json::from_str(line) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::warn!(line = index + 1, error = %e, "skipping unreadable audit record");
                    None
                }
            })
            .collect();
        Ok(records)
    }

    /// Attempts for one environment, newest first.
    pub async fn history(
        &self,
        environment: &EnvironmentName,
        limit: usize,
    ) -> Result<Vec<RolloutAttempt>, AuditError> {
        let records = self.records().await?;
        Ok(records
            .into_iter()
            .rev()
            .filter(|attempt| &attempt.environment == environment)
            .take(limit)
            .collect())
    }

    /// Revision of the most recent attempt per environment.
    pub async fn latest_revisions(&self) -> Result<HashMap<EnvironmentName, Revision>, AuditError> {
        let mut latest = HashMap::new();
        for attempt in self.records().await? {
            latest.insert(attempt.environment, attempt.revision);
        }
        Ok(latest)
    }
}
