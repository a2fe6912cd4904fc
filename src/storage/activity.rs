//! Append-only activity log (`activity.log`, ignored by git).
//!
//! One JSON object per line. Appends are serialized through the lock manager
//! under the log's path; a failed append is logged and never propagates.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use crate::storage::lock::LockManager;

pub const ACTIVITY_FILE: &str = "activity.log";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActivityEntry {
    pub timestamp: String,
    pub operation: String,
    pub project_id: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub detail: Option<String>,
}

pub struct ActivityLog {
    path: PathBuf,
    locks: Arc<LockManager>,
}

impl ActivityLog {
    pub fn new(path: impl Into<PathBuf>, locks: Arc<LockManager>) -> Self {
        Self {
            path: path.into(),
            locks,
        }
    }

    pub async fn record(
        &self,
        operation: &str,
        project_id: &str,
        filename: Option<&str>,
        detail: Option<&str>,
    ) {
        let entry = ActivityEntry {
            timestamp: chrono::Utc::now().to_rfc3339(),
            operation: operation.to_string(),
            project_id: project_id.to_string(),
            filename: filename.map(str::to_string),
            detail: detail.map(str::to_string),
        };
        let line = match serde_json::to_string(&entry) {
            Ok(json) => format!("{json}\n"),
            Err(e) => {
                tracing::warn!(error = %e, "failed to encode activity entry");
                return;
            }
        };

        let result = self
            .locks
            .with_path_lock(&self.path, || async {
                let mut file = tokio::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&self.path)
                    .await?;
                file.write_all(line.as_bytes()).await?;
                file.flush().await
            })
            .await;

        if let Err(e) = result {
            tracing::warn!(error = %e, operation, "failed to append to activity log");
        }
    }

    /// Every entry in the log, oldest first. Unreadable lines are skipped.
    pub async fn entries(&self) -> Vec<ActivityEntry> {
        let raw = tokio::fs::read_to_string(&self.path).await.unwrap_or_default();
        raw.lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn appends_json_lines() {
        let tmp = TempDir::new().unwrap();
        let log = ActivityLog::new(tmp.path().join(ACTIVITY_FILE), Arc::new(LockManager::new()));

        log.record("create_document", "Demo", Some("api-guide.md"), None).await;
        log.record("delete_project", "Demo", None, Some("cleanup")).await;

        let entries = log.entries().await;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].operation, "create_document");
        assert_eq!(entries[0].filename.as_deref(), Some("api-guide.md"));
        assert_eq!(entries[1].detail.as_deref(), Some("cleanup"));
    }

    #[tokio::test]
    async fn unwritable_log_is_not_fatal() {
        let tmp = TempDir::new().unwrap();
        // A directory where the file should be makes every append fail.
        std::fs::create_dir(tmp.path().join(ACTIVITY_FILE)).unwrap();
        let log = ActivityLog::new(tmp.path().join(ACTIVITY_FILE), Arc::new(LockManager::new()));

        log.record("replace_main", "Demo", None, None).await;
        assert!(log.entries().await.is_empty());
    }
}
