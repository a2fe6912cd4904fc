//! Storage root and the primitives every knowledge operation is built on.
//!
//! - [`sandbox`]: containment checks for caller-influenced paths
//! - [`slug`]: filesystem-safe identifiers
//! - [`lock`]: per-resource FIFO operation serializer
//! - [`git`]: version control synchronizer
//! - [`index`]: project identifier to directory index
//! - [`activity`]: append-only activity log
//!
//! [`StorageRoot::open`] creates or verifies the layout:
//!
//! ```text
//! <root>/
//!   index.json
//!   .gitignore
//!   activity.log
//!   projects/<slug>/...
//! ```

pub mod activity;
pub mod git;
pub mod index;
pub mod lock;
pub mod sandbox;
pub mod slug;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::KnowledgeConfig;
use crate::error::{KnowledgeError, Result};
use activity::{ActivityLog, ACTIVITY_FILE};
use git::GitSync;
use index::ProjectIndex;
use lock::LockManager;

pub const PROJECTS_DIR: &str = "projects";
pub const GITIGNORE_FILE: &str = ".gitignore";
const README_FILE: &str = "README.md";

const GITIGNORE: &str = "activity.log\n*.tmp\n";
const README: &str = "# Knowledge MCP Storage\n\n\
This directory contains project knowledge managed by the Knowledge MCP server.\n";

/// Process-wide storage singleton: the root directory plus the shared
/// serializer, synchronizer, index, and activity log.
pub struct StorageRoot {
    root: PathBuf,
    locks: Arc<LockManager>,
    git: Arc<GitSync>,
    index: ProjectIndex,
    activity: ActivityLog,
}

impl StorageRoot {
    /// Create or verify the storage layout, initialise version control, and
    /// pull from the remote when one is configured.
    pub async fn open(config: &KnowledgeConfig) -> Result<Self> {
        let requested = config.resolved_root();
        tokio::fs::create_dir_all(requested.join(PROJECTS_DIR))
            .await
            .map_err(|e| KnowledgeError::fs("create the storage root", e))?;
        let root = tokio::fs::canonicalize(&requested)
            .await
            .map_err(|e| KnowledgeError::fs("resolve the storage root", e))?;

        let locks = Arc::new(LockManager::new());
        let git = Arc::new(GitSync::new(&root, config.git.clone(), Arc::clone(&locks)));
        let index = ProjectIndex::new(&root, Arc::clone(&locks), Arc::clone(&git));
        let activity = ActivityLog::new(root.join(ACTIVITY_FILE), Arc::clone(&locks));

        let storage = Self {
            root,
            locks,
            git,
            index,
            activity,
        };
        storage.bootstrap().await?;
        tracing::info!(root = %storage.root.display(), git = storage.git.is_enabled(), "storage ready");
        Ok(storage)
    }

    async fn bootstrap(&self) -> Result<()> {
        self.git.init().await?;

        let gitignore = self.root.join(GITIGNORE_FILE);
        if !gitignore.exists() {
            atomic_write(&gitignore, GITIGNORE.to_string()).await?;
        }

        if self.git.is_enabled() && !self.git.has_commits().await {
            let readme = self.root.join(README_FILE);
            if !readme.exists() {
                atomic_write(&readme, README.to_string()).await?;
            }
            self.git.commit_all("Initial commit").await?;
        }

        if let Err(e) = self.git.pull().await {
            tracing::warn!(error = %e, "startup pull failed, continuing with local state");
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn locks(&self) -> &Arc<LockManager> {
        &self.locks
    }

    pub fn git(&self) -> &Arc<GitSync> {
        &self.git
    }

    pub fn index(&self) -> &ProjectIndex {
        &self.index
    }

    pub fn activity(&self) -> &ActivityLog {
        &self.activity
    }
}

/// Write `contents` to a temp file beside `path`, then rename it into place.
/// Parent directories are created as needed.
pub async fn atomic_write(path: &Path, contents: String) -> Result<()> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || write_atomically(&path, contents.as_bytes()))
        .await
        .map_err(|e| KnowledgeError::fs("finish a write", std::io::Error::other(e)))?
}

fn write_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path.parent().ok_or_else(|| KnowledgeError::invalid_path("no parent directory"))?;
    std::fs::create_dir_all(dir).map_err(|e| KnowledgeError::fs("create a directory", e))?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(|e| KnowledgeError::fs("create a temporary file", e))?;
    tmp.write_all(bytes)
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|e| KnowledgeError::fs("write a temporary file", e))?;
    tmp.persist(path)
        .map_err(|e| KnowledgeError::fs("replace a file", e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn open_creates_layout() {
        let tmp = TempDir::new().unwrap();
        let config = KnowledgeConfig::for_root(tmp.path().join("store"));

        let storage = StorageRoot::open(&config).await.unwrap();
        assert!(storage.path().join(PROJECTS_DIR).is_dir());
        let ignore = std::fs::read_to_string(storage.path().join(GITIGNORE_FILE)).unwrap();
        assert!(ignore.contains("activity.log"));
        assert!(!storage.path().join(".git").exists());
    }

    #[tokio::test]
    async fn open_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let config = KnowledgeConfig::for_root(tmp.path());
        std::fs::write(tmp.path().join("existing.txt"), "keep me").unwrap();

        StorageRoot::open(&config).await.unwrap();
        StorageRoot::open(&config).await.unwrap();
        assert_eq!(
            std::fs::read_to_string(tmp.path().join("existing.txt")).unwrap(),
            "keep me"
        );
    }

    #[tokio::test]
    async fn open_with_git_makes_initial_commit() {
        if !git::git_available().await {
            return;
        }
        let tmp = TempDir::new().unwrap();
        let mut config = KnowledgeConfig::for_root(tmp.path());
        config.git.enabled = true;

        let storage = StorageRoot::open(&config).await.unwrap();
        assert!(storage.path().join(".git").is_dir());
        let subjects = storage.git().recent_subjects(5).await.unwrap();
        assert_eq!(subjects, vec!["Initial commit".to_string()]);

        // Reopening does not add commits.
        let storage = StorageRoot::open(&config).await.unwrap();
        assert_eq!(storage.git().recent_subjects(5).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn atomic_write_replaces_contents() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested/dir/file.md");
        atomic_write(&path, "one".into()).await.unwrap();
        atomic_write(&path, "two".into()).await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "two");

        let leftovers: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }
}
