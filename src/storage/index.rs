//! Project identifier → directory slug index.
//!
//! Persisted as `index.json` at the storage root. The map itself is never
//! handed out; callers go through [`ProjectIndex::resolve`],
//! [`ProjectIndex::get_or_create`] and [`ProjectIndex::remove`]. Every access
//! runs under the global [`INDEX_KEY`] nested with the index file's own key,
//! so two concurrent registrations can never both see a slug as free.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{KnowledgeError, ResourceKind, Result};
use crate::storage::git::GitSync;
use crate::storage::lock::{LockManager, INDEX_KEY};
use crate::storage::{atomic_write, sandbox, slug, PROJECTS_DIR};

pub const INDEX_FILE: &str = "index.json";

/// Longest accepted project identifier, in bytes.
pub const MAX_PROJECT_ID_LEN: usize = 512;

/// Result of [`ProjectIndex::health`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct IndexHealth {
    /// `index.json` exists.
    pub present: bool,
    /// `index.json` parses; a missing file counts as valid.
    pub valid: bool,
    pub projects: usize,
    /// Registered projects whose directory is missing.
    pub missing_dirs: Vec<String>,
    /// Directories under `projects/` that no project is registered to.
    pub orphan_dirs: Vec<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct IndexDocument {
    #[serde(default)]
    projects: BTreeMap<String, String>,
}

pub struct ProjectIndex {
    root: PathBuf,
    locks: Arc<LockManager>,
    git: Arc<GitSync>,
}

impl ProjectIndex {
    pub fn new(root: impl Into<PathBuf>, locks: Arc<LockManager>, git: Arc<GitSync>) -> Self {
        Self {
            root: root.into(),
            locks,
            git,
        }
    }

    pub fn index_path(&self) -> PathBuf {
        self.root.join(INDEX_FILE)
    }

    /// Directory of an already registered project. Never registers.
    pub async fn resolve(&self, project_id: &str) -> Result<PathBuf> {
        check_project_id(project_id)?;
        let slug = self
            .with_index_lock(|| async { self.load().await.projects.get(project_id).cloned() })
            .await
            .ok_or_else(|| KnowledgeError::not_found(ResourceKind::Project, project_id))?;
        self.project_dir(&slug)
    }

    /// Directory of a project, registering it (and committing the index)
    /// when it is new. The directory exists on return.
    pub async fn get_or_create(&self, project_id: &str) -> Result<PathBuf> {
        check_project_id(project_id)?;
        let dir = self
            .with_index_lock(|| self.get_or_create_locked(project_id))
            .await?;
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| KnowledgeError::fs("create the project directory", e))?;
        Ok(dir)
    }

    /// Unregister a project and delete its directory.
    pub async fn remove(&self, project_id: &str) -> Result<()> {
        check_project_id(project_id)?;
        self.with_index_lock(|| self.remove_locked(project_id)).await
    }

    /// Registered project identifiers, sorted.
    pub async fn project_ids(&self) -> Vec<String> {
        self.with_index_lock(|| async { self.load().await.projects.into_keys().collect() })
            .await
    }

    /// Inspect the index file and every registered directory.
    pub async fn health(&self) -> IndexHealth {
        self.with_index_lock(|| async {
            let path = self.index_path();
            let present = path.exists();
            let valid = match tokio::fs::read_to_string(&path).await {
                Ok(raw) => serde_json::from_str::<IndexDocument>(&raw).is_ok(),
                Err(_) => !present,
            };
            let index = self.load().await;
            let missing_dirs = index
                .projects
                .iter()
                .filter(|(_, slug)| !self.slug_dir_exists(slug))
                .map(|(id, _)| id.clone())
                .collect();
            let registered: HashSet<&str> = index.projects.values().map(String::as_str).collect();
            let orphan_dirs = self
                .project_dir_names()
                .await
                .into_iter()
                .filter(|name| !registered.contains(name.as_str()))
                .collect();
            IndexHealth {
                present,
                valid,
                projects: index.projects.len(),
                missing_dirs,
                orphan_dirs,
            }
        })
        .await
    }

    async fn get_or_create_locked(&self, project_id: &str) -> Result<PathBuf> {
        let mut index = self.load().await;
        if let Some(existing) = index.projects.get(project_id) {
            return self.project_dir(existing);
        }

        let taken: HashSet<&str> = index.projects.values().map(String::as_str).collect();
        let base = slug::slugify(project_id);
        let mut candidate = base.clone();
        let mut counter = 1;
        while taken.contains(candidate.as_str()) || self.slug_dir_exists(&candidate) {
            candidate = format!("{base}-{counter}");
            counter += 1;
        }
        let dir = self.project_dir(&candidate)?;

        index
            .projects
            .insert(project_id.to_string(), candidate.clone());
        self.store(&index).await?;
        self.git
            .commit_and_push(&format!("Register project: {project_id}"))
            .await?;

        tracing::info!(project_id, slug = %candidate, "registered project");
        Ok(dir)
    }

    async fn remove_locked(&self, project_id: &str) -> Result<()> {
        let mut index = self.load().await;
        let slug = index
            .projects
            .remove(project_id)
            .ok_or_else(|| KnowledgeError::not_found(ResourceKind::Project, project_id))?;
        let dir = self.project_dir(&slug)?;

        // Directory first: a failed delete leaves the project registered.
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(KnowledgeError::fs("delete the project directory", e)),
        }
        self.store(&index).await?;
        self.git
            .commit_and_push(&format!("Remove project: {project_id}"))
            .await?;

        if self.slug_dir_exists(&slug) {
            tracing::warn!(project_id, slug = %slug, "project directory reappeared after removal");
        }
        tracing::info!(project_id, slug = %slug, "removed project");
        Ok(())
    }

    async fn with_index_lock<F, Fut, T>(&self, op: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = T>,
    {
        let index_path = self.index_path();
        self.locks
            .with_lock(INDEX_KEY, || self.locks.with_path_lock(&index_path, op))
            .await
    }

    /// Read the index. Missing or corrupt files read as empty.
    async fn load(&self) -> IndexDocument {
        let path = self.index_path();
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return IndexDocument::default(),
            Err(e) => {
                tracing::warn!(error = %e, "failed to read project index, treating as empty");
                return IndexDocument::default();
            }
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "project index is corrupt, treating as empty");
            IndexDocument::default()
        })
    }

    async fn store(&self, index: &IndexDocument) -> Result<()> {
        let json = serde_json::to_string_pretty(index)
            .map_err(|e| KnowledgeError::invalid_content(format!("index serialization: {e}")))?;
        atomic_write(&self.index_path(), format!("{json}\n")).await
    }

    fn project_dir(&self, slug: &str) -> Result<PathBuf> {
        sandbox::validate(&self.root, &format!("{PROJECTS_DIR}/{slug}"))
    }

    fn slug_dir_exists(&self, slug: &str) -> bool {
        Path::new(&self.root).join(PROJECTS_DIR).join(slug).exists()
    }

    /// Names of the directories under `projects/`, sorted.
    async fn project_dir_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        let Ok(mut entries) = tokio::fs::read_dir(self.root.join(PROJECTS_DIR)).await else {
            return names;
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            let is_dir = entry.file_type().await.is_ok_and(|t| t.is_dir());
            if let (true, Some(name)) = (is_dir, entry.file_name().to_str()) {
                names.push(name.to_string());
            }
        }
        names.sort();
        names
    }
}

fn check_project_id(project_id: &str) -> Result<()> {
    if project_id.trim().is_empty() {
        return Err(KnowledgeError::invalid_content("project id cannot be empty"));
    }
    if project_id.len() > MAX_PROJECT_ID_LEN {
        return Err(KnowledgeError::invalid_content("project id is too long"));
    }
    if project_id.contains('\0') {
        return Err(KnowledgeError::invalid_content("project id contains a NUL byte"));
    }
    Ok(())
}
