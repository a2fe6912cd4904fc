//! Knowledge documents and the facade that operates on them.
//!
//! - [`frontmatter`]: closed YAML value model for document metadata
//! - [`document`]: parse, render, and chapter-level edits
//! - [`main_doc`]: `##` sections of a project's main document
//! - [`search`]: presence-based keyword search
//! - [`store`]: [`KnowledgeStore`], the entry point for every operation
//! - [`types`]: shared data types
//!
//! A project directory looks like:
//!
//! ```text
//! projects/<slug>/
//!   main.md
//!   knowledge/<document>.md
//! ```

pub mod document;
pub mod frontmatter;
pub mod main_doc;
pub mod search;
pub mod store;
pub mod types;

use std::path::{Path, PathBuf};

pub use store::KnowledgeStore;

use crate::error::{KnowledgeError, Result};
use crate::storage::sandbox;

/// Per-project main document.
pub const MAIN_FILE: &str = "main.md";

/// Per-project directory holding knowledge documents.
pub const KNOWLEDGE_DIR: &str = "knowledge";

/// Markdown files in a project's knowledge directory, sorted by name, each
/// with its sandbox-validated path. Entries that fail validation are skipped.
pub(crate) async fn markdown_files(project_dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    let dir = project_dir.join(KNOWLEDGE_DIR);
    let mut entries = match tokio::fs::read_dir(&dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(KnowledgeError::fs("list knowledge documents", e)),
    };

    let mut names = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| KnowledgeError::fs("list knowledge documents", e))?
    {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.ends_with(".md") {
            names.push(name);
        }
    }
    names.sort();

    let mut files = Vec::with_capacity(names.len());
    for name in names {
        match sandbox::validate(project_dir, &format!("{KNOWLEDGE_DIR}/{name}")) {
            Ok(path) => files.push((name, path)),
            Err(e) => tracing::warn!(file = %name, error = %e, "skipping knowledge file"),
        }
    }
    Ok(files)
}
