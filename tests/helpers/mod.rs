#![allow(dead_code)]

use knowledge_mcp::config::KnowledgeConfig;
use knowledge_mcp::knowledge::types::{NewChapter, NewDocument};
use knowledge_mcp::knowledge::KnowledgeStore;
use knowledge_mcp::storage::git;
use tempfile::TempDir;

/// Open a store in a fresh temp directory with git switched off.
pub async fn test_store() -> (TempDir, KnowledgeStore) {
    let tmp = TempDir::new().unwrap();
    let store = KnowledgeStore::open(&KnowledgeConfig::for_root(tmp.path()))
        .await
        .unwrap();
    (tmp, store)
}

/// Open a store with git enabled, or `None` when git is not installed.
pub async fn git_store() -> Option<(TempDir, KnowledgeStore)> {
    if !git::git_available().await {
        return None;
    }
    let tmp = TempDir::new().unwrap();
    let mut config = KnowledgeConfig::for_root(tmp.path());
    config.git.enabled = true;
    let store = KnowledgeStore::open(&config).await.unwrap();
    Some((tmp, store))
}

/// A document request with the given filename and chapters `(title, body)`.
pub fn new_document(filename: &str, keywords: &[&str], chapters: &[(&str, &str)]) -> NewDocument {
    NewDocument {
        filename: filename.to_string(),
        title: filename.to_string(),
        introduction: String::new(),
        keywords: keywords.iter().map(|k| k.to_string()).collect(),
        chapters: chapters
            .iter()
            .map(|(title, body)| NewChapter::new(*title, *body))
            .collect(),
    }
}
