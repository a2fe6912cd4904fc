//! Terminal subcommands that run against the storage root without an MCP
//! client.

pub mod doctor;
pub mod projects;
pub mod search;

use anyhow::{Context, Result};

use knowledge_mcp::config::KnowledgeConfig;
use knowledge_mcp::knowledge::KnowledgeStore;

/// Open the configured store, bootstrapping it if needed.
pub(crate) async fn open_store(config: &KnowledgeConfig) -> Result<KnowledgeStore> {
    KnowledgeStore::open(config)
        .await
        .context("failed to open knowledge storage")
}
