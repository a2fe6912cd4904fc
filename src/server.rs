//! MCP server initialization for stdio and streamable HTTP transports.
//!
//! Both entry points open the [`KnowledgeStore`] once (bootstrap, git init,
//! startup pull) and share it with every session.

use std::sync::Arc;

use anyhow::{Context, Result};
use rmcp::ServiceExt;

use crate::tools::KnowledgeTools;
use knowledge_mcp::config::KnowledgeConfig;
use knowledge_mcp::knowledge::KnowledgeStore;

async fn open_store(config: &KnowledgeConfig) -> Result<Arc<KnowledgeStore>> {
    let store = KnowledgeStore::open(config)
        .await
        .context("failed to open knowledge storage")?;
    tracing::info!(root = %store.storage().path().display(), "knowledge store ready");
    Ok(Arc::new(store))
}

/// Start the MCP server over stdio transport.
pub async fn serve_stdio(config: KnowledgeConfig) -> Result<()> {
    tracing::info!("starting Knowledge MCP server on stdio");

    let store = open_store(&config).await?;
    let tools = KnowledgeTools::new(store);
    let transport = rmcp::transport::stdio();

    let server = tools.serve(transport).await?;
    tracing::info!("MCP server running, waiting for client");

    server.waiting().await?;
    tracing::info!("MCP server shut down");

    Ok(())
}

/// Start the MCP server over streamable HTTP at `/mcp`.
pub async fn serve_http(config: KnowledgeConfig) -> Result<()> {
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!(addr = %bind_addr, "starting Knowledge MCP server on HTTP");

    let store = open_store(&config).await?;

    let service = rmcp::transport::streamable_http_server::StreamableHttpService::new(
        move || Ok(KnowledgeTools::new(Arc::clone(&store))),
        rmcp::transport::streamable_http_server::session::local::LocalSessionManager::default()
            .into(),
        Default::default(),
    );

    let router = axum::Router::new().nest_service("/mcp", service);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    tracing::info!(addr = %bind_addr, "MCP server listening at http://{bind_addr}/mcp");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
            }
            tracing::info!("shutting down HTTP server");
        })
        .await?;

    Ok(())
}
