mod cli;
mod server;
mod tools;

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use knowledge_mcp::config::KnowledgeConfig;

#[derive(Parser)]
#[command(
    name = "knowledge-mcp",
    version,
    about = "Git-versioned project knowledge MCP server for AI assistants"
)]
struct Cli {
    /// Config file (defaults to <config_dir>/knowledge-mcp/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the MCP server (transport from config: stdio or http)
    Serve {
        /// Override the configured transport
        #[arg(long)]
        transport: Option<String>,
    },
    /// Search a project's knowledge documents
    Search {
        /// Project identifier
        project: String,
        /// Space-separated keywords
        query: String,
    },
    /// List registered projects and their documents
    Projects,
    /// Check storage, git, and the project index
    Doctor,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => KnowledgeConfig::load_from(path)?,
        None => KnowledgeConfig::load()?,
    };

    // Log to stderr so stdout stays clean for MCP JSON-RPC.
    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Serve { transport } => {
            let transport = transport.unwrap_or_else(|| config.server.transport.clone());
            match transport.as_str() {
                "stdio" => server::serve_stdio(config).await?,
                "http" => server::serve_http(config).await?,
                other => bail!("unknown transport '{other}', expected stdio or http"),
            }
        }
        Command::Search { project, query } => {
            cli::search::search(&config, &project, &query).await?;
        }
        Command::Projects => {
            cli::projects::projects(&config).await?;
        }
        Command::Doctor => {
            cli::doctor::doctor(&config).await?;
        }
    }

    Ok(())
}
