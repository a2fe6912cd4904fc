use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct KnowledgeConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub git: GitConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub transport: String,
    pub host: String,
    pub port: u16,
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub root: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GitConfig {
    /// Disables every git invocation when `false`.
    pub enabled: bool,
    /// Remote used for the startup pull and post-commit pushes.
    pub remote: String,
    /// Branch to track on the remote. `None` follows the checked-out branch.
    pub branch: Option<String>,
    /// Upper bound for a single git invocation, in seconds.
    pub timeout_secs: u64,
    pub author_name: String,
    pub author_email: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            transport: "stdio".into(),
            host: "127.0.0.1".into(),
            port: 8765,
            log_level: "info".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: "~/.knowledge-mcp".into(),
        }
    }
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            remote: "origin".into(),
            branch: None,
            timeout_secs: 30,
            author_name: "Knowledge MCP Server".into(),
            author_email: "knowledge-mcp@localhost".into(),
        }
    }
}

/// Returns `<config_dir>/knowledge-mcp/config.toml`, falling back to the
/// home directory when the platform has no config directory.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("knowledge-mcp")
        .join("config.toml")
}

impl KnowledgeConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            KnowledgeConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides (KNOWLEDGE_MCP_HOME, KNOWLEDGE_MCP_LOG_LEVEL).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("KNOWLEDGE_MCP_HOME") {
            self.storage.root = val;
        }
        if let Ok(val) = std::env::var("KNOWLEDGE_MCP_LOG_LEVEL") {
            self.server.log_level = val;
        }
    }

    /// Resolve the storage root, expanding `~` if needed.
    pub fn resolved_root(&self) -> PathBuf {
        expand_tilde(&self.storage.root)
    }

    /// A config rooted at `root` with git switched off. Used by tests and
    /// embedders that manage versioning themselves.
    pub fn for_root(root: impl AsRef<Path>) -> Self {
        let mut config = Self::default();
        config.storage.root = root.as_ref().to_string_lossy().into_owned();
        config.git.enabled = false;
        config
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if path == "~" {
        return dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    }
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}
