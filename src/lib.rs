//! Centralised, git-versioned knowledge for AI assistants.
//!
//! Knowledge MCP replaces per-repository instruction files with a single
//! storage root holding, for each project, a free-form main document and a set
//! of structured knowledge documents (YAML front matter, an introduction, and
//! addressable chapters). Every write is serialized per file, written
//! atomically, and committed to git; pushes run in the background.
//!
//! # Architecture
//!
//! - **Sandbox**: every caller-influenced path is validated against the
//!   storage root, symlinks included
//! - **Concurrency**: a per-key FIFO lock manager; index updates nest under a
//!   global key
//! - **Versioning**: the `git` executable, with per-commit identity and
//!   bounded timeouts
//! - **Search**: exhaustive case-insensitive keyword scan with context excerpts
//! - **Transport**: MCP over stdio (primary) or streamable HTTP (binary only)
//!
//! # Modules
//!
//! - [`config`]: configuration from TOML files and environment variables
//! - [`error`]: error taxonomy and the structured failure payload
//! - [`storage`]: storage root, sandbox, slugs, locks, git, project index
//! - [`knowledge`]: documents, chapters, main document sections, search, and
//!   the [`knowledge::KnowledgeStore`] facade

pub mod config;
pub mod error;
pub mod knowledge;
pub mod storage;
