//! Error taxonomy for every storage, document, and search operation.
//!
//! [`KnowledgeError`] is what the core returns; [`ErrorPayload`] is the
//! structured body a front-end sends back to a caller. Payload messages are
//! built from the error's `Display`, which never includes filesystem paths or
//! directory slugs. Internal detail goes to the log under the same trace id.

use serde::Serialize;
use thiserror::Error;

/// The kind of resource a `NotFound` / `AlreadyExists` refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Project,
    MainDocument,
    Document,
    Chapter,
    Section,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Project => "project",
            Self::MainDocument => "main document",
            Self::Document => "document",
            Self::Chapter => "chapter",
            Self::Section => "section",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum KnowledgeError {
    #[error("invalid path: {reason}")]
    InvalidPath { reason: String },

    #[error("invalid content: {message}")]
    InvalidContent { message: String },

    #[error("{kind} not found: {name}")]
    NotFound { kind: ResourceKind, name: String },

    #[error("{kind} already exists: {name}")]
    AlreadyExists { kind: ResourceKind, name: String },

    #[error("file system error while trying to {operation}: {}", .source.kind())]
    FileSystem {
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("version control error: {message}")]
    VersionControl { message: String },
}

impl KnowledgeError {
    pub fn invalid_path(reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            reason: reason.into(),
        }
    }

    pub fn invalid_content(message: impl Into<String>) -> Self {
        Self::InvalidContent {
            message: message.into(),
        }
    }

    pub fn not_found(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    pub fn already_exists(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self::AlreadyExists {
            kind,
            name: name.into(),
        }
    }

    pub fn fs(operation: impl Into<String>, source: std::io::Error) -> Self {
        Self::FileSystem {
            operation: operation.into(),
            source,
        }
    }

    pub fn vcs(message: impl Into<String>) -> Self {
        Self::VersionControl {
            message: message.into(),
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidPath { .. } => "INVALID_PATH",
            Self::InvalidContent { .. } => "INVALID_CONTENT",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::AlreadyExists { .. } => "ALREADY_EXISTS",
            Self::FileSystem { .. } => "FILE_SYSTEM_ERROR",
            Self::VersionControl { .. } => "VERSION_CONTROL_ERROR",
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, KnowledgeError>;

/// Structured failure body returned to callers.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorPayload {
    pub success: bool,
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    pub trace_id: String,
    pub timestamp: String,
}

impl ErrorPayload {
    /// Build a payload and log the underlying error under a fresh trace id.
    pub fn new(err: &KnowledgeError, project_id: Option<&str>, filename: Option<&str>) -> Self {
        let trace_id = uuid::Uuid::now_v7().to_string();
        tracing::error!(
            trace_id = %trace_id,
            code = err.code(),
            project_id = ?project_id,
            filename = ?filename,
            error = ?err,
            "operation failed"
        );
        Self {
            success: false,
            code: err.code(),
            message: err.to_string(),
            project_id: project_id.map(str::to_string),
            filename: filename.map(str::to_string),
            trace_id,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(
                r#"{{"success":false,"code":"{}","trace_id":"{}"}}"#,
                self.code, self.trace_id
            )
        })
    }
}
