//! Core knowledge type definitions.
//!
//! [`Document`] is a parsed knowledge file: [`Metadata`] from the front
//! matter, free introduction text, and ordered [`Chapter`]s. Chapters are
//! addressed with [`ChapterRef`] and placed with [`InsertPosition`].

use serde::{Deserialize, Serialize};

pub use super::frontmatter::{MetaValue, Metadata};

/// A heading-delimited section of a knowledge document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chapter {
    /// Heading text; case-sensitive identity within its document.
    pub title: String,
    /// Heading depth, 2 to 4.
    pub level: u8,
    /// First text run after the heading.
    pub summary: String,
    /// Verbatim markdown from the heading line up to the next heading.
    pub content: String,
}

/// A parsed knowledge document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    pub metadata: Metadata,
    /// Text before the first chapter heading.
    pub introduction: String,
    pub chapters: Vec<Chapter>,
}

/// Chapter input for document creation and insertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewChapter {
    pub title: String,
    /// Body text without the heading line.
    pub content: String,
}

impl NewChapter {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
        }
    }
}

/// How a caller names a chapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChapterRef {
    /// Exact, case-sensitive title match.
    Title(String),
    /// Zero-based position in document order.
    Index(usize),
}

impl std::fmt::Display for ChapterRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Title(title) => f.write_str(title),
            Self::Index(index) => write!(f, "#{index}"),
        }
    }
}

impl From<&str> for ChapterRef {
    fn from(title: &str) -> Self {
        Self::Title(title.to_string())
    }
}

/// Where a new chapter goes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum InsertPosition {
    Start,
    #[default]
    End,
    Before(ChapterRef),
    After(ChapterRef),
}

/// Listing entry for a knowledge document.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentSummary {
    pub filename: String,
    pub title: String,
    pub keywords: Vec<String>,
    pub created: String,
    pub updated: String,
    pub chapter_count: usize,
}

/// Everything needed to create a knowledge document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewDocument {
    /// Caller's name for the file; normalised before use.
    pub filename: String,
    pub title: String,
    #[serde(default)]
    pub introduction: String,
    pub keywords: Vec<String>,
    #[serde(default)]
    pub chapters: Vec<NewChapter>,
}
