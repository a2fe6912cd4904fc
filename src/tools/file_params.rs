//! Parameters for the knowledge file tools.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A chapter supplied at creation time.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ChapterInput {
    #[schemars(description = "Chapter heading text (written as a '## ' heading)")]
    pub title: String,

    #[schemars(description = "Chapter body, without the heading line")]
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct CreateFileParams {
    #[schemars(description = "Project identifier. The project is created if it does not exist.")]
    pub project_id: String,

    #[schemars(description = "Document name; slugified, '.md' optional (e.g. 'API Guide' becomes 'api-guide.md')")]
    pub filename: String,

    #[schemars(description = "Human-readable document title")]
    pub title: String,

    #[schemars(description = "Text placed before the first chapter")]
    #[serde(default)]
    pub introduction: String,

    #[schemars(description = "Searchable keywords, at least one")]
    pub keywords: Vec<String>,

    #[schemars(description = "Chapters in order, at most 50, titles unique")]
    #[serde(default)]
    pub chapters: Vec<ChapterInput>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct FileParams {
    #[schemars(description = "Project identifier")]
    pub project_id: String,

    #[schemars(description = "Knowledge document name (e.g. 'api-guide.md')")]
    pub filename: String,
}
