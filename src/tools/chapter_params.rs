//! Parameters for the chapter tools.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct UpdateChapterParams {
    #[schemars(description = "Project identifier")]
    pub project_id: String,

    #[schemars(description = "Knowledge document name")]
    pub filename: String,

    #[schemars(description = "Exact, case-sensitive chapter title. Give this or chapter_index.")]
    pub chapter_title: Option<String>,

    #[schemars(description = "Zero-based chapter position. Give this or chapter_title.")]
    pub chapter_index: Option<usize>,

    #[schemars(description = "New chapter body, without the heading line. Heading and level are kept.")]
    pub new_content: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct AddChapterParams {
    #[schemars(description = "Project identifier")]
    pub project_id: String,

    #[schemars(description = "Knowledge document name")]
    pub filename: String,

    #[schemars(description = "Title of the new chapter; must be unique in the document")]
    pub chapter_title: String,

    #[schemars(description = "Body of the new chapter, without the heading line")]
    pub content: String,

    #[schemars(description = "'start', 'end' (default), 'before' or 'after'")]
    pub position: Option<String>,

    #[schemars(description = "Title of the chapter to insert before or after")]
    pub reference_chapter: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct RemoveChapterParams {
    #[schemars(description = "Project identifier")]
    pub project_id: String,

    #[schemars(description = "Knowledge document name")]
    pub filename: String,

    #[schemars(description = "Exact, case-sensitive chapter title. Give this or chapter_index.")]
    pub chapter_title: Option<String>,

    #[schemars(description = "Zero-based chapter position. Give this or chapter_title.")]
    pub chapter_index: Option<usize>,
}
