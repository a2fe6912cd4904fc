//! Parameters for the main document tools.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ProjectParams {
    #[schemars(description = "Project identifier; may contain spaces and any characters (e.g. 'My Project')")]
    pub project_id: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct UpdateMainParams {
    #[schemars(description = "Project identifier. The project is created if it does not exist.")]
    pub project_id: String,

    #[schemars(description = "Full markdown content of the main document")]
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SectionParams {
    #[schemars(description = "Project identifier")]
    pub project_id: String,

    #[schemars(description = "Exact text of the '## ' section header, with or without the leading '## '")]
    pub section_header: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct UpdateSectionParams {
    #[schemars(description = "Project identifier")]
    pub project_id: String,

    #[schemars(description = "Exact text of the '## ' section header. A missing section is appended.")]
    pub section_header: String,

    #[schemars(description = "New section body, without the header line")]
    pub new_content: String,
}
