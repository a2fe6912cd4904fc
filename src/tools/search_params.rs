use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SearchParams {
    #[schemars(description = "Project identifier")]
    pub project_id: String,

    #[schemars(description = "Space-separated keywords, matched case-insensitively (e.g. 'api authentication')")]
    pub query: String,
}
