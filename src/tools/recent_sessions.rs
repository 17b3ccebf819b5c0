use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct RecentSessionsParams {
    #[schemars(description = "Owner whose consolidation sessions to list")]
    pub owner_id: String,

    /// Maximum number of sessions (1–100). Defaults to 10.
    #[schemars(description = "Maximum number of sessions to return (1-100). Defaults to 10.")]
    pub limit: Option<usize>,
}
