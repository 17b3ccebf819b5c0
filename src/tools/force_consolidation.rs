//! MCP `force_consolidation` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `force_consolidation` MCP tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ForceConsolidationParams {
    #[schemars(description = "Owner whose memories should be consolidated now")]
    pub owner_id: String,
}
