//! MCP `capture_memory` and `touch_memory` tool parameter definitions.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `capture_memory` MCP tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct CaptureMemoryParams {
    #[schemars(description = "Owner of the new memory")]
    pub owner_id: String,

    #[schemars(description = "The natural language content of the memory")]
    pub content: String,

    #[schemars(description = "Initial activation strength 0.0-1.0. Defaults to 1.0.")]
    pub activation: Option<f64>,

    #[schemars(
        description = "Mark as sensitive: exempt from decay and eviction while protection is enabled"
    )]
    pub sensitive: Option<bool>,
}

/// Parameters for the `touch_memory` MCP tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct TouchMemoryParams {
    #[schemars(description = "ID of the memory that was just used")]
    pub id: String,
}
