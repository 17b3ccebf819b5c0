use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The `system_status` tool takes no arguments.
#[derive(Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct SystemStatusParams {}
