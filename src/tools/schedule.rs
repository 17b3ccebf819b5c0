//! Parameters shared by the `force_schedule` and `toggle_schedule` MCP tools.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ScheduleParams {
    #[schemars(description = "Schedule to act on: 'hourly', 'daily' or 'weekly'")]
    pub schedule: String,
}
