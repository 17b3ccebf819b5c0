pub mod capture_memory;
pub mod force_consolidation;
pub mod memory_stats;
pub mod recent_sessions;
pub mod schedule;
pub mod system_status;

use capture_memory::{CaptureMemoryParams, TouchMemoryParams};
use chrono::Utc;
use force_consolidation::ForceConsolidationParams;
use memory_stats::MemoryStatsParams;
use recent_sessions::RecentSessionsParams;
use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::{tool, tool_handler, tool_router, ServerHandler};
use schedule::ScheduleParams;
use std::sync::Arc;
use system_status::SystemStatusParams;

use crate::memory::store::MemoryStore;
use crate::memory::types::NewNode;
use crate::scheduler::registry::ScheduleKind;
use crate::scheduler::Scheduler;

/// The Recollect MCP tool handler. Holds the shared scheduler and store and
/// exposes all MCP tools via the `#[tool_router]` macro.
#[derive(Clone)]
pub struct RecollectTools {
    tool_router: ToolRouter<Self>,
    scheduler: Arc<Scheduler>,
    store: Arc<dyn MemoryStore>,
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string(value).map_err(|e| format!("serialization failed: {e}"))
}

#[tool_router]
impl RecollectTools {
    pub fn new(scheduler: Arc<Scheduler>, store: Arc<dyn MemoryStore>) -> Self {
        Self {
            tool_router: Self::tool_router(),
            scheduler,
            store,
        }
    }

    /// Capture a new working-tier memory.
    #[tool(description = "Capture a new memory for an owner. It starts in the working tier and is promoted, decayed or evicted by consolidation.")]
    async fn capture_memory(
        &self,
        Parameters(params): Parameters<CaptureMemoryParams>,
    ) -> Result<String, String> {
        if params.content.is_empty() {
            return Err("content must not be empty".into());
        }
        let activation = params.activation.unwrap_or(1.0);
        if !(0.0..=1.0).contains(&activation) {
            return Err("activation must be between 0.0 and 1.0".into());
        }

        let mut node = NewNode::working(params.owner_id, params.content);
        node.activation_strength = activation;
        node.is_sensitive = params.sensitive.unwrap_or(false);

        tracing::info!(
            owner_id = %node.owner_id,
            content_len = node.content.len(),
            sensitive = node.is_sensitive,
            "capture_memory called"
        );

        let store = Arc::clone(&self.store);
        let stored = tokio::task::spawn_blocking(move || store.insert_node(&node, Utc::now()))
            .await
            .map_err(|e| format!("db task failed: {e}"))?
            .map_err(|e| format!("capture failed: {e}"))?;

        to_json(&stored)
    }

    /// Record that a memory was used.
    #[tool(description = "Mark a memory as just used: refreshes its last access time and raises its activation.")]
    async fn touch_memory(
        &self,
        Parameters(params): Parameters<TouchMemoryParams>,
    ) -> Result<String, String> {
        let store = Arc::clone(&self.store);
        let id = params.id.clone();
        let found = tokio::task::spawn_blocking(move || store.touch_node(&id, Utc::now()))
            .await
            .map_err(|e| format!("db task failed: {e}"))?
            .map_err(|e| format!("touch failed: {e}"))?;

        if !found {
            return Err(format!("memory not found: {}", params.id));
        }
        Ok(serde_json::json!({ "id": params.id, "touched": true }).to_string())
    }

    /// Run a manual consolidation now.
    #[tool(description = "Consolidate an owner's memories immediately. Returns counts of nodes promoted, decayed and evicted, or already_running if a run is in progress.")]
    async fn force_consolidation(
        &self,
        Parameters(params): Parameters<ForceConsolidationParams>,
    ) -> Result<String, String> {
        tracing::info!(owner_id = %params.owner_id, "force_consolidation called");
        let outcome = self.scheduler.force_consolidation(&params.owner_id).await;
        let mut body = serde_json::to_value(&outcome)
            .map_err(|e| format!("serialization failed: {e}"))?;
        body["success"] = outcome.is_success().into();
        body["message"] = outcome.message().into();
        Ok(body.to_string())
    }

    /// Run one schedule now for every owner.
    #[tool(description = "Run the hourly, daily or weekly consolidation immediately for every owner, even if disabled, then advance its next run.")]
    async fn force_schedule(
        &self,
        Parameters(params): Parameters<ScheduleParams>,
    ) -> Result<String, String> {
        let kind: ScheduleKind = params.schedule.parse().map_err(|e| format!("{e}"))?;
        let outcome = self.scheduler.force_schedule(kind, Utc::now()).await;
        to_json(&outcome)
    }

    /// Enable or disable a schedule.
    #[tool(description = "Toggle a consolidation schedule ('hourly', 'daily', 'weekly') on or off.")]
    async fn toggle_schedule(
        &self,
        Parameters(params): Parameters<ScheduleParams>,
    ) -> Result<String, String> {
        let kind: ScheduleKind = params.schedule.parse().map_err(|e| format!("{e}"))?;
        let enabled = self.scheduler.toggle_schedule(kind).await;
        Ok(serde_json::json!({ "schedule": kind, "enabled": enabled }).to_string())
    }

    /// Scheduler health.
    #[tool(description = "Get scheduler status: enabled schedules, next execution, and whether a consolidation is running.")]
    async fn system_status(
        &self,
        Parameters(_params): Parameters<SystemStatusParams>,
    ) -> Result<String, String> {
        to_json(&self.scheduler.system_status())
    }

    /// Per-tier statistics for an owner.
    #[tool(description = "Get memory statistics for an owner: node counts and average activation per tier.")]
    async fn memory_stats(
        &self,
        Parameters(params): Parameters<MemoryStatsParams>,
    ) -> Result<String, String> {
        let stats = self
            .scheduler
            .memory_stats(&params.owner_id)
            .await
            .map_err(|e| format!("stats failed: {e}"))?;
        to_json(&stats)
    }

    /// Latest consolidation sessions for an owner.
    #[tool(description = "List an owner's most recent consolidation sessions, newest first.")]
    async fn recent_sessions(
        &self,
        Parameters(params): Parameters<RecentSessionsParams>,
    ) -> Result<String, String> {
        let limit = params.limit.unwrap_or(10).clamp(1, 100);
        let sessions = self
            .scheduler
            .recent_sessions(&params.owner_id, limit)
            .await
            .map_err(|e| format!("session query failed: {e}"))?;
        to_json(&sessions)
    }
}

#[tool_handler]
impl ServerHandler for RecollectTools {
    fn get_info(&self) -> rmcp::model::ServerInfo {
        rmcp::model::ServerInfo {
            instructions: Some(
                "Recollect keeps tiered memories and consolidates them on a schedule. Use \
                 capture_memory to add memories, force_consolidation to run a pass now, and \
                 system_status or memory_stats to inspect state."
                    .into(),
            ),
            capabilities: rmcp::model::ServerCapabilities::builder()
                .enable_tools()
                .build(),
            ..Default::default()
        }
    }
}
