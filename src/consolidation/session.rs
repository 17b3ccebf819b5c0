//! Append-only audit trail of consolidation runs.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::memory::store::MemoryStore;
use crate::memory::types::{ConsolidationSession, SessionType};

/// Headline counts stored in the session's typed columns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionCounts {
    /// Nodes promoted, decayed or evicted.
    pub nodes_processed: u64,
    /// Nodes that reached long-term memory.
    pub patterns_discovered: u64,
    /// Nodes promoted to any higher tier.
    pub connections_strengthened: u64,
}

/// Insert one session row and return it.
pub fn record_session(
    store: &dyn MemoryStore,
    owner_id: &str,
    session_type: SessionType,
    started_at: DateTime<Utc>,
    counts: SessionCounts,
    metadata: serde_json::Map<String, serde_json::Value>,
) -> Result<ConsolidationSession> {
    let session = ConsolidationSession {
        id: uuid::Uuid::now_v7().to_string(),
        owner_id: owner_id.to_string(),
        started_at,
        session_type,
        nodes_processed: counts.nodes_processed,
        patterns_discovered: counts.patterns_discovered,
        connections_strengthened: counts.connections_strengthened,
        metadata,
    };
    store.insert_session(&session)?;
    tracing::debug!(
        session_id = %session.id,
        owner_id = %owner_id,
        session_type = %session_type,
        nodes_processed = counts.nodes_processed,
        "consolidation session recorded"
    );
    Ok(session)
}
