//! The persistence contract consolidation runs against, plus its SQLite backing.
//!
//! [`MemoryStore`] filters, updates and deletes exactly what it is told. Owner
//! scoping and sensitive-node exclusion are decided by the caller (the decay
//! engine), never by the store. Every bulk call runs in
//! its own transaction so a failed batch leaves other batches untouched.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, ToSql};
use serde::Serialize;
use std::sync::{Mutex, MutexGuard};

use crate::memory::types::{CognitiveNode, ConsolidationSession, MemoryTier, NewNode};
use crate::scheduler::registry::{Schedule, ScheduleKind};

/// Predicates for [`MemoryStore::list_nodes`]. The default matches every node of the owner.
#[derive(Debug, Clone, Default)]
pub struct NodeFilter {
    /// Restrict to these tiers; empty means all tiers.
    pub tiers: Vec<MemoryTier>,
    /// Only nodes last accessed at or before this instant.
    pub accessed_before: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

/// New values for one node. Only the consolidation-owned fields are writable.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeUpdate {
    pub id: String,
    pub memory_tier: MemoryTier,
    pub activation_strength: f64,
    pub consolidation_score: f64,
    pub updated_at: DateTime<Utc>,
}

/// Conditions a node must still meet, at delete time, to be evicted.
///
/// Ids come from a snapshot; a node touched since then no longer matches and is kept.
#[derive(Debug, Clone, PartialEq)]
pub struct EvictionFilter {
    /// Last access at or before this instant.
    pub accessed_before: DateTime<Utc>,
    /// Activation strictly below this.
    pub max_activation: f64,
    /// Keep sensitive nodes regardless of the other conditions.
    pub protect_sensitive: bool,
}

/// Node count and mean activation for one tier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierSummary {
    pub tier: MemoryTier,
    pub count: u64,
    pub average_activation: f64,
}

/// Read/update/delete contract for cognitive nodes, sessions and schedules.
///
/// All methods are synchronous; callers in async contexts should use
/// `tokio::task::spawn_blocking`.
pub trait MemoryStore: Send + Sync {
    /// Capture a new node. `last_accessed_at`, `created_at` and `updated_at` are set to `now`.
    fn insert_node(&self, node: &NewNode, now: DateTime<Utc>) -> Result<CognitiveNode>;

    fn get_node(&self, id: &str) -> Result<Option<CognitiveNode>>;

    /// Read-path access: bump `last_accessed_at` and raise activation by 0.1 (clamped).
    /// Returns `false` if the node does not exist.
    fn touch_node(&self, id: &str, now: DateTime<Utc>) -> Result<bool>;

    /// Every owner that has at least one node.
    fn list_owners(&self) -> Result<Vec<String>>;

    fn list_nodes(&self, owner_id: &str, filter: &NodeFilter) -> Result<Vec<CognitiveNode>>;

    /// Apply a batch of updates atomically. Returns the number of rows changed.
    fn update_nodes(&self, updates: &[NodeUpdate]) -> Result<usize>;

    /// Delete, in one transaction, those of `ids` that are not long-term and still
    /// match `filter`. Returns the number of rows removed.
    fn evict_nodes(&self, ids: &[String], filter: &EvictionFilter) -> Result<usize>;

    /// One entry per tier, zero-filled.
    fn count_nodes_by_tier(&self, owner_id: &str) -> Result<Vec<TierSummary>>;

    fn insert_session(&self, session: &ConsolidationSession) -> Result<()>;

    /// Newest sessions first.
    fn list_sessions(&self, owner_id: &str, limit: usize) -> Result<Vec<ConsolidationSession>>;

    fn load_schedules(&self) -> Result<Vec<Schedule>>;

    fn save_schedules(&self, schedules: &[Schedule]) -> Result<()>;
}

/// [`MemoryStore`] over a single SQLite connection.
pub struct SqliteMemoryStore {
    conn: Mutex<Connection>,
}

impl SqliteMemoryStore {
    /// Wrap an already initialized connection (see [`crate::db::open_database`]).
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| anyhow!("db lock poisoned: {e}"))
    }
}

const NODE_COLUMNS: &str = "id, owner_id, content, memory_tier, activation_strength, \
     consolidation_score, is_sensitive, last_accessed_at, created_at, updated_at";

fn row_to_node(row: &Row<'_>) -> rusqlite::Result<CognitiveNode> {
    let tier: String = row.get(3)?;
    let memory_tier = tier
        .parse::<MemoryTier>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))?;
    Ok(CognitiveNode {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        content: row.get(2)?,
        memory_tier,
        activation_strength: row.get(4)?,
        consolidation_score: row.get(5)?,
        is_sensitive: row.get(6)?,
        last_accessed_at: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

fn row_to_session(row: &Row<'_>) -> rusqlite::Result<ConsolidationSession> {
    let session_type: String = row.get(3)?;
    let session_type = session_type
        .parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))?;
    let metadata: Option<String> = row.get(7)?;
    let metadata = match metadata {
        Some(raw) => serde_json::from_str(&raw)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(7, Type::Text, Box::new(e)))?,
        None => serde_json::Map::new(),
    };
    Ok(ConsolidationSession {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        started_at: row.get(2)?,
        session_type,
        nodes_processed: row.get::<_, i64>(4)? as u64,
        patterns_discovered: row.get::<_, i64>(5)? as u64,
        connections_strengthened: row.get::<_, i64>(6)? as u64,
        metadata,
    })
}

fn row_to_schedule(row: &Row<'_>) -> rusqlite::Result<Schedule> {
    let kind: String = row.get(0)?;
    let kind = kind
        .parse::<ScheduleKind>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))?;
    Ok(Schedule {
        kind,
        enabled: row.get(1)?,
        last_run: row.get(2)?,
        next_run: row.get(3)?,
        processing_nodes: row.get::<_, i64>(4)? as u64,
    })
}

impl MemoryStore for SqliteMemoryStore {
    fn insert_node(&self, node: &NewNode, now: DateTime<Utc>) -> Result<CognitiveNode> {
        anyhow::ensure!(
            (0.0..=1.0).contains(&node.activation_strength),
            "activation_strength must be between 0.0 and 1.0"
        );
        anyhow::ensure!(!node.content.is_empty(), "content must not be empty");

        let conn = self.lock()?;
        let id = uuid::Uuid::now_v7().to_string();
        conn.execute(
            "INSERT INTO cognitive_nodes (id, owner_id, content, memory_tier, activation_strength, \
             consolidation_score, is_sensitive, last_accessed_at, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, 0.0, ?6, ?7, ?7, ?7)",
            params![
                id,
                node.owner_id,
                node.content,
                node.memory_tier.as_str(),
                node.activation_strength,
                node.is_sensitive,
                now,
            ],
        )?;

        Ok(CognitiveNode {
            id,
            owner_id: node.owner_id.clone(),
            content: node.content.clone(),
            memory_tier: node.memory_tier,
            activation_strength: node.activation_strength,
            consolidation_score: 0.0,
            is_sensitive: node.is_sensitive,
            last_accessed_at: now,
            created_at: now,
            updated_at: now,
        })
    }

    fn get_node(&self, id: &str) -> Result<Option<CognitiveNode>> {
        let conn = self.lock()?;
        let node = conn
            .query_row(
                &format!("SELECT {NODE_COLUMNS} FROM cognitive_nodes WHERE id = ?1"),
                params![id],
                row_to_node,
            )
            .optional()?;
        Ok(node)
    }

    fn touch_node(&self, id: &str, now: DateTime<Utc>) -> Result<bool> {
        let conn = self.lock()?;
        let rows = conn.execute(
            "UPDATE cognitive_nodes SET last_accessed_at = ?1, updated_at = ?1, \
             activation_strength = MIN(activation_strength + 0.1, 1.0) WHERE id = ?2",
            params![now, id],
        )?;
        Ok(rows > 0)
    }

    fn list_owners(&self) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT DISTINCT owner_id FROM cognitive_nodes ORDER BY owner_id")?;
        let owners = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(owners)
    }

    fn list_nodes(&self, owner_id: &str, filter: &NodeFilter) -> Result<Vec<CognitiveNode>> {
        let mut sql = format!("SELECT {NODE_COLUMNS} FROM cognitive_nodes WHERE owner_id = ?1");
        let mut values: Vec<Box<dyn ToSql>> = vec![Box::new(owner_id.to_string())];

        if !filter.tiers.is_empty() {
            let placeholders: Vec<String> = filter
                .tiers
                .iter()
                .map(|tier| {
                    values.push(Box::new(tier.as_str()));
                    format!("?{}", values.len())
                })
                .collect();
            sql.push_str(&format!(" AND memory_tier IN ({})", placeholders.join(", ")));
        }
        if let Some(cutoff) = filter.accessed_before {
            values.push(Box::new(cutoff));
            sql.push_str(&format!(" AND last_accessed_at <= ?{}", values.len()));
        }
        sql.push_str(" ORDER BY last_accessed_at ASC, id ASC");
        if let Some(limit) = filter.limit {
            values.push(Box::new(limit as i64));
            sql.push_str(&format!(" LIMIT ?{}", values.len()));
        }

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        let nodes = stmt
            .query_map(params_from_iter(values.iter().map(|v| v.as_ref())), row_to_node)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(nodes)
    }

    fn update_nodes(&self, updates: &[NodeUpdate]) -> Result<usize> {
        if updates.is_empty() {
            return Ok(0);
        }
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let mut changed = 0;
        {
            let mut stmt = tx.prepare(
                "UPDATE cognitive_nodes SET memory_tier = ?1, activation_strength = ?2, \
                 consolidation_score = ?3, updated_at = ?4 WHERE id = ?5",
            )?;
            for update in updates {
                changed += stmt.execute(params![
                    update.memory_tier.as_str(),
                    update.activation_strength,
                    update.consolidation_score,
                    update.updated_at,
                    update.id,
                ])?;
            }
        }
        tx.commit()?;
        Ok(changed)
    }

    fn evict_nodes(&self, ids: &[String], filter: &EvictionFilter) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let mut deleted = 0;
        {
            let mut stmt = tx.prepare(
                "DELETE FROM cognitive_nodes WHERE id = ?1 \
                 AND memory_tier != 'long_term' \
                 AND last_accessed_at <= ?2 \
                 AND activation_strength < ?3 \
                 AND (?4 = 0 OR is_sensitive = 0)",
            )?;
            for id in ids {
                deleted += stmt.execute(params![
                    id,
                    filter.accessed_before,
                    filter.max_activation,
                    filter.protect_sensitive,
                ])?;
            }
        }
        tx.commit()?;
        Ok(deleted)
    }

    fn count_nodes_by_tier(&self, owner_id: &str) -> Result<Vec<TierSummary>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT memory_tier, COUNT(*), AVG(activation_strength) FROM cognitive_nodes \
             WHERE owner_id = ?1 GROUP BY memory_tier",
        )?;
        let rows: Vec<(String, i64, Option<f64>)> = stmt
            .query_map(params![owner_id], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut summaries: Vec<TierSummary> = MemoryTier::ALL
            .iter()
            .map(|&tier| TierSummary {
                tier,
                count: 0,
                average_activation: 0.0,
            })
            .collect();
        for (tier, count, average) in rows {
            let tier: MemoryTier = tier.parse()?;
            if let Some(summary) = summaries.iter_mut().find(|s| s.tier == tier) {
                summary.count = count as u64;
                summary.average_activation = average.unwrap_or(0.0);
            }
        }
        Ok(summaries)
    }

    fn insert_session(&self, session: &ConsolidationSession) -> Result<()> {
        let metadata = serde_json::to_string(&session.metadata)?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO consolidation_sessions (id, owner_id, started_at, session_type, \
             nodes_processed, patterns_discovered, connections_strengthened, metadata) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                session.id,
                session.owner_id,
                session.started_at,
                session.session_type.as_str(),
                session.nodes_processed as i64,
                session.patterns_discovered as i64,
                session.connections_strengthened as i64,
                metadata,
            ],
        )?;
        Ok(())
    }

    fn list_sessions(&self, owner_id: &str, limit: usize) -> Result<Vec<ConsolidationSession>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, owner_id, started_at, session_type, nodes_processed, \
             patterns_discovered, connections_strengthened, metadata \
             FROM consolidation_sessions WHERE owner_id = ?1 \
             ORDER BY started_at DESC, id DESC LIMIT ?2",
        )?;
        let sessions = stmt
            .query_map(params![owner_id, limit as i64], row_to_session)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(sessions)
    }

    fn load_schedules(&self) -> Result<Vec<Schedule>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT schedule_type, enabled, last_run, next_run, processing_nodes \
             FROM consolidation_schedules",
        )?;
        let mut schedules = stmt
            .query_map([], row_to_schedule)?
            .collect::<Result<Vec<_>, _>>()?;
        schedules.sort_by_key(|s| s.kind);
        Ok(schedules)
    }

    fn save_schedules(&self, schedules: &[Schedule]) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO consolidation_schedules \
                 (schedule_type, enabled, last_run, next_run, processing_nodes) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for schedule in schedules {
                stmt.execute(params![
                    schedule.kind.as_str(),
                    schedule.enabled,
                    schedule.last_run,
                    schedule.next_run,
                    schedule.processing_nodes as i64,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}
