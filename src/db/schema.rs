//! SQL DDL for the core Recollect tables.
//!
//! Defines the `cognitive_nodes`, `consolidation_sessions` and `schema_meta`
//! tables. All DDL uses `IF NOT EXISTS` for idempotent initialization. The
//! `consolidation_schedules` table arrives via migration v2.

use rusqlite::Connection;

/// All schema DDL statements for Recollect's core tables.
const SCHEMA_SQL: &str = r#"
-- Tiered memory nodes
CREATE TABLE IF NOT EXISTS cognitive_nodes (
    id TEXT PRIMARY KEY,
    owner_id TEXT NOT NULL,
    content TEXT NOT NULL,
    memory_tier TEXT NOT NULL DEFAULT 'working' CHECK(memory_tier IN ('working','short_term','long_term')),
    activation_strength REAL NOT NULL DEFAULT 1.0 CHECK(activation_strength >= 0.0 AND activation_strength <= 1.0),
    consolidation_score REAL NOT NULL DEFAULT 0.0 CHECK(consolidation_score >= 0.0 AND consolidation_score <= 1.0),
    is_sensitive INTEGER NOT NULL DEFAULT 0,
    last_accessed_at TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_nodes_owner ON cognitive_nodes(owner_id);
CREATE INDEX IF NOT EXISTS idx_nodes_owner_tier ON cognitive_nodes(owner_id, memory_tier);
CREATE INDEX IF NOT EXISTS idx_nodes_last_accessed ON cognitive_nodes(last_accessed_at);

-- Consolidation audit trail (append-only)
CREATE TABLE IF NOT EXISTS consolidation_sessions (
    id TEXT PRIMARY KEY,
    owner_id TEXT NOT NULL,
    started_at TEXT NOT NULL,
    session_type TEXT NOT NULL CHECK(session_type IN ('automatic_hourly','automatic_daily','automatic_weekly','manual')),
    nodes_processed INTEGER NOT NULL DEFAULT 0,
    patterns_discovered INTEGER NOT NULL DEFAULT 0,
    connections_strengthened INTEGER NOT NULL DEFAULT 0,
    metadata TEXT
);

CREATE INDEX IF NOT EXISTS idx_sessions_owner_started ON consolidation_sessions(owner_id, started_at);

CREATE TRIGGER IF NOT EXISTS consolidation_sessions_no_update
BEFORE UPDATE ON consolidation_sessions
BEGIN
    SELECT RAISE(ABORT, 'consolidation_sessions is append-only');
END;

CREATE TRIGGER IF NOT EXISTS consolidation_sessions_no_delete
BEFORE DELETE ON consolidation_sessions
BEGIN
    SELECT RAISE(ABORT, 'consolidation_sessions is append-only');
END;

-- Schema metadata
CREATE TABLE IF NOT EXISTS schema_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// Initialize all schema tables. Idempotent (uses IF NOT EXISTS).
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;

    // Set initial schema version if not already present
    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('schema_version', '1')",
        [],
    )?;

    Ok(())
}
