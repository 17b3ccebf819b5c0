use recollect::db;
use rusqlite::Connection;

fn names(conn: &Connection, kind: &str) -> Vec<String> {
    conn.prepare("SELECT name FROM sqlite_master WHERE type = ?1 ORDER BY name")
        .unwrap()
        .query_map([kind], |row| row.get(0))
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap()
}

#[test]
fn full_schema_creates_all_tables_indexes_and_triggers() {
    let conn = db::open_memory_database().unwrap();

    let tables = names(&conn, "table");
    for table in [
        "cognitive_nodes",
        "consolidation_sessions",
        "consolidation_schedules",
        "schema_meta",
    ] {
        assert!(tables.contains(&table.to_string()), "{table} table missing");
    }

    let indexes = names(&conn, "index");
    assert!(indexes.contains(&"idx_nodes_owner_tier".to_string()));
    assert!(indexes.contains(&"idx_nodes_last_accessed".to_string()));
    assert!(indexes.contains(&"idx_sessions_owner_started".to_string()));

    let triggers = names(&conn, "trigger");
    assert!(triggers.contains(&"consolidation_sessions_no_update".to_string()));
    assert!(triggers.contains(&"consolidation_sessions_no_delete".to_string()));
}

#[test]
fn check_constraints_reject_invalid_rows() {
    let conn = db::open_memory_database().unwrap();
    let now = "2026-03-01T12:00:00Z";

    conn.execute(
        "INSERT INTO cognitive_nodes (id, owner_id, content, memory_tier, activation_strength, \
         last_accessed_at, created_at, updated_at) VALUES ('n1', 'alice', 'ok', 'working', 0.5, ?1, ?1, ?1)",
        [now],
    )
    .unwrap();

    let bad_tier = conn.execute(
        "INSERT INTO cognitive_nodes (id, owner_id, content, memory_tier, activation_strength, \
         last_accessed_at, created_at, updated_at) VALUES ('n2', 'alice', 'bad', 'episodic', 0.5, ?1, ?1, ?1)",
        [now],
    );
    assert!(bad_tier.is_err(), "unknown tier should be rejected by CHECK constraint");

    let bad_activation = conn.execute(
        "INSERT INTO cognitive_nodes (id, owner_id, content, memory_tier, activation_strength, \
         last_accessed_at, created_at, updated_at) VALUES ('n3', 'alice', 'bad', 'working', 1.5, ?1, ?1, ?1)",
        [now],
    );
    assert!(bad_activation.is_err(), "activation above 1.0 should be rejected");

    let bad_session = conn.execute(
        "INSERT INTO consolidation_sessions (id, owner_id, started_at, session_type) \
         VALUES ('s1', 'alice', ?1, 'automatic_monthly')",
        [now],
    );
    assert!(bad_session.is_err(), "unknown session type should be rejected");
}
