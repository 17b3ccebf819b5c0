pub mod consolidate;
pub mod doctor;
pub mod remember;
pub mod schedule;
pub mod stats;
pub mod status;

use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;

use crate::config::RecollectConfig;
use crate::memory::store::{MemoryStore, SqliteMemoryStore};
use crate::scheduler::Scheduler;

/// Open the configured database as a store.
fn open_store(config: &RecollectConfig) -> Result<Arc<dyn MemoryStore>> {
    let conn = crate::db::open_database(config.resolved_db_path())?;
    Ok(Arc::new(SqliteMemoryStore::new(conn)))
}

/// A scheduler over the configured database with no background ticker.
fn offline_scheduler(config: &RecollectConfig) -> Result<Scheduler> {
    let store = open_store(config)?;
    Ok(Scheduler::init(
        store,
        config.decay.clone(),
        config.scheduler.clone(),
        Utc::now(),
    ))
}
