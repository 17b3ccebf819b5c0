#![allow(dead_code)]

use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration, Utc};
use recollect::config::{DecayConfig, SchedulerConfig};
use recollect::memory::store::{
    EvictionFilter, MemoryStore, NodeFilter, NodeUpdate, SqliteMemoryStore, TierSummary,
};
use recollect::memory::types::{CognitiveNode, ConsolidationSession, MemoryTier, NewNode};
use recollect::scheduler::registry::Schedule;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};

/// A fresh in-memory store with schema and migrations applied.
pub fn test_store() -> SqliteMemoryStore {
    SqliteMemoryStore::new(recollect::db::open_memory_database().unwrap())
}

/// Fixed reference instant so idle-time arithmetic is exact.
pub fn t0() -> DateTime<Utc> {
    "2026-03-01T12:00:00Z".parse().unwrap()
}

pub fn scheduler_config(persist: bool) -> SchedulerConfig {
    SchedulerConfig {
        enabled: false,
        tick_interval_secs: 60,
        persist_schedules: persist,
    }
}

pub fn decay_config() -> DecayConfig {
    DecayConfig::default()
}

/// Insert a node whose last access (and creation) was `idle` before `now`.
pub fn insert_node(
    store: &dyn MemoryStore,
    owner: &str,
    tier: MemoryTier,
    activation: f64,
    sensitive: bool,
    now: DateTime<Utc>,
    idle: Duration,
) -> CognitiveNode {
    let node = NewNode {
        owner_id: owner.to_string(),
        content: format!("{tier} memory for {owner}"),
        memory_tier: tier,
        activation_strength: activation,
        is_sensitive: sensitive,
    };
    store.insert_node(&node, now - idle).unwrap()
}

pub fn reload(store: &dyn MemoryStore, node: &CognitiveNode) -> Option<CognitiveNode> {
    store.get_node(&node.id).unwrap()
}

/// Store wrapper whose selected operations fail on demand.
pub struct FailingStore {
    pub inner: SqliteMemoryStore,
    pub fail_list: AtomicBool,
    pub fail_promote_working: AtomicBool,
    pub fail_delete: AtomicBool,
    pub fail_sessions: AtomicBool,
}

impl FailingStore {
    pub fn new() -> Self {
        Self {
            inner: test_store(),
            fail_list: AtomicBool::new(false),
            fail_promote_working: AtomicBool::new(false),
            fail_delete: AtomicBool::new(false),
            fail_sessions: AtomicBool::new(false),
        }
    }
}

impl MemoryStore for FailingStore {
    fn insert_node(&self, node: &NewNode, now: DateTime<Utc>) -> Result<CognitiveNode> {
        self.inner.insert_node(node, now)
    }

    fn get_node(&self, id: &str) -> Result<Option<CognitiveNode>> {
        self.inner.get_node(id)
    }

    fn touch_node(&self, id: &str, now: DateTime<Utc>) -> Result<bool> {
        self.inner.touch_node(id, now)
    }

    fn list_owners(&self) -> Result<Vec<String>> {
        self.inner.list_owners()
    }

    fn list_nodes(&self, owner_id: &str, filter: &NodeFilter) -> Result<Vec<CognitiveNode>> {
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(anyhow!("injected list failure"));
        }
        self.inner.list_nodes(owner_id, filter)
    }

    fn update_nodes(&self, updates: &[NodeUpdate]) -> Result<usize> {
        let promotes_working = updates
            .first()
            .is_some_and(|u| u.memory_tier == MemoryTier::ShortTerm);
        if promotes_working && self.fail_promote_working.load(Ordering::SeqCst) {
            return Err(anyhow!("injected promotion failure"));
        }
        self.inner.update_nodes(updates)
    }

    fn evict_nodes(&self, ids: &[String], filter: &EvictionFilter) -> Result<usize> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(anyhow!("injected delete failure"));
        }
        self.inner.evict_nodes(ids, filter)
    }

    fn count_nodes_by_tier(&self, owner_id: &str) -> Result<Vec<TierSummary>> {
        self.inner.count_nodes_by_tier(owner_id)
    }

    fn insert_session(&self, session: &ConsolidationSession) -> Result<()> {
        if self.fail_sessions.load(Ordering::SeqCst) {
            return Err(anyhow!("injected session failure"));
        }
        self.inner.insert_session(session)
    }

    fn list_sessions(&self, owner_id: &str, limit: usize) -> Result<Vec<ConsolidationSession>> {
        self.inner.list_sessions(owner_id, limit)
    }

    fn load_schedules(&self) -> Result<Vec<Schedule>> {
        self.inner.load_schedules()
    }

    fn save_schedules(&self, schedules: &[Schedule]) -> Result<()> {
        self.inner.save_schedules(schedules)
    }
}

/// Store wrapper that parks `list_nodes` until the test releases it, so a
/// run can be held open while other triggers are attempted.
pub struct GatedStore {
    pub inner: SqliteMemoryStore,
    entered: Mutex<Sender<()>>,
    release: Mutex<Receiver<()>>,
}

/// Test-side ends of a [`GatedStore`].
pub struct Gate {
    pub entered: Receiver<()>,
    pub release: Sender<()>,
}

impl GatedStore {
    pub fn new() -> (Arc<Self>, Gate) {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let store = Arc::new(Self {
            inner: test_store(),
            entered: Mutex::new(entered_tx),
            release: Mutex::new(release_rx),
        });
        (
            store,
            Gate {
                entered: entered_rx,
                release: release_tx,
            },
        )
    }
}

impl MemoryStore for GatedStore {
    fn insert_node(&self, node: &NewNode, now: DateTime<Utc>) -> Result<CognitiveNode> {
        self.inner.insert_node(node, now)
    }

    fn get_node(&self, id: &str) -> Result<Option<CognitiveNode>> {
        self.inner.get_node(id)
    }

    fn touch_node(&self, id: &str, now: DateTime<Utc>) -> Result<bool> {
        self.inner.touch_node(id, now)
    }

    fn list_owners(&self) -> Result<Vec<String>> {
        self.inner.list_owners()
    }

    fn list_nodes(&self, owner_id: &str, filter: &NodeFilter) -> Result<Vec<CognitiveNode>> {
        let _ = self.entered.lock().unwrap().send(());
        let _ = self.release.lock().unwrap().recv();
        self.inner.list_nodes(owner_id, filter)
    }

    fn update_nodes(&self, updates: &[NodeUpdate]) -> Result<usize> {
        self.inner.update_nodes(updates)
    }

    fn evict_nodes(&self, ids: &[String], filter: &EvictionFilter) -> Result<usize> {
        self.inner.evict_nodes(ids, filter)
    }

    fn count_nodes_by_tier(&self, owner_id: &str) -> Result<Vec<TierSummary>> {
        self.inner.count_nodes_by_tier(owner_id)
    }

    fn insert_session(&self, session: &ConsolidationSession) -> Result<()> {
        self.inner.insert_session(session)
    }

    fn list_sessions(&self, owner_id: &str, limit: usize) -> Result<Vec<ConsolidationSession>> {
        self.inner.list_sessions(owner_id, limit)
    }

    fn load_schedules(&self) -> Result<Vec<Schedule>> {
        self.inner.load_schedules()
    }

    fn save_schedules(&self, schedules: &[Schedule]) -> Result<()> {
        self.inner.save_schedules(schedules)
    }
}

/// Store wrapper that simulates the read path racing a run: every node
/// returned by `list_nodes` is touched at `touch_at` before the caller sees it.
pub struct TouchingStore {
    pub inner: SqliteMemoryStore,
    pub touch_at: DateTime<Utc>,
}

impl MemoryStore for TouchingStore {
    fn insert_node(&self, node: &NewNode, now: DateTime<Utc>) -> Result<CognitiveNode> {
        self.inner.insert_node(node, now)
    }

    fn get_node(&self, id: &str) -> Result<Option<CognitiveNode>> {
        self.inner.get_node(id)
    }

    fn touch_node(&self, id: &str, now: DateTime<Utc>) -> Result<bool> {
        self.inner.touch_node(id, now)
    }

    fn list_owners(&self) -> Result<Vec<String>> {
        self.inner.list_owners()
    }

    fn list_nodes(&self, owner_id: &str, filter: &NodeFilter) -> Result<Vec<CognitiveNode>> {
        let snapshot = self.inner.list_nodes(owner_id, filter)?;
        for node in &snapshot {
            self.inner.touch_node(&node.id, self.touch_at)?;
        }
        Ok(snapshot)
    }

    fn update_nodes(&self, updates: &[NodeUpdate]) -> Result<usize> {
        self.inner.update_nodes(updates)
    }

    fn evict_nodes(&self, ids: &[String], filter: &EvictionFilter) -> Result<usize> {
        self.inner.evict_nodes(ids, filter)
    }

    fn count_nodes_by_tier(&self, owner_id: &str) -> Result<Vec<TierSummary>> {
        self.inner.count_nodes_by_tier(owner_id)
    }

    fn insert_session(&self, session: &ConsolidationSession) -> Result<()> {
        self.inner.insert_session(session)
    }

    fn list_sessions(&self, owner_id: &str, limit: usize) -> Result<Vec<ConsolidationSession>> {
        self.inner.list_sessions(owner_id, limit)
    }

    fn load_schedules(&self) -> Result<Vec<Schedule>> {
        self.inner.load_schedules()
    }

    fn save_schedules(&self, schedules: &[Schedule]) -> Result<()> {
        self.inner.save_schedules(schedules)
    }
}
