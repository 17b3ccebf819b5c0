//! One consolidation run: snapshot → plan → four ordered store batches → session record.
//!
//! A run never fails as a whole. Each batch is isolated: a failed step is
//! logged and recorded in the report, later steps still run, and the session
//! row reflects only the steps that committed.

pub mod decay;
pub mod session;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

use crate::config::DecayConfig;
use crate::memory::store::{MemoryStore, NodeFilter};
use crate::memory::types::SessionType;
use decay::{DecayPlan, DecayStep};
use session::SessionCounts;

/// A step (or the snapshot query) that did not commit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepFailure {
    pub step: String,
    pub error: String,
}

/// Best-effort outcome of one run for one owner.
#[derive(Debug, Clone, Serialize)]
pub struct ConsolidationReport {
    pub owner_id: String,
    pub session_type: SessionType,
    pub started_at: DateTime<Utc>,
    pub nodes_scanned: usize,
    pub promoted_to_short_term: usize,
    pub promoted_to_long_term: usize,
    pub decayed: usize,
    pub evicted: usize,
    pub failed_steps: Vec<StepFailure>,
    pub session_id: Option<String>,
    pub session_error: Option<String>,
    pub duration_ms: u64,
}

impl ConsolidationReport {
    fn new(owner_id: &str, session_type: SessionType, started_at: DateTime<Utc>) -> Self {
        Self {
            owner_id: owner_id.to_string(),
            session_type,
            started_at,
            nodes_scanned: 0,
            promoted_to_short_term: 0,
            promoted_to_long_term: 0,
            decayed: 0,
            evicted: 0,
            failed_steps: Vec::new(),
            session_id: None,
            session_error: None,
            duration_ms: 0,
        }
    }

    /// Nodes promoted, decayed or evicted.
    pub fn nodes_processed(&self) -> usize {
        self.promoted_to_short_term + self.promoted_to_long_term + self.decayed + self.evicted
    }

    /// `true` when every step and the session write committed.
    pub fn is_success(&self) -> bool {
        self.failed_steps.is_empty() && self.session_error.is_none()
    }

    pub fn counts(&self) -> SessionCounts {
        SessionCounts {
            nodes_processed: self.nodes_processed() as u64,
            patterns_discovered: self.promoted_to_long_term as u64,
            connections_strengthened: (self.promoted_to_short_term + self.promoted_to_long_term)
                as u64,
        }
    }

    /// Human-readable one-liner for manual triggers.
    pub fn summary(&self) -> String {
        let mut text = format!(
            "{} consolidation for {}: {} promoted to short-term, {} promoted to long-term, {} decayed, {} evicted",
            self.session_type,
            self.owner_id,
            self.promoted_to_short_term,
            self.promoted_to_long_term,
            self.decayed,
            self.evicted,
        );
        if !self.failed_steps.is_empty() {
            let failed: Vec<&str> = self.failed_steps.iter().map(|f| f.step.as_str()).collect();
            text.push_str(&format!(" (failed: {})", failed.join(", ")));
        }
        if let Some(ref err) = self.session_error {
            text.push_str(&format!(" (session not recorded: {err})"));
        }
        text
    }

    fn record_step(&mut self, step: DecayStep, affected: usize) {
        match step {
            DecayStep::PromoteWorking => self.promoted_to_short_term = affected,
            DecayStep::PromoteShortTerm => self.promoted_to_long_term = affected,
            DecayStep::DecayLongTerm => self.decayed = affected,
            DecayStep::Evict => self.evicted = affected,
        }
    }

    fn metadata(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut map = serde_json::Map::new();
        map.insert("nodes_scanned".into(), self.nodes_scanned.into());
        map.insert("promoted_to_short_term".into(), self.promoted_to_short_term.into());
        map.insert("promoted_to_long_term".into(), self.promoted_to_long_term.into());
        map.insert("decayed".into(), self.decayed.into());
        map.insert("evicted".into(), self.evicted.into());
        map.insert("duration_ms".into(), self.duration_ms.into());
        if !self.failed_steps.is_empty() {
            map.insert(
                "failed_steps".into(),
                serde_json::to_value(&self.failed_steps).unwrap_or_default(),
            );
        }
        map
    }
}

/// Runs the promotion/decay/eviction pipeline against a [`MemoryStore`].
#[derive(Clone)]
pub struct Consolidator {
    store: Arc<dyn MemoryStore>,
    config: DecayConfig,
}

impl Consolidator {
    pub fn new(store: Arc<dyn MemoryStore>, config: DecayConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &DecayConfig {
        &self.config
    }

    /// Run a store call on the blocking pool.
    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&dyn MemoryStore) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || f(store.as_ref()))
            .await
            .map_err(|e| anyhow!("store task failed: {e}"))?
    }

    /// Consolidate one owner's nodes as of `now`.
    pub async fn run(
        &self,
        owner_id: &str,
        session_type: SessionType,
        now: DateTime<Utc>,
    ) -> ConsolidationReport {
        let clock = Instant::now();
        let mut report = ConsolidationReport::new(owner_id, session_type, now);

        match self.snapshot(owner_id, now).await {
            Ok(plan_input) => {
                report.nodes_scanned = plan_input.len();
                let plan = decay::plan(&plan_input, &self.config, now);
                self.apply(&plan, now, &mut report).await;
            }
            Err(e) => {
                tracing::warn!(owner_id = %owner_id, error = %e, "failed to load nodes for consolidation");
                report.failed_steps.push(StepFailure {
                    step: "snapshot".into(),
                    error: e.to_string(),
                });
            }
        }

        report.duration_ms = clock.elapsed().as_millis() as u64;
        self.record(&mut report).await;

        if report.is_success() {
            tracing::info!(
                owner_id = %owner_id,
                session_type = %session_type,
                scanned = report.nodes_scanned,
                promoted_short_term = report.promoted_to_short_term,
                promoted_long_term = report.promoted_to_long_term,
                decayed = report.decayed,
                evicted = report.evicted,
                "consolidation complete"
            );
        } else {
            tracing::error!(
                owner_id = %owner_id,
                session_type = %session_type,
                failed_steps = report.failed_steps.len(),
                "consolidation finished with failures: {}",
                report.summary()
            );
        }
        report
    }

    /// Pre-run state: every node idle long enough for at least one step.
    async fn snapshot(
        &self,
        owner_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<crate::memory::types::CognitiveNode>> {
        let owner = owner_id.to_string();
        let filter = NodeFilter {
            accessed_before: now.checked_sub_signed(decay::shortest_idle_threshold(&self.config)),
            ..NodeFilter::default()
        };
        self.blocking(move |store| store.list_nodes(&owner, &filter))
            .await
    }

    async fn apply(&self, plan: &DecayPlan, now: DateTime<Utc>, report: &mut ConsolidationReport) {
        if plan.is_empty() {
            tracing::debug!(owner_id = %report.owner_id, "nothing to consolidate");
            return;
        }

        for step in DecayStep::ORDER {
            let result = match plan.updates(step) {
                Some(updates) if updates.is_empty() => Ok(0),
                Some(updates) => {
                    let updates = updates.to_vec();
                    self.blocking(move |store| store.update_nodes(&updates)).await
                }
                None if plan.evict.is_empty() => Ok(0),
                None => {
                    let ids = plan.evict.clone();
                    let filter = decay::eviction_filter(&self.config, now);
                    self.blocking(move |store| store.evict_nodes(&ids, &filter)).await
                }
            };

            match result {
                Ok(affected) => {
                    tracing::debug!(step = %step, affected, "consolidation step applied");
                    report.record_step(step, affected);
                }
                Err(e) => {
                    tracing::warn!(step = %step, error = %e, "consolidation step failed");
                    report.failed_steps.push(StepFailure {
                        step: step.as_str().into(),
                        error: e.to_string(),
                    });
                }
            }
        }
    }

    async fn record(&self, report: &mut ConsolidationReport) {
        let owner = report.owner_id.clone();
        let session_type = report.session_type;
        let started_at = report.started_at;
        let counts = report.counts();
        let metadata = report.metadata();

        let result = self
            .blocking(move |store| {
                session::record_session(store, &owner, session_type, started_at, counts, metadata)
            })
            .await;

        match result {
            Ok(session) => report.session_id = Some(session.id),
            Err(e) => {
                tracing::error!(owner_id = %report.owner_id, error = %e, "failed to record consolidation session");
                report.session_error = Some(e.to_string());
            }
        }
    }
}
