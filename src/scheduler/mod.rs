//! The consolidation scheduler: owns the schedule registry, the single-flight
//! guard and the background ticker.
//!
//! A [`Scheduler`] is created once per process with [`Scheduler::init`], ticks
//! on a tokio interval once [`Scheduler::start`]ed, and persists its schedules
//! (when enabled) on [`Scheduler::shutdown`]. Scheduled ticks and manual
//! triggers (see [`trigger`]) share one [`RunState`]: at most one run at a time.

pub mod registry;
pub mod trigger;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::{DecayConfig, SchedulerConfig};
use crate::consolidation::{ConsolidationReport, Consolidator};
use crate::memory::stats::MemoryStats;
use crate::memory::store::MemoryStore;
use crate::memory::types::{ConsolidationSession, SessionType};
use registry::{Schedule, ScheduleKind, ScheduleRegistry};

/// Idle/running flag plus a description of the active run.
#[derive(Debug, Default)]
pub(crate) struct RunState {
    running: AtomicBool,
    operation: Mutex<Option<String>>,
}

/// Proof of holding the single-flight guard. Dropping it releases the guard,
/// including on early returns and panics.
pub(crate) struct RunPermit<'a> {
    state: &'a RunState,
}

impl RunState {
    fn try_acquire(&self, operation: String) -> Option<RunPermit<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        *self.operation_slot() = Some(operation);
        Some(RunPermit { state: self })
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn current_operation(&self) -> Option<String> {
        self.operation_slot().clone()
    }

    fn operation_slot(&self) -> MutexGuard<'_, Option<String>> {
        self.operation.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl RunPermit<'_> {
    fn set_operation(&self, operation: String) {
        *self.state.operation_slot() = Some(operation);
    }
}

impl Drop for RunPermit<'_> {
    fn drop(&mut self) {
        *self.state.operation_slot() = None;
        self.state.running.store(false, Ordering::Release);
    }
}

/// Result of one scheduled tick or forced schedule run.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TickOutcome {
    /// No enabled schedule was due.
    Idle,
    /// Another run holds the guard; nothing was done.
    AlreadyRunning,
    /// One schedule ran for every known owner.
    Ran {
        schedule: ScheduleKind,
        reports: Vec<ConsolidationReport>,
    },
}

/// Snapshot for health reporting.
#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub is_healthy: bool,
    pub enabled_schedules: usize,
    pub total_schedules: usize,
    pub next_execution: Option<DateTime<Utc>>,
    pub next_execution_type: Option<ScheduleKind>,
    pub is_running: bool,
    pub current_operation: Option<String>,
    pub schedules: Vec<Schedule>,
}

pub struct Scheduler {
    store: Arc<dyn MemoryStore>,
    consolidator: Consolidator,
    registry: Mutex<ScheduleRegistry>,
    run_state: RunState,
    config: SchedulerConfig,
}

/// Stops a ticker started with [`Scheduler::start`].
pub struct SchedulerHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Signal the ticker and wait for the current tick to finish.
    pub async fn stop(self) {
        let _ = self.stop.send(true);
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "scheduler task ended abnormally");
        }
    }
}

impl Scheduler {
    /// Build the scheduler and its registry as of `now`.
    ///
    /// With `persist_schedules` set, schedules saved by a previous process are
    /// restored; otherwise (or if loading fails) the defaults apply.
    pub fn init(
        store: Arc<dyn MemoryStore>,
        decay: DecayConfig,
        config: SchedulerConfig,
        now: DateTime<Utc>,
    ) -> Self {
        let registry = if config.persist_schedules {
            match store.load_schedules() {
                Ok(saved) if !saved.is_empty() => {
                    tracing::info!(restored = saved.len(), "restored persisted schedules");
                    ScheduleRegistry::restore(saved, now)
                }
                Ok(_) => ScheduleRegistry::initialize(now),
                Err(e) => {
                    tracing::warn!(error = %e, "failed to load schedules, using defaults");
                    ScheduleRegistry::initialize(now)
                }
            }
        } else {
            ScheduleRegistry::initialize(now)
        };

        Self {
            consolidator: Consolidator::new(Arc::clone(&store), decay),
            store,
            registry: Mutex::new(registry),
            run_state: RunState::default(),
            config,
        }
    }

    /// Persist schedules if configured. Call once before the process exits.
    pub async fn shutdown(&self) -> Result<()> {
        if !self.config.persist_schedules {
            return Ok(());
        }
        let schedules = self.registry().schedules().to_vec();
        self.blocking(move |store| store.save_schedules(&schedules))
            .await?;
        tracing::info!("schedules saved");
        Ok(())
    }

    /// Spawn the background ticker. Each tick runs in its own task so a
    /// panicking run is logged and the ticker keeps going.
    pub fn start(self: &Arc<Self>) -> SchedulerHandle {
        let (stop, mut stopped) = watch::channel(false);
        let scheduler = Arc::clone(self);
        let period = std::time::Duration::from_secs(self.config.tick_interval_secs.max(1));

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            tracing::info!(every_secs = period.as_secs(), "consolidation scheduler started");

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let this = Arc::clone(&scheduler);
                        let tick = tokio::spawn(async move { this.run_scheduled_tick(Utc::now()).await });
                        match tick.await {
                            Ok(TickOutcome::Ran { schedule, reports }) => {
                                tracing::info!(schedule = %schedule, owners = reports.len(), "scheduled consolidation ran");
                            }
                            Ok(_) => {}
                            Err(e) => tracing::error!(error = %e, "scheduled tick panicked"),
                        }
                    }
                    changed = stopped.changed() => {
                        if changed.is_err() || *stopped.borrow() {
                            break;
                        }
                    }
                }
            }
            tracing::info!("consolidation scheduler stopped");
        });

        SchedulerHandle { stop, task }
    }

    fn registry(&self) -> MutexGuard<'_, ScheduleRegistry> {
        self.registry.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn schedules(&self) -> Vec<Schedule> {
        self.registry().schedules().to_vec()
    }

    pub fn is_running(&self) -> bool {
        self.run_state.is_running()
    }

    /// Run the first due schedule, if any and if no run is in progress.
    ///
    /// The schedule is advanced to `now + period` whether or not its run
    /// succeeded.
    pub async fn run_scheduled_tick(&self, now: DateTime<Utc>) -> TickOutcome {
        if self.is_running() {
            tracing::debug!("consolidation already running, skipping tick");
            return TickOutcome::AlreadyRunning;
        }

        let due = self.registry().due_schedules(now).first().map(|s| s.kind);
        let Some(kind) = due else {
            return TickOutcome::Idle;
        };

        self.run_schedule(kind, now).await
    }

    /// Run `kind` for every owner under the guard, then advance it.
    async fn run_schedule(&self, kind: ScheduleKind, now: DateTime<Utc>) -> TickOutcome {
        let Some(permit) = self
            .run_state
            .try_acquire(format!("{} consolidation", kind.session_type()))
        else {
            return TickOutcome::AlreadyRunning;
        };

        let reports = self.run_all_owners(kind.session_type(), now, &permit).await;
        let processed: usize = reports.iter().map(|r| r.nodes_processed()).sum();

        self.registry().advance(kind, now, processed as u64);
        self.persist().await;
        drop(permit);

        TickOutcome::Ran {
            schedule: kind,
            reports,
        }
    }

    async fn run_all_owners(
        &self,
        session_type: SessionType,
        now: DateTime<Utc>,
        permit: &RunPermit<'_>,
    ) -> Vec<ConsolidationReport> {
        let owners = match self.blocking(|store| store.list_owners()).await {
            Ok(owners) => owners,
            Err(e) => {
                tracing::error!(error = %e, "failed to list owners, skipping run");
                return Vec::new();
            }
        };

        let mut reports = Vec::with_capacity(owners.len());
        for owner in owners {
            reports.push(self.run_owner(&owner, session_type, now, permit).await);
        }
        reports
    }

    async fn run_owner(
        &self,
        owner_id: &str,
        session_type: SessionType,
        now: DateTime<Utc>,
        permit: &RunPermit<'_>,
    ) -> ConsolidationReport {
        permit.set_operation(format!("{session_type} consolidation for {owner_id}"));
        self.consolidator.run(owner_id, session_type, now).await
    }

    async fn persist(&self) {
        if !self.config.persist_schedules {
            return;
        }
        let schedules = self.schedules();
        if let Err(e) = self.blocking(move |store| store.save_schedules(&schedules)).await {
            tracing::warn!(error = %e, "failed to persist schedules");
        }
    }

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

    pub fn system_status(&self) -> SystemStatus {
        let (enabled, total, next, schedules) = {
            let registry = self.registry();
            let next = registry.next_execution().map(|s| (s.next_run, s.kind));
            (
                registry.enabled_count(),
                registry.schedules().len(),
                next,
                registry.schedules().to_vec(),
            )
        };

        SystemStatus {
            is_healthy: enabled > 0,
            enabled_schedules: enabled,
            total_schedules: total,
            next_execution: next.map(|(at, _)| at),
            next_execution_type: next.map(|(_, kind)| kind),
            is_running: self.run_state.is_running(),
            current_operation: self.run_state.current_operation(),
            schedules,
        }
    }

    pub async fn memory_stats(&self, owner_id: &str) -> Result<MemoryStats> {
        let owner = owner_id.to_string();
        self.blocking(move |store| crate::memory::stats::memory_stats(store, &owner))
            .await
    }

    pub async fn recent_sessions(
        &self,
        owner_id: &str,
        limit: usize,
    ) -> Result<Vec<ConsolidationSession>> {
        let owner = owner_id.to_string();
        self.blocking(move |store| store.list_sessions(&owner, limit))
            .await
    }
}
