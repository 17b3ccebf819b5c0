//! Manual entry points: force a run now, or toggle a schedule.
//!
//! Forced runs skip the due-time check but never queue behind an active run:
//! if the guard is held they return [`TriggerOutcome::AlreadyRunning`] at once.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::registry::ScheduleKind;
use super::{Scheduler, TickOutcome};
use crate::consolidation::ConsolidationReport;
use crate::memory::types::SessionType;

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TriggerOutcome {
    Completed { report: ConsolidationReport },
    AlreadyRunning,
}

impl TriggerOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed { report } if report.is_success())
    }

    /// Message suitable for showing to the person who pressed the button.
    pub fn message(&self) -> String {
        match self {
            Self::Completed { report } => report.summary(),
            Self::AlreadyRunning => {
                "a consolidation is already running; try again when it finishes".to_string()
            }
        }
    }
}

impl Scheduler {
    /// Consolidate one owner now, tagged `manual`.
    pub async fn force_consolidation(&self, owner_id: &str) -> TriggerOutcome {
        self.force_consolidation_at(owner_id, Utc::now()).await
    }

    pub async fn force_consolidation_at(
        &self,
        owner_id: &str,
        now: DateTime<Utc>,
    ) -> TriggerOutcome {
        let Some(permit) = self
            .run_state
            .try_acquire(format!("manual consolidation for {owner_id}"))
        else {
            tracing::info!(owner_id = %owner_id, "manual consolidation rejected, run in progress");
            return TriggerOutcome::AlreadyRunning;
        };

        let report = self
            .run_owner(owner_id, SessionType::Manual, now, &permit)
            .await;
        drop(permit);

        TriggerOutcome::Completed { report }
    }

    /// Run one schedule for every owner now, enabled or not, then advance it.
    pub async fn force_schedule(&self, kind: ScheduleKind, now: DateTime<Utc>) -> TickOutcome {
        tracing::info!(schedule = %kind, "forcing scheduled consolidation");
        self.run_schedule(kind, now).await
    }

    /// Flip a schedule's enabled flag. In-flight runs are unaffected.
    /// Returns the new enabled state.
    pub async fn toggle_schedule(&self, kind: ScheduleKind) -> bool {
        let enabled = self.registry().toggle(kind);
        tracing::info!(schedule = %kind, enabled, "schedule toggled");
        self.persist().await;
        enabled
    }
}
