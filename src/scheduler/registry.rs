//! Hourly/daily/weekly consolidation schedules.
//!
//! The registry holds exactly one [`Schedule`] per [`ScheduleKind`], kept in
//! kind order so "first due" always means hourly before daily before weekly.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::memory::types::{ParseLabelError, SessionType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleKind {
    Hourly,
    Daily,
    Weekly,
}

impl ScheduleKind {
    pub const ALL: [ScheduleKind; 3] = [Self::Hourly, Self::Daily, Self::Weekly];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hourly => "hourly",
            Self::Daily => "daily",
            Self::Weekly => "weekly",
        }
    }

    /// Fixed run period.
    pub fn period(&self) -> Duration {
        match self {
            Self::Hourly => Duration::hours(1),
            Self::Daily => Duration::hours(24),
            Self::Weekly => Duration::days(7),
        }
    }

    /// Whether a freshly initialized registry runs this schedule.
    pub fn enabled_by_default(&self) -> bool {
        !matches!(self, Self::Weekly)
    }

    /// Session tag for runs triggered by this schedule.
    pub fn session_type(&self) -> SessionType {
        match self {
            Self::Hourly => SessionType::AutomaticHourly,
            Self::Daily => SessionType::AutomaticDaily,
            Self::Weekly => SessionType::AutomaticWeekly,
        }
    }
}

impl std::fmt::Display for ScheduleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ScheduleKind {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hourly" => Ok(Self::Hourly),
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            _ => Err(ParseLabelError::new("schedule", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    pub kind: ScheduleKind,
    pub enabled: bool,
    pub last_run: Option<DateTime<Utc>>,
    pub next_run: DateTime<Utc>,
    /// Nodes touched by the most recent run of this schedule.
    pub processing_nodes: u64,
}

impl Schedule {
    fn fresh(kind: ScheduleKind, now: DateTime<Utc>) -> Self {
        Self {
            kind,
            enabled: kind.enabled_by_default(),
            last_run: None,
            next_run: now + kind.period(),
            processing_nodes: 0,
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.enabled && self.next_run <= now
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleRegistry {
    schedules: Vec<Schedule>,
}

impl ScheduleRegistry {
    /// Defaults: hourly and daily enabled, weekly disabled, each due one period from `now`.
    pub fn initialize(now: DateTime<Utc>) -> Self {
        Self {
            schedules: ScheduleKind::ALL
                .iter()
                .map(|&kind| Schedule::fresh(kind, now))
                .collect(),
        }
    }

    /// Rebuild from persisted rows. Kinds missing from `persisted` get defaults;
    /// duplicates keep the first row seen.
    pub fn restore(persisted: Vec<Schedule>, now: DateTime<Utc>) -> Self {
        let schedules = ScheduleKind::ALL
            .iter()
            .map(|&kind| {
                persisted
                    .iter()
                    .find(|s| s.kind == kind)
                    .cloned()
                    .unwrap_or_else(|| Schedule::fresh(kind, now))
            })
            .collect();
        Self { schedules }
    }

    pub fn schedules(&self) -> &[Schedule] {
        &self.schedules
    }

    pub fn get(&self, kind: ScheduleKind) -> &Schedule {
        // one entry per kind, in ALL order
        &self.schedules[kind as usize]
    }

    fn get_mut(&mut self, kind: ScheduleKind) -> &mut Schedule {
        &mut self.schedules[kind as usize]
    }

    /// Flip `enabled`; `next_run` is left alone. Returns the new state.
    pub fn toggle(&mut self, kind: ScheduleKind) -> bool {
        let schedule = self.get_mut(kind);
        schedule.enabled = !schedule.enabled;
        schedule.enabled
    }

    /// Mark a run at `ran_at` and push `next_run` one period past it.
    pub fn advance(&mut self, kind: ScheduleKind, ran_at: DateTime<Utc>, processing_nodes: u64) {
        let schedule = self.get_mut(kind);
        schedule.last_run = Some(ran_at);
        schedule.next_run = ran_at + kind.period();
        schedule.processing_nodes = processing_nodes;
    }

    /// Enabled schedules with `next_run <= now`, hourly first.
    pub fn due_schedules(&self, now: DateTime<Utc>) -> Vec<&Schedule> {
        self.schedules.iter().filter(|s| s.is_due(now)).collect()
    }

    /// Earliest upcoming run among enabled schedules.
    pub fn next_execution(&self) -> Option<&Schedule> {
        self.schedules
            .iter()
            .filter(|s| s.enabled)
            .min_by_key(|s| (s.next_run, s.kind))
    }

    pub fn enabled_count(&self) -> usize {
        self.schedules.iter().filter(|s| s.enabled).count()
    }
}
