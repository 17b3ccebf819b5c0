//! Pure tier policy: promotion, long-term decay and eviction.
//!
//! Nothing here performs I/O. [`plan`] takes a snapshot of nodes as they were
//! before the run and sorts each one into at most one [`DecayStep`]. The
//! step predicates are disjoint on the pre-run tier and activation, so a node
//! promoted by one step is never touched by a later one in the same run.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::config::DecayConfig;
use crate::memory::store::{EvictionFilter, NodeUpdate};
use crate::memory::types::{CognitiveNode, MemoryTier};

/// Working nodes need strictly more activation than this to be promoted.
pub const WORKING_PROMOTION_MIN_ACTIVATION: f64 = 0.3;
/// Short-term nodes need strictly more activation than this to reach long-term.
pub const SHORT_TERM_PROMOTION_MIN_ACTIVATION: f64 = 0.5;
const WORKING_PROMOTION_SCORE_BONUS: f64 = 0.1;
const SHORT_TERM_PROMOTION_SCORE_BONUS: f64 = 0.2;

/// Decay never pushes activation below this in a single run.
pub const ACTIVATION_FLOOR: f64 = 0.1;
/// Idle time before a long-term node starts decaying.
pub const DECAY_IDLE_DAYS: i64 = 1;

/// Nodes strictly below this activation are eviction candidates.
pub const EVICTION_MAX_ACTIVATION: f64 = 0.1;
pub const EVICTION_IDLE_DAYS: i64 = 30;

/// The four pipeline steps, in the only order they may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecayStep {
    PromoteWorking,
    PromoteShortTerm,
    DecayLongTerm,
    Evict,
}

impl DecayStep {
    pub const ORDER: [DecayStep; 4] = [
        Self::PromoteWorking,
        Self::PromoteShortTerm,
        Self::DecayLongTerm,
        Self::Evict,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PromoteWorking => "promote_working",
            Self::PromoteShortTerm => "promote_short_term",
            Self::DecayLongTerm => "decay_long_term",
            Self::Evict => "evict",
        }
    }
}

impl std::fmt::Display for DecayStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What one node should become after this run.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeOutcome {
    Unchanged,
    Updated(DecayStep, NodeUpdate),
    Evicted,
}

/// Per-step work derived from one snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecayPlan {
    pub promote_working: Vec<NodeUpdate>,
    pub promote_short_term: Vec<NodeUpdate>,
    pub decay_long_term: Vec<NodeUpdate>,
    pub evict: Vec<String>,
}

impl DecayPlan {
    pub fn is_empty(&self) -> bool {
        self.promote_working.is_empty()
            && self.promote_short_term.is_empty()
            && self.decay_long_term.is_empty()
            && self.evict.is_empty()
    }

    /// Updates scheduled for an update step; `None` for [`DecayStep::Evict`].
    pub fn updates(&self, step: DecayStep) -> Option<&[NodeUpdate]> {
        match step {
            DecayStep::PromoteWorking => Some(&self.promote_working),
            DecayStep::PromoteShortTerm => Some(&self.promote_short_term),
            DecayStep::DecayLongTerm => Some(&self.decay_long_term),
            DecayStep::Evict => None,
        }
    }
}

fn hours(h: u64) -> Duration {
    Duration::try_hours(i64::try_from(h).unwrap_or(i64::MAX)).unwrap_or(Duration::MAX)
}

fn days(d: u64) -> Duration {
    Duration::try_days(i64::try_from(d).unwrap_or(i64::MAX)).unwrap_or(Duration::MAX)
}

fn clamp_unit(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

/// Shortest idle time any step requires. Nodes accessed more recently than
/// `now - shortest_idle_threshold` cannot change in this run.
pub fn shortest_idle_threshold(config: &DecayConfig) -> Duration {
    [
        hours(config.working_memory_threshold_hours),
        days(config.short_term_threshold_days),
        Duration::days(DECAY_IDLE_DAYS),
        Duration::days(EVICTION_IDLE_DAYS),
    ]
    .into_iter()
    .min()
    .unwrap_or_else(Duration::zero)
}

fn is_protected(node: &CognitiveNode, config: &DecayConfig) -> bool {
    config.sensitive_memory_protection && node.is_sensitive
}

/// Eviction conditions as of `now`, re-checked by the store at delete time.
pub fn eviction_filter(config: &DecayConfig, now: DateTime<Utc>) -> EvictionFilter {
    EvictionFilter {
        accessed_before: now - Duration::days(EVICTION_IDLE_DAYS),
        max_activation: EVICTION_MAX_ACTIVATION,
        protect_sensitive: config.sensitive_memory_protection,
    }
}

/// Decide the fate of a single node against its pre-run state.
pub fn evaluate(node: &CognitiveNode, config: &DecayConfig, now: DateTime<Utc>) -> NodeOutcome {
    let idle = now - node.last_accessed_at;

    match node.memory_tier {
        MemoryTier::Working
            if idle >= hours(config.working_memory_threshold_hours)
                && node.activation_strength > WORKING_PROMOTION_MIN_ACTIVATION =>
        {
            return NodeOutcome::Updated(
                DecayStep::PromoteWorking,
                NodeUpdate {
                    id: node.id.clone(),
                    memory_tier: MemoryTier::ShortTerm,
                    activation_strength: clamp_unit(node.activation_strength),
                    consolidation_score: clamp_unit(
                        node.consolidation_score + WORKING_PROMOTION_SCORE_BONUS,
                    ),
                    updated_at: now,
                },
            );
        }
        MemoryTier::ShortTerm
            if idle >= days(config.short_term_threshold_days)
                && node.activation_strength > SHORT_TERM_PROMOTION_MIN_ACTIVATION =>
        {
            return NodeOutcome::Updated(
                DecayStep::PromoteShortTerm,
                NodeUpdate {
                    id: node.id.clone(),
                    memory_tier: MemoryTier::LongTerm,
                    activation_strength: clamp_unit(node.activation_strength),
                    consolidation_score: clamp_unit(
                        node.consolidation_score + SHORT_TERM_PROMOTION_SCORE_BONUS,
                    ),
                    updated_at: now,
                },
            );
        }
        MemoryTier::LongTerm
            if !is_protected(node, config) && idle >= Duration::days(DECAY_IDLE_DAYS) =>
        {
            let decayed = clamp_unit(
                (node.activation_strength * (1.0 - config.long_term_decay_rate))
                    .max(ACTIVATION_FLOOR),
            );
            if decayed == node.activation_strength {
                return NodeOutcome::Unchanged;
            }
            return NodeOutcome::Updated(
                DecayStep::DecayLongTerm,
                NodeUpdate {
                    id: node.id.clone(),
                    memory_tier: MemoryTier::LongTerm,
                    activation_strength: decayed,
                    consolidation_score: clamp_unit(node.consolidation_score),
                    updated_at: now,
                },
            );
        }
        _ => {}
    }

    let evictable = node.memory_tier != MemoryTier::LongTerm
        && !is_protected(node, config)
        && node.activation_strength < EVICTION_MAX_ACTIVATION
        && idle >= Duration::days(EVICTION_IDLE_DAYS);
    if evictable {
        NodeOutcome::Evicted
    } else {
        NodeOutcome::Unchanged
    }
}

/// Sort a pre-run snapshot into per-step batches.
pub fn plan(nodes: &[CognitiveNode], config: &DecayConfig, now: DateTime<Utc>) -> DecayPlan {
    let mut plan = DecayPlan::default();
    for node in nodes {
        match evaluate(node, config, now) {
            NodeOutcome::Unchanged => {}
            NodeOutcome::Evicted => plan.evict.push(node.id.clone()),
            NodeOutcome::Updated(step, update) => match step {
                DecayStep::PromoteWorking => plan.promote_working.push(update),
                DecayStep::PromoteShortTerm => plan.promote_short_term.push(update),
                DecayStep::DecayLongTerm => plan.decay_long_term.push(update),
                DecayStep::Evict => plan.evict.push(update.id),
            },
        }
    }
    plan
}
