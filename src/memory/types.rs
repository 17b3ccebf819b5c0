//! Core record definitions.
//!
//! Defines [`MemoryTier`] (the working → short-term → long-term progression),
//! [`CognitiveNode`] (a full node record), [`SessionType`] and
//! [`ConsolidationSession`] (the append-only audit record of one run).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Returned when a stored or user-supplied label does not name a known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct ParseLabelError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseLabelError {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Memory tiers in order of increasing permanence.
///
/// The derived `Ord` follows the promotion order, so `a < b` means `b` is
/// further along than `a`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryTier {
    /// Freshly captured, volatile.
    Working,
    /// Survived the working threshold with enough activation.
    ShortTerm,
    /// Permanently retained; only decays, never evicted.
    LongTerm,
}

impl MemoryTier {
    pub const ALL: [MemoryTier; 3] = [Self::Working, Self::ShortTerm, Self::LongTerm];

    /// SQL-compatible string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Working => "working",
            Self::ShortTerm => "short_term",
            Self::LongTerm => "long_term",
        }
    }
}

impl std::fmt::Display for MemoryTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MemoryTier {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "working" => Ok(Self::Working),
            "short_term" => Ok(Self::ShortTerm),
            "long_term" => Ok(Self::LongTerm),
            _ => Err(ParseLabelError::new("memory tier", s)),
        }
    }
}

/// A node record, matching the `cognitive_nodes` table schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CognitiveNode {
    /// UUID v7 primary key.
    pub id: String,
    /// Account that owns this node; every operation is scoped to one owner.
    pub owner_id: String,
    pub content: String,
    pub memory_tier: MemoryTier,
    /// Relevance in `[0.0, 1.0]`.
    pub activation_strength: f64,
    /// Maturity in `[0.0, 1.0]`, raised on every promotion.
    pub consolidation_score: f64,
    /// Sensitive nodes are exempt from decay and eviction.
    pub is_sensitive: bool,
    pub last_accessed_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields needed to capture a new node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewNode {
    pub owner_id: String,
    pub content: String,
    pub memory_tier: MemoryTier,
    pub activation_strength: f64,
    pub is_sensitive: bool,
}

impl NewNode {
    /// A fresh working-tier node at full activation.
    pub fn working(owner_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            content: content.into(),
            memory_tier: MemoryTier::Working,
            activation_strength: 1.0,
            is_sensitive: false,
        }
    }
}

/// Why a consolidation run happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionType {
    AutomaticHourly,
    AutomaticDaily,
    AutomaticWeekly,
    Manual,
}

impl SessionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AutomaticHourly => "automatic_hourly",
            Self::AutomaticDaily => "automatic_daily",
            Self::AutomaticWeekly => "automatic_weekly",
            Self::Manual => "manual",
        }
    }
}

impl std::fmt::Display for SessionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SessionType {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "automatic_hourly" => Ok(Self::AutomaticHourly),
            "automatic_daily" => Ok(Self::AutomaticDaily),
            "automatic_weekly" => Ok(Self::AutomaticWeekly),
            "manual" => Ok(Self::Manual),
            _ => Err(ParseLabelError::new("session type", s)),
        }
    }
}

/// One row of the `consolidation_sessions` audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidationSession {
    pub id: String,
    pub owner_id: String,
    pub started_at: DateTime<Utc>,
    pub session_type: SessionType,
    pub nodes_processed: u64,
    pub patterns_discovered: u64,
    pub connections_strengthened: u64,
    /// Free-form audit details (per-step counts, failed steps, durations).
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_order_follows_promotion() {
        assert!(MemoryTier::Working < MemoryTier::ShortTerm);
        assert!(MemoryTier::ShortTerm < MemoryTier::LongTerm);
    }

    #[test]
    fn labels_parse_back() {
        for tier in MemoryTier::ALL {
            assert_eq!(tier.as_str().parse::<MemoryTier>().unwrap(), tier);
        }
        assert_eq!(
            "automatic_daily".parse::<SessionType>().unwrap(),
            SessionType::AutomaticDaily
        );
    }

    #[test]
    fn unknown_label_names_its_kind() {
        let err = "archived".parse::<MemoryTier>().unwrap_err();
        assert_eq!(err.to_string(), "unknown memory tier: archived");
    }

    #[test]
    fn tier_serializes_snake_case() {
        let json = serde_json::to_string(&MemoryTier::ShortTerm).unwrap();
        assert_eq!(json, "\"short_term\"");
    }
}
