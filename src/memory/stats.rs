use anyhow::Result;
use serde::Serialize;
use std::collections::BTreeMap;

use super::store::MemoryStore;

/// Response from memory_stats.
#[derive(Debug, Serialize)]
pub struct MemoryStats {
    pub owner_id: String,
    pub total_nodes: u64,
    pub by_tier: BTreeMap<String, TierStats>,
    /// Mean activation across every node of the owner, `0.0` when there are none.
    pub average_activation: f64,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct TierStats {
    pub count: u64,
    pub average_activation: f64,
}

/// Compute per-tier counts and activation averages for one owner.
pub fn memory_stats(store: &dyn MemoryStore, owner_id: &str) -> Result<MemoryStats> {
    let summaries = store.count_nodes_by_tier(owner_id)?;

    let total_nodes: u64 = summaries.iter().map(|s| s.count).sum();
    let weighted: f64 = summaries
        .iter()
        .map(|s| s.average_activation * s.count as f64)
        .sum();
    let average_activation = if total_nodes > 0 {
        weighted / total_nodes as f64
    } else {
        0.0
    };

    let by_tier = summaries
        .into_iter()
        .map(|s| {
            (
                s.tier.as_str().to_string(),
                TierStats {
                    count: s.count,
                    average_activation: s.average_activation,
                },
            )
        })
        .collect();

    Ok(MemoryStats {
        owner_id: owner_id.to_string(),
        total_nodes,
        by_tier,
        average_activation,
    })
}
