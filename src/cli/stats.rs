use anyhow::Result;

use crate::config::RecollectConfig;
use crate::memory::types::MemoryTier;

/// Display memory statistics for one owner in the terminal.
pub fn stats(config: &RecollectConfig, owner: &str) -> Result<()> {
    let store = super::open_store(config)?;
    let response = crate::memory::stats::memory_stats(store.as_ref(), owner)?;

    println!("Memory Statistics for {}", response.owner_id);
    println!("{}", "=".repeat(40));
    println!("  Total nodes:         {}", response.total_nodes);
    println!("  Average activation:  {:.3}", response.average_activation);
    println!();

    println!("By Tier:");
    for tier in MemoryTier::ALL {
        let Some(tier_stats) = response.by_tier.get(tier.as_str()) else {
            continue;
        };
        println!(
            "  {:<12} {:>6}   avg activation {:.3}",
            tier.as_str(),
            tier_stats.count,
            tier_stats.average_activation
        );
    }

    let sessions = store.list_sessions(owner, 5)?;
    if !sessions.is_empty() {
        println!();
        println!("Recent sessions:");
        for session in sessions {
            println!(
                "  {}  {:<18} {} processed",
                session.started_at.format("%Y-%m-%d %H:%M:%S"),
                session.session_type.as_str(),
                session.nodes_processed
            );
        }
    }

    Ok(())
}
