use anyhow::Result;
use chrono::Utc;

use crate::config::RecollectConfig;
use crate::memory::types::NewNode;

/// Capture a working-tier memory from the command line.
pub fn remember(config: &RecollectConfig, owner: &str, content: &str, sensitive: bool) -> Result<()> {
    anyhow::ensure!(!content.is_empty(), "content must not be empty");
    let store = super::open_store(config)?;

    let mut node = NewNode::working(owner, content);
    node.is_sensitive = sensitive;
    let stored = store.insert_node(&node, Utc::now())?;

    println!("Stored {} ({} tier)", stored.id, stored.memory_tier);
    Ok(())
}
