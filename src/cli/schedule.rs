use anyhow::Result;

use crate::config::RecollectConfig;
use crate::scheduler::registry::ScheduleKind;

/// Toggle a persisted schedule. Without persistence the change would be lost on exit.
pub async fn toggle(config: &RecollectConfig, kind: &str) -> Result<()> {
    anyhow::ensure!(
        config.scheduler.persist_schedules,
        "schedule persistence is disabled; set scheduler.persist_schedules = true or use the toggle_schedule MCP tool on a running server"
    );
    let kind: ScheduleKind = kind.parse()?;

    let scheduler = super::offline_scheduler(config)?;
    let enabled = scheduler.toggle_schedule(kind).await;
    scheduler.shutdown().await?;

    println!(
        "{kind} schedule is now {}",
        if enabled { "enabled" } else { "disabled" }
    );
    Ok(())
}
