use anyhow::Result;

use crate::config::RecollectConfig;

/// Print the schedule table and next execution.
pub fn status(config: &RecollectConfig) -> Result<()> {
    let scheduler = super::offline_scheduler(config)?;
    let status = scheduler.system_status();

    println!("Scheduler Status");
    println!("{}", "=".repeat(40));
    if !config.scheduler.persist_schedules {
        println!("(schedules are not persisted; showing defaults for a fresh start)");
    }
    println!(
        "  Healthy:             {}",
        if status.is_healthy { "yes" } else { "no (all schedules disabled)" }
    );
    println!(
        "  Enabled schedules:   {}/{}",
        status.enabled_schedules, status.total_schedules
    );
    match (status.next_execution, status.next_execution_type) {
        (Some(at), Some(kind)) => println!("  Next execution:      {kind} at {at}"),
        _ => println!("  Next execution:      none"),
    }
    println!();

    println!("Schedules:");
    for schedule in &status.schedules {
        let last = schedule
            .last_run
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "never".into());
        println!(
            "  {:<8} {:<9} next {}  last {}  ({} nodes)",
            schedule.kind.as_str(),
            if schedule.enabled { "enabled" } else { "disabled" },
            schedule.next_run.to_rfc3339(),
            last,
            schedule.processing_nodes
        );
    }

    Ok(())
}
