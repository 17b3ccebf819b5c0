use anyhow::Result;

use crate::config::RecollectConfig;
use crate::scheduler::trigger::TriggerOutcome;

/// Run a manual consolidation for one owner and print the report.
pub async fn consolidate(config: &RecollectConfig, owner: &str) -> Result<()> {
    let scheduler = super::offline_scheduler(config)?;

    let outcome = scheduler.force_consolidation(owner).await;
    println!("{}", outcome.message());

    if let TriggerOutcome::Completed { report } = &outcome {
        println!();
        println!("  Nodes scanned:          {}", report.nodes_scanned);
        println!("  Promoted to short-term: {}", report.promoted_to_short_term);
        println!("  Promoted to long-term:  {}", report.promoted_to_long_term);
        println!("  Decayed:                {}", report.decayed);
        println!("  Evicted:                {}", report.evicted);
        println!("  Duration:               {} ms", report.duration_ms);
        if let Some(ref id) = report.session_id {
            println!("  Session:                {id}");
        }
        for failure in &report.failed_steps {
            println!("  FAILED {}: {}", failure.step, failure.error);
        }
    }

    anyhow::ensure!(outcome.is_success(), "consolidation did not complete cleanly");
    Ok(())
}
