//! CLI `doctor` command: run database diagnostics and print a health report.

use anyhow::{Context, Result};

use crate::config::RecollectConfig;
use crate::db;

/// Run database diagnostics and print a health report.
pub fn doctor(config: &RecollectConfig) -> Result<()> {
    let db_path = config.resolved_db_path();

    if !db_path.exists() {
        println!("Database: not found at {}", db_path.display());
        println!("Run `recollect serve` or `recollect remember` to initialize.");
        return Ok(());
    }

    let file_size = std::fs::metadata(&db_path)
        .map(|m| m.len())
        .unwrap_or(0);

    let conn = db::open_database(&db_path)
        .context("failed to open database (may be corrupt)")?;

    let report = db::check_database_health(&conn)
        .context("failed to run health check")?;

    println!("Recollect Health Report");
    println!("=======================");
    println!();
    println!("Database:          {}", db_path.display());
    println!("File size:         {}", format_bytes(file_size));
    println!("Schema version:    {}", report.schema_version);
    println!();
    println!("Decay policy:");
    println!("  Working threshold:    {} h", config.decay.working_memory_threshold_hours);
    println!("  Short-term threshold: {} d", config.decay.short_term_threshold_days);
    println!("  Long-term decay rate: {}", config.decay.long_term_decay_rate);
    println!(
        "  Sensitive protection: {}",
        if config.decay.sensitive_memory_protection { "on" } else { "off" }
    );
    println!();
    println!("Row counts:");
    println!("  Nodes:           {}", report.node_count);
    println!("  Owners:          {}", report.owner_count);
    println!("  Sessions:        {}", report.session_count);
    println!();
    if report.integrity_ok {
        println!("Integrity check:   PASSED");
    } else {
        println!("Integrity check:   FAILED");
        println!();
        println!("Recovery steps:");
        println!("  1. Stop any running `recollect serve` process");
        println!("  2. Restore from a backup: cp backup.db {}", db_path.display());
    }

    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
