mod cli;
mod config;
mod consolidation;
mod db;
mod memory;
mod scheduler;
mod server;
mod tools;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "recollect", version, about = "Tiered memory consolidation MCP server")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the MCP server (transport from config: stdio or sse)
    Serve,
    /// Consolidate one owner's memories now
    Consolidate {
        /// Owner whose memories are consolidated
        #[arg(long)]
        owner: String,
    },
    /// Show per-tier memory statistics for an owner
    Stats {
        #[arg(long)]
        owner: String,
    },
    /// Show schedule state and the next execution
    Status,
    /// Manage consolidation schedules
    Schedule {
        #[command(subcommand)]
        action: ScheduleAction,
    },
    /// Capture a memory into the working tier
    Remember {
        #[arg(long)]
        owner: String,
        /// Protect the memory from decay and eviction
        #[arg(long)]
        sensitive: bool,
        content: String,
    },
    /// Run database diagnostics
    Doctor,
}

#[derive(Subcommand)]
enum ScheduleAction {
    /// Enable or disable a schedule (hourly, daily, weekly)
    Toggle { kind: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load config (for log level)
    let config = config::RecollectConfig::load()?;

    // Initialize tracing with the configured log level.
    // Log to stderr so stdout stays clean for MCP JSON-RPC.
    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Serve => match config.server.transport.as_str() {
            "sse" | "http" => server::serve_sse(config).await?,
            "stdio" => server::serve_stdio(config).await?,
            other => anyhow::bail!("unknown transport '{other}', expected 'stdio' or 'sse'"),
        },
        Command::Consolidate { owner } => {
            cli::consolidate::consolidate(&config, &owner).await?;
        }
        Command::Stats { owner } => {
            cli::stats::stats(&config, &owner)?;
        }
        Command::Status => {
            cli::status::status(&config)?;
        }
        Command::Schedule { action } => match action {
            ScheduleAction::Toggle { kind } => {
                cli::schedule::toggle(&config, &kind).await?;
            }
        },
        Command::Remember {
            owner,
            sensitive,
            content,
        } => {
            cli::remember::remember(&config, &owner, &content, sensitive)?;
        }
        Command::Doctor => {
            cli::doctor::doctor(&config)?;
        }
    }

    Ok(())
}
