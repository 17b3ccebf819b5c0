//! Tiered memory with scheduled consolidation for AI agents, served over MCP.
//!
//! Recollect keeps each owner's memories as cognitive nodes in one of three tiers and
//! periodically consolidates them:
//!
//! | Tier | Enters when | Leaves when |
//! |------|-------------|-------------|
//! | **Working** | captured | idle past the working threshold with activation > 0.3 (promoted), or stale and weak (evicted) |
//! | **Short-term** | promoted from working | idle past the short-term threshold with activation > 0.5 (promoted), or stale and weak (evicted) |
//! | **Long-term** | promoted from short-term | never; activation decays toward a floor of 0.1 |
//!
//! # Architecture
//!
//! - **Storage**: SQLite via rusqlite, behind the [`memory::store::MemoryStore`] trait
//! - **Consolidation**: a pure planner ([`consolidation::decay`]) and a runner that applies
//!   four ordered, independently failing batches and records an append-only session
//! - **Scheduling**: hourly/daily/weekly schedules ticked by a tokio interval, guarded so
//!   at most one run is active at a time
//! - **Transport**: MCP over stdio (primary) or Streamable HTTP/SSE
//!
//! # Modules
//!
//! - [`config`]: configuration loading from TOML files and environment variables
//! - [`db`]: SQLite database initialization, schema, migrations, and health checks
//! - [`memory`]: node and session types, the store, and per-tier statistics
//! - [`consolidation`]: decay policy and the consolidation runner
//! - [`scheduler`]: schedule registry, background ticker, and manual triggers

pub mod config;
pub mod consolidation;
pub mod db;
pub mod memory;
pub mod scheduler;
