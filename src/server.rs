//! MCP server initialization for stdio and SSE transports.
//!
//! Provides [`serve_stdio`] and [`serve_sse`] entry points that wire up the database,
//! the consolidation scheduler and the MCP tool handler into a running server.

use crate::config::RecollectConfig;
use crate::db;
use crate::memory::store::{MemoryStore, SqliteMemoryStore};
use crate::scheduler::{Scheduler, SchedulerHandle};
use crate::tools::RecollectTools;
use anyhow::Result;
use chrono::Utc;
use rmcp::ServiceExt;
use std::sync::Arc;

/// Everything the tool handlers share for the life of the process.
struct SharedState {
    store: Arc<dyn MemoryStore>,
    scheduler: Arc<Scheduler>,
    ticker: Option<SchedulerHandle>,
}

/// Shared setup: open DB, build the scheduler, start its ticker if enabled.
fn setup_shared_state(config: RecollectConfig) -> Result<SharedState> {
    let db_path = config.resolved_db_path();
    let conn = db::open_database(&db_path)?;
    tracing::info!(db = %db_path.display(), "database ready");

    let store: Arc<dyn MemoryStore> = Arc::new(SqliteMemoryStore::new(conn));
    let scheduler = Arc::new(Scheduler::init(
        Arc::clone(&store),
        config.decay.clone(),
        config.scheduler.clone(),
        Utc::now(),
    ));

    let ticker = if config.scheduler.enabled {
        Some(scheduler.start())
    } else {
        tracing::info!("background scheduler disabled; only manual consolidation is available");
        None
    };

    Ok(SharedState {
        store,
        scheduler,
        ticker,
    })
}

/// Stop the ticker and persist schedules.
async fn teardown(state: SharedState) {
    if let Some(ticker) = state.ticker {
        ticker.stop().await;
    }
    if let Err(e) = state.scheduler.shutdown().await {
        tracing::warn!(error = %e, "scheduler shutdown failed");
    }
}

/// Start the MCP server over stdio transport.
pub async fn serve_stdio(config: RecollectConfig) -> Result<()> {
    tracing::info!("starting Recollect MCP server on stdio");

    let state = setup_shared_state(config)?;

    let tools = RecollectTools::new(Arc::clone(&state.scheduler), Arc::clone(&state.store));
    let transport = rmcp::transport::stdio();

    let result = async {
        let server = tools.serve(transport).await?;
        tracing::info!("MCP server running, waiting for client");
        server.waiting().await?;
        anyhow::Ok(())
    }
    .await;

    teardown(state).await;
    tracing::info!("MCP server shut down");
    result
}

/// Start the MCP server over Streamable HTTP (SSE) transport.
pub async fn serve_sse(config: RecollectConfig) -> Result<()> {
    let host = config.server.host.clone();
    let port = config.server.port;
    let bind_addr = format!("{host}:{port}");

    tracing::info!(addr = %bind_addr, "starting Recollect MCP server on SSE/HTTP");

    let state = setup_shared_state(config)?;
    let scheduler = Arc::clone(&state.scheduler);
    let store = Arc::clone(&state.store);

    let service = rmcp::transport::streamable_http_server::StreamableHttpService::new(
        move || Ok(RecollectTools::new(scheduler.clone(), store.clone())),
        rmcp::transport::streamable_http_server::session::local::LocalSessionManager::default()
            .into(),
        Default::default(),
    );

    let router = axum::Router::new().nest_service("/mcp", service);

    let result = async {
        let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
        tracing::info!(addr = %bind_addr, "MCP server listening at http://{bind_addr}/mcp");

        axum::serve(listener, router)
            .with_graceful_shutdown(async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!(error = %e, "failed to listen for ctrl-c");
                }
                tracing::info!("shutting down SSE server");
            })
            .await?;
        anyhow::Ok(())
    }
    .await;

    teardown(state).await;
    result
}
