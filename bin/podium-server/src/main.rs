//! Podium Server - leaderboard HTTP service
//!
//! Opens the durable store, builds the in-memory ranking projection,
//! starts background maintenance and serves the JSON API.

use anyhow::{Context, Result};
use clap::Parser;
use podium_cache::spawn_sweeper;
use podium_leaderboard::Leaderboard;
use podium_server::http::{AppState, router};
use podium_server::settings::{Args, load_config};
use podium_store::{MemoryRankingStore, RedbStore};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let production = args.is_production();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.clone().into()),
        )
        .with(production.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!production).then(|| tracing_subscriber::fmt::layer()))
        .init();

    info!("Starting Podium server");

    let config = load_config(&args)?;
    info!(
        ranking_method = %config.ranking_method,
        cache_enabled = config.enable_cache,
        data_dir = %args.data_dir.display(),
        "Configuration loaded"
    );

    let db_path = args.db_path();
    let durable = Arc::new(
        RedbStore::open(&db_path)
            .with_context(|| format!("Failed to open durable store at {}", db_path.display()))?,
    );
    let ranking = Arc::new(MemoryRankingStore::new(config.metadata_ttl()));

    let board = Arc::new(Leaderboard::new(config.clone(), durable, ranking)?);

    // The ranking projection lives in memory, so an empty one after a
    // restart is rebuilt even without the flag.
    let ranked = board.ranked_players().await?;
    if config.rebuild_on_start || ranked == 0 {
        let report = board
            .rebuild_leaderboard()
            .await
            .context("Failed to rebuild leaderboard on startup")?;
        if report.failed > 0 {
            warn!(failed = report.failed, "Startup rebuild left players unprojected");
        }
        info!(
            players = report.players,
            projected = report.projected,
            "Leaderboard rebuilt on startup"
        );
    }

    let sweeper = board
        .cache()
        .map(|cache| spawn_sweeper(Arc::clone(cache), config.cache.sweep_interval()));
    let maintenance = board.start_maintenance();

    let app = router(AppState {
        board: Arc::clone(&board),
    });

    let addr: SocketAddr = args
        .listen
        .parse()
        .with_context(|| format!("Invalid listen address {}", args.listen))?;
    info!("HTTP API listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("Shutting down...");
        })
        .await?;

    maintenance.shutdown().await;
    if let Some(sweeper) = sweeper {
        sweeper.shutdown().await;
    }

    info!("Podium server shut down gracefully");
    Ok(())
}
