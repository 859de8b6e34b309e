//! Transfer daemon: consumes migration jobs and moves artifacts across tiers.

use std::sync::Arc;
use std::time::Duration;

use strata_core::Config;
use strata_db::PgMetadataStore;
use strata_storage::{create_tier_router, ChunkStagingStore};
use strata_transfer::{RedisBroker, SupervisedBroker, TransferWorker};
use tokio::sync::mpsc;
use tracing_subscriber::{
    fmt::format::Format, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

fn init_tracing() {
    let console_fmt = tracing_subscriber::fmt::layer().event_format(
        Format::default()
            .compact()
            .with_target(false)
            .without_time(),
    );
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "strata=info".into()))
        .with(console_fmt)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = Config::from_env();

    let pool = strata_db::connect_pool(&config).await?;
    strata_db::run_migrations(&pool).await?;
    let metadata = Arc::new(PgMetadataStore::new(pool));

    let router = create_tier_router(&config).await?;

    let broker = RedisBroker::connect(&config.redis_url).await?;
    let broker = Arc::new(SupervisedBroker::new(Arc::new(broker)));

    let worker = TransferWorker::new(broker, router, metadata, config.transfer_queue.clone());

    // Orphan sweep: reclaim staged chunks from sessions whose coordination
    // state expired without a merge or cancel.
    let staging = ChunkStagingStore::new(&config.chunk_staging_root).await?;
    let max_age = Duration::from_secs(config.session_ttl_secs);
    let (sweep_shutdown_tx, mut sweep_shutdown_rx) = mpsc::channel::<()>(1);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(3600));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = staging.sweep_older_than(max_age).await {
                        tracing::error!(error = %e, "Staging sweep failed");
                    }
                }
                _ = sweep_shutdown_rx.recv() => break,
            }
        }
    });

    let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(()).await;
    });

    worker.run(shutdown_rx).await;
    let _ = sweep_shutdown_tx.send(()).await;
    Ok(())
}

/// Listens for Ctrl+C (SIGINT) and SIGTERM signals to initiate graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal");
        },
    }

    tracing::info!("Shutting down gracefully...");
}
