//! Process bootstrap shared by the service binaries.

use std::future::Future;

use axum::Router;
use ledger::{Ledger, LedgerError, LedgerExt, ReservationSweeper};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;
use tokio::signal;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::Config;

/// Item seeded into an empty store ledger.
pub const SEED_ITEM_NAME: &str = "iPhone 12";

/// Errors that stop a service from starting or serving.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to install Prometheus recorder: {0}")]
    Metrics(#[from] BuildError),

    #[error("failed to connect to database: {0}")]
    Database(#[from] sqlx::Error),

    #[error("ledger setup failed: {0}")]
    Ledger(#[from] LedgerError),

    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Installs the global tracing subscriber.
pub fn init_tracing(config: &Config) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Installs the global Prometheus metrics recorder.
pub fn install_metrics() -> Result<PrometheusHandle, StartupError> {
    Ok(PrometheusBuilder::new().install_recorder()?)
}

/// Opens a connection pool if a database is configured.
pub async fn connect(config: &Config) -> Result<Option<PgPool>, StartupError> {
    let Some(url) = config.database_url.as_deref() else {
        tracing::info!("DATABASE_URL not set, using in-memory ledger");
        return Ok(None);
    };
    let pool = PgPoolOptions::new().max_connections(10).connect(url).await?;
    tracing::info!("connected to database");
    Ok(Some(pool))
}

/// Seeds the ledger, runs its lease sweeper and serves `app` until shutdown.
pub async fn run_ledger_service<L>(config: &Config, ledger: L, app: Router) -> Result<(), StartupError>
where
    L: Ledger + Clone + 'static,
{
    ledger
        .seed_if_empty(SEED_ITEM_NAME, config.seed_slots)
        .await?;

    let (stop_tx, stop_rx) = watch::channel(false);
    let sweeper = ReservationSweeper::new(
        ledger.clone(),
        config.reservation_ttl,
        config.sweep_interval,
        stop_rx,
    )
    .spawn();

    let served = serve(config, app, shutdown_signal()).await;

    if stop_tx.send(true).is_err() {
        tracing::debug!("reservation sweeper already stopped");
    }
    if let Err(e) = sweeper.await {
        tracing::error!(error = %e, "reservation sweeper panicked");
    }
    served
}

/// Binds the configured address and serves `app` until `shutdown` resolves.
pub async fn serve(
    config: &Config,
    app: Router,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), StartupError> {
    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    tracing::info!("server shut down gracefully");
    Ok(())
}

/// Waits for a shutdown signal (SIGINT or SIGTERM).
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}
