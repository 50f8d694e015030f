//! Delivery service entry point.

use api::config::{Config, DELIVERY_PORT};
use api::server::{self, StartupError};
use ledger::{InMemoryLedger, PostgresLedger, ResourceKind};

#[tokio::main]
async fn main() -> Result<(), StartupError> {
    let config = Config::from_env(DELIVERY_PORT);
    server::init_tracing(&config);
    let metrics_handle = server::install_metrics()?;

    match server::connect(&config).await? {
        Some(pool) => {
            let ledger = PostgresLedger::new(pool, ResourceKind::DeliveryAgent);
            ledger.run_migrations().await?;
            let app = api::delivery_app(ledger.clone(), metrics_handle);
            server::run_ledger_service(&config, ledger, app).await
        }
        None => {
            let ledger = InMemoryLedger::new(ResourceKind::DeliveryAgent);
            let app = api::delivery_app(ledger.clone(), metrics_handle);
            server::run_ledger_service(&config, ledger, app).await
        }
    }
}
