//! Order service entry point.

use std::sync::Arc;

use api::config::{Config, ORDER_PORT};
use api::server::{self, StartupError};
use coordinator::{HttpDeliveryService, HttpStoreService, OrderCoordinator};

#[tokio::main]
async fn main() -> Result<(), StartupError> {
    let config = Config::from_env(ORDER_PORT);
    server::init_tracing(&config);
    let metrics_handle = server::install_metrics()?;

    let store = HttpStoreService::new(config.store_url.clone(), config.request_timeout);
    let delivery = HttpDeliveryService::new(config.delivery_url.clone(), config.request_timeout);
    tracing::info!(
        store = store.base_url(),
        delivery = delivery.base_url(),
        timeout_ms = config.request_timeout.as_millis() as u64,
        "order service peers"
    );

    let coordinator = Arc::new(OrderCoordinator::new(store, delivery));
    let app = api::order_app(coordinator, metrics_handle);
    server::serve(&config, app, server::shutdown_signal()).await
}
