//! HTTP services for the store, delivery and order roles.
//!
//! The store and delivery services each expose one resource ledger; the
//! order service places orders by calling both through the coordinator.
//! Every service carries structured logging (tracing) and Prometheus
//! metrics.

pub mod config;
pub mod error;
pub mod routes;
pub mod server;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use coordinator::{DeliveryService, OrderCoordinator, StoreService};
use ledger::Ledger;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Creates the store service router over an item ledger.
pub fn store_app<L: Ledger + Clone + 'static>(ledger: L, metrics_handle: PrometheusHandle) -> Router {
    Router::new()
        .route("/store/item/{item_id}", get(routes::store::check::<L>))
        .route("/store/item/{item_id}/reserve", post(routes::store::reserve::<L>))
        .route("/store/item/{item_id}/book", post(routes::store::book::<L>))
        .route("/store/item/{item_id}/release", post(routes::store::release::<L>))
        .route("/status", get(routes::ops::ledger_status::<L>))
        .with_state(ledger)
        .merge(ops_router(metrics_handle))
        .layer(TraceLayer::new_for_http())
}

/// Creates the delivery service router over an agent ledger.
pub fn delivery_app<L: Ledger + Clone + 'static>(
    ledger: L,
    metrics_handle: PrometheusHandle,
) -> Router {
    Router::new()
        .route("/agent/reserve", post(routes::delivery::reserve::<L>))
        .route("/agent/book", post(routes::delivery::book::<L>))
        .route("/agent/release", post(routes::delivery::release::<L>))
        .route("/status", get(routes::ops::ledger_status::<L>))
        .with_state(ledger)
        .merge(ops_router(metrics_handle))
        .layer(TraceLayer::new_for_http())
}

/// Creates the order service router.
pub fn order_app<S, D>(
    coordinator: Arc<OrderCoordinator<S, D>>,
    metrics_handle: PrometheusHandle,
) -> Router
where
    S: StoreService + 'static,
    D: DeliveryService + 'static,
{
    Router::new()
        .route("/order", post(routes::orders::create::<S, D>))
        .route("/status", get(routes::ops::health))
        .with_state(coordinator)
        .merge(ops_router(metrics_handle))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

fn ops_router(metrics_handle: PrometheusHandle) -> Router {
    Router::new()
        .route("/health", get(routes::ops::health))
        .route("/metrics", get(routes::ops::metrics))
        .with_state(metrics_handle)
}
