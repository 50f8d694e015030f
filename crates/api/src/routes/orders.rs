//! Order placement endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use common::wire::{CreateOrderRequest, OrderCreatedResponse};
use coordinator::{DeliveryService, OrderCoordinator, StoreService};

use crate::error::ApiError;

/// POST /order: place an order for one item with one delivery agent.
#[tracing::instrument(skip(coordinator, req))]
pub async fn create<S, D>(
    State(coordinator): State<Arc<OrderCoordinator<S, D>>>,
    req: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<Json<OrderCreatedResponse>, ApiError>
where
    S: StoreService + 'static,
    D: DeliveryService + 'static,
{
    let Json(req) = req?;
    let confirmation = coordinator.create_order(req.item_id).await?;

    Ok(Json(OrderCreatedResponse {
        message: "Order created".to_string(),
        order_id: confirmation.order_id,
    }))
}
