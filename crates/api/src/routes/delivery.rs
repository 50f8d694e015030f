//! Delivery service endpoints over the agent ledger.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use common::wire::{AgentReservationResponse, BookRequest, MessageResponse, ReleaseRequest};
use ledger::Ledger;

use crate::error::ApiError;

/// POST /agent/reserve: reserve any free agent.
#[tracing::instrument(skip(ledger))]
pub async fn reserve<L: Ledger + Clone + 'static>(
    State(ledger): State<L>,
) -> Result<Json<AgentReservationResponse>, ApiError> {
    let reservation = ledger.reserve(None).await?;
    Ok(Json(AgentReservationResponse {
        message: "delivery agent reserved".to_string(),
        id: reservation.slot_id,
        lease: reservation.lease,
    }))
}

/// POST /agent/book: book a reserved agent under an order.
#[tracing::instrument(skip(ledger, req))]
pub async fn book<L: Ledger + Clone + 'static>(
    State(ledger): State<L>,
    req: Result<Json<BookRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Json(req) = req?;
    ledger.book(req.reservation(), &req.order_id).await?;
    Ok(Json(MessageResponse::new("delivery agent booked")))
}

/// POST /agent/release: hand a reserved agent back.
#[tracing::instrument(skip(ledger, req))]
pub async fn release<L: Ledger + Clone + 'static>(
    State(ledger): State<L>,
    req: Result<Json<ReleaseRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Json(req) = req?;
    ledger.release(req.reservation()).await?;
    Ok(Json(MessageResponse::new("delivery agent released")))
}
