//! Store service endpoints over the item ledger.

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use common::wire::{
    BookRequest, ItemReservationResponse, ItemResponse, MessageResponse, ReleaseRequest,
};
use ledger::{ItemId, Ledger, LedgerExt};

use crate::error::ApiError;

/// GET /store/item/{itemID}: item details and free slot count.
#[tracing::instrument(skip(ledger, item_id))]
pub async fn check<L: Ledger + Clone + 'static>(
    State(ledger): State<L>,
    item_id: Result<Path<i64>, PathRejection>,
) -> Result<Json<ItemResponse>, ApiError> {
    let Path(item_id) = item_id?;
    let item_id = ItemId::new(item_id);

    let item = ledger
        .lookup_item(item_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("item {item_id} not found")))?;

    Ok(Json(ItemResponse {
        message: "item exists in stock".to_string(),
        item_id: item.item_id,
        name: item.name,
        free_slots: item.free_slots,
    }))
}

/// POST /store/item/{itemID}/reserve: reserve one slot of the item.
#[tracing::instrument(skip(ledger, item_id))]
pub async fn reserve<L: Ledger + Clone + 'static>(
    State(ledger): State<L>,
    item_id: Result<Path<i64>, PathRejection>,
) -> Result<Json<ItemReservationResponse>, ApiError> {
    let Path(item_id) = item_id?;
    let reservation = ledger.reserve(Some(ItemId::new(item_id))).await?;

    Ok(Json(ItemReservationResponse {
        message: "item reserved".to_string(),
        reservation_id: reservation.slot_id,
        lease: reservation.lease,
    }))
}

/// POST /store/item/{itemID}/book: book a reserved slot under an order.
///
/// The slot must belong to the item in the path.
#[tracing::instrument(skip(ledger, item_id, req))]
pub async fn book<L: Ledger + Clone + 'static>(
    State(ledger): State<L>,
    item_id: Result<Path<i64>, PathRejection>,
    req: Result<Json<BookRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Path(item_id) = item_id?;
    let Json(req) = req?;
    ledger
        .book_for_item(ItemId::new(item_id), req.reservation(), &req.order_id)
        .await?;
    Ok(Json(MessageResponse::new("item booked")))
}

/// POST /store/item/{itemID}/release: hand a reserved slot back.
#[tracing::instrument(skip(ledger, item_id, req))]
pub async fn release<L: Ledger + Clone + 'static>(
    State(ledger): State<L>,
    item_id: Result<Path<i64>, PathRejection>,
    req: Result<Json<ReleaseRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Path(item_id) = item_id?;
    let Json(req) = req?;
    ledger
        .release_for_item(ItemId::new(item_id), req.reservation())
        .await?;
    Ok(Json(MessageResponse::new("item released")))
}
