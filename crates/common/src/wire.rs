//! JSON bodies exchanged between the order, store and delivery services.

use serde::{Deserialize, Serialize};

use crate::{ItemId, OrderId, Reservation, SlotId};

/// Body of `GET /store/item/{itemID}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemResponse {
    pub message: String,
    pub item_id: ItemId,
    pub name: String,
    pub free_slots: i64,
}

/// Body of `POST /store/item/{itemID}/reserve`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemReservationResponse {
    pub message: String,
    pub reservation_id: SlotId,
    pub lease: i64,
}

impl ItemReservationResponse {
    pub fn reservation(&self) -> Reservation {
        Reservation::new(self.reservation_id, self.lease)
    }
}

/// Body of `POST /agent/reserve`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentReservationResponse {
    pub message: String,
    pub id: SlotId,
    pub lease: i64,
}

impl AgentReservationResponse {
    pub fn reservation(&self) -> Reservation {
        Reservation::new(self.id, self.lease)
    }
}

/// Request body for the book endpoints of both resource services.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookRequest {
    pub reservation_id: SlotId,
    pub lease: i64,
    pub order_id: OrderId,
}

impl BookRequest {
    pub fn new(reservation: Reservation, order_id: OrderId) -> Self {
        Self {
            reservation_id: reservation.slot_id,
            lease: reservation.lease,
            order_id,
        }
    }

    pub fn reservation(&self) -> Reservation {
        Reservation::new(self.reservation_id, self.lease)
    }
}

/// Request body for the release endpoints of both resource services.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseRequest {
    pub reservation_id: SlotId,
    pub lease: i64,
}

impl ReleaseRequest {
    pub fn new(reservation: Reservation) -> Self {
        Self {
            reservation_id: reservation.slot_id,
            lease: reservation.lease,
        }
    }

    pub fn reservation(&self) -> Reservation {
        Reservation::new(self.reservation_id, self.lease)
    }
}

/// Plain acknowledgement body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Error body returned by every service on failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_step: Option<String>,
}

/// Request body of `POST /order`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    pub item_id: ItemId,
}

/// Body returned once an order has been placed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCreatedResponse {
    pub message: String,
    pub order_id: OrderId,
}
