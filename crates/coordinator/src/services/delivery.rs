//! Delivery service trait with HTTP and ledger-backed implementations.

use std::time::Duration;

use async_trait::async_trait;
use common::wire::{AgentReservationResponse, BookRequest, MessageResponse, ReleaseRequest};
use common::{OrderId, Reservation};
use ledger::Ledger;

use super::http::PeerClient;
use crate::error::Result;

/// Operations the coordinator needs from the delivery service.
#[async_trait]
pub trait DeliveryService: Send + Sync {
    /// Reserves any free agent.
    async fn reserve_agent(&self) -> Result<Reservation>;

    /// Books a reserved agent slot under the order.
    async fn book_agent(&self, reservation: Reservation, order_id: &OrderId) -> Result<()>;

    /// Hands a reserved agent slot back.
    async fn release_agent(&self, reservation: Reservation) -> Result<()>;
}

/// Talks to a remote delivery service.
#[derive(Debug, Clone)]
pub struct HttpDeliveryService {
    peer: PeerClient,
}

impl HttpDeliveryService {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            peer: PeerClient::new("delivery", base_url, timeout),
        }
    }

    pub fn base_url(&self) -> &str {
        self.peer.base_url()
    }
}

#[async_trait]
impl DeliveryService for HttpDeliveryService {
    async fn reserve_agent(&self) -> Result<Reservation> {
        let reserved: AgentReservationResponse = self.peer.post("/agent/reserve").await?;
        Ok(reserved.reservation())
    }

    async fn book_agent(&self, reservation: Reservation, order_id: &OrderId) -> Result<()> {
        let body = BookRequest::new(reservation, order_id.clone());
        let _: MessageResponse = self.peer.post_json("/agent/book", &body).await?;
        Ok(())
    }

    async fn release_agent(&self, reservation: Reservation) -> Result<()> {
        let body = ReleaseRequest::new(reservation);
        let _: MessageResponse = self.peer.post_json("/agent/release", &body).await?;
        Ok(())
    }
}

/// Drives a delivery ledger in the same process.
#[derive(Debug, Clone)]
pub struct LedgerDeliveryService<L: Ledger> {
    ledger: L,
}

impl<L: Ledger> LedgerDeliveryService<L> {
    pub fn new(ledger: L) -> Self {
        Self { ledger }
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }
}

#[async_trait]
impl<L: Ledger> DeliveryService for LedgerDeliveryService<L> {
    async fn reserve_agent(&self) -> Result<Reservation> {
        Ok(self.ledger.reserve(None).await?)
    }

    async fn book_agent(&self, reservation: Reservation, order_id: &OrderId) -> Result<()> {
        Ok(self.ledger.book(reservation, order_id).await?)
    }

    async fn release_agent(&self, reservation: Reservation) -> Result<()> {
        Ok(self.ledger.release(reservation).await?)
    }
}
