//! Store service trait with HTTP and ledger-backed implementations.

use std::time::Duration;

use async_trait::async_trait;
use common::wire::{BookRequest, ItemReservationResponse, ItemResponse, MessageResponse, ReleaseRequest};
use common::{ItemId, OrderId, Reservation};
use ledger::{ItemAvailability, Ledger, LedgerExt};

use super::http::PeerClient;
use crate::error::Result;

/// Operations the coordinator needs from the store.
#[async_trait]
pub trait StoreService: Send + Sync {
    /// Looks up an item and its free slot count. `None` if unknown.
    async fn check_item(&self, item_id: ItemId) -> Result<Option<ItemAvailability>>;

    /// Reserves one slot of the item.
    async fn reserve_item(&self, item_id: ItemId) -> Result<Reservation>;

    /// Books a reserved item slot under the order.
    async fn book_item(
        &self,
        item_id: ItemId,
        reservation: Reservation,
        order_id: &OrderId,
    ) -> Result<()>;

    /// Hands a reserved item slot back.
    async fn release_item(&self, item_id: ItemId, reservation: Reservation) -> Result<()>;
}

/// Talks to a remote store service.
#[derive(Debug, Clone)]
pub struct HttpStoreService {
    peer: PeerClient,
}

impl HttpStoreService {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            peer: PeerClient::new("store", base_url, timeout),
        }
    }

    pub fn base_url(&self) -> &str {
        self.peer.base_url()
    }
}

#[async_trait]
impl StoreService for HttpStoreService {
    async fn check_item(&self, item_id: ItemId) -> Result<Option<ItemAvailability>> {
        let item: Option<ItemResponse> = self.peer.get(&format!("/store/item/{item_id}")).await?;
        Ok(item.map(|item| ItemAvailability {
            item_id: item.item_id,
            name: item.name,
            free_slots: item.free_slots,
        }))
    }

    async fn reserve_item(&self, item_id: ItemId) -> Result<Reservation> {
        let reserved: ItemReservationResponse = self
            .peer
            .post(&format!("/store/item/{item_id}/reserve"))
            .await?;
        Ok(reserved.reservation())
    }

    async fn book_item(
        &self,
        item_id: ItemId,
        reservation: Reservation,
        order_id: &OrderId,
    ) -> Result<()> {
        let body = BookRequest::new(reservation, order_id.clone());
        let _: MessageResponse = self
            .peer
            .post_json(&format!("/store/item/{item_id}/book"), &body)
            .await?;
        Ok(())
    }

    async fn release_item(&self, item_id: ItemId, reservation: Reservation) -> Result<()> {
        let body = ReleaseRequest::new(reservation);
        let _: MessageResponse = self
            .peer
            .post_json(&format!("/store/item/{item_id}/release"), &body)
            .await?;
        Ok(())
    }
}

/// Drives a store ledger in the same process.
#[derive(Debug, Clone)]
pub struct LedgerStoreService<L: Ledger> {
    ledger: L,
}

impl<L: Ledger> LedgerStoreService<L> {
    pub fn new(ledger: L) -> Self {
        Self { ledger }
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }
}

#[async_trait]
impl<L: Ledger> StoreService for LedgerStoreService<L> {
    async fn check_item(&self, item_id: ItemId) -> Result<Option<ItemAvailability>> {
        Ok(self.ledger.lookup_item(item_id).await?)
    }

    async fn reserve_item(&self, item_id: ItemId) -> Result<Reservation> {
        Ok(self.ledger.reserve(Some(item_id)).await?)
    }

    async fn book_item(
        &self,
        item_id: ItemId,
        reservation: Reservation,
        order_id: &OrderId,
    ) -> Result<()> {
        Ok(self
            .ledger
            .book_for_item(item_id, reservation, order_id)
            .await?)
    }

    async fn release_item(&self, item_id: ItemId, reservation: Reservation) -> Result<()> {
        Ok(self.ledger.release_for_item(item_id, reservation).await?)
    }
}
