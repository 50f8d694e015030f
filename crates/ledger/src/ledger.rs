use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{ItemId, OrderId, Reservation, ResourceKind, SlotId};

use crate::{ItemAvailability, ReservationSlot, Result, SlotCounts};

/// Core trait for resource ledgers.
///
/// A ledger owns the reservation slots of one resource type and guarantees
/// that every state change happens inside one local transaction holding an
/// exclusive lock on the affected row. All implementations must be
/// thread-safe (Send + Sync).
#[async_trait]
pub trait Ledger: Send + Sync {
    /// The resource type whose slots this ledger owns.
    fn kind(&self) -> ResourceKind;

    /// Reserves exactly one free slot.
    ///
    /// `selector` narrows the candidates to one item's slots and is only
    /// meaningful for resource types with units. Each successful caller
    /// receives a distinct slot and a fresh lease on it. Fails with
    /// `NoAvailability` if no free slot is left.
    async fn reserve(&self, selector: Option<ItemId>) -> Result<Reservation>;

    /// Books a reserved slot under `order_id`.
    ///
    /// Fails with `InvalidReservation` unless the slot is currently reserved
    /// under the lease `reservation` carries. Concurrent books on the same
    /// slot serialize on its row lock and only the first one commits.
    async fn book(&self, reservation: Reservation, order_id: &OrderId) -> Result<()>;

    /// Hands a reserved, unbooked slot back to the pool.
    ///
    /// Like [`book`](Self::book), only the current lease holder may release.
    async fn release(&self, reservation: Reservation) -> Result<()>;

    /// Returns every slot reserved before `cutoff` to the pool.
    ///
    /// Rows locked by in-flight transactions are left for the next sweep.
    async fn sweep_expired(&self, cutoff: DateTime<Utc>) -> Result<Vec<SlotId>>;

    /// Looks up an item and counts its free slots. Advisory only.
    async fn lookup_item(&self, item_id: ItemId) -> Result<Option<ItemAvailability>>;

    /// Reads a slot without locking it.
    async fn get_slot(&self, slot_id: SlotId) -> Result<Option<ReservationSlot>>;

    /// Counts slots per state.
    async fn counts(&self) -> Result<SlotCounts>;

    /// Registers a new item.
    async fn add_item(&self, name: &str) -> Result<ItemId>;

    /// Creates `count` free slots, owned by `owner` if given.
    async fn provision(&self, owner: Option<ItemId>, count: usize) -> Result<Vec<SlotId>>;
}

/// Extension trait providing convenience methods for ledgers.
#[async_trait]
pub trait LedgerExt: Ledger {
    /// Seeds an empty ledger the way a fresh deployment expects it.
    ///
    /// Store ledgers get one item with `slots` slots, delivery ledgers get
    /// `slots` agents. Does nothing if the ledger already holds slots.
    async fn seed_if_empty(&self, item_name: &str, slots: usize) -> Result<bool> {
        if self.counts().await?.total() > 0 {
            return Ok(false);
        }
        let owner = if self.kind().has_units() {
            Some(self.add_item(item_name).await?)
        } else {
            None
        };
        self.provision(owner, slots).await?;
        tracing::info!(resource = %self.kind(), slots, "seeded empty ledger");
        Ok(true)
    }

    /// Books a reservation reached through one item's address.
    ///
    /// Fails with `InvalidReservation` if the slot does not belong to
    /// `item_id`. Slot ownership is fixed at provisioning, so checking it
    /// ahead of the locked book cannot race.
    async fn book_for_item(
        &self,
        item_id: ItemId,
        reservation: Reservation,
        order_id: &OrderId,
    ) -> Result<()> {
        self.ensure_owned_by(item_id, reservation.slot_id).await?;
        self.book(reservation, order_id).await
    }

    /// Releases a reservation reached through one item's address.
    async fn release_for_item(&self, item_id: ItemId, reservation: Reservation) -> Result<()> {
        self.ensure_owned_by(item_id, reservation.slot_id).await?;
        self.release(reservation).await
    }

    /// Fails with `InvalidReservation` unless `slot_id` is one of `item_id`'s slots.
    async fn ensure_owned_by(&self, item_id: ItemId, slot_id: SlotId) -> Result<()> {
        match self.get_slot(slot_id).await? {
            Some(slot) if slot.owner_resource_id == Some(item_id) => Ok(()),
            _ => {
                tracing::debug!(%item_id, %slot_id, "slot addressed through a foreign item");
                Err(crate::LedgerError::InvalidReservation(slot_id))
            }
        }
    }
}

// Blanket implementation for all Ledger implementations
impl<T: Ledger + ?Sized> LedgerExt for T {}

/// Ensures a selector is only used on resource types that have units.
pub(crate) fn check_selector(kind: ResourceKind, selector: Option<ItemId>) -> Result<()> {
    if selector.is_some() && !kind.has_units() {
        return Err(crate::LedgerError::UnsupportedSelector(kind));
    }
    Ok(())
}

/// Records the outcome of a reserve attempt.
pub(crate) fn record_reserve(kind: ResourceKind, result: &Result<Reservation>) {
    match result {
        Ok(_) => metrics::counter!("ledger_reservations_total", "resource" => kind.as_str())
            .increment(1),
        Err(_) => {
            metrics::counter!("ledger_reservation_failures_total", "resource" => kind.as_str())
                .increment(1)
        }
    }
}
