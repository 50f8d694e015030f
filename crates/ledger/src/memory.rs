use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{ItemId, OrderId, Reservation, ResourceKind, SlotId};
use tokio::sync::{Mutex, RwLock};

use crate::ledger::{Ledger, check_selector, record_reserve};
use crate::{ItemAvailability, LedgerError, ReservationSlot, Result, SlotCounts};

/// One row of the slot table.
///
/// The owner never changes, so it lives outside the row lock and candidate
/// filtering does not have to touch locks held by other callers.
struct Row {
    owner: Option<ItemId>,
    slot: Mutex<ReservationSlot>,
}

#[derive(Default)]
struct Tables {
    items: BTreeMap<ItemId, String>,
    rows: BTreeMap<SlotId, Arc<Row>>,
    next_item_id: i64,
    next_slot_id: i64,
}

/// In-memory ledger implementation for tests and database-less deployments.
///
/// Every slot sits behind its own mutex, which plays the role of the
/// database row lock. Reserve, book and release wait for the lock and
/// re-check the row once they hold it, so a concurrent reader holding a
/// row for a moment never makes reserve pass over a free slot. No lock is
/// held across an await other than its own acquisition. The sweep uses
/// `try_lock` and leaves busy rows for its next tick.
#[derive(Clone)]
pub struct InMemoryLedger {
    kind: ResourceKind,
    tables: Arc<RwLock<Tables>>,
    fail_next_write: Arc<AtomicBool>,
}

impl InMemoryLedger {
    /// Creates an empty ledger for the given resource type.
    pub fn new(kind: ResourceKind) -> Self {
        Self {
            kind,
            tables: Arc::new(RwLock::new(Tables::default())),
            fail_next_write: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Creates a store ledger holding one item with `slots` free slots.
    pub async fn with_item(name: &str, slots: usize) -> Result<(Self, ItemId)> {
        let ledger = Self::new(ResourceKind::StoreItem);
        let item_id = ledger.add_item(name).await?;
        ledger.provision(Some(item_id), slots).await?;
        Ok((ledger, item_id))
    }

    /// Creates a delivery ledger holding `slots` free agents.
    pub async fn with_agents(slots: usize) -> Result<Self> {
        let ledger = Self::new(ResourceKind::DeliveryAgent);
        ledger.provision(None, slots).await?;
        Ok(ledger)
    }

    /// Makes the next write fail after its row lock has been taken.
    pub fn fail_next_write(&self) {
        self.fail_next_write.store(true, Ordering::SeqCst);
    }

    fn take_write_fault(&self, slot_id: SlotId) -> Result<()> {
        if self.fail_next_write.swap(false, Ordering::SeqCst) {
            return Err(LedgerError::Persistence(format!(
                "failed to update slot {slot_id}"
            )));
        }
        Ok(())
    }

    async fn row(&self, slot_id: SlotId) -> Option<Arc<Row>> {
        self.tables.read().await.rows.get(&slot_id).cloned()
    }

    async fn all_rows(&self) -> Vec<Arc<Row>> {
        self.tables.read().await.rows.values().cloned().collect()
    }

    /// Rows that could satisfy `selector`, in id order.
    async fn candidates(&self, selector: Option<ItemId>) -> Vec<Arc<Row>> {
        self.tables
            .read()
            .await
            .rows
            .values()
            .filter(|row| selector.is_none_or(|item| row.owner == Some(item)))
            .cloned()
            .collect()
    }

    async fn try_reserve(&self, selector: Option<ItemId>) -> Result<Reservation> {
        for row in self.candidates(selector).await {
            let mut slot = row.slot.lock().await;
            if !slot.is_eligible(selector) {
                continue;
            }
            self.take_write_fault(slot.id)?;
            return slot.reserve(Utc::now());
        }
        Err(LedgerError::NoAvailability {
            resource: self.kind,
            item_id: selector,
        })
    }

    /// Locks the row `reservation` points at and applies `transition`.
    async fn transition_held(
        &self,
        reservation: Reservation,
        transition: impl FnOnce(&mut ReservationSlot) -> Result<()>,
    ) -> Result<()> {
        let slot_id = reservation.slot_id;
        let row = self
            .row(slot_id)
            .await
            .ok_or(LedgerError::InvalidReservation(slot_id))?;
        let mut slot = row.slot.lock().await;
        if !slot.is_held_by(reservation) {
            return Err(LedgerError::InvalidReservation(slot_id));
        }
        self.take_write_fault(slot_id)?;
        transition(&mut *slot)
    }
}

#[async_trait]
impl Ledger for InMemoryLedger {
    fn kind(&self) -> ResourceKind {
        self.kind
    }

    #[tracing::instrument(skip(self), fields(resource = %self.kind))]
    async fn reserve(&self, selector: Option<ItemId>) -> Result<Reservation> {
        check_selector(self.kind, selector)?;
        let result = self.try_reserve(selector).await;
        record_reserve(self.kind, &result);
        result
    }

    #[tracing::instrument(skip(self), fields(resource = %self.kind))]
    async fn book(&self, reservation: Reservation, order_id: &OrderId) -> Result<()> {
        self.transition_held(reservation, |slot| slot.book(reservation, order_id))
            .await?;
        metrics::counter!("ledger_bookings_total", "resource" => self.kind.as_str()).increment(1);
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(resource = %self.kind))]
    async fn release(&self, reservation: Reservation) -> Result<()> {
        self.transition_held(reservation, |slot| slot.release(reservation))
            .await?;
        metrics::counter!("ledger_releases_total", "resource" => self.kind.as_str()).increment(1);
        Ok(())
    }

    async fn sweep_expired(&self, cutoff: DateTime<Utc>) -> Result<Vec<SlotId>> {
        let mut reclaimed = Vec::new();
        for row in self.all_rows().await {
            let Ok(mut slot) = row.slot.try_lock() else {
                continue;
            };
            if slot.expire(cutoff) {
                reclaimed.push(slot.id);
            }
        }
        if !reclaimed.is_empty() {
            metrics::counter!("ledger_expired_total", "resource" => self.kind.as_str())
                .increment(reclaimed.len() as u64);
        }
        Ok(reclaimed)
    }

    async fn lookup_item(&self, item_id: ItemId) -> Result<Option<ItemAvailability>> {
        let (name, rows) = {
            let tables = self.tables.read().await;
            let Some(name) = tables.items.get(&item_id).cloned() else {
                return Ok(None);
            };
            let rows: Vec<Arc<Row>> = tables
                .rows
                .values()
                .filter(|row| row.owner == Some(item_id))
                .cloned()
                .collect();
            (name, rows)
        };

        let mut free_slots = 0;
        for row in rows {
            if row.slot.lock().await.is_eligible(Some(item_id)) {
                free_slots += 1;
            }
        }

        Ok(Some(ItemAvailability {
            item_id,
            name,
            free_slots,
        }))
    }

    async fn get_slot(&self, slot_id: SlotId) -> Result<Option<ReservationSlot>> {
        match self.row(slot_id).await {
            Some(row) => Ok(Some(row.slot.lock().await.clone())),
            None => Ok(None),
        }
    }

    async fn counts(&self) -> Result<SlotCounts> {
        let mut counts = SlotCounts::default();
        for row in self.all_rows().await {
            counts.record(row.slot.lock().await.status);
        }
        Ok(counts)
    }

    async fn add_item(&self, name: &str) -> Result<ItemId> {
        if !self.kind.has_units() {
            return Err(LedgerError::UnsupportedSelector(self.kind));
        }
        let mut tables = self.tables.write().await;
        tables.next_item_id += 1;
        let item_id = ItemId::new(tables.next_item_id);
        tables.items.insert(item_id, name.to_string());
        Ok(item_id)
    }

    async fn provision(&self, owner: Option<ItemId>, count: usize) -> Result<Vec<SlotId>> {
        check_selector(self.kind, owner)?;
        let mut tables = self.tables.write().await;
        if let Some(item_id) = owner
            && !tables.items.contains_key(&item_id)
        {
            return Err(LedgerError::ItemNotFound(item_id));
        }

        let mut ids = Vec::with_capacity(count);
        for _ in 0..count {
            tables.next_slot_id += 1;
            let id = SlotId::new(tables.next_slot_id);
            tables.rows.insert(
                id,
                Arc::new(Row {
                    owner,
                    slot: Mutex::new(ReservationSlot::new(id, owner)),
                }),
            );
            ids.push(id);
        }
        Ok(ids)
    }
}
