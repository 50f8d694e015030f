//! Reservation slot state machine.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use common::{ItemId, OrderId, Reservation, SlotId};
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;

/// The state of a reservation slot.
///
/// State transitions:
/// ```text
/// Free ──reserve──► Reserved ──book──► Booked
///   ▲                  │
///   └──release/expire──┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SlotStatus {
    /// Available for reservation.
    #[default]
    Free,

    /// Held by one caller, not yet booked under an order.
    Reserved,

    /// Booked under an order (terminal state).
    Booked,
}

impl SlotStatus {
    /// Returns true if the slot can be reserved in this state.
    pub fn can_reserve(&self) -> bool {
        matches!(self, SlotStatus::Free)
    }

    /// Returns the state name as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotStatus::Free => "free",
            SlotStatus::Reserved => "reserved",
            SlotStatus::Booked => "booked",
        }
    }
}

impl std::fmt::Display for SlotStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SlotStatus {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(SlotStatus::Free),
            "reserved" => Ok(SlotStatus::Reserved),
            "booked" => Ok(SlotStatus::Booked),
            other => Err(LedgerError::Persistence(format!(
                "unknown slot status '{other}'"
            ))),
        }
    }
}

/// A unit of exclusivity in a resource ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationSlot {
    pub id: SlotId,
    /// Item this slot can satisfy; `None` for fungible resources.
    pub owner_resource_id: Option<ItemId>,
    pub status: SlotStatus,
    /// Set only by a successful book.
    pub current_order_id: Option<OrderId>,
    /// When the current reservation was granted.
    pub reserved_at: Option<DateTime<Utc>>,
    /// Bumped on every reserve; fences book and release.
    pub lease: i64,
}

impl ReservationSlot {
    /// Creates a free slot.
    pub fn new(id: SlotId, owner_resource_id: Option<ItemId>) -> Self {
        Self {
            id,
            owner_resource_id,
            status: SlotStatus::Free,
            current_order_id: None,
            reserved_at: None,
            lease: 0,
        }
    }

    /// Returns true if this slot is free and matches the selector.
    pub fn is_eligible(&self, selector: Option<ItemId>) -> bool {
        self.status.can_reserve()
            && self.current_order_id.is_none()
            && selector.is_none_or(|item| self.owner_resource_id == Some(item))
    }

    /// Returns true if `reservation` is the live reservation of this slot.
    pub fn is_held_by(&self, reservation: Reservation) -> bool {
        self.id == reservation.slot_id
            && self.status == SlotStatus::Reserved
            && self.lease == reservation.lease
    }

    /// Returns true if the slot has been reserved since before `cutoff`.
    pub fn is_expired(&self, cutoff: DateTime<Utc>) -> bool {
        self.status == SlotStatus::Reserved && self.reserved_at.is_some_and(|at| at < cutoff)
    }

    /// Free → Reserved under a new lease.
    pub fn reserve(&mut self, at: DateTime<Utc>) -> Result<Reservation, LedgerError> {
        if !self.status.can_reserve() {
            return Err(LedgerError::InvalidReservation(self.id));
        }
        self.status = SlotStatus::Reserved;
        self.reserved_at = Some(at);
        self.lease += 1;
        Ok(Reservation::new(self.id, self.lease))
    }

    /// Reserved → Booked under `order_id`.
    pub fn book(
        &mut self,
        reservation: Reservation,
        order_id: &OrderId,
    ) -> Result<(), LedgerError> {
        if !self.is_held_by(reservation) {
            return Err(LedgerError::InvalidReservation(self.id));
        }
        self.status = SlotStatus::Booked;
        self.current_order_id = Some(order_id.clone());
        self.reserved_at = None;
        Ok(())
    }

    /// Reserved → Free, for the holder of `reservation`.
    pub fn release(&mut self, reservation: Reservation) -> Result<(), LedgerError> {
        if !self.is_held_by(reservation) {
            return Err(LedgerError::InvalidReservation(self.id));
        }
        self.free();
        Ok(())
    }

    /// Reserved → Free once the lease has run out, whoever holds it.
    pub fn expire(&mut self, cutoff: DateTime<Utc>) -> bool {
        if !self.is_expired(cutoff) {
            return false;
        }
        self.free();
        true
    }

    fn free(&mut self) {
        self.status = SlotStatus::Free;
        self.reserved_at = None;
    }
}

/// Number of slots in each state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotCounts {
    pub free: u64,
    pub reserved: u64,
    pub booked: u64,
}

impl SlotCounts {
    pub fn total(&self) -> u64 {
        self.free + self.reserved + self.booked
    }

    pub(crate) fn record(&mut self, status: SlotStatus) {
        match status {
            SlotStatus::Free => self.free += 1,
            SlotStatus::Reserved => self.reserved += 1,
            SlotStatus::Booked => self.booked += 1,
        }
    }
}

/// Advisory availability of a store item.
///
/// Reading this never locks anything; a concurrent reserve can exhaust the
/// item right after it is returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemAvailability {
    pub item_id: ItemId,
    pub name: String,
    pub free_slots: i64,
}
