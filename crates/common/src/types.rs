use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a reservation slot inside one resource ledger.
///
/// Slot ids are only unique per resource type: store slot `3` and delivery
/// agent slot `3` are unrelated rows owned by different services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlotId(i64);

impl SlotId {
    /// Wraps a raw slot id.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw id.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for SlotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for SlotId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// A granted reservation: one slot and the lease it was granted under.
///
/// A slot's lease grows every time the slot is reserved. Book and release
/// must present the current lease, so a holder whose reservation expired and
/// was handed to another caller can no longer touch the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reservation {
    pub slot_id: SlotId,
    pub lease: i64,
}

impl Reservation {
    pub fn new(slot_id: SlotId, lease: i64) -> Self {
        Self { slot_id, lease }
    }
}

impl std::fmt::Display for Reservation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.slot_id, self.lease)
    }
}

/// Identifier of a store item (the resource unit slots are provisioned for).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(i64);

impl ItemId {
    /// Wraps a raw item id.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw id.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ItemId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Opaque order identifier stamped onto booked slots.
///
/// The coordinator mints these as UUID strings, but ledgers accept any
/// caller-supplied string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(String);

impl OrderId {
    /// Mints a fresh random order id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OrderId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for OrderId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// The two resource types that own slot pools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Store items; slots are owned by an item.
    StoreItem,
    /// Delivery agents; fungible, slots have no owner.
    DeliveryAgent,
}

impl ResourceKind {
    /// Returns true if slots of this kind belong to a resource unit.
    pub fn has_units(&self) -> bool {
        matches!(self, ResourceKind::StoreItem)
    }

    /// Returns the kind name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::StoreItem => "store_item",
            ResourceKind::DeliveryAgent => "delivery_agent",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
