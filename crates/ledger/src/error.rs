use common::{ItemId, ResourceKind, SlotId};
use thiserror::Error;

/// Errors that can occur when allocating or booking reservation slots.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// No free slot matched the reserve request.
    #[error("no more reservations can be made on {resource}{}", item_suffix(.item_id))]
    NoAvailability {
        resource: ResourceKind,
        item_id: Option<ItemId>,
    },

    /// The slot is unknown, not reserved, already booked, or reserved under
    /// a newer lease than the one presented.
    #[error("slot {0} does not hold an active reservation")]
    InvalidReservation(SlotId),

    /// The referenced store item does not exist.
    #[error("item not found: {0}")]
    ItemNotFound(ItemId),

    /// The resource type has no units to select from.
    #[error("{0} slots cannot be selected by item")]
    UnsupportedSelector(ResourceKind),

    /// The row was locked but writing the new state failed; nothing changed.
    #[error("persistence failure: {0}")]
    Persistence(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl LedgerError {
    /// Returns true for failures of the storage layer rather than the protocol.
    pub fn is_persistence_failure(&self) -> bool {
        matches!(
            self,
            LedgerError::Persistence(_) | LedgerError::Database(_) | LedgerError::Migration(_)
        )
    }
}

fn item_suffix(item_id: &Option<ItemId>) -> String {
    item_id
        .map(|id| format!(" for item {id}"))
        .unwrap_or_default()
}

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;
