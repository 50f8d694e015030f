//! Resource ledgers: exclusive allocation of reservation slots.
//!
//! Each ledger owns the slot pool of one resource type. A slot moves
//! `Free → Reserved → Booked`; reserved slots can also be released or
//! expire back to `Free`. Every transition runs in one local transaction
//! holding an exclusive lock on the slot's row, which is the only place
//! double allocation is prevented.

pub mod error;
pub mod ledger;
pub mod memory;
pub mod postgres;
pub mod slot;
pub mod sweeper;

pub use common::{ItemId, OrderId, Reservation, ResourceKind, SlotId};
pub use error::{LedgerError, Result};
pub use ledger::{Ledger, LedgerExt};
pub use memory::InMemoryLedger;
pub use postgres::PostgresLedger;
pub use slot::{ItemAvailability, ReservationSlot, SlotCounts, SlotStatus};
pub use sweeper::ReservationSweeper;
