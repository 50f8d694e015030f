//! Identifiers and HTTP contracts shared by every service in the workspace.

pub mod types;
pub mod wire;

pub use types::{ItemId, OrderId, Reservation, ResourceKind, SlotId};
