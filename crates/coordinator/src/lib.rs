//! Order coordination across the store and delivery ledgers.
//!
//! An order is placed by walking six strictly ordered steps:
//! 1. Check item availability (advisory)
//! 2. Reserve an item slot
//! 3. Reserve a delivery agent slot
//! 4. Mint an order id
//! 5. Book the item slot
//! 6. Book the agent slot
//!
//! The first failing step aborts the order. Slots that were reserved but not
//! yet booked are released again, agent first.

pub mod coordination;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod services;
pub mod state;
pub mod steps;

pub use coordination::Coordination;
pub use coordinator::{OrderConfirmation, OrderCoordinator};
pub use error::{CoordinatorError, Result};
pub use events::CoordinationEvent;
pub use services::{
    DeliveryService, HttpDeliveryService, HttpStoreService, LedgerDeliveryService,
    LedgerStoreService, StoreService,
};
pub use state::CoordinationState;
pub use steps::Step;
