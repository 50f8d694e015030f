//! Store and delivery collaborators used by the coordinator.
//!
//! Each collaborator has an HTTP client for talking to the remote service
//! and a ledger-backed adapter for running everything in one process.

pub mod delivery;
mod http;
pub mod store;

pub use delivery::{DeliveryService, HttpDeliveryService, LedgerDeliveryService};
pub use store::{HttpStoreService, LedgerStoreService, StoreService};
