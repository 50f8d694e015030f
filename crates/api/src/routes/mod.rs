pub mod delivery;
pub mod ops;
pub mod orders;
pub mod store;
