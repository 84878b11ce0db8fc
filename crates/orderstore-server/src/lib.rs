//! Orderstore server
//!
//! Loads configuration, initializes logging, selects and provisions the order
//! storage backend, optionally seeds sample orders and keeps the storage
//! handles alive until shutdown.

pub mod model; // Configuration
pub mod startup; // Logging, storage, seeding and shutdown

pub use model::Configuration;
