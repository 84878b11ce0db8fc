//! Application startup: logging, storage backend, seeding and shutdown

mod logging;
mod seed;
mod shutdown;
mod storage;

pub use logging::{LogRotation, LoggingConfig, LoggingGuard, init_logging};
pub use seed::{document_seed_order, relational_seed_orders, seed_orders};
pub use shutdown::{ShutdownSignal, listen_for_shutdown_signal, run_with_timeout, wait_for_shutdown};
pub use storage::Storage;
