//! Persistence traits for the unified storage abstraction layer
//!
//! This module defines the storage contract that abstracts over the two
//! backends: a relational database (SeaORM) and a document store addressed by
//! partition key (Azure Cosmos DB).

pub mod order;

pub use order::OrderPersistence;

use async_trait::async_trait;

use crate::error::Result;
use crate::model::StorageBackend;

/// Unified persistence service trait
///
/// This is the seam the rest of the application depends on. The backend is
/// chosen once at startup; callers only ever see `Arc<dyn PersistenceService>`.
#[async_trait]
pub trait PersistenceService: OrderPersistence + Send + Sync {
    /// Get the backend serving this service
    fn storage_backend(&self) -> StorageBackend;

    /// Health check for the storage backend
    async fn health_check(&self) -> Result<()>;
}
