//! Orderstore Persistence - order storage contract and its backends
//!
//! This crate provides:
//! - The `Order` record model and the relational decimal policy
//! - The `PersistenceService` contract shared by every backend
//! - A relational backend (MySQL/PostgreSQL/SQLite via SeaORM)
//! - A document store backend (Azure Cosmos DB REST API, or an in-memory engine)
//! - Idempotent provisioning of tables and containers for both backends

pub mod document;
pub mod entity;
pub mod error;
pub mod model;
pub mod sql;
pub mod traits;

// Re-export sea-orm for convenience
pub use sea_orm;

// Re-export persistence traits
pub use traits::{OrderPersistence, PersistenceService};

// Re-export SQL backend
pub use sql::{PoolConfig, SqlOrderPersistService};

// Re-export document backend
pub use document::{
    ContainerRef, CosmosClient, CosmosClientConfig, DocumentClient, DocumentItemWriter,
    DocumentOrderPersistService, InMemoryDocumentClient,
};

// Re-export model and error types
pub use error::{Operation, PersistenceError, Result};
pub use model::{DecimalPrecision, ID_FIELD, Order, StorageBackend};
