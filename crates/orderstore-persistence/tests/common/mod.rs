//! Shared helpers for the persistence integration tests

use std::sync::Arc;

use orderstore_persistence::{
    ContainerRef, DocumentOrderPersistService, InMemoryDocumentClient, PersistenceService,
    PoolConfig, SqlOrderPersistService, StorageBackend,
};

/// Generate a unique id for test isolation
pub fn unique_test_id() -> String {
    format!("test_{}", uuid::Uuid::new_v4().simple())
}

/// Volatile SQLite backend
pub async fn relational_service() -> Arc<dyn PersistenceService> {
    let svc = SqlOrderPersistService::connect(
        "sqlite::memory:",
        &PoolConfig::in_memory(),
        StorageBackend::InMemoryRelational,
    )
    .await
    .expect("in-memory relational backend");
    Arc::new(svc)
}

/// Document backend over the in-memory engine, small pages so paging is exercised
pub async fn document_service() -> Arc<dyn PersistenceService> {
    let client = Arc::new(InMemoryDocumentClient::new().with_page_size(2));
    let svc = DocumentOrderPersistService::provision(client, ContainerRef::new("ordersdb", "orders"))
        .await
        .expect("in-memory document backend");
    Arc::new(svc)
}

/// Both backends, labelled for assertion messages
pub async fn all_services() -> Vec<(&'static str, Arc<dyn PersistenceService>)> {
    vec![
        ("relational", relational_service().await),
        ("document", document_service().await),
    ]
}
