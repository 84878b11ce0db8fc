//! Document store persistence backend
//!
//! Orders are stored as JSON documents whose `id` is also the partition key
//! value, so every point operation addresses exactly one logical partition.

pub mod client;
pub mod cosmos;
pub mod memory;
pub mod provision;
pub mod seed;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, error};

pub use client::{ContainerProperties, ContainerRef, DocumentClient, EngineError, QueryPage};
pub use cosmos::{CosmosClient, CosmosClientConfig};
pub use memory::InMemoryDocumentClient;
pub use seed::DocumentItemWriter;

use crate::error::{Operation, PersistenceError, Result};
use crate::model::{Order, StorageBackend};
use crate::traits::{OrderPersistence, PersistenceService};

const SELECT_ALL: &str = "SELECT * FROM c";

/// Document persistence service
///
/// Composed of a shared engine client and the container it provisioned.
pub struct DocumentOrderPersistService {
    client: Arc<dyn DocumentClient>,
    container: ContainerRef,
}

impl DocumentOrderPersistService {
    /// Provision the database and container, then build the service.
    pub async fn provision(client: Arc<dyn DocumentClient>, container: ContainerRef) -> Result<Self> {
        provision::ensure_container(client.as_ref(), &container).await?;
        Ok(Self { client, container })
    }

    pub fn container(&self) -> &ContainerRef {
        &self.container
    }

    /// Shared engine client, e.g. for a [`DocumentItemWriter`]
    pub fn client(&self) -> Arc<dyn DocumentClient> {
        self.client.clone()
    }

    fn engine_error(&self, operation: Operation, id: Option<&str>, err: EngineError) -> PersistenceError {
        let status = err.status_code();
        error!(
            backend = %StorageBackend::Document,
            operation = %operation,
            status = status,
            order_id = id.unwrap_or_default(),
            container = %self.container,
            error = %err,
            "Document engine failure"
        );
        PersistenceError::engine(StorageBackend::Document, operation, status, err)
    }

    fn to_document(&self, operation: Operation, order: &Order) -> Result<Value> {
        serde_json::to_value(order).map_err(|e| {
            PersistenceError::engine(StorageBackend::Document, operation, None, e)
        })
    }

    fn from_document(&self, operation: Operation, value: Value) -> Result<Order> {
        serde_json::from_value(value).map_err(|e| {
            error!(
                backend = %StorageBackend::Document,
                operation = %operation,
                error = %e,
                "Stored document is not an order"
            );
            PersistenceError::engine(StorageBackend::Document, operation, None, e)
        })
    }
}

// ============================================================================
// PersistenceService implementation
// ============================================================================

#[async_trait]
impl PersistenceService for DocumentOrderPersistService {
    fn storage_backend(&self) -> StorageBackend {
        StorageBackend::Document
    }

    async fn health_check(&self) -> Result<()> {
        self.client
            .read_container(&self.container)
            .await
            .map(|_| ())
            .map_err(|e| self.engine_error(Operation::HealthCheck, None, e))
    }
}

// ============================================================================
// OrderPersistence implementation
// ============================================================================

#[async_trait]
impl OrderPersistence for DocumentOrderPersistService {
    async fn order_add(&self, order: Order) -> Result<Order> {
        let op = Operation::Add;
        let document = self.to_document(op, &order)?;

        match self
            .client
            .create_item(&self.container, order.id(), &document)
            .await
        {
            Ok(_) => {
                debug!(order_id = %order.id(), "Order document created");
                Ok(order)
            }
            Err(e) if e.is_conflict() => {
                debug!(order_id = %order.id(), "Order already exists");
                Err(PersistenceError::DuplicateKey {
                    id: order.id().to_string(),
                })
            }
            Err(e) => Err(self.engine_error(op, Some(order.id()), e)),
        }
    }

    async fn order_get_by_id(&self, id: &str) -> Result<Option<Order>> {
        let op = Operation::GetById;
        // an empty id would address the container's document feed
        if id.trim().is_empty() {
            return Ok(None);
        }
        match self.client.read_item(&self.container, id, id).await {
            Ok(value) => self.from_document(op, value).map(Some),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(self.engine_error(op, Some(id), e)),
        }
    }

    async fn order_find_all(&self) -> Result<Vec<Order>> {
        let op = Operation::GetAll;
        let mut orders = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let page = self
                .client
                .query_items(&self.container, SELECT_ALL, continuation.as_deref())
                .await
                .map_err(|e| self.engine_error(op, None, e))?;

            for value in page.items {
                orders.push(self.from_document(op, value)?);
            }

            match page.continuation {
                Some(token) => continuation = Some(token),
                None => break,
            }
        }

        debug!(count = orders.len(), "Order documents loaded");
        Ok(orders)
    }

    async fn order_update(&self, order: &Order) -> Result<bool> {
        let op = Operation::Update;
        let document = self.to_document(op, order)?;

        self.client
            .upsert_item(&self.container, order.id(), &document)
            .await
            .map_err(|e| self.engine_error(op, Some(order.id()), e))?;

        debug!(order_id = %order.id(), "Order document upserted");
        Ok(true)
    }

    async fn order_delete(&self, order: &Order) -> Result<bool> {
        let op = Operation::Delete;
        match self
            .client
            .delete_item(&self.container, order.id(), order.id())
            .await
        {
            Ok(()) => {
                debug!(order_id = %order.id(), "Order document deleted");
                Ok(true)
            }
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(self.engine_error(op, Some(order.id()), e)),
        }
    }
}
