//! Storage backend selection and lifetime
//!
//! Exactly one backend is built per process. Provisioning completes before the
//! service is handed out, and `Storage::shutdown` releases the engine handles.

use std::sync::Arc;

use orderstore_persistence::{
    ContainerRef, CosmosClient, DocumentClient, DocumentItemWriter, DocumentOrderPersistService,
    PersistenceService, Result, SqlOrderPersistService, StorageBackend,
};
use tracing::info;

use crate::model::Configuration;

enum Engine {
    Relational(Arc<SqlOrderPersistService>),
    Document {
        client: Arc<dyn DocumentClient>,
        container: ContainerRef,
    },
}

/// Owns the engine handles behind the selected persistence service
pub struct Storage {
    engine: Engine,
    service: Arc<dyn PersistenceService>,
}

impl Storage {
    /// Build the backend selected by configuration
    pub async fn from_configuration(configuration: &Configuration) -> Result<Self> {
        let backend = configuration.storage_backend()?;
        info!(backend = %backend, "Storage backend selected");

        match backend {
            StorageBackend::Document => {
                let client = CosmosClient::new(configuration.cosmos_client_config()?)?;
                Self::document(Arc::new(client), configuration.cosmos_container()).await
            }
            StorageBackend::Relational | StorageBackend::InMemoryRelational => {
                let url = configuration.database_url(backend)?;
                let pool = configuration.pool_config(backend);
                let svc = SqlOrderPersistService::connect(&url, &pool, backend).await?;
                Ok(Self::relational(svc))
            }
        }
    }

    pub fn relational(svc: SqlOrderPersistService) -> Self {
        let svc = Arc::new(svc);
        Self {
            service: svc.clone(),
            engine: Engine::Relational(svc),
        }
    }

    /// Provision `container` through `client` and build the document backend
    pub async fn document(client: Arc<dyn DocumentClient>, container: ContainerRef) -> Result<Self> {
        let svc = DocumentOrderPersistService::provision(client.clone(), container.clone()).await?;
        Ok(Self {
            service: Arc::new(svc),
            engine: Engine::Document { client, container },
        })
    }

    /// The order persistence contract
    pub fn service(&self) -> Arc<dyn PersistenceService> {
        self.service.clone()
    }

    pub fn backend(&self) -> StorageBackend {
        self.service.storage_backend()
    }

    /// Generic item writer, only available on the document backend
    pub fn item_writer(&self) -> Option<DocumentItemWriter> {
        match &self.engine {
            Engine::Document { client, container } => {
                Some(DocumentItemWriter::new(client.clone(), container.clone()))
            }
            Engine::Relational(_) => None,
        }
    }

    /// Release the engine handles.
    ///
    /// The relational pool is closed once no other clone of the service is alive;
    /// otherwise it closes when the last clone drops.
    pub async fn shutdown(self) -> Result<()> {
        let Storage { engine, service } = self;
        drop(service);

        match engine {
            Engine::Relational(svc) => match Arc::try_unwrap(svc) {
                Ok(svc) => {
                    svc.close().await?;
                    info!("Relational connection pool closed");
                }
                Err(_) => {
                    info!("Relational service still shared, pool closes with the last handle");
                }
            },
            Engine::Document { container, .. } => {
                info!(container = %container, "Document client released");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::Config;
    use orderstore_persistence::{InMemoryDocumentClient, Order, PersistenceError};
    use rust_decimal_macros::dec;

    fn configuration(overrides: &[(&str, &str)]) -> Configuration {
        let mut builder = Config::builder();
        for (key, value) in overrides {
            builder = builder.set_override(*key, *value).unwrap();
        }
        Configuration {
            config: builder.build().unwrap(),
        }
    }

    #[tokio::test]
    async fn test_in_memory_relational_from_configuration() {
        let storage = Storage::from_configuration(&configuration(&[("useinmemorydb", "true")]))
            .await
            .unwrap();
        assert_eq!(storage.backend(), StorageBackend::InMemoryRelational);
        assert!(storage.item_writer().is_none());

        let svc = storage.service();
        let order = svc.order_add(Order::new("Shoes", 2, dec!(35.50))).await.unwrap();
        assert!(svc.order_get_by_id(order.id()).await.unwrap().is_some());
        drop(svc);

        storage.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_conflicting_switches_fail() {
        let result = Storage::from_configuration(&configuration(&[
            ("usecosmos", "true"),
            ("useinmemorydb", "true"),
        ]))
        .await;
        assert!(matches!(result, Err(PersistenceError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_missing_settings_fail_before_connecting() {
        let result = Storage::from_configuration(&configuration(&[])).await;
        assert!(matches!(result, Err(PersistenceError::Configuration(_))));

        let result = Storage::from_configuration(&configuration(&[("usecosmos", "true")])).await;
        assert!(matches!(result, Err(PersistenceError::Configuration(_))));

        let result = Storage::from_configuration(&configuration(&[
            ("usecosmos", "true"),
            ("cosmosdb.account", "https://acct.documents.azure.com:443/"),
            ("cosmosdb.key", "not base64!"),
        ]))
        .await;
        assert!(matches!(result, Err(PersistenceError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_document_storage() {
        let client = Arc::new(InMemoryDocumentClient::new());
        let storage = Storage::document(client, ContainerRef::new("OrderDb", "Orders"))
            .await
            .unwrap();
        assert_eq!(storage.backend(), StorageBackend::Document);
        assert!(storage.item_writer().is_some());
        storage.service().health_check().await.unwrap();
        storage.shutdown().await.unwrap();
    }
}
