//! Document store provisioning

use tracing::info;

use super::client::{ContainerProperties, ContainerRef, DocumentClient, EngineError};
use crate::error::{Operation, PersistenceError, Result};
use crate::model::{ID_FIELD, StorageBackend};

/// Partition key path of the order container, derived from the id field name
pub fn partition_key_path() -> String {
    format!("/{}", ID_FIELD)
}

fn validate_name(kind: &str, name: &str) -> Result<()> {
    let invalid = name.trim().is_empty()
        || name
            .chars()
            .any(|c| matches!(c, '/' | '\\' | '?' | '#') || c.is_control());
    if invalid {
        return Err(PersistenceError::configuration(format!(
            "invalid cosmos {} name '{}'",
            kind, name
        )));
    }
    Ok(())
}

fn provision_error(err: EngineError) -> PersistenceError {
    let status = err.status_code();
    PersistenceError::engine(StorageBackend::Document, Operation::Provision, status, err)
}

/// Create the database and the container when missing.
///
/// An existing container must be partitioned by the id path; anything else is
/// a configuration error since point reads would miss every item.
pub async fn ensure_container(
    client: &dyn DocumentClient,
    container: &ContainerRef,
) -> Result<ContainerProperties> {
    validate_name("database", &container.database)?;
    validate_name("container", &container.container)?;

    let created = client
        .create_database_if_not_exists(&container.database)
        .await
        .map_err(provision_error)?;
    if created {
        info!(database = %container.database, "Document database created");
    }

    let expected = partition_key_path();
    let properties = client
        .create_container_if_not_exists(
            &container.database,
            &ContainerProperties::new(container.container.clone(), expected.clone()),
        )
        .await
        .map_err(provision_error)?;

    if properties.partition_key.paths != [expected.as_str()] {
        return Err(PersistenceError::configuration(format!(
            "container '{}' is partitioned by {:?}, expected [\"{}\"]",
            container, properties.partition_key.paths, expected
        )));
    }

    info!(
        database = %container.database,
        container = %container.container,
        partition_key = %expected,
        "Document container provisioned"
    );
    Ok(properties)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::InMemoryDocumentClient;

    #[test]
    fn test_partition_key_path_follows_id_field() {
        assert_eq!(partition_key_path(), "/id");
    }

    #[tokio::test]
    async fn test_ensure_container_is_idempotent() {
        let client = InMemoryDocumentClient::new();
        let container = ContainerRef::new("ordersdb", "orders");

        let first = ensure_container(&client, &container).await.unwrap();
        let second = ensure_container(&client, &container).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.partition_key.paths, vec!["/id".to_string()]);
    }

    #[tokio::test]
    async fn test_wrong_partition_key_is_rejected() {
        let client = InMemoryDocumentClient::new();
        client.create_database_if_not_exists("ordersdb").await.unwrap();
        client
            .create_container_if_not_exists("ordersdb", &ContainerProperties::new("orders", "/customerId"))
            .await
            .unwrap();

        let err = ensure_container(&client, &ContainerRef::new("ordersdb", "orders"))
            .await
            .unwrap_err();
        assert!(matches!(err, PersistenceError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_invalid_names_are_rejected() {
        let client = InMemoryDocumentClient::new();
        for container in [
            ContainerRef::new("", "orders"),
            ContainerRef::new("ordersdb", " "),
            ContainerRef::new("orders/db", "orders"),
        ] {
            let err = ensure_container(&client, &container).await.unwrap_err();
            assert!(matches!(err, PersistenceError::Configuration(_)));
        }
    }
}
