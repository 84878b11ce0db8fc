//! Generic item writer for the document store
//!
//! Used by provisioning and seeding helpers that write arbitrary record
//! shapes. The partition key value is whatever the payload carries in its
//! `id` field.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, error};

use super::client::{ContainerRef, DocumentClient};
use crate::error::{Operation, PersistenceError, Result};
use crate::model::{ID_FIELD, StorageBackend};

/// Find a top-level field named `id` (any case) and return its value as a
/// partition key.
///
/// Strings are used as is; numbers and booleans by their text form. A
/// non-object payload, a missing field or a null/empty id is a configuration
/// error.
pub fn partition_key_of(item: &Value) -> Result<String> {
    let object = item.as_object().ok_or_else(|| {
        PersistenceError::configuration("document payload must be a JSON object with an 'id' field")
    })?;

    let (_, value) = find_id_field(object).ok_or_else(|| {
        PersistenceError::configuration(format!(
            "document payload has no field named '{}'; available fields: [{}]",
            ID_FIELD,
            object.keys().cloned().collect::<Vec<_>>().join(", ")
        ))
    })?;

    let key = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => {
            return Err(PersistenceError::configuration(format!(
                "document field '{}' is null",
                ID_FIELD
            )));
        }
        other => {
            return Err(PersistenceError::configuration(format!(
                "document field '{}' must be a scalar, found {}",
                ID_FIELD, other
            )));
        }
    };

    if key.is_empty() {
        return Err(PersistenceError::configuration(format!(
            "document field '{}' is empty",
            ID_FIELD
        )));
    }
    Ok(key)
}

fn find_id_field(object: &Map<String, Value>) -> Option<(&String, &Value)> {
    object
        .get_key_value(ID_FIELD)
        .or_else(|| object.iter().find(|(k, _)| k.eq_ignore_ascii_case(ID_FIELD)))
}

/// Writes arbitrary serializable values into a container
pub struct DocumentItemWriter {
    client: Arc<dyn DocumentClient>,
    container: ContainerRef,
}

impl DocumentItemWriter {
    pub fn new(client: Arc<dyn DocumentClient>, container: ContainerRef) -> Self {
        Self { client, container }
    }

    /// Create `item` using its `id` field as the partition key.
    ///
    /// The stored document always carries the key as a string `id`, the path
    /// the container is partitioned by. A field spelled with different case
    /// (`Id`, `ID`) is renamed to `id`.
    pub async fn add_item<T>(&self, item: &T) -> Result<Value>
    where
        T: Serialize + ?Sized + Sync,
    {
        let mut value = serde_json::to_value(item).map_err(|e| {
            PersistenceError::configuration(format!("document payload is not serializable: {}", e))
        })?;
        let partition_key = partition_key_of(&value)?;

        if let Some(object) = value.as_object_mut() {
            if !object.contains_key(ID_FIELD)
                && let Some(spelling) = find_id_field(object).map(|(k, _)| k.clone())
            {
                object.remove(&spelling);
            }
            object.insert(ID_FIELD.to_string(), Value::String(partition_key.clone()));
        }

        match self
            .client
            .create_item(&self.container, &partition_key, &value)
            .await
        {
            Ok(created) => {
                debug!(partition_key = %partition_key, container = %self.container, "Item created");
                Ok(created)
            }
            Err(e) if e.is_conflict() => Err(PersistenceError::DuplicateKey { id: partition_key }),
            Err(e) => {
                error!(
                    backend = %StorageBackend::Document,
                    operation = %Operation::Add,
                    status = e.status_code(),
                    partition_key = %partition_key,
                    error = %e,
                    "Document engine failure"
                );
                let status = e.status_code();
                Err(PersistenceError::engine(
                    StorageBackend::Document,
                    Operation::Add,
                    status,
                    e,
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{InMemoryDocumentClient, provision::ensure_container};
    use serde_json::json;

    #[derive(Serialize)]
    struct Product {
        #[serde(rename = "ID")]
        code: u32,
        name: String,
    }

    #[derive(Serialize)]
    struct Anonymous {
        name: String,
    }

    #[test]
    fn test_partition_key_of() {
        assert_eq!(partition_key_of(&json!({ "id": "a" })).unwrap(), "a");
        assert_eq!(partition_key_of(&json!({ "Id": "b" })).unwrap(), "b");
        assert_eq!(partition_key_of(&json!({ "ID": 42 })).unwrap(), "42");
        assert_eq!(partition_key_of(&json!({ "iD": true })).unwrap(), "true");
        // exact match wins over other spellings
        assert_eq!(
            partition_key_of(&json!({ "ID": "upper", "id": "lower" })).unwrap(),
            "lower"
        );

        for bad in [
            json!({ "name": "x" }),
            json!({ "id": null }),
            json!({ "id": "" }),
            json!({ "id": { "nested": 1 } }),
            json!(["id"]),
            json!("id"),
            json!({ "identifier": "x" }),
        ] {
            let err = partition_key_of(&bad).unwrap_err();
            assert!(
                matches!(err, PersistenceError::Configuration(_)),
                "expected configuration error for {}",
                bad
            );
        }
    }

    #[tokio::test]
    async fn test_add_item_any_shape() {
        let client: Arc<dyn DocumentClient> = Arc::new(InMemoryDocumentClient::new());
        let container = ContainerRef::new("db", "items");
        ensure_container(client.as_ref(), &container).await.unwrap();
        let writer = DocumentItemWriter::new(client.clone(), container.clone());

        let created = writer
            .add_item(&Product {
                code: 7,
                name: "Widget".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(created["id"], "7");
        assert!(created.get("ID").is_none());

        let stored = client.read_item(&container, "7", "7").await.unwrap();
        assert_eq!(stored["name"], "Widget");

        let err = writer
            .add_item(&Product {
                code: 7,
                name: "Again".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, PersistenceError::DuplicateKey { ref id } if id == "7"));

        let err = writer
            .add_item(&Anonymous {
                name: "nameless".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, PersistenceError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_add_item_with_scalar_id() {
        let client: Arc<dyn DocumentClient> = Arc::new(InMemoryDocumentClient::new());
        let container = ContainerRef::new("db", "items");
        ensure_container(client.as_ref(), &container).await.unwrap();
        let writer = DocumentItemWriter::new(client.clone(), container.clone());

        let created = writer.add_item(&json!({ "id": 42, "name": "x" })).await.unwrap();
        assert_eq!(created["id"], "42");
        assert_eq!(created["name"], "x");

        let created = writer.add_item(&json!({ "Id": true })).await.unwrap();
        assert_eq!(created, json!({ "id": "true" }));

        let stored = client.read_item(&container, "42", "42").await.unwrap();
        assert_eq!(stored["name"], "x");
    }
}
