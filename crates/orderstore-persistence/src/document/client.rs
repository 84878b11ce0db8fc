//! Document engine abstraction
//!
//! A `DocumentClient` speaks to a document store that addresses every item by
//! (id, partition key value). Responses keep the engine's HTTP status so
//! callers can translate not-found and conflict outcomes.

use async_trait::async_trait;
use http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Database and container an adapter works against
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContainerRef {
    pub database: String,
    pub container: String,
}

impl ContainerRef {
    pub fn new(database: impl Into<String>, container: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            container: container.into(),
        }
    }
}

impl std::fmt::Display for ContainerRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.database, self.container)
    }
}

/// Partition key declaration of a container
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionKeyDefinition {
    pub paths: Vec<String>,
    #[serde(default = "default_partition_kind")]
    pub kind: String,
}

fn default_partition_kind() -> String {
    "Hash".to_string()
}

/// Container properties as exchanged with the engine
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerProperties {
    pub id: String,
    pub partition_key: PartitionKeyDefinition,
}

impl ContainerProperties {
    pub fn new(id: impl Into<String>, partition_key_path: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            partition_key: PartitionKeyDefinition {
                paths: vec![partition_key_path.into()],
                kind: default_partition_kind(),
            },
        }
    }
}

/// One page of query results
#[derive(Clone, Debug, Default)]
pub struct QueryPage {
    pub items: Vec<Value>,
    /// Token for the next page, `None` on the last page
    pub continuation: Option<String>,
}

/// Failure reported by a document engine
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub struct EngineError {
    /// HTTP status of the engine response, `None` when no response was received
    pub status: Option<StatusCode>,
    pub message: String,
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} - {}", status, self.message),
            None => write!(f, "transport error - {}", self.message),
        }
    }
}

impl EngineError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn is_not_found(&self) -> bool {
        self.status == Some(StatusCode::NOT_FOUND)
    }

    pub fn is_conflict(&self) -> bool {
        self.status == Some(StatusCode::CONFLICT)
    }

    /// Numeric status for logs and `PersistenceError::Engine`
    pub fn status_code(&self) -> Option<u16> {
        self.status.map(|s| s.as_u16())
    }
}

/// Document store engine operations
#[async_trait]
pub trait DocumentClient: Send + Sync {
    /// Create a database, returns `false` when it already existed
    async fn create_database_if_not_exists(&self, database: &str) -> Result<bool, EngineError>;

    /// Create a container, returns the effective properties (the stored ones
    /// when the container already existed)
    async fn create_container_if_not_exists(
        &self,
        database: &str,
        properties: &ContainerProperties,
    ) -> Result<ContainerProperties, EngineError>;

    /// Read the properties of an existing container
    async fn read_container(&self, container: &ContainerRef)
    -> Result<ContainerProperties, EngineError>;

    /// Create an item, conflict when (id, partition key) is taken
    async fn create_item(
        &self,
        container: &ContainerRef,
        partition_key: &str,
        item: &Value,
    ) -> Result<Value, EngineError>;

    /// Point read by id and partition key
    async fn read_item(
        &self,
        container: &ContainerRef,
        id: &str,
        partition_key: &str,
    ) -> Result<Value, EngineError>;

    /// Insert or replace an item
    async fn upsert_item(
        &self,
        container: &ContainerRef,
        partition_key: &str,
        item: &Value,
    ) -> Result<Value, EngineError>;

    /// Delete an item by id and partition key
    async fn delete_item(
        &self,
        container: &ContainerRef,
        id: &str,
        partition_key: &str,
    ) -> Result<(), EngineError>;

    /// Run a query and return one page of results
    async fn query_items(
        &self,
        container: &ContainerRef,
        query: &str,
        continuation: Option<&str>,
    ) -> Result<QueryPage, EngineError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_error_classification() {
        assert!(EngineError::not_found("missing").is_not_found());
        assert!(EngineError::conflict("taken").is_conflict());
        assert_eq!(EngineError::conflict("taken").status_code(), Some(409));

        let transport = EngineError::transport("connection reset");
        assert!(!transport.is_not_found());
        assert_eq!(transport.status_code(), None);
        assert_eq!(transport.to_string(), "transport error - connection reset");
        assert_eq!(
            EngineError::not_found("gone").to_string(),
            "404 Not Found - gone"
        );
    }

    #[test]
    fn test_container_properties_json() {
        let props = ContainerProperties::new("orders", "/id");
        let json = serde_json::to_value(&props).unwrap();
        assert_eq!(json["id"], "orders");
        assert_eq!(json["partitionKey"]["paths"][0], "/id");
        assert_eq!(json["partitionKey"]["kind"], "Hash");

        let parsed: ContainerProperties = serde_json::from_str(
            r#"{"id":"orders","partitionKey":{"paths":["/id"]},"_rid":"abc"}"#,
        )
        .unwrap();
        assert_eq!(parsed, props);
    }
}
