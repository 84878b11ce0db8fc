//! Volatile document engine
//!
//! Keeps containers in process memory with the same addressing rules as the
//! hosted engine: an item is identified by (partition key value, id) and the
//! partition key passed by the caller must match the value found in the item
//! at the container's partition key path.

use std::collections::BTreeMap;

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use serde_json::Value;

use super::client::{ContainerProperties, ContainerRef, DocumentClient, EngineError, QueryPage};
use crate::model::ID_FIELD;

const DEFAULT_PAGE_SIZE: usize = 100;

struct MemoryContainer {
    properties: ContainerProperties,
    items: BTreeMap<(String, String), Value>,
}

impl MemoryContainer {
    fn partition_path(&self) -> &str {
        self.properties
            .partition_key
            .paths
            .first()
            .map(String::as_str)
            .unwrap_or_default()
    }

    /// Validate an incoming item and return its storage key
    fn key_of(&self, partition_key: &str, item: &Value) -> Result<(String, String), EngineError> {
        let id = item
            .get(ID_FIELD)
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| EngineError::bad_request("The input content is missing the 'id' field"))?;

        let stored = item
            .pointer(self.partition_path())
            .map(partition_value)
            .unwrap_or_default();
        if stored != partition_key {
            return Err(EngineError::bad_request(format!(
                "Partition key provided '{}' does not match the value '{}' at '{}'",
                partition_key,
                stored,
                self.partition_path()
            )));
        }

        Ok((partition_key.to_string(), id.to_string()))
    }
}

fn partition_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Only `SELECT * FROM <alias>` is understood
fn is_select_all(query: &str) -> bool {
    let tokens: Vec<&str> = query.split_whitespace().collect();
    matches!(
        tokens.as_slice(),
        [select, "*", from, _alias]
            if select.eq_ignore_ascii_case("select") && from.eq_ignore_ascii_case("from")
    )
}

/// In-memory `DocumentClient`
pub struct InMemoryDocumentClient {
    databases: DashSet<String>,
    containers: DashMap<(String, String), MemoryContainer>,
    page_size: usize,
}

impl Default for InMemoryDocumentClient {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryDocumentClient {
    pub fn new() -> Self {
        Self {
            databases: DashSet::new(),
            containers: DashMap::new(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Limit query pages to `page_size` items
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    fn container_key(container: &ContainerRef) -> (String, String) {
        (container.database.clone(), container.container.clone())
    }

    fn missing_container(container: &ContainerRef) -> EngineError {
        EngineError::not_found(format!("Container '{}' does not exist", container))
    }
}

#[async_trait]
impl DocumentClient for InMemoryDocumentClient {
    async fn create_database_if_not_exists(&self, database: &str) -> Result<bool, EngineError> {
        Ok(self.databases.insert(database.to_string()))
    }

    async fn create_container_if_not_exists(
        &self,
        database: &str,
        properties: &ContainerProperties,
    ) -> Result<ContainerProperties, EngineError> {
        if !self.databases.contains(database) {
            return Err(EngineError::not_found(format!(
                "Database '{}' does not exist",
                database
            )));
        }

        let entry = self
            .containers
            .entry((database.to_string(), properties.id.clone()))
            .or_insert_with(|| MemoryContainer {
                properties: properties.clone(),
                items: BTreeMap::new(),
            });
        Ok(entry.properties.clone())
    }

    async fn read_container(&self, container: &ContainerRef) -> Result<ContainerProperties, EngineError> {
        self.containers
            .get(&Self::container_key(container))
            .map(|c| c.properties.clone())
            .ok_or_else(|| Self::missing_container(container))
    }

    async fn create_item(
        &self,
        container: &ContainerRef,
        partition_key: &str,
        item: &Value,
    ) -> Result<Value, EngineError> {
        let mut entry = self
            .containers
            .get_mut(&Self::container_key(container))
            .ok_or_else(|| Self::missing_container(container))?;

        let key = entry.key_of(partition_key, item)?;
        if entry.items.contains_key(&key) {
            return Err(EngineError::conflict(format!(
                "Entity with the specified id '{}' already exists",
                key.1
            )));
        }
        entry.items.insert(key, item.clone());
        Ok(item.clone())
    }

    async fn read_item(
        &self,
        container: &ContainerRef,
        id: &str,
        partition_key: &str,
    ) -> Result<Value, EngineError> {
        let entry = self
            .containers
            .get(&Self::container_key(container))
            .ok_or_else(|| Self::missing_container(container))?;

        entry
            .items
            .get(&(partition_key.to_string(), id.to_string()))
            .cloned()
            .ok_or_else(|| EngineError::not_found("Entity with the specified id does not exist"))
    }

    async fn upsert_item(
        &self,
        container: &ContainerRef,
        partition_key: &str,
        item: &Value,
    ) -> Result<Value, EngineError> {
        let mut entry = self
            .containers
            .get_mut(&Self::container_key(container))
            .ok_or_else(|| Self::missing_container(container))?;

        let key = entry.key_of(partition_key, item)?;
        entry.items.insert(key, item.clone());
        Ok(item.clone())
    }

    async fn delete_item(
        &self,
        container: &ContainerRef,
        id: &str,
        partition_key: &str,
    ) -> Result<(), EngineError> {
        let mut entry = self
            .containers
            .get_mut(&Self::container_key(container))
            .ok_or_else(|| Self::missing_container(container))?;

        entry
            .items
            .remove(&(partition_key.to_string(), id.to_string()))
            .map(|_| ())
            .ok_or_else(|| EngineError::not_found("Entity with the specified id does not exist"))
    }

    async fn query_items(
        &self,
        container: &ContainerRef,
        query: &str,
        continuation: Option<&str>,
    ) -> Result<QueryPage, EngineError> {
        if !is_select_all(query) {
            return Err(EngineError::bad_request(format!(
                "Unsupported query '{}'",
                query
            )));
        }

        let offset = match continuation {
            Some(token) => token.parse::<usize>().map_err(|_| {
                EngineError::bad_request(format!("Invalid continuation token '{}'", token))
            })?,
            None => 0,
        };

        let entry = self
            .containers
            .get(&Self::container_key(container))
            .ok_or_else(|| Self::missing_container(container))?;

        let items: Vec<Value> = entry
            .items
            .values()
            .skip(offset)
            .take(self.page_size)
            .cloned()
            .collect();
        let next = offset + items.len();
        let continuation = (next < entry.items.len()).then(|| next.to_string());

        Ok(QueryPage {
            items,
            continuation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn create_client(page_size: usize) -> (InMemoryDocumentClient, ContainerRef) {
        let client = InMemoryDocumentClient::new().with_page_size(page_size);
        client.create_database_if_not_exists("db").await.unwrap();
        client
            .create_container_if_not_exists("db", &ContainerProperties::new("orders", "/id"))
            .await
            .unwrap();
        (client, ContainerRef::new("db", "orders"))
    }

    #[tokio::test]
    async fn test_create_is_idempotent_and_keeps_first_definition() {
        let client = InMemoryDocumentClient::new();
        assert!(client.create_database_if_not_exists("db").await.unwrap());
        assert!(!client.create_database_if_not_exists("db").await.unwrap());

        client
            .create_container_if_not_exists("db", &ContainerProperties::new("orders", "/pk"))
            .await
            .unwrap();
        let props = client
            .create_container_if_not_exists("db", &ContainerProperties::new("orders", "/id"))
            .await
            .unwrap();
        assert_eq!(props.partition_key.paths, vec!["/pk".to_string()]);

        let err = client
            .create_container_if_not_exists("missing", &ContainerProperties::new("orders", "/id"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_partition_key_must_match_item() {
        let (client, container) = create_client(10).await;

        let err = client
            .create_item(&container, "other", &json!({ "id": "a" }))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), Some(400));

        let err = client
            .create_item(&container, "a", &json!({ "name": "no id" }))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), Some(400));

        client
            .create_item(&container, "a", &json!({ "id": "a" }))
            .await
            .unwrap();
        let err = client
            .create_item(&container, "a", &json!({ "id": "a" }))
            .await
            .unwrap_err();
        assert!(err.is_conflict());

        // same id under another partition value is a different item
        let err = client.read_item(&container, "a", "b").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_delete_and_missing_container() {
        let (client, container) = create_client(10).await;
        client
            .upsert_item(&container, "a", &json!({ "id": "a", "v": 1 }))
            .await
            .unwrap();
        client.delete_item(&container, "a", "a").await.unwrap();
        assert!(client.delete_item(&container, "a", "a").await.unwrap_err().is_not_found());

        let missing = ContainerRef::new("db", "nope");
        assert!(client.read_container(&missing).await.unwrap_err().is_not_found());
        assert!(client.read_item(&missing, "a", "a").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_query_pages() {
        let (client, container) = create_client(2).await;
        for id in ["a", "b", "c", "d", "e"] {
            client
                .create_item(&container, id, &json!({ "id": id }))
                .await
                .unwrap();
        }

        let mut ids = Vec::new();
        let mut continuation: Option<String> = None;
        let mut pages = 0;
        loop {
            let page = client
                .query_items(&container, "SELECT * FROM c", continuation.as_deref())
                .await
                .unwrap();
            pages += 1;
            ids.extend(page.items.iter().map(|v| v["id"].as_str().unwrap().to_string()));
            continuation = page.continuation;
            if continuation.is_none() {
                break;
            }
        }
        assert_eq!(pages, 3);
        assert_eq!(ids, vec!["a", "b", "c", "d", "e"]);

        let err = client
            .query_items(&container, "SELECT c.id FROM c", None)
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), Some(400));
    }
}
