//! Azure Cosmos DB client over the SQL REST API
//!
//! Requests are signed with the account master key (HMAC-SHA256) and carry the
//! partition key as a JSON array header.

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use hmac::{Hmac, Mac};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{Value, json};
use sha2::Sha256;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::client::{ContainerProperties, ContainerRef, DocumentClient, EngineError, QueryPage};
use crate::error::{PersistenceError, Result};

type HmacSha256 = Hmac<Sha256>;

const API_VERSION: &str = "2018-12-31";

const HEADER_AUTHORIZATION: &str = "authorization";
const HEADER_DATE: &str = "x-ms-date";
const HEADER_VERSION: &str = "x-ms-version";
const HEADER_PARTITION_KEY: &str = "x-ms-documentdb-partitionkey";
const HEADER_IS_UPSERT: &str = "x-ms-documentdb-is-upsert";
const HEADER_IS_QUERY: &str = "x-ms-documentdb-isquery";
const HEADER_CROSS_PARTITION: &str = "x-ms-documentdb-query-enablecrosspartition";
const HEADER_CONTINUATION: &str = "x-ms-continuation";
const CONTENT_TYPE_QUERY: &str = "application/query+json";

/// Configuration for the Cosmos DB client
#[derive(Clone, Debug)]
pub struct CosmosClientConfig {
    /// Account endpoint, e.g. `https://myaccount.documents.azure.com:443/`
    pub account: String,
    /// Base64 encoded master key
    pub key: String,
    /// Connection timeout in milliseconds
    pub connect_timeout_ms: u64,
    /// Per request timeout in milliseconds
    pub request_timeout_ms: u64,
}

impl Default for CosmosClientConfig {
    fn default() -> Self {
        Self {
            account: String::new(),
            key: String::new(),
            connect_timeout_ms: 5000,
            request_timeout_ms: 30000,
        }
    }
}

impl CosmosClientConfig {
    pub fn new(account: &str, key: &str) -> Self {
        Self {
            account: account.to_string(),
            key: key.to_string(),
            ..Default::default()
        }
    }

    /// Set timeouts
    pub fn with_timeouts(mut self, connect_ms: u64, request_ms: u64) -> Self {
        self.connect_timeout_ms = connect_ms;
        self.request_timeout_ms = request_ms;
        self
    }
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(rename = "Documents", default)]
    documents: Vec<Value>,
}

/// Cosmos DB SQL API client
pub struct CosmosClient {
    endpoint: Url,
    key: Vec<u8>,
    http_client: Client,
}

impl CosmosClient {
    pub fn new(config: CosmosClientConfig) -> Result<Self> {
        if config.account.trim().is_empty() {
            return Err(PersistenceError::configuration(
                "cosmos account endpoint is not configured",
            ));
        }
        let endpoint = Url::parse(&config.account).map_err(|e| {
            PersistenceError::configuration(format!(
                "invalid cosmos account endpoint '{}': {}",
                config.account, e
            ))
        })?;
        if endpoint.cannot_be_a_base() {
            return Err(PersistenceError::configuration(format!(
                "invalid cosmos account endpoint '{}'",
                config.account
            )));
        }

        if config.key.trim().is_empty() {
            return Err(PersistenceError::configuration(
                "cosmos account key is not configured",
            ));
        }
        let key = BASE64.decode(config.key.trim()).map_err(|e| {
            PersistenceError::configuration(format!("cosmos account key is not base64: {}", e))
        })?;

        let http_client = Client::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| {
                PersistenceError::configuration(format!("failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            endpoint,
            key,
            http_client,
        })
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.endpoint.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Master key authorization token for one request
    fn authorization(&self, method: &Method, resource_type: &str, resource_link: &str, date: &str) -> String {
        let payload = format!(
            "{}\n{}\n{}\n{}\n\n",
            method.as_str().to_lowercase(),
            resource_type.to_lowercase(),
            resource_link,
            date.to_lowercase()
        );

        let mut mac =
            HmacSha256::new_from_slice(&self.key).expect("HMAC can take key of any size");
        mac.update(payload.as_bytes());
        let signature = BASE64.encode(mac.finalize().into_bytes());

        let token = format!("type=master&ver=1.0&sig={}", signature);
        url::form_urlencoded::byte_serialize(token.as_bytes()).collect()
    }

    fn request(
        &self,
        method: Method,
        segments: &[&str],
        resource_type: &str,
        resource_link: &str,
    ) -> RequestBuilder {
        let date = chrono::Utc::now()
            .format("%a, %d %b %Y %H:%M:%S GMT")
            .to_string();
        let authorization = self.authorization(&method, resource_type, resource_link, &date);

        self.http_client
            .request(method, self.url(segments))
            .header(HEADER_AUTHORIZATION, authorization)
            .header(HEADER_DATE, date)
            .header(HEADER_VERSION, API_VERSION)
    }

    async fn send(&self, request: RequestBuilder) -> std::result::Result<Response, EngineError> {
        let response = request
            .send()
            .await
            .map_err(|e| EngineError::transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
            .unwrap_or(body);
        debug!(status = status.as_u16(), message = %message, "Cosmos request failed");
        Err(EngineError::new(status, message))
    }

    async fn json(response: Response) -> std::result::Result<Value, EngineError> {
        response
            .json::<Value>()
            .await
            .map_err(|e| EngineError::transport(format!("invalid response body: {}", e)))
    }
}

fn partition_key_header(partition_key: &str) -> String {
    json!([partition_key]).to_string()
}

#[async_trait]
impl DocumentClient for CosmosClient {
    async fn create_database_if_not_exists(
        &self,
        database: &str,
    ) -> std::result::Result<bool, EngineError> {
        let request = self
            .request(Method::POST, &["dbs"], "dbs", "")
            .json(&json!({ "id": database }));

        match self.send(request).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_conflict() => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn create_container_if_not_exists(
        &self,
        database: &str,
        properties: &ContainerProperties,
    ) -> std::result::Result<ContainerProperties, EngineError> {
        let link = format!("dbs/{}", database);
        let request = self
            .request(Method::POST, &["dbs", database, "colls"], "colls", &link)
            .json(properties);

        match self.send(request).await {
            Ok(response) => {
                let body = Self::json(response).await?;
                serde_json::from_value(body)
                    .map_err(|e| EngineError::transport(format!("invalid container properties: {}", e)))
            }
            Err(e) if e.is_conflict() => {
                self.read_container(&ContainerRef::new(database, properties.id.clone()))
                    .await
            }
            Err(e) => Err(e),
        }
    }

    async fn read_container(
        &self,
        container: &ContainerRef,
    ) -> std::result::Result<ContainerProperties, EngineError> {
        let link = format!("dbs/{}/colls/{}", container.database, container.container);
        let request = self.request(
            Method::GET,
            &["dbs", &container.database, "colls", &container.container],
            "colls",
            &link,
        );

        let body = Self::json(self.send(request).await?).await?;
        serde_json::from_value(body)
            .map_err(|e| EngineError::transport(format!("invalid container properties: {}", e)))
    }

    async fn create_item(
        &self,
        container: &ContainerRef,
        partition_key: &str,
        item: &Value,
    ) -> std::result::Result<Value, EngineError> {
        let link = format!("dbs/{}/colls/{}", container.database, container.container);
        let request = self
            .request(
                Method::POST,
                &["dbs", &container.database, "colls", &container.container, "docs"],
                "docs",
                &link,
            )
            .header(HEADER_PARTITION_KEY, partition_key_header(partition_key))
            .json(item);

        Self::json(self.send(request).await?).await
    }

    async fn read_item(
        &self,
        container: &ContainerRef,
        id: &str,
        partition_key: &str,
    ) -> std::result::Result<Value, EngineError> {
        let link = format!(
            "dbs/{}/colls/{}/docs/{}",
            container.database, container.container, id
        );
        let request = self
            .request(
                Method::GET,
                &["dbs", &container.database, "colls", &container.container, "docs", id],
                "docs",
                &link,
            )
            .header(HEADER_PARTITION_KEY, partition_key_header(partition_key));

        Self::json(self.send(request).await?).await
    }

    async fn upsert_item(
        &self,
        container: &ContainerRef,
        partition_key: &str,
        item: &Value,
    ) -> std::result::Result<Value, EngineError> {
        let link = format!("dbs/{}/colls/{}", container.database, container.container);
        let request = self
            .request(
                Method::POST,
                &["dbs", &container.database, "colls", &container.container, "docs"],
                "docs",
                &link,
            )
            .header(HEADER_PARTITION_KEY, partition_key_header(partition_key))
            .header(HEADER_IS_UPSERT, "True")
            .json(item);

        Self::json(self.send(request).await?).await
    }

    async fn delete_item(
        &self,
        container: &ContainerRef,
        id: &str,
        partition_key: &str,
    ) -> std::result::Result<(), EngineError> {
        let link = format!(
            "dbs/{}/colls/{}/docs/{}",
            container.database, container.container, id
        );
        let request = self
            .request(
                Method::DELETE,
                &["dbs", &container.database, "colls", &container.container, "docs", id],
                "docs",
                &link,
            )
            .header(HEADER_PARTITION_KEY, partition_key_header(partition_key));

        self.send(request).await?;
        Ok(())
    }

    async fn query_items(
        &self,
        container: &ContainerRef,
        query: &str,
        continuation: Option<&str>,
    ) -> std::result::Result<QueryPage, EngineError> {
        let link = format!("dbs/{}/colls/{}", container.database, container.container);
        let body = json!({ "query": query, "parameters": [] }).to_string();
        let mut request = self
            .request(
                Method::POST,
                &["dbs", &container.database, "colls", &container.container, "docs"],
                "docs",
                &link,
            )
            .header(reqwest::header::CONTENT_TYPE, CONTENT_TYPE_QUERY)
            .header(HEADER_IS_QUERY, "True")
            .header(HEADER_CROSS_PARTITION, "True")
            .body(body);
        if let Some(token) = continuation {
            request = request.header(HEADER_CONTINUATION, token);
        }

        let response = self.send(request).await?;
        let next = response
            .headers()
            .get(HEADER_CONTINUATION)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(str::to_string);
        let page: QueryResponse = response
            .json()
            .await
            .map_err(|e| EngineError::transport(format!("invalid query response: {}", e)))?;

        Ok(QueryPage {
            items: page.documents,
            continuation: next,
        })
    }
}
