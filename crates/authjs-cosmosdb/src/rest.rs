// Cosmos DB over its REST API: a `DocumentStore` that talks to a real account.
//
// Every request is signed with the account master key (HMAC-SHA256 over the
// verb, resource type, resource link and date). Non-success responses map onto
// `DatabaseErrorKind` by status code. Nothing is retried here; throttling
// surfaces with the server's retry hint.

use std::fmt;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE, IF_MATCH};
use reqwest::{Method, Response, StatusCode, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::Sha256;

use authjs_core::env;
use authjs_core::error::{AdapterError, AdapterResult, DatabaseError, DatabaseErrorKind};
use authjs_core::utils::generate_id;

use crate::query::SqlQuerySpec;
use crate::store::{
    partition_key_value, ContainerRef, ContainerSpec, DatabaseRef, Document, DocumentStore,
    ItemOptions, StoreResult,
};

type HmacSha256 = Hmac<Sha256>;

/// REST API version sent as `x-ms-version`.
pub const API_VERSION: &str = "2018-12-31";

/// Environment variable holding the account endpoint.
pub const ENV_ENDPOINT: &str = "AUTH_COSMOSDB_ENDPOINT";

/// Environment variable holding the base64 master key.
pub const ENV_KEY: &str = "AUTH_COSMOSDB_KEY";

const PARTITION_KEY_HEADER: &str = "x-ms-documentdb-partitionkey";
const CONTINUATION_HEADER: &str = "x-ms-continuation";
const RETRY_AFTER_HEADER: &str = "x-ms-retry-after-ms";

/// The address of one REST call: what gets signed and where it is sent.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Target {
    resource_type: &'static str,
    resource_link: String,
    path: String,
}

impl Target {
    /// A feed under `parent_link`: used to create resources and to query.
    fn feed(resource_type: &'static str, parent_link: String) -> Self {
        let path = if parent_link.is_empty() {
            resource_type.to_string()
        } else {
            format!("{parent_link}/{resource_type}")
        };
        Self {
            resource_type,
            resource_link: parent_link,
            path,
        }
    }

    /// A single named resource.
    fn item(resource_type: &'static str, link: String) -> Self {
        Self {
            resource_type,
            path: link.clone(),
            resource_link: link,
        }
    }
}

fn database_link(database_id: &str) -> String {
    format!("dbs/{database_id}")
}

fn container_link(container: &ContainerRef) -> String {
    format!("dbs/{}/colls/{}", container.database_id, container.id)
}

fn document_link(container: &ContainerRef, id: &str) -> String {
    format!("{}/docs/{id}", container_link(container))
}

/// `DocumentStore` backed by a Cosmos DB account.
#[derive(Clone)]
pub struct CosmosRestStore {
    client: reqwest::Client,
    endpoint: Url,
    key: Vec<u8>,
}

impl fmt::Debug for CosmosRestStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CosmosRestStore")
            .field("endpoint", &self.endpoint.as_str())
            .finish_non_exhaustive()
    }
}

impl CosmosRestStore {
    /// Connect to `endpoint` (e.g. `https://acct.documents.azure.com:443/`)
    /// with the account's base64 master key.
    pub fn new(endpoint: &str, master_key: &str) -> AdapterResult<Self> {
        Self::with_client(reqwest::Client::new(), endpoint, master_key)
    }

    /// Like `new`, reusing a caller-configured HTTP client.
    pub fn with_client(
        client: reqwest::Client,
        endpoint: &str,
        master_key: &str,
    ) -> AdapterResult<Self> {
        let endpoint = Url::parse(endpoint).map_err(|e| {
            AdapterError::Config(format!("invalid Cosmos DB endpoint '{endpoint}': {e}"))
        })?;
        if endpoint.cannot_be_a_base() {
            return Err(AdapterError::Config(format!(
                "Cosmos DB endpoint '{endpoint}' is not a base URL"
            )));
        }
        let key = STANDARD
            .decode(master_key.trim())
            .map_err(|e| AdapterError::Config(format!("invalid Cosmos DB master key: {e}")))?;

        Ok(Self {
            client,
            endpoint,
            key,
        })
    }

    /// Read the endpoint and key from `AUTH_COSMOSDB_ENDPOINT` and
    /// `AUTH_COSMOSDB_KEY`.
    pub fn from_env() -> AdapterResult<Self> {
        let endpoint = env::var(ENV_ENDPOINT)
            .ok_or_else(|| AdapterError::Config(format!("{ENV_ENDPOINT} is not set")))?;
        let key = env::var(ENV_KEY)
            .ok_or_else(|| AdapterError::Config(format!("{ENV_KEY} is not set")))?;
        Self::new(&endpoint, &key)
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn url(&self, path: &str) -> StoreResult<Url> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| DatabaseError::bad_request("endpoint cannot carry a path"))?
            .pop_if_empty()
            .extend(path.split('/'));
        Ok(url)
    }

    async fn send(
        &self,
        method: Method,
        target: &Target,
        headers: HeaderMap,
        body: Option<Value>,
    ) -> StoreResult<Response> {
        let date = http_date(Utc::now());
        let authorization = authorization(
            &self.key,
            &method,
            target.resource_type,
            &target.resource_link,
            &date,
        )?;

        tracing::trace!("[Cosmos REST] {} {}", method, target.path);
        let mut request = self
            .client
            .request(method, self.url(&target.path)?)
            .headers(headers)
            .header("authorization", authorization)
            .header("x-ms-date", date)
            .header("x-ms-version", API_VERSION);
        if let Some(body) = body {
            request = request.body(body.to_string());
        }

        let response = request.send().await.map_err(transport_error)?;
        if response.status().is_success() {
            return Ok(response);
        }
        Err(error_from_response(response).await)
    }

    async fn read_container(&self, database: &DatabaseRef, id: &str) -> StoreResult<ContainerRef> {
        let link = format!("{}/colls/{id}", database_link(&database.id));
        let response = self
            .send(Method::GET, &Target::item("colls", link), HeaderMap::new(), None)
            .await?;
        let properties: ContainerProperties = response.json().await.map_err(transport_error)?;
        let partition_key_path = properties
            .partition_key
            .paths
            .into_iter()
            .next()
            .ok_or_else(|| {
                DatabaseError::bad_request(format!("container '{id}' has no partition key"))
            })?;

        Ok(ContainerRef {
            database_id: database.id.clone(),
            id: id.to_string(),
            partition_key_path,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContainerProperties {
    partition_key: PartitionKeyDefinition,
}

#[derive(Debug, Deserialize)]
struct PartitionKeyDefinition {
    paths: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct QueryPage {
    #[serde(rename = "Documents", default)]
    documents: Vec<Document>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

#[async_trait]
impl DocumentStore for CosmosRestStore {
    async fn create_database_if_not_exists(&self, id: &str) -> StoreResult<DatabaseRef> {
        let created = self
            .send(
                Method::POST,
                &Target::feed("dbs", String::new()),
                json_headers(),
                Some(json!({ "id": id })),
            )
            .await;
        match created {
            Ok(_) => tracing::debug!("[Cosmos REST] created database {id}"),
            Err(err) if err.kind == DatabaseErrorKind::Conflict => {}
            Err(err) => return Err(err),
        }
        Ok(DatabaseRef { id: id.to_string() })
    }

    async fn create_container_if_not_exists(
        &self,
        database: &DatabaseRef,
        spec: &ContainerSpec,
    ) -> StoreResult<ContainerRef> {
        let body = json!({
            "id": spec.id,
            "partitionKey": { "paths": [spec.partition_key_path], "kind": "Hash" },
        });
        let created = self
            .send(
                Method::POST,
                &Target::feed("colls", database_link(&database.id)),
                json_headers(),
                Some(body),
            )
            .await;
        match created {
            Ok(_) => {
                tracing::debug!("[Cosmos REST] created container {}/{}", database.id, spec.id);
                Ok(ContainerRef {
                    database_id: database.id.clone(),
                    id: spec.id.clone(),
                    partition_key_path: spec.partition_key_path.clone(),
                })
            }
            // An existing container keeps its original partition key.
            Err(err) if err.kind == DatabaseErrorKind::Conflict => {
                self.read_container(database, &spec.id).await
            }
            Err(err) => Err(err),
        }
    }

    async fn create_item(
        &self,
        container: &ContainerRef,
        mut document: Document,
    ) -> StoreResult<Document> {
        if !document.contains_key("id") {
            document.insert("id".into(), generate_id().into());
        }
        let partition_key = partition_key_value(&document, &container.partition_key_path)
            .ok_or_else(|| {
                DatabaseError::bad_request(format!(
                    "document has no string partition key at '{}'",
                    container.partition_key_path
                ))
            })?
            .to_string();

        let mut headers = json_headers();
        headers.insert(PARTITION_KEY_HEADER, partition_key_header(&partition_key)?);
        let response = self
            .send(
                Method::POST,
                &Target::feed("docs", container_link(container)),
                headers,
                Some(Value::Object(document)),
            )
            .await?;
        response.json().await.map_err(transport_error)
    }

    async fn read_item(
        &self,
        container: &ContainerRef,
        id: &str,
        partition_key: &str,
    ) -> StoreResult<Option<Document>> {
        let mut headers = HeaderMap::new();
        headers.insert(PARTITION_KEY_HEADER, partition_key_header(partition_key)?);
        let target = Target::item("docs", document_link(container, id));
        match self.send(Method::GET, &target, headers, None).await {
            Ok(response) => Ok(Some(response.json().await.map_err(transport_error)?)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn replace_item(
        &self,
        container: &ContainerRef,
        id: &str,
        partition_key: &str,
        document: Document,
        options: &ItemOptions,
    ) -> StoreResult<Document> {
        let mut headers = json_headers();
        headers.insert(PARTITION_KEY_HEADER, partition_key_header(partition_key)?);
        if let Some(ref etag) = options.if_match {
            headers.insert(IF_MATCH, header_value(etag)?);
        }
        let response = self
            .send(
                Method::PUT,
                &Target::item("docs", document_link(container, id)),
                headers,
                Some(Value::Object(document)),
            )
            .await?;
        response.json().await.map_err(transport_error)
    }

    async fn delete_item(
        &self,
        container: &ContainerRef,
        id: &str,
        partition_key: &str,
    ) -> StoreResult<()> {
        let mut headers = HeaderMap::new();
        headers.insert(PARTITION_KEY_HEADER, partition_key_header(partition_key)?);
        self.send(
            Method::DELETE,
            &Target::item("docs", document_link(container, id)),
            headers,
            None,
        )
        .await?;
        Ok(())
    }

    async fn query_items(
        &self,
        container: &ContainerRef,
        query: &SqlQuerySpec,
    ) -> StoreResult<Vec<Document>> {
        let target = Target::feed("docs", container_link(container));
        let body = json!({ "query": query.query, "parameters": query.parameters });
        let mut documents = Vec::new();
        let mut continuation: Option<HeaderValue> = None;

        loop {
            let mut headers = query_headers();
            if let Some(token) = continuation.take() {
                headers.insert(CONTINUATION_HEADER, token);
            }
            let response = self
                .send(Method::POST, &target, headers, Some(body.clone()))
                .await?;
            continuation = response.headers().get(CONTINUATION_HEADER).cloned();
            let page: QueryPage = response.json().await.map_err(transport_error)?;
            documents.extend(page.documents);
            if continuation.is_none() {
                return Ok(documents);
            }
        }
    }
}

/// The `x-ms-date` form of a timestamp (RFC 1123).
fn http_date(at: DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Master-key `authorization` header value for one request.
fn authorization(
    key: &[u8],
    method: &Method,
    resource_type: &str,
    resource_link: &str,
    date: &str,
) -> StoreResult<String> {
    let payload = format!(
        "{}\n{}\n{}\n{}\n\n",
        method.as_str().to_lowercase(),
        resource_type.to_lowercase(),
        resource_link,
        date.to_lowercase()
    );
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| DatabaseError::bad_request(format!("unusable master key: {e}")))?;
    mac.update(payload.as_bytes());
    let signature = STANDARD.encode(mac.finalize().into_bytes());
    Ok(encode_component(&format!("type=master&ver=1.0&sig={signature}")))
}

/// Percent-encode everything outside the URI unreserved set.
fn encode_component(value: &str) -> String {
    let mut encoded = String::with_capacity(value.len() * 3);
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char)
            }
            _ => encoded.push_str(&format!("%{byte:02X}")),
        }
    }
    encoded
}

fn header_value(value: &str) -> StoreResult<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| DatabaseError::bad_request(format!("invalid header value: {e}")))
}

fn partition_key_header(partition_key: &str) -> StoreResult<HeaderValue> {
    header_value(&json!([partition_key]).to_string())
}

fn json_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers
}

fn query_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/query+json"));
    headers.insert(
        HeaderName::from_static("x-ms-documentdb-isquery"),
        HeaderValue::from_static("True"),
    );
    headers.insert(
        HeaderName::from_static("x-ms-documentdb-query-enablecrosspartition"),
        HeaderValue::from_static("True"),
    );
    headers
}

fn transport_error(err: reqwest::Error) -> DatabaseError {
    DatabaseError::new(DatabaseErrorKind::Transport, err.to_string())
}

/// Classify a non-success status; `retry_after_ms` only matters for 429.
fn status_error(status: StatusCode, retry_after_ms: Option<u64>, message: String) -> DatabaseError {
    let kind = match status {
        StatusCode::BAD_REQUEST => DatabaseErrorKind::BadRequest,
        StatusCode::NOT_FOUND => DatabaseErrorKind::NotFound,
        StatusCode::CONFLICT => DatabaseErrorKind::Conflict,
        StatusCode::PRECONDITION_FAILED => DatabaseErrorKind::PreconditionFailed,
        StatusCode::TOO_MANY_REQUESTS => DatabaseErrorKind::Throttled { retry_after_ms },
        _ => DatabaseErrorKind::Transport,
    };
    DatabaseError::new(kind, message)
}

fn parse_retry_after(value: &str) -> Option<u64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|ms| ms.is_finite() && *ms >= 0.0)
        .map(|ms| ms.ceil() as u64)
}

async fn error_from_response(response: Response) -> DatabaseError {
    let status = response.status();
    let retry_after_ms = response
        .headers()
        .get(RETRY_AFTER_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_retry_after);
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .ok()
        .and_then(|b| b.message)
        .unwrap_or_else(|| format!("HTTP {status}"));
    status_error(status, retry_after_ms, message)
}
