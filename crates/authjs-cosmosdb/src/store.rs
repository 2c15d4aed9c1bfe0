// Document store seam: the slice of a Cosmos DB client the adapter needs.
//
// The adapter never talks to the network itself. Callers hand it a value
// implementing `DocumentStore` (a wrapper around their Cosmos client, or the
// in-memory `MemoryStore`), and every store round trip goes through here.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use authjs_core::error::DatabaseError;

use crate::query::SqlQuerySpec;

/// A stored document: a JSON object, including store system properties.
pub type Document = serde_json::Map<String, serde_json::Value>;

/// Result type for store calls.
pub type StoreResult<T> = std::result::Result<T, DatabaseError>;

/// Prefix the store uses for the system properties it adds to documents.
pub const SYSTEM_PROPERTY_PREFIX: char = '_';

/// System property holding the document version.
pub const ETAG_PROPERTY: &str = "_etag";

/// Whether `key` is a store-managed system property.
pub fn is_system_property(key: &str) -> bool {
    key.starts_with(SYSTEM_PROPERTY_PREFIX)
}

/// Handle to a provisioned database.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatabaseRef {
    pub id: String,
}

/// Request to provision a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerSpec {
    pub id: String,
    /// JSON path of the partition key, e.g. `/userId`.
    pub partition_key_path: String,
}

/// Handle to a provisioned container.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerRef {
    pub database_id: String,
    pub id: String,
    pub partition_key_path: String,
}

/// Per-request options for point writes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemOptions {
    /// Only apply the write if the stored document still has this etag.
    pub if_match: Option<String>,
}

impl ItemOptions {
    pub fn if_match(etag: impl Into<String>) -> Self {
        Self {
            if_match: Some(etag.into()),
        }
    }
}

/// The document database operations the adapter consumes.
///
/// Implementations report failures as `DatabaseError` with the matching
/// kind and must not retry on the adapter's behalf.
#[async_trait]
pub trait DocumentStore: Send + Sync + fmt::Debug {
    /// Create the database unless it exists; return its handle either way.
    async fn create_database_if_not_exists(&self, id: &str) -> StoreResult<DatabaseRef>;

    /// Create the container unless it exists; return its handle either way.
    async fn create_container_if_not_exists(
        &self,
        database: &DatabaseRef,
        spec: &ContainerSpec,
    ) -> StoreResult<ContainerRef>;

    /// Insert a new document. Fails with `Conflict` if the id is taken in
    /// its partition. Returns the document as stored.
    async fn create_item(&self, container: &ContainerRef, document: Document)
        -> StoreResult<Document>;

    /// Point read. A missing document is `Ok(None)`.
    async fn read_item(
        &self,
        container: &ContainerRef,
        id: &str,
        partition_key: &str,
    ) -> StoreResult<Option<Document>>;

    /// Replace an existing document wholesale. Fails with `NotFound` if it
    /// is absent and `PreconditionFailed` if `options.if_match` is stale.
    async fn replace_item(
        &self,
        container: &ContainerRef,
        id: &str,
        partition_key: &str,
        document: Document,
        options: &ItemOptions,
    ) -> StoreResult<Document>;

    /// Point delete. Fails with `NotFound` if the document is absent.
    async fn delete_item(
        &self,
        container: &ContainerRef,
        id: &str,
        partition_key: &str,
    ) -> StoreResult<()>;

    /// Run a parameterized query across all partitions and fetch every page.
    async fn query_items(
        &self,
        container: &ContainerRef,
        query: &SqlQuerySpec,
    ) -> StoreResult<Vec<Document>>;
}

/// Read the string at a partition-key path (`/field`) of a document.
pub fn partition_key_value<'a>(document: &'a Document, path: &str) -> Option<&'a str> {
    document
        .get(path.trim_start_matches('/'))
        .and_then(|v| v.as_str())
}
