// In-memory document store: a map-backed stand-in for Cosmos DB.
//
// Thread-safe via `tokio::sync::RwLock`. Emulates the behaviour the adapter
// relies on: create-if-absent provisioning, partition-key routing, id
// assignment, `(partition key, id)` uniqueness, system properties with a
// fresh etag per write, `if-match` checks, 404s on replace/delete of absent
// documents, and the equality-only SQL the query builder emits. Data is
// lost when the last clone is dropped.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use authjs_core::error::DatabaseError;
use authjs_core::utils::generate_id;

use crate::query::SqlQuerySpec;
use crate::store::{
    is_system_property, partition_key_value, ContainerRef, ContainerSpec, DatabaseRef, Document,
    DocumentStore, ItemOptions, StoreResult, ETAG_PROPERTY,
};

/// Number of provisioning calls the store has served.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProvisioningCalls {
    pub databases: usize,
    pub containers: usize,
}

/// Data-plane operations a failure can be injected into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Read,
    Replace,
    Delete,
    Query,
}

#[derive(Debug)]
struct ContainerState {
    partition_key_path: String,
    /// Keyed by `(partition key, id)`.
    items: BTreeMap<(String, String), Document>,
}

#[derive(Debug, Default)]
struct DatabaseState {
    containers: HashMap<String, ContainerState>,
}

#[derive(Debug, Default)]
struct State {
    databases: HashMap<String, DatabaseState>,
    calls: ProvisioningCalls,
    failures: Vec<(Operation, DatabaseError)>,
}

impl State {
    fn container(&self, container: &ContainerRef) -> StoreResult<&ContainerState> {
        self.databases
            .get(&container.database_id)
            .and_then(|db| db.containers.get(&container.id))
            .ok_or_else(|| missing_container(container))
    }

    fn container_mut(&mut self, container: &ContainerRef) -> StoreResult<&mut ContainerState> {
        self.databases
            .get_mut(&container.database_id)
            .and_then(|db| db.containers.get_mut(&container.id))
            .ok_or_else(|| missing_container(container))
    }

    /// Pop the first failure injected for `op`, if any.
    fn take_failure(&mut self, op: Operation) -> StoreResult<()> {
        match self.failures.iter().position(|(o, _)| *o == op) {
            Some(index) => Err(self.failures.remove(index).1),
            None => Ok(()),
        }
    }
}

fn missing_container(container: &ContainerRef) -> DatabaseError {
    DatabaseError::not_found(format!(
        "container '{}' does not exist in database '{}'",
        container.id, container.database_id
    ))
}

/// In-memory `DocumentStore`.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<State>>,
}

impl MemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn provisioning_calls(&self) -> ProvisioningCalls {
        self.state.read().await.calls
    }

    pub async fn container_exists(&self, database_id: &str, container_id: &str) -> bool {
        self.state
            .read()
            .await
            .databases
            .get(database_id)
            .is_some_and(|db| db.containers.contains_key(container_id))
    }

    /// Number of documents in a container (0 if it does not exist).
    pub async fn item_count(&self, database_id: &str, container_id: &str) -> usize {
        self.state
            .read()
            .await
            .databases
            .get(database_id)
            .and_then(|db| db.containers.get(container_id))
            .map(|c| c.items.len())
            .unwrap_or(0)
    }

    /// Every stored document of a container, system properties included.
    pub async fn raw_items(&self, database_id: &str, container_id: &str) -> Vec<Document> {
        self.state
            .read()
            .await
            .databases
            .get(database_id)
            .and_then(|db| db.containers.get(container_id))
            .map(|c| c.items.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Make the next call of `op` fail with `error`.
    pub async fn fail_next(&self, op: Operation, error: DatabaseError) {
        self.state.write().await.failures.push((op, error));
    }

    /// Drop every database and reset the counters.
    pub async fn clear(&self) {
        *self.state.write().await = State::default();
    }
}

/// Strip caller-supplied system properties and stamp fresh ones.
fn stamp(mut document: Document, container: &ContainerRef, id: &str) -> Document {
    document.retain(|key, _| !is_system_property(key));
    let rid = generate_id().replace('-', "");
    document.insert("_rid".into(), rid[..16].into());
    document.insert(
        "_self".into(),
        format!("dbs/{}/colls/{}/docs/{}", container.database_id, container.id, id).into(),
    );
    document.insert(ETAG_PROPERTY.into(), format!("\"{}\"", generate_id()).into());
    document.insert("_attachments".into(), "attachments/".into());
    document.insert("_ts".into(), chrono::Utc::now().timestamp().into());
    document
}

fn document_id(document: &Document) -> StoreResult<Option<String>> {
    match document.get("id") {
        None => Ok(None),
        Some(serde_json::Value::String(id)) if !id.is_empty() => Ok(Some(id.clone())),
        Some(_) => Err(DatabaseError::bad_request("document id must be a non-empty string")),
    }
}

fn document_partition_key(document: &Document, path: &str) -> StoreResult<String> {
    partition_key_value(document, path)
        .map(str::to_string)
        .ok_or_else(|| {
            DatabaseError::bad_request(format!("document has no string partition key at {path}"))
        })
}

// ─── Query evaluation ────────────────────────────────────────────

/// `c.<field> = @<parameter>`
#[derive(Debug, Clone, PartialEq, Eq)]
struct Predicate {
    field: String,
    parameter: String,
}

/// Parse `SELECT * FROM <alias> [WHERE <alias>.<f> = @<p> (AND ...)*]`.
fn parse_query(query: &str) -> StoreResult<Vec<Predicate>> {
    let spaced = query.replace('=', " = ");
    let tokens: Vec<&str> = spaced.split_whitespace().collect();
    let unsupported = || DatabaseError::bad_request(format!("unsupported query: {query}"));

    let alias = match tokens.as_slice() {
        [select, "*", from, alias, ..]
            if select.eq_ignore_ascii_case("SELECT") && from.eq_ignore_ascii_case("FROM") =>
        {
            *alias
        }
        _ => return Err(unsupported()),
    };

    let rest = &tokens[4..];
    if rest.is_empty() {
        return Ok(Vec::new());
    }
    if !rest[0].eq_ignore_ascii_case("WHERE") {
        return Err(unsupported());
    }

    let mut predicates = Vec::new();
    for chunk in rest[1..].split(|t| t.eq_ignore_ascii_case("AND")) {
        let [lhs, "=", rhs] = chunk else {
            return Err(unsupported());
        };
        let field = lhs
            .strip_prefix(alias)
            .and_then(|f| f.strip_prefix('.'))
            .filter(|f| !f.is_empty())
            .ok_or_else(unsupported)?;
        let parameter = rhs
            .strip_prefix('@')
            .filter(|p| !p.is_empty())
            .ok_or_else(unsupported)?;
        predicates.push(Predicate {
            field: field.to_string(),
            parameter: parameter.to_string(),
        });
    }

    if predicates.is_empty() {
        return Err(unsupported());
    }
    Ok(predicates)
}

fn bind<'a>(
    predicates: &[Predicate],
    spec: &'a SqlQuerySpec,
) -> StoreResult<Vec<(String, &'a serde_json::Value)>> {
    predicates
        .iter()
        .map(|p| {
            spec.parameter(&p.parameter)
                .map(|value| (p.field.clone(), value))
                .ok_or_else(|| {
                    DatabaseError::bad_request(format!("parameter @{} is not bound", p.parameter))
                })
        })
        .collect()
}

fn matches(document: &Document, bound: &[(String, &serde_json::Value)]) -> bool {
    bound
        .iter()
        .all(|(field, value)| document.get(field) == Some(*value))
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn create_database_if_not_exists(&self, id: &str) -> StoreResult<DatabaseRef> {
        let mut state = self.state.write().await;
        state.calls.databases += 1;
        state.databases.entry(id.to_string()).or_default();
        Ok(DatabaseRef { id: id.to_string() })
    }

    async fn create_container_if_not_exists(
        &self,
        database: &DatabaseRef,
        spec: &ContainerSpec,
    ) -> StoreResult<ContainerRef> {
        let mut state = self.state.write().await;
        state.calls.containers += 1;
        let db = state.databases.get_mut(&database.id).ok_or_else(|| {
            DatabaseError::not_found(format!("database '{}' does not exist", database.id))
        })?;

        // An existing container keeps its original partition key.
        let container = db
            .containers
            .entry(spec.id.clone())
            .or_insert_with(|| ContainerState {
                partition_key_path: spec.partition_key_path.clone(),
                items: BTreeMap::new(),
            });

        Ok(ContainerRef {
            database_id: database.id.clone(),
            id: spec.id.clone(),
            partition_key_path: container.partition_key_path.clone(),
        })
    }

    async fn create_item(
        &self,
        container: &ContainerRef,
        mut document: Document,
    ) -> StoreResult<Document> {
        let mut state = self.state.write().await;
        state.take_failure(Operation::Create)?;
        let target = state.container_mut(container)?;

        let id = match document_id(&document)? {
            Some(id) => id,
            None => {
                let id = generate_id();
                document.insert("id".into(), id.clone().into());
                id
            }
        };
        let partition_key = document_partition_key(&document, &target.partition_key_path)?;

        let key = (partition_key, id);
        if target.items.contains_key(&key) {
            return Err(DatabaseError::conflict(format!(
                "document '{}' already exists in partition '{}'",
                key.1, key.0
            )));
        }

        let stored = stamp(document, container, &key.1);
        target.items.insert(key, stored.clone());
        Ok(stored)
    }

    async fn read_item(
        &self,
        container: &ContainerRef,
        id: &str,
        partition_key: &str,
    ) -> StoreResult<Option<Document>> {
        let mut state = self.state.write().await;
        state.take_failure(Operation::Read)?;
        let target = state.container(container)?;
        Ok(target
            .items
            .get(&(partition_key.to_string(), id.to_string()))
            .cloned())
    }

    async fn replace_item(
        &self,
        container: &ContainerRef,
        id: &str,
        partition_key: &str,
        document: Document,
        options: &ItemOptions,
    ) -> StoreResult<Document> {
        let mut state = self.state.write().await;
        state.take_failure(Operation::Replace)?;
        let target = state.container_mut(container)?;

        let key = (partition_key.to_string(), id.to_string());
        let existing = target.items.get(&key).ok_or_else(|| {
            DatabaseError::not_found(format!(
                "document '{id}' does not exist in partition '{partition_key}'"
            ))
        })?;

        if let Some(ref expected) = options.if_match {
            let current = existing.get(ETAG_PROPERTY).and_then(|v| v.as_str());
            if current != Some(expected.as_str()) {
                return Err(DatabaseError::precondition_failed(format!(
                    "document '{id}' was modified concurrently"
                )));
            }
        }

        if document_id(&document)?.as_deref() != Some(id) {
            return Err(DatabaseError::bad_request(format!(
                "replacement document id must be '{id}'"
            )));
        }
        if document_partition_key(&document, &target.partition_key_path)? != partition_key {
            return Err(DatabaseError::bad_request(
                "replacement document cannot change its partition key",
            ));
        }

        let stored = stamp(document, container, id);
        target.items.insert(key, stored.clone());
        Ok(stored)
    }

    async fn delete_item(
        &self,
        container: &ContainerRef,
        id: &str,
        partition_key: &str,
    ) -> StoreResult<()> {
        let mut state = self.state.write().await;
        state.take_failure(Operation::Delete)?;
        let target = state.container_mut(container)?;
        target
            .items
            .remove(&(partition_key.to_string(), id.to_string()))
            .map(|_| ())
            .ok_or_else(|| {
                DatabaseError::not_found(format!(
                    "document '{id}' does not exist in partition '{partition_key}'"
                ))
            })
    }

    async fn query_items(
        &self,
        container: &ContainerRef,
        query: &SqlQuerySpec,
    ) -> StoreResult<Vec<Document>> {
        let mut state = self.state.write().await;
        state.take_failure(Operation::Query)?;

        let predicates = parse_query(&query.query)?;
        let bound = bind(&predicates, query)?;
        let target = state.container(container)?;
        Ok(target
            .items
            .values()
            .filter(|doc| matches(doc, &bound))
            .cloned()
            .collect())
    }
}
