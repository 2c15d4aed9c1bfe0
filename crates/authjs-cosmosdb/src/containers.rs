// Container resolver: lazily provisions the database and the four entity
// containers, then hands out cached handles for the adapter's lifetime.
//
// Provisioning is create-if-absent, so two tasks racing on first use at
// worst issue a redundant create call; the first handle cached wins.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tokio::sync::{OnceCell, RwLock};

use authjs_core::error::{AdapterError, AdapterResult};

use crate::store::{ContainerRef, ContainerSpec, DatabaseRef, DocumentStore};

/// The four entity containers and their partition-key paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerKind {
    Users,
    Accounts,
    Sessions,
    VerificationTokens,
}

impl ContainerKind {
    pub const ALL: [ContainerKind; 4] = [
        Self::Users,
        Self::Accounts,
        Self::Sessions,
        Self::VerificationTokens,
    ];

    /// Container id in the database.
    pub fn id(&self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Accounts => "accounts",
            Self::Sessions => "sessions",
            Self::VerificationTokens => "verification_tokens",
        }
    }

    pub fn partition_key_path(&self) -> &'static str {
        match self {
            Self::Users => "/id",
            Self::Accounts => "/userId",
            Self::Sessions => "/sessionToken",
            Self::VerificationTokens => "/identifier",
        }
    }

    /// Partition-key field name (the path without its leading `/`).
    pub fn partition_key_field(&self) -> &'static str {
        self.partition_key_path().trim_start_matches('/')
    }

    pub fn spec(&self) -> ContainerSpec {
        ContainerSpec {
            id: self.id().to_string(),
            partition_key_path: self.partition_key_path().to_string(),
        }
    }
}

impl fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for ContainerKind {
    type Err = AdapterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.id() == s)
            .ok_or_else(|| AdapterError::Config(format!("Unknown container: {s}")))
    }
}

/// Owns the cached database and container handles.
pub struct ContainerResolver {
    store: Arc<dyn DocumentStore>,
    database_id: String,
    database: OnceCell<DatabaseRef>,
    containers: RwLock<HashMap<ContainerKind, ContainerRef>>,
}

impl fmt::Debug for ContainerResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerResolver")
            .field("database_id", &self.database_id)
            .field("initialized", &self.database.initialized())
            .finish()
    }
}

impl ContainerResolver {
    pub fn new(store: Arc<dyn DocumentStore>, database_id: impl Into<String>) -> Self {
        Self {
            store,
            database_id: database_id.into(),
            database: OnceCell::new(),
            containers: RwLock::new(HashMap::new()),
        }
    }

    /// The store every resolved handle belongs to.
    pub fn store(&self) -> &dyn DocumentStore {
        self.store.as_ref()
    }

    pub fn database_id(&self) -> &str {
        &self.database_id
    }

    async fn database(&self) -> AdapterResult<&DatabaseRef> {
        self.database
            .get_or_try_init(|| async {
                let database = self
                    .store
                    .create_database_if_not_exists(&self.database_id)
                    .await?;
                tracing::info!("[Cosmos Adapter] database '{}' ready", database.id);
                Ok::<_, AdapterError>(database)
            })
            .await
    }

    /// Handle for `kind`, provisioning the database and container on first use.
    pub async fn resolve(&self, kind: ContainerKind) -> AdapterResult<ContainerRef> {
        if let Some(container) = self.containers.read().await.get(&kind) {
            return Ok(container.clone());
        }

        let database = self.database().await?;
        let container = self
            .store
            .create_container_if_not_exists(database, &kind.spec())
            .await?;
        tracing::info!(
            "[Cosmos Adapter] container '{}' ready (partition key {})",
            container.id,
            container.partition_key_path
        );

        let mut containers = self.containers.write().await;
        Ok(containers.entry(kind).or_insert(container).clone())
    }

    /// Resolve by container id. Unknown ids fail before the store is called.
    pub async fn resolve_by_name(&self, name: &str) -> AdapterResult<ContainerRef> {
        let kind: ContainerKind = name.parse()?;
        self.resolve(kind).await
    }

    /// Provision all four containers up front.
    pub async fn warm_up(&self) -> AdapterResult<()> {
        for kind in ContainerKind::ALL {
            self.resolve(kind).await?;
        }
        Ok(())
    }
}
