// Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;

use authjs_core::db::models::{
    AdapterAccount, AdapterSession, AdapterUser, ProviderAccountId, VerificationToken,
    VerificationTokenKey,
};
use authjs_cosmosdb::containers::ContainerKind;
use authjs_cosmosdb::store::ContainerRef;
use authjs_cosmosdb::{
    format, CosmosAdapter, CosmosAdapterOptions, DocumentStore, MemoryStore, SqlQuerySpec,
};
use authjs_test_utils::TestDatabase;

pub const DATABASE_ID: &str = "auth";

pub fn container(kind: ContainerKind) -> ContainerRef {
    ContainerRef {
        database_id: DATABASE_ID.into(),
        id: kind.id().into(),
        partition_key_path: kind.partition_key_path().into(),
    }
}

pub fn memory_adapter() -> (MemoryStore, CosmosAdapter) {
    memory_adapter_with(CosmosAdapterOptions::default())
}

pub fn memory_adapter_with(options: CosmosAdapterOptions) -> (MemoryStore, CosmosAdapter) {
    authjs_test_utils::init_test_logging();
    let store = MemoryStore::new();
    let adapter = CosmosAdapter::with_options(Arc::new(store.clone()), options);
    (store, adapter)
}

/// Reads the store directly, without going through `CosmosAdapter`.
pub struct RawDatabase {
    store: MemoryStore,
    database_id: String,
}

impl RawDatabase {
    pub fn new(store: &MemoryStore) -> Self {
        Self::with_database(store, DATABASE_ID)
    }

    pub fn with_database(store: &MemoryStore, database_id: &str) -> Self {
        Self {
            store: store.clone(),
            database_id: database_id.to_string(),
        }
    }

    fn container(&self, kind: ContainerKind) -> ContainerRef {
        ContainerRef {
            database_id: self.database_id.clone(),
            ..container(kind)
        }
    }

    async fn first<T: serde::de::DeserializeOwned>(
        &self,
        kind: ContainerKind,
        query: SqlQuerySpec,
    ) -> anyhow::Result<Option<T>> {
        let documents = self.store.query_items(&self.container(kind), &query).await?;
        Ok(documents
            .into_iter()
            .next()
            .map(format::from_storage)
            .transpose()?)
    }
}

#[async_trait]
impl TestDatabase for RawDatabase {
    async fn user(&self, id: &str) -> anyhow::Result<Option<AdapterUser>> {
        let document = self
            .store
            .read_item(&self.container(ContainerKind::Users), id, id)
            .await?;
        Ok(document.map(format::from_storage).transpose()?)
    }

    async fn account(&self, key: &ProviderAccountId) -> anyhow::Result<Option<AdapterAccount>> {
        let query = SqlQuerySpec::account_by_provider(&key.provider, &key.provider_account_id);
        self.first(ContainerKind::Accounts, query).await
    }

    async fn session(&self, session_token: &str) -> anyhow::Result<Option<AdapterSession>> {
        let query = SqlQuerySpec::session_by_token(session_token);
        let documents = self
            .store
            .query_items(&self.container(ContainerKind::Sessions), &query)
            .await?;
        Ok(documents
            .into_iter()
            .next()
            .map(format::session_from_storage)
            .transpose()?)
    }

    async fn verification_token(
        &self,
        key: &VerificationTokenKey,
    ) -> anyhow::Result<Option<VerificationToken>> {
        let query = SqlQuerySpec::verification_token(&key.identifier, &key.token);
        self.first(ContainerKind::VerificationTokens, query).await
    }
}
