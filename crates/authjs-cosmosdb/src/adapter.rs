// CosmosAdapter: implementation of the core Adapter trait on a Cosmos DB
// style document store.
//
// Each entity lives in its own container:
// - users               partitioned by /id
// - accounts            partitioned by /userId
// - sessions            partitioned by /sessionToken (document id = token)
// - verification_tokens partitioned by /identifier
//
// Point lookups use (id, partition key); secondary lookups are
// parameterized queries. Updates are read-merge-replace, never partial
// writes at the store.

use std::sync::Arc;

use async_trait::async_trait;

use authjs_core::db::adapter::Adapter;
use authjs_core::db::models::{
    AdapterAccount, AdapterSession, AdapterUser, NewUser, ProviderAccountId, SessionAndUser,
    SessionPatch, UserPatch, VerificationToken, VerificationTokenKey,
};
use authjs_core::error::{AdapterError, AdapterResult};
use authjs_core::utils::{date, generate_id};

use crate::containers::{ContainerKind, ContainerResolver};
use crate::format;
use crate::options::CosmosAdapterOptions;
use crate::query::SqlQuerySpec;
use crate::store::{
    partition_key_value, ContainerRef, Document, DocumentStore, ItemOptions, ETAG_PROPERTY,
};

/// Cosmos DB adapter.
///
/// Construct once at startup and share (it is cheap to put behind an `Arc`).
/// The database and containers are provisioned on first use.
#[derive(Debug)]
pub struct CosmosAdapter {
    resolver: ContainerResolver,
    options: CosmosAdapterOptions,
}

impl CosmosAdapter {
    /// Adapter with default options (database `auth`, etag checks on).
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self::with_options(store, CosmosAdapterOptions::default())
    }

    pub fn with_options(store: Arc<dyn DocumentStore>, options: CosmosAdapterOptions) -> Self {
        Self {
            resolver: ContainerResolver::new(store, options.database_id.clone()),
            options,
        }
    }

    /// Adapter configured from `AUTH_COSMOSDB_*` environment variables.
    pub fn from_env(store: Arc<dyn DocumentStore>) -> Self {
        Self::with_options(store, CosmosAdapterOptions::from_env())
    }

    pub fn options(&self) -> &CosmosAdapterOptions {
        &self.options
    }

    pub fn resolver(&self) -> &ContainerResolver {
        &self.resolver
    }

    /// Provision the database and all containers now instead of lazily.
    pub async fn warm_up(&self) -> AdapterResult<()> {
        self.resolver.warm_up().await
    }

    fn store(&self) -> &dyn DocumentStore {
        self.resolver.store()
    }

    /// Write options for replacing `existing`.
    fn write_options(&self, existing: &Document) -> ItemOptions {
        match existing.get(ETAG_PROPERTY).and_then(|v| v.as_str()) {
            Some(etag) if self.options.optimistic_concurrency => ItemOptions::if_match(etag),
            _ => ItemOptions::default(),
        }
    }

    async fn first_match(
        &self,
        container: &ContainerRef,
        query: &SqlQuerySpec,
    ) -> AdapterResult<Option<Document>> {
        let documents = self.store().query_items(container, query).await?;
        Ok(documents.into_iter().next())
    }

    /// Delete a document; one that is already gone counts as deleted.
    async fn delete_if_present(
        &self,
        container: &ContainerRef,
        id: &str,
        partition_key: &str,
    ) -> AdapterResult<()> {
        match self.store().delete_item(container, id, partition_key).await {
            Ok(()) => Ok(()),
            Err(err) if err.is_not_found() => {
                tracing::debug!(
                    "[Cosmos Adapter] '{}' in '{}' already deleted",
                    id,
                    container.id
                );
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn find_user(&self, id: &str) -> AdapterResult<Option<AdapterUser>> {
        let container = self.resolver.resolve(ContainerKind::Users).await?;
        tracing::debug!("[Cosmos Adapter] GET_USER on '{}'", container.id);
        self.store()
            .read_item(&container, id, id)
            .await?
            .map(format::from_storage)
            .transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> AdapterResult<Option<AdapterUser>> {
        let container = self.resolver.resolve(ContainerKind::Users).await?;
        tracing::debug!("[Cosmos Adapter] GET_USER_BY_EMAIL on '{}'", container.id);
        self.first_match(&container, &SqlQuerySpec::user_by_email(email))
            .await?
            .map(format::from_storage)
            .transpose()
    }

    async fn apply_user_patch(&self, patch: UserPatch) -> AdapterResult<AdapterUser> {
        let container = self.resolver.resolve(ContainerKind::Users).await?;
        tracing::debug!("[Cosmos Adapter] UPDATE_USER on '{}'", container.id);

        let existing = self
            .store()
            .read_item(&container, &patch.id, &patch.id)
            .await?
            .ok_or_else(|| AdapterError::not_found("User", &patch.id))?;
        let options = self.write_options(&existing);

        // Decode before writing so a bad patch never reaches the store.
        let merged = format::merge(
            format::strip_system_properties(existing),
            format::to_storage(&patch)?,
        );
        let user: AdapterUser = format::from_storage(merged)?;

        let stored = self
            .store()
            .replace_item(
                &container,
                &user.id,
                &user.id,
                format::to_storage(&user)?,
                &options,
            )
            .await?;
        format::from_storage(stored)
    }
}

/// The `(id, partition key)` address of a stored document.
fn document_address(document: &Document, kind: ContainerKind) -> AdapterResult<(String, String)> {
    let id = document.get("id").and_then(|v| v.as_str());
    let partition_key = partition_key_value(document, kind.partition_key_path());
    match (id, partition_key) {
        (Some(id), Some(pk)) => Ok((id.to_string(), pk.to_string())),
        _ => Err(AdapterError::Serialization(serde::de::Error::custom(format!(
            "document in '{}' has no id or partition key",
            kind.id()
        )))),
    }
}

#[async_trait]
impl Adapter for CosmosAdapter {
    async fn create_user(&self, user: NewUser) -> AdapterResult<AdapterUser> {
        let container = self.resolver.resolve(ContainerKind::Users).await?;
        tracing::debug!("[Cosmos Adapter] CREATE_USER on '{}'", container.id);

        let mut document = format::to_storage(&user)?;
        if !document.contains_key("id") {
            document.insert("id".into(), generate_id().into());
        }
        let stored = self.store().create_item(&container, document).await?;
        format::from_storage(stored)
    }

    async fn get_user(&self, id: &str) -> AdapterResult<Option<AdapterUser>> {
        self.find_user(id).await
    }

    async fn get_user_by_email(&self, email: &str) -> AdapterResult<Option<AdapterUser>> {
        self.find_user_by_email(email).await
    }

    async fn get_user_by_account(
        &self,
        account: &ProviderAccountId,
    ) -> AdapterResult<Option<AdapterUser>> {
        let container = self.resolver.resolve(ContainerKind::Accounts).await?;
        tracing::debug!("[Cosmos Adapter] GET_USER_BY_ACCOUNT on '{}'", container.id);

        let query =
            SqlQuerySpec::account_by_provider(&account.provider, &account.provider_account_id);
        let Some(document) = self.first_match(&container, &query).await? else {
            return Ok(None);
        };
        let linked: AdapterAccount = format::from_storage(document)?;
        self.find_user(&linked.user_id).await
    }

    async fn update_user(&self, patch: UserPatch) -> AdapterResult<AdapterUser> {
        self.apply_user_patch(patch).await
    }

    async fn delete_user(&self, id: &str) -> AdapterResult<()> {
        let container = self.resolver.resolve(ContainerKind::Users).await?;
        tracing::debug!("[Cosmos Adapter] DELETE_USER on '{}'", container.id);
        self.delete_if_present(&container, id, id).await
    }

    async fn link_account(&self, mut account: AdapterAccount) -> AdapterResult<AdapterAccount> {
        let container = self.resolver.resolve(ContainerKind::Accounts).await?;
        tracing::debug!("[Cosmos Adapter] LINK_ACCOUNT on '{}'", container.id);

        if account.id.is_none() {
            account.id = Some(generate_id());
        }
        let stored = self
            .store()
            .create_item(&container, format::to_storage(&account)?)
            .await?;
        format::from_storage(stored)
    }

    async fn unlink_account(&self, account: &ProviderAccountId) -> AdapterResult<()> {
        let container = self.resolver.resolve(ContainerKind::Accounts).await?;
        tracing::debug!("[Cosmos Adapter] UNLINK_ACCOUNT on '{}'", container.id);

        let query =
            SqlQuerySpec::account_by_provider(&account.provider, &account.provider_account_id);
        let Some(document) = self.first_match(&container, &query).await? else {
            return Ok(());
        };
        let (id, user_id) = document_address(&document, ContainerKind::Accounts)?;
        self.delete_if_present(&container, &id, &user_id).await
    }

    async fn create_session(&self, session: AdapterSession) -> AdapterResult<AdapterSession> {
        let container = self.resolver.resolve(ContainerKind::Sessions).await?;
        tracing::debug!("[Cosmos Adapter] CREATE_SESSION on '{}'", container.id);

        let document = format::session_to_storage(&session)?;
        let stored = self.store().create_item(&container, document).await?;
        format::session_from_storage(stored)
    }

    async fn get_session_and_user(
        &self,
        session_token: &str,
    ) -> AdapterResult<Option<SessionAndUser>> {
        let container = self.resolver.resolve(ContainerKind::Sessions).await?;
        tracing::debug!("[Cosmos Adapter] GET_SESSION_AND_USER on '{}'", container.id);

        let query = SqlQuerySpec::session_by_token(session_token);
        let Some(document) = self.first_match(&container, &query).await? else {
            return Ok(None);
        };
        let session = format::session_from_storage(document)?;

        match self.find_user(&session.user_id).await? {
            Some(user) => Ok(Some(SessionAndUser { session, user })),
            None => {
                tracing::warn!(
                    "[Cosmos Adapter] session references missing user '{}'",
                    session.user_id
                );
                Ok(None)
            }
        }
    }

    async fn update_session(&self, patch: SessionPatch) -> AdapterResult<AdapterSession> {
        let container = self.resolver.resolve(ContainerKind::Sessions).await?;
        tracing::debug!("[Cosmos Adapter] UPDATE_SESSION on '{}'", container.id);

        let existing = self
            .store()
            .read_item(&container, &patch.session_token, &patch.session_token)
            .await?
            .ok_or_else(|| AdapterError::not_found("Session", &patch.session_token))?;
        let options = self.write_options(&existing);
        let (id, session_token) = document_address(&existing, ContainerKind::Sessions)?;

        let merged = format::merge(
            format::strip_system_properties(existing),
            format::to_storage(&patch)?,
        );
        let mut session = format::session_from_storage(merged)?;
        // The stored token is the key; a patch cannot move the session.
        session.session_token = session_token.clone();

        // Keep the existing document id, which may predate token-as-id.
        let mut document = format::session_to_storage(&session)?;
        document.insert("id".into(), id.clone().into());
        let stored = self
            .store()
            .replace_item(&container, &id, &session_token, document, &options)
            .await?;
        format::session_from_storage(stored)
    }

    async fn delete_session(&self, session_token: &str) -> AdapterResult<()> {
        let container = self.resolver.resolve(ContainerKind::Sessions).await?;
        tracing::debug!("[Cosmos Adapter] DELETE_SESSION on '{}'", container.id);
        self.delete_if_present(&container, session_token, session_token)
            .await
    }

    async fn create_verification_token(
        &self,
        token: VerificationToken,
    ) -> AdapterResult<VerificationToken> {
        let container = self.resolver.resolve(ContainerKind::VerificationTokens).await?;
        tracing::debug!(
            "[Cosmos Adapter] CREATE_VERIFICATION_TOKEN on '{}'",
            container.id
        );

        let mut document = format::to_storage(&token)?;
        document.insert("id".into(), generate_id().into());
        let stored = self.store().create_item(&container, document).await?;
        format::from_storage(stored)
    }

    async fn use_verification_token(
        &self,
        key: &VerificationTokenKey,
    ) -> AdapterResult<Option<AdapterUser>> {
        let container = self.resolver.resolve(ContainerKind::VerificationTokens).await?;
        tracing::debug!(
            "[Cosmos Adapter] USE_VERIFICATION_TOKEN on '{}'",
            container.id
        );

        let query = SqlQuerySpec::verification_token(&key.identifier, &key.token);
        let Some(document) = self.first_match(&container, &query).await? else {
            return Ok(None);
        };
        let (token_id, identifier) =
            document_address(&document, ContainerKind::VerificationTokens)?;

        // Not atomic: a failure after the user update leaves the token in
        // place, and it can be consumed again.
        let user = self
            .find_user_by_email(&key.identifier)
            .await?
            .ok_or_else(|| AdapterError::not_found("User", &key.identifier))?;
        let verified = self
            .apply_user_patch(UserPatch::new(user.id).email_verified(Some(date::now())))
            .await?;

        // A 404 here means another caller consumed the token first.
        self.store()
            .delete_item(&container, &token_id, &identifier)
            .await?;

        Ok(Some(verified))
    }
}
