// Raw store access for the conformance suite.

use async_trait::async_trait;

use authjs_core::db::models::{
    AdapterAccount, AdapterSession, AdapterUser, ProviderAccountId, VerificationToken,
    VerificationTokenKey,
};

/// Direct lookups against the adapter's backing store.
///
/// Implementations must bypass the adapter under test: each method reads
/// what is actually persisted.
#[async_trait]
pub trait TestDatabase: Send + Sync {
    async fn user(&self, id: &str) -> anyhow::Result<Option<AdapterUser>>;

    async fn account(&self, key: &ProviderAccountId) -> anyhow::Result<Option<AdapterAccount>>;

    async fn session(&self, session_token: &str) -> anyhow::Result<Option<AdapterSession>>;

    async fn verification_token(
        &self,
        key: &VerificationTokenKey,
    ) -> anyhow::Result<Option<VerificationToken>>;
}
