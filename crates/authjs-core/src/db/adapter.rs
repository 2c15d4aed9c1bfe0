// Database adapter trait: the contract the authentication framework calls
// to persist users, linked accounts, sessions and verification tokens.
//
// Every backend implements this trait. Absence is reported as `Ok(None)`;
// errors are reserved for missing records a mutation depends on, bad
// configuration and store failures.

use std::fmt;

use async_trait::async_trait;

use crate::db::models::{
    AdapterAccount, AdapterSession, AdapterUser, NewUser, ProviderAccountId, SessionAndUser,
    SessionPatch, UserPatch, VerificationToken, VerificationTokenKey,
};
use crate::error::AdapterResult;

/// The persistence adapter contract.
///
/// None of the operations retry or run inside a multi-document transaction;
/// operations made of several store calls can be observed half-applied if
/// they fail part way.
#[async_trait]
pub trait Adapter: Send + Sync + fmt::Debug {
    /// Store a new user and return it with its assigned id.
    async fn create_user(&self, user: NewUser) -> AdapterResult<AdapterUser>;

    /// Point read by id.
    async fn get_user(&self, id: &str) -> AdapterResult<Option<AdapterUser>>;

    /// First user whose email matches exactly.
    async fn get_user_by_email(&self, email: &str) -> AdapterResult<Option<AdapterUser>>;

    /// Owner of the account identified by `(provider, provider_account_id)`.
    async fn get_user_by_account(
        &self,
        account: &ProviderAccountId,
    ) -> AdapterResult<Option<AdapterUser>>;

    /// Merge `patch` over the stored user and replace it.
    ///
    /// Fails with `AdapterError::NotFound` when the user does not exist.
    async fn update_user(&self, patch: UserPatch) -> AdapterResult<AdapterUser>;

    /// Remove the user. Accounts and sessions referencing it are left alone.
    async fn delete_user(&self, id: &str) -> AdapterResult<()>;

    /// Store a provider account for a user.
    async fn link_account(&self, account: AdapterAccount) -> AdapterResult<AdapterAccount>;

    /// Remove the first account matching the key, if any.
    async fn unlink_account(&self, account: &ProviderAccountId) -> AdapterResult<()>;

    async fn create_session(&self, session: AdapterSession) -> AdapterResult<AdapterSession>;

    /// The session for `session_token` together with its user.
    ///
    /// A session whose user no longer exists is reported as absent.
    async fn get_session_and_user(
        &self,
        session_token: &str,
    ) -> AdapterResult<Option<SessionAndUser>>;

    /// Merge `patch` over the stored session and replace it under its
    /// original token.
    async fn update_session(&self, patch: SessionPatch) -> AdapterResult<AdapterSession>;

    async fn delete_session(&self, session_token: &str) -> AdapterResult<()>;

    async fn create_verification_token(
        &self,
        token: VerificationToken,
    ) -> AdapterResult<VerificationToken>;

    /// Consume a verification token.
    ///
    /// Returns `None` when no token matches. On a match the user owning the
    /// identifier gets `email_verified` set to now, the token is deleted and
    /// the updated user is returned.
    async fn use_verification_token(
        &self,
        key: &VerificationTokenKey,
    ) -> AdapterResult<Option<AdapterUser>>;
}
