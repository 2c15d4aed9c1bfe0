// Entity records exchanged between the authentication framework and an adapter.
//
// Field names on the wire follow the framework's adapter contract:
// camelCase for the core fields, snake_case for the OAuth token fields of an
// account (they are copied verbatim from the provider's token response).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::date::iso8601;
use crate::utils::patch::double_option;

/// Open map of additional fields the framework or the application attaches.
pub type ExtraFields = serde_json::Map<String, serde_json::Value>;

/// A user as stored by the adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdapterUser {
    pub id: String,
    pub email: String,
    /// When the email address was verified, `None` while unverified.
    #[serde(default, with = "iso8601::option")]
    pub email_verified: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

/// Input for `create_user`. The id is assigned when absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub email: String,
    #[serde(default, with = "iso8601::option")]
    pub email_verified: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl NewUser {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            ..Default::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }
}

/// Partial user for `update_user`. Only the fields that are set are written.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "iso8601::patch"
    )]
    pub email_verified: Option<Option<DateTime<Utc>>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "double_option"
    )]
    pub name: Option<Option<String>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "double_option"
    )]
    pub image: Option<Option<String>>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl UserPatch {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn email_verified(mut self, at: Option<DateTime<Utc>>) -> Self {
        self.email_verified = Some(at);
        self
    }

    pub fn name(mut self, name: Option<String>) -> Self {
        self.name = Some(name);
        self
    }

    pub fn image(mut self, image: Option<String>) -> Self {
        self.image = Some(image);
        self
    }
}

/// How an account authenticates the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Oauth,
    Oidc,
    Email,
    Webauthn,
}

/// A provider account linked to a user.
///
/// `(provider, provider_account_id)` identifies the account; keeping that
/// pair unique is the application's job, the store does not enforce it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdapterAccount {
    /// Document id, assigned on `link_account` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub user_id: String,
    #[serde(rename = "type")]
    pub account_type: AccountType,
    pub provider: String,
    pub provider_account_id: String,
    #[serde(rename = "refresh_token", default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(rename = "access_token", default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    /// Access token expiry in seconds since the epoch. Stored as a number.
    #[serde(rename = "expires_at", default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    #[serde(rename = "token_type", default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(rename = "id_token", default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    #[serde(rename = "session_state", default, skip_serializing_if = "Option::is_none")]
    pub session_state: Option<String>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl AdapterAccount {
    pub fn new(
        user_id: impl Into<String>,
        account_type: AccountType,
        provider: impl Into<String>,
        provider_account_id: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            user_id: user_id.into(),
            account_type,
            provider: provider.into(),
            provider_account_id: provider_account_id.into(),
            refresh_token: None,
            access_token: None,
            expires_at: None,
            token_type: None,
            scope: None,
            id_token: None,
            session_state: None,
            extra: ExtraFields::new(),
        }
    }

    /// The compound key the framework looks accounts up by.
    pub fn key(&self) -> ProviderAccountId {
        ProviderAccountId::new(&self.provider, &self.provider_account_id)
    }
}

/// Lookup key for an account.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderAccountId {
    pub provider: String,
    pub provider_account_id: String,
}

impl ProviderAccountId {
    pub fn new(provider: impl Into<String>, provider_account_id: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            provider_account_id: provider_account_id.into(),
        }
    }
}

/// A database session. The token is the lookup key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdapterSession {
    pub session_token: String,
    pub user_id: String,
    #[serde(with = "iso8601")]
    pub expires: DateTime<Utc>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl AdapterSession {
    pub fn new(
        session_token: impl Into<String>,
        user_id: impl Into<String>,
        expires: DateTime<Utc>,
    ) -> Self {
        Self {
            session_token: session_token.into(),
            user_id: user_id.into(),
            expires,
            extra: ExtraFields::new(),
        }
    }

    pub fn with_field(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

/// Partial session for `update_session`, addressed by its token.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionPatch {
    pub session_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "iso8601::option"
    )]
    pub expires: Option<DateTime<Utc>>,
    /// Additional fields to set; fields not named here are left alone.
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl SessionPatch {
    pub fn new(session_token: impl Into<String>) -> Self {
        Self {
            session_token: session_token.into(),
            ..Default::default()
        }
    }

    pub fn expires(mut self, expires: DateTime<Utc>) -> Self {
        self.expires = Some(expires);
        self
    }

    pub fn field(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

/// Result of `get_session_and_user`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionAndUser {
    pub session: AdapterSession,
    pub user: AdapterUser,
}

/// A single-use token proving control of `identifier` (an email address).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationToken {
    pub identifier: String,
    pub token: String,
    #[serde(with = "iso8601")]
    pub expires: DateTime<Utc>,
}

impl VerificationToken {
    pub fn new(
        identifier: impl Into<String>,
        token: impl Into<String>,
        expires: DateTime<Utc>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            token: token.into(),
            expires,
        }
    }

    pub fn key(&self) -> VerificationTokenKey {
        VerificationTokenKey {
            identifier: self.identifier.clone(),
            token: self.token.clone(),
        }
    }
}

/// Lookup key for `use_verification_token`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VerificationTokenKey {
    pub identifier: String,
    pub token: String,
}

impl VerificationTokenKey {
    pub fn new(identifier: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            token: token.into(),
        }
    }
}
