// Record generators. Every call yields fresh unique keys so tests can share
// one store without colliding.

use chrono::Duration;
use uuid::Uuid;

use authjs_core::db::models::{
    AccountType, AdapterAccount, AdapterSession, NewUser, VerificationToken,
};
use authjs_core::utils::now;

pub fn generate_test_user() -> NewUser {
    let tag = Uuid::new_v4().simple().to_string();
    NewUser::new(format!("user-{tag}@example.com"))
        .with_name("Test User")
        .with_image(format!("https://example.com/avatars/{tag}.png"))
}

/// OAuth account linked to `user_id`, with a token set that expires in an hour.
pub fn generate_test_account(user_id: &str) -> AdapterAccount {
    let mut account = AdapterAccount::new(
        user_id,
        AccountType::Oauth,
        "github",
        Uuid::new_v4().to_string(),
    );
    account.access_token = Some(format!("gho_{}", Uuid::new_v4().simple()));
    account.refresh_token = Some(format!("ghr_{}", Uuid::new_v4().simple()));
    account.expires_at = Some((now() + Duration::hours(1)).timestamp());
    account.token_type = Some("bearer".into());
    account.scope = Some("read:user user:email".into());
    account
        .extra
        .insert("refresh_token_expires_in".into(), 15_897_600.into());
    account
}

/// Session for `user_id` expiring in thirty days, with one app-defined field.
pub fn generate_test_session(user_id: &str) -> AdapterSession {
    AdapterSession::new(
        Uuid::new_v4().to_string(),
        user_id,
        now() + Duration::days(30),
    )
    .with_field("userAgent", "authjs-test-utils")
}

pub fn generate_test_verification_token(identifier: &str) -> VerificationToken {
    VerificationToken::new(
        identifier,
        Uuid::new_v4().simple().to_string(),
        now() + Duration::days(1),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_users_are_unique() {
        let a = generate_test_user();
        let b = generate_test_user();
        assert_ne!(a.email, b.email);
        assert!(a.id.is_none());
        assert!(a.email_verified.is_none());
    }

    #[test]
    fn test_account_belongs_to_user() {
        let account = generate_test_account("u1");
        assert_eq!(account.user_id, "u1");
        assert_eq!(account.account_type, AccountType::Oauth);
        assert!(account.id.is_none());
        assert!(account.expires_at.unwrap() > now().timestamp());
    }

    #[test]
    fn test_session_expires_in_future() {
        let session = generate_test_session("u1");
        assert!(session.expires > now());
        assert_eq!(session.extra["userAgent"], "authjs-test-utils");
        assert_ne!(session.session_token, generate_test_session("u1").session_token);
    }

    #[test]
    fn test_verification_token_identifier() {
        let token = generate_test_verification_token("a@b.com");
        assert_eq!(token.identifier, "a@b.com");
        assert!(!token.token.is_empty());
    }
}
