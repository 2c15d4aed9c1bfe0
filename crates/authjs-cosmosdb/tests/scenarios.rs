// End-to-end sign-in flows and the stored document shapes they leave behind.

mod common;

use chrono::{Duration, TimeZone, Utc};
use serde_json::json;

use authjs_core::{
    AccountType, Adapter, AdapterAccount, AdapterSession, NewUser, SessionPatch, UserPatch,
    VerificationToken, VerificationTokenKey,
};
use authjs_cosmosdb::memory::MemoryStore;

use common::memory_adapter;

async fn raw(store: &MemoryStore, container: &str) -> Vec<serde_json::Value> {
    store
        .raw_items("auth", container)
        .await
        .into_iter()
        .map(serde_json::Value::Object)
        .collect()
}

#[tokio::test]
async fn test_oauth_sign_in_flow() -> anyhow::Result<()> {
    let (_store, adapter) = memory_adapter();
    let key = authjs_core::ProviderAccountId::new("github", "gh-42");

    // First sign-in: unknown account, new user.
    assert!(adapter.get_user_by_account(&key).await?.is_none());
    let user = adapter
        .create_user(NewUser::new("octo@example.com").with_name("Octo"))
        .await?;
    adapter
        .link_account(AdapterAccount::new(&user.id, AccountType::Oauth, "github", "gh-42"))
        .await?;
    let expires = Utc::now() + Duration::days(30);
    let session = adapter
        .create_session(AdapterSession::new("sess-1", &user.id, expires))
        .await?;

    // Returning visit.
    assert_eq!(adapter.get_user_by_account(&key).await?.map(|u| u.id), Some(user.id.clone()));
    let current = adapter.get_session_and_user(&session.session_token).await?.unwrap();
    assert_eq!(current.user.name.as_deref(), Some("Octo"));

    // Sign out.
    adapter.delete_session(&session.session_token).await?;
    assert!(adapter.get_session_and_user("sess-1").await?.is_none());
    Ok(())
}

#[tokio::test]
async fn test_email_sign_in_flow() -> anyhow::Result<()> {
    let (_store, adapter) = memory_adapter();
    let user = adapter.create_user(NewUser::new("mail@example.com")).await?;
    assert!(user.email_verified.is_none());

    for token in ["first", "second"] {
        adapter
            .create_verification_token(VerificationToken::new(
                "mail@example.com",
                token,
                Utc::now() + Duration::hours(1),
            ))
            .await?;
    }

    let verified = adapter
        .use_verification_token(&VerificationTokenKey::new("mail@example.com", "second"))
        .await?
        .unwrap();
    assert!(verified.email_verified.is_some());

    // The other token for the same identifier is untouched.
    assert!(adapter
        .use_verification_token(&VerificationTokenKey::new("mail@example.com", "first"))
        .await?
        .is_some());
    Ok(())
}

#[tokio::test]
async fn test_user_can_hold_several_sessions() -> anyhow::Result<()> {
    let (_store, adapter) = memory_adapter();
    let user = adapter.create_user(NewUser::new("a@b.com")).await?;
    let expires = Utc.with_ymd_and_hms(2040, 1, 1, 0, 0, 0).unwrap();
    for token in ["laptop", "phone"] {
        adapter
            .create_session(AdapterSession::new(token, &user.id, expires))
            .await?;
    }

    adapter.delete_session("laptop").await?;
    assert!(adapter.get_session_and_user("laptop").await?.is_none());
    assert!(adapter.get_session_and_user("phone").await?.is_some());
    Ok(())
}

#[tokio::test]
async fn test_stored_user_shape() -> anyhow::Result<()> {
    let (store, adapter) = memory_adapter();
    let user = adapter
        .create_user(NewUser::new("a@b.com").with_name("Alice"))
        .await?;
    let verified_at = Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap();
    adapter
        .update_user(UserPatch::new(&user.id).email_verified(Some(verified_at)))
        .await?;

    let docs = raw(&store, "users").await;
    let doc = &docs[0];
    assert_eq!(doc["id"], json!(user.id));
    assert_eq!(doc["email"], "a@b.com");
    assert_eq!(doc["emailVerified"], "2024-05-06T07:08:09.000Z");
    assert!(doc["_etag"].is_string());
    assert!(doc["_ts"].is_number());
    Ok(())
}

#[tokio::test]
async fn test_stored_session_uses_token_as_id() -> anyhow::Result<()> {
    let (store, adapter) = memory_adapter();
    let expires = Utc.with_ymd_and_hms(2040, 1, 1, 0, 0, 0).unwrap();
    adapter
        .create_session(AdapterSession::new("tok-abc", "u1", expires))
        .await?;
    adapter
        .update_session(SessionPatch::new("tok-abc").expires(expires + Duration::days(1)))
        .await?;

    let docs = raw(&store, "sessions").await;
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0]["id"], "tok-abc");
    assert_eq!(docs[0]["sessionToken"], "tok-abc");
    assert_eq!(docs[0]["userId"], "u1");
    assert_eq!(docs[0]["expires"], "2040-01-02T00:00:00.000Z");
    Ok(())
}

#[tokio::test]
async fn test_stored_account_shape() -> anyhow::Result<()> {
    let (store, adapter) = memory_adapter();
    let mut account = AdapterAccount::new("u1", AccountType::Oidc, "google", "g-7");
    account.id_token = Some("jwt".into());
    account.expires_at = Some(1_900_000_000);
    adapter.link_account(account).await?;

    let docs = raw(&store, "accounts").await;
    let doc = &docs[0];
    assert!(doc["id"].is_string());
    assert_eq!(doc["userId"], "u1");
    assert_eq!(doc["type"], "oidc");
    assert_eq!(doc["providerAccountId"], "g-7");
    assert_eq!(doc["id_token"], "jwt");
    assert_eq!(doc["expires_at"], 1_900_000_000);
    Ok(())
}

#[tokio::test]
async fn test_deleting_user_leaves_dependents() -> anyhow::Result<()> {
    let (store, adapter) = memory_adapter();
    let user = adapter.create_user(NewUser::new("a@b.com")).await?;
    adapter
        .link_account(AdapterAccount::new(&user.id, AccountType::Oauth, "github", "gh-1"))
        .await?;
    adapter
        .create_session(AdapterSession::new("tok1", &user.id, Utc::now() + Duration::days(1)))
        .await?;

    adapter.delete_user(&user.id).await?;
    assert_eq!(store.item_count("auth", "accounts").await, 1);
    assert_eq!(store.item_count("auth", "sessions").await, 1);

    // Dangling references resolve to nothing.
    let key = authjs_core::ProviderAccountId::new("github", "gh-1");
    assert!(adapter.get_user_by_account(&key).await?.is_none());
    assert!(adapter.get_session_and_user("tok1").await?.is_none());
    Ok(())
}

#[tokio::test]
async fn test_extra_user_fields_round_trip() -> anyhow::Result<()> {
    let (_store, adapter) = memory_adapter();
    let mut new_user = NewUser::new("a@b.com");
    new_user.extra.insert("plan".into(), json!("pro"));
    new_user.extra.insert("joined".into(), json!("2020-01-01T00:00:00.000Z"));
    let user = adapter.create_user(new_user).await?;

    let found = adapter.get_user(&user.id).await?.unwrap();
    assert_eq!(found.extra["plan"], "pro");
    // Date-looking strings in extra fields stay strings.
    assert_eq!(found.extra["joined"], "2020-01-01T00:00:00.000Z");
    Ok(())
}

#[tokio::test]
async fn test_session_extra_fields_survive_update() -> anyhow::Result<()> {
    let (store, adapter) = memory_adapter();
    let expires = Utc.with_ymd_and_hms(2040, 1, 1, 0, 0, 0).unwrap();
    adapter
        .create_session(
            AdapterSession::new("tok1", "u1", expires)
                .with_field("deviceName", "laptop")
                .with_field("ip", "203.0.113.7"),
        )
        .await?;

    let updated = adapter
        .update_session(SessionPatch::new("tok1").expires(expires + Duration::days(1)))
        .await?;
    assert_eq!(updated.extra["deviceName"], "laptop");
    assert_eq!(updated.extra["ip"], "203.0.113.7");

    let docs = raw(&store, "sessions").await;
    assert_eq!(docs[0]["deviceName"], "laptop");
    assert_eq!(docs[0]["ip"], "203.0.113.7");
    Ok(())
}

#[tokio::test]
async fn test_account_extra_fields_round_trip() -> anyhow::Result<()> {
    let (store, adapter) = memory_adapter();
    let user = adapter.create_user(NewUser::new("a@b.com")).await?;
    let mut account = AdapterAccount::new(&user.id, AccountType::Oauth, "github", "gh-9");
    account
        .extra
        .insert("refresh_token_expires_in".into(), json!(15_897_600));

    let linked = adapter.link_account(account).await?;
    assert_eq!(linked.extra["refresh_token_expires_in"], 15_897_600);

    let docs = raw(&store, "accounts").await;
    assert_eq!(docs[0]["refresh_token_expires_in"], 15_897_600);
    Ok(())
}
