// Basic adapter scenario.
//
// One user walks through the whole lifecycle: created, looked up every
// way, linked to an account, given a session, verified by email token,
// then torn down. Every write is confirmed through `TestDatabase`, every
// read against what the database holds.

use std::future::Future;
use std::time::Instant;

use anyhow::{bail, ensure, Context};
use chrono::Duration;

use authjs_core::db::adapter::Adapter;
use authjs_core::db::models::{
    AdapterAccount, AdapterSession, AdapterUser, SessionPatch, UserPatch, VerificationTokenKey,
};

use crate::database::TestDatabase;
use crate::generators::{
    generate_test_account, generate_test_session, generate_test_user,
    generate_test_verification_token,
};

/// A check that passed, with its timing.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckRecord {
    pub name: String,
    pub duration_ms: f64,
}

/// Outcome of a passing suite run.
#[derive(Debug, Clone)]
pub struct SuiteStats {
    pub suite_name: String,
    pub checks: Vec<CheckRecord>,
    pub duration_ms: f64,
}

impl SuiteStats {
    pub fn test_count(&self) -> usize {
        self.checks.len()
    }

    /// The slowest check, useful when a backend regresses.
    pub fn slowest(&self) -> Option<&CheckRecord> {
        self.checks
            .iter()
            .max_by(|a, b| a.duration_ms.total_cmp(&b.duration_ms))
    }
}

struct Suite {
    stats: SuiteStats,
    started: Instant,
}

impl Suite {
    fn new(name: &str) -> Self {
        Self {
            stats: SuiteStats {
                suite_name: name.to_string(),
                checks: Vec::new(),
                duration_ms: 0.0,
            },
            started: Instant::now(),
        }
    }

    async fn check<T>(
        &mut self,
        name: &str,
        test: impl Future<Output = anyhow::Result<T>>,
    ) -> anyhow::Result<T> {
        let started = Instant::now();
        let result = test.await;
        let duration_ms = started.elapsed().as_secs_f64() * 1000.0;

        let suite = &self.stats.suite_name;
        match result {
            Ok(value) => {
                tracing::info!("[{suite}] ✓ {name} ({duration_ms:.2}ms)");
                self.stats.checks.push(CheckRecord {
                    name: name.to_string(),
                    duration_ms,
                });
                Ok(value)
            }
            Err(err) => {
                tracing::error!("[{suite}] ✗ {name}: {err:#}");
                Err(err.context(format!("{suite} suite: {name}")))
            }
        }
    }

    fn finish(mut self) -> SuiteStats {
        self.stats.duration_ms = self.started.elapsed().as_secs_f64() * 1000.0;
        self.stats
    }
}

/// Run the basic scenario against `adapter`, verifying through `db`.
///
/// Stops at the first failing check; the error names it.
pub async fn run_basic_tests(
    adapter: &dyn Adapter,
    db: &dyn TestDatabase,
) -> anyhow::Result<SuiteStats> {
    let mut suite = Suite::new("basic");
    tracing::info!("[{}] starting", suite.stats.suite_name);

    let user = suite.check("createUser", create_user(adapter, db)).await?;
    suite.check("getUser", get_user(adapter, &user)).await?;
    suite
        .check("getUserByEmail", get_user_by_email(adapter, &user))
        .await?;
    let user = suite.check("updateUser", update_user(adapter, db, &user)).await?;

    let account = suite.check("linkAccount", link_account(adapter, db, &user)).await?;
    suite
        .check("getUserByAccount", get_user_by_account(adapter, &user, &account))
        .await?;

    let session = suite.check("createSession", create_session(adapter, db, &user)).await?;
    suite
        .check("getSessionAndUser", get_session_and_user(adapter, &user, &session))
        .await?;
    suite
        .check("updateSession", update_session(adapter, db, &session))
        .await?;

    suite
        .check("useVerificationToken", use_verification_token(adapter, db, &user))
        .await?;

    suite
        .check("deleteSession", delete_session(adapter, db, &session))
        .await?;
    suite
        .check("unlinkAccount", unlink_account(adapter, db, &account))
        .await?;
    suite.check("deleteUser", delete_user(adapter, db, &user)).await?;

    let stats = suite.finish();
    tracing::info!(
        "[{}] {} checks passed in {:.2}ms",
        stats.suite_name,
        stats.test_count(),
        stats.duration_ms
    );
    Ok(stats)
}

async fn create_user(adapter: &dyn Adapter, db: &dyn TestDatabase) -> anyhow::Result<AdapterUser> {
    let new_user = generate_test_user();
    let user = adapter.create_user(new_user.clone()).await?;

    ensure!(!user.id.is_empty(), "created user has no id");
    ensure!(user.email == new_user.email, "email not kept");
    ensure!(user.name == new_user.name, "name not kept");
    ensure!(user.email_verified.is_none(), "new user is already verified");

    let stored = db.user(&user.id).await?.context("user was not persisted")?;
    ensure!(stored == user, "stored user {stored:?} differs from {user:?}");
    Ok(user)
}

async fn get_user(adapter: &dyn Adapter, user: &AdapterUser) -> anyhow::Result<()> {
    let found = adapter.get_user(&user.id).await?;
    ensure!(found.as_ref() == Some(user), "getUser returned {found:?}");

    let missing = adapter.get_user(&uuid::Uuid::new_v4().to_string()).await?;
    ensure!(missing.is_none(), "unknown id returned {missing:?}");
    Ok(())
}

async fn get_user_by_email(adapter: &dyn Adapter, user: &AdapterUser) -> anyhow::Result<()> {
    let found = adapter.get_user_by_email(&user.email).await?;
    ensure!(found.as_ref() == Some(user), "getUserByEmail returned {found:?}");

    let missing = adapter.get_user_by_email("nobody@example.invalid").await?;
    ensure!(missing.is_none(), "unknown email returned {missing:?}");
    Ok(())
}

async fn update_user(
    adapter: &dyn Adapter,
    db: &dyn TestDatabase,
    user: &AdapterUser,
) -> anyhow::Result<AdapterUser> {
    let updated = adapter
        .update_user(UserPatch::new(&user.id).name(Some("Updated Name".into())))
        .await?;

    ensure!(updated.name.as_deref() == Some("Updated Name"), "name not updated");
    ensure!(updated.email == user.email, "email changed by unrelated patch");
    ensure!(updated.image == user.image, "image changed by unrelated patch");

    let stored = db.user(&user.id).await?.context("user vanished")?;
    ensure!(stored == updated, "stored user {stored:?} differs from {updated:?}");
    Ok(updated)
}

async fn link_account(
    adapter: &dyn Adapter,
    db: &dyn TestDatabase,
    user: &AdapterUser,
) -> anyhow::Result<AdapterAccount> {
    let account = generate_test_account(&user.id);
    let linked = adapter.link_account(account.clone()).await?;

    ensure!(linked.user_id == user.id, "account linked to wrong user");
    ensure!(linked.access_token == account.access_token, "tokens not kept");
    ensure!(linked.expires_at == account.expires_at, "expires_at not kept");

    let stored = db
        .account(&account.key())
        .await?
        .context("account was not persisted")?;
    ensure!(stored == linked, "stored account {stored:?} differs from {linked:?}");
    Ok(linked)
}

async fn get_user_by_account(
    adapter: &dyn Adapter,
    user: &AdapterUser,
    account: &AdapterAccount,
) -> anyhow::Result<()> {
    let found = adapter.get_user_by_account(&account.key()).await?;
    ensure!(found.as_ref() == Some(user), "getUserByAccount returned {found:?}");

    let mut other = account.key();
    other.provider_account_id = uuid::Uuid::new_v4().to_string();
    let missing = adapter.get_user_by_account(&other).await?;
    ensure!(missing.is_none(), "unknown account returned {missing:?}");
    Ok(())
}

async fn create_session(
    adapter: &dyn Adapter,
    db: &dyn TestDatabase,
    user: &AdapterUser,
) -> anyhow::Result<AdapterSession> {
    let session = generate_test_session(&user.id);
    let created = adapter.create_session(session.clone()).await?;
    ensure!(created == session, "createSession returned {created:?}");

    let stored = db
        .session(&session.session_token)
        .await?
        .context("session was not persisted")?;
    ensure!(stored == session, "stored session {stored:?} differs from {session:?}");
    Ok(created)
}

async fn get_session_and_user(
    adapter: &dyn Adapter,
    user: &AdapterUser,
    session: &AdapterSession,
) -> anyhow::Result<()> {
    let Some(found) = adapter.get_session_and_user(&session.session_token).await? else {
        bail!("session not found by token");
    };
    ensure!(&found.session == session, "session differs: {:?}", found.session);
    ensure!(&found.user == user, "user differs: {:?}", found.user);

    let missing = adapter
        .get_session_and_user(&uuid::Uuid::new_v4().to_string())
        .await?;
    ensure!(missing.is_none(), "unknown token returned {missing:?}");
    Ok(())
}

async fn update_session(
    adapter: &dyn Adapter,
    db: &dyn TestDatabase,
    session: &AdapterSession,
) -> anyhow::Result<()> {
    let expires = session.expires + Duration::days(7);
    let updated = adapter
        .update_session(SessionPatch::new(&session.session_token).expires(expires))
        .await?;

    ensure!(updated.expires == expires, "expiry not updated");
    ensure!(updated.user_id == session.user_id, "session changed owner");
    ensure!(updated.session_token == session.session_token, "token changed");
    ensure!(
        updated.extra == session.extra,
        "extra session fields lost: {:?} became {:?}",
        session.extra,
        updated.extra
    );

    let stored = db
        .session(&session.session_token)
        .await?
        .context("session vanished")?;
    ensure!(stored == updated, "stored session {stored:?} differs from {updated:?}");
    Ok(())
}

async fn use_verification_token(
    adapter: &dyn Adapter,
    db: &dyn TestDatabase,
    user: &AdapterUser,
) -> anyhow::Result<()> {
    let token = generate_test_verification_token(&user.email);
    let created = adapter.create_verification_token(token.clone()).await?;
    ensure!(created == token, "createVerificationToken returned {created:?}");
    ensure!(
        db.verification_token(&token.key()).await?.is_some(),
        "verification token was not persisted"
    );

    let wrong = VerificationTokenKey::new(&token.identifier, "not-the-token");
    ensure!(
        adapter.use_verification_token(&wrong).await?.is_none(),
        "wrong token was accepted"
    );

    let verified = adapter
        .use_verification_token(&token.key())
        .await?
        .context("valid token was rejected")?;
    ensure!(verified.id == user.id, "token verified the wrong user");
    ensure!(verified.email_verified.is_some(), "emailVerified not set");

    ensure!(
        db.verification_token(&token.key()).await?.is_none(),
        "verification token was not consumed"
    );
    let stored = db.user(&user.id).await?.context("user vanished")?;
    ensure!(
        stored.email_verified == verified.email_verified,
        "emailVerified not persisted"
    );

    ensure!(
        adapter.use_verification_token(&token.key()).await?.is_none(),
        "token was usable twice"
    );
    Ok(())
}

async fn delete_session(
    adapter: &dyn Adapter,
    db: &dyn TestDatabase,
    session: &AdapterSession,
) -> anyhow::Result<()> {
    adapter.delete_session(&session.session_token).await?;
    ensure!(
        db.session(&session.session_token).await?.is_none(),
        "session still stored"
    );
    adapter
        .delete_session(&session.session_token)
        .await
        .context("deleting an absent session should be a no-op")?;
    Ok(())
}

async fn unlink_account(
    adapter: &dyn Adapter,
    db: &dyn TestDatabase,
    account: &AdapterAccount,
) -> anyhow::Result<()> {
    adapter.unlink_account(&account.key()).await?;
    ensure!(
        db.account(&account.key()).await?.is_none(),
        "account still stored"
    );
    ensure!(
        adapter.get_user_by_account(&account.key()).await?.is_none(),
        "unlinked account still resolves to a user"
    );
    adapter
        .unlink_account(&account.key())
        .await
        .context("unlinking an absent account should be a no-op")?;
    Ok(())
}

async fn delete_user(
    adapter: &dyn Adapter,
    db: &dyn TestDatabase,
    user: &AdapterUser,
) -> anyhow::Result<()> {
    adapter.delete_user(&user.id).await?;
    ensure!(db.user(&user.id).await?.is_none(), "user still stored");
    ensure!(
        adapter.get_user(&user.id).await?.is_none(),
        "deleted user still readable"
    );
    adapter
        .delete_user(&user.id)
        .await
        .context("deleting an absent user should be a no-op")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_check_records_passing_checks() {
        let mut suite = Suite::new("unit");
        let value = suite.check("first", async { Ok(7) }).await.unwrap();
        suite.check("second", async { Ok(()) }).await.unwrap();
        assert_eq!(value, 7);

        let stats = suite.finish();
        assert_eq!(stats.suite_name, "unit");
        assert_eq!(stats.test_count(), 2);
        let names: Vec<_> = stats.checks.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["first", "second"]);
        assert!(stats.slowest().is_some());
    }

    #[tokio::test]
    async fn test_check_names_the_failing_step() {
        let mut suite = Suite::new("unit");
        let err = suite
            .check("broken", async { Err::<(), _>(anyhow::anyhow!("boom")) })
            .await
            .unwrap_err();
        let message = format!("{err:#}");
        assert!(message.contains("unit suite: broken"));
        assert!(message.contains("boom"));
        assert_eq!(suite.finish().test_count(), 0);
    }
}
