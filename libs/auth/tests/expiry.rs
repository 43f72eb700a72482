//! Expiry behavior across simulated requests
//!
//! Sliding and absolute timeouts are exercised against a manual clock:
//! each "request" is a fresh manager bound to the session ID the previous
//! request ended with, exactly as a browser would replay its cookie.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use common::clock::Clock;
use serde_json::json;

use auth::{
    AuthConfig, AuthSessionManager, Identity, IdentityStore, KeyValueSession, MemoryCookieJar,
    session::{ABSOLUTE_EXPIRE_KEY, EXPIRE_KEY, ID_KEY},
};
use common::{clock::ManualClock, memory::MemoryStore};

const SLIDING_TIMEOUT: i64 = 600;
const ABSOLUTE_TIMEOUT: i64 = 1000;

struct TestUser {
    id: String,
    auth_key: String,
}

impl Identity for TestUser {
    fn id(&self) -> &str {
        &self.id
    }

    fn auth_key(&self) -> &str {
        &self.auth_key
    }
}

struct SingleUser(Arc<TestUser>);

#[async_trait]
impl IdentityStore for SingleUser {
    async fn find_by_id(&self, id: &str) -> Result<Option<Arc<dyn Identity>>> {
        Ok((self.0.id == id).then(|| self.0.clone() as Arc<dyn Identity>))
    }

    async fn find_by_token(
        &self,
        _token: &str,
        _token_type: &str,
    ) -> Result<Option<Arc<dyn Identity>>> {
        Ok(None)
    }
}

struct Fixture {
    store: Arc<MemoryStore>,
    directory: Arc<SingleUser>,
    clock: Arc<ManualClock>,
    config: AuthConfig,
    user: Arc<TestUser>,
}

impl Fixture {
    fn new(config: AuthConfig) -> Self {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        let user = Arc::new(TestUser {
            id: "user-a".to_string(),
            auth_key: "key-a".to_string(),
        });
        Self {
            store: Arc::new(MemoryStore::new()),
            directory: Arc::new(SingleUser(user.clone())),
            clock: Arc::new(ManualClock::new(Utc::now())),
            config,
            user,
        }
    }

    /// Start a simulated request, replaying the given session ID
    async fn request(&self, session_id: Option<&str>) -> Result<AuthSessionManager> {
        let mut session = KeyValueSession::new(self.store.clone());
        if let Some(id) = session_id {
            session.open(Some(id)).await?;
        }
        Ok(AuthSessionManager::new(
            self.config.clone(),
            self.directory.clone(),
            session,
            Arc::new(MemoryCookieJar::new()),
        )?
        .with_clock(self.clock.clone()))
    }

    /// End a simulated request, returning the session ID the client keeps
    async fn finish(&self, manager: &mut AuthSessionManager) -> Result<String> {
        let id = manager
            .session()
            .id()
            .expect("session id missing")
            .to_string();
        manager.session_mut().close().await?;
        Ok(id)
    }
}

fn sliding_config() -> AuthConfig {
    AuthConfig {
        auth_timeout: Some(SLIDING_TIMEOUT),
        ..AuthConfig::default()
    }
}

#[tokio::test]
async fn test_sliding_timeout_expires_after_inactivity() -> Result<()> {
    let fixture = Fixture::new(sliding_config());

    // Request 1: log in and stash unrelated session data
    let mut manager = fixture.request(None).await?;
    assert!(manager.login(fixture.user.clone(), 0).await?);
    manager.session_mut().set("theme", json!("dark")).await?;
    let session_id = fixture.finish(&mut manager).await?;

    fixture.clock.advance(SLIDING_TIMEOUT + 1);

    // Request 2: the identity is gone, the rest of the session is not
    let mut manager = fixture.request(Some(&session_id)).await?;
    assert!(manager.current().await?.is_none());
    assert_eq!(manager.session_mut().get(ID_KEY).await?, None);
    assert_eq!(manager.session_mut().get(EXPIRE_KEY).await?, None);
    assert_eq!(
        manager.session_mut().get("theme").await?,
        Some(json!("dark")),
        "soft logout destroyed unrelated session data"
    );

    Ok(())
}

#[tokio::test]
async fn test_sliding_timeout_slides_on_access() -> Result<()> {
    let fixture = Fixture::new(sliding_config());

    let mut manager = fixture.request(None).await?;
    assert!(manager.login(fixture.user.clone(), 0).await?);
    let session_id = fixture.finish(&mut manager).await?;

    fixture.clock.advance(SLIDING_TIMEOUT - 1);

    // Request 2: still authenticated, and the marker moved forward
    let mut manager = fixture.request(Some(&session_id)).await?;
    let current = manager.current().await?.expect("identity expired early");
    assert_eq!(current.id(), "user-a");

    let expected = fixture.clock.now().timestamp() + SLIDING_TIMEOUT;
    assert_eq!(
        manager.session_mut().get(EXPIRE_KEY).await?,
        Some(json!(expected))
    );

    Ok(())
}

#[tokio::test]
async fn test_repeated_activity_keeps_sliding_session_alive() -> Result<()> {
    let fixture = Fixture::new(sliding_config());

    let mut manager = fixture.request(None).await?;
    assert!(manager.login(fixture.user.clone(), 0).await?);
    let mut session_id = fixture.finish(&mut manager).await?;

    // Three touches, each inside the window, spanning more than one window
    for _ in 0..3 {
        fixture.clock.advance(SLIDING_TIMEOUT - 10);
        let mut manager = fixture.request(Some(&session_id)).await?;
        assert!(manager.current().await?.is_some(), "session expired despite activity");
        session_id = fixture.finish(&mut manager).await?;
    }

    Ok(())
}

#[tokio::test]
async fn test_absolute_timeout_is_never_refreshed() -> Result<()> {
    let fixture = Fixture::new(AuthConfig {
        absolute_auth_timeout: Some(ABSOLUTE_TIMEOUT),
        ..AuthConfig::default()
    });

    let mut manager = fixture.request(None).await?;
    let login_at = fixture.clock.now().timestamp();
    assert!(manager.login(fixture.user.clone(), 0).await?);
    let session_id = fixture.finish(&mut manager).await?;

    // An access inside the window leaves the marker untouched
    fixture.clock.advance(600);
    let mut manager = fixture.request(Some(&session_id)).await?;
    assert!(manager.current().await?.is_some());
    assert_eq!(
        manager.session_mut().get(ABSOLUTE_EXPIRE_KEY).await?,
        Some(json!(login_at + ABSOLUTE_TIMEOUT))
    );
    let session_id = fixture.finish(&mut manager).await?;

    // Recent activity does not help once the absolute deadline passes
    fixture.clock.advance(500);
    let mut manager = fixture.request(Some(&session_id)).await?;
    assert!(manager.current().await?.is_none());

    Ok(())
}

#[tokio::test]
async fn test_both_timeouts_sliding_expiry_wins_first() -> Result<()> {
    let fixture = Fixture::new(AuthConfig {
        auth_timeout: Some(SLIDING_TIMEOUT),
        absolute_auth_timeout: Some(ABSOLUTE_TIMEOUT),
        ..AuthConfig::default()
    });

    let mut manager = fixture.request(None).await?;
    assert!(manager.login(fixture.user.clone(), 0).await?);
    let session_id = fixture.finish(&mut manager).await?;

    // Idle past the sliding window but inside the absolute one
    fixture.clock.advance(SLIDING_TIMEOUT + 1);
    let mut manager = fixture.request(Some(&session_id)).await?;
    assert!(manager.current().await?.is_none());

    Ok(())
}

#[tokio::test]
async fn test_expired_marker_triggers_guest_without_hard_error() -> Result<()> {
    // Direct marker manipulation: a session whose markers already lapsed
    // resolves to Guest, not to an error
    let fixture = Fixture::new(sliding_config());

    let mut session = KeyValueSession::new(fixture.store.clone());
    session.open(Some("stale")).await?;
    session.set(ID_KEY, json!("user-a")).await?;
    session
        .set(EXPIRE_KEY, json!(fixture.clock.now().timestamp() - 5))
        .await?;
    session.close().await?;

    let mut manager = fixture.request(Some("stale")).await?;
    assert!(manager.current().await?.is_none());
    assert!(manager.is_guest().await?);

    Ok(())
}
