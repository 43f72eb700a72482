//! Auth session manager
//!
//! One [`AuthSessionManager`] exists per inbound request. It owns the
//! request's session handle and cookie jar, memoizes the resolved identity
//! for the rest of the request, and runs the Guest/Authenticated state
//! machine: `login`, `login_by_token`, `current`, `logout`,
//! `require_login`, `can`.
//!
//! Every identity switch goes through the internal `switch_identity`,
//! which regenerates the session ID (fixation defense), rewrites the
//! timeout markers, manages the persistent-login cookie, and triggers
//! CSRF token regeneration. The cancellation point is always the public
//! `login`/`logout`; `switch_identity` itself cannot be vetoed.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Value, json};
use tracing::{debug, info, warn};

use common::clock::{Clock, SystemClock};

use crate::access::AccessChecker;
use crate::config::AuthConfig;
use crate::cookies::{Cookie, CookieJar};
use crate::error::{AuthError, AuthResult};
use crate::events::{AuthEvents, EventOutcome, LoginEvent, LogoutEvent};
use crate::identity::{Identity, IdentityStore};
use crate::resolver::{IdentityResolver, TokenResolution};
use crate::session::{ABSOLUTE_EXPIRE_KEY, EXPIRE_KEY, ID_KEY, KeyValueSession, RETURN_URL_KEY};
use crate::token::PersistentLoginToken;

/// The request attributes `require_login` needs to decide between
/// remembering the destination and refusing outright
#[derive(Debug, Clone)]
pub struct RequestInfo {
    /// HTTP method of the request
    pub method: String,
    /// Originally requested URL
    pub url: String,
    /// Whether the request is an AJAX/validation sub-flow
    pub is_ajax: bool,
}

impl RequestInfo {
    /// Describe a request
    pub fn new(method: impl Into<String>, url: impl Into<String>, is_ajax: bool) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            is_ajax,
        }
    }
}

/// Per-request resolution cache
///
/// Once `resolved` is set the cached identity is authoritative for the
/// rest of the request; `login`/`logout` update it explicitly.
#[derive(Default)]
struct AuthState {
    identity: Option<Arc<dyn Identity>>,
    resolved: bool,
    access_cache: HashMap<String, bool>,
}

type CsrfHook = Box<dyn Fn() + Send + Sync>;

/// Orchestrates the authenticated state of one request
pub struct AuthSessionManager {
    config: AuthConfig,
    identities: Arc<dyn IdentityStore>,
    resolver: IdentityResolver,
    session: KeyValueSession,
    cookies: Arc<dyn CookieJar>,
    clock: Arc<dyn Clock>,
    events: AuthEvents,
    access_checker: Option<Arc<dyn AccessChecker>>,
    csrf_hook: Option<CsrfHook>,
    state: AuthState,
}

impl AuthSessionManager {
    /// Create a manager for one request.
    ///
    /// Fails fast on inconsistent configuration; configuration errors
    /// are startup errors, not per-request degradations.
    pub fn new(
        config: AuthConfig,
        identities: Arc<dyn IdentityStore>,
        session: KeyValueSession,
        cookies: Arc<dyn CookieJar>,
    ) -> AuthResult<Self> {
        config.validate()?;

        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let resolver = IdentityResolver::new(identities.clone(), clock.clone(), &config);

        Ok(Self {
            config,
            identities,
            resolver,
            session,
            cookies,
            clock,
            events: AuthEvents::new(),
            access_checker: None,
            csrf_hook: None,
            state: AuthState::default(),
        })
    }

    /// Replace the clock (used by tests to simulate time)
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.resolver = IdentityResolver::new(self.identities.clone(), clock.clone(), &self.config);
        self.clock = clock;
        self
    }

    /// Inject the permission evaluator behind `can()`
    pub fn with_access_checker(mut self, checker: Arc<dyn AccessChecker>) -> Self {
        self.access_checker = Some(checker);
        self
    }

    /// Register the hook invoked whenever the trust boundary changes
    pub fn with_csrf_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.csrf_hook = Some(Box::new(hook));
        self
    }

    /// Lifecycle event registries
    pub fn events_mut(&mut self) -> &mut AuthEvents {
        &mut self.events
    }

    /// The request's session handle
    pub fn session(&self) -> &KeyValueSession {
        &self.session
    }

    /// Mutable access to the session handle, e.g. for the pipeline to
    /// close it at the end of the request
    pub fn session_mut(&mut self) -> &mut KeyValueSession {
        &mut self.session
    }

    /// The identity of the current request, resolving it on first call.
    ///
    /// Resolution order: session, then (when auto login is enabled) the
    /// persistent-login cookie. The result is memoized; later calls in the
    /// same request never re-hit the stores.
    pub async fn current(&mut self) -> AuthResult<Option<Arc<dyn Identity>>> {
        if self.state.resolved {
            return Ok(self.state.identity.clone());
        }

        let mut identity = None;

        if self.config.enable_session {
            identity = self.resolver.resolve_from_session(&mut self.session).await?;
        }

        if identity.is_none() && self.config.enable_auto_login {
            identity = self.login_by_cookie().await?;
        }

        self.state.identity = identity.clone();
        self.state.resolved = true;

        Ok(identity)
    }

    /// Whether the current request is unauthenticated
    pub async fn is_guest(&mut self) -> AuthResult<bool> {
        Ok(self.current().await?.is_none())
    }

    /// ID of the current identity, if authenticated
    pub async fn id(&mut self) -> AuthResult<Option<String>> {
        Ok(self.current().await?.map(|identity| identity.id().to_string()))
    }

    /// Log the given identity in.
    ///
    /// `duration > 0` additionally issues a persistent-login cookie for
    /// that many seconds (when auto login is enabled). Returns whether the
    /// resulting state is Authenticated; a `before_login` veto leaves all
    /// state untouched and is not an error.
    pub async fn login(&mut self, identity: Arc<dyn Identity>, duration: i64) -> AuthResult<bool> {
        let event = LoginEvent {
            identity: identity.clone(),
            cookie_based: false,
            duration,
        };

        if self.events.fire_before_login(&event) == EventOutcome::Cancel {
            info!("login vetoed for {}", identity.id());
            return Ok(!self.is_guest().await?);
        }

        self.switch_identity(Some(identity.clone()), duration).await?;
        if duration > 0 {
            info!(
                "user {} logged in for {} seconds",
                identity.id(),
                duration
            );
        } else {
            info!("user {} logged in", identity.id());
        }
        self.events.fire_after_login(&event);

        Ok(!self.is_guest().await?)
    }

    /// Log in by a bearer token of the given type.
    ///
    /// Delegates to [`login`](Self::login) with `duration = 0` when the
    /// token matches an identity; a miss has no session or cookie side
    /// effects.
    pub async fn login_by_token(
        &mut self,
        token: &str,
        token_type: &str,
    ) -> AuthResult<Option<Arc<dyn Identity>>> {
        let identity = self
            .identities
            .find_by_token(token, token_type)
            .await
            .map_err(|e| AuthError::IdentityLookup(e.to_string()))?;

        match identity {
            Some(identity) => {
                if self.login(identity.clone(), 0).await? {
                    Ok(Some(identity))
                } else {
                    Ok(None)
                }
            }
            None => {
                warn!("bearer token of type {} matched no identity", token_type);
                Ok(None)
            }
        }
    }

    /// Log the current identity out.
    ///
    /// With `destroy_session_data` the whole session is destroyed, not
    /// just the auth keys. A no-op when already Guest. Returns whether the
    /// resulting state is Guest.
    pub async fn logout(&mut self, destroy_session_data: bool) -> AuthResult<bool> {
        let identity = match self.current().await? {
            Some(identity) => identity,
            None => return Ok(true),
        };

        let event = LogoutEvent {
            identity: identity.clone(),
        };

        if self.events.fire_before_logout(&event) == EventOutcome::Cancel {
            info!("logout vetoed for {}", identity.id());
            return Ok(false);
        }

        self.switch_identity(None, 0).await?;
        info!("user {} logged out", identity.id());

        if destroy_session_data && self.config.enable_session {
            self.session.destroy().await?;
        }

        self.events.fire_after_logout(&event);

        Ok(true)
    }

    /// Ensure the request is authenticated.
    ///
    /// For a guest: remembers the requested URL for the post-login
    /// redirect (safe GET requests only, never AJAX sub-flows), then
    /// signals a redirect to the configured login entry point, or a
    /// terminal forbidden error when none is configured.
    pub async fn require_login(&mut self, request: &RequestInfo) -> AuthResult<()> {
        if self.current().await?.is_some() {
            return Ok(());
        }

        let safe_get = request.method.eq_ignore_ascii_case("GET") && !request.is_ajax;
        if self.config.enable_session && safe_get {
            self.set_return_url(&request.url).await?;
        }

        match &self.config.login_url {
            Some(url) if !request.is_ajax => Err(AuthError::LoginRequired(url.clone())),
            _ => Err(AuthError::Forbidden("login required".to_string())),
        }
    }

    /// Whether the current identity holds a permission.
    ///
    /// Delegates to the injected [`AccessChecker`]; results are cached for
    /// the rest of the request when `params` is empty. Without a checker
    /// every permission is denied.
    pub async fn can(
        &mut self,
        permission: &str,
        params: &HashMap<String, Value>,
    ) -> AuthResult<bool> {
        if params.is_empty() {
            if let Some(&allowed) = self.state.access_cache.get(permission) {
                return Ok(allowed);
            }
        }

        let identity = self.current().await?;
        let checker = match self.access_checker.clone() {
            Some(checker) => checker,
            None => return Ok(false),
        };

        let identity_id = identity.as_ref().map(|i| i.id().to_string());
        let allowed = checker
            .check_access(identity_id.as_deref(), permission, params)
            .await
            .map_err(|e| AuthError::AccessCheck(e.to_string()))?;

        if params.is_empty() {
            self.state
                .access_cache
                .insert(permission.to_string(), allowed);
        }

        Ok(allowed)
    }

    /// Remember the URL to return to after login
    pub async fn set_return_url(&mut self, url: &str) -> AuthResult<()> {
        self.session.set(RETURN_URL_KEY, json!(url)).await?;
        Ok(())
    }

    /// The URL remembered for the post-login redirect, if any
    pub async fn return_url(&mut self) -> AuthResult<Option<String>> {
        Ok(self
            .session
            .get(RETURN_URL_KEY)
            .await?
            .and_then(|value| value.as_str().map(str::to_string)))
    }

    /// Switch the request to a new identity (or to Guest for `None`).
    ///
    /// Not cancellable; the veto points are the public `login`/`logout`.
    /// Updates the per-request cache, regenerates the session ID, rewrites
    /// the subject and timeout markers, replaces or clears the
    /// persistent-login cookie where the switch calls for it, and finally
    /// triggers CSRF token regeneration since the trust boundary changed.
    async fn switch_identity(
        &mut self,
        identity: Option<Arc<dyn Identity>>,
        duration: i64,
    ) -> AuthResult<()> {
        self.state.identity = identity.clone();
        self.state.resolved = true;
        self.state.access_cache.clear();

        if !self.config.enable_session {
            return Ok(());
        }

        let issue_cookie = identity.is_some() && duration > 0 && self.config.enable_auto_login;

        if self.config.enable_auto_login {
            if let Some(template) = &self.config.identity_cookie {
                // A still-valid cookie survives a login that does not
                // renew it; it is only dropped on logout or right before
                // a fresh one is issued.
                if identity.is_none() || issue_cookie {
                    self.cookies.remove(&template.name);
                }
            }
        }

        if self.config.regenerate_session_id {
            self.session.regenerate_id().await?;
        } else {
            debug!("session id regeneration disabled, skipping");
        }

        self.session.remove(ID_KEY).await?;
        self.session.remove(EXPIRE_KEY).await?;
        self.session.remove(ABSOLUTE_EXPIRE_KEY).await?;

        if let Some(identity) = identity {
            let now = self.clock.now().timestamp();

            self.session.set(ID_KEY, json!(identity.id())).await?;
            if let Some(timeout) = self.config.auth_timeout {
                self.session.set(EXPIRE_KEY, json!(now + timeout)).await?;
            }
            if let Some(timeout) = self.config.absolute_auth_timeout {
                self.session
                    .set(ABSOLUTE_EXPIRE_KEY, json!(now + timeout))
                    .await?;
            }

            if issue_cookie {
                self.send_identity_cookie(identity.as_ref(), duration)?;
            }
        }

        if let Some(hook) = &self.csrf_hook {
            hook();
        }

        Ok(())
    }

    /// Try to authenticate from the persistent-login cookie
    async fn login_by_cookie(&mut self) -> AuthResult<Option<Arc<dyn Identity>>> {
        let cookie_name = match &self.config.identity_cookie {
            Some(template) => template.name.clone(),
            None => return Ok(None),
        };

        let raw = match self.cookies.get(&cookie_name) {
            Some(raw) => raw,
            None => return Ok(None),
        };

        match self.resolver.resolve_from_token(&raw).await? {
            TokenResolution::Authenticated { identity, duration } => {
                let event = LoginEvent {
                    identity: identity.clone(),
                    cookie_based: true,
                    duration,
                };

                if self.events.fire_before_login(&event) == EventOutcome::Cancel {
                    info!("cookie-based login vetoed for {}", identity.id());
                    return Ok(None);
                }

                let renewed = if self.config.auto_renew_cookie {
                    duration
                } else {
                    0
                };
                self.switch_identity(Some(identity.clone()), renewed).await?;
                info!("user {} logged in via persistent cookie", identity.id());
                self.events.fire_after_login(&event);

                Ok(Some(identity))
            }
            TokenResolution::Rejected { invalidate_cookie } => {
                if invalidate_cookie {
                    self.cookies.remove(&cookie_name);
                }
                Ok(None)
            }
        }
    }

    /// Issue a fresh persistent-login cookie for the identity
    fn send_identity_cookie(&self, identity: &dyn Identity, duration: i64) -> AuthResult<()> {
        let template = self.config.identity_cookie.as_ref().ok_or_else(|| {
            AuthError::Configuration("identity cookie is not configured".to_string())
        })?;

        let token = PersistentLoginToken::new(identity, duration);
        let value = token.encode()?;

        self.cookies.add(Cookie {
            name: template.name.clone(),
            value,
            expires: Some(token.expires_at(self.clock.now())),
            path: template.path.clone(),
            domain: template.domain.clone(),
            secure: template.secure,
            http_only: template.http_only,
        });

        Ok(())
    }
}
