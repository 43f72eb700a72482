//! Identity resolution
//!
//! [`IdentityResolver`] turns partially-trusted request material (the
//! session's stored subject ID, or a persistent-login cookie payload)
//! into a verified [`Identity`], enforcing sliding and absolute expiry.
//! Invalid material never surfaces as an error to the caller: it degrades
//! to "not authenticated" plus a log line, with cookie invalidation
//! requested where the material referenced a real cookie.

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info, warn};

use common::clock::Clock;
use common::error::StoreResult;

use crate::config::AuthConfig;
use crate::error::{AuthError, AuthResult};
use crate::identity::{Identity, IdentityStore};
use crate::session::{ABSOLUTE_EXPIRE_KEY, EXPIRE_KEY, ID_KEY, KeyValueSession};
use crate::token::PersistentLoginToken;

/// Result of validating a persistent-login cookie payload
pub enum TokenResolution {
    /// The token checked out; `duration` is the lifetime the cookie was
    /// issued with, so the caller can decide whether to re-issue it
    Authenticated {
        identity: Arc<dyn Identity>,
        duration: i64,
    },
    /// The token was rejected. `invalidate_cookie` is set when a cookie
    /// exists that must not be left dangling on the client.
    Rejected { invalidate_cookie: bool },
}

/// Resolves identities from session state and persistent-login tokens
pub struct IdentityResolver {
    identities: Arc<dyn IdentityStore>,
    clock: Arc<dyn Clock>,
    auth_timeout: Option<i64>,
    absolute_auth_timeout: Option<i64>,
}

impl IdentityResolver {
    /// Create a resolver with the timeout policy of the given config
    pub fn new(
        identities: Arc<dyn IdentityStore>,
        clock: Arc<dyn Clock>,
        config: &AuthConfig,
    ) -> Self {
        Self {
            identities,
            clock,
            auth_timeout: config.auth_timeout,
            absolute_auth_timeout: config.absolute_auth_timeout,
        }
    }

    /// Resolve the identity recorded in the session, if any.
    ///
    /// An elapsed sliding or absolute timeout triggers a soft logout: the
    /// identity and timeout markers are cleared but unrelated session data
    /// survives. A valid access slides the sliding marker forward.
    pub async fn resolve_from_session(
        &self,
        session: &mut KeyValueSession,
    ) -> AuthResult<Option<Arc<dyn Identity>>> {
        let subject_id = match session.get(ID_KEY).await? {
            Some(value) => match value.as_str() {
                Some(id) => id.to_string(),
                None => {
                    warn!("session identity key holds a non-string value, clearing it");
                    self.clear_session_identity(session).await?;
                    return Ok(None);
                }
            },
            None => return Ok(None),
        };

        let identity = self
            .identities
            .find_by_id(&subject_id)
            .await
            .map_err(|e| AuthError::IdentityLookup(e.to_string()))?;

        let identity = match identity {
            Some(identity) => identity,
            None => {
                warn!("session references unknown subject {}", subject_id);
                self.clear_session_identity(session).await?;
                return Ok(None);
            }
        };

        let now = self.clock.now().timestamp();

        if self.auth_timeout.is_some() || self.absolute_auth_timeout.is_some() {
            let mut expired = false;

            if self.auth_timeout.is_some() {
                if let Some(expire_at) = session.get(EXPIRE_KEY).await?.and_then(|v| v.as_i64()) {
                    expired = expired || expire_at < now;
                }
            }

            if self.absolute_auth_timeout.is_some() {
                if let Some(expire_at) = session
                    .get(ABSOLUTE_EXPIRE_KEY)
                    .await?
                    .and_then(|v| v.as_i64())
                {
                    expired = expired || expire_at < now;
                }
            }

            if expired {
                info!("authenticated session for {} expired", subject_id);
                self.clear_session_identity(session).await?;
                return Ok(None);
            }
        }

        if let Some(timeout) = self.auth_timeout {
            session.set(EXPIRE_KEY, json!(now + timeout)).await?;
        }

        Ok(Some(identity))
    }

    /// Validate a persistent-login cookie payload.
    ///
    /// The failure ladder matters: a payload that does not even decode is
    /// treated like an absent cookie (nothing to invalidate); a payload
    /// that names an unknown subject or fails auth-key verification
    /// requests invalidation so the stale cookie is not replayed.
    pub async fn resolve_from_token(&self, raw: &str) -> AuthResult<TokenResolution> {
        let token = match PersistentLoginToken::decode(raw) {
            Ok(token) => token,
            Err(e) => {
                debug!("ignoring undecodable persistent login cookie: {}", e);
                return Ok(TokenResolution::Rejected {
                    invalidate_cookie: false,
                });
            }
        };

        let identity = self
            .identities
            .find_by_id(&token.subject_id)
            .await
            .map_err(|e| AuthError::IdentityLookup(e.to_string()))?;

        let identity = match identity {
            Some(identity) => identity,
            None => {
                warn!(
                    "persistent login cookie references unknown subject {}",
                    token.subject_id
                );
                return Ok(TokenResolution::Rejected {
                    invalidate_cookie: true,
                });
            }
        };

        if !identity.validate_auth_key(&token.auth_key) {
            // Log the presented key for forensics; the valid key must
            // never reach the logs.
            warn!(
                "invalid auth key in persistent login cookie for subject {} (presented: {})",
                token.subject_id, token.auth_key
            );
            return Ok(TokenResolution::Rejected {
                invalidate_cookie: true,
            });
        }

        Ok(TokenResolution::Authenticated {
            identity,
            duration: token.duration,
        })
    }

    /// Soft logout: clear the subject and timeout markers, keep the rest
    /// of the session intact
    pub(crate) async fn clear_session_identity(
        &self,
        session: &mut KeyValueSession,
    ) -> StoreResult<()> {
        session.remove(ID_KEY).await?;
        session.remove(EXPIRE_KEY).await?;
        session.remove(ABSOLUTE_EXPIRE_KEY).await?;
        Ok(())
    }
}
