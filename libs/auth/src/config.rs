//! Configuration for the session lifecycle subsystem

use std::env;

use crate::error::{AuthError, AuthResult};

/// Settings of the persistent-login ("remember me") cookie
///
/// Only the logical attributes are described here; the transport layer
/// owns the wire serialization.
#[derive(Debug, Clone)]
pub struct CookieTemplate {
    /// Cookie name
    pub name: String,
    /// Cookie path
    pub path: String,
    /// Cookie domain, if restricted
    pub domain: Option<String>,
    /// Only send over TLS
    pub secure: bool,
    /// Hide from client-side scripts
    pub http_only: bool,
}

impl CookieTemplate {
    /// Create a template with the given name and default attributes
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

impl Default for CookieTemplate {
    fn default() -> Self {
        Self {
            name: "_identity".to_string(),
            path: "/".to_string(),
            domain: None,
            secure: false,
            http_only: true,
        }
    }
}

/// Auth manager configuration
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Whether authentication state is persisted in the session.
    /// Disable for purely token-based (stateless) request handling.
    pub enable_session: bool,
    /// Whether a persistent-login cookie may authenticate a request that
    /// carries no session identity
    pub enable_auto_login: bool,
    /// Whether a cookie-based login re-issues the cookie with a fresh
    /// expiration
    pub auto_renew_cookie: bool,
    /// Persistent-login cookie settings; required when auto login is on
    pub identity_cookie: Option<CookieTemplate>,
    /// Sliding timeout in seconds, refreshed on every authenticated access
    pub auth_timeout: Option<i64>,
    /// Absolute timeout in seconds, fixed at login and never refreshed
    pub absolute_auth_timeout: Option<i64>,
    /// Login entry point `require_login` redirects to
    pub login_url: Option<String>,
    /// Whether the session ID is regenerated on every identity switch.
    /// Disable only for ephemeral/test sessions; regeneration is the
    /// session fixation defense.
    pub regenerate_session_id: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enable_session: true,
            enable_auto_login: false,
            auto_renew_cookie: true,
            identity_cookie: None,
            auth_timeout: None,
            absolute_auth_timeout: None,
            login_url: None,
            regenerate_session_id: true,
        }
    }
}

impl AuthConfig {
    /// Create a new AuthConfig from environment variables
    ///
    /// # Environment Variables
    /// - `AUTH_TIMEOUT_SECONDS`: sliding timeout in seconds (default: unset)
    /// - `AUTH_ABSOLUTE_TIMEOUT_SECONDS`: absolute timeout in seconds (default: unset)
    /// - `AUTH_AUTO_LOGIN`: enable cookie auto login, "true"/"1" (default: false)
    /// - `AUTH_IDENTITY_COOKIE_NAME`: persistent-login cookie name (default: unset)
    /// - `AUTH_LOGIN_URL`: login entry point for `require_login` (default: unset)
    pub fn from_env() -> AuthResult<Self> {
        let auth_timeout = env::var("AUTH_TIMEOUT_SECONDS")
            .ok()
            .and_then(|s| s.parse().ok());

        let absolute_auth_timeout = env::var("AUTH_ABSOLUTE_TIMEOUT_SECONDS")
            .ok()
            .and_then(|s| s.parse().ok());

        let enable_auto_login = env::var("AUTH_AUTO_LOGIN")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let identity_cookie = env::var("AUTH_IDENTITY_COOKIE_NAME")
            .ok()
            .map(CookieTemplate::named);

        let login_url = env::var("AUTH_LOGIN_URL").ok();

        let config = Self {
            enable_auto_login,
            identity_cookie,
            auth_timeout,
            absolute_auth_timeout,
            login_url,
            ..Self::default()
        };
        config.validate()?;

        Ok(config)
    }

    /// Check the configuration for inconsistencies
    ///
    /// Called by the manager constructor so that misconfiguration fails at
    /// startup instead of silently misbehaving per request.
    pub fn validate(&self) -> AuthResult<()> {
        if self.enable_auto_login && self.identity_cookie.is_none() {
            return Err(AuthError::Configuration(
                "auto login is enabled but no identity cookie is configured".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_auth_config_from_env_defaults() {
        // With no AUTH_* variables set, from_env yields the defaults
        let config = AuthConfig::from_env().expect("failed to create auth config");
        assert!(config.enable_session);
        assert!(!config.enable_auto_login);
        assert!(config.auto_renew_cookie);
        assert_eq!(config.auth_timeout, None);
        assert_eq!(config.absolute_auth_timeout, None);
        assert!(config.regenerate_session_id);
    }

    #[test]
    fn test_validate_rejects_auto_login_without_cookie() {
        let config = AuthConfig {
            enable_auto_login: true,
            identity_cookie: None,
            ..AuthConfig::default()
        };

        let err = config.validate().expect_err("validation should fail");
        assert!(matches!(err, AuthError::Configuration(_)));
    }

    #[test]
    fn test_validate_accepts_auto_login_with_cookie() {
        let config = AuthConfig {
            enable_auto_login: true,
            identity_cookie: Some(CookieTemplate::named("_identity")),
            ..AuthConfig::default()
        };

        assert!(config.validate().is_ok());
    }
}
