//! Error types for the auth crate
//!
//! Only the hard error classes appear here. Invalid credential material,
//! expired sessions, and vetoed transitions are soft: they are absorbed
//! inside the resolver/manager and surface as "result is Guest" plus a
//! log entry, never as a value of [`AuthError`].

use thiserror::Error;

use common::error::StoreError;

use crate::token::TokenError;

/// Errors surfaced by the session lifecycle subsystem
#[derive(Error, Debug)]
pub enum AuthError {
    /// The manager was configured inconsistently; raised fail-fast at
    /// construction time
    #[error("auth configuration error: {0}")]
    Configuration(String),

    /// The session store failed a read or write
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The identity store failed a lookup
    #[error("identity lookup failed: {0}")]
    IdentityLookup(String),

    /// The injected access checker failed
    #[error("access check failed: {0}")]
    AccessCheck(String),

    /// A persistent login token could not be produced
    #[error("persistent login token error: {0}")]
    Token(#[from] TokenError),

    /// The caller must authenticate; redirect to the login entry point
    #[error("login required, redirecting to {0}")]
    LoginRequired(String),

    /// The caller must authenticate and no login entry point is configured
    #[error("forbidden: {0}")]
    Forbidden(String),
}

/// Type alias for Result with AuthError
pub type AuthResult<T> = Result<T, AuthError>;
