//! Persistent login token
//!
//! This module encodes and decodes the compact payload carried in the
//! client-held "remember me" cookie. The payload is a versioned JSON tuple
//! `[version, subject_id, auth_key, duration]`, base64url-encoded. The
//! token proves nothing by itself; the resolver verifies the auth key
//! against the looked-up identity before trusting it.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::identity::Identity;

/// Current payload schema version
pub const TOKEN_VERSION: u8 = 1;

/// Ceiling on the duration a decoded payload may carry, in seconds
/// (ten years). The field is client-rewritable, so values outside
/// `0..=MAX_TOKEN_DURATION` are treated as tampering.
pub const MAX_TOKEN_DURATION: i64 = 10 * 365 * 24 * 60 * 60;

/// Errors produced while encoding or decoding a token
///
/// Decode failures are soft: callers treat them as "no token present" and
/// only mention them in internal logs.
#[derive(Error, Debug)]
pub enum TokenError {
    /// The raw cookie value is not a valid payload
    #[error("malformed persistent login payload: {0}")]
    Malformed(String),

    /// The payload carries a schema version this build does not understand
    #[error("unsupported persistent login payload version {0}")]
    UnsupportedVersion(u8),

    /// The payload could not be serialized
    #[error("failed to serialize persistent login payload: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// The decoded persistent-login payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistentLoginToken {
    pub version: u8,
    pub subject_id: String,
    pub auth_key: String,
    /// Cookie lifetime in seconds at issue time
    pub duration: i64,
}

impl PersistentLoginToken {
    /// Build a token for the given identity and duration
    pub fn new(identity: &dyn Identity, duration: i64) -> Self {
        Self {
            version: TOKEN_VERSION,
            subject_id: identity.id().to_string(),
            auth_key: identity.auth_key().to_string(),
            duration,
        }
    }

    /// Serialize to the cookie value representation
    pub fn encode(&self) -> Result<String, TokenError> {
        let tuple = (
            self.version,
            self.subject_id.as_str(),
            self.auth_key.as_str(),
            self.duration,
        );
        let bytes = serde_json::to_vec(&tuple)?;
        Ok(URL_SAFE_NO_PAD.encode(bytes))
    }

    /// Parse a cookie value back into a token
    pub fn decode(raw: &str) -> Result<Self, TokenError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(raw)
            .map_err(|e| TokenError::Malformed(e.to_string()))?;

        let (version, subject_id, auth_key, duration): (u8, String, String, i64) =
            serde_json::from_slice(&bytes).map_err(|e| TokenError::Malformed(e.to_string()))?;

        if version != TOKEN_VERSION {
            return Err(TokenError::UnsupportedVersion(version));
        }

        if !(0..=MAX_TOKEN_DURATION).contains(&duration) {
            return Err(TokenError::Malformed(format!(
                "duration {duration} out of range"
            )));
        }

        Ok(Self {
            version,
            subject_id,
            auth_key,
            duration,
        })
    }

    /// Cookie expiration for a token issued at the given moment.
    /// A duration outside chrono's representable range collapses to zero
    /// instead of panicking.
    pub fn expires_at(&self, issued_at: DateTime<Utc>) -> DateTime<Utc> {
        issued_at + Duration::try_seconds(self.duration).unwrap_or_else(Duration::zero)
    }
}
