//! Identity traits
//!
//! The authenticated subject and its lookup are owned by the caller's data
//! layer. This crate only references identities by ID and auth key through
//! the two traits below; it never persists identity objects itself.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

/// The authenticated subject
pub trait Identity: Send + Sync {
    /// Unique, stable identifier of the subject
    fn id(&self) -> &str;

    /// Long-lived key used to validate persistent-login cookies.
    /// Rotating the key invalidates every outstanding cookie.
    fn auth_key(&self) -> &str;

    /// Check a key presented by a persistent-login cookie
    fn validate_auth_key(&self, key: &str) -> bool {
        self.auth_key() == key
    }
}

/// Lookup of identities by ID or by bearer token
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Find an identity by its ID
    async fn find_by_id(&self, id: &str) -> Result<Option<Arc<dyn Identity>>>;

    /// Find an identity by a bearer token of the given type
    async fn find_by_token(
        &self,
        token: &str,
        token_type: &str,
    ) -> Result<Option<Arc<dyn Identity>>>;
}
