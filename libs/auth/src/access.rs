//! Access checking seam
//!
//! Permission and role semantics live outside this crate. The manager's
//! `can()` delegates to an injected [`AccessChecker`] and caches the answer
//! per request when no parameters are supplied.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

/// Evaluates whether a subject holds a permission
#[async_trait]
pub trait AccessChecker: Send + Sync {
    /// Check the permission for the given subject.
    ///
    /// `identity_id` is `None` for guests; checkers may still grant
    /// guest-visible permissions.
    async fn check_access(
        &self,
        identity_id: Option<&str>,
        permission: &str,
        params: &HashMap<String, Value>,
    ) -> Result<bool>;
}
