//! Session store abstraction
//!
//! The session subsystem never talks to a concrete backend directly. It is
//! handed a [`SessionStore`] implementation that persists the entries of one
//! session under its opaque session identifier. The backend may be an
//! in-process map, a cache cluster, or a database; this crate only requires
//! the three operations below and treats every failure as hard.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::StoreResult;

/// Durable key-value storage for session entries, keyed by session ID
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load the full entry map for a session, or `None` if the session
    /// has never been written (or was destroyed).
    async fn load(&self, session_id: &str) -> StoreResult<Option<HashMap<String, Value>>>;

    /// Persist the full entry map for a session, replacing whatever was
    /// stored under the ID before.
    async fn save(&self, session_id: &str, entries: &HashMap<String, Value>) -> StoreResult<()>;

    /// Remove the session and every entry stored under its ID.
    async fn destroy(&self, session_id: &str) -> StoreResult<()>;
}
