//! In-process session store
//!
//! This module provides a [`SessionStore`] backed by a mutex-guarded map.
//! It is the default backend for development and tests; production
//! deployments inject a distributed implementation instead.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::StoreResult;
use crate::store::SessionStore;

/// In-memory session store
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    sessions: Arc<Mutex<HashMap<String, HashMap<String, Value>>>>,
}

impl MemoryStore {
    /// Create a new, empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sessions currently held by the store
    pub async fn session_count(&self) -> usize {
        self.sessions.lock().await.len()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn load(&self, session_id: &str) -> StoreResult<Option<HashMap<String, Value>>> {
        let sessions = self.sessions.lock().await;
        Ok(sessions.get(session_id).cloned())
    }

    async fn save(&self, session_id: &str, entries: &HashMap<String, Value>) -> StoreResult<()> {
        let mut sessions = self.sessions.lock().await;
        sessions.insert(session_id.to_string(), entries.clone());
        Ok(())
    }

    async fn destroy(&self, session_id: &str) -> StoreResult<()> {
        let mut sessions = self.sessions.lock().await;
        if sessions.remove(session_id).is_some() {
            debug!("destroyed session {}", session_id);
        }
        Ok(())
    }
}
