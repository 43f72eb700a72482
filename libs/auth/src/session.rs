//! Request-scoped session handle
//!
//! [`KeyValueSession`] wraps one session's key space in the injected
//! [`SessionStore`]. It opens lazily on first access, binds to the
//! transport-supplied session ID or allocates a fresh one, and writes every
//! mutation through to the store so backend failures surface at the call
//! that caused them.
//!
//! Flash entries are regular entries tracked by a counter map stored under
//! [`FLASH_KEY`]. Counter values: `-1` delete after first read, `0` delete
//! after the next full request cycle, `1` pending delete. Exactly one
//! counter sweep runs per open.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use common::error::StoreResult;
use common::store::SessionStore;

/// Session key holding the authenticated subject ID
pub const ID_KEY: &str = "__id";
/// Session key holding the sliding expiry marker (unix seconds)
pub const EXPIRE_KEY: &str = "__expire";
/// Session key holding the absolute expiry marker (unix seconds)
pub const ABSOLUTE_EXPIRE_KEY: &str = "__absoluteExpire";
/// Session key holding the URL to return to after login
pub const RETURN_URL_KEY: &str = "__returnUrl";
/// Session key holding the flash counter map
pub const FLASH_KEY: &str = "__flash";

/// Cookie attributes of the session cookie itself
#[derive(Debug, Clone)]
pub struct SessionCookieParams {
    /// Lifetime in seconds; 0 means a browser-session cookie
    pub lifetime: i64,
    pub path: String,
    pub domain: Option<String>,
    pub secure: bool,
    pub http_only: bool,
}

impl Default for SessionCookieParams {
    fn default() -> Self {
        Self {
            lifetime: 0,
            path: "/".to_string(),
            domain: None,
            secure: false,
            http_only: true,
        }
    }
}

/// A request-scoped handle to one session's key-value entries
pub struct KeyValueSession {
    store: Arc<dyn SessionStore>,
    session_id: Option<String>,
    entries: HashMap<String, Value>,
    active: bool,
    cookie_params: SessionCookieParams,
}

impl KeyValueSession {
    /// Create an inactive handle over the given store
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self {
            store,
            session_id: None,
            entries: HashMap::new(),
            active: false,
            cookie_params: SessionCookieParams::default(),
        }
    }

    /// Create an inactive handle with explicit session cookie parameters
    pub fn with_cookie_params(store: Arc<dyn SessionStore>, params: SessionCookieParams) -> Self {
        Self {
            cookie_params: params,
            ..Self::new(store)
        }
    }

    /// Current session ID, once the session has been opened
    pub fn id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Whether the session is currently open
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Session cookie parameters
    pub fn cookie_params(&self) -> &SessionCookieParams {
        &self.cookie_params
    }

    fn allocate_id() -> String {
        Uuid::new_v4().simple().to_string()
    }

    /// Open the session, binding to the transport-supplied ID or allocating
    /// a new one. Runs the flash counter sweep exactly once.
    pub async fn open(&mut self, transport_id: Option<&str>) -> StoreResult<()> {
        if self.active {
            return Ok(());
        }

        let id = transport_id
            .map(str::to_string)
            .or_else(|| self.session_id.clone())
            .unwrap_or_else(Self::allocate_id);

        self.entries = self.store.load(&id).await?.unwrap_or_default();
        debug!("session {} opened with {} entries", id, self.entries.len());
        self.session_id = Some(id);
        self.active = true;

        if self.sweep_flash_counters()? {
            self.flush().await?;
        }

        Ok(())
    }

    async fn ensure_open(&mut self) -> StoreResult<()> {
        if self.active {
            Ok(())
        } else {
            self.open(None).await
        }
    }

    /// Persist the in-memory entries to the store
    pub async fn flush(&self) -> StoreResult<()> {
        if let Some(id) = &self.session_id {
            self.store.save(id, &self.entries).await?;
        }
        Ok(())
    }

    /// Flush and deactivate the handle; the ID is kept so a later `open`
    /// rebinds to the same session
    pub async fn close(&mut self) -> StoreResult<()> {
        if self.active {
            self.flush().await?;
            self.active = false;
        }
        Ok(())
    }

    /// Read an entry
    pub async fn get(&mut self, key: &str) -> StoreResult<Option<Value>> {
        self.ensure_open().await?;
        Ok(self.entries.get(key).cloned())
    }

    /// Whether an entry exists
    pub async fn has(&mut self, key: &str) -> StoreResult<bool> {
        self.ensure_open().await?;
        Ok(self.entries.contains_key(key))
    }

    /// Write an entry
    pub async fn set(&mut self, key: &str, value: Value) -> StoreResult<()> {
        self.ensure_open().await?;
        self.entries.insert(key.to_string(), value);
        self.flush().await
    }

    /// Remove an entry, returning the previous value
    pub async fn remove(&mut self, key: &str) -> StoreResult<Option<Value>> {
        self.ensure_open().await?;
        let previous = self.entries.remove(key);
        if previous.is_some() {
            self.flush().await?;
        }
        Ok(previous)
    }

    /// Invalidate the session's stored entries while keeping its ID.
    ///
    /// The underlying transport cannot mutate cookie-scoped settings while
    /// a session is active, so this closes, wipes the store, and re-opens
    /// under the same ID. Callers that also want a fresh ID call
    /// [`regenerate_id`](Self::regenerate_id) separately.
    pub async fn destroy(&mut self) -> StoreResult<()> {
        self.ensure_open().await?;
        let id = match self.session_id.clone() {
            Some(id) => id,
            None => return Ok(()),
        };

        self.entries.clear();
        self.close().await?;
        self.store.destroy(&id).await?;
        self.open(Some(&id)).await?;
        info!("session {} destroyed", id);

        Ok(())
    }

    /// Move the session's entries under a freshly allocated ID and drop the
    /// old one from the store. This is the session fixation defense run on
    /// every identity switch.
    pub async fn regenerate_id(&mut self) -> StoreResult<()> {
        self.ensure_open().await?;
        if let Some(old) = self.session_id.take() {
            self.store.destroy(&old).await?;
        }

        let id = Self::allocate_id();
        self.store.save(&id, &self.entries).await?;
        debug!("session id regenerated to {}", id);
        self.session_id = Some(id);

        Ok(())
    }

    /// Mutate the session cookie parameters.
    ///
    /// Some backends cannot alter cookie or GC settings while a session is
    /// open, so the session is closed around the mutation and re-opened
    /// under the same ID afterwards.
    pub async fn reconfigure<F>(&mut self, mutate: F) -> StoreResult<()>
    where
        F: FnOnce(&mut SessionCookieParams),
    {
        let was_active = self.active;
        if was_active {
            self.close().await?;
        }
        mutate(&mut self.cookie_params);
        if was_active {
            self.open(None).await?;
        }
        Ok(())
    }

    /// Store a flash entry.
    ///
    /// With `remove_after_access` the value is deleted one cycle after it
    /// is first read; otherwise it survives exactly one full request cycle
    /// whether or not it was read.
    pub async fn set_flash(
        &mut self,
        key: &str,
        value: Value,
        remove_after_access: bool,
    ) -> StoreResult<()> {
        self.ensure_open().await?;
        let mut counters = self.flash_counters();
        counters.insert(key.to_string(), if remove_after_access { -1 } else { 0 });
        self.entries.insert(key.to_string(), value);
        self.store_flash_counters(&counters)?;
        self.flush().await
    }

    /// Read a flash entry.
    ///
    /// With `delete` the value is removed immediately; otherwise a
    /// delete-after-read entry is marked for removal on the next cycle.
    pub async fn get_flash(&mut self, key: &str, delete: bool) -> StoreResult<Option<Value>> {
        self.ensure_open().await?;
        let mut counters = self.flash_counters();
        let counter = match counters.get(key) {
            Some(counter) => *counter,
            None => return Ok(None),
        };

        let value = self.entries.get(key).cloned();
        if delete || counter == 1 {
            self.entries.remove(key);
            counters.remove(key);
            self.store_flash_counters(&counters)?;
            self.flush().await?;
        } else if counter == -1 {
            counters.insert(key.to_string(), 1);
            self.store_flash_counters(&counters)?;
            self.flush().await?;
        }

        Ok(value)
    }

    fn flash_counters(&self) -> HashMap<String, i8> {
        self.entries
            .get(FLASH_KEY)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
            .unwrap_or_default()
    }

    fn store_flash_counters(&mut self, counters: &HashMap<String, i8>) -> StoreResult<()> {
        if counters.is_empty() {
            self.entries.remove(FLASH_KEY);
        } else {
            self.entries
                .insert(FLASH_KEY.to_string(), serde_json::to_value(counters)?);
        }
        Ok(())
    }

    /// Advance flash counters at the start of a request cycle: entries at
    /// `1` are purged, entries at `0` are bumped to `1`. Returns whether
    /// anything changed.
    fn sweep_flash_counters(&mut self) -> StoreResult<bool> {
        let mut counters = self.flash_counters();
        if counters.is_empty() {
            return Ok(false);
        }

        let mut changed = false;
        for (key, counter) in counters.clone() {
            match counter {
                1 => {
                    counters.remove(&key);
                    self.entries.remove(&key);
                    changed = true;
                }
                0 => {
                    counters.insert(key, 1);
                    changed = true;
                }
                _ => {}
            }
        }

        if changed {
            self.store_flash_counters(&counters)?;
        }
        Ok(changed)
    }
}
