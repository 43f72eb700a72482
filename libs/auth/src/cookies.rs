//! Logical cookie transport
//!
//! This crate only produces and consumes the logical cookie record; header
//! parsing and wire serialization belong to the HTTP layer, which injects a
//! [`CookieJar`] per request. The jar uses interior mutability so the same
//! handle can be held by the manager and by the surrounding pipeline.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

/// A cookie as this crate sees it
#[derive(Debug, Clone, PartialEq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    /// Expiration moment; `None` means a session cookie
    pub expires: Option<DateTime<Utc>>,
    pub path: String,
    pub domain: Option<String>,
    pub secure: bool,
    pub http_only: bool,
}

/// Per-request cookie access
pub trait CookieJar: Send + Sync {
    /// Value of the named cookie, if the request carried it
    fn get(&self, name: &str) -> Option<String>;

    /// Queue a cookie to be sent with the response
    fn add(&self, cookie: Cookie);

    /// Remove the named cookie from the client
    fn remove(&self, name: &str);
}

/// In-memory cookie jar for tests and non-HTTP callers
#[derive(Debug, Clone, Default)]
pub struct MemoryCookieJar {
    inner: Arc<Mutex<HashMap<String, Cookie>>>,
}

impl MemoryCookieJar {
    /// Create a new, empty jar
    pub fn new() -> Self {
        Self::default()
    }

    /// Full cookie record, for inspecting attributes like `expires`
    pub fn cookie(&self, name: &str) -> Option<Cookie> {
        self.inner
            .lock()
            .expect("cookie jar lock poisoned")
            .get(name)
            .cloned()
    }

    /// Number of cookies currently in the jar
    pub fn len(&self) -> usize {
        self.inner.lock().expect("cookie jar lock poisoned").len()
    }

    /// Whether the jar holds no cookies
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CookieJar for MemoryCookieJar {
    fn get(&self, name: &str) -> Option<String> {
        self.inner
            .lock()
            .expect("cookie jar lock poisoned")
            .get(name)
            .map(|cookie| cookie.value.clone())
    }

    fn add(&self, cookie: Cookie) {
        self.inner
            .lock()
            .expect("cookie jar lock poisoned")
            .insert(cookie.name.clone(), cookie);
    }

    fn remove(&self, name: &str) {
        self.inner
            .lock()
            .expect("cookie jar lock poisoned")
            .remove(name);
    }
}
