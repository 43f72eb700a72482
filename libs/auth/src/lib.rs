//! Identity and session lifecycle subsystem
//!
//! This crate establishes, persists, renews, and tears down a user's
//! authenticated state across independent, stateless requests. It
//! coordinates three partially-trusted places state can live:
//!
//! 1. Server-side session storage (injected [`SessionStore`])
//! 2. A client-held persistent login cookie (injected [`CookieJar`])
//! 3. An in-memory per-request cache inside [`AuthSessionManager`]
//!
//! The public entry point is [`AuthSessionManager`], one instance per
//! inbound request. Identity lookup, permission evaluation, and the
//! transport layer are external collaborators behind the [`Identity`],
//! [`IdentityStore`], [`AccessChecker`], and [`CookieJar`] traits.
//!
//! [`SessionStore`]: common::store::SessionStore

pub mod access;
pub mod config;
pub mod cookies;
pub mod error;
pub mod events;
pub mod identity;
pub mod manager;
pub mod resolver;
pub mod session;
pub mod token;

pub use access::AccessChecker;
pub use config::{AuthConfig, CookieTemplate};
pub use cookies::{Cookie, CookieJar, MemoryCookieJar};
pub use error::{AuthError, AuthResult};
pub use events::{AuthEvents, EventOutcome, LoginEvent, LogoutEvent};
pub use identity::{Identity, IdentityStore};
pub use manager::{AuthSessionManager, RequestInfo};
pub use resolver::{IdentityResolver, TokenResolution};
pub use session::{KeyValueSession, SessionCookieParams};
pub use token::PersistentLoginToken;
