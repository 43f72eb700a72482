//! Lifecycle events
//!
//! Collaborators observe and veto identity transitions through handler
//! chains. A `before_*` handler returns an explicit [`EventOutcome`]; the
//! manager composes the chain before applying any state mutation, so a
//! `Cancel` leaves session and cookie state untouched. Cancellation is a
//! deliberate veto (e.g. an "account disabled" check), not an error.

use std::sync::Arc;

use crate::identity::Identity;

/// Verdict of a `before_*` handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// Apply the transition
    Proceed,
    /// Veto the transition; state stays unchanged
    Cancel,
}

/// Payload of login events
#[derive(Clone)]
pub struct LoginEvent {
    /// The identity being logged in
    pub identity: Arc<dyn Identity>,
    /// Whether the login was triggered by a persistent-login cookie
    pub cookie_based: bool,
    /// Requested persistent-login duration in seconds; 0 for session-only
    pub duration: i64,
}

/// Payload of logout events
#[derive(Clone)]
pub struct LogoutEvent {
    /// The identity being logged out
    pub identity: Arc<dyn Identity>,
}

type BeforeLoginHandler = Box<dyn Fn(&LoginEvent) -> EventOutcome + Send + Sync>;
type AfterLoginHandler = Box<dyn Fn(&LoginEvent) + Send + Sync>;
type BeforeLogoutHandler = Box<dyn Fn(&LogoutEvent) -> EventOutcome + Send + Sync>;
type AfterLogoutHandler = Box<dyn Fn(&LogoutEvent) + Send + Sync>;

/// Registries of lifecycle event handlers
#[derive(Default)]
pub struct AuthEvents {
    before_login: Vec<BeforeLoginHandler>,
    after_login: Vec<AfterLoginHandler>,
    before_logout: Vec<BeforeLogoutHandler>,
    after_logout: Vec<AfterLogoutHandler>,
}

impl AuthEvents {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler that may veto a login
    pub fn on_before_login<F>(&mut self, handler: F)
    where
        F: Fn(&LoginEvent) -> EventOutcome + Send + Sync + 'static,
    {
        self.before_login.push(Box::new(handler));
    }

    /// Register a handler notified after a successful login
    pub fn on_after_login<F>(&mut self, handler: F)
    where
        F: Fn(&LoginEvent) + Send + Sync + 'static,
    {
        self.after_login.push(Box::new(handler));
    }

    /// Register a handler that may veto a logout
    pub fn on_before_logout<F>(&mut self, handler: F)
    where
        F: Fn(&LogoutEvent) -> EventOutcome + Send + Sync + 'static,
    {
        self.before_logout.push(Box::new(handler));
    }

    /// Register a handler notified after a completed logout
    pub fn on_after_logout<F>(&mut self, handler: F)
    where
        F: Fn(&LogoutEvent) + Send + Sync + 'static,
    {
        self.after_logout.push(Box::new(handler));
    }

    /// Run the before-login chain; the first `Cancel` short-circuits
    pub(crate) fn fire_before_login(&self, event: &LoginEvent) -> EventOutcome {
        for handler in &self.before_login {
            if handler(event) == EventOutcome::Cancel {
                return EventOutcome::Cancel;
            }
        }
        EventOutcome::Proceed
    }

    pub(crate) fn fire_after_login(&self, event: &LoginEvent) {
        for handler in &self.after_login {
            handler(event);
        }
    }

    /// Run the before-logout chain; the first `Cancel` short-circuits
    pub(crate) fn fire_before_logout(&self, event: &LogoutEvent) -> EventOutcome {
        for handler in &self.before_logout {
            if handler(event) == EventOutcome::Cancel {
                return EventOutcome::Cancel;
            }
        }
        EventOutcome::Proceed
    }

    pub(crate) fn fire_after_logout(&self, event: &LogoutEvent) {
        for handler in &self.after_logout {
            handler(event);
        }
    }
}
