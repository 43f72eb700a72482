//! Custom error types for the common library
//!
//! This module defines the error type for session store operations. Store
//! failures are hard errors: callers propagate them instead of silently
//! downgrading an authenticated request to a guest one.

use thiserror::Error;

/// Custom error type for session store operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// The store backend rejected or failed the operation
    #[error("session store backend error: {0}")]
    Backend(String),

    /// A session entry could not be serialized or deserialized
    #[error("session store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Type alias for Result with StoreError
pub type StoreResult<T> = Result<T, StoreError>;
