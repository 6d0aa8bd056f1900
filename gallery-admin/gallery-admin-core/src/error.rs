//! Error types shared by the gallery admin core.
//!
//! Each external collaborator gets its own error type so callers can tell a
//! datastore failure from an identity-provider failure without string
//! matching. None of these are retried.

use thiserror::Error;

/// A relational-store or object-storage call failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("store error: {message}")]
pub struct StoreError {
    pub message: String,
}

impl StoreError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// An identity-provider call failed. The provider's message is kept verbatim.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("identity error: {message}")]
pub struct IdentityError {
    pub message: String,
}

impl IdentityError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Appending an audit entry failed. Never rolls back the operation that
/// triggered it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("log error: {message}")]
pub struct LogError {
    pub message: String,
}

impl From<StoreError> for LogError {
    fn from(err: StoreError) -> Self {
        Self {
            message: err.message,
        }
    }
}

/// Session and gate failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AccessError {
    /// No session, or the session token did not resolve to a user.
    #[error("not authenticated")]
    Unauthenticated,
    /// Authenticated, but the role or permission gate refused the action.
    #[error("permission denied: {0}")]
    Forbidden(String),
}
