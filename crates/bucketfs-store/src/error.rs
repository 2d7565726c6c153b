//! Object store error types.

use std::fmt::Display;
use thiserror::Error;

/// Error reported by an [`ObjectBucket`](crate::ObjectBucket).
///
/// Adapters classify failures themselves; callers never inspect message
/// text to tell a missing object from a broken request.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The object (or copy source) does not exist.
    #[error("object not found: {0}")]
    NotFound(String),

    /// Any other failure reported by the backend.
    #[error("{op} {key}: {message}")]
    Backend {
        op: &'static str,
        key: String,
        message: String,
    },
}

impl StoreError {
    /// Create a NotFound error.
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound(key.into())
    }

    /// Create a Backend error from anything displayable.
    pub fn backend(op: &'static str, key: impl Into<String>, err: impl Display) -> Self {
        Self::Backend {
            op,
            key: key.into(),
            message: err.to_string(),
        }
    }

    /// Returns true if this error means the object is absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Object store result type.
pub type StoreResult<T> = Result<T, StoreError>;
