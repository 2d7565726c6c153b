//! Filesystem error types.

use bucketfs_store::StoreError;
use std::io;
use thiserror::Error;

/// Filesystem error type.
#[derive(Debug, Error)]
pub enum FsError {
    /// File or directory not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Path already exists.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Rename target already exists.
    #[error("destination exists: {0}")]
    DestinationExists(String),

    /// Expected a directory.
    #[error("not a directory: {0}")]
    NotADirectory(String),

    /// Expected a file.
    #[error("is a directory: {0}")]
    IsADirectory(String),

    /// Operation on a closed file handle.
    #[error("file is closed: {0}")]
    ClosedHandle(String),

    /// Seek or truncate to a negative position.
    #[error("position out of range: {0}")]
    OutOfRange(i64),

    /// Operation not supported by this filesystem.
    #[error("not supported: {0}")]
    Unsupported(&'static str),

    /// Invalid path.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Configuration could not be read or parsed.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// The object store failed.
    #[error("remote store: {0}")]
    Remote(#[source] StoreError),
}

impl FsError {
    /// Create a NotFound error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    /// Create an AlreadyExists error.
    pub fn already_exists(path: impl Into<String>) -> Self {
        Self::AlreadyExists(path.into())
    }

    /// Create a DestinationExists error.
    pub fn destination_exists(path: impl Into<String>) -> Self {
        Self::DestinationExists(path.into())
    }

    /// Create a NotADirectory error.
    pub fn not_a_directory(path: impl Into<String>) -> Self {
        Self::NotADirectory(path.into())
    }

    /// Create an IsADirectory error.
    pub fn is_a_directory(path: impl Into<String>) -> Self {
        Self::IsADirectory(path.into())
    }

    /// Create a ClosedHandle error.
    pub fn closed(path: impl Into<String>) -> Self {
        Self::ClosedHandle(path.into())
    }

    /// Create an InvalidPath error.
    pub fn invalid_path(path: impl Into<String>) -> Self {
        Self::InvalidPath(path.into())
    }

    /// Create an InvalidConfig error.
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Returns true for [`FsError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<StoreError> for FsError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(key) => Self::NotFound(key),
            other => Self::Remote(other),
        }
    }
}

/// Convert FsError to std::io::Error for compatibility.
impl From<FsError> for io::Error {
    fn from(e: FsError) -> Self {
        match e {
            FsError::NotFound(msg) => io::Error::new(io::ErrorKind::NotFound, msg),
            FsError::AlreadyExists(msg) | FsError::DestinationExists(msg) => {
                io::Error::new(io::ErrorKind::AlreadyExists, msg)
            }
            FsError::NotADirectory(msg) => io::Error::new(io::ErrorKind::NotADirectory, msg),
            FsError::IsADirectory(msg) => io::Error::new(io::ErrorKind::IsADirectory, msg),
            FsError::ClosedHandle(msg) => {
                io::Error::other(format!("file is closed: {msg}"))
            }
            FsError::OutOfRange(pos) => io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("position out of range: {pos}"),
            ),
            FsError::Unsupported(op) => io::Error::new(io::ErrorKind::Unsupported, op),
            FsError::InvalidPath(msg) | FsError::InvalidConfig(msg) => {
                io::Error::new(io::ErrorKind::InvalidInput, msg)
            }
            FsError::Remote(e) => io::Error::other(e),
        }
    }
}

/// Filesystem result type.
pub type FsResult<T> = Result<T, FsError>;
