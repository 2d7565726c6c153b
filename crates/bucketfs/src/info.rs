//! File metadata projection.

use bucketfs_store::ObjectHead;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;

use crate::path;

/// Size reported for every directory.
///
/// Directories have no remote object, so there is no real size to give.
pub const DIRECTORY_SIZE: u64 = 42;

/// Metadata for a file or directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    /// Base name (`/` for the root).
    pub name: String,
    /// Size in bytes; [`DIRECTORY_SIZE`] for directories.
    pub size: u64,
    /// Last modification time.
    pub modified: SystemTime,
    /// Directory flag.
    pub is_dir: bool,
    /// Unix permission bits.
    pub mode: u32,
}

impl FileInfo {
    /// Metadata for a regular file at `path`.
    pub fn file(path: &str, size: u64, modified: SystemTime, mode: u32) -> Self {
        Self {
            name: path::base_name(path).to_string(),
            size,
            modified,
            is_dir: false,
            mode,
        }
    }

    /// Metadata for a directory at `path`.
    pub fn directory(path: &str, modified: SystemTime, mode: u32) -> Self {
        Self {
            name: path::base_name(path).to_string(),
            size: DIRECTORY_SIZE,
            modified,
            is_dir: true,
            mode,
        }
    }

    /// Metadata for `path` from a remote head.
    pub fn from_head(path: &str, head: &ObjectHead, mode: u32) -> Self {
        Self::file(path, head.size, head.last_modified, mode)
    }

    /// Returns true for a regular file.
    pub fn is_file(&self) -> bool {
        !self.is_dir
    }
}
