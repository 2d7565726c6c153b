//! Filesystem configuration.
//!
//! ```toml
//! [bucket]
//! name = "my-bucket"
//! region = "eu-west-1"
//!
//! [files]
//! file_mode = 0o644
//! content_type = "text/plain"
//! ```

use bucketfs_store::BucketConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{FsError, FsResult};

/// Tunables for files and directories created through the filesystem.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FsOptions {
    /// Mode for new files. Decides the access level of uploads.
    pub file_mode: u32,
    /// Mode for new and fabricated directories.
    pub dir_mode: u32,
    /// Content type sent with uploads.
    pub content_type: String,
    /// Keys per listing page in `remove_all`.
    pub list_page_size: usize,
}

impl Default for FsOptions {
    fn default() -> Self {
        Self {
            file_mode: 0o600,
            dir_mode: 0o700,
            content_type: "application/octet-stream".to_string(),
            list_page_size: 1000,
        }
    }
}

impl FsOptions {
    /// Set the mode for new files.
    pub fn with_file_mode(mut self, mode: u32) -> Self {
        self.file_mode = mode;
        self
    }

    /// Set the mode for new directories.
    pub fn with_dir_mode(mut self, mode: u32) -> Self {
        self.dir_mode = mode;
        self
    }

    /// Set the upload content type.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    /// Set the listing page size.
    pub fn with_list_page_size(mut self, size: usize) -> Self {
        self.list_page_size = size;
        self
    }
}

/// Complete filesystem configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FsConfig {
    /// Which bucket and how to reach it.
    pub bucket: BucketConfig,
    /// File and directory defaults.
    #[serde(default)]
    pub files: FsOptions,
}

impl FsConfig {
    /// Config for `bucket` with default options.
    pub fn new(bucket: BucketConfig) -> Self {
        Self {
            bucket,
            files: FsOptions::default(),
        }
    }

    /// Parse TOML.
    pub fn from_toml_str(text: &str) -> FsResult<Self> {
        toml::from_str(text).map_err(|e| FsError::invalid_config(e.to_string()))
    }

    /// Read and parse a TOML file.
    pub fn load(path: impl AsRef<Path>) -> FsResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| FsError::invalid_config(format!("{}: {e}", path.display())))?;
        tracing::debug!(path = %path.display(), "loading config");
        Self::from_toml_str(&text)
    }
}
