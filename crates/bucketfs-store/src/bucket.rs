//! The object store adapter trait.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use std::time::SystemTime;

use crate::acl::AccessLevel;
use crate::error::StoreResult;

/// Streamed object body.
pub type ByteStream = BoxStream<'static, StoreResult<Bytes>>;

/// Object metadata as reported by a metadata-only request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectHead {
    /// Object key.
    pub key: String,
    /// Entity tag exactly as the store reports it (S3 quotes it).
    pub e_tag: String,
    /// Size in bytes.
    pub size: u64,
    /// Last modification time.
    pub last_modified: SystemTime,
}

/// One page request for [`ObjectBucket::list`].
#[derive(Debug, Clone, Default)]
pub struct ListRequest {
    /// Only keys starting with this prefix.
    pub prefix: String,
    /// Group keys sharing a prefix up to this delimiter into `common_prefixes`.
    pub delimiter: Option<String>,
    /// Token from the previous page's `next_token`.
    pub continuation_token: Option<String>,
    /// Page size; the store's default when `None`.
    pub max_keys: Option<usize>,
}

impl ListRequest {
    /// List everything under `prefix`, no delimiter.
    pub fn prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            ..Default::default()
        }
    }

    /// Set the delimiter.
    pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = Some(delimiter.into());
        self
    }

    /// Set the continuation token.
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.continuation_token = token;
        self
    }

    /// Set the page size.
    pub fn with_max_keys(mut self, max_keys: usize) -> Self {
        self.max_keys = Some(max_keys);
        self
    }
}

/// One page of a listing.
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    /// Objects on this page.
    pub entries: Vec<ObjectHead>,
    /// Grouped prefixes when a delimiter was given.
    pub common_prefixes: Vec<String>,
    /// More results follow.
    pub is_truncated: bool,
    /// Token for the next page.
    pub next_token: Option<String>,
}

impl ListPage {
    /// Keys of the entries on this page.
    pub fn keys(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.key.clone()).collect()
    }
}

/// A handle on a single bucket.
///
/// Keys are bucket-relative and never start with `/`. Every method is one
/// network round trip (or a few, for multi-delete batching inside the
/// adapter); none retries.
#[async_trait]
pub trait ObjectBucket: Send + Sync {
    /// Bucket name.
    fn name(&self) -> &str;

    /// Fetch object metadata without its content.
    ///
    /// Returns [`StoreError::NotFound`](crate::StoreError::NotFound) when the
    /// object does not exist.
    async fn head(&self, key: &str) -> StoreResult<ObjectHead>;

    /// Fetch the whole object.
    async fn get(&self, key: &str) -> StoreResult<Bytes>;

    /// Fetch the object as a stream of chunks.
    async fn get_reader(&self, key: &str) -> StoreResult<ByteStream>;

    /// Upload `data` as the whole object, replacing any previous content.
    async fn put(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
        access: AccessLevel,
    ) -> StoreResult<()>;

    /// Delete one object. Deleting a missing key succeeds.
    async fn delete(&self, key: &str) -> StoreResult<()>;

    /// Delete several objects in one request.
    async fn delete_multiple(&self, keys: &[String]) -> StoreResult<()>;

    /// List one page of objects.
    async fn list(&self, request: ListRequest) -> StoreResult<ListPage>;

    /// Server-side copy of `source_key` (same bucket) to `dest_key`.
    async fn copy(&self, dest_key: &str, access: AccessLevel, source_key: &str) -> StoreResult<()>;
}
