//! Content fingerprints and the write-avoidance decision.
//!
//! A single-part S3 upload reports the hex MD5 of its body as the entity
//! tag, so comparing the local buffer's MD5 against the remote tag tells
//! us whether a PUT would change anything. Multipart tags (`"<hex>-<n>"`)
//! never match and always cause a rewrite.

use bucketfs_store::{ObjectBucket, StoreError};
use md5::{Digest, Md5};

/// Hex MD5 of `data`.
pub fn content_fingerprint(data: &[u8]) -> String {
    hex::encode(Md5::digest(data))
}

/// Strip the surrounding quotes S3 puts on entity tags.
pub fn normalize_etag(e_tag: &str) -> &str {
    e_tag.trim_matches('"')
}

/// Returns true if `data` fingerprints to `e_tag`.
pub fn matches_etag(data: &[u8], e_tag: &str) -> bool {
    normalize_etag(e_tag).eq_ignore_ascii_case(&content_fingerprint(data))
}

/// Decide whether `data` must be uploaded to `key`.
///
/// A missing object needs an upload; any other head failure is returned
/// and nothing should be written.
pub async fn needs_upload(
    bucket: &dyn ObjectBucket,
    key: &str,
    data: &[u8],
) -> Result<bool, StoreError> {
    match bucket.head(key).await {
        Ok(head) => Ok(!matches_etag(data, &head.e_tag)),
        Err(StoreError::NotFound(_)) => Ok(true),
        Err(e) => Err(e),
    }
}
