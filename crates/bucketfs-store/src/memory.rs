//! In-memory bucket.
//!
//! Behaves like a single-part S3 bucket: entity tags are the quoted MD5 of
//! the content, deletes are idempotent, listings are key-ordered and
//! paginated. Every call is counted so tests can assert how many round
//! trips an operation cost.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use md5::{Digest, Md5};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::SystemTime;

use crate::acl::AccessLevel;
use crate::bucket::{ByteStream, ListPage, ListRequest, ObjectBucket, ObjectHead};
use crate::error::{StoreError, StoreResult};

const DEFAULT_MAX_KEYS: usize = 1000;
const READER_CHUNK: usize = 4096;

/// An object held by [`MemoryBucket`].
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub data: Bytes,
    pub e_tag: String,
    pub content_type: String,
    pub access: AccessLevel,
    pub last_modified: SystemTime,
}

impl StoredObject {
    fn head(&self, key: &str) -> ObjectHead {
        ObjectHead {
            key: key.to_string(),
            e_tag: self.e_tag.clone(),
            size: self.data.len() as u64,
            last_modified: self.last_modified,
        }
    }
}

/// Snapshot of per-verb call counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BucketStats {
    pub heads: usize,
    pub gets: usize,
    pub puts: usize,
    pub deletes: usize,
    pub lists: usize,
    pub copies: usize,
}

#[derive(Debug, Default)]
struct Counters {
    heads: AtomicUsize,
    gets: AtomicUsize,
    puts: AtomicUsize,
    deletes: AtomicUsize,
    lists: AtomicUsize,
    copies: AtomicUsize,
}

fn bump(counter: &AtomicUsize) {
    counter.fetch_add(1, Ordering::Relaxed);
}

fn quoted_md5(data: &[u8]) -> String {
    format!("\"{}\"", hex::encode(Md5::digest(data)))
}

/// In-process bucket.
#[derive(Debug)]
pub struct MemoryBucket {
    name: String,
    objects: RwLock<BTreeMap<String, StoredObject>>,
    counters: Counters,
}

impl Default for MemoryBucket {
    fn default() -> Self {
        Self::new("memory")
    }
}

impl MemoryBucket {
    /// Create an empty bucket.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            objects: RwLock::new(BTreeMap::new()),
            counters: Counters::default(),
        }
    }

    /// Store an object with an explicit entity tag, bypassing counters.
    ///
    /// Useful for seeding objects that did not come through a single-part
    /// upload (a multipart tag like `"abc-3"` never equals an MD5).
    pub fn insert_raw(&self, key: impl Into<String>, data: impl Into<Bytes>, e_tag: impl Into<String>) {
        self.objects.write().insert(
            key.into(),
            StoredObject {
                data: data.into(),
                e_tag: e_tag.into(),
                content_type: "application/octet-stream".to_string(),
                access: AccessLevel::Private,
                last_modified: SystemTime::now(),
            },
        );
    }

    /// Seed an object the way a single-part upload would, bypassing counters.
    pub fn insert(&self, key: impl Into<String>, data: impl Into<Bytes>) {
        let data = data.into();
        let e_tag = quoted_md5(&data);
        self.insert_raw(key, data, e_tag);
    }

    /// Look at a stored object.
    pub fn object(&self, key: &str) -> Option<StoredObject> {
        self.objects.read().get(key).cloned()
    }

    /// Returns true if `key` is stored.
    pub fn contains(&self, key: &str) -> bool {
        self.objects.read().contains_key(key)
    }

    /// All keys, in order.
    pub fn keys(&self) -> Vec<String> {
        self.objects.read().keys().cloned().collect()
    }

    /// Call counts so far.
    pub fn stats(&self) -> BucketStats {
        let c = &self.counters;
        BucketStats {
            heads: c.heads.load(Ordering::Relaxed),
            gets: c.gets.load(Ordering::Relaxed),
            puts: c.puts.load(Ordering::Relaxed),
            deletes: c.deletes.load(Ordering::Relaxed),
            lists: c.lists.load(Ordering::Relaxed),
            copies: c.copies.load(Ordering::Relaxed),
        }
    }

    fn load(&self, key: &str) -> StoreResult<StoredObject> {
        self.objects
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::not_found(key))
    }
}

#[async_trait]
impl ObjectBucket for MemoryBucket {
    fn name(&self) -> &str {
        &self.name
    }

    async fn head(&self, key: &str) -> StoreResult<ObjectHead> {
        bump(&self.counters.heads);
        Ok(self.load(key)?.head(key))
    }

    async fn get(&self, key: &str) -> StoreResult<Bytes> {
        bump(&self.counters.gets);
        Ok(self.load(key)?.data)
    }

    async fn get_reader(&self, key: &str) -> StoreResult<ByteStream> {
        bump(&self.counters.gets);
        let data = self.load(key)?.data;
        let chunks: Vec<StoreResult<Bytes>> = (0..data.len())
            .step_by(READER_CHUNK)
            .map(|start| Ok(data.slice(start..(start + READER_CHUNK).min(data.len()))))
            .collect();
        Ok(stream::iter(chunks).boxed())
    }

    async fn put(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
        access: AccessLevel,
    ) -> StoreResult<()> {
        bump(&self.counters.puts);
        let object = StoredObject {
            e_tag: quoted_md5(&data),
            data,
            content_type: content_type.to_string(),
            access,
            last_modified: SystemTime::now(),
        };
        self.objects.write().insert(key.to_string(), object);
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        bump(&self.counters.deletes);
        self.objects.write().remove(key);
        Ok(())
    }

    async fn delete_multiple(&self, keys: &[String]) -> StoreResult<()> {
        bump(&self.counters.deletes);
        let mut objects = self.objects.write();
        for key in keys {
            objects.remove(key);
        }
        Ok(())
    }

    async fn list(&self, request: ListRequest) -> StoreResult<ListPage> {
        bump(&self.counters.lists);
        let max_keys = request.max_keys.unwrap_or(DEFAULT_MAX_KEYS).max(1);
        let delimiter = request.delimiter.as_deref().filter(|d| !d.is_empty());
        let prefix = request.prefix.as_str();

        let objects = self.objects.read();
        let mut entries = Vec::new();
        let mut common_prefixes = BTreeSet::new();
        let mut is_truncated = false;

        for (key, object) in objects
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
        {
            if let Some(token) = &request.continuation_token {
                if key.as_str() <= token.as_str() {
                    continue;
                }
            }
            if let Some(delim) = delimiter {
                if let Some(idx) = key[prefix.len()..].find(delim) {
                    common_prefixes.insert(key[..prefix.len() + idx + delim.len()].to_string());
                    continue;
                }
            }
            if entries.len() == max_keys {
                is_truncated = true;
                break;
            }
            entries.push(object.head(key));
        }

        let next_token = if is_truncated {
            entries.last().map(|e: &ObjectHead| e.key.clone())
        } else {
            None
        };

        Ok(ListPage {
            entries,
            common_prefixes: common_prefixes.into_iter().collect(),
            is_truncated,
            next_token,
        })
    }

    async fn copy(&self, dest_key: &str, access: AccessLevel, source_key: &str) -> StoreResult<()> {
        bump(&self.counters.copies);
        let mut objects = self.objects.write();
        let source = objects
            .get(source_key)
            .cloned()
            .ok_or_else(|| StoreError::not_found(source_key))?;
        objects.insert(
            dest_key.to_string(),
            StoredObject {
                access,
                last_modified: SystemTime::now(),
                ..source
            },
        );
        Ok(())
    }
}
