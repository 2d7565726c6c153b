//! Shared helpers for the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bucketfs::{BucketFs, MemoryBucket};
use bucketfs_store::{
    AccessLevel, ByteStream, ListPage, ListRequest, ObjectBucket, ObjectHead, StoreError,
    StoreResult,
};
use bytes::Bytes;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;
use tracing_subscriber::{EnvFilter, fmt};

/// Install a test subscriber once. `RUST_LOG` overrides the default level.
pub fn init_tracing() {
    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("bucketfs=debug")),
        )
        .with_test_writer()
        .try_init();
}

/// Pauses a copy until released.
#[derive(Default)]
pub struct CopyGate {
    pub started: Notify,
    pub release: Notify,
}

/// A [`MemoryBucket`] with switchable failures and an optional copy gate.
pub struct FaultyBucket {
    pub inner: Arc<MemoryBucket>,
    pub fail_head: AtomicBool,
    pub fail_delete: AtomicBool,
    pub fail_list: AtomicBool,
    pub gate: Option<Arc<CopyGate>>,
}

impl FaultyBucket {
    pub fn new(inner: Arc<MemoryBucket>) -> Self {
        Self {
            inner,
            fail_head: AtomicBool::new(false),
            fail_delete: AtomicBool::new(false),
            fail_list: AtomicBool::new(false),
            gate: None,
        }
    }

    pub fn with_gate(mut self, gate: Arc<CopyGate>) -> Self {
        self.gate = Some(gate);
        self
    }

    fn check(flag: &AtomicBool, op: &'static str, key: &str) -> StoreResult<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(StoreError::backend(op, key, "injected failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectBucket for FaultyBucket {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn head(&self, key: &str) -> StoreResult<ObjectHead> {
        Self::check(&self.fail_head, "head", key)?;
        self.inner.head(key).await
    }

    async fn get(&self, key: &str) -> StoreResult<Bytes> {
        self.inner.get(key).await
    }

    async fn get_reader(&self, key: &str) -> StoreResult<ByteStream> {
        self.inner.get_reader(key).await
    }

    async fn put(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
        access: AccessLevel,
    ) -> StoreResult<()> {
        self.inner.put(key, data, content_type, access).await
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        Self::check(&self.fail_delete, "delete", key)?;
        self.inner.delete(key).await
    }

    async fn delete_multiple(&self, keys: &[String]) -> StoreResult<()> {
        Self::check(&self.fail_delete, "delete_multiple", "")?;
        self.inner.delete_multiple(keys).await
    }

    async fn list(&self, request: ListRequest) -> StoreResult<ListPage> {
        Self::check(&self.fail_list, "list", &request.prefix)?;
        self.inner.list(request).await
    }

    async fn copy(&self, dest_key: &str, access: AccessLevel, source_key: &str) -> StoreResult<()> {
        if let Some(gate) = &self.gate {
            gate.started.notify_one();
            gate.release.notified().await;
        }
        self.inner.copy(dest_key, access, source_key).await
    }
}

/// A filesystem over a fresh in-memory bucket.
pub fn memory_fs() -> (Arc<MemoryBucket>, BucketFs) {
    init_tracing();
    let bucket = Arc::new(MemoryBucket::new("integration"));
    let fs = BucketFs::new(bucket.clone());
    (bucket, fs)
}

/// A filesystem over a [`FaultyBucket`] wrapping a fresh in-memory bucket.
pub fn faulty_fs(faulty: impl FnOnce(Arc<MemoryBucket>) -> FaultyBucket) -> (Arc<MemoryBucket>, Arc<FaultyBucket>, BucketFs) {
    init_tracing();
    let memory = Arc::new(MemoryBucket::new("integration"));
    let faulty = Arc::new(faulty(memory.clone()));
    let fs = BucketFs::new(faulty.clone());
    (memory, faulty, fs)
}
