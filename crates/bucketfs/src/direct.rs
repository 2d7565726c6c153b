//! Direct, non-caching access.
//!
//! Every call goes straight to the store. There is no namespace and no
//! buffer, so the positional operations are unsupported.

use bucketfs_store::{AccessLevel, ByteStream, ObjectBucket, S3Bucket};
use bytes::Bytes;
use futures::StreamExt;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::config::{FsConfig, FsOptions};
use crate::error::{FsError, FsResult};
use crate::fingerprint;
use crate::info::FileInfo;
use crate::path;

/// Filesystem that maps each call onto one or two store requests.
pub struct DirectFs {
    bucket: Arc<dyn ObjectBucket>,
    options: FsOptions,
}

impl DirectFs {
    /// Direct access to `bucket` with default options.
    pub fn new(bucket: Arc<dyn ObjectBucket>) -> Self {
        Self::with_options(bucket, FsOptions::default())
    }

    /// Direct access to `bucket` with `options`.
    pub fn with_options(bucket: Arc<dyn ObjectBucket>, options: FsOptions) -> Self {
        Self { bucket, options }
    }

    /// Connect to S3 as described by `config`.
    pub async fn from_config(config: &FsConfig) -> Self {
        let bucket = S3Bucket::from_config(&config.bucket).await;
        Self::with_options(Arc::new(bucket), config.files.clone())
    }

    /// Human-readable description.
    pub fn name(&self) -> String {
        format!("DirectFs: s3-backed direct fs ({})", self.bucket.name())
    }

    fn handle(&self, path: &str) -> DirectFile {
        DirectFile {
            path: path::clean(path),
            bucket: self.bucket.clone(),
            content_type: self.options.content_type.clone(),
            mode: self.options.file_mode,
            stream: Mutex::new(None),
            pending: Mutex::new(Bytes::new()),
            exhausted: AtomicBool::new(false),
        }
    }

    /// Handle for `path`. Nothing is sent until the handle is used.
    pub fn create(&self, path: &str) -> DirectFile {
        self.handle(path)
    }

    /// Handle for an existing object.
    pub async fn open(&self, path: &str) -> FsResult<DirectFile> {
        let file = self.handle(path);
        self.bucket.head(&file.key()).await?;
        Ok(file)
    }

    /// Metadata from the store.
    pub async fn stat(&self, path: &str) -> FsResult<FileInfo> {
        self.handle(path).stat().await
    }

    /// Delete the object.
    pub async fn remove(&self, path: &str) -> FsResult<()> {
        let path = path::clean(path);
        self.bucket.delete(path::object_key(&path)).await?;
        Ok(())
    }

    /// Server-side copy to `new`, then delete `old`.
    pub async fn rename(&self, old: &str, new: &str) -> FsResult<()> {
        let old = path::clean(old);
        let new = path::clean(new);
        let access = AccessLevel::from_mode(self.options.file_mode);
        self.bucket
            .copy(path::object_key(&new), access, path::object_key(&old))
            .await?;
        self.bucket.delete(path::object_key(&old)).await?;
        Ok(())
    }

    /// The store has no directories; succeeds without doing anything.
    pub fn mkdir(&self, _path: &str, _mode: u32) -> FsResult<()> {
        Ok(())
    }

    /// See [`mkdir`](Self::mkdir).
    pub fn mkdir_all(&self, _path: &str, _mode: u32) -> FsResult<()> {
        Ok(())
    }
}

/// Handle on one object, without local state beyond the read stream.
pub struct DirectFile {
    path: String,
    bucket: Arc<dyn ObjectBucket>,
    content_type: String,
    mode: u32,
    stream: Mutex<Option<ByteStream>>,
    /// Unread tail of the last chunk.
    pending: Mutex<Bytes>,
    exhausted: AtomicBool,
}

impl std::fmt::Debug for DirectFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectFile")
            .field("path", &self.path)
            .field("exhausted", &self.exhausted.load(Ordering::SeqCst))
            .finish()
    }
}

impl DirectFile {
    /// Namespace path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Object key.
    pub fn key(&self) -> String {
        path::object_key(&self.path).to_string()
    }

    /// Object URL.
    pub fn name(&self) -> String {
        format!("s3://{}/{}", self.bucket.name(), self.key())
    }

    fn drain_pending(&self, buf: &mut [u8]) -> Option<usize> {
        let mut pending = self.pending.lock();
        if pending.is_empty() {
            return None;
        }
        let n = buf.len().min(pending.len());
        buf[..n].copy_from_slice(&pending.split_to(n));
        Some(n)
    }

    /// Stream the object; `None` at end of stream.
    pub async fn read(&self, buf: &mut [u8]) -> FsResult<Option<usize>> {
        if buf.is_empty() {
            return Ok(Some(0));
        }
        if let Some(n) = self.drain_pending(buf) {
            return Ok(Some(n));
        }
        if self.exhausted.load(Ordering::SeqCst) {
            return Ok(None);
        }

        let taken = self.stream.lock().take();
        let mut stream = match taken {
            Some(stream) => stream,
            None => self.bucket.get_reader(&self.key()).await?,
        };

        loop {
            match stream.next().await {
                Some(Ok(chunk)) if chunk.is_empty() => continue,
                Some(Ok(mut chunk)) => {
                    let n = buf.len().min(chunk.len());
                    buf[..n].copy_from_slice(&chunk.split_to(n));
                    *self.pending.lock() = chunk;
                    *self.stream.lock() = Some(stream);
                    return Ok(Some(n));
                }
                Some(Err(e)) => return Err(e.into()),
                None => {
                    self.exhausted.store(true, Ordering::SeqCst);
                    return Ok(None);
                }
            }
        }
    }

    /// Upload `data` as the whole object unless the store already has it.
    #[tracing::instrument(skip(self, data), fields(path = %self.path, len = data.len()), name = "direct.write")]
    pub async fn write(&self, data: &[u8]) -> FsResult<usize> {
        let key = self.key();
        if !fingerprint::needs_upload(self.bucket.as_ref(), &key, data).await? {
            tracing::debug!(key = %key, "remote content matches, skipping upload");
            return Ok(data.len());
        }
        let access = AccessLevel::from_mode(self.mode);
        self.bucket
            .put(&key, Bytes::copy_from_slice(data), &self.content_type, access)
            .await?;
        Ok(data.len())
    }

    /// Upload a string as the whole object.
    pub async fn write_str(&self, s: &str) -> FsResult<usize> {
        self.write(s.as_bytes()).await
    }

    /// Metadata from the store.
    pub async fn stat(&self) -> FsResult<FileInfo> {
        let head = self.bucket.head(&self.key()).await?;
        Ok(FileInfo::from_head(&self.path, &head, self.mode))
    }

    /// Nothing to release.
    pub fn close(&self) -> FsResult<()> {
        Ok(())
    }

    /// Nothing to flush.
    pub fn sync(&self) -> FsResult<()> {
        Ok(())
    }

    /// Positional reads are not supported; always `Unsupported`.
    pub fn read_at(&self, _buf: &mut [u8], _offset: u64) -> FsResult<Option<usize>> {
        Err(FsError::Unsupported("read_at"))
    }

    /// Positional writes are not supported; always `Unsupported`.
    pub fn write_at(&self, _data: &[u8], _offset: u64) -> FsResult<usize> {
        Err(FsError::Unsupported("write_at"))
    }

    /// A streamed read cannot be repositioned; always `Unsupported`.
    pub fn seek(&self, _pos: std::io::SeekFrom) -> FsResult<u64> {
        Err(FsError::Unsupported("seek"))
    }

    /// Objects cannot be resized in place; always `Unsupported`.
    pub fn truncate(&self, _size: i64) -> FsResult<()> {
        Err(FsError::Unsupported("truncate"))
    }

    /// A direct file is never a directory; always `Unsupported`.
    pub fn read_dir(&self, _count: Option<usize>) -> FsResult<Option<Vec<FileInfo>>> {
        Err(FsError::Unsupported("read_dir"))
    }

    /// Same as [`read_dir`](Self::read_dir); always `Unsupported`.
    pub fn read_dir_names(&self, _count: Option<usize>) -> FsResult<Option<Vec<String>>> {
        Err(FsError::Unsupported("read_dir_names"))
    }
}
