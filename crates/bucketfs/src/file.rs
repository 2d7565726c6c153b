//! Buffered remote file.
//!
//! Content lives in a local buffer. The first read pulls the whole object
//! down (a missing object reads as empty), writes only ever touch the
//! buffer, and `close` uploads the buffer unless the remote entity tag
//! already matches its fingerprint.

use bucketfs_store::{AccessLevel, ObjectBucket, StoreError};
use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::io::SeekFrom;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::SystemTime;

use crate::error::{FsError, FsResult};
use crate::fingerprint;
use crate::info::FileInfo;
use crate::node::Attrs;
use crate::path;

struct FileInner {
    path: RwLock<String>,
    bucket: Arc<dyn ObjectBucket>,
    content_type: String,
    /// `None` until loaded from the store or written locally.
    content: Mutex<Option<Vec<u8>>>,
    cursor: AtomicU64,
    closed: AtomicBool,
    attrs: Mutex<Attrs>,
}

/// A file handle backed by one remote object.
///
/// Clones share the same node: buffer, cursor and closed flag.
#[derive(Clone)]
pub struct RemoteFile {
    inner: Arc<FileInner>,
}

impl fmt::Debug for RemoteFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteFile")
            .field("path", &*self.inner.path.read())
            .field("cursor", &self.inner.cursor.load(Ordering::SeqCst))
            .field("loaded", &self.is_loaded())
            .field("closed", &self.is_closed())
            .finish()
    }
}

fn to_index(pos: u64) -> FsResult<usize> {
    usize::try_from(pos).map_err(|_| FsError::OutOfRange(i64::try_from(pos).unwrap_or(i64::MAX)))
}

/// Resize `buf` to `len`, zero-filling. A length the allocator refuses is
/// `OutOfRange` rather than an abort.
fn resize_buffer(buf: &mut Vec<u8>, len: usize) -> FsResult<()> {
    if len > buf.len() {
        buf.try_reserve_exact(len - buf.len())
            .map_err(|_| FsError::OutOfRange(i64::try_from(len).unwrap_or(i64::MAX)))?;
    }
    buf.resize(len, 0);
    Ok(())
}

impl RemoteFile {
    pub(crate) fn new(
        path: impl Into<String>,
        bucket: Arc<dyn ObjectBucket>,
        content_type: impl Into<String>,
        mode: u32,
    ) -> Self {
        Self {
            inner: Arc::new(FileInner {
                path: RwLock::new(path.into()),
                bucket,
                content_type: content_type.into(),
                content: Mutex::new(None),
                cursor: AtomicU64::new(0),
                closed: AtomicBool::new(false),
                attrs: Mutex::new(Attrs::new(mode)),
            }),
        }
    }

    /// Current namespace path.
    pub fn path(&self) -> String {
        self.inner.path.read().clone()
    }

    /// Object key for the current path.
    pub fn key(&self) -> String {
        path::object_key(&self.inner.path.read()).to_string()
    }

    /// Permission bits.
    pub fn mode(&self) -> u32 {
        self.inner.attrs.lock().mode
    }

    /// Returns true once [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Returns true if content is held locally.
    pub fn is_loaded(&self) -> bool {
        self.inner.content.lock().is_some()
    }

    /// Length of the local buffer (zero when nothing is loaded).
    pub fn local_len(&self) -> u64 {
        self.inner
            .content
            .lock()
            .as_ref()
            .map_or(0, |c| c.len() as u64)
    }

    /// Current cursor position.
    pub fn position(&self) -> u64 {
        self.inner.cursor.load(Ordering::SeqCst)
    }

    /// Returns true if both handles refer to the same node.
    pub fn same_node(&self, other: &RemoteFile) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn set_path(&self, path: &str) {
        *self.inner.path.write() = path.to_string();
    }

    pub(crate) fn set_mode(&self, mode: u32) {
        self.inner.attrs.lock().mode = mode;
    }

    pub(crate) fn set_modified(&self, modified: SystemTime) {
        self.inner.attrs.lock().modified_at = modified;
    }

    pub(crate) fn reopen(&self) {
        self.inner.cursor.store(0, Ordering::SeqCst);
        self.inner.closed.store(false, Ordering::SeqCst);
    }

    fn ensure_open(&self) -> FsResult<()> {
        if self.is_closed() {
            return Err(FsError::closed(self.path()));
        }
        Ok(())
    }

    fn touch(&self) {
        self.set_modified(SystemTime::now());
    }

    /// Fetch the whole object into the buffer unless content is already held.
    async fn load(&self) -> FsResult<()> {
        let loaded = self.is_loaded();
        if loaded {
            return Ok(());
        }

        let key = self.key();
        let fetched = match self.inner.bucket.get(&key).await {
            Ok(data) => data.to_vec(),
            Err(StoreError::NotFound(_)) => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        tracing::trace!(key = %key, len = fetched.len(), "loaded remote content");

        // A write that landed while the fetch was in flight wins.
        let mut content = self.inner.content.lock();
        if content.is_none() {
            *content = Some(fetched);
        }
        Ok(())
    }

    /// Copy from the buffer at `pos`; `None` when `pos` is at or past the end.
    fn copy_out(&self, buf: &mut [u8], pos: u64) -> Option<usize> {
        let content = self.inner.content.lock();
        let data = content.as_deref().unwrap_or_default();
        let start = usize::try_from(pos).ok()?;
        if start >= data.len() {
            return None;
        }
        let n = buf.len().min(data.len() - start);
        buf[..n].copy_from_slice(&data[start..start + n]);
        Some(n)
    }

    /// Write `data` into the buffer at `pos`, zero-padding any gap.
    fn copy_in(&self, data: &[u8], pos: u64) -> FsResult<()> {
        let start = to_index(pos)?;
        let end = start
            .checked_add(data.len())
            .ok_or(FsError::OutOfRange(i64::MAX))?;
        let mut content = self.inner.content.lock();
        let buf = content.get_or_insert_with(Vec::new);
        if buf.len() < end {
            resize_buffer(buf, end)?;
        }
        buf[start..end].copy_from_slice(data);
        Ok(())
    }

    /// Read at the cursor.
    ///
    /// Returns `Some(0)` for an empty `buf`, `None` at end of file.
    pub async fn read(&self, buf: &mut [u8]) -> FsResult<Option<usize>> {
        self.ensure_open()?;
        if buf.is_empty() {
            return Ok(Some(0));
        }
        self.load().await?;

        let pos = self.position();
        let n = self.copy_out(buf, pos);
        if let Some(n) = n {
            self.inner.cursor.store(pos + n as u64, Ordering::SeqCst);
        }
        Ok(n)
    }

    /// Read at `offset` without moving the cursor.
    pub async fn read_at(&self, buf: &mut [u8], offset: u64) -> FsResult<Option<usize>> {
        self.ensure_open()?;
        if buf.is_empty() {
            return Ok(Some(0));
        }
        self.load().await?;
        Ok(self.copy_out(buf, offset))
    }

    /// Read everything from the cursor to the end.
    pub async fn read_to_end(&self) -> FsResult<Vec<u8>> {
        self.ensure_open()?;
        self.load().await?;

        let pos = self.position();
        let rest = {
            let content = self.inner.content.lock();
            let data = content.as_deref().unwrap_or_default();
            usize::try_from(pos)
                .ok()
                .and_then(|start| data.get(start..))
                .map(<[u8]>::to_vec)
                .unwrap_or_default()
        };
        self.inner
            .cursor
            .store(pos + rest.len() as u64, Ordering::SeqCst);
        Ok(rest)
    }

    /// Write at the cursor. Never contacts the store.
    pub fn write(&self, data: &[u8]) -> FsResult<usize> {
        self.ensure_open()?;
        let pos = self.position();
        self.copy_in(data, pos)?;
        self.inner
            .cursor
            .store(pos + data.len() as u64, Ordering::SeqCst);
        self.touch();
        Ok(data.len())
    }

    /// Write a string at the cursor.
    pub fn write_str(&self, s: &str) -> FsResult<usize> {
        self.write(s.as_bytes())
    }

    /// Write at `offset` without moving the cursor.
    pub fn write_at(&self, data: &[u8], offset: u64) -> FsResult<usize> {
        self.ensure_open()?;
        self.copy_in(data, offset)?;
        self.touch();
        Ok(data.len())
    }

    /// Move the cursor. Positions past the end are allowed.
    pub fn seek(&self, pos: SeekFrom) -> FsResult<u64> {
        self.ensure_open()?;
        let (base, delta) = match pos {
            SeekFrom::Start(n) => (0, i64::try_from(n).map_err(|_| FsError::OutOfRange(i64::MAX))?),
            SeekFrom::Current(d) => (self.position(), d),
            SeekFrom::End(d) => (self.local_len(), d),
        };
        let base = i64::try_from(base).map_err(|_| FsError::OutOfRange(i64::MAX))?;
        let target = base.checked_add(delta).ok_or(FsError::OutOfRange(i64::MAX))?;
        let target = u64::try_from(target).map_err(|_| FsError::OutOfRange(target))?;
        self.inner.cursor.store(target, Ordering::SeqCst);
        Ok(target)
    }

    /// Resize the buffer, zero-filling when it grows. The cursor stays put.
    pub fn truncate(&self, size: i64) -> FsResult<()> {
        self.ensure_open()?;
        let len = u64::try_from(size).map_err(|_| FsError::OutOfRange(size))?;
        let len = to_index(len)?;
        resize_buffer(self.inner.content.lock().get_or_insert_with(Vec::new), len)?;
        self.touch();
        Ok(())
    }

    /// Close the handle and flush the buffer if the remote copy differs.
    ///
    /// The handle is closed even when the flush fails.
    #[tracing::instrument(skip(self), fields(path = %self.path()), name = "file.close")]
    pub async fn close(&self) -> FsResult<()> {
        self.inner.closed.store(true, Ordering::SeqCst);

        let key = self.key();
        let data = self.inner.content.lock().clone().unwrap_or_default();
        let bucket = self.inner.bucket.as_ref();

        if !fingerprint::needs_upload(bucket, &key, &data).await? {
            tracing::debug!(key = %key, "remote content matches, skipping upload");
            return Ok(());
        }

        let access = AccessLevel::from_mode(self.mode());
        let len = data.len();
        bucket
            .put(&key, Bytes::from(data), &self.inner.content_type, access)
            .await?;
        tracing::debug!(key = %key, len, access = %access, "uploaded");
        Ok(())
    }

    /// Nothing is staged between close calls, so there is nothing to sync.
    pub fn sync(&self) -> FsResult<()> {
        Ok(())
    }

    /// Metadata snapshot from the local state.
    pub fn stat(&self) -> FileInfo {
        let attrs = *self.inner.attrs.lock();
        FileInfo::file(&self.path(), self.local_len(), attrs.modified_at, attrs.mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bucketfs_store::MemoryBucket;

    fn file_in(bucket: &Arc<MemoryBucket>, path: &str) -> RemoteFile {
        RemoteFile::new(path, bucket.clone(), "application/octet-stream", 0o600)
    }

    #[tokio::test]
    async fn test_first_read_fetches_once() {
        let bucket = Arc::new(MemoryBucket::default());
        bucket.insert("notes.txt", "remote text");
        let file = file_in(&bucket, "/notes.txt");

        let mut buf = [0u8; 6];
        assert_eq!(file.read(&mut buf).await.unwrap(), Some(6));
        assert_eq!(&buf, b"remote");
        assert_eq!(file.read_to_end().await.unwrap(), b" text");
        assert_eq!(file.read(&mut buf).await.unwrap(), None);
        assert_eq!(bucket.stats().gets, 1);
    }

    #[tokio::test]
    async fn test_missing_object_reads_empty() {
        let bucket = Arc::new(MemoryBucket::default());
        let file = file_in(&bucket, "/ghost");

        let mut buf = [0u8; 4];
        assert_eq!(file.read(&mut buf).await.unwrap(), None);
        assert!(file.is_loaded());
    }

    #[tokio::test]
    async fn test_zero_length_read() {
        let bucket = Arc::new(MemoryBucket::default());
        let file = file_in(&bucket, "/empty");

        assert_eq!(file.read(&mut []).await.unwrap(), Some(0));
        assert_eq!(bucket.stats().gets, 0);

        file.write(b"ab").unwrap();
        assert_eq!(file.read(&mut []).await.unwrap(), Some(0));
        assert_eq!(file.read_at(&mut [], 100).await.unwrap(), Some(0));
    }

    #[tokio::test]
    async fn test_write_never_fetches() {
        let bucket = Arc::new(MemoryBucket::default());
        bucket.insert("a", "0123456789");
        let file = file_in(&bucket, "/a");

        file.write_str("xy").unwrap();
        file.write_at(b"!", 4).unwrap();
        assert_eq!(bucket.stats().gets, 0);
        assert_eq!(file.position(), 2);

        file.seek(SeekFrom::Start(0)).unwrap();
        assert_eq!(file.read_to_end().await.unwrap(), b"xy\0\0!");
    }

    #[tokio::test]
    async fn test_read_at_keeps_cursor() {
        let bucket = Arc::new(MemoryBucket::default());
        bucket.insert("r", "abcdef");
        let file = file_in(&bucket, "/r");

        let mut buf = [0u8; 3];
        assert_eq!(file.read_at(&mut buf, 2).await.unwrap(), Some(3));
        assert_eq!(&buf, b"cde");
        assert_eq!(file.position(), 0);
        assert_eq!(file.read_at(&mut buf, 6).await.unwrap(), None);
    }

    #[test]
    fn test_seek() {
        let bucket = Arc::new(MemoryBucket::default());
        let file = file_in(&bucket, "/s");
        file.write(b"hello").unwrap();

        assert_eq!(file.seek(SeekFrom::End(-2)).unwrap(), 3);
        assert_eq!(file.seek(SeekFrom::Current(10)).unwrap(), 13);
        assert!(matches!(
            file.seek(SeekFrom::Current(-20)),
            Err(FsError::OutOfRange(-7))
        ));
        // A failed seek leaves the cursor alone.
        assert_eq!(file.position(), 13);
    }

    #[test]
    fn test_truncate() {
        let bucket = Arc::new(MemoryBucket::default());
        let file = file_in(&bucket, "/t");
        file.write(b"hello, world!").unwrap();

        file.truncate(1024).unwrap();
        assert_eq!(file.local_len(), 1024);

        file.truncate(5).unwrap();
        assert_eq!(file.stat().size, 5);

        assert!(matches!(file.truncate(-1), Err(FsError::OutOfRange(-1))));
    }

    #[test]
    fn test_unallocatable_sizes_are_out_of_range() {
        let bucket = Arc::new(MemoryBucket::default());
        let file = file_in(&bucket, "/huge");
        file.write(b"keep").unwrap();

        assert!(matches!(
            file.truncate(i64::MAX),
            Err(FsError::OutOfRange(i64::MAX))
        ));
        assert!(matches!(
            file.write_at(b"x", u64::MAX / 2),
            Err(FsError::OutOfRange(_))
        ));
        file.seek(SeekFrom::Start(u64::MAX / 4)).unwrap();
        assert!(matches!(file.write(b"x"), Err(FsError::OutOfRange(_))));

        // The buffer is untouched by the failed calls.
        assert_eq!(file.local_len(), 4);
        assert_eq!(file.position(), u64::MAX / 4);
    }

    #[tokio::test]
    async fn test_closed_handle() {
        let bucket = Arc::new(MemoryBucket::default());
        let file = file_in(&bucket, "/c");
        file.close().await.unwrap();

        assert!(matches!(file.write(b"x"), Err(FsError::ClosedHandle(_))));
        assert!(matches!(file.read(&mut [0u8; 1]).await, Err(FsError::ClosedHandle(_))));
        assert!(matches!(file.seek(SeekFrom::Start(0)), Err(FsError::ClosedHandle(_))));
        assert!(matches!(file.truncate(0), Err(FsError::ClosedHandle(_))));
        file.sync().unwrap();
    }

    #[tokio::test]
    async fn test_close_uploads_with_mode_acl() {
        let bucket = Arc::new(MemoryBucket::default());
        let file = file_in(&bucket, "/pub/page.html");
        file.set_mode(0o644);
        file.write_str("<html>").unwrap();
        file.close().await.unwrap();

        let stored = bucket.object("pub/page.html").unwrap();
        assert_eq!(stored.data, Bytes::from_static(b"<html>"));
        assert_eq!(stored.access, AccessLevel::PublicRead);
        assert_eq!(stored.content_type, "application/octet-stream");
    }

    #[tokio::test]
    async fn test_close_skips_identical_content() {
        let bucket = Arc::new(MemoryBucket::default());
        bucket.insert("same", "payload");
        let file = file_in(&bucket, "/same");
        file.write_str("payload").unwrap();
        file.close().await.unwrap();

        let stats = bucket.stats();
        assert_eq!(stats.heads, 1);
        assert_eq!(stats.puts, 0);
    }

    #[tokio::test]
    async fn test_close_untouched_missing_object_uploads_empty() {
        let bucket = Arc::new(MemoryBucket::default());
        let file = file_in(&bucket, "/new");
        file.close().await.unwrap();

        assert_eq!(bucket.object("new").unwrap().data.len(), 0);
        assert_eq!(bucket.stats().puts, 1);
    }
}
