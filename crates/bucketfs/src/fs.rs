//! The buffered filesystem.

use bucketfs_store::{AccessLevel, ListRequest, ObjectBucket, S3Bucket, StoreError};
use std::sync::Arc;
use std::time::SystemTime;

use crate::config::{FsConfig, FsOptions};
use crate::error::{FsError, FsResult};
use crate::file::RemoteFile;
use crate::info::FileInfo;
use crate::namespace::{Moved, Namespace};
use crate::node::Node;
use crate::path::{self, ROOT};
use crate::types::OpenFlags;

/// A filesystem over one bucket with an in-memory namespace.
///
/// Namespace operations never reach the store except where they have to
/// (remove, remove_all, rename). File content is fetched lazily and
/// uploaded on close.
pub struct BucketFs {
    bucket: Arc<dyn ObjectBucket>,
    namespace: Arc<Namespace>,
    options: FsOptions,
}

impl std::fmt::Debug for BucketFs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BucketFs")
            .field("bucket", &self.bucket.name())
            .field("nodes", &self.namespace.node_count())
            .field("options", &self.options)
            .finish()
    }
}

impl BucketFs {
    /// Filesystem over `bucket` with default options.
    pub fn new(bucket: Arc<dyn ObjectBucket>) -> Self {
        Self::with_options(bucket, FsOptions::default())
    }

    /// Filesystem over `bucket` with `options`.
    pub fn with_options(bucket: Arc<dyn ObjectBucket>, options: FsOptions) -> Self {
        Self {
            bucket,
            namespace: Arc::new(Namespace::with_dir_mode(options.dir_mode)),
            options,
        }
    }

    /// Use a shared namespace instead of a private one.
    pub fn with_namespace(mut self, namespace: Arc<Namespace>) -> Self {
        self.namespace = namespace;
        self
    }

    /// Connect to S3 as described by `config`.
    pub async fn from_config(config: &FsConfig) -> Self {
        let bucket = S3Bucket::from_config(&config.bucket).await;
        Self::with_options(Arc::new(bucket), config.files.clone())
    }

    /// Human-readable description.
    pub fn name(&self) -> String {
        format!("BucketFs: s3-backed buffered fs ({})", self.bucket.name())
    }

    /// The namespace.
    pub fn namespace(&self) -> &Arc<Namespace> {
        &self.namespace
    }

    /// The bucket.
    pub fn bucket(&self) -> &Arc<dyn ObjectBucket> {
        &self.bucket
    }

    /// Options in effect.
    pub fn options(&self) -> &FsOptions {
        &self.options
    }

    /// Create a file, replacing any file already at `path`.
    ///
    /// Nothing is fetched: the first read pulls the remote object, if any.
    pub fn create(&self, path: &str) -> FsResult<RemoteFile> {
        let path = path::clean(path);
        let file = RemoteFile::new(
            &path,
            self.bucket.clone(),
            &self.options.content_type,
            self.options.file_mode,
        );
        self.namespace.insert_file(file.clone())?;
        tracing::debug!(path = %path, "created");
        Ok(file)
    }

    /// Create a directory. An existing directory is fine.
    pub fn mkdir(&self, path: &str, mode: u32) -> FsResult<()> {
        self.namespace.insert_dir(&path::clean(path), mode)?;
        Ok(())
    }

    /// Create a directory and any missing ancestors.
    pub fn mkdir_all(&self, path: &str, mode: u32) -> FsResult<()> {
        self.mkdir(path, mode)
    }

    /// Open an existing node, rewinding it.
    pub fn open(&self, path: &str) -> FsResult<Node> {
        let path = path::clean(path);
        let node = self
            .namespace
            .get(&path)
            .ok_or_else(|| FsError::not_found(&path))?;
        node.reopen();
        Ok(node)
    }

    /// Open an existing regular file, rewinding it.
    pub fn open_file(&self, path: &str) -> FsResult<RemoteFile> {
        match self.open(path)? {
            Node::File(file) => Ok(file),
            Node::Directory(dir) => Err(FsError::is_a_directory(dir.path())),
        }
    }

    /// Open an existing node and apply `mode`. Flags are ignored.
    pub fn open_with_flags(&self, path: &str, _flags: OpenFlags, mode: u32) -> FsResult<Node> {
        let node = self.open(path)?;
        node.set_mode(mode);
        Ok(node)
    }

    /// Metadata for `path`.
    ///
    /// Goes through [`open`](Self::open), so the node is rewound and
    /// reopened as a side effect.
    pub fn stat(&self, path: &str) -> FsResult<FileInfo> {
        Ok(self.open(path)?.stat())
    }

    /// Set permission bits.
    pub fn chmod(&self, path: &str, mode: u32) -> FsResult<()> {
        self.namespace.set_mode(&path::clean(path), mode)
    }

    /// Set the modification time. The access time is not stored.
    pub fn set_times(&self, path: &str, _atime: SystemTime, mtime: SystemTime) -> FsResult<()> {
        self.namespace.set_modified(&path::clean(path), mtime)
    }

    /// Delete the remote object and the local node.
    ///
    /// Directories have no remote object. A failed remote delete is an
    /// error only when there is no local node to remove.
    #[tracing::instrument(skip(self), name = "fs.remove")]
    pub async fn remove(&self, path: &str) -> FsResult<()> {
        let path = path::clean(path);
        if path == ROOT {
            return Err(FsError::invalid_path(path));
        }

        let local = self.namespace.get(&path);
        if !local.as_ref().is_some_and(Node::is_dir) {
            if let Err(e) = self.bucket.delete(path::object_key(&path)).await {
                if local.is_none() {
                    return Err(e.into());
                }
                tracing::warn!(path = %path, error = %e, "remote delete failed, removing local node");
            }
        }

        self.namespace.remove(&path);
        Ok(())
    }

    /// Remove every node and object whose path starts with `path`.
    ///
    /// Matching is by string prefix, so `/foo` also removes `/foobar`.
    #[tracing::instrument(skip(self), name = "fs.remove_all")]
    pub async fn remove_all(&self, path: &str) -> FsResult<()> {
        let path = path::clean(path);
        let removed = self.namespace.remove_prefix(&path);
        tracing::debug!(count = removed.len(), "removed local nodes");

        let prefix = path::object_key(&path);
        let mut token = None;
        loop {
            let request = ListRequest::prefix(prefix)
                .with_max_keys(self.options.list_page_size)
                .with_token(token.take());
            let page = self.bucket.list(request).await?;

            let keys = page.keys();
            if !keys.is_empty() {
                self.bucket.delete_multiple(&keys).await?;
                tracing::debug!(count = keys.len(), "deleted remote objects");
            }

            token = page.next_token;
            if !page.is_truncated || token.is_none() {
                break;
            }
        }
        Ok(())
    }

    /// Rename a file or directory.
    ///
    /// The namespace changes first; remote objects are then copied to their
    /// new keys and the old keys deleted, one file at a time. Files that
    /// were never flushed have nothing to copy.
    #[tracing::instrument(skip(self), name = "fs.rename")]
    pub async fn rename(&self, old: &str, new: &str) -> FsResult<()> {
        let old = path::clean(old);
        let new = path::clean(new);
        let moved = self.namespace.rename(&old, &new)?;

        for Moved { from, to, file } in moved {
            let from_key = path::object_key(&from);
            let access = AccessLevel::from_mode(file.mode());
            match self.bucket.copy(path::object_key(&to), access, from_key).await {
                Ok(()) => self.bucket.delete(from_key).await?,
                Err(StoreError::NotFound(_)) => {
                    tracing::debug!(from = %from, "no remote object to move");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bucketfs_store::MemoryBucket;

    fn fs() -> (Arc<MemoryBucket>, BucketFs) {
        let bucket = Arc::new(MemoryBucket::new("unit"));
        let fs = BucketFs::new(bucket.clone());
        (bucket, fs)
    }

    #[test]
    fn test_create_never_contacts_store() {
        let (bucket, fs) = fs();
        fs.create("a/b/c.txt").unwrap();
        fs.mkdir("/x", 0o755).unwrap();
        fs.mkdir_all("/x/y/z", 0o755).unwrap();

        assert_eq!(bucket.stats(), Default::default());
        assert!(fs.stat("/a/b").unwrap().is_dir);
        assert_eq!(fs.stat("/x/y/z").unwrap().mode, 0o755);
        // Fabricated ancestors take the configured directory mode.
        assert_eq!(fs.stat("/x/y").unwrap().mode, 0o700);
    }

    #[test]
    fn test_mkdir_over_file() {
        let (_, fs) = fs();
        fs.create("/f").unwrap();
        assert!(matches!(fs.mkdir("/f", 0o700), Err(FsError::AlreadyExists(_))));
        fs.mkdir("/d", 0o700).unwrap();
        fs.mkdir("/d", 0o700).unwrap();
        assert!(matches!(fs.create("/d"), Err(FsError::IsADirectory(_))));
    }

    #[tokio::test]
    async fn test_open_rewinds_and_reopens() {
        let (_, fs) = fs();
        let file = fs.create("/r.txt").unwrap();
        file.write_str("abc").unwrap();
        file.close().await.unwrap();

        let again = fs.open_file("/r.txt").unwrap();
        assert!(again.same_node(&file));
        assert!(!again.is_closed());
        assert_eq!(again.read_to_end().await.unwrap(), b"abc");

        assert!(fs.open("/missing").unwrap_err().is_not_found());
        assert!(matches!(fs.open_file("/"), Err(FsError::IsADirectory(_))));
    }

    #[tokio::test]
    async fn test_stat_rewinds_like_open() {
        let (_, fs) = fs();
        let file = fs.create("/s").unwrap();
        file.write(b"12345").unwrap();
        file.close().await.unwrap();

        let info = fs.stat("/s").unwrap();
        assert_eq!(info.size, 5);
        assert_eq!(info.name, "s");
        assert_eq!(file.position(), 0);
        assert!(!file.is_closed());
        assert_eq!(file.read_to_end().await.unwrap(), b"12345");

        fs.create("/d/a").unwrap();
        let Node::Directory(dir) = fs.open("/d").unwrap() else {
            panic!("/d is a directory");
        };
        assert_eq!(dir.read_dir_names(Some(1)).unwrap(), vec!["a"]);
        assert!(dir.read_dir_names(Some(1)).is_none());
        assert!(fs.stat("/d").unwrap().is_dir);
        assert_eq!(dir.read_dir_names(Some(1)).unwrap(), vec!["a"]);

        assert!(fs.stat("/missing").unwrap_err().is_not_found());
    }

    #[test]
    fn test_open_with_flags_applies_mode() {
        let (_, fs) = fs();
        fs.create("/m").unwrap();
        let node = fs
            .open_with_flags("/m", OpenFlags::create_truncate(), 0o644)
            .unwrap();
        assert_eq!(node.mode(), 0o644);
        assert_eq!(fs.stat("/m").unwrap().mode, 0o644);
    }

    #[test]
    fn test_chmod_and_times() {
        let (_, fs) = fs();
        fs.create("/t").unwrap();
        fs.chmod("/t", 0o640).unwrap();
        fs.set_times("/t", SystemTime::now(), SystemTime::UNIX_EPOCH)
            .unwrap();

        let info = fs.stat("/t").unwrap();
        assert_eq!(info.mode, 0o640);
        assert_eq!(info.modified, SystemTime::UNIX_EPOCH);

        assert!(fs.chmod("/nope", 0o600).unwrap_err().is_not_found());
        assert!(
            fs.set_times("/nope", SystemTime::now(), SystemTime::now())
                .unwrap_err()
                .is_not_found()
        );
    }

    #[tokio::test]
    async fn test_remove() {
        let (bucket, fs) = fs();
        let file = fs.create("/dir/gone.txt").unwrap();
        file.write_str("bye").unwrap();
        file.close().await.unwrap();
        assert!(bucket.contains("dir/gone.txt"));

        fs.remove("/dir/gone.txt").await.unwrap();
        assert!(!bucket.contains("dir/gone.txt"));
        assert!(fs.stat("/dir/gone.txt").unwrap_err().is_not_found());
        assert!(fs.namespace().get("/dir").unwrap().as_dir().unwrap().is_empty());

        // Directories have no object: no delete request is sent.
        let deletes = bucket.stats().deletes;
        fs.remove("/dir").await.unwrap();
        assert_eq!(bucket.stats().deletes, deletes);

        assert!(matches!(fs.remove("/").await, Err(FsError::InvalidPath(_))));
    }

    #[tokio::test]
    async fn test_remove_unknown_path_deletes_remote() {
        let (bucket, fs) = fs();
        bucket.insert("stray", "x");
        fs.remove("/stray").await.unwrap();
        assert!(!bucket.contains("stray"));
    }

    #[tokio::test]
    async fn test_rename_unflushed_file() {
        let (bucket, fs) = fs();
        fs.create("/draft").unwrap();
        fs.rename("/draft", "/final").await.unwrap();

        assert!(fs.stat("/final").is_ok());
        assert!(bucket.keys().is_empty());
        assert_eq!(bucket.stats().copies, 1);
        assert_eq!(bucket.stats().deletes, 0);
    }

    #[test]
    fn test_name() {
        let (_, fs) = fs();
        assert!(fs.name().contains("unit"));
    }
}
