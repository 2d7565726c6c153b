//! # bucketfs
//!
//! A POSIX-like filesystem over an S3 bucket, for small files.
//!
//! S3 has no directories and no partial writes, so [`BucketFs`] keeps an
//! in-memory [`Namespace`]: creating `/a/b/c.txt` fabricates `/a` and
//! `/a/b` as local-only directories. Each file is a [`RemoteFile`] that
//! buffers content locally, fetching the object on first read and
//! uploading on close only when the MD5 of the buffer differs from the
//! remote entity tag.
//!
//! [`DirectFs`] is the other end of the trade: no namespace, no buffer,
//! one request per call.
//!
//! ```no_run
//! # async fn demo() -> bucketfs::FsResult<()> {
//! use std::sync::Arc;
//! use bucketfs::{BucketFs, MemoryBucket};
//!
//! let fs = BucketFs::new(Arc::new(MemoryBucket::new("demo")));
//! let file = fs.create("/notes/today.txt")?;
//! file.write_str("hello")?;
//! file.close().await?;
//! assert!(fs.stat("/notes")?.is_dir);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod direct;
mod error;
pub mod file;
pub mod fingerprint;
pub mod fs;
pub mod info;
pub mod namespace;
pub mod node;
pub mod path;
mod types;

pub use config::{FsConfig, FsOptions};
pub use direct::{DirectFile, DirectFs};
pub use error::{FsError, FsResult};
pub use file::RemoteFile;
pub use fs::BucketFs;
pub use info::{DIRECTORY_SIZE, FileInfo};
pub use namespace::Namespace;
pub use node::{Directory, Node};
pub use types::OpenFlags;

pub use bucketfs_store::{
    AccessLevel, BucketConfig, MemoryBucket, ObjectBucket, S3Bucket, StoreError, StoreResult,
};
