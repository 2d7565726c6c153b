//! # bucketfs-store
//!
//! Remote object store adapters for bucketfs.
//!
//! Everything that leaves the process goes through [`ObjectBucket`], a
//! single-bucket handle with the handful of verbs the filesystem layer
//! needs (head/get/put/delete/list/copy). Two implementations ship here:
//!
//! - [`S3Bucket`] - Amazon S3 (or any S3-compatible endpoint) via `aws-sdk-s3`
//! - [`MemoryBucket`] - in-process bucket with S3-style entity tags, for tests
//!
//! [`AccessLevel`] is the canned ACL carried by uploads and copies, and
//! [`AccessLevel::from_mode`] is the one-way translation from Unix
//! permission bits.

pub mod acl;
mod bucket;
mod config;
mod error;
mod memory;
mod s3;

pub use acl::AccessLevel;
pub use bucket::{ByteStream, ListPage, ListRequest, ObjectBucket, ObjectHead};
pub use config::BucketConfig;
pub use error::{StoreError, StoreResult};
pub use memory::{BucketStats, MemoryBucket, StoredObject};
pub use s3::S3Bucket;
