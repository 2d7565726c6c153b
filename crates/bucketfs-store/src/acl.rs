//! Canned access levels and the permission-bit translation.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

const OTHER_WRITE: u32 = 0o002;
const OTHER_READ: u32 = 0o004;
const GROUP_WRITE: u32 = 0o020;
const GROUP_READ: u32 = 0o040;

/// Remote access level attached to an uploaded or copied object.
///
/// The string forms are the S3 canned ACL names.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum AccessLevel {
    /// Owner only.
    #[default]
    Private,
    /// Anyone may read.
    PublicRead,
    /// Anyone may read and write.
    PublicReadWrite,
    /// Bucket owner may read.
    BucketOwnerRead,
    /// Bucket owner has full control.
    BucketOwnerFullControl,
}

impl AccessLevel {
    /// Translate Unix permission bits into an access level.
    ///
    /// First match wins: other-write, other-read, group-write, group-read,
    /// then private. Owner and execute bits never matter. There is no
    /// way back from an access level to a mode.
    pub fn from_mode(mode: u32) -> Self {
        if mode & OTHER_WRITE != 0 {
            Self::PublicReadWrite
        } else if mode & OTHER_READ != 0 {
            Self::PublicRead
        } else if mode & GROUP_WRITE != 0 {
            Self::BucketOwnerFullControl
        } else if mode & GROUP_READ != 0 {
            Self::BucketOwnerRead
        } else {
            Self::Private
        }
    }
}
