//! Open flags.

const O_WRONLY: i32 = 0o1;
const O_RDWR: i32 = 0o2;
const O_CREAT: i32 = 0o100;
const O_TRUNC: i32 = 0o1000;

/// Flags passed to [`BucketFs::open_with_flags`](crate::BucketFs::open_with_flags).
///
/// Accepted and ignored: every buffered handle can read and write, and
/// nothing reaches the store before close. Reading is always implied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpenFlags {
    /// Write access requested.
    pub write: bool,
    /// Create if missing.
    pub create: bool,
    /// Truncate on open.
    pub truncate: bool,
}

impl OpenFlags {
    /// Read-only.
    pub fn read_only() -> Self {
        Self::default()
    }

    /// Create and truncate for writing.
    pub fn create_truncate() -> Self {
        Self {
            write: true,
            create: true,
            truncate: true,
        }
    }

    /// Decode POSIX `open(2)` flag bits (Linux values). Unknown bits are dropped.
    pub fn from_bits(bits: i32) -> Self {
        Self {
            write: bits & (O_WRONLY | O_RDWR) != 0,
            create: bits & O_CREAT != 0,
            truncate: bits & O_TRUNC != 0,
        }
    }
}
