//! Namespace nodes.
//!
//! A [`Node`] is either a buffered [`RemoteFile`] or an in-memory
//! [`Directory`]. Both are cheap handles over shared state, so the
//! namespace map and a parent's `children` can hold the same node.

use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::SystemTime;

use crate::file::RemoteFile;
use crate::info::FileInfo;
use crate::path;

/// Mutable attributes shared by files and directories.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Attrs {
    pub mode: u32,
    pub modified_at: SystemTime,
}

impl Attrs {
    pub fn new(mode: u32) -> Self {
        Self {
            mode,
            modified_at: SystemTime::now(),
        }
    }
}

/// One path in the namespace.
#[derive(Debug, Clone)]
pub enum Node {
    /// A regular file.
    File(RemoteFile),
    /// A directory.
    Directory(Directory),
}

impl Node {
    /// Current path.
    pub fn path(&self) -> String {
        match self {
            Node::File(f) => f.path(),
            Node::Directory(d) => d.path(),
        }
    }

    /// Returns true for a directory.
    pub fn is_dir(&self) -> bool {
        matches!(self, Node::Directory(_))
    }

    /// The file, if this is one.
    pub fn as_file(&self) -> Option<&RemoteFile> {
        match self {
            Node::File(f) => Some(f),
            Node::Directory(_) => None,
        }
    }

    /// The directory, if this is one.
    pub fn as_dir(&self) -> Option<&Directory> {
        match self {
            Node::Directory(d) => Some(d),
            Node::File(_) => None,
        }
    }

    /// Metadata snapshot.
    pub fn stat(&self) -> FileInfo {
        match self {
            Node::File(f) => f.stat(),
            Node::Directory(d) => d.stat(),
        }
    }

    /// Permission bits.
    pub fn mode(&self) -> u32 {
        match self {
            Node::File(f) => f.mode(),
            Node::Directory(d) => d.mode(),
        }
    }

    /// Returns true if both handles refer to the same node.
    pub fn same_node(&self, other: &Node) -> bool {
        match (self, other) {
            (Node::File(a), Node::File(b)) => a.same_node(b),
            (Node::Directory(a), Node::Directory(b)) => Arc::ptr_eq(&a.inner, &b.inner),
            _ => false,
        }
    }

    pub(crate) fn set_path(&self, path: &str) {
        match self {
            Node::File(f) => f.set_path(path),
            Node::Directory(d) => *d.inner.path.write() = path.to_string(),
        }
    }

    pub(crate) fn set_mode(&self, mode: u32) {
        match self {
            Node::File(f) => f.set_mode(mode),
            Node::Directory(d) => d.inner.attrs.lock().mode = mode,
        }
    }

    pub(crate) fn set_modified(&self, modified: SystemTime) {
        match self {
            Node::File(f) => f.set_modified(modified),
            Node::Directory(d) => d.inner.attrs.lock().modified_at = modified,
        }
    }

    /// Rewind for a fresh open.
    pub(crate) fn reopen(&self) {
        match self {
            Node::File(f) => f.reopen(),
            Node::Directory(d) => d.inner.read_offset.store(0, Ordering::SeqCst),
        }
    }
}

struct DirInner {
    path: RwLock<String>,
    attrs: Mutex<Attrs>,
    children: RwLock<BTreeMap<String, Node>>,
    read_offset: AtomicUsize,
}

/// A directory that exists only in memory.
///
/// Children are keyed by base name and iterate in name order.
#[derive(Clone)]
pub struct Directory {
    inner: Arc<DirInner>,
}

impl fmt::Debug for Directory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Directory")
            .field("path", &*self.inner.path.read())
            .field("children", &self.inner.children.read().len())
            .finish()
    }
}

impl Directory {
    pub(crate) fn new(path: impl Into<String>, mode: u32) -> Self {
        Self {
            inner: Arc::new(DirInner {
                path: RwLock::new(path.into()),
                attrs: Mutex::new(Attrs::new(mode)),
                children: RwLock::new(BTreeMap::new()),
                read_offset: AtomicUsize::new(0),
            }),
        }
    }

    /// Current path.
    pub fn path(&self) -> String {
        self.inner.path.read().clone()
    }

    /// Permission bits.
    pub fn mode(&self) -> u32 {
        self.inner.attrs.lock().mode
    }

    /// Metadata snapshot.
    pub fn stat(&self) -> FileInfo {
        let attrs = *self.inner.attrs.lock();
        FileInfo::directory(&self.path(), attrs.modified_at, attrs.mode)
    }

    /// Names of the direct children, in order.
    pub fn child_names(&self) -> Vec<String> {
        self.inner.children.read().keys().cloned().collect()
    }

    /// Direct child by base name.
    pub fn child(&self, name: &str) -> Option<Node> {
        self.inner.children.read().get(name).cloned()
    }

    /// Number of direct children.
    pub fn len(&self) -> usize {
        self.inner.children.read().len()
    }

    /// Returns true if the directory has no children.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read directory entries from the listing offset.
    ///
    /// With `Some(n)` (n > 0) returns up to `n` entries, and `None` once
    /// nothing remains. With `None` (or `Some(0)`) returns everything that
    /// remains, possibly nothing, and never signals the end.
    pub fn read_dir(&self, count: Option<usize>) -> Option<Vec<FileInfo>> {
        let children = self.inner.children.read();
        let window = self.advance(children.len(), count)?;
        Some(
            children
                .values()
                .skip(window.0)
                .take(window.1)
                .map(Node::stat)
                .collect(),
        )
    }

    /// Like [`read_dir`](Self::read_dir), names only.
    pub fn read_dir_names(&self, count: Option<usize>) -> Option<Vec<String>> {
        let children = self.inner.children.read();
        let window = self.advance(children.len(), count)?;
        Some(
            children
                .keys()
                .skip(window.0)
                .take(window.1)
                .cloned()
                .collect(),
        )
    }

    /// Move the listing offset; returns (start, len) of the served window.
    fn advance(&self, total: usize, count: Option<usize>) -> Option<(usize, usize)> {
        let start = self.inner.read_offset.load(Ordering::SeqCst).min(total);
        let remaining = total - start;
        let take = match count {
            Some(n) if n > 0 => {
                if remaining == 0 {
                    return None;
                }
                n.min(remaining)
            }
            _ => remaining,
        };
        self.inner.read_offset.store(start + take, Ordering::SeqCst);
        Some((start, take))
    }

    pub(crate) fn attach(&self, node: Node) {
        let path = node.path();
        self.inner
            .children
            .write()
            .insert(path::base_name(&path).to_string(), node);
    }

    pub(crate) fn detach(&self, name: &str) -> Option<Node> {
        self.inner.children.write().remove(name)
    }
}
