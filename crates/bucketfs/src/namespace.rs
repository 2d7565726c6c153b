//! The in-memory namespace.
//!
//! Every node is indexed twice: by absolute path in the map, and by base
//! name in its parent directory's children. Both views change together
//! under the map's write lock. Directories that a new path needs but that
//! do not exist yet are fabricated on the way up.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::SystemTime;

use crate::error::{FsError, FsResult};
use crate::file::RemoteFile;
use crate::node::{Directory, Node};
use crate::path::{self, ROOT};

/// Mode for directories fabricated without an explicit mode.
pub const DEFAULT_DIR_MODE: u32 = 0o700;

type NodeMap = HashMap<String, Node>;

/// A file that moved during a rename.
#[derive(Debug, Clone)]
pub(crate) struct Moved {
    pub from: String,
    pub to: String,
    pub file: RemoteFile,
}

/// Path-indexed namespace with directory fabrication.
///
/// Paths passed in must already be cleaned (see [`path::clean`]).
/// Several filesystems may share one namespace through an `Arc`.
#[derive(Debug)]
pub struct Namespace {
    nodes: RwLock<NodeMap>,
    dir_mode: u32,
}

impl Default for Namespace {
    fn default() -> Self {
        Self::new()
    }
}

impl Namespace {
    /// Create a namespace holding only the root.
    pub fn new() -> Self {
        Self::with_dir_mode(DEFAULT_DIR_MODE)
    }

    /// Create a namespace whose fabricated directories get `dir_mode`.
    pub fn with_dir_mode(dir_mode: u32) -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(ROOT.to_string(), Node::Directory(Directory::new(ROOT, dir_mode)));
        Self {
            nodes: RwLock::new(nodes),
            dir_mode,
        }
    }

    /// Node at `path`.
    pub fn get(&self, path: &str) -> Option<Node> {
        self.nodes.read().get(path).cloned()
    }

    /// Returns true if `path` exists.
    pub fn contains(&self, path: &str) -> bool {
        self.nodes.read().contains_key(path)
    }

    /// All paths, sorted.
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.nodes.read().keys().cloned().collect();
        paths.sort();
        paths
    }

    /// Number of nodes, root included, so never zero.
    pub fn node_count(&self) -> usize {
        self.nodes.read().len()
    }

    /// The root directory.
    pub fn root(&self) -> Directory {
        match self.nodes.read().get(ROOT) {
            Some(Node::Directory(d)) => d.clone(),
            _ => Directory::new(ROOT, self.dir_mode),
        }
    }

    /// Insert a file, replacing any file already at its path.
    pub(crate) fn insert_file(&self, file: RemoteFile) -> FsResult<()> {
        let path = file.path();
        let mut nodes = self.nodes.write();
        if let Some(Node::Directory(_)) = nodes.get(&path) {
            return Err(FsError::is_a_directory(path));
        }
        check_ancestors(&nodes, &path)?;

        let node = Node::File(file);
        nodes.insert(path, node.clone());
        self.register(&mut nodes, node);
        Ok(())
    }

    /// Insert a directory. An existing directory is returned as is.
    pub(crate) fn insert_dir(&self, path: &str, mode: u32) -> FsResult<Directory> {
        let mut nodes = self.nodes.write();
        match nodes.get(path) {
            Some(Node::Directory(d)) => return Ok(d.clone()),
            Some(Node::File(_)) => return Err(FsError::already_exists(path)),
            None => {}
        }
        check_ancestors(&nodes, path)?;

        let dir = Directory::new(path, mode);
        nodes.insert(path.to_string(), Node::Directory(dir.clone()));
        self.register(&mut nodes, Node::Directory(dir.clone()));
        Ok(dir)
    }

    /// Remove one node. Children of a removed directory stay in the map.
    pub(crate) fn remove(&self, path: &str) -> Option<Node> {
        if path == ROOT {
            return None;
        }
        let mut nodes = self.nodes.write();
        let node = nodes.remove(path)?;
        detach(&nodes, path);
        Some(node)
    }

    /// Remove every node whose path starts with `prefix`, root excepted.
    ///
    /// This is a plain string prefix: `/foo` also takes `/foobar`.
    pub(crate) fn remove_prefix(&self, prefix: &str) -> Vec<Node> {
        let mut nodes = self.nodes.write();
        let mut doomed: Vec<String> = nodes
            .keys()
            .filter(|p| p.as_str() != ROOT && p.starts_with(prefix))
            .cloned()
            .collect();
        // Deepest first, so parents are still around to detach from.
        doomed.sort_by(|a, b| b.cmp(a));

        let mut removed = Vec::with_capacity(doomed.len());
        for path in doomed {
            detach(&nodes, &path);
            if let Some(node) = nodes.remove(&path) {
                removed.push(node);
            }
        }
        removed
    }

    /// Move `old` (and, for a directory, everything beneath it) to `new`.
    ///
    /// Returns the regular files that moved so the caller can move their
    /// remote objects.
    pub(crate) fn rename(&self, old: &str, new: &str) -> FsResult<Vec<Moved>> {
        if old == ROOT {
            return Err(FsError::invalid_path(old));
        }
        let mut nodes = self.nodes.write();
        let node = nodes.get(old).cloned().ok_or_else(|| FsError::not_found(old))?;
        if nodes.contains_key(new) {
            return Err(FsError::destination_exists(new));
        }
        if node.is_dir() && path::is_within(new, old) {
            return Err(FsError::invalid_path(new));
        }
        check_ancestors(&nodes, new)?;

        let affected: Vec<String> = if node.is_dir() {
            nodes
                .keys()
                .filter(|p| path::is_within(p, old))
                .cloned()
                .collect()
        } else {
            vec![old.to_string()]
        };

        detach(&nodes, old);
        let mut moved = Vec::new();
        for from in affected {
            let Some(n) = nodes.remove(&from) else {
                continue;
            };
            let to = format!("{new}{}", &from[old.len()..]);
            n.set_path(&to);
            if let Node::File(file) = &n {
                moved.push(Moved {
                    from,
                    to: to.clone(),
                    file: file.clone(),
                });
            }
            nodes.insert(to, n);
        }

        self.register(&mut nodes, node);
        Ok(moved)
    }

    /// Set permission bits on the node at `path`.
    pub(crate) fn set_mode(&self, path: &str, mode: u32) -> FsResult<()> {
        let node = self.get(path).ok_or_else(|| FsError::not_found(path))?;
        node.set_mode(mode);
        Ok(())
    }

    /// Set the modification time on the node at `path`.
    pub(crate) fn set_modified(&self, path: &str, modified: SystemTime) -> FsResult<()> {
        let node = self.get(path).ok_or_else(|| FsError::not_found(path))?;
        node.set_modified(modified);
        Ok(())
    }

    /// Attach `node` to its parent, fabricating missing ancestors.
    ///
    /// Stops at the first ancestor that already exists.
    fn register(&self, nodes: &mut NodeMap, node: Node) {
        let mut current = node;
        loop {
            let child_path = current.path();
            let Some(parent) = path::parent(&child_path) else {
                break;
            };
            match nodes.get(parent) {
                Some(Node::Directory(dir)) => {
                    dir.attach(current);
                    break;
                }
                // Ruled out by check_ancestors.
                Some(Node::File(_)) => break,
                None => {
                    let dir = Directory::new(parent, self.dir_mode);
                    dir.attach(current);
                    nodes.insert(parent.to_string(), Node::Directory(dir.clone()));
                    tracing::trace!(path = %parent, "fabricated directory");
                    current = Node::Directory(dir);
                }
            }
        }
    }
}

/// Fail if a regular file sits where an ancestor directory of `path` must be.
fn check_ancestors(nodes: &NodeMap, path: &str) -> FsResult<()> {
    for ancestor in path::ancestors(path) {
        match nodes.get(ancestor) {
            Some(Node::File(_)) => return Err(FsError::not_a_directory(ancestor)),
            Some(Node::Directory(_)) => return Ok(()),
            None => {}
        }
    }
    Ok(())
}

/// Drop `path` from its parent's children.
fn detach(nodes: &NodeMap, path: &str) {
    if let Some(Node::Directory(parent)) = path::parent(path).and_then(|p| nodes.get(p)) {
        parent.detach(path::base_name(path));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bucketfs_store::MemoryBucket;
    use std::sync::Arc;

    fn file(path: &str) -> RemoteFile {
        RemoteFile::new(path, Arc::new(MemoryBucket::default()), "text/plain", 0o600)
    }

    fn dir(ns: &Namespace, path: &str) -> Directory {
        ns.get(path)
            .and_then(|n| n.as_dir().cloned())
            .unwrap_or_else(|| panic!("{path} is not a directory"))
    }

    #[test]
    fn test_fabricates_ancestors_once() {
        let ns = Namespace::new();
        ns.insert_file(file("/a/b/c.txt")).unwrap();
        ns.insert_file(file("/a/b/d.txt")).unwrap();

        assert_eq!(ns.paths(), vec!["/", "/a", "/a/b", "/a/b/c.txt", "/a/b/d.txt"]);
        assert_eq!(dir(&ns, "/").child_names(), vec!["a"]);
        assert_eq!(dir(&ns, "/a").child_names(), vec!["b"]);
        assert_eq!(dir(&ns, "/a/b").child_names(), vec!["c.txt", "d.txt"]);
        assert_eq!(dir(&ns, "/a").mode(), DEFAULT_DIR_MODE);
    }

    #[test]
    fn test_node_count_includes_root() {
        let ns = Namespace::new();
        assert_eq!(ns.node_count(), 1);
        ns.insert_file(file("/x/y")).unwrap();
        assert_eq!(ns.node_count(), 3);
    }

    #[test]
    fn test_file_blocks_path() {
        let ns = Namespace::new();
        ns.insert_file(file("/f")).unwrap();

        let err = ns.insert_file(file("/f/g/h")).unwrap_err();
        assert!(matches!(err, FsError::NotADirectory(p) if p == "/f"));
        assert_eq!(ns.paths(), vec!["/", "/f"]);
    }

    #[test]
    fn test_file_over_directory() {
        let ns = Namespace::new();
        ns.insert_dir("/d", 0o755).unwrap();
        assert!(matches!(
            ns.insert_file(file("/d")),
            Err(FsError::IsADirectory(_))
        ));
        assert!(matches!(ns.insert_file(file("/")), Err(FsError::IsADirectory(_))));
    }

    #[test]
    fn test_replace_file() {
        let ns = Namespace::new();
        let first = file("/x");
        let second = file("/x");
        ns.insert_file(first.clone()).unwrap();
        ns.insert_file(second.clone()).unwrap();

        let current = ns.get("/x").unwrap();
        assert!(current.as_file().unwrap().same_node(&second));
        let listed = dir(&ns, "/").child("x").unwrap();
        assert!(listed.same_node(&current));
    }

    #[test]
    fn test_insert_dir() {
        let ns = Namespace::new();
        let d = ns.insert_dir("/p/q", 0o750).unwrap();
        assert_eq!(d.mode(), 0o750);
        // Existing directory: same node back, mode untouched.
        let again = ns.insert_dir("/p/q", 0o777).unwrap();
        assert_eq!(again.mode(), 0o750);

        ns.insert_file(file("/p/f")).unwrap();
        assert!(matches!(
            ns.insert_dir("/p/f", 0o700),
            Err(FsError::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_remove_orphans_children() {
        let ns = Namespace::new();
        ns.insert_file(file("/a/b.txt")).unwrap();

        assert!(ns.remove("/a").is_some());
        assert!(dir(&ns, "/").is_empty());
        assert!(ns.contains("/a/b.txt"));
        assert!(ns.remove("/").is_none());
        assert!(ns.remove("/missing").is_none());
    }

    #[test]
    fn test_remove_prefix_is_string_prefix() {
        let ns = Namespace::new();
        ns.insert_dir("/foo", 0o700).unwrap();
        for p in ["/foobar", "/foo/baz", "/other"] {
            ns.insert_file(file(p)).unwrap();
        }

        let removed = ns.remove_prefix("/foo");
        assert_eq!(removed.len(), 3);
        assert_eq!(ns.paths(), vec!["/", "/other"]);
        assert_eq!(dir(&ns, "/").child_names(), vec!["other"]);
    }

    #[test]
    fn test_rename_directory_tree() {
        let ns = Namespace::new();
        ns.insert_file(file("/src/a.txt")).unwrap();
        ns.insert_file(file("/src/sub/b.txt")).unwrap();

        let mut moved = ns.rename("/src", "/dst/inner").unwrap();
        moved.sort_by(|a, b| a.from.cmp(&b.from));
        let pairs: Vec<(&str, &str)> = moved.iter().map(|m| (m.from.as_str(), m.to.as_str())).collect();
        assert_eq!(
            pairs,
            vec![
                ("/src/a.txt", "/dst/inner/a.txt"),
                ("/src/sub/b.txt", "/dst/inner/sub/b.txt"),
            ]
        );
        assert_eq!(moved[1].file.path(), "/dst/inner/sub/b.txt");

        assert_eq!(
            ns.paths(),
            vec![
                "/",
                "/dst",
                "/dst/inner",
                "/dst/inner/a.txt",
                "/dst/inner/sub",
                "/dst/inner/sub/b.txt",
            ]
        );
        assert_eq!(dir(&ns, "/").child_names(), vec!["dst"]);
        assert_eq!(dir(&ns, "/dst/inner").child_names(), vec!["a.txt", "sub"]);
        assert_eq!(dir(&ns, "/dst/inner/sub").child_names(), vec!["b.txt"]);
    }

    #[test]
    fn test_rename_errors() {
        let ns = Namespace::new();
        ns.insert_file(file("/a")).unwrap();
        ns.insert_file(file("/b")).unwrap();
        ns.insert_dir("/d", 0o700).unwrap();

        assert!(matches!(ns.rename("/zz", "/y"), Err(FsError::NotFound(_))));
        assert!(matches!(ns.rename("/a", "/b"), Err(FsError::DestinationExists(_))));
        assert!(matches!(ns.rename("/d", "/d/e"), Err(FsError::InvalidPath(_))));
        assert!(matches!(ns.rename("/", "/r"), Err(FsError::InvalidPath(_))));
        assert!(matches!(ns.rename("/b", "/a/x"), Err(FsError::NotADirectory(_))));
    }

    #[test]
    fn test_set_attrs() {
        let ns = Namespace::new();
        ns.insert_file(file("/m")).unwrap();
        ns.set_mode("/m", 0o644).unwrap();
        assert_eq!(ns.get("/m").unwrap().mode(), 0o644);

        ns.set_modified("/m", SystemTime::UNIX_EPOCH).unwrap();
        assert_eq!(ns.get("/m").unwrap().stat().modified, SystemTime::UNIX_EPOCH);

        assert!(ns.set_mode("/nope", 0o600).unwrap_err().is_not_found());
    }
}
