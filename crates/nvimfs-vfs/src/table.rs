//! Node table implementation.
//!
//! Maps every absolute path of the namespace to its metadata, and keeps the
//! bytes of regular files and symlink targets in a separate sparse content
//! store. Files that were never written have no content entry at all.
//!
//! # Examples
//!
//! ```
//! use nvimfs_vfs::{NodeTable, Owner, VfsPath};
//!
//! let mut table = NodeTable::new(Owner::default());
//! let path = VfsPath::new("/hello")?;
//!
//! table.create(&path, 0o644)?;
//! table.write(&path, 0, b"hi there")?;
//!
//! assert_eq!(table.read(&path, 0, 2)?, b"hi");
//! assert_eq!(table.get_attributes(&path)?.size, 8);
//! # Ok::<(), nvimfs_vfs::VfsError>(())
//! ```

use crate::types::{DirEntry, Node, NodeKind, Owner, Result, VfsError, VfsPath};
use std::collections::{BTreeMap, HashMap};
use std::time::SystemTime;

/// Default permission bits for directories.
pub const DEFAULT_DIR_MODE: u16 = 0o755;

/// Default permission bits for regular files.
pub const DEFAULT_FILE_MODE: u16 = 0o644;

/// Largest size a file may reach through `write` or `truncate`.
pub const MAX_FILE_SIZE: u64 = 256 * 1024 * 1024;

const SYMLINK_MODE: u16 = 0o777;

/// In-memory table of nodes plus their content.
///
/// The root `/` is installed at construction and can never be removed.
///
/// # Thread Safety
///
/// The table itself has no internal locking; callers that share it across
/// tasks guard it (together with anything that must change atomically with
/// it) behind a single mutex.
#[derive(Debug, Clone)]
pub struct NodeTable {
    nodes: BTreeMap<VfsPath, Node>,
    content: HashMap<VfsPath, Vec<u8>>,
    owner: Owner,
    next_handle: u64,
}

impl NodeTable {
    /// Creates a table that only contains the root directory.
    #[must_use]
    pub fn new(owner: Owner) -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(
            VfsPath::root(),
            Node::new(NodeKind::Directory, DEFAULT_DIR_MODE, owner),
        );
        Self {
            nodes,
            content: HashMap::new(),
            owner,
            next_handle: 0,
        }
    }

    /// Creates a regular file and returns a fresh handle.
    ///
    /// Handles are unique and ascending for the lifetime of the table.
    ///
    /// # Errors
    ///
    /// Returns `VfsError::AlreadyExists` if any node occupies the path,
    /// `VfsError::NotFound` if the parent is missing and
    /// `VfsError::NotADirectory` if the parent is not a directory.
    pub fn create(&mut self, path: &VfsPath, perm: u16) -> Result<u64> {
        self.check_vacant(path)?;
        self.nodes
            .insert(path.clone(), Node::new(NodeKind::RegularFile, perm, self.owner));
        self.touch_parent(path);
        Ok(self.next_handle())
    }

    /// Creates a directory.
    ///
    /// Returns `Ok(false)` without touching anything when the path is already
    /// present; this is the benign "already exists" outcome.
    ///
    /// # Errors
    ///
    /// Returns `VfsError::NotFound` if the parent is missing and
    /// `VfsError::NotADirectory` if the parent is not a directory.
    ///
    /// # Examples
    ///
    /// ```
    /// use nvimfs_vfs::{NodeTable, Owner, VfsPath};
    ///
    /// let mut table = NodeTable::new(Owner::default());
    /// let clients = VfsPath::new("/clients")?;
    ///
    /// assert!(table.mkdir(&clients, 0o755)?);
    /// assert!(!table.mkdir(&clients, 0o755)?);
    /// assert_eq!(table.get_attributes(&VfsPath::root())?.nlink, 3);
    /// # Ok::<(), nvimfs_vfs::VfsError>(())
    /// ```
    pub fn mkdir(&mut self, path: &VfsPath, perm: u16) -> Result<bool> {
        if self.nodes.contains_key(path) {
            return Ok(false);
        }
        self.check_vacant(path)?;
        self.nodes
            .insert(path.clone(), Node::new(NodeKind::Directory, perm, self.owner));
        if let Some(parent) = path.parent().and_then(|p| self.nodes.get_mut(&p)) {
            parent.nlink += 1;
        }
        self.touch_parent(path);
        Ok(true)
    }

    /// Creates a symbolic link at `path` pointing at `target`.
    ///
    /// # Errors
    ///
    /// Same conditions as [`NodeTable::create`].
    pub fn symlink(&mut self, path: &VfsPath, target: &[u8]) -> Result<()> {
        self.check_vacant(path)?;
        let mut node = Node::new(NodeKind::Symlink, SYMLINK_MODE, self.owner);
        node.size = target.len() as u64;
        self.nodes.insert(path.clone(), node);
        self.content.insert(path.clone(), target.to_vec());
        self.touch_parent(path);
        Ok(())
    }

    /// Returns the target of a symbolic link.
    ///
    /// # Errors
    ///
    /// Returns `VfsError::NotFound` if the path is absent and
    /// `VfsError::InvalidPath` if it is not a symlink.
    pub fn readlink(&self, path: &VfsPath) -> Result<&[u8]> {
        let node = self.get_attributes(path)?;
        if node.kind != NodeKind::Symlink {
            return Err(VfsError::InvalidPath {
                path: path.to_string(),
            });
        }
        Ok(self.content(path))
    }

    /// Removes a single node and its content.
    ///
    /// Removing an absent path is not an error; it returns `false`.
    /// The root is never removed. Children of a removed directory are left
    /// untouched, use [`NodeTable::remove_tree`] for whole subtrees.
    pub fn remove(&mut self, path: &VfsPath) -> bool {
        if path.is_root() {
            return false;
        }
        let Some(node) = self.nodes.remove(path) else {
            return false;
        };
        self.content.remove(path);
        if let Some(parent) = path.parent().and_then(|p| self.nodes.get_mut(&p)) {
            if node.kind.is_dir() {
                parent.nlink = parent.nlink.saturating_sub(1);
            }
            let now = SystemTime::now();
            parent.mtime = now;
            parent.ctime = now;
        }
        true
    }

    /// Removes `path` and everything below it.
    ///
    /// Returns the number of removed nodes (0 if the path was absent).
    pub fn remove_tree(&mut self, path: &VfsPath) -> usize {
        if path.is_root() || !self.nodes.contains_key(path) {
            return 0;
        }
        let doomed: Vec<VfsPath> = self
            .nodes
            .keys()
            .filter(|p| p.is_descendant_of(path))
            .cloned()
            .collect();
        for p in &doomed {
            self.nodes.remove(p);
            self.content.remove(p);
        }
        tracing::debug!(path = %path, removed = doomed.len() + 1, "removed subtree");
        usize::from(self.remove(path)) + doomed.len()
    }

    /// Returns the metadata of a node.
    ///
    /// # Errors
    ///
    /// Returns `VfsError::NotFound` if the path is absent.
    pub fn get_attributes(&self, path: &VfsPath) -> Result<&Node> {
        self.nodes.get(path).ok_or_else(|| VfsError::NotFound {
            path: path.to_string(),
        })
    }

    /// Returns `true` if a node exists at the path.
    #[must_use]
    pub fn exists(&self, path: &VfsPath) -> bool {
        self.nodes.contains_key(path)
    }

    /// Lists `.`, `..` and every immediate child of a directory.
    ///
    /// # Errors
    ///
    /// Returns `VfsError::NotFound` if the path is absent and
    /// `VfsError::NotADirectory` if it is not a directory.
    pub fn list_children(&self, path: &VfsPath) -> Result<Vec<DirEntry>> {
        let node = self.get_attributes(path)?;
        if !node.kind.is_dir() {
            return Err(VfsError::NotADirectory {
                path: path.to_string(),
            });
        }

        let mut entries = vec![
            DirEntry {
                name: ".".to_string(),
                kind: NodeKind::Directory,
            },
            DirEntry {
                name: "..".to_string(),
                kind: NodeKind::Directory,
            },
        ];
        entries.extend(self.children(path).map(|(child, node)| DirEntry {
            name: child.file_name().unwrap_or_default().to_string(),
            kind: node.kind,
        }));
        Ok(entries)
    }

    /// Iterates over the immediate children of `path`, in path order.
    pub fn children<'a>(
        &'a self,
        path: &'a VfsPath,
    ) -> impl Iterator<Item = (&'a VfsPath, &'a Node)> + 'a {
        self.nodes
            .iter()
            .filter(move |(child, _)| child.parent().as_ref() == Some(path))
    }

    /// Returns the stored bytes of a node, empty if nothing was written.
    #[must_use]
    pub fn content(&self, path: &VfsPath) -> &[u8] {
        self.content.get(path).map_or(&[][..], Vec::as_slice)
    }

    /// Reads up to `size` bytes starting at `offset`, clamped to the data.
    ///
    /// # Errors
    ///
    /// Returns `VfsError::NotFound` if the path is absent and
    /// `VfsError::IsADirectory` for directories.
    pub fn read(&self, path: &VfsPath, offset: u64, size: usize) -> Result<&[u8]> {
        let node = self.get_attributes(path)?;
        if node.kind.is_dir() {
            return Err(VfsError::IsADirectory {
                path: path.to_string(),
            });
        }
        let data = self.content(path);
        let start = usize::try_from(offset).unwrap_or(usize::MAX).min(data.len());
        let end = start.saturating_add(size).min(data.len());
        Ok(&data[start..end])
    }

    /// Writes `data` at `offset` with byte-range semantics.
    ///
    /// Bytes `[offset, offset + len)` are replaced, a gap past the current
    /// end is zero-filled and anything after the written range is kept.
    /// Returns the number of bytes written.
    ///
    /// # Errors
    ///
    /// Returns `VfsError::NotFound` if the path is absent,
    /// `VfsError::IsADirectory` for directories and
    /// `VfsError::FileTooLarge` if the file would end past
    /// [`MAX_FILE_SIZE`].
    pub fn write(&mut self, path: &VfsPath, offset: u64, data: &[u8]) -> Result<usize> {
        self.check_file(path)?;
        let end = offset
            .checked_add(data.len() as u64)
            .ok_or_else(|| too_large(path, u64::MAX))?;
        let buf = self.content.entry(path.clone()).or_default();
        let end = grow(path, buf, end)?;
        let start = end - data.len();
        buf[start..end].copy_from_slice(data);
        let len = buf.len();
        self.set_size(path, len);
        Ok(data.len())
    }

    /// Replaces the whole content of a file.
    ///
    /// # Errors
    ///
    /// Same conditions as [`NodeTable::write`].
    pub fn replace_content(&mut self, path: &VfsPath, data: Vec<u8>) -> Result<()> {
        self.check_file(path)?;
        let len = data.len();
        self.content.insert(path.clone(), data);
        self.set_size(path, len);
        Ok(())
    }

    /// Shortens or zero-extends a file to `length` bytes.
    ///
    /// # Errors
    ///
    /// Same conditions as [`NodeTable::write`].
    pub fn truncate(&mut self, path: &VfsPath, length: u64) -> Result<()> {
        self.check_file(path)?;
        let buf = self.content.entry(path.clone()).or_default();
        let length = grow(path, buf, length)?;
        buf.truncate(length);
        self.set_size(path, length);
        Ok(())
    }

    /// Returns a handle for an existing node.
    ///
    /// # Errors
    ///
    /// Returns `VfsError::NotFound` if the path is absent.
    pub fn open(&mut self, path: &VfsPath) -> Result<u64> {
        self.get_attributes(path)?;
        Ok(self.next_handle())
    }

    /// Changes the permission bits, keeping the node kind.
    ///
    /// # Errors
    ///
    /// Returns `VfsError::NotFound` if the path is absent.
    pub fn chmod(&mut self, path: &VfsPath, perm: u16) -> Result<()> {
        let node = self.node_mut(path)?;
        node.perm = perm & 0o7777;
        node.ctime = SystemTime::now();
        Ok(())
    }

    /// Changes the owner; `None` leaves the respective id untouched.
    ///
    /// # Errors
    ///
    /// Returns `VfsError::NotFound` if the path is absent.
    pub fn chown(&mut self, path: &VfsPath, uid: Option<u32>, gid: Option<u32>) -> Result<()> {
        let node = self.node_mut(path)?;
        if let Some(uid) = uid {
            node.uid = uid;
        }
        if let Some(gid) = gid {
            node.gid = gid;
        }
        node.ctime = SystemTime::now();
        Ok(())
    }

    /// Updates access and modification times; `None` means "now".
    ///
    /// # Errors
    ///
    /// Returns `VfsError::NotFound` if the path is absent.
    pub fn utimens(
        &mut self,
        path: &VfsPath,
        atime: Option<SystemTime>,
        mtime: Option<SystemTime>,
    ) -> Result<()> {
        let node = self.node_mut(path)?;
        let now = SystemTime::now();
        node.atime = atime.unwrap_or(now);
        node.mtime = mtime.unwrap_or(now);
        node.ctime = now;
        Ok(())
    }

    /// Moves a node (and for directories its whole subtree) to `to`.
    ///
    /// An existing destination is replaced if it is a regular file, a
    /// symlink or an empty directory.
    ///
    /// # Errors
    ///
    /// Returns `VfsError::NotFound` if `from` or the parent of `to` is
    /// absent, `VfsError::NotEmpty` if `to` is a non-empty directory and
    /// `VfsError::InvalidPath` when moving a directory into itself or
    /// touching the root.
    pub fn rename(&mut self, from: &VfsPath, to: &VfsPath) -> Result<()> {
        if from == to {
            return self.get_attributes(from).map(|_| ());
        }
        if from.is_root() || to.is_root() || to.is_descendant_of(from) {
            return Err(VfsError::InvalidPath {
                path: to.to_string(),
            });
        }
        let moving_dir = self.get_attributes(from)?.kind.is_dir();

        if let Some(existing) = self.nodes.get(to) {
            if existing.kind.is_dir() {
                if !moving_dir {
                    return Err(VfsError::IsADirectory {
                        path: to.to_string(),
                    });
                }
                if self.children(to).next().is_some() {
                    return Err(VfsError::NotEmpty {
                        path: to.to_string(),
                    });
                }
            } else if moving_dir {
                return Err(VfsError::NotADirectory {
                    path: to.to_string(),
                });
            }
            self.remove(to);
        }
        self.check_vacant(to)?;

        let moved: Vec<(VfsPath, VfsPath)> = self
            .nodes
            .keys()
            .filter_map(|old| old.rebase(from, to).map(|new| (old.clone(), new)))
            .collect();
        let mut renamed = Vec::with_capacity(moved.len());
        for (old, new) in moved {
            if let Some(node) = self.nodes.remove(&old) {
                let data = self.content.remove(&old);
                renamed.push((new, node, data));
            }
        }
        for (new, mut node, data) in renamed {
            if &new == to {
                node.ctime = SystemTime::now();
            }
            if let Some(data) = data {
                self.content.insert(new.clone(), data);
            }
            self.nodes.insert(new, node);
        }

        if moving_dir {
            if let Some(parent) = from.parent().and_then(|p| self.nodes.get_mut(&p)) {
                parent.nlink = parent.nlink.saturating_sub(1);
            }
            if let Some(parent) = to.parent().and_then(|p| self.nodes.get_mut(&p)) {
                parent.nlink += 1;
            }
        }
        self.touch_parent(from);
        self.touch_parent(to);
        Ok(())
    }

    /// Sets an extended attribute, creating the attribute map lazily.
    ///
    /// # Errors
    ///
    /// Returns `VfsError::NotFound` if the path is absent.
    pub fn set_xattr(&mut self, path: &VfsPath, name: &str, value: &[u8]) -> Result<()> {
        let node = self.node_mut(path)?;
        node.xattrs
            .get_or_insert_with(BTreeMap::new)
            .insert(name.to_string(), value.to_vec());
        Ok(())
    }

    /// Returns an extended attribute value.
    ///
    /// A missing attribute yields an empty value instead of an error.
    ///
    /// # Errors
    ///
    /// Returns `VfsError::NotFound` if the path is absent.
    pub fn get_xattr(&self, path: &VfsPath, name: &str) -> Result<&[u8]> {
        let node = self.get_attributes(path)?;
        Ok(node
            .xattrs
            .as_ref()
            .and_then(|attrs| attrs.get(name))
            .map_or(&[][..], Vec::as_slice))
    }

    /// Lists extended attribute names.
    ///
    /// # Errors
    ///
    /// Returns `VfsError::NotFound` if the path is absent.
    pub fn list_xattrs(&self, path: &VfsPath) -> Result<Vec<String>> {
        Ok(self
            .get_attributes(path)?
            .xattr_names()
            .map(str::to_string)
            .collect())
    }

    /// Removes an extended attribute; a missing one is ignored.
    ///
    /// # Errors
    ///
    /// Returns `VfsError::NotFound` if the path is absent.
    pub fn remove_xattr(&mut self, path: &VfsPath, name: &str) -> Result<()> {
        let node = self.node_mut(path)?;
        if let Some(attrs) = node.xattrs.as_mut() {
            attrs.remove(name);
        }
        Ok(())
    }

    /// Returns the number of nodes, root included.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Returns every path in sorted order.
    #[must_use]
    pub fn all_paths(&self) -> Vec<&VfsPath> {
        self.nodes.keys().collect()
    }

    fn next_handle(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    fn node_mut(&mut self, path: &VfsPath) -> Result<&mut Node> {
        self.nodes.get_mut(path).ok_or_else(|| VfsError::NotFound {
            path: path.to_string(),
        })
    }

    fn check_vacant(&self, path: &VfsPath) -> Result<()> {
        if self.nodes.contains_key(path) {
            return Err(VfsError::AlreadyExists {
                path: path.to_string(),
            });
        }
        let parent = path.parent().ok_or_else(|| VfsError::AlreadyExists {
            path: path.to_string(),
        })?;
        match self.nodes.get(&parent) {
            None => Err(VfsError::NotFound {
                path: parent.to_string(),
            }),
            Some(node) if !node.kind.is_dir() => Err(VfsError::NotADirectory {
                path: parent.to_string(),
            }),
            Some(_) => Ok(()),
        }
    }

    fn check_file(&self, path: &VfsPath) -> Result<()> {
        if self.get_attributes(path)?.kind.is_dir() {
            return Err(VfsError::IsADirectory {
                path: path.to_string(),
            });
        }
        Ok(())
    }

    fn set_size(&mut self, path: &VfsPath, len: usize) {
        if let Some(node) = self.nodes.get_mut(path) {
            let now = SystemTime::now();
            node.size = len as u64;
            node.mtime = now;
            node.ctime = now;
        }
    }

    fn touch_parent(&mut self, path: &VfsPath) {
        if let Some(parent) = path.parent().and_then(|p| self.nodes.get_mut(&p)) {
            let now = SystemTime::now();
            parent.mtime = now;
            parent.ctime = now;
        }
    }
}

impl Default for NodeTable {
    fn default() -> Self {
        Self::new(Owner::default())
    }
}

/// Zero-extends `buf` to at least `len` bytes and returns `len`.
///
/// Refuses sizes past [`MAX_FILE_SIZE`] and allocation failures instead of
/// aborting.
fn grow(path: &VfsPath, buf: &mut Vec<u8>, len: u64) -> Result<usize> {
    if len > MAX_FILE_SIZE {
        return Err(too_large(path, len));
    }
    let len = usize::try_from(len).map_err(|_| too_large(path, len))?;
    if len > buf.len() {
        buf.try_reserve(len - buf.len())
            .map_err(|_| too_large(path, len as u64))?;
        buf.resize(len, 0);
    }
    Ok(len)
}

fn too_large(path: &VfsPath, size: u64) -> VfsError {
    VfsError::FileTooLarge {
        path: path.to_string(),
        size,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(path: &str) -> VfsPath {
        VfsPath::new(path).unwrap()
    }

    fn assert_sizes_consistent(table: &NodeTable) {
        for path in table.all_paths() {
            let node = table.get_attributes(path).unwrap();
            if node.kind.is_file() {
                assert_eq!(node.size, table.content(path).len() as u64, "{path}");
            }
        }
    }

    #[test]
    fn test_new_has_root_only() {
        let table = NodeTable::default();
        assert_eq!(table.node_count(), 1);
        let root = table.get_attributes(&VfsPath::root()).unwrap();
        assert!(root.kind.is_dir());
        assert_eq!(root.perm, DEFAULT_DIR_MODE);
        assert_eq!(root.nlink, 2);
    }

    #[test]
    fn test_get_attributes_missing_is_not_found() {
        let table = NodeTable::default();
        let err = table.get_attributes(&p("/never")).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_create_returns_ascending_handles() {
        let mut table = NodeTable::default();
        let a = table.create(&p("/a"), DEFAULT_FILE_MODE).unwrap();
        let b = table.create(&p("/b"), DEFAULT_FILE_MODE).unwrap();
        let c = table.open(&p("/a")).unwrap();
        assert!(a < b && b < c);
    }

    #[test]
    fn test_create_existing_fails() {
        let mut table = NodeTable::default();
        table.create(&p("/a"), DEFAULT_FILE_MODE).unwrap();
        let err = table.create(&p("/a"), DEFAULT_FILE_MODE).unwrap_err();
        assert!(err.is_already_exists());
    }

    #[test]
    fn test_create_requires_directory_parent() {
        let mut table = NodeTable::default();
        assert!(table
            .create(&p("/missing/a"), DEFAULT_FILE_MODE)
            .unwrap_err()
            .is_not_found());
        table.create(&p("/file"), DEFAULT_FILE_MODE).unwrap();
        assert!(table
            .create(&p("/file/a"), DEFAULT_FILE_MODE)
            .unwrap_err()
            .is_not_directory());
    }

    #[test]
    fn test_create_defaults() {
        let mut table = NodeTable::new(Owner { uid: 1000, gid: 100 });
        table.create(&p("/a"), DEFAULT_FILE_MODE).unwrap();
        let node = table.get_attributes(&p("/a")).unwrap();
        assert!(node.kind.is_file());
        assert_eq!(node.perm, 0o644);
        assert_eq!(node.size, 0);
        assert_eq!(node.nlink, 1);
        assert_eq!((node.uid, node.gid), (1000, 100));
    }

    #[test]
    fn test_mkdir_is_idempotent() {
        let mut table = NodeTable::default();
        assert!(table.mkdir(&p("/clients"), DEFAULT_DIR_MODE).unwrap());
        let before = table.clone();
        assert!(!table.mkdir(&p("/clients"), DEFAULT_DIR_MODE).unwrap());
        assert_eq!(table.node_count(), before.node_count());
        assert_eq!(
            table.get_attributes(&VfsPath::root()).unwrap(),
            before.get_attributes(&VfsPath::root()).unwrap()
        );
        assert_eq!(
            table.get_attributes(&p("/clients")).unwrap(),
            before.get_attributes(&p("/clients")).unwrap()
        );
    }

    #[test]
    fn test_mkdir_over_file_is_noop() {
        let mut table = NodeTable::default();
        table.create(&p("/x"), DEFAULT_FILE_MODE).unwrap();
        assert!(!table.mkdir(&p("/x"), DEFAULT_DIR_MODE).unwrap());
        assert!(table.get_attributes(&p("/x")).unwrap().kind.is_file());
    }

    #[test]
    fn test_link_counts_follow_child_directories() {
        let mut table = NodeTable::default();
        table.mkdir(&p("/a"), DEFAULT_DIR_MODE).unwrap();
        table.mkdir(&p("/b"), DEFAULT_DIR_MODE).unwrap();
        table.mkdir(&p("/a/c"), DEFAULT_DIR_MODE).unwrap();
        table.create(&p("/a/f"), DEFAULT_FILE_MODE).unwrap();
        assert_eq!(table.get_attributes(&VfsPath::root()).unwrap().nlink, 4);
        assert_eq!(table.get_attributes(&p("/a")).unwrap().nlink, 3);

        assert!(table.remove(&p("/b")));
        assert_eq!(table.get_attributes(&VfsPath::root()).unwrap().nlink, 3);
    }

    #[test]
    fn test_remove_missing_is_not_an_error() {
        let mut table = NodeTable::default();
        assert!(!table.remove(&p("/gone")));
        assert!(!table.remove(&VfsPath::root()));
        assert!(table.exists(&VfsPath::root()));
    }

    #[test]
    fn test_remove_tree_clears_content() {
        let mut table = NodeTable::default();
        table.mkdir(&p("/s"), DEFAULT_DIR_MODE).unwrap();
        table.mkdir(&p("/s/d"), DEFAULT_DIR_MODE).unwrap();
        table.create(&p("/s/d/f"), DEFAULT_FILE_MODE).unwrap();
        table.write(&p("/s/d/f"), 0, b"data").unwrap();
        table.create(&p("/sibling"), DEFAULT_FILE_MODE).unwrap();

        assert_eq!(table.remove_tree(&p("/s")), 3);
        assert!(!table.exists(&p("/s/d/f")));
        assert!(table.content(&p("/s/d/f")).is_empty());
        assert!(table.exists(&p("/sibling")));
        assert_eq!(table.get_attributes(&VfsPath::root()).unwrap().nlink, 2);
        assert_eq!(table.remove_tree(&p("/s")), 0);
    }

    #[test]
    fn test_list_children() {
        let mut table = NodeTable::default();
        table.mkdir(&p("/clients"), DEFAULT_DIR_MODE).unwrap();
        table.create(&p("/clients/new"), DEFAULT_FILE_MODE).unwrap();
        table.mkdir(&p("/clients/0"), DEFAULT_DIR_MODE).unwrap();
        table.create(&p("/clients/0/name"), DEFAULT_FILE_MODE).unwrap();

        let names: Vec<_> = table
            .list_children(&p("/clients"))
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec![".", "..", "0", "new"]);
    }

    #[test]
    fn test_list_children_of_file_fails() {
        let mut table = NodeTable::default();
        table.create(&p("/f"), DEFAULT_FILE_MODE).unwrap();
        assert!(table.list_children(&p("/f")).unwrap_err().is_not_directory());
        assert!(table.list_children(&p("/nope")).unwrap_err().is_not_found());
    }

    #[test]
    fn test_write_read_round_trip() {
        let mut table = NodeTable::default();
        table.create(&p("/f"), DEFAULT_FILE_MODE).unwrap();
        let bytes = b"hello world";
        assert_eq!(table.write(&p("/f"), 0, bytes).unwrap(), bytes.len());
        assert_eq!(table.read(&p("/f"), 0, bytes.len()).unwrap(), bytes);
        assert_sizes_consistent(&table);
    }

    #[test]
    fn test_write_is_byte_range() {
        let mut table = NodeTable::default();
        table.create(&p("/f"), DEFAULT_FILE_MODE).unwrap();
        table.write(&p("/f"), 0, b"abcdef").unwrap();
        table.write(&p("/f"), 2, b"XY").unwrap();
        assert_eq!(table.content(&p("/f")), b"abXYef");
        table.write(&p("/f"), 8, b"!").unwrap();
        assert_eq!(table.content(&p("/f")), b"abXYef\0\0!");
        assert_sizes_consistent(&table);
    }

    #[test]
    fn test_read_is_clamped() {
        let mut table = NodeTable::default();
        table.create(&p("/f"), DEFAULT_FILE_MODE).unwrap();
        table.write(&p("/f"), 0, b"abc").unwrap();
        assert_eq!(table.read(&p("/f"), 1, 100).unwrap(), b"bc");
        assert!(table.read(&p("/f"), 10, 4).unwrap().is_empty());
    }

    #[test]
    fn test_write_to_directory_fails() {
        let mut table = NodeTable::default();
        table.mkdir(&p("/d"), DEFAULT_DIR_MODE).unwrap();
        assert!(table.write(&p("/d"), 0, b"x").unwrap_err().is_directory());
        assert!(table.read(&p("/d"), 0, 1).unwrap_err().is_directory());
    }

    #[test]
    fn test_oversized_write_is_refused() {
        let mut table = NodeTable::default();
        table.create(&p("/f"), DEFAULT_FILE_MODE).unwrap();
        table.write(&p("/f"), 0, b"abc").unwrap();

        let err = table.write(&p("/f"), u64::MAX / 2, b"x").unwrap_err();
        assert!(err.is_file_too_large());
        let err = table.write(&p("/f"), u64::MAX, b"x").unwrap_err();
        assert!(err.is_file_too_large());
        let err = table.write(&p("/f"), MAX_FILE_SIZE, b"x").unwrap_err();
        assert!(err.is_file_too_large());

        assert_eq!(table.content(&p("/f")), b"abc");
        assert_sizes_consistent(&table);
    }

    #[test]
    fn test_oversized_truncate_is_refused() {
        let mut table = NodeTable::default();
        table.create(&p("/f"), DEFAULT_FILE_MODE).unwrap();
        table.write(&p("/f"), 0, b"abc").unwrap();

        let err = table.truncate(&p("/f"), u64::MAX / 2).unwrap_err();
        assert!(err.is_file_too_large());

        assert_eq!(table.content(&p("/f")), b"abc");
        assert_eq!(table.get_attributes(&p("/f")).unwrap().size, 3);
    }

    #[test]
    fn test_truncate_keeps_size_in_sync() {
        let mut table = NodeTable::default();
        table.create(&p("/f"), DEFAULT_FILE_MODE).unwrap();
        table.write(&p("/f"), 0, b"abcdef").unwrap();
        table.truncate(&p("/f"), 2).unwrap();
        assert_eq!(table.content(&p("/f")), b"ab");
        table.truncate(&p("/f"), 4).unwrap();
        assert_eq!(table.content(&p("/f")), b"ab\0\0");
        assert_sizes_consistent(&table);
    }

    #[test]
    fn test_replace_content() {
        let mut table = NodeTable::default();
        table.create(&p("/f"), DEFAULT_FILE_MODE).unwrap();
        table.write(&p("/f"), 0, b"a long old value").unwrap();
        table.replace_content(&p("/f"), b"new".to_vec()).unwrap();
        assert_eq!(table.content(&p("/f")), b"new");
        assert_sizes_consistent(&table);
    }

    #[test]
    fn test_chmod_keeps_kind() {
        let mut table = NodeTable::default();
        table.create(&p("/name"), DEFAULT_FILE_MODE).unwrap();
        table.chmod(&p("/name"), 0o444).unwrap();
        let node = table.get_attributes(&p("/name")).unwrap();
        assert_eq!(node.perm, 0o444);
        assert!(node.kind.is_file());
    }

    #[test]
    fn test_chown_partial() {
        let mut table = NodeTable::default();
        table.create(&p("/f"), DEFAULT_FILE_MODE).unwrap();
        table.chown(&p("/f"), Some(5), None).unwrap();
        let node = table.get_attributes(&p("/f")).unwrap();
        assert_eq!((node.uid, node.gid), (5, 0));
    }

    #[test]
    fn test_utimens_explicit_times() {
        let mut table = NodeTable::default();
        table.create(&p("/f"), DEFAULT_FILE_MODE).unwrap();
        let then = SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(42);
        table.utimens(&p("/f"), Some(then), Some(then)).unwrap();
        let node = table.get_attributes(&p("/f")).unwrap();
        assert_eq!(node.atime, then);
        assert_eq!(node.mtime, then);
    }

    #[test]
    fn test_symlink_and_readlink() {
        let mut table = NodeTable::default();
        table.symlink(&p("/link"), b"/clients/0").unwrap();
        assert_eq!(table.readlink(&p("/link")).unwrap(), b"/clients/0");
        let node = table.get_attributes(&p("/link")).unwrap();
        assert_eq!(node.kind, NodeKind::Symlink);
        assert_eq!(node.size, 10);

        table.create(&p("/f"), DEFAULT_FILE_MODE).unwrap();
        assert!(table.readlink(&p("/f")).is_err());
    }

    #[test]
    fn test_rename_file_moves_content() {
        let mut table = NodeTable::default();
        table.create(&p("/a"), DEFAULT_FILE_MODE).unwrap();
        table.write(&p("/a"), 0, b"payload").unwrap();
        table.rename(&p("/a"), &p("/b")).unwrap();
        assert!(!table.exists(&p("/a")));
        assert_eq!(table.content(&p("/b")), b"payload");
        assert_sizes_consistent(&table);
    }

    #[test]
    fn test_rename_directory_moves_subtree() {
        let mut table = NodeTable::default();
        table.mkdir(&p("/a"), DEFAULT_DIR_MODE).unwrap();
        table.mkdir(&p("/dst"), DEFAULT_DIR_MODE).unwrap();
        table.create(&p("/a/f"), DEFAULT_FILE_MODE).unwrap();
        table.write(&p("/a/f"), 0, b"x").unwrap();

        table.rename(&p("/a"), &p("/dst/a")).unwrap();
        assert_eq!(table.content(&p("/dst/a/f")), b"x");
        assert!(!table.exists(&p("/a/f")));
        assert_eq!(table.get_attributes(&VfsPath::root()).unwrap().nlink, 3);
        assert_eq!(table.get_attributes(&p("/dst")).unwrap().nlink, 3);
    }

    #[test]
    fn test_rename_replaces_file_but_not_full_directory() {
        let mut table = NodeTable::default();
        table.create(&p("/a"), DEFAULT_FILE_MODE).unwrap();
        table.create(&p("/b"), DEFAULT_FILE_MODE).unwrap();
        table.write(&p("/a"), 0, b"new").unwrap();
        table.write(&p("/b"), 0, b"old").unwrap();
        table.rename(&p("/a"), &p("/b")).unwrap();
        assert_eq!(table.content(&p("/b")), b"new");

        table.mkdir(&p("/d1"), DEFAULT_DIR_MODE).unwrap();
        table.mkdir(&p("/d2"), DEFAULT_DIR_MODE).unwrap();
        table.create(&p("/d2/f"), DEFAULT_FILE_MODE).unwrap();
        assert!(table.rename(&p("/d1"), &p("/d2")).unwrap_err().is_not_empty());
        assert!(table.rename(&p("/d1"), &p("/d1/x")).unwrap_err().is_invalid_path());
    }

    #[test]
    fn test_xattrs_are_lazy_and_lenient() {
        let mut table = NodeTable::default();
        table.create(&p("/f"), DEFAULT_FILE_MODE).unwrap();
        assert!(table.get_attributes(&p("/f")).unwrap().has_no_xattrs());
        assert!(table.get_xattr(&p("/f"), "user.tag").unwrap().is_empty());
        table.remove_xattr(&p("/f"), "user.tag").unwrap();

        table.set_xattr(&p("/f"), "user.tag", b"v").unwrap();
        table.set_xattr(&p("/f"), "user.a", b"w").unwrap();
        assert_eq!(table.get_xattr(&p("/f"), "user.tag").unwrap(), b"v");
        assert_eq!(table.list_xattrs(&p("/f")).unwrap(), vec!["user.a", "user.tag"]);

        table.remove_xattr(&p("/f"), "user.tag").unwrap();
        assert_eq!(table.list_xattrs(&p("/f")).unwrap(), vec!["user.a"]);
        assert!(table.get_xattr(&p("/missing"), "user.a").unwrap_err().is_not_found());
    }
}
