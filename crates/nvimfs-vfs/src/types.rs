//! Core types for the node table.
//!
//! This module defines the validated path type, per-node metadata and the
//! error hierarchy shared by every node table operation.
//!
//! # Examples
//!
//! ```
//! use nvimfs_vfs::{NodeKind, VfsPath};
//!
//! let path = VfsPath::new("/clients/0/name").unwrap();
//! assert_eq!(path.file_name(), Some("name"));
//! assert_eq!(path.parent().unwrap().as_str(), "/clients/0");
//! assert!(NodeKind::Directory.is_dir());
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::time::SystemTime;
use thiserror::Error;

/// Errors that can occur during node table operations.
///
/// Every variant carries the path it refers to. Classification helpers
/// (`is_xxx()`) let callers branch without matching on fields.
///
/// # Examples
///
/// ```
/// use nvimfs_vfs::VfsError;
///
/// let error = VfsError::NotFound {
///     path: "/missing".to_string(),
/// };
///
/// assert!(error.is_not_found());
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VfsError {
    /// No node exists at the path
    #[error("No such entry: {path}")]
    NotFound {
        /// The path that was not found
        path: String,
    },

    /// A node already exists at the path
    #[error("Entry already exists: {path}")]
    AlreadyExists {
        /// The occupied path
        path: String,
    },

    /// Path (or one of its parents) exists but is not a directory
    #[error("Not a directory: {path}")]
    NotADirectory {
        /// The path that is not a directory
        path: String,
    },

    /// Operation expected a file but found a directory
    #[error("Is a directory: {path}")]
    IsADirectory {
        /// The directory path
        path: String,
    },

    /// Directory still has children
    #[error("Directory not empty: {path}")]
    NotEmpty {
        /// The non-empty directory
        path: String,
    },

    /// Path is malformed (relative, empty, or contains `..`)
    #[error("Invalid path: {path}")]
    InvalidPath {
        /// The rejected path
        path: String,
    },

    /// A write or truncate would grow a file past the size limit
    #[error("File too large: {path} ({size} bytes)")]
    FileTooLarge {
        /// The file being grown
        path: String,
        /// Requested size in bytes
        size: u64,
    },
}

impl VfsError {
    /// Returns `true` if this is a not-found error.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns `true` if this is an already-exists error.
    ///
    /// # Examples
    ///
    /// ```
    /// use nvimfs_vfs::VfsError;
    ///
    /// let error = VfsError::AlreadyExists {
    ///     path: "/clients".to_string(),
    /// };
    ///
    /// assert!(error.is_already_exists());
    /// assert!(!error.is_not_found());
    /// ```
    #[must_use]
    pub const fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    /// Returns `true` if this is a not-a-directory error.
    #[must_use]
    pub const fn is_not_directory(&self) -> bool {
        matches!(self, Self::NotADirectory { .. })
    }

    /// Returns `true` if this is an is-a-directory error.
    #[must_use]
    pub const fn is_directory(&self) -> bool {
        matches!(self, Self::IsADirectory { .. })
    }

    /// Returns `true` if this is a directory-not-empty error.
    #[must_use]
    pub const fn is_not_empty(&self) -> bool {
        matches!(self, Self::NotEmpty { .. })
    }

    /// Returns `true` if this is an invalid path error.
    #[must_use]
    pub const fn is_invalid_path(&self) -> bool {
        matches!(self, Self::InvalidPath { .. })
    }

    /// Returns `true` if a file would have grown past the size limit.
    #[must_use]
    pub const fn is_file_too_large(&self) -> bool {
        matches!(self, Self::FileTooLarge { .. })
    }
}

/// A validated absolute path inside the virtual namespace.
///
/// `VfsPath` always uses Unix conventions:
/// - starts with `/`
/// - contains no `..` or `.` components
/// - has no trailing or repeated separators (except the root `/`)
///
/// # Examples
///
/// ```
/// use nvimfs_vfs::VfsPath;
///
/// let path = VfsPath::new("/clients//0/")?;
/// assert_eq!(path.as_str(), "/clients/0");
///
/// assert!(VfsPath::new("relative").is_err());
/// assert!(VfsPath::new("/clients/../etc").is_err());
/// # Ok::<(), nvimfs_vfs::VfsError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VfsPath(String);

impl VfsPath {
    /// Creates a new `VfsPath`, normalizing separators.
    ///
    /// # Errors
    ///
    /// Returns `VfsError::InvalidPath` if the path is empty, relative, or
    /// contains `.`/`..` components.
    pub fn new(path: impl AsRef<str>) -> Result<Self> {
        let raw = path.as_ref();
        if !raw.starts_with('/') {
            return Err(VfsError::InvalidPath {
                path: raw.to_string(),
            });
        }

        let mut normalized = String::with_capacity(raw.len());
        for segment in raw.split('/').filter(|s| !s.is_empty()) {
            if segment == "." || segment == ".." {
                return Err(VfsError::InvalidPath {
                    path: raw.to_string(),
                });
            }
            normalized.push('/');
            normalized.push_str(segment);
        }

        if normalized.is_empty() {
            normalized.push('/');
        }
        Ok(Self(normalized))
    }

    /// Returns the root path `/`.
    #[must_use]
    pub fn root() -> Self {
        Self("/".to_string())
    }

    /// Returns the path as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` for the root path.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// Returns the parent directory, or `None` for the root.
    ///
    /// # Examples
    ///
    /// ```
    /// use nvimfs_vfs::VfsPath;
    ///
    /// let path = VfsPath::new("/clients")?;
    /// assert!(path.parent().unwrap().is_root());
    /// assert!(VfsPath::root().parent().is_none());
    /// # Ok::<(), nvimfs_vfs::VfsError>(())
    /// ```
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        self.0.rfind('/').map(|pos| {
            if pos == 0 {
                Self::root()
            } else {
                Self(self.0[..pos].to_string())
            }
        })
    }

    /// Returns the last path component, or `None` for the root.
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        if self.is_root() {
            return None;
        }
        self.0.rsplit('/').next()
    }

    /// Appends a single component.
    ///
    /// # Errors
    ///
    /// Returns `VfsError::InvalidPath` if `name` is empty, `.`, `..` or
    /// contains a separator.
    pub fn join(&self, name: &str) -> Result<Self> {
        if name.is_empty() || name == "." || name == ".." || name.contains('/') {
            return Err(VfsError::InvalidPath {
                path: format!("{}/{name}", self.0.trim_end_matches('/')),
            });
        }
        if self.is_root() {
            Ok(Self(format!("/{name}")))
        } else {
            Ok(Self(format!("{}/{name}", self.0)))
        }
    }

    /// Iterates over the path components (empty for the root).
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    /// Returns `true` if `self` lies strictly below `ancestor`.
    ///
    /// This is a component-wise check: `/clients/10` is not below
    /// `/clients/1`.
    #[must_use]
    pub fn is_descendant_of(&self, ancestor: &Self) -> bool {
        if ancestor.is_root() {
            return !self.is_root();
        }
        self.0
            .strip_prefix(ancestor.as_str())
            .is_some_and(|rest| rest.starts_with('/'))
    }

    /// Replaces the `from` prefix of this path with `to`.
    ///
    /// Returns `None` if `self` is neither `from` nor below it.
    #[must_use]
    pub fn rebase(&self, from: &Self, to: &Self) -> Option<Self> {
        if self == from {
            return Some(to.clone());
        }
        if !self.is_descendant_of(from) {
            return None;
        }
        let rest = if from.is_root() {
            &self.0[..]
        } else {
            &self.0[from.0.len()..]
        };
        if to.is_root() {
            Some(Self(rest.to_string()))
        } else {
            Some(Self(format!("{}{rest}", to.0)))
        }
    }
}

impl fmt::Display for VfsPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl AsRef<str> for VfsPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// The kind of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// A directory
    Directory,
    /// A regular file whose bytes live in the content store
    RegularFile,
    /// A symbolic link; its target lives in the content store
    Symlink,
}

impl NodeKind {
    /// Returns `true` for directories.
    #[must_use]
    pub const fn is_dir(self) -> bool {
        matches!(self, Self::Directory)
    }

    /// Returns `true` for regular files.
    #[must_use]
    pub const fn is_file(self) -> bool {
        matches!(self, Self::RegularFile)
    }
}

/// Metadata of one node.
///
/// The content itself is kept out of this struct; for regular files and
/// symlinks `size` always equals the length of the stored bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    /// What the node is
    pub kind: NodeKind,
    /// Permission bits (without the file type bits)
    pub perm: u16,
    /// Owner user id
    pub uid: u32,
    /// Owner group id
    pub gid: u32,
    /// Length of the content in bytes (0 for directories)
    pub size: u64,
    /// Link count
    pub nlink: u32,
    /// Last access time
    pub atime: SystemTime,
    /// Last modification time
    pub mtime: SystemTime,
    /// Last status change time
    pub ctime: SystemTime,
    pub(crate) xattrs: Option<BTreeMap<String, Vec<u8>>>,
}

impl Node {
    pub(crate) fn new(kind: NodeKind, perm: u16, owner: Owner) -> Self {
        let now = SystemTime::now();
        Self {
            kind,
            perm,
            uid: owner.uid,
            gid: owner.gid,
            size: 0,
            nlink: if kind.is_dir() { 2 } else { 1 },
            atime: now,
            mtime: now,
            ctime: now,
            xattrs: None,
        }
    }

    /// Returns the extended attribute names in sorted order.
    pub fn xattr_names(&self) -> impl Iterator<Item = &str> {
        self.xattrs
            .iter()
            .flat_map(|attrs| attrs.keys().map(String::as_str))
    }

    /// Returns `true` if no extended attribute map was ever created.
    #[must_use]
    pub const fn has_no_xattrs(&self) -> bool {
        self.xattrs.is_none()
    }
}

/// Default owner for newly created nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Owner {
    /// User id
    pub uid: u32,
    /// Group id
    pub gid: u32,
}

/// A single directory listing entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Entry name (`.`, `..`, or a child component)
    pub name: String,
    /// Kind of the entry
    pub kind: NodeKind,
}

/// Type alias for node table results.
pub type Result<T> = std::result::Result<T, VfsError>;
