//! FUSE adapter.
//!
//! Translates path-based `fuse3` requests into [`Engine`] calls. All state
//! lives in the engine; this layer only converts paths, attributes and
//! replies.

use crate::engine::{AttrChange, Engine};
use crate::error::{FsError, FsResult};
use bytes::Bytes;
use fuse3::path::prelude::*;
use fuse3::path::reply::DirectoryEntryPlus;
use fuse3::{Errno, Timestamp};
use nvimfs_core::FsConfig;
use nvimfs_vfs::{Node, NodeKind, VfsPath};
use std::ffi::{OsStr, OsString};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::debug;

const BLOCK_SIZE: u32 = 512;
const NAME_MAX: u32 = 255;

type DirEntries = Vec<fuse3::Result<DirectoryEntry>>;
type DirEntriesPlus = Vec<fuse3::Result<DirectoryEntryPlus>>;

/// The mounted filesystem.
#[derive(Debug, Clone)]
pub struct NvimFs {
    engine: Arc<Engine>,
    ttl: Duration,
    max_write: NonZeroU32,
}

impl NvimFs {
    /// Wraps an engine with the mount settings from `config`.
    #[must_use]
    pub fn new(engine: Arc<Engine>, config: &FsConfig) -> Self {
        Self {
            engine,
            ttl: config.attr_ttl(),
            max_write: NonZeroU32::new(config.max_write).unwrap_or(NonZeroU32::MIN),
        }
    }

    async fn entry(&self, path: &VfsPath) -> FsResult<ReplyEntry> {
        let node = self.engine.get_attributes(path).await?;
        Ok(ReplyEntry {
            ttl: self.ttl,
            attr: file_attr(&node),
        })
    }
}

/// Converts a kernel path into a table path.
///
/// # Errors
///
/// Returns an invalid-path error for non UTF-8 or relative paths.
pub fn vfs_path(path: &OsStr) -> FsResult<VfsPath> {
    let text = path.to_str().ok_or_else(|| nvimfs_vfs::VfsError::InvalidPath {
        path: path.to_string_lossy().into_owned(),
    })?;
    Ok(VfsPath::new(text)?)
}

fn child_path(parent: &OsStr, name: &OsStr) -> FsResult<VfsPath> {
    let name = name.to_str().ok_or_else(|| nvimfs_vfs::VfsError::InvalidPath {
        path: name.to_string_lossy().into_owned(),
    })?;
    Ok(vfs_path(parent)?.join(name)?)
}

fn required(path: Option<&OsStr>) -> FsResult<VfsPath> {
    vfs_path(path.ok_or(FsError::MissingPath)?)
}

/// Maps a node's kind onto the FUSE file type.
#[must_use]
pub const fn file_type(kind: NodeKind) -> FileType {
    match kind {
        NodeKind::Directory => FileType::Directory,
        NodeKind::RegularFile => FileType::RegularFile,
        NodeKind::Symlink => FileType::Symlink,
    }
}

/// Builds the FUSE attributes of a node.
#[must_use]
pub fn file_attr(node: &Node) -> FileAttr {
    FileAttr {
        size: node.size,
        blocks: node.size.div_ceil(u64::from(BLOCK_SIZE)),
        atime: node.atime.into(),
        mtime: node.mtime.into(),
        ctime: node.ctime.into(),
        kind: file_type(node.kind),
        perm: node.perm,
        nlink: node.nlink,
        uid: node.uid,
        gid: node.gid,
        rdev: 0,
        blksize: BLOCK_SIZE,
    }
}

/// Converts a FUSE timestamp back into a system time.
#[must_use]
pub fn system_time(ts: Timestamp) -> SystemTime {
    let since_epoch = Duration::new(ts.sec.unsigned_abs(), ts.nsec);
    if ts.sec >= 0 {
        UNIX_EPOCH + since_epoch
    } else {
        UNIX_EPOCH - since_epoch
    }
}

fn permission_bits(mode: u32) -> u16 {
    u16::try_from(mode & 0o7777).unwrap_or(0o7777)
}

/// Turns a `setattr` request into an [`AttrChange`].
#[must_use]
pub fn attr_change(set_attr: &SetAttr) -> AttrChange {
    AttrChange {
        mode: set_attr.mode.map(permission_bits),
        uid: set_attr.uid,
        gid: set_attr.gid,
        size: set_attr.size,
        atime: set_attr.atime.map(system_time),
        mtime: set_attr.mtime.map(system_time),
    }
}

// Encodes names the way listxattr(2) returns them.
fn xattr_list(names: &[String]) -> Vec<u8> {
    let mut out = Vec::new();
    for name in names {
        out.extend_from_slice(name.as_bytes());
        out.push(0);
    }
    out
}

// A zero size asks for the needed length only.
fn xattr_reply(data: Vec<u8>, size: u32) -> Result<ReplyXAttr, Errno> {
    let len = u32::try_from(data.len()).map_err(|_| Errno::from(libc::E2BIG))?;
    if size == 0 {
        Ok(ReplyXAttr::Size(len))
    } else if len > size {
        Err(Errno::from(libc::ERANGE))
    } else {
        Ok(ReplyXAttr::Data(Bytes::from(data)))
    }
}

fn log_failure<T>(op: &str, path: &VfsPath, result: FsResult<T>) -> Result<T, Errno> {
    result.map_err(|e| {
        if !e.is_not_found() {
            debug!(op, %path, error = %e, "operation failed");
        }
        Errno::from(e)
    })
}

impl PathFilesystem for NvimFs {
    async fn init(&self, _req: Request) -> Result<ReplyInit, Errno> {
        debug!(max_write = self.max_write.get(), "filesystem initialized");
        Ok(ReplyInit {
            max_write: self.max_write,
        })
    }

    async fn destroy(&self, _req: Request) {
        debug!("filesystem destroyed");
    }

    async fn lookup(&self, _req: Request, parent: &OsStr, name: &OsStr) -> Result<ReplyEntry, Errno> {
        let path = child_path(parent, name)?;
        let result = self.entry(&path).await;
        log_failure("lookup", &path, result)
    }

    async fn getattr(
        &self,
        _req: Request,
        path: Option<&OsStr>,
        _fh: Option<u64>,
        _flags: u32,
    ) -> Result<ReplyAttr, Errno> {
        let path = required(path)?;
        let node = log_failure("getattr", &path, self.engine.get_attributes(&path).await)?;
        Ok(ReplyAttr {
            ttl: self.ttl,
            attr: file_attr(&node),
        })
    }

    async fn setattr(
        &self,
        _req: Request,
        path: Option<&OsStr>,
        _fh: Option<u64>,
        set_attr: SetAttr,
    ) -> Result<ReplyAttr, Errno> {
        let path = required(path)?;
        let change = attr_change(&set_attr);
        let node = log_failure("setattr", &path, self.engine.setattr(&path, change).await)?;
        Ok(ReplyAttr {
            ttl: self.ttl,
            attr: file_attr(&node),
        })
    }

    async fn readlink(&self, _req: Request, path: &OsStr) -> Result<ReplyData, Errno> {
        let path = vfs_path(path)?;
        let target = log_failure("readlink", &path, self.engine.readlink(&path).await)?;
        Ok(Bytes::from(target).into())
    }

    async fn symlink(
        &self,
        _req: Request,
        parent: &OsStr,
        name: &OsStr,
        link_path: &OsStr,
    ) -> Result<ReplyEntry, Errno> {
        use std::os::unix::ffi::OsStrExt;

        let path = child_path(parent, name)?;
        let result = self.engine.symlink(&path, link_path.as_bytes()).await;
        let node = log_failure("symlink", &path, result)?;
        Ok(ReplyEntry {
            ttl: self.ttl,
            attr: file_attr(&node),
        })
    }

    async fn mkdir(
        &self,
        _req: Request,
        parent: &OsStr,
        name: &OsStr,
        mode: u32,
        _umask: u32,
    ) -> Result<ReplyEntry, Errno> {
        let path = child_path(parent, name)?;
        let result = self.engine.mkdir(&path, permission_bits(mode)).await;
        let node = log_failure("mkdir", &path, result)?;
        Ok(ReplyEntry {
            ttl: self.ttl,
            attr: file_attr(&node),
        })
    }

    async fn unlink(&self, _req: Request, parent: &OsStr, name: &OsStr) -> Result<(), Errno> {
        let path = child_path(parent, name)?;
        log_failure("unlink", &path, self.engine.unlink(&path).await)
    }

    async fn rmdir(&self, _req: Request, parent: &OsStr, name: &OsStr) -> Result<(), Errno> {
        let path = child_path(parent, name)?;
        log_failure("rmdir", &path, self.engine.rmdir(&path).await)
    }

    async fn rename(
        &self,
        _req: Request,
        origin_parent: &OsStr,
        origin_name: &OsStr,
        parent: &OsStr,
        name: &OsStr,
    ) -> Result<(), Errno> {
        let from = child_path(origin_parent, origin_name)?;
        let to = child_path(parent, name)?;
        log_failure("rename", &from, self.engine.rename(&from, &to).await)
    }

    async fn open(&self, _req: Request, path: &OsStr, flags: u32) -> Result<ReplyOpen, Errno> {
        let path = vfs_path(path)?;
        let fh = log_failure("open", &path, self.engine.open(&path).await)?;
        Ok(ReplyOpen { fh, flags })
    }

    async fn read(
        &self,
        _req: Request,
        path: Option<&OsStr>,
        _fh: u64,
        offset: u64,
        size: u32,
    ) -> Result<ReplyData, Errno> {
        let path = required(path)?;
        let size = usize::try_from(size).unwrap_or(usize::MAX);
        let data = log_failure("read", &path, self.engine.read(&path, offset, size).await)?;
        Ok(Bytes::from(data).into())
    }

    async fn write(
        &self,
        _req: Request,
        path: Option<&OsStr>,
        _fh: u64,
        offset: u64,
        data: &[u8],
        _write_flags: u32,
        _flags: u32,
    ) -> Result<ReplyWrite, Errno> {
        let path = required(path)?;
        let written = log_failure("write", &path, self.engine.write(&path, offset, data).await)?;
        Ok(ReplyWrite {
            written: u32::try_from(written).unwrap_or(u32::MAX),
        })
    }

    async fn release(
        &self,
        _req: Request,
        _path: Option<&OsStr>,
        _fh: u64,
        _flags: u32,
        _lock_owner: u64,
        _flush: bool,
    ) -> Result<(), Errno> {
        Ok(())
    }

    async fn fsync(
        &self,
        _req: Request,
        _path: Option<&OsStr>,
        _fh: u64,
        _datasync: bool,
    ) -> Result<(), Errno> {
        Ok(())
    }

    async fn setxattr(
        &self,
        _req: Request,
        path: &OsStr,
        name: &OsStr,
        value: &[u8],
        _flags: u32,
        _position: u32,
    ) -> Result<(), Errno> {
        let path = vfs_path(path)?;
        let name = name.to_string_lossy();
        log_failure("setxattr", &path, self.engine.set_xattr(&path, &name, value).await)
    }

    async fn getxattr(
        &self,
        _req: Request,
        path: &OsStr,
        name: &OsStr,
        size: u32,
    ) -> Result<ReplyXAttr, Errno> {
        let path = vfs_path(path)?;
        let name = name.to_string_lossy();
        let value = log_failure("getxattr", &path, self.engine.get_xattr(&path, &name).await)?;
        xattr_reply(value, size)
    }

    async fn listxattr(&self, _req: Request, path: &OsStr, size: u32) -> Result<ReplyXAttr, Errno> {
        let path = vfs_path(path)?;
        let names = log_failure("listxattr", &path, self.engine.list_xattrs(&path).await)?;
        xattr_reply(xattr_list(&names), size)
    }

    async fn removexattr(&self, _req: Request, path: &OsStr, name: &OsStr) -> Result<(), Errno> {
        let path = vfs_path(path)?;
        let name = name.to_string_lossy();
        log_failure("removexattr", &path, self.engine.remove_xattr(&path, &name).await)
    }

    async fn flush(
        &self,
        _req: Request,
        _path: Option<&OsStr>,
        _fh: u64,
        _lock_owner: u64,
    ) -> Result<(), Errno> {
        Ok(())
    }

    async fn opendir(&self, _req: Request, path: &OsStr, flags: u32) -> Result<ReplyOpen, Errno> {
        let path = vfs_path(path)?;
        let node = log_failure("opendir", &path, self.engine.get_attributes(&path).await)?;
        if !node.kind.is_dir() {
            return Err(Errno::from(libc::ENOTDIR));
        }
        let fh = log_failure("opendir", &path, self.engine.open(&path).await)?;
        Ok(ReplyOpen { fh, flags })
    }

    type DirEntryStream<'a>
        = futures::stream::Iter<std::vec::IntoIter<fuse3::Result<DirectoryEntry>>>
    where
        Self: 'a;
    type DirEntryPlusStream<'a>
        = futures::stream::Iter<std::vec::IntoIter<fuse3::Result<DirectoryEntryPlus>>>
    where
        Self: 'a;

    async fn readdir<'a>(
        &'a self,
        _req: Request,
        path: &'a OsStr,
        _fh: u64,
        offset: i64,
    ) -> Result<ReplyDirectory<Self::DirEntryStream<'a>>, Errno> {
        let path = vfs_path(path)?;
        let listing = log_failure("readdir", &path, self.engine.list_directory(&path).await)?;
        let skip = usize::try_from(offset).unwrap_or(0);

        let entries: DirEntries = listing
            .into_iter()
            .zip(1_i64..)
            .skip(skip)
            .map(|((entry, _), offset)| {
                Ok(DirectoryEntry {
                    kind: file_type(entry.kind),
                    name: OsString::from(entry.name),
                    offset,
                })
            })
            .collect();
        Ok(ReplyDirectory {
            entries: futures::stream::iter(entries),
        })
    }

    async fn readdirplus<'a>(
        &'a self,
        _req: Request,
        parent: &'a OsStr,
        _fh: u64,
        offset: u64,
        _lock_owner: u64,
    ) -> Result<ReplyDirectoryPlus<Self::DirEntryPlusStream<'a>>, Errno> {
        let path = vfs_path(parent)?;
        let listing = log_failure("readdirplus", &path, self.engine.list_directory(&path).await)?;
        let skip = usize::try_from(offset).unwrap_or(usize::MAX);

        let entries: DirEntriesPlus = listing
            .into_iter()
            .zip(1_i64..)
            .skip(skip)
            .map(|((entry, node), offset)| {
                Ok(DirectoryEntryPlus {
                    kind: file_type(entry.kind),
                    name: OsString::from(entry.name),
                    offset,
                    attr: file_attr(&node),
                    entry_ttl: self.ttl,
                    attr_ttl: self.ttl,
                })
            })
            .collect();
        Ok(ReplyDirectoryPlus {
            entries: futures::stream::iter(entries),
        })
    }

    async fn releasedir(
        &self,
        _req: Request,
        _path: &OsStr,
        _fh: u64,
        _flags: u32,
    ) -> Result<(), Errno> {
        Ok(())
    }

    async fn statfs(&self, _req: Request, _path: &OsStr) -> Result<ReplyStatFs, Errno> {
        let files = u64::try_from(self.engine.node_count().await).unwrap_or(u64::MAX);
        Ok(ReplyStatFs {
            blocks: 0,
            bfree: 0,
            bavail: 0,
            files,
            ffree: 0,
            bsize: BLOCK_SIZE,
            namelen: NAME_MAX,
            frsize: BLOCK_SIZE,
        })
    }

    async fn access(&self, _req: Request, path: &OsStr, _mask: u32) -> Result<(), Errno> {
        let path = vfs_path(path)?;
        log_failure("access", &path, self.engine.get_attributes(&path).await).map(|_| ())
    }

    async fn create(
        &self,
        _req: Request,
        parent: &OsStr,
        name: &OsStr,
        mode: u32,
        flags: u32,
    ) -> Result<ReplyCreated, Errno> {
        let path = child_path(parent, name)?;
        let result = self.engine.create(&path, permission_bits(mode)).await;
        let (fh, node) = log_failure("create", &path, result)?;
        Ok(ReplyCreated {
            ttl: self.ttl,
            attr: file_attr(&node),
            generation: 0,
            fh,
            flags,
        })
    }
}
