//! The dispatcher.
//!
//! [`Engine`] owns the node table and the session counter behind one async
//! mutex and implements every filesystem operation on top of them. Writes are
//! classified with [`classify`] and may call into the editor through the
//! [`RpcBridge`]; the lock is held for the whole operation, RPC included, so
//! multi-step updates such as session creation never interleave.

use crate::error::{FsError, FsResult};
use crate::registry::{
    Resolution, address_of, buffers_dir, clients_dir, resolve_session_for, session_dir,
    session_file, session_ids,
};
use crate::route::{Route, classify};
use nvimfs_bridge::{OpenedBuffer, RpcBridge};
use nvimfs_core::{RpcAddress, SessionId};
use nvimfs_vfs::{
    DEFAULT_DIR_MODE, DEFAULT_FILE_MODE, DirEntry, MAX_FILE_SIZE, Node, NodeTable, Owner,
    VfsError, VfsPath,
};
use std::time::SystemTime;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Permission bits of a session's `name` file.
pub const NAME_MODE: u16 = 0o444;

/// Attribute changes requested by a `setattr` call.
///
/// Unset fields are left alone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttrChange {
    /// New permission bits
    pub mode: Option<u16>,
    /// New owner user id
    pub uid: Option<u32>,
    /// New owner group id
    pub gid: Option<u32>,
    /// New length of a regular file
    pub size: Option<u64>,
    /// New access time
    pub atime: Option<SystemTime>,
    /// New modification time
    pub mtime: Option<SystemTime>,
}

#[derive(Debug)]
struct State {
    table: NodeTable,
    next_session: SessionId,
}

/// Filesystem state plus the bridge used for control files.
///
/// # Examples
///
/// ```
/// use nvimfs_bridge::{NvimConnector, RpcBridge};
/// use nvimfs_server::Engine;
/// use nvimfs_vfs::{Owner, VfsPath};
/// use std::sync::Arc;
///
/// # async fn example() -> nvimfs_server::FsResult<()> {
/// let engine = Engine::new(RpcBridge::new(Arc::new(NvimConnector::new())), Owner::default())?;
/// let node = engine.get_attributes(&VfsPath::new("/clients/new")?).await?;
/// assert!(node.kind.is_file());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Engine {
    state: Mutex<State>,
    bridge: RpcBridge,
}

impl Engine {
    /// Creates the engine with `/clients` and `/clients/new` installed.
    ///
    /// # Errors
    ///
    /// Returns an error if the fixed layout cannot be installed.
    pub fn new(bridge: RpcBridge, owner: Owner) -> FsResult<Self> {
        let mut table = NodeTable::new(owner);
        let clients = clients_dir();
        table.mkdir(&clients, DEFAULT_DIR_MODE)?;
        table.create(&clients.join("new")?, DEFAULT_FILE_MODE)?;
        Ok(Self {
            state: Mutex::new(State {
                table,
                next_session: SessionId::new(0),
            }),
            bridge,
        })
    }

    /// Registers the session given at startup.
    ///
    /// Failures are logged and otherwise ignored; the filesystem still works
    /// without any session.
    pub async fn register_initial(&self, address: &str) -> Option<SessionId> {
        let mut state = self.state.lock().await;
        match self.create_session(&mut state, address.as_bytes()).await {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(%address, error = %e, "initial session could not be registered");
                None
            }
        }
    }

    /// Returns the metadata of a node.
    ///
    /// # Errors
    ///
    /// Returns a not-found error if the path is absent.
    pub async fn get_attributes(&self, path: &VfsPath) -> FsResult<Node> {
        let state = self.state.lock().await;
        Ok(state.table.get_attributes(path)?.clone())
    }

    /// Lists a directory together with the metadata of every entry.
    ///
    /// Runs one reaper pass before listing.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is absent or not a directory.
    pub async fn list_directory(&self, path: &VfsPath) -> FsResult<Vec<(DirEntry, Node)>> {
        let mut state = self.state.lock().await;
        self.reap_one(&mut state).await;

        let table = &state.table;
        let own = table.get_attributes(path)?;
        let parent = match path.parent() {
            Some(parent) => table.get_attributes(&parent)?,
            None => own,
        };
        let mut listing = Vec::new();
        for entry in table.list_children(path)? {
            let node = match entry.name.as_str() {
                "." => own,
                ".." => parent,
                name => table.get_attributes(&path.join(name)?)?,
            };
            listing.push((entry, node.clone()));
        }
        Ok(listing)
    }

    /// Creates a regular file and returns its handle and metadata.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is taken or the parent is unusable.
    pub async fn create(&self, path: &VfsPath, perm: u16) -> FsResult<(u64, Node)> {
        let mut state = self.state.lock().await;
        let fh = state.table.create(path, perm)?;
        debug!(%path, fh, "created file");
        Ok((fh, state.table.get_attributes(path)?.clone()))
    }

    /// Creates a directory and returns its metadata.
    ///
    /// An existing directory is returned as-is.
    ///
    /// # Errors
    ///
    /// Returns an already-exists error if a non-directory occupies the path.
    pub async fn mkdir(&self, path: &VfsPath, perm: u16) -> FsResult<Node> {
        let mut state = self.state.lock().await;
        if !state.table.mkdir(path, perm)? {
            debug!(%path, "directory already present");
        }
        let node = state.table.get_attributes(path)?;
        if !node.kind.is_dir() {
            return Err(VfsError::AlreadyExists {
                path: path.to_string(),
            }
            .into());
        }
        Ok(node.clone())
    }

    /// Removes a file or symlink.
    ///
    /// # Errors
    ///
    /// Returns a not-found error if the path is absent and an is-a-directory
    /// error for directories.
    pub async fn unlink(&self, path: &VfsPath) -> FsResult<()> {
        let mut state = self.state.lock().await;
        if state.table.get_attributes(path)?.kind.is_dir() {
            return Err(VfsError::IsADirectory {
                path: path.to_string(),
            }
            .into());
        }
        state.table.remove(path);
        Ok(())
    }

    /// Removes an empty directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is absent, not a directory, not empty,
    /// or the root.
    pub async fn rmdir(&self, path: &VfsPath) -> FsResult<()> {
        let mut state = self.state.lock().await;
        if !state.table.get_attributes(path)?.kind.is_dir() {
            return Err(VfsError::NotADirectory {
                path: path.to_string(),
            }
            .into());
        }
        if path.is_root() {
            return Err(VfsError::InvalidPath {
                path: path.to_string(),
            }
            .into());
        }
        if state.table.children(path).next().is_some() {
            return Err(VfsError::NotEmpty {
                path: path.to_string(),
            }
            .into());
        }
        state.table.remove(path);
        Ok(())
    }

    /// Moves a node and everything below it.
    ///
    /// # Errors
    ///
    /// Returns the node table's rename error.
    pub async fn rename(&self, from: &VfsPath, to: &VfsPath) -> FsResult<()> {
        let mut state = self.state.lock().await;
        state.table.rename(from, to)?;
        debug!(%from, %to, "renamed");
        Ok(())
    }

    /// Creates a symlink and returns its metadata.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is taken or the parent is unusable.
    pub async fn symlink(&self, path: &VfsPath, target: &[u8]) -> FsResult<Node> {
        let mut state = self.state.lock().await;
        state.table.symlink(path, target)?;
        Ok(state.table.get_attributes(path)?.clone())
    }

    /// Returns the target of a symlink.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is absent or not a symlink.
    pub async fn readlink(&self, path: &VfsPath) -> FsResult<Vec<u8>> {
        let state = self.state.lock().await;
        Ok(state.table.readlink(path)?.to_vec())
    }

    /// Returns a fresh handle for an existing node.
    ///
    /// # Errors
    ///
    /// Returns a not-found error if the path is absent.
    pub async fn open(&self, path: &VfsPath) -> FsResult<u64> {
        let mut state = self.state.lock().await;
        Ok(state.table.open(path)?)
    }

    /// Reads stored bytes. Reads never reach the editor.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is absent or a directory.
    pub async fn read(&self, path: &VfsPath, offset: u64, size: usize) -> FsResult<Vec<u8>> {
        let state = self.state.lock().await;
        Ok(state.table.read(path, offset, size)?.to_vec())
    }

    /// Writes to a file, running the control action its path stands for.
    ///
    /// The written bytes are stored as well, except for `eval` whose content
    /// becomes the evaluation output. Returns the number of accepted bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is not a writable file or the control
    /// action fails; in that case nothing is stored.
    pub async fn write(&self, path: &VfsPath, offset: u64, data: &[u8]) -> FsResult<usize> {
        let mut state = self.state.lock().await;
        if state.table.get_attributes(path)?.kind.is_dir() {
            return Err(VfsError::IsADirectory {
                path: path.to_string(),
            }
            .into());
        }

        let end = offset.checked_add(data.len() as u64);
        if end.is_none_or(|end| end > MAX_FILE_SIZE) {
            return Err(VfsError::FileTooLarge {
                path: path.to_string(),
                size: end.unwrap_or(u64::MAX),
            }
            .into());
        }

        let route = classify(path);
        let address = match resolve_session_for(&state.table, path) {
            Resolution::Ready(_, address) => Some(address),
            Resolution::Pending(id) => {
                debug!(%path, session = %id, "session has no address yet");
                None
            }
            Resolution::NotSession => None,
        };
        debug!(%path, ?route, offset, len = data.len(), "dispatching write");

        match (route, address) {
            (Route::NewSession, _) => {
                self.create_session(&mut state, data).await?;
            }
            (Route::Command(_), Some(address)) => {
                self.bridge.execute_commands(&address, data).await?;
            }
            (Route::Eval(_), Some(address)) => {
                let output = self.bridge.evaluate(&address, data).await?;
                state.table.replace_content(path, output.into_bytes())?;
                return Ok(data.len());
            }
            (Route::NewBuffer(id), Some(address)) => {
                let opened = self.bridge.open_files(&address, data).await?;
                for buffer in &opened {
                    materialize_buffer(&mut state.table, id, buffer)?;
                    info!(session = %id, buffer = %buffer.number, file = %buffer.name, "buffer opened");
                }
            }
            (Route::NewWindow(_), Some(address)) => {
                self.bridge.split_windows(&address, data).await?;
            }
            _ => {}
        }
        Ok(state.table.write(path, offset, data)?)
    }

    /// Shortens or zero-extends a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is absent or a directory.
    pub async fn truncate(&self, path: &VfsPath, length: u64) -> FsResult<()> {
        let mut state = self.state.lock().await;
        Ok(state.table.truncate(path, length)?)
    }

    /// Applies attribute changes and returns the resulting metadata.
    ///
    /// When only one of the timestamps is given the other is kept.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is absent, or if a size is given for a
    /// directory.
    pub async fn setattr(&self, path: &VfsPath, change: AttrChange) -> FsResult<Node> {
        let mut state = self.state.lock().await;
        let table = &mut state.table;
        let current = table.get_attributes(path)?.clone();

        if let Some(size) = change.size {
            table.truncate(path, size)?;
        }
        if let Some(mode) = change.mode {
            table.chmod(path, mode)?;
        }
        if change.uid.is_some() || change.gid.is_some() {
            table.chown(path, change.uid, change.gid)?;
        }
        if change.atime.is_some() || change.mtime.is_some() {
            table.utimens(
                path,
                Some(change.atime.unwrap_or(current.atime)),
                Some(change.mtime.unwrap_or(current.mtime)),
            )?;
        }
        Ok(table.get_attributes(path)?.clone())
    }

    /// Sets an extended attribute.
    ///
    /// # Errors
    ///
    /// Returns a not-found error if the path is absent.
    pub async fn set_xattr(&self, path: &VfsPath, name: &str, value: &[u8]) -> FsResult<()> {
        let mut state = self.state.lock().await;
        Ok(state.table.set_xattr(path, name, value)?)
    }

    /// Returns an extended attribute, empty if it was never set.
    ///
    /// # Errors
    ///
    /// Returns a not-found error if the path is absent.
    pub async fn get_xattr(&self, path: &VfsPath, name: &str) -> FsResult<Vec<u8>> {
        let state = self.state.lock().await;
        Ok(state.table.get_xattr(path, name)?.to_vec())
    }

    /// Lists extended attribute names.
    ///
    /// # Errors
    ///
    /// Returns a not-found error if the path is absent.
    pub async fn list_xattrs(&self, path: &VfsPath) -> FsResult<Vec<String>> {
        let state = self.state.lock().await;
        Ok(state.table.list_xattrs(path)?)
    }

    /// Removes an extended attribute; a missing one is ignored.
    ///
    /// # Errors
    ///
    /// Returns a not-found error if the path is absent.
    pub async fn remove_xattr(&self, path: &VfsPath, name: &str) -> FsResult<()> {
        let mut state = self.state.lock().await;
        Ok(state.table.remove_xattr(path, name)?)
    }

    /// Returns the number of nodes, root included.
    pub async fn node_count(&self) -> usize {
        self.state.lock().await.table.node_count()
    }

    /// Removes the buffer subtree of `session` whose `name` is `file`.
    ///
    /// Buffers are checked in ascending number order and only the first
    /// match is removed. Returns `false` if nothing matched.
    pub async fn remove_buffer(&self, session: SessionId, file: &str) -> bool {
        let mut state = self.state.lock().await;
        let table = &mut state.table;
        let buffers = buffers_dir(session);

        let mut numbered: Vec<(u64, VfsPath)> = table
            .children(&buffers)
            .filter(|(_, node)| node.kind.is_dir())
            .filter_map(|(path, _)| {
                let number = path.file_name()?.parse::<u64>().ok()?;
                Some((number, path.clone()))
            })
            .collect();
        numbered.sort_unstable_by_key(|(number, _)| *number);

        let target = numbered.into_iter().map(|(_, dir)| dir).find(|dir| {
            dir.join("name")
                .is_ok_and(|name| table.content(&name) == file.as_bytes())
        });
        let Some(target) = target else {
            debug!(session = %session, %file, "no buffer to remove");
            return false;
        };
        table.remove_tree(&target);
        info!(session = %session, %file, path = %target, "buffer removed");
        true
    }

    /// Removes a whole session subtree. Returns `false` if it did not exist.
    pub async fn remove_session(&self, session: SessionId) -> bool {
        let mut state = self.state.lock().await;
        let removed = state.table.remove_tree(&session_dir(session));
        if removed > 0 {
            info!(session = %session, removed, "session removed");
        }
        removed > 0
    }

    /// Runs one reaper pass outside a listing.
    ///
    /// Returns the reaped session, if any.
    pub async fn reap(&self) -> Option<SessionId> {
        let mut state = self.state.lock().await;
        self.reap_one(&mut state).await
    }

    // Removes the first session, by ascending id, whose address no longer
    // answers. At most one session goes per pass.
    async fn reap_one(&self, state: &mut State) -> Option<SessionId> {
        for id in session_ids(&state.table) {
            let Some(address) = address_of(&state.table, id) else {
                continue;
            };
            if !self.bridge.is_alive(&address).await {
                let removed = state.table.remove_tree(&session_dir(id));
                warn!(session = %id, %address, removed, "reaped unreachable session");
                return Some(id);
            }
        }
        None
    }

    async fn create_session(&self, state: &mut State, payload: &[u8]) -> FsResult<SessionId> {
        let raw = String::from_utf8_lossy(payload);
        let name = raw.trim();
        let address = RpcAddress::parse(name)?;
        let buffers = self.bridge.enumerate_open_files(&address).await?;

        let mut id = state.next_session;
        while state.table.exists(&session_dir(id)) {
            id = id.next();
        }
        if let Err(e) = populate_session(&mut state.table, id, name, &buffers) {
            state.table.remove_tree(&session_dir(id));
            return Err(FsError::from(e));
        }
        state.next_session = id.next();
        info!(session = %id, %address, buffers = buffers.len(), "session registered");
        Ok(id)
    }
}

fn populate_session(
    table: &mut NodeTable,
    id: SessionId,
    name: &str,
    buffers: &[OpenedBuffer],
) -> nvimfs_vfs::Result<()> {
    table.mkdir(&session_dir(id), DEFAULT_DIR_MODE)?;

    let name_path = session_file(id, "name");
    table.create(&name_path, DEFAULT_FILE_MODE)?;
    table.replace_content(&name_path, name.as_bytes().to_vec())?;
    table.chmod(&name_path, NAME_MODE)?;

    table.create(&session_file(id, "cmd"), DEFAULT_FILE_MODE)?;
    table.create(&session_file(id, "eval"), DEFAULT_FILE_MODE)?;

    let buffers_path = buffers_dir(id);
    table.mkdir(&buffers_path, DEFAULT_DIR_MODE)?;
    table.create(&buffers_path.join("new")?, DEFAULT_FILE_MODE)?;
    for buffer in buffers {
        materialize_buffer(table, id, buffer)?;
    }

    let windows = session_file(id, "windows");
    table.mkdir(&windows, DEFAULT_DIR_MODE)?;
    table.create(&windows.join("new")?, DEFAULT_FILE_MODE)?;
    Ok(())
}

// Re-opening a known buffer only refreshes its name.
fn materialize_buffer(
    table: &mut NodeTable,
    id: SessionId,
    buffer: &OpenedBuffer,
) -> nvimfs_vfs::Result<()> {
    let dir = buffers_dir(id).join(&buffer.number.to_string())?;
    table.mkdir(&dir, DEFAULT_DIR_MODE)?;

    let name = dir.join("name")?;
    if !table.exists(&name) {
        table.create(&name, DEFAULT_FILE_MODE)?;
    }
    table.replace_content(&name, buffer.name.as_bytes().to_vec())?;

    let tags = dir.join("tags")?;
    if !table.exists(&tags) {
        table.create(&tags, DEFAULT_FILE_MODE)?;
    }
    Ok(())
}
