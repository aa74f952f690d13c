//! Session registry.
//!
//! Sessions have no state outside the node table: a session exists while its
//! `/clients/<id>/` directory does, and its RPC address is whatever its
//! `name` file holds.

use crate::route::{parse_session_id, session_of};
use nvimfs_core::{RpcAddress, SessionId};
use nvimfs_vfs::{NodeTable, VfsPath};

/// Outcome of resolving the session a path belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The path is not below any `/clients/<id>/` directory
    NotSession,
    /// The path belongs to a session whose address is not set yet
    Pending(SessionId),
    /// The path belongs to a session reachable at the address
    Ready(SessionId, RpcAddress),
}

/// Returns `/clients`.
#[must_use]
pub fn clients_dir() -> VfsPath {
    VfsPath::new("/clients").unwrap_or_else(|_| VfsPath::root())
}

/// Returns `/clients/<id>`.
#[must_use]
pub fn session_dir(id: SessionId) -> VfsPath {
    child(&clients_dir(), &id.to_string())
}

/// Returns `/clients/<id>/<name>`.
#[must_use]
pub fn session_file(id: SessionId, name: &str) -> VfsPath {
    child(&session_dir(id), name)
}

/// Returns `/clients/<id>/buffers`.
#[must_use]
pub fn buffers_dir(id: SessionId) -> VfsPath {
    session_file(id, "buffers")
}

// Components built here are digits or fixed names, which always join.
fn child(parent: &VfsPath, name: &str) -> VfsPath {
    parent.join(name).unwrap_or_else(|_| parent.clone())
}

/// Resolves the session a path belongs to.
///
/// The session is found structurally from the leading `/clients/<id>/`
/// components, then its address is read from the `name` file.
///
/// # Examples
///
/// ```
/// use nvimfs_server::registry::{Resolution, resolve_session_for};
/// use nvimfs_vfs::{NodeTable, VfsPath};
///
/// let table = NodeTable::default();
/// let path = VfsPath::new("/clients/new")?;
/// assert_eq!(resolve_session_for(&table, &path), Resolution::NotSession);
/// # Ok::<(), nvimfs_vfs::VfsError>(())
/// ```
#[must_use]
pub fn resolve_session_for(table: &NodeTable, path: &VfsPath) -> Resolution {
    let Some(id) = session_of(path) else {
        return Resolution::NotSession;
    };
    match address_of(table, id) {
        Some(address) => Resolution::Ready(id, address),
        None => Resolution::Pending(id),
    }
}

/// Reads a session's address from its `name` file.
///
/// Returns `None` if the file is missing or blank.
#[must_use]
pub fn address_of(table: &NodeTable, id: SessionId) -> Option<RpcAddress> {
    let raw = table.content(&session_file(id, "name"));
    RpcAddress::parse(&String::from_utf8_lossy(raw)).ok()
}

/// Lists the ids of all session directories in ascending order.
#[must_use]
pub fn session_ids(table: &NodeTable) -> Vec<SessionId> {
    let clients = clients_dir();
    let mut ids: Vec<SessionId> = table
        .children(&clients)
        .filter(|(_, node)| node.kind.is_dir())
        .filter_map(|(path, _)| path.file_name().and_then(parse_session_id))
        .collect();
    ids.sort_unstable();
    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use nvimfs_vfs::{DEFAULT_DIR_MODE, DEFAULT_FILE_MODE};

    fn table_with_session(id: u64, address: &str) -> NodeTable {
        let mut table = NodeTable::default();
        table.mkdir(&clients_dir(), DEFAULT_DIR_MODE).unwrap();
        let id = SessionId::new(id);
        table.mkdir(&session_dir(id), DEFAULT_DIR_MODE).unwrap();
        let name = session_file(id, "name");
        table.create(&name, DEFAULT_FILE_MODE).unwrap();
        table.write(&name, 0, address.as_bytes()).unwrap();
        table
    }

    #[test]
    fn test_paths() {
        let id = SessionId::new(2);
        assert_eq!(session_dir(id).as_str(), "/clients/2");
        assert_eq!(session_file(id, "eval").as_str(), "/clients/2/eval");
        assert_eq!(buffers_dir(id).as_str(), "/clients/2/buffers");
    }

    #[test]
    fn test_resolves_ready_session() {
        let table = table_with_session(0, "/tmp/sock0");
        let path = VfsPath::new("/clients/0/cmd").unwrap();
        assert_eq!(
            resolve_session_for(&table, &path),
            Resolution::Ready(SessionId::new(0), RpcAddress::parse("/tmp/sock0").unwrap())
        );
    }

    #[test]
    fn test_blank_name_is_pending() {
        let table = table_with_session(0, " \n");
        let path = VfsPath::new("/clients/0/cmd").unwrap();
        assert_eq!(
            resolve_session_for(&table, &path),
            Resolution::Pending(SessionId::new(0))
        );
    }

    #[test]
    fn test_unknown_session_is_pending() {
        let table = NodeTable::default();
        let path = VfsPath::new("/clients/9/cmd").unwrap();
        assert_eq!(
            resolve_session_for(&table, &path),
            Resolution::Pending(SessionId::new(9))
        );
    }

    #[test]
    fn test_non_session_paths() {
        let table = table_with_session(0, "/tmp/sock0");
        for path in ["/clients/new", "/clients", "/clients/0", "/tmp/clients/0/cmd"] {
            let path = VfsPath::new(path).unwrap();
            assert_eq!(resolve_session_for(&table, &path), Resolution::NotSession);
        }
    }

    #[test]
    fn test_session_ids_numeric_order() {
        let mut table = table_with_session(10, "/tmp/a");
        table.mkdir(&session_dir(SessionId::new(2)), DEFAULT_DIR_MODE).unwrap();
        table
            .create(&VfsPath::new("/clients/new").unwrap(), DEFAULT_FILE_MODE)
            .unwrap();
        assert_eq!(
            session_ids(&table),
            vec![SessionId::new(2), SessionId::new(10)]
        );
    }
}
