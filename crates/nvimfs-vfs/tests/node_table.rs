//! Integration tests for the node table.
//!
//! Builds the layout the dispatcher produces for a session and checks the
//! table-wide invariants after a mix of operations.

use nvimfs_vfs::{DEFAULT_DIR_MODE, DEFAULT_FILE_MODE, NodeTable, Owner, VfsPath};

fn p(path: &str) -> VfsPath {
    VfsPath::new(path).unwrap()
}

fn session_layout(table: &mut NodeTable, id: u64) {
    let base = format!("/clients/{id}");
    table.mkdir(&p(&base), DEFAULT_DIR_MODE).unwrap();
    for file in ["name", "cmd", "eval"] {
        table
            .create(&p(&format!("{base}/{file}")), DEFAULT_FILE_MODE)
            .unwrap();
    }
    for dir in ["buffers", "windows"] {
        table
            .mkdir(&p(&format!("{base}/{dir}")), DEFAULT_DIR_MODE)
            .unwrap();
        table
            .create(&p(&format!("{base}/{dir}/new")), DEFAULT_FILE_MODE)
            .unwrap();
    }
}

fn assert_invariants(table: &NodeTable) {
    for path in table.all_paths() {
        if let Some(parent) = path.parent() {
            let parent_node = table.get_attributes(&parent).unwrap();
            assert!(parent_node.kind.is_dir(), "parent of {path} is not a dir");
        }
        let node = table.get_attributes(path).unwrap();
        if node.kind.is_file() {
            assert_eq!(node.size, table.content(path).len() as u64);
        }
    }
}

#[test]
fn test_session_layout_listing() {
    let mut table = NodeTable::new(Owner { uid: 1000, gid: 1000 });
    table.mkdir(&p("/clients"), DEFAULT_DIR_MODE).unwrap();
    table.create(&p("/clients/new"), DEFAULT_FILE_MODE).unwrap();
    session_layout(&mut table, 0);

    let names: Vec<_> = table
        .list_children(&p("/clients/0"))
        .unwrap()
        .into_iter()
        .map(|entry| entry.name)
        .collect();
    assert_eq!(
        names,
        vec![".", "..", "buffers", "cmd", "eval", "name", "windows"]
    );
    assert_eq!(table.get_attributes(&p("/clients/0")).unwrap().nlink, 4);
    assert_invariants(&table);
}

#[test]
fn test_removing_one_session_leaves_the_other() {
    let mut table = NodeTable::default();
    table.mkdir(&p("/clients"), DEFAULT_DIR_MODE).unwrap();
    session_layout(&mut table, 1);
    session_layout(&mut table, 10);
    table.write(&p("/clients/10/name"), 0, b"work").unwrap();

    table.remove_tree(&p("/clients/1"));

    assert!(!table.exists(&p("/clients/1/name")));
    assert_eq!(table.content(&p("/clients/10/name")), b"work");
    assert_eq!(table.get_attributes(&p("/clients")).unwrap().nlink, 3);
    assert_invariants(&table);
}

#[test]
fn test_write_then_read_whole_file() {
    let mut table = NodeTable::default();
    table.create(&p("/data"), DEFAULT_FILE_MODE).unwrap();

    let payload: Vec<u8> = (0..=255).collect();
    table.write(&p("/data"), 0, &payload[..100]).unwrap();
    table.write(&p("/data"), 100, &payload[100..]).unwrap();

    assert_eq!(table.read(&p("/data"), 0, 4096).unwrap(), payload.as_slice());
    assert_invariants(&table);
}

#[test]
fn test_mixed_operations_keep_invariants() {
    let mut table = NodeTable::default();
    table.mkdir(&p("/a"), DEFAULT_DIR_MODE).unwrap();
    table.create(&p("/a/f"), DEFAULT_FILE_MODE).unwrap();
    table.write(&p("/a/f"), 3, b"xyz").unwrap();
    table.symlink(&p("/a/l"), b"f").unwrap();
    table.truncate(&p("/a/f"), 1).unwrap();
    table.mkdir(&p("/b"), DEFAULT_DIR_MODE).unwrap();
    table.rename(&p("/a"), &p("/b/a")).unwrap();
    table.remove(&p("/b/a/l"));

    assert_eq!(table.content(&p("/b/a/f")), b"\0");
    assert_eq!(table.node_count(), 4);
    assert_invariants(&table);
}

#[test]
fn test_remove_tree_counts_every_node() {
    let mut table = NodeTable::default();
    table.mkdir(&p("/d"), DEFAULT_DIR_MODE).unwrap();
    table.create(&p("/d/f"), DEFAULT_FILE_MODE).unwrap();

    assert_eq!(table.remove_tree(&p("/d")), 2);
    assert_eq!(table.node_count(), 1);
    assert_invariants(&table);
}
