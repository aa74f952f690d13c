//! In-memory node table for nvimfs.
//!
//! Holds the metadata of every path in the mounted namespace together with
//! a sparse content store for regular files and symlinks. Nothing in this
//! crate knows about editors or FUSE; it is a plain data structure that the
//! dispatcher mutates under its own lock.

#![deny(unsafe_code)]
#![warn(missing_docs, missing_debug_implementations)]

pub mod table;
pub mod types;

pub use table::{DEFAULT_DIR_MODE, DEFAULT_FILE_MODE, MAX_FILE_SIZE, NodeTable};
pub use types::{DirEntry, Node, NodeKind, Owner, Result, VfsError, VfsPath};
