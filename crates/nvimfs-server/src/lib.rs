//! nvimfs filesystem server.
//!
//! Exposes running Neovim sessions as a FUSE filesystem. Every session gets a
//! directory under `/clients/<id>/` whose control files forward writes to the
//! editor over msgpack-RPC.
//!
//! # Architecture
//!
//! - [`route`] classifies write targets
//! - [`registry`] finds the session a path belongs to
//! - [`Engine`] owns the node table and dispatches every operation
//! - [`NvimFs`] adapts the engine to `fuse3`

#![deny(unsafe_code)]
#![warn(missing_docs, missing_debug_implementations)]

pub mod cli;
pub mod engine;
pub mod error;
pub mod fuse;
pub mod registry;
pub mod route;

pub use engine::{AttrChange, Engine};
pub use error::{FsError, FsResult};
pub use fuse::NvimFs;
