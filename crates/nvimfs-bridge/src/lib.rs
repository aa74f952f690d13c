//! RPC bridge between nvimfs and Neovim sessions.
//!
//! Talks msgpack-RPC to a running editor over a Unix socket or TCP and
//! offers the handful of operations the filesystem needs: run commands,
//! evaluate expressions, open files, split windows and list open buffers.
//!
//! # Architecture
//!
//! - [`MsgpackCodec`] frames msgpack values on a byte stream
//! - [`NvimClient`] issues requests and matches responses
//! - [`Connector`] / [`EditorRpc`] are the seams the filesystem depends on
//! - [`RpcBridge`] implements the session operations on top of them

#![deny(unsafe_code)]
#![warn(missing_docs, missing_debug_implementations)]

pub mod bridge;
pub mod client;
pub mod codec;
pub mod connector;
pub mod message;
pub mod split;

pub use bridge::{OpenedBuffer, RpcBridge, payload_lines, stringify};
pub use client::NvimClient;
pub use codec::MsgpackCodec;
pub use connector::{Connector, EditorRpc, NvimConnector};
pub use message::Message;
pub use rmpv::Value;
pub use split::is_split_command;
