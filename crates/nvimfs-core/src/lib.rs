//! Core types, errors and configuration for nvimfs.
//!
//! This crate provides the foundational types shared by the RPC bridge and
//! the filesystem server.
//!
//! # Architecture
//!
//! The core consists of:
//! - Strong domain types (`SessionId`, `BufferNumber`, `RpcAddress`)
//! - The error type for session and configuration failures
//! - Mount configuration (`FsConfig`)

#![deny(unsafe_code)]
#![warn(missing_docs, missing_debug_implementations)]

mod config;
mod error;
mod types;

pub use config::FsConfig;
pub use error::{Error, Result};
pub use types::{BufferNumber, RpcAddress, SessionId};
