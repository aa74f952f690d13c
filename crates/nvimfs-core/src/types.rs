//! Strong domain types for nvimfs.
//!
//! Session ids, buffer numbers and RPC addresses all travel through the
//! filesystem as text. Wrapping them keeps them from being confused with
//! each other or with arbitrary path components.
//!
//! # Examples
//!
//! ```
//! use nvimfs_core::{BufferNumber, RpcAddress, SessionId};
//!
//! let session = SessionId::new(0);
//! let buffer = BufferNumber::new(3);
//! let address = RpcAddress::parse("/tmp/nvim.sock").unwrap();
//!
//! assert_eq!(session.to_string(), "0");
//! assert_eq!(buffer.to_string(), "3");
//! assert!(address.is_unix());
//! ```

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Session identifier (newtype over `u64`).
///
/// Allocated from a counter owned by the dispatcher; appears as the
/// `<id>` component of `/clients/<id>/`.
///
/// # Examples
///
/// ```
/// use nvimfs_core::SessionId;
///
/// let id: SessionId = "12".parse().unwrap();
/// assert_eq!(id.as_u64(), 12);
/// assert!("x12".parse::<SessionId>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionId(u64);

impl SessionId {
    /// Creates a session id.
    #[inline]
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw id.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the id that follows this one.
    #[inline]
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

/// Buffer number as reported by the editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BufferNumber(u64);

impl BufferNumber {
    /// Creates a buffer number.
    #[inline]
    #[must_use]
    pub const fn new(number: u64) -> Self {
        Self(number)
    }

    /// Returns the raw number.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for BufferNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Address of a session's RPC endpoint.
///
/// Anything that contains a `/` or does not parse as `ip:port` is treated
/// as a Unix-domain socket path.
///
/// # Examples
///
/// ```
/// use nvimfs_core::RpcAddress;
///
/// let tcp = RpcAddress::parse(" 127.0.0.1:6666\n")?;
/// assert!(!tcp.is_unix());
/// assert_eq!(tcp.to_string(), "127.0.0.1:6666");
///
/// let unix = RpcAddress::parse("nvim.sock")?;
/// assert!(unix.is_unix());
/// # Ok::<(), nvimfs_core::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RpcAddress {
    /// Unix-domain socket path
    Unix(PathBuf),
    /// TCP endpoint
    Tcp(SocketAddr),
}

impl RpcAddress {
    /// Parses an address, trimming surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidAddress` if nothing is left after trimming.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidAddress {
                address: raw.to_string(),
            });
        }
        if !trimmed.contains('/') {
            if let Ok(addr) = trimmed.parse::<SocketAddr>() {
                return Ok(Self::Tcp(addr));
            }
        }
        Ok(Self::Unix(PathBuf::from(trimmed)))
    }

    /// Returns `true` for Unix-domain socket addresses.
    #[must_use]
    pub const fn is_unix(&self) -> bool {
        matches!(self, Self::Unix(_))
    }

    /// Returns the socket path for Unix addresses.
    #[must_use]
    pub fn socket_path(&self) -> Option<&Path> {
        match self {
            Self::Unix(path) => Some(path),
            Self::Tcp(_) => None,
        }
    }
}

impl fmt::Display for RpcAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unix(path) => write!(f, "{}", path.display()),
            Self::Tcp(addr) => write!(f, "{addr}"),
        }
    }
}

impl FromStr for RpcAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
