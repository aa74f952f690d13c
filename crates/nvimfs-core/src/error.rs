//! Error types for nvimfs.
//!
//! Everything that talks to an editor session or reads configuration reports
//! failures through [`Error`]. Node table failures live in their own type
//! inside `nvimfs-vfs`.
//!
//! # Examples
//!
//! ```
//! use nvimfs_core::{Error, RpcAddress, Result};
//!
//! fn parse(raw: &str) -> Result<RpcAddress> {
//!     RpcAddress::parse(raw)
//! }
//!
//! let err = parse("   ").unwrap_err();
//! assert!(err.is_invalid_address());
//! ```

use thiserror::Error;

/// Main error type for nvimfs session and configuration handling.
#[derive(Error, Debug)]
pub enum Error {
    /// Connecting to a session's RPC address failed.
    ///
    /// Raised when the socket cannot be opened or the stream breaks before a
    /// response arrives.
    #[error("Connection to session at {address} failed")]
    ConnectionFailed {
        /// Address that could not be reached
        address: String,
        /// Underlying error cause
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The editor answered a request with an error.
    #[error("Remote call {method} failed: {message}")]
    Remote {
        /// RPC method name
        method: String,
        /// Error text reported by the editor
        message: String,
    },

    /// A message on the wire did not follow msgpack-RPC framing.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the malformed message
        message: String,
    },

    /// An RPC address string is empty or unusable.
    #[error("Invalid session address: {address:?}")]
    InvalidAddress {
        /// The rejected address
        address: String,
    },

    /// Configuration error.
    ///
    /// Raised when a configuration file is missing or malformed.
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Description of the configuration problem
        message: String,
    },
}

impl Error {
    /// Returns `true` if this is a connection error.
    ///
    /// # Examples
    ///
    /// ```
    /// use nvimfs_core::Error;
    ///
    /// let err = Error::ConnectionFailed {
    ///     address: "/tmp/nvim.sock".to_string(),
    ///     source: "connection refused".into(),
    /// };
    /// assert!(err.is_connection_error());
    /// ```
    #[must_use]
    pub const fn is_connection_error(&self) -> bool {
        matches!(self, Self::ConnectionFailed { .. })
    }

    /// Returns `true` if the editor rejected a call.
    #[must_use]
    pub const fn is_remote_error(&self) -> bool {
        matches!(self, Self::Remote { .. })
    }

    /// Returns `true` if this is a framing or decoding error.
    #[must_use]
    pub const fn is_protocol_error(&self) -> bool {
        matches!(self, Self::Protocol { .. })
    }

    /// Returns `true` if this is an invalid address error.
    #[must_use]
    pub const fn is_invalid_address(&self) -> bool {
        matches!(self, Self::InvalidAddress { .. })
    }

    /// Returns `true` if this is a configuration error.
    #[must_use]
    pub const fn is_config_error(&self) -> bool {
        matches!(self, Self::ConfigError { .. })
    }
}

/// Type alias for `Result` with our [`Error`] type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_error_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = Error::ConnectionFailed {
            address: "127.0.0.1:6666".to_string(),
            source: Box::new(io),
        };
        assert!(err.is_connection_error());
        assert!(std::error::Error::source(&err).is_some());
        assert_eq!(
            err.to_string(),
            "Connection to session at 127.0.0.1:6666 failed"
        );
    }

    #[test]
    fn test_remote_error_display() {
        let err = Error::Remote {
            method: "nvim_eval".to_string(),
            message: "E15: Invalid expression".to_string(),
        };
        assert!(err.is_remote_error());
        assert!(!err.is_protocol_error());
        assert_eq!(
            err.to_string(),
            "Remote call nvim_eval failed: E15: Invalid expression"
        );
    }

    #[test]
    fn test_invalid_address_display_is_quoted() {
        let err = Error::InvalidAddress {
            address: String::new(),
        };
        assert_eq!(err.to_string(), "Invalid session address: \"\"");
    }

    #[test]
    fn test_config_error() {
        let err = Error::ConfigError {
            message: "bad".to_string(),
        };
        assert!(err.is_config_error());
        assert!(!err.is_connection_error());
    }
}
