//! Mount configuration.
//!
//! Every field has a default, so an empty TOML file (or none at all) yields a
//! working configuration.
//!
//! # Examples
//!
//! ```
//! use nvimfs_core::FsConfig;
//! use std::time::Duration;
//!
//! let config = FsConfig::from_toml_str("allow_other = true")?;
//! assert!(config.allow_other);
//! assert_eq!(config.fs_name, "nvimfs");
//! assert_eq!(config.attr_ttl(), Duration::from_secs(1));
//! # Ok::<(), nvimfs_core::Error>(())
//! ```

use crate::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Settings for the FUSE mount.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FsConfig {
    /// Filesystem name shown in the mount table.
    ///
    /// Default: `"nvimfs"`
    pub fs_name: String,

    /// How long the kernel may cache attributes and entries, in milliseconds.
    ///
    /// Default: 1000
    pub attr_ttl_ms: u64,

    /// Let users other than the mounting one access the filesystem.
    ///
    /// Requires `user_allow_other` in `/etc/fuse.conf`.
    /// Default: false
    pub allow_other: bool,

    /// Let the kernel enforce permission bits, which is what keeps a
    /// session's `name` file read-only.
    ///
    /// Default: true
    pub default_permissions: bool,

    /// Largest single write request the kernel may send, in bytes.
    ///
    /// Default: 128 KiB
    pub max_write: u32,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            fs_name: "nvimfs".to_string(),
            attr_ttl_ms: 1000,
            allow_other: false,
            default_permissions: true,
            max_write: 128 * 1024,
        }
    }
}

impl FsConfig {
    /// Parses a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigError` if the text is not valid TOML, contains
    /// unknown keys or `max_write` is zero.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|e| Error::ConfigError {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a TOML configuration file.
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigError` if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| Error::ConfigError {
            message: format!("cannot read {}: {e}", path.display()),
        })?;
        Self::from_toml_str(&text)
    }

    /// Returns the attribute TTL as a `Duration`.
    #[must_use]
    pub const fn attr_ttl(&self) -> Duration {
        Duration::from_millis(self.attr_ttl_ms)
    }

    fn validate(&self) -> Result<()> {
        if self.max_write == 0 {
            return Err(Error::ConfigError {
                message: "max_write must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}
