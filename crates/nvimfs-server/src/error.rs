//! Filesystem-level error type.
//!
//! Wraps node table and session errors and maps each of them to the POSIX
//! errno the kernel hands back to the caller.

use nvimfs_vfs::VfsError;
use thiserror::Error;

/// Error returned by dispatcher operations.
#[derive(Error, Debug)]
pub enum FsError {
    /// Node table failure
    #[error(transparent)]
    Vfs(#[from] VfsError),

    /// Session, RPC or configuration failure
    #[error(transparent)]
    Core(#[from] nvimfs_core::Error),

    /// The kernel sent a handle-only request without a path
    #[error("Request carries no path")]
    MissingPath,
}

impl FsError {
    /// Returns the errno reported to the kernel.
    ///
    /// # Examples
    ///
    /// ```
    /// use nvimfs_server::FsError;
    /// use nvimfs_vfs::VfsError;
    ///
    /// let err = FsError::from(VfsError::NotFound { path: "/x".to_string() });
    /// assert_eq!(err.errno(), libc::ENOENT);
    /// ```
    #[must_use]
    pub const fn errno(&self) -> libc::c_int {
        match self {
            Self::Vfs(err) => match err {
                VfsError::NotFound { .. } => libc::ENOENT,
                VfsError::AlreadyExists { .. } => libc::EEXIST,
                VfsError::NotADirectory { .. } => libc::ENOTDIR,
                VfsError::IsADirectory { .. } => libc::EISDIR,
                VfsError::NotEmpty { .. } => libc::ENOTEMPTY,
                VfsError::InvalidPath { .. } => libc::EINVAL,
                VfsError::FileTooLarge { .. } => libc::EFBIG,
            },
            Self::Core(err) => match err {
                nvimfs_core::Error::ConnectionFailed { .. } => libc::ECONNREFUSED,
                nvimfs_core::Error::InvalidAddress { .. } | nvimfs_core::Error::ConfigError { .. } => {
                    libc::EINVAL
                }
                nvimfs_core::Error::Remote { .. } | nvimfs_core::Error::Protocol { .. } => libc::EIO,
            },
            Self::MissingPath => libc::EBADF,
        }
    }

    /// Returns `true` if the path does not exist.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Vfs(VfsError::NotFound { .. }))
    }
}

impl From<FsError> for fuse3::Errno {
    fn from(err: FsError) -> Self {
        Self::from(err.errno())
    }
}

/// Type alias for dispatcher results.
pub type FsResult<T> = std::result::Result<T, FsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vfs_errno_mapping() {
        let cases = [
            (VfsError::NotFound { path: "/a".into() }, libc::ENOENT),
            (VfsError::AlreadyExists { path: "/a".into() }, libc::EEXIST),
            (VfsError::NotADirectory { path: "/a".into() }, libc::ENOTDIR),
            (VfsError::IsADirectory { path: "/a".into() }, libc::EISDIR),
            (VfsError::NotEmpty { path: "/a".into() }, libc::ENOTEMPTY),
            (VfsError::InvalidPath { path: "a".into() }, libc::EINVAL),
            (
                VfsError::FileTooLarge {
                    path: "/a".into(),
                    size: u64::MAX,
                },
                libc::EFBIG,
            ),
        ];
        for (err, errno) in cases {
            assert_eq!(FsError::from(err).errno(), errno);
        }
    }

    #[test]
    fn test_core_errno_mapping() {
        let refused = nvimfs_core::Error::ConnectionFailed {
            address: "/tmp/s".into(),
            source: "refused".into(),
        };
        assert_eq!(FsError::from(refused).errno(), libc::ECONNREFUSED);

        let remote = nvimfs_core::Error::Remote {
            method: "nvim_command".into(),
            message: "E492".into(),
        };
        assert_eq!(FsError::from(remote).errno(), libc::EIO);

        let empty = nvimfs_core::Error::InvalidAddress { address: String::new() };
        assert_eq!(FsError::from(empty).errno(), libc::EINVAL);
    }

    #[test]
    fn test_missing_path() {
        assert_eq!(FsError::MissingPath.errno(), libc::EBADF);
        assert!(!FsError::MissingPath.is_not_found());
    }

    #[test]
    fn test_display_is_transparent() {
        let err = FsError::from(VfsError::NotFound { path: "/x".into() });
        assert_eq!(err.to_string(), "No such entry: /x");
        assert!(err.is_not_found());
    }
}
