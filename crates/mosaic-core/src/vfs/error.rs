//! VFS error types.

use thiserror::Error;

/// VFS error type.
///
/// `Clone` so one failed fetch can be reported to every listing that
/// waited on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VfsError {
    /// File or directory not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Path already exists.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Expected a directory.
    #[error("not a directory: {0}")]
    NotADirectory(String),

    /// Invalid path.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// No mount point and no virtual directory for path.
    #[error("no mount point for path: {0}")]
    NoMountPoint(String),

    /// Upstream fetch failed; worth retrying later.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// The backend does not implement this operation.
    #[error("{driver} does not support {op}")]
    Unsupported {
        driver: &'static str,
        op: &'static str,
    },

    /// Caller cancelled or the deadline passed.
    #[error("operation cancelled")]
    Cancelled,

    /// Other error.
    #[error("{0}")]
    Other(String),
}

impl VfsError {
    /// Create a NotFound error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    /// Create an AlreadyExists error.
    pub fn already_exists(path: impl Into<String>) -> Self {
        Self::AlreadyExists(path.into())
    }

    /// Create a NotADirectory error.
    pub fn not_a_directory(path: impl Into<String>) -> Self {
        Self::NotADirectory(path.into())
    }

    /// Create an InvalidPath error.
    pub fn invalid_path(path: impl Into<String>) -> Self {
        Self::InvalidPath(path.into())
    }

    /// Create a NoMountPoint error.
    pub fn no_mount_point(path: impl Into<String>) -> Self {
        Self::NoMountPoint(path.into())
    }

    /// Create a BackendUnavailable error.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::BackendUnavailable(reason.into())
    }

    /// Create an Unsupported error.
    pub fn unsupported(driver: &'static str, op: &'static str) -> Self {
        Self::Unsupported { driver, op }
    }

    /// Create an Other error.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// True for the "nothing here" family.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::NoMountPoint(_))
    }
}

/// VFS result type.
pub type VfsResult<T> = Result<T, VfsError>;
