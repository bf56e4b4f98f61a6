//! Role and permission errors.

use thiserror::Error;

/// Access layer error.
///
/// `Clone` so a coalesced cache load can hand one failure to every waiter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    #[error("role not found: {0}")]
    RoleNotFound(String),

    #[error("user not found: {0}")]
    UserNotFound(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("invalid scope: {0}")]
    InvalidScope(String),

    /// Attempt to delete or rename `admin`/`guest`, or to edit the admin
    /// account's identity.
    #[error("protected role violation: {0}")]
    ProtectedRole(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Backing store failure.
    #[error("store error: {0}")]
    Store(String),
}

impl AccessError {
    pub fn store(e: impl std::fmt::Display) -> Self {
        Self::Store(e.to_string())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::RoleNotFound(_) | Self::UserNotFound(_))
    }
}

/// Result type for access operations.
pub type AccessResult<T> = Result<T, AccessError>;
