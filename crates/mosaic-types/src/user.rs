//! Users.
//!
//! A user never stores its effective permissions; they are derived from
//! the referenced roles on every request.

use serde::{Deserialize, Serialize};

use crate::ids::{RoleId, UserId};
use crate::path::{join_base, PathError};

/// Username of the built-in administrator account.
pub const ADMIN_USERNAME: &str = "admin";

/// A gateway user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    /// Root of everything this user addresses.
    #[serde(default = "default_base_path")]
    pub base_path: String,
    /// Weak references; a dangling id simply grants nothing.
    #[serde(default, rename = "role")]
    pub role_ids: Vec<RoleId>,
    #[serde(default)]
    pub disabled: bool,
    /// Unix seconds of the last password change.
    #[serde(default)]
    pub password_ts: i64,
}

fn default_base_path() -> String {
    "/".to_string()
}

impl User {
    pub fn new(id: UserId, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            base_path: default_base_path(),
            role_ids: Vec::new(),
            disabled: false,
            password_ts: 0,
        }
    }

    /// Set the base path.
    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = base_path.into();
        self
    }

    /// Add a role reference.
    pub fn with_role(mut self, role: RoleId) -> Self {
        if !self.role_ids.contains(&role) {
            self.role_ids.push(role);
        }
        self
    }

    pub fn has_role(&self, role: RoleId) -> bool {
        self.role_ids.contains(&role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(RoleId::ADMIN)
    }

    pub fn is_guest(&self) -> bool {
        self.has_role(RoleId::GUEST)
    }

    /// Resolve a request path against this user's base path.
    pub fn join_path(&self, request: &str) -> Result<String, PathError> {
        join_base(&self.base_path, request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_path() {
        let bob = User::new(UserId::new(5), "bob").with_base_path("/home/bob");
        assert_eq!(bob.join_path("/music").unwrap(), "/home/bob/music");
        assert!(bob.join_path("/../alice").is_err());
    }

    #[test]
    fn test_roles() {
        let user = User::new(UserId::new(1), "a")
            .with_role(RoleId::ADMIN)
            .with_role(RoleId::ADMIN);
        assert_eq!(user.role_ids.len(), 1);
        assert!(user.is_admin());
        assert!(!user.is_guest());
    }

    #[test]
    fn test_deserialize_defaults() {
        let user: User = serde_json::from_str(r#"{"id":3,"username":"c","role":[1]}"#).unwrap();
        assert_eq!(user.base_path, "/");
        assert!(user.is_guest());
    }
}
