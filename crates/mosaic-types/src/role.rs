//! Roles and their path-scoped permission entries.

use serde::{Deserialize, Serialize};

use crate::ids::RoleId;
use crate::path::{clean_path, is_sub_path};
use crate::perm::PermSet;

/// Name of the protected administrator role.
pub const ADMIN_ROLE_NAME: &str = "admin";

/// Name of the protected guest role.
pub const GUEST_ROLE_NAME: &str = "guest";

/// Default mask granted to `admin` at `/`.
pub const ADMIN_DEFAULT_MASK: u32 = 0xFFFF;

/// A permission mask scoped to a path prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionEntry {
    /// Path prefix, e.g. `/docs`.
    pub path: String,
    /// Bits granted at and below `path`.
    pub permission: PermSet,
}

impl PermissionEntry {
    pub fn new(path: impl Into<String>, permission: PermSet) -> Self {
        Self {
            path: path.into(),
            permission,
        }
    }

    /// True if this entry's prefix covers `path`.
    pub fn covers(&self, path: &str) -> bool {
        is_sub_path(&self.path, path)
    }
}

/// A permission template bound to users by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Ordered scope entries; the first is the role's primary scope.
    #[serde(default)]
    pub permission_scopes: Vec<PermissionEntry>,
}

impl Role {
    pub fn new(id: RoleId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            description: String::new(),
            permission_scopes: Vec::new(),
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Append a scope entry.
    pub fn with_scope(mut self, path: impl Into<String>, permission: PermSet) -> Self {
        self.permission_scopes
            .push(PermissionEntry::new(path, permission));
        self
    }

    /// The default `guest` role: `/` with no bits.
    pub fn guest() -> Self {
        Role::new(RoleId::GUEST, GUEST_ROLE_NAME)
            .with_description("Guest")
            .with_scope("/", PermSet::NONE)
    }

    /// The default `admin` role: `/` with every bit.
    pub fn admin() -> Self {
        Role::new(RoleId::ADMIN, ADMIN_ROLE_NAME)
            .with_description("Administrator")
            .with_scope("/", PermSet::from_bits(ADMIN_DEFAULT_MASK))
    }

    /// True for `admin` and `guest`.
    pub fn is_protected(&self) -> bool {
        is_protected_name(&self.name)
    }

    /// Clean every scope path in place.
    pub fn normalize_scopes(&mut self) {
        for entry in &mut self.permission_scopes {
            entry.path = clean_path(&entry.path);
        }
    }

    /// The first scope entry, if any.
    pub fn primary_scope(&self) -> Option<&PermissionEntry> {
        self.permission_scopes.first()
    }

    /// Scopes in their persisted JSON text form (empty string when none).
    pub fn scopes_json(&self) -> Result<String, serde_json::Error> {
        if self.permission_scopes.is_empty() {
            return Ok(String::new());
        }
        serde_json::to_string(&self.permission_scopes)
    }

    /// Parse scopes from their persisted JSON text form.
    pub fn scopes_from_json(raw: &str) -> Result<Vec<PermissionEntry>, serde_json::Error> {
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(raw)
    }
}

/// True if `name` belongs to a protected role.
pub fn is_protected_name(name: &str) -> bool {
    name == ADMIN_ROLE_NAME || name == GUEST_ROLE_NAME
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::perm::Perm;

    #[test]
    fn test_defaults() {
        let admin = Role::admin();
        assert!(admin.is_protected());
        assert_eq!(admin.id, RoleId::ADMIN);
        assert_eq!(admin.primary_scope().unwrap().permission.bits(), 0xFFFF);

        let guest = Role::guest();
        assert!(guest.is_protected());
        assert!(guest.primary_scope().unwrap().permission.is_empty());

        assert!(!Role::new(RoleId::new(9), "editors").is_protected());
    }

    #[test]
    fn test_normalize_scopes() {
        let mut role = Role::new(RoleId::new(3), "r")
            .with_scope("docs/", PermSet::NONE)
            .with_scope("/a//b/./c/", PermSet::NONE);
        role.normalize_scopes();
        assert_eq!(role.permission_scopes[0].path, "/docs");
        assert_eq!(role.permission_scopes[1].path, "/a/b/c");
    }

    #[test]
    fn test_scopes_json() {
        let role = Role::new(RoleId::new(3), "r").with_scope("/docs", Perm::Write.into());
        let raw = role.scopes_json().unwrap();
        assert_eq!(raw, r#"[{"path":"/docs","permission":8}]"#);
        assert_eq!(Role::scopes_from_json(&raw).unwrap(), role.permission_scopes);
        assert!(Role::scopes_from_json("").unwrap().is_empty());
        assert_eq!(Role::new(RoleId::new(4), "empty").scopes_json().unwrap(), "");
    }

    #[test]
    fn test_entry_covers() {
        let entry = PermissionEntry::new("/docs", PermSet::NONE);
        assert!(entry.covers("/docs/x"));
        assert!(!entry.covers("/docsx"));
    }
}
