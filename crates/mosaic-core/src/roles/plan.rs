//! Pure planning for role and user mutations.
//!
//! Every cascading change is computed here first, from plain values, and
//! only then applied to the store and the caches by [`RoleManager`].
//!
//! [`RoleManager`]: super::RoleManager

use mosaic_types::path::{clean_path, rewrite_prefix};
use mosaic_types::role::is_protected_name;
use mosaic_types::{Role, User, UserId, GUEST_ROLE_NAME};

use crate::access::{AccessError, AccessResult};

use super::cache::RoleKey;

/// One user whose base path moves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasePathRewrite {
    pub user_id: UserId,
    pub username: String,
    pub from: String,
    pub to: String,
}

/// Users whose base path equals or lies under `old`, and where they move.
pub fn plan_base_path_rewrites(users: &[User], old: &str, new: &str) -> Vec<BasePathRewrite> {
    users
        .iter()
        .filter_map(|user| {
            let to = rewrite_prefix(&user.base_path, old, new)?;
            let from = clean_path(&user.base_path);
            (to != from).then(|| BasePathRewrite {
                user_id: user.id,
                username: user.username.clone(),
                from,
                to,
            })
        })
        .collect()
}

/// Roles whose scope entries equal or lie under `old`, rewritten onto `new`.
pub fn plan_scope_rewrites(roles: &[Role], old: &str, new: &str) -> Vec<Role> {
    roles
        .iter()
        .filter_map(|role| {
            let mut rewritten = role.clone();
            let mut changed = false;
            for entry in &mut rewritten.permission_scopes {
                if let Some(path) = rewrite_prefix(&entry.path, old, new) {
                    changed |= path != entry.path;
                    entry.path = path;
                }
            }
            changed.then_some(rewritten)
        })
        .collect()
}

/// Reject scope paths that would silently change meaning when cleaned.
pub fn validate_scopes(role: &Role) -> AccessResult<()> {
    for entry in &role.permission_scopes {
        let raw = entry.path.as_str();
        if raw.contains('\0') || raw.split(['/', '\\']).any(|segment| segment == "..") {
            return Err(AccessError::InvalidScope(raw.to_string()));
        }
    }
    Ok(())
}

/// Everything an accepted role update will do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleUpdatePlan {
    /// The role to persist, scopes normalized.
    pub role: Role,
    /// Primary scope move to cascade onto user base paths.
    pub scope_move: Option<(String, String)>,
    /// Cache keys to drop afterwards.
    pub stale_keys: Vec<RoleKey>,
}

/// Check an update of `current` to `requested` and work out its effects.
///
/// `admin` cannot be updated at all. `guest` can have its description and
/// scopes changed, never its name. Another role cannot take a protected
/// name.
pub fn plan_role_update(current: &Role, requested: Role) -> AccessResult<RoleUpdatePlan> {
    let mut role = requested;
    role.id = current.id;
    match current.name.as_str() {
        GUEST_ROLE_NAME if role.name != GUEST_ROLE_NAME => {
            return Err(AccessError::ProtectedRole(format!(
                "cannot rename role {GUEST_ROLE_NAME} to {}",
                role.name
            )));
        }
        GUEST_ROLE_NAME => {}
        name if is_protected_name(name) => {
            return Err(AccessError::ProtectedRole(format!("cannot modify role {name}")));
        }
        _ if role.is_protected() => {
            return Err(AccessError::ProtectedRole(format!(
                "cannot rename role {} to {}",
                current.name, role.name
            )));
        }
        _ => {}
    }
    validate_scopes(&role)?;
    role.normalize_scopes();

    let scope_move = match (current.primary_scope(), role.primary_scope()) {
        (Some(old), Some(new)) if clean_path(&old.path) != new.path => {
            Some((clean_path(&old.path), new.path.clone()))
        }
        _ => None,
    };

    let mut stale_keys = vec![RoleKey::Id(role.id), RoleKey::Name(current.name.clone())];
    if role.name != current.name {
        stale_keys.push(RoleKey::Name(role.name.clone()));
    }

    Ok(RoleUpdatePlan {
        role,
        scope_move,
        stale_keys,
    })
}
