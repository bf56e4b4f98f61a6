//! Role and user mutations.
//!
//! Each mutation is planned from plain values first (see [`super::plan`]),
//! then written to the store, then the affected cache entries are dropped.

use std::sync::Arc;

use tracing::{info, warn};

use mosaic_types::path::clean_path;
use mosaic_types::user::ADMIN_USERNAME;
use mosaic_types::{Role, RoleId, User};

use super::cache::{RoleCache, UserCache};
use super::plan::{plan_role_update, plan_scope_rewrites, validate_scopes};
use super::store::RoleStore;
use crate::access::{AccessError, AccessResult};

/// What a path rename touched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathRenameReport {
    pub roles: Vec<RoleId>,
    pub users: Vec<String>,
}

/// What a role update touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleUpdateReport {
    pub role: Role,
    /// Users whose base path followed the role's primary scope.
    pub users: Vec<String>,
}

/// The only place roles and users are mutated.
#[derive(Debug, Clone)]
pub struct RoleManager {
    roles: Arc<RoleCache>,
    users: Arc<UserCache>,
}

impl RoleManager {
    pub fn new(roles: Arc<RoleCache>, users: Arc<UserCache>) -> Self {
        Self { roles, users }
    }

    fn store(&self) -> &Arc<dyn RoleStore> {
        self.roles.store()
    }

    /// Create `guest` and `admin` when missing. Idempotent.
    pub async fn ensure_default_roles(&self) -> AccessResult<()> {
        for default in [Role::guest(), Role::admin()] {
            match self.store().load_role_by_name(&default.name).await {
                Ok(_) => {}
                Err(AccessError::RoleNotFound(_)) => {
                    let role = self.store().save_role(default).await?;
                    self.roles.invalidate_role(&role).await;
                    info!(role = %role.name, id = %role.id, "default role created");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    pub async fn create_role(&self, mut role: Role) -> AccessResult<Role> {
        if role.is_protected() {
            return Err(AccessError::ProtectedRole(format!(
                "role {} is built in",
                role.name
            )));
        }
        validate_scopes(&role)?;
        role.normalize_scopes();
        role.id = RoleId::new(0);

        let role = self.store().save_role(role).await?;
        self.roles.invalidate_role(&role).await;
        info!(role = %role.name, id = %role.id, "role created");
        Ok(role)
    }

    /// Update a role; a moved primary scope carries user base paths along.
    pub async fn update_role(&self, role: Role) -> AccessResult<RoleUpdateReport> {
        let current = self.store().load_role(role.id).await?;
        let plan = plan_role_update(&current, role)?;

        let mut users = Vec::new();
        if let Some((old, new)) = &plan.scope_move {
            users = self.store().rewrite_user_base_paths(old, new).await?;
            for username in &users {
                self.users.invalidate(username).await;
            }
        }

        let role = self.store().save_role(plan.role).await?;
        for key in &plan.stale_keys {
            self.roles.invalidate(key).await;
        }
        info!(role = %role.name, id = %role.id, users = users.len(), "role updated");
        Ok(RoleUpdateReport { role, users })
    }

    pub async fn delete_role(&self, id: RoleId) -> AccessResult<()> {
        let role = self.store().load_role(id).await?;
        if role.is_protected() {
            return Err(AccessError::ProtectedRole(format!(
                "cannot delete role {}",
                role.name
            )));
        }
        self.store().delete_role(id).await?;
        self.roles.invalidate_role(&role).await;
        info!(role = %role.name, id = %id, "role deleted");
        Ok(())
    }

    /// Rewrite every scope entry at or under `old` onto `new`.
    pub async fn rename_scope_prefix(&self, old: &str, new: &str) -> AccessResult<Vec<RoleId>> {
        let roles = self.store().list_roles().await?;
        let rewritten = plan_scope_rewrites(&roles, old, new);

        let mut ids = Vec::with_capacity(rewritten.len());
        for role in rewritten {
            let role = self.store().save_role(role).await?;
            self.roles.invalidate_role(&role).await;
            ids.push(role.id);
        }
        if !ids.is_empty() {
            info!(from = %old, to = %new, roles = ids.len(), "role scopes rewritten");
        }
        Ok(ids)
    }

    /// Move a path: role scopes and user base paths both follow.
    pub async fn rename_path(&self, old: &str, new: &str) -> AccessResult<PathRenameReport> {
        let (old, new) = (clean_path(old), clean_path(new));
        let roles = self.rename_scope_prefix(&old, &new).await?;
        let users = self.store().rewrite_user_base_paths(&old, &new).await?;
        for username in &users {
            self.users.invalidate(username).await;
        }
        Ok(PathRenameReport { roles, users })
    }

    /// Save a user. The admin account keeps its username and roles.
    pub async fn update_user(&self, mut user: User) -> AccessResult<User> {
        let current = self.store().load_user_by_id(user.id).await?;
        if current.username == ADMIN_USERNAME {
            if user.username != current.username {
                return Err(AccessError::ProtectedRole(
                    "cannot change the admin username".into(),
                ));
            }
            if user.role_ids != current.role_ids {
                return Err(AccessError::ProtectedRole(
                    "cannot change the admin roles".into(),
                ));
            }
        }
        user.base_path = clean_path(&user.base_path);
        for id in &user.role_ids {
            if let Err(e) = self.roles.get(*id).await {
                warn!(user = %user.username, role = %id, error = %e, "user references unknown role");
            }
        }

        let user = self.store().save_user(user).await?;
        self.users.invalidate(&current.username).await;
        if user.username != current.username {
            self.users.invalidate(&user.username).await;
        }
        info!(user = %user.username, "user updated");
        Ok(user)
    }

    /// Add a user.
    pub async fn create_user(&self, mut user: User) -> AccessResult<User> {
        user.base_path = clean_path(&user.base_path);
        let user = self.store().save_user(user).await?;
        self.users.invalidate(&user.username).await;
        Ok(user)
    }
}
