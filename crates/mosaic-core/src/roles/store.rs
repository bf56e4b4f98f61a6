//! Role and user persistence.

use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::info;

use mosaic_types::{Role, RoleId, User, UserId};

use super::plan::plan_base_path_rewrites;
use crate::access::{AccessError, AccessResult};

/// Backing store for roles and users.
#[async_trait]
pub trait RoleStore: Send + Sync {
    async fn load_role(&self, id: RoleId) -> AccessResult<Role>;

    async fn load_role_by_name(&self, name: &str) -> AccessResult<Role>;

    async fn list_roles(&self) -> AccessResult<Vec<Role>>;

    /// Insert or replace. A role with id `0` gets the next free id.
    async fn save_role(&self, role: Role) -> AccessResult<Role>;

    async fn delete_role(&self, id: RoleId) -> AccessResult<()>;

    async fn load_user(&self, username: &str) -> AccessResult<User>;

    async fn load_user_by_id(&self, id: UserId) -> AccessResult<User>;

    async fn list_users(&self) -> AccessResult<Vec<User>>;

    /// Insert or replace. A user with id `0` gets the next free id.
    async fn save_user(&self, user: User) -> AccessResult<User>;

    /// Move every user whose base path equals or lies under `old` onto
    /// `new`. Returns the affected usernames.
    async fn rewrite_user_base_paths(&self, old: &str, new: &str) -> AccessResult<Vec<String>>;

    /// The roles a user references; dangling ids are skipped.
    async fn load_user_roles(&self, user_id: UserId) -> AccessResult<Vec<Role>>;
}

/// In-memory store.
#[derive(Debug)]
pub struct MemoryStore {
    roles: DashMap<RoleId, Role>,
    users: DashMap<UserId, User>,
    next_role: AtomicU32,
    next_user: AtomicU32,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            roles: DashMap::new(),
            users: DashMap::new(),
            // Ids 1 and 2 are reserved for guest and admin.
            next_role: AtomicU32::new(3),
            next_user: AtomicU32::new(1),
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn bump(counter: &AtomicU32, seen: u32) {
        counter.fetch_max(seen + 1, Ordering::SeqCst);
    }
}

#[async_trait]
impl RoleStore for MemoryStore {
    async fn load_role(&self, id: RoleId) -> AccessResult<Role> {
        self.roles
            .get(&id)
            .map(|r| r.value().clone())
            .ok_or_else(|| AccessError::RoleNotFound(id.to_string()))
    }

    async fn load_role_by_name(&self, name: &str) -> AccessResult<Role> {
        self.roles
            .iter()
            .find(|r| r.name == name)
            .map(|r| r.value().clone())
            .ok_or_else(|| AccessError::RoleNotFound(name.to_string()))
    }

    async fn list_roles(&self) -> AccessResult<Vec<Role>> {
        let mut roles: Vec<Role> = self.roles.iter().map(|r| r.value().clone()).collect();
        roles.sort_by_key(|r| r.id);
        Ok(roles)
    }

    async fn save_role(&self, mut role: Role) -> AccessResult<Role> {
        if role.id.get() == 0 {
            role.id = RoleId::new(self.next_role.fetch_add(1, Ordering::SeqCst));
        } else {
            Self::bump(&self.next_role, role.id.get());
        }
        let clash = self
            .roles
            .iter()
            .any(|r| r.name == role.name && r.id != role.id);
        if clash {
            return Err(AccessError::AlreadyExists(role.name));
        }
        self.roles.insert(role.id, role.clone());
        Ok(role)
    }

    async fn delete_role(&self, id: RoleId) -> AccessResult<()> {
        self.roles
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| AccessError::RoleNotFound(id.to_string()))
    }

    async fn load_user(&self, username: &str) -> AccessResult<User> {
        self.users
            .iter()
            .find(|u| u.username == username)
            .map(|u| u.value().clone())
            .ok_or_else(|| AccessError::UserNotFound(username.to_string()))
    }

    async fn load_user_by_id(&self, id: UserId) -> AccessResult<User> {
        self.users
            .get(&id)
            .map(|u| u.value().clone())
            .ok_or_else(|| AccessError::UserNotFound(id.to_string()))
    }

    async fn list_users(&self) -> AccessResult<Vec<User>> {
        let mut users: Vec<User> = self.users.iter().map(|u| u.value().clone()).collect();
        users.sort_by_key(|u| u.id);
        Ok(users)
    }

    async fn save_user(&self, mut user: User) -> AccessResult<User> {
        if user.id.get() == 0 {
            user.id = UserId::new(self.next_user.fetch_add(1, Ordering::SeqCst));
        } else {
            Self::bump(&self.next_user, user.id.get());
        }
        let clash = self
            .users
            .iter()
            .any(|u| u.username == user.username && u.id != user.id);
        if clash {
            return Err(AccessError::AlreadyExists(user.username));
        }
        self.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn rewrite_user_base_paths(&self, old: &str, new: &str) -> AccessResult<Vec<String>> {
        let users = self.list_users().await?;
        let plan = plan_base_path_rewrites(&users, old, new);
        for rewrite in &plan {
            if let Some(mut user) = self.users.get_mut(&rewrite.user_id) {
                user.base_path = rewrite.to.clone();
            }
        }
        if !plan.is_empty() {
            info!(from = %old, to = %new, users = plan.len(), "user base paths rewritten");
        }
        Ok(plan.into_iter().map(|r| r.username).collect())
    }

    async fn load_user_roles(&self, user_id: UserId) -> AccessResult<Vec<Role>> {
        let user = self.load_user_by_id(user_id).await?;
        Ok(user
            .role_ids
            .iter()
            .filter_map(|id| self.roles.get(id).map(|r| r.value().clone()))
            .collect())
    }
}
