//! Grant resolution.

use std::sync::Arc;

use futures::future::join_all;
use tracing::warn;

use mosaic_types::{PermSet, User};

use super::grants::Grants;
use super::meta::MetaRules;
use crate::roles::RoleCache;

/// Resolves a user's roles into [`Grants`].
#[derive(Debug, Clone)]
pub struct PermissionEngine {
    roles: Arc<RoleCache>,
}

impl PermissionEngine {
    pub fn new(roles: Arc<RoleCache>) -> Self {
        Self { roles }
    }

    /// Load every role `user` references. A role that fails to load is
    /// skipped and grants nothing.
    pub async fn grants(&self, user: &User) -> Grants {
        let loads = user.role_ids.iter().map(|id| self.roles.get(*id));
        let roles = join_all(loads)
            .await
            .into_iter()
            .zip(&user.role_ids)
            .filter_map(|(result, id)| match result {
                Ok(role) => Some(role),
                Err(e) => {
                    warn!(user = %user.username, role = %id, error = %e, "skipping role");
                    None
                }
            })
            .collect();
        Grants::new(roles)
    }

    pub async fn effective_permission(&self, user: &User, path: &str) -> PermSet {
        self.grants(user).await.effective_permission(path)
    }

    pub async fn can_read_path(&self, user: &User, path: &str) -> bool {
        self.grants(user).await.can_read_path(path)
    }

    pub async fn can_access(
        &self,
        user: &User,
        meta: Option<&MetaRules>,
        path: &str,
        password: &str,
    ) -> bool {
        self.grants(user).await.can_access(meta, path, password)
    }
}
