//! The gateway facade.
//!
//! Ties the mount registry, the metas and the role machinery together into
//! the operations a front end calls: list a directory, authorize an
//! operation, resolve a download link.
//!
//! All process-wide state (mounts, caches) lives in one [`Gateway`] value
//! that callers create, [`bootstrap`](Gateway::bootstrap) and
//! [`shutdown`](Gateway::shutdown) explicitly.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use mosaic_types::path::{base_name, join_path, parent_path};
use mosaic_types::{PathError, Role, User};

use crate::access::{AccessError, MetaTable, Operation, PermissionEngine, Protocol};
use crate::config::GatewayConfig;
use crate::roles::{PathRenameReport, RoleCache, RoleManager, RoleStore, UserCache};
use crate::vfs::backends::{Backend, ReleaseSource};
use crate::vfs::{merge_objs, Link, ListArgs, MountTable, Obj, VfsError, VfsResult};

/// Gateway error.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Vfs(#[from] VfsError),

    #[error(transparent)]
    Access(#[from] AccessError),

    /// Wrong password, hidden path or missing permission bit. Carries the
    /// request path only.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error(transparent)]
    RelativePath(#[from] PathError),
}

impl GatewayError {
    pub fn is_not_found(&self) -> bool {
        match self {
            GatewayError::Vfs(e) => {
                matches!(e, VfsError::NotFound(_) | VfsError::NoMountPoint(_))
            }
            GatewayError::Access(e) => e.is_not_found(),
            _ => false,
        }
    }

    pub fn is_permission_denied(&self) -> bool {
        matches!(
            self,
            GatewayError::PermissionDenied(_)
                | GatewayError::Access(AccessError::PermissionDenied(_))
        )
    }
}

/// Result type for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Options for one listing.
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    /// Bypass memoized upstream data; needs write access.
    pub refresh: bool,
    /// Password for a meta-guarded path.
    pub password: String,
    pub cancel: CancellationToken,
}

impl ListOptions {
    pub fn refresh(mut self) -> Self {
        self.refresh = true;
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    fn list_args(&self) -> ListArgs {
        ListArgs {
            refresh: self.refresh,
            cancel: self.cancel.clone(),
        }
    }
}

/// The storage gateway core.
#[derive(Debug)]
pub struct Gateway {
    config: GatewayConfig,
    mounts: MountTable,
    metas: MetaTable,
    roles: Arc<RoleCache>,
    users: Arc<UserCache>,
    engine: PermissionEngine,
    manager: RoleManager,
}

impl Gateway {
    /// A gateway with no mounts.
    pub fn new(config: GatewayConfig, store: Arc<dyn RoleStore>) -> Self {
        let roles = Arc::new(RoleCache::new(Arc::clone(&store), &config.cache));
        let users = Arc::new(UserCache::new(store, &config.cache));
        Self {
            engine: PermissionEngine::new(Arc::clone(&roles)),
            manager: RoleManager::new(Arc::clone(&roles), Arc::clone(&users)),
            mounts: MountTable::new(),
            metas: MetaTable::new(),
            roles,
            users,
            config,
        }
    }

    /// A gateway with the configured mounts. Release mounts fetch through
    /// `releases`.
    pub fn from_config(
        config: GatewayConfig,
        store: Arc<dyn RoleStore>,
        releases: Arc<dyn ReleaseSource>,
    ) -> Self {
        let gateway = Self::new(config, store);
        for mount in &gateway.config.mounts {
            gateway
                .mounts
                .mount(&mount.path, Backend::from_config(&mount.driver, &releases));
        }
        gateway
    }

    /// Create the default roles.
    pub async fn bootstrap(&self) -> GatewayResult<()> {
        self.manager.ensure_default_roles().await?;
        Ok(())
    }

    /// Drop every mount and cached role or user.
    pub fn shutdown(&self) {
        self.mounts.clear();
        self.roles.invalidate_all();
        self.users.invalidate_all();
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn mounts(&self) -> &MountTable {
        &self.mounts
    }

    pub fn metas(&self) -> &MetaTable {
        &self.metas
    }

    pub fn manager(&self) -> &RoleManager {
        &self.manager
    }

    pub fn engine(&self) -> &PermissionEngine {
        &self.engine
    }

    pub async fn user(&self, username: &str) -> GatewayResult<Arc<User>> {
        Ok(self.users.get(username).await?)
    }

    pub async fn user_roles(&self, username: &str) -> GatewayResult<Vec<Role>> {
        let user = self.user(username).await?;
        Ok(self.roles.store().load_user_roles(user.id).await?)
    }

    /// List `path` (relative to the user's base path).
    ///
    /// Entries from the owning backend are merged with directories implied
    /// by deeper mounts, then filtered by the hide rules in force.
    pub async fn list(&self, user: &User, path: &str, options: &ListOptions) -> GatewayResult<Vec<Obj>> {
        let path = user.join_path(path)?;
        let grants = self.engine.grants(user).await;
        let meta = self.metas.nearest(&path);
        let meta = meta.as_deref();

        if !grants.can_access(meta, &path, &options.password) {
            return Err(GatewayError::PermissionDenied(path));
        }
        if options.refresh && !grants.authorize(meta, &path, Protocol::Http, Operation::Refresh) {
            return Err(GatewayError::PermissionDenied(path));
        }

        let snapshot = self.mounts.snapshot();
        let virtual_dirs = snapshot.virtual_children(&path);
        let real = match snapshot.resolve(&path) {
            Some(resolved) => {
                let backend = resolved.mount.backend();
                match backend.list(&resolved.local_path, &options.list_args()).await {
                    Ok(objs) => objs,
                    Err(VfsError::Cancelled) => return Err(VfsError::Cancelled.into()),
                    Err(e) if !virtual_dirs.is_empty() => {
                        if e.is_not_found() {
                            debug!(path = %path, "no backend directory, virtual entries only");
                        } else {
                            warn!(path = %path, mount = %resolved.mount.path(), error = %e, "backend listing failed, showing virtual entries");
                        }
                        Vec::new()
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            None if virtual_dirs.is_empty() => return Err(VfsError::not_found(path).into()),
            None => Vec::new(),
        };

        let mut objs = merge_objs(real, virtual_dirs);
        for obj in &mut objs {
            obj.path = join_path(&path, &obj.name);
        }
        Ok(grants.filter_visible(meta, &path, objs))
    }

    /// Decide whether `user` may perform `op` at `path`.
    pub async fn authorize(
        &self,
        user: &User,
        path: &str,
        protocol: Protocol,
        op: Operation,
    ) -> GatewayResult<bool> {
        let path = user.join_path(path)?;
        let grants = self.engine.grants(user).await;
        let meta = self.metas.nearest(&path);
        Ok(grants.authorize(meta.as_deref(), &path, protocol, op))
    }

    /// Download link for the file at `path`.
    pub async fn resolve_link(&self, user: &User, path: &str, password: &str) -> GatewayResult<Link> {
        let path = user.join_path(path)?;
        let grants = self.engine.grants(user).await;
        let meta = self.metas.nearest(&path);
        if !grants.can_access(meta.as_deref(), &path, password) {
            return Err(GatewayError::PermissionDenied(path));
        }

        let resolved = self
            .mounts
            .snapshot()
            .resolve(&path)
            .ok_or_else(|| VfsError::not_found(path.clone()))?;
        if resolved.local_path == "/" {
            return Err(VfsError::invalid_path(path).into());
        }

        let backend = resolved.mount.backend();
        let name = base_name(&resolved.local_path);
        let obj = backend
            .list(&parent_path(&resolved.local_path), &ListArgs::default())
            .await?
            .into_iter()
            .find(|obj| obj.name == name && !obj.is_dir())
            .ok_or_else(|| VfsError::not_found(path.clone()))?;
        Ok(backend.link(&obj).await?)
    }

    /// Move a mount; role scopes and user base paths follow it.
    pub async fn rename_mount(&self, old: &str, new: &str) -> GatewayResult<PathRenameReport> {
        self.mounts.rename_mount(old, new)?;
        Ok(self.manager.rename_path(old, new).await?)
    }

    /// List every mount root, at most `listing.max_concurrency` at once.
    ///
    /// Primes upstream memos so virtual directory sizes are populated.
    pub async fn warm_mounts(&self) -> Vec<(String, VfsResult<usize>)> {
        let mounts: Vec<_> = self.mounts.snapshot().mounts().cloned().collect();
        let args = ListArgs::default();
        stream::iter(mounts)
            .map(|mount| {
                let args = args.clone();
                async move {
                    let result = mount.backend().list("/", &args).await.map(|objs| objs.len());
                    (mount.path().to_string(), result)
                }
            })
            .buffer_unordered(self.config.listing.max_concurrency.max(1))
            .collect()
            .await
    }
}
