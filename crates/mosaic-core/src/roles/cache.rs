//! Expiring role and user caches.
//!
//! Both sit in front of a [`RoleStore`]. Concurrent misses on one key
//! share a single store load; failed loads are not cached, so the next
//! caller retries.

use std::sync::Arc;

use moka::future::Cache;
use tracing::debug;

use mosaic_types::{Role, RoleId, User};

use super::store::RoleStore;
use crate::access::{AccessError, AccessResult};
use crate::config::CacheConfig;

/// Roles are addressable by id and by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RoleKey {
    Id(RoleId),
    Name(String),
}

impl RoleKey {
    /// Both keys of `role`.
    pub fn both(role: &Role) -> [RoleKey; 2] {
        [RoleKey::Id(role.id), RoleKey::Name(role.name.clone())]
    }
}

/// Cached role lookups.
pub struct RoleCache {
    store: Arc<dyn RoleStore>,
    roles: Cache<RoleKey, Arc<Role>>,
}

impl std::fmt::Debug for RoleCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoleCache")
            .field("entries", &self.roles.entry_count())
            .finish()
    }
}

impl RoleCache {
    pub fn new(store: Arc<dyn RoleStore>, config: &CacheConfig) -> Self {
        Self {
            store,
            roles: Cache::builder()
                .max_capacity(config.max_capacity)
                .time_to_live(config.role_ttl())
                .build(),
        }
    }

    pub fn store(&self) -> &Arc<dyn RoleStore> {
        &self.store
    }

    /// Role by id.
    pub async fn get(&self, id: RoleId) -> AccessResult<Arc<Role>> {
        self.load(RoleKey::Id(id)).await
    }

    /// Role by name.
    pub async fn get_by_name(&self, name: &str) -> AccessResult<Arc<Role>> {
        self.load(RoleKey::Name(name.to_string())).await
    }

    async fn load(&self, key: RoleKey) -> AccessResult<Arc<Role>> {
        let store = Arc::clone(&self.store);
        let init_key = key.clone();
        self.roles
            .try_get_with(key, async move {
                debug!(key = ?init_key, "loading role");
                let role = match init_key {
                    RoleKey::Id(id) => store.load_role(id).await?,
                    RoleKey::Name(name) => store.load_role_by_name(&name).await?,
                };
                Ok::<_, AccessError>(Arc::new(role))
            })
            .await
            .map_err(|e| AccessError::clone(&e))
    }

    /// Drop one cached key.
    pub async fn invalidate(&self, key: &RoleKey) {
        self.roles.invalidate(key).await;
    }

    /// Drop both keys of `role`.
    pub async fn invalidate_role(&self, role: &Role) {
        for key in RoleKey::both(role) {
            self.roles.invalidate(&key).await;
        }
    }

    pub fn invalidate_all(&self) {
        self.roles.invalidate_all();
    }

    /// True if `key` is cached right now.
    pub fn contains(&self, key: &RoleKey) -> bool {
        self.roles.contains_key(key)
    }
}

/// Cached user lookups by username.
pub struct UserCache {
    store: Arc<dyn RoleStore>,
    users: Cache<String, Arc<User>>,
}

impl std::fmt::Debug for UserCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserCache")
            .field("entries", &self.users.entry_count())
            .finish()
    }
}

impl UserCache {
    pub fn new(store: Arc<dyn RoleStore>, config: &CacheConfig) -> Self {
        Self {
            store,
            users: Cache::builder()
                .max_capacity(config.max_capacity)
                .time_to_live(config.user_ttl())
                .build(),
        }
    }

    pub async fn get(&self, username: &str) -> AccessResult<Arc<User>> {
        let store = Arc::clone(&self.store);
        let name = username.to_string();
        self.users
            .try_get_with(username.to_string(), async move {
                debug!(username = %name, "loading user");
                store.load_user(&name).await.map(Arc::new)
            })
            .await
            .map_err(|e| AccessError::clone(&e))
    }

    pub async fn invalidate(&self, username: &str) {
        self.users.invalidate(username).await;
    }

    pub fn invalidate_all(&self) {
        self.users.invalidate_all();
    }

    pub fn contains(&self, username: &str) -> bool {
        self.users.contains_key(username)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roles::store::MemoryStore;
    use async_trait::async_trait;
    use mosaic_types::UserId;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Counts role loads and makes each one slow.
    struct SlowStore {
        inner: MemoryStore,
        loads: AtomicUsize,
    }

    #[async_trait]
    impl RoleStore for SlowStore {
        async fn load_role(&self, id: RoleId) -> AccessResult<Role> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            self.inner.load_role(id).await
        }
        async fn load_role_by_name(&self, name: &str) -> AccessResult<Role> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            self.inner.load_role_by_name(name).await
        }
        async fn list_roles(&self) -> AccessResult<Vec<Role>> {
            self.inner.list_roles().await
        }
        async fn save_role(&self, role: Role) -> AccessResult<Role> {
            self.inner.save_role(role).await
        }
        async fn delete_role(&self, id: RoleId) -> AccessResult<()> {
            self.inner.delete_role(id).await
        }
        async fn load_user(&self, username: &str) -> AccessResult<User> {
            self.inner.load_user(username).await
        }
        async fn load_user_by_id(&self, id: UserId) -> AccessResult<User> {
            self.inner.load_user_by_id(id).await
        }
        async fn list_users(&self) -> AccessResult<Vec<User>> {
            self.inner.list_users().await
        }
        async fn save_user(&self, user: User) -> AccessResult<User> {
            self.inner.save_user(user).await
        }
        async fn rewrite_user_base_paths(&self, old: &str, new: &str) -> AccessResult<Vec<String>> {
            self.inner.rewrite_user_base_paths(old, new).await
        }
        async fn load_user_roles(&self, user_id: UserId) -> AccessResult<Vec<Role>> {
            self.inner.load_user_roles(user_id).await
        }
    }

    async fn slow_store() -> Arc<SlowStore> {
        let inner = MemoryStore::new();
        inner.save_role(Role::admin()).await.unwrap();
        Arc::new(SlowStore {
            inner,
            loads: AtomicUsize::new(0),
        })
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_misses_load_once() {
        let store = slow_store().await;
        let cache = Arc::new(RoleCache::new(store.clone(), &CacheConfig::default()));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move { cache.get(RoleId::ADMIN).await })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap().name, "admin");
        }
        assert_eq!(store.loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failures_not_cached() {
        let store = slow_store().await;
        let cache = RoleCache::new(store.clone(), &CacheConfig::default());

        assert!(cache.get(RoleId::new(9)).await.unwrap_err().is_not_found());
        assert!(cache.get(RoleId::new(9)).await.is_err());
        assert_eq!(store.loads.load(Ordering::SeqCst), 2);
        assert!(!cache.contains(&RoleKey::Id(RoleId::new(9))));
    }

    #[tokio::test]
    async fn test_invalidate_by_id_and_name() {
        let store = slow_store().await;
        let cache = RoleCache::new(store.clone(), &CacheConfig::default());
        let admin = cache.get(RoleId::ADMIN).await.unwrap();
        cache.get_by_name("admin").await.unwrap();
        assert_eq!(store.loads.load(Ordering::SeqCst), 2);

        cache.invalidate_role(&admin).await;
        assert!(!cache.contains(&RoleKey::Id(RoleId::ADMIN)));
        assert!(!cache.contains(&RoleKey::Name("admin".into())));

        cache.get(RoleId::ADMIN).await.unwrap();
        assert_eq!(store.loads.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_user_cache() {
        let store = Arc::new(MemoryStore::new());
        store.save_user(User::new(UserId::new(0), "bob")).await.unwrap();
        let cache = UserCache::new(store.clone(), &CacheConfig::default());

        assert_eq!(cache.get("bob").await.unwrap().username, "bob");
        assert!(cache.contains("bob"));
        cache.invalidate("bob").await;
        assert!(!cache.contains("bob"));
        assert!(cache.get("nobody").await.unwrap_err().is_not_found());
    }
}
