//! Mount registry with longest-prefix routing.
//!
//! The registry is read-mostly: every lookup works on an immutable
//! [`MountSnapshot`], and mutations swap in a fresh map. A listing that
//! started before a mount change keeps seeing the table it started with.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::RwLock;
use tracing::info;

use mosaic_types::path::{clean_path, is_strict_sub_path, next_segment, parent_path};

use super::backends::Backend;
use super::error::{VfsError, VfsResult};
use super::merge::ObjMerge;
use super::types::Obj;

/// A backend bound to a virtual path.
#[derive(Debug)]
pub struct Mount {
    path: String,
    backend: Arc<Backend>,
    created: SystemTime,
    modified: SystemTime,
}

impl Mount {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn backend(&self) -> &Arc<Backend> {
        &self.backend
    }
}

/// Information about a mount point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountInfo {
    /// The mount path (e.g., "/gh").
    pub path: String,
    /// Driver serving it.
    pub driver: &'static str,
}

/// A resolved request path.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub mount: Arc<Mount>,
    /// Path with the mount prefix stripped; `/` for the mount root.
    pub local_path: String,
}

/// Routes request paths to mounted backends.
///
/// Mount points are matched by longest prefix. If `/mnt` and
/// `/mnt/project` are both mounted, `/mnt/project/src` routes to
/// `/mnt/project`.
#[derive(Default)]
pub struct MountTable {
    /// Mount points, keyed by clean path.
    mounts: RwLock<Arc<BTreeMap<String, Arc<Mount>>>>,
}

impl std::fmt::Debug for MountTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MountTable")
            .field("mounts", &self.mounts.read().len())
            .finish()
    }
}

impl MountTable {
    /// Create a new empty mount table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mount a backend at the given path.
    ///
    /// If something is already mounted there, it is replaced.
    pub fn mount(&self, path: &str, backend: Backend) -> Arc<Backend> {
        let backend = Arc::new(backend);
        self.mount_arc(path, Arc::clone(&backend));
        backend
    }

    /// Mount a backend (already wrapped in Arc) at the given path.
    pub fn mount_arc(&self, path: &str, backend: Arc<Backend>) {
        let path = clean_path(path);
        let now = SystemTime::now();
        info!(path = %path, driver = backend.driver_name(), "mounting");
        let mount = Arc::new(Mount {
            path: path.clone(),
            backend,
            created: now,
            modified: now,
        });
        self.update(|mounts| {
            mounts.insert(path, mount);
        });
    }

    /// Unmount the backend at the given path.
    ///
    /// Returns `true` if a mount was removed.
    pub fn unmount(&self, path: &str) -> bool {
        let path = clean_path(path);
        let mut removed = false;
        self.update(|mounts| removed = mounts.remove(&path).is_some());
        if removed {
            info!(path = %path, "unmounted");
        }
        removed
    }

    /// Move a mount to a new path, keeping its backend.
    pub fn rename_mount(&self, old: &str, new: &str) -> VfsResult<()> {
        let old = clean_path(old);
        let new = clean_path(new);
        let mut result = Ok(());
        self.update(|mounts| {
            if mounts.contains_key(&new) {
                result = Err(VfsError::already_exists(new.clone()));
                return;
            }
            let Some(mount) = mounts.remove(&old) else {
                result = Err(VfsError::no_mount_point(old.clone()));
                return;
            };
            mounts.insert(
                new.clone(),
                Arc::new(Mount {
                    path: new.clone(),
                    backend: Arc::clone(&mount.backend),
                    created: mount.created,
                    modified: SystemTime::now(),
                }),
            );
        });
        if result.is_ok() {
            info!(from = %old, to = %new, "mount renamed");
        }
        result
    }

    /// Drop every mount.
    pub fn clear(&self) {
        *self.mounts.write() = Arc::new(BTreeMap::new());
    }

    /// List all current mounts.
    pub fn list_mounts(&self) -> Vec<MountInfo> {
        self.snapshot()
            .mounts
            .values()
            .map(|m| MountInfo {
                path: m.path.clone(),
                driver: m.backend.driver_name(),
            })
            .collect()
    }

    /// An immutable view for one request.
    pub fn snapshot(&self) -> MountSnapshot {
        MountSnapshot {
            mounts: Arc::clone(&self.mounts.read()),
        }
    }

    fn update(&self, f: impl FnOnce(&mut BTreeMap<String, Arc<Mount>>)) {
        let mut guard = self.mounts.write();
        let mut next = BTreeMap::clone(&guard);
        f(&mut next);
        *guard = Arc::new(next);
    }
}

/// The mount table as of one moment.
#[derive(Debug, Clone)]
pub struct MountSnapshot {
    mounts: Arc<BTreeMap<String, Arc<Mount>>>,
}

impl MountSnapshot {
    pub fn len(&self) -> usize {
        self.mounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mounts.is_empty()
    }

    pub fn mounts(&self) -> impl Iterator<Item = &Arc<Mount>> {
        self.mounts.values()
    }

    /// Find the most specific mount at or above `path`.
    pub fn resolve(&self, path: &str) -> Option<Resolved> {
        let path = clean_path(path);
        // Walk up from the path itself; the first hit is the longest prefix.
        let mut candidate = path.clone();
        loop {
            if let Some(mount) = self.mounts.get(&candidate) {
                let local_path = if candidate == "/" {
                    path
                } else {
                    clean_path(&path[candidate.len()..])
                };
                return Some(Resolved {
                    mount: Arc::clone(mount),
                    local_path,
                });
            }
            if candidate == "/" {
                return None;
            }
            candidate = parent_path(&candidate);
        }
    }

    /// Directories implied under `path` by deeper mounts.
    ///
    /// Mounts sharing the next segment fold into one directory whose size
    /// is the sum of their usage.
    pub fn virtual_children(&self, path: &str) -> Vec<Obj> {
        let path = clean_path(path);
        let mut merge = ObjMerge::new();
        for mount in self.mounts.values() {
            if !is_strict_sub_path(&path, &mount.path) {
                continue;
            }
            let Some(segment) = next_segment(&mount.path, &path) else {
                continue;
            };
            merge.push(
                Obj::directory(&path, segment, mount.backend.usage())
                    .with_times(mount.created, mount.modified),
            );
        }
        merge.into_vec()
    }

    /// True if `path` is a mount or lies above one.
    pub fn is_virtual_dir(&self, path: &str) -> bool {
        let path = clean_path(path);
        self.mounts.contains_key(&path)
            || self.mounts.keys().any(|m| is_strict_sub_path(&path, m))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::backends::MemoryBackend;

    fn memory(files: &[(&str, u64)]) -> Backend {
        let fs = MemoryBackend::new();
        for (path, size) in files {
            fs.add_file(path, *size, None).unwrap();
        }
        Backend::Memory(fs)
    }

    #[test]
    fn test_longest_prefix() {
        let table = MountTable::new();
        table.mount("/", memory(&[]));
        table.mount("/mnt", memory(&[]));
        table.mount("/mnt/project", memory(&[]));
        let snap = table.snapshot();

        let r = snap.resolve("/mnt/project/src").unwrap();
        assert_eq!(r.mount.path(), "/mnt/project");
        assert_eq!(r.local_path, "/src");

        let r = snap.resolve("/mnt/projectx").unwrap();
        assert_eq!(r.mount.path(), "/mnt");
        assert_eq!(r.local_path, "/projectx");

        let r = snap.resolve("/mnt").unwrap();
        assert_eq!(r.local_path, "/");

        let r = snap.resolve("/etc").unwrap();
        assert_eq!(r.mount.path(), "/");
        assert_eq!(r.local_path, "/etc");
    }

    #[test]
    fn test_unrelated_mount_keeps_resolution() {
        let table = MountTable::new();
        table.mount("/data", memory(&[]));
        let before = table.snapshot().resolve("/data/x").unwrap();
        table.mount("/other/deep", memory(&[]));
        let after = table.snapshot().resolve("/data/x").unwrap();
        assert_eq!(before.mount.path(), after.mount.path());
        assert_eq!(before.local_path, after.local_path);
        assert!(table.snapshot().resolve("/nothing").is_none());
    }

    #[test]
    fn test_virtual_children_fold() {
        let table = MountTable::new();
        table.mount("/repo/a/v1", memory(&[("/f", 100)]));
        table.mount("/repo/a/v2", memory(&[("/g", 50)]));
        table.mount("/repo/b", memory(&[]));
        table.mount("/else", memory(&[]));

        let snap = table.snapshot();
        let children = snap.virtual_children("/repo");
        assert_eq!(children.len(), 2);
        let a = children.iter().find(|o| o.name == "a").unwrap();
        assert_eq!(a.size, 150);
        assert_eq!(a.path, "/repo/a");

        let root: Vec<_> = snap
            .virtual_children("/")
            .into_iter()
            .map(|o| o.name)
            .collect();
        assert_eq!(root, vec!["else", "repo"]);
        assert!(snap.virtual_children("/repo/b").is_empty());
        assert!(snap.is_virtual_dir("/repo/a"));
    }

    #[test]
    fn test_snapshot_isolated_from_updates() {
        let table = MountTable::new();
        table.mount("/a", memory(&[]));
        let snap = table.snapshot();
        table.unmount("/a");
        assert!(snap.resolve("/a").is_some());
        assert!(table.snapshot().resolve("/a").is_none());
    }

    #[test]
    fn test_rename_mount() {
        let table = MountTable::new();
        table.mount("/old/", memory(&[]));
        table.rename_mount("/old", "/new").unwrap();
        let paths: Vec<_> = table.list_mounts().into_iter().map(|m| m.path).collect();
        assert_eq!(paths, vec!["/new"]);
        assert!(table.rename_mount("/old", "/x").is_err());
    }
}
