//! Storage backends.
//!
//! The set of drivers is closed, so dispatch is a plain enum match.

pub mod memory;
pub mod releases;

use std::sync::Arc;

pub use memory::MemoryBackend;
pub use releases::{ReleaseSource, ReleasesDriver};

use crate::config::DriverConfig;
use crate::vfs::error::{VfsError, VfsResult};
use crate::vfs::types::{Link, ListArgs, Obj};

/// A mounted storage.
#[derive(Debug)]
pub enum Backend {
    Memory(MemoryBackend),
    Releases(ReleasesDriver),
}

impl Backend {
    /// Build a backend from its configuration.
    pub fn from_config(config: &DriverConfig, releases: &Arc<dyn ReleaseSource>) -> Self {
        match config {
            DriverConfig::Memory => Backend::Memory(MemoryBackend::new()),
            DriverConfig::Releases(c) => {
                Backend::Releases(ReleasesDriver::new(c.clone(), Arc::clone(releases)))
            }
        }
    }

    pub fn driver_name(&self) -> &'static str {
        match self {
            Backend::Memory(_) => MemoryBackend::NAME,
            Backend::Releases(_) => ReleasesDriver::NAME,
        }
    }

    /// List a directory in backend-local coordinates.
    pub async fn list(&self, path: &str, args: &ListArgs) -> VfsResult<Vec<Obj>> {
        if args.cancel.is_cancelled() {
            return Err(VfsError::Cancelled);
        }
        match self {
            Backend::Memory(b) => b.list(path),
            Backend::Releases(b) => b.list(path, args).await,
        }
    }

    pub async fn link(&self, obj: &Obj) -> VfsResult<Link> {
        match self {
            Backend::Memory(b) => b.link(obj),
            Backend::Releases(b) => b.link(obj),
        }
    }

    pub async fn make_dir(&self, parent: &str, name: &str) -> VfsResult<Obj> {
        match self {
            Backend::Memory(b) => b.make_dir(parent, name),
            Backend::Releases(_) => Err(VfsError::unsupported(ReleasesDriver::NAME, "make_dir")),
        }
    }

    pub async fn remove(&self, path: &str) -> VfsResult<()> {
        match self {
            Backend::Memory(b) => b.remove(path),
            Backend::Releases(_) => Err(VfsError::unsupported(ReleasesDriver::NAME, "remove")),
        }
    }

    pub async fn rename(&self, path: &str, new_name: &str) -> VfsResult<Obj> {
        match self {
            Backend::Memory(b) => b.rename(path, new_name),
            Backend::Releases(_) => Err(VfsError::unsupported(ReleasesDriver::NAME, "rename")),
        }
    }

    /// Bytes currently known to be stored.
    pub fn usage(&self) -> u64 {
        match self {
            Backend::Memory(b) => b.usage(),
            Backend::Releases(b) => b.usage(),
        }
    }
}
