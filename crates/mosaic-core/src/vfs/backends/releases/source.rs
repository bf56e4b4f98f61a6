//! Upstream release data.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::vfs::error::{VfsError, VfsResult};

/// A downloadable file attached to a release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub name: String,
    pub size: u64,
    pub download_url: String,
    pub created_at: SystemTime,
    pub updated_at: SystemTime,
}

impl Asset {
    pub fn new(name: impl Into<String>, size: u64, download_url: impl Into<String>) -> Self {
        let now = SystemTime::now();
        Self {
            name: name.into(),
            size,
            download_url: download_url.into(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// One tagged release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    pub tag_name: String,
    pub name: String,
    pub created_at: SystemTime,
    pub published_at: SystemTime,
    #[serde(default)]
    pub assets: Vec<Asset>,
}

impl Release {
    pub fn new(tag_name: impl Into<String>) -> Self {
        let tag_name = tag_name.into();
        let now = SystemTime::now();
        Self {
            name: tag_name.clone(),
            tag_name,
            created_at: now,
            published_at: now,
            assets: Vec::new(),
        }
    }

    /// Attach an asset.
    pub fn with_asset(mut self, asset: Asset) -> Self {
        self.assets.push(asset);
        self
    }

    /// Sum of asset sizes.
    pub fn size(&self) -> u64 {
        self.assets.iter().map(|a| a.size).sum()
    }
}

/// Where release data comes from.
#[async_trait]
pub trait ReleaseSource: Send + Sync {
    /// The newest release of `repo` (`owner/name`).
    async fn latest_release(&self, repo: &str) -> VfsResult<Release>;

    /// Every release of `repo`, newest first.
    async fn releases(&self, repo: &str) -> VfsResult<Vec<Release>>;

    /// Repository-level files shown beside the latest assets (readme,
    /// license).
    async fn extra_files(&self, repo: &str) -> VfsResult<Vec<Asset>>;
}

/// Release data held in memory.
///
/// Backs tests and offline mounts. Repos can be flagged as failing and a
/// fixed delay can be added to every call.
#[derive(Debug, Default)]
pub struct StaticReleaseSource {
    releases: DashMap<String, Vec<Release>>,
    extras: DashMap<String, Vec<Asset>>,
    failing: RwLock<HashSet<String>>,
    extras_failing: RwLock<HashSet<String>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl StaticReleaseSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call by `delay`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Register releases for `repo`, newest first.
    pub fn with_releases(self, repo: &str, releases: Vec<Release>) -> Self {
        self.releases.insert(repo.to_string(), releases);
        self
    }

    /// Register extra files for `repo`.
    pub fn with_extras(self, repo: &str, extras: Vec<Asset>) -> Self {
        self.extras.insert(repo.to_string(), extras);
        self
    }

    /// Replace the releases of `repo`.
    pub fn set_releases(&self, repo: &str, releases: Vec<Release>) {
        self.releases.insert(repo.to_string(), releases);
    }

    /// Make every call for `repo` fail (or succeed again).
    pub fn set_failing(&self, repo: &str, failing: bool) {
        let mut set = self.failing.write();
        if failing {
            set.insert(repo.to_string());
        } else {
            set.remove(repo);
        }
    }

    /// Make only the extra-file lookups of `repo` fail.
    pub fn set_extras_failing(&self, repo: &str, failing: bool) {
        let mut set = self.extras_failing.write();
        if failing {
            set.insert(repo.to_string());
        } else {
            set.remove(repo);
        }
    }

    /// Number of upstream calls served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn enter(&self, repo: &str) -> VfsResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.read().contains(repo) {
            return Err(VfsError::unavailable(format!("{repo}: upstream error")));
        }
        Ok(())
    }
}

#[async_trait]
impl ReleaseSource for StaticReleaseSource {
    async fn latest_release(&self, repo: &str) -> VfsResult<Release> {
        self.enter(repo).await?;
        self.releases
            .get(repo)
            .and_then(|r| r.first().cloned())
            .ok_or_else(|| VfsError::not_found(repo))
    }

    async fn releases(&self, repo: &str) -> VfsResult<Vec<Release>> {
        self.enter(repo).await?;
        self.releases
            .get(repo)
            .map(|r| r.value().clone())
            .ok_or_else(|| VfsError::not_found(repo))
    }

    async fn extra_files(&self, repo: &str) -> VfsResult<Vec<Asset>> {
        self.enter(repo).await?;
        if self.extras_failing.read().contains(repo) {
            return Err(VfsError::unavailable(format!("{repo}: extra files unavailable")));
        }
        Ok(self.extras.get(repo).map(|e| e.value().clone()).unwrap_or_default())
    }
}
