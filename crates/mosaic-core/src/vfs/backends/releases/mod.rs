//! Release-archive driver.
//!
//! Mounts any number of upstream repositories at virtual paths inside one
//! storage, each repository becoming a [`ReleasePoint`]. Listings go
//! through the [`MountAggregator`], so a directory can mix a repository's
//! own assets with synthesized directories for repositories mounted
//! deeper.

mod point;
mod repos;
mod source;

pub use point::{ReleaseMode, ReleasePoint};
pub use repos::{parse_repo_structure, RepoMount};
pub use source::{Asset, Release, ReleaseSource, StaticReleaseSource};

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use crate::config::ReleasesConfig;
use crate::vfs::aggregate::{AggregateOptions, MountAggregator};
use crate::vfs::error::{VfsError, VfsResult};
use crate::vfs::types::{Link, ListArgs, Obj};

/// Host prefix replaced by the configured download proxy.
pub const UPSTREAM_HOST: &str = "https://github.com";

/// Release-archive storage.
pub struct ReleasesDriver {
    config: ReleasesConfig,
    source: Arc<dyn ReleaseSource>,
    points: RwLock<Vec<Arc<ReleasePoint>>>,
}

impl std::fmt::Debug for ReleasesDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReleasesDriver")
            .field("points", &self.points.read().len())
            .field("concurrent", &self.aggregate_options().concurrent)
            .finish()
    }
}

impl ReleasesDriver {
    pub const NAME: &'static str = "releases";

    /// Build the driver and its points from `config`.
    pub fn new(config: ReleasesConfig, source: Arc<dyn ReleaseSource>) -> Self {
        let driver = Self {
            config,
            source,
            points: RwLock::new(Vec::new()),
        };
        driver.init();
        driver
    }

    /// Rebuild every point from the repository structure, dropping all
    /// memoized upstream data.
    pub fn init(&self) {
        let mode = if self.config.show_all_versions {
            ReleaseMode::AllVersions
        } else {
            ReleaseMode::Latest
        };
        let points: Vec<Arc<ReleasePoint>> = parse_repo_structure(&self.config.repo_structure)
            .into_iter()
            .map(|m| {
                Arc::new(ReleasePoint::new(
                    m.point,
                    m.repo,
                    mode,
                    self.config.show_readme,
                    Arc::clone(&self.source),
                ))
            })
            .collect();
        info!(points = points.len(), ?mode, "release points initialized");
        *self.points.write() = points;
    }

    pub fn config(&self) -> &ReleasesConfig {
        &self.config
    }

    /// Current points.
    pub fn points(&self) -> Vec<Arc<ReleasePoint>> {
        self.points.read().clone()
    }

    /// Concurrent fan-out only with an authenticated upstream.
    pub fn aggregate_options(&self) -> AggregateOptions {
        if self.config.concurrent_requests && !self.config.token.is_empty() {
            AggregateOptions::concurrent(self.config.max_concurrency)
        } else {
            AggregateOptions::default()
        }
    }

    pub async fn list(&self, path: &str, args: &ListArgs) -> VfsResult<Vec<Obj>> {
        let points = self.points();
        MountAggregator::new(self.aggregate_options())
            .list(&points, path, args)
            .await
    }

    /// Download link for a listed asset, routed through the proxy if set.
    pub fn link(&self, obj: &Obj) -> VfsResult<Link> {
        let url = obj
            .locator
            .as_deref()
            .ok_or_else(|| VfsError::not_found(obj.path.clone()))?;
        Ok(Link::new(proxied(url, &self.config.proxy)))
    }

    /// Bytes known across all fetched points.
    pub fn usage(&self) -> u64 {
        self.points.read().iter().map(|p| p.usage()).sum()
    }
}

fn proxied(url: &str, proxy: &str) -> String {
    let proxy = proxy.trim().trim_end_matches('/');
    if proxy.is_empty() {
        return url.to_string();
    }
    match url.strip_prefix(UPSTREAM_HOST) {
        Some(rest) => format!("{proxy}{rest}"),
        None => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn driver(structure: &str, all_versions: bool) -> ReleasesDriver {
        let source = StaticReleaseSource::new()
            .with_releases(
                "o/x",
                vec![
                    Release::new("v2").with_asset(Asset::new("b.zip", 50, "https://github.com/o/x/b.zip")),
                    Release::new("v1").with_asset(Asset::new("a.zip", 100, "https://github.com/o/x/a.zip")),
                ],
            )
            .with_releases("o/y", vec![Release::new("v1").with_asset(Asset::new("y.tar", 7, "u"))]);
        let config = ReleasesConfig {
            repo_structure: structure.to_string(),
            show_all_versions: all_versions,
            ..Default::default()
        };
        ReleasesDriver::new(config, Arc::new(source))
    }

    #[tokio::test]
    async fn test_root_lists_single_dir() {
        let d = driver("/gh/x:o/x", false);
        let root = d.list("/", &ListArgs::default()).await.unwrap();
        assert_eq!(root.len(), 1);
        assert_eq!(root[0].name, "gh");
        assert!(root[0].is_dir());
    }

    #[tokio::test]
    async fn test_mixed_point_and_deeper_point() {
        let d = driver("/gh:o/y\n/gh/x:o/x", false);
        let objs = d.list("/gh", &ListArgs::default()).await.unwrap();
        let mut names: Vec<_> = objs.iter().map(|o| o.name.as_str()).collect();
        names.sort();
        assert_eq!(names, vec!["x", "y.tar"]);
    }

    #[test]
    fn test_proxy_rewrite() {
        assert_eq!(
            proxied("https://github.com/o/x/a.zip", "https://mirror.example/"),
            "https://mirror.example/o/x/a.zip"
        );
        assert_eq!(proxied("https://other/a", "https://mirror"), "https://other/a");
        assert_eq!(proxied("https://github.com/a", ""), "https://github.com/a");
    }

    #[tokio::test]
    async fn test_reinit_drops_memo() {
        let d = driver("/gh/x:o/x", false);
        d.list("/gh/x", &ListArgs::default()).await.unwrap();
        assert_eq!(d.usage(), 50);
        d.init();
        assert_eq!(d.usage(), 0);
    }

    #[test]
    fn test_concurrency_needs_token() {
        let mut config = ReleasesConfig {
            concurrent_requests: true,
            ..Default::default()
        };
        let source: Arc<dyn ReleaseSource> = Arc::new(StaticReleaseSource::new());
        assert!(!ReleasesDriver::new(config.clone(), Arc::clone(&source))
            .aggregate_options()
            .concurrent);
        config.token = "t".into();
        assert!(ReleasesDriver::new(config, source).aggregate_options().concurrent);
    }
}
