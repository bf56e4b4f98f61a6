//! One repository mounted at one virtual path.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use mosaic_types::path::join_path;

use super::source::{Asset, Release, ReleaseSource};
use crate::vfs::aggregate::{AggregatePoint, Relation};
use crate::vfs::error::VfsResult;
use crate::vfs::types::Obj;

/// Which releases a point exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseMode {
    /// Assets of the newest release, directly under the point.
    Latest,
    /// One directory per release tag.
    AllVersions,
}

/// Memoized upstream data.
#[derive(Debug, Default)]
struct Fetched {
    latest: Option<Release>,
    releases: Option<Vec<Release>>,
    extras: Option<Vec<Asset>>,
}

/// A repository point.
///
/// Upstream data is fetched on first use and reused until a refresh. The
/// state lock is held across the fetch so overlapping listings share one
/// upstream call; a cancelled fetch leaves the memo untouched.
///
/// Size and fetched state are also published to atomics whenever a fill
/// completes, so readers never wait on (or miss) an in-flight fetch.
pub struct ReleasePoint {
    point: String,
    repo: String,
    mode: ReleaseMode,
    show_extras: bool,
    source: Arc<dyn ReleaseSource>,
    fetched: Mutex<Fetched>,
    usage: AtomicU64,
    ready: AtomicBool,
}

impl std::fmt::Debug for ReleasePoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReleasePoint")
            .field("point", &self.point)
            .field("repo", &self.repo)
            .field("mode", &self.mode)
            .finish()
    }
}

impl ReleasePoint {
    pub fn new(
        point: impl Into<String>,
        repo: impl Into<String>,
        mode: ReleaseMode,
        show_extras: bool,
        source: Arc<dyn ReleaseSource>,
    ) -> Self {
        Self {
            point: point.into(),
            repo: repo.into(),
            mode,
            show_extras,
            source,
            fetched: Mutex::new(Fetched::default()),
            usage: AtomicU64::new(0),
            ready: AtomicBool::new(false),
        }
    }

    pub fn repo(&self) -> &str {
        &self.repo
    }

    pub fn mode(&self) -> ReleaseMode {
        self.mode
    }

    /// True once the data this point's mode needs has been fetched.
    pub fn is_fetched(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Bytes known to sit under this point; zero until fetched.
    ///
    /// During a refresh this keeps reporting the last completed fetch.
    pub fn usage(&self) -> u64 {
        self.usage.load(Ordering::Acquire)
    }

    /// Record the size of freshly fetched data if this point's mode
    /// sizes itself by it.
    fn publish(&self, mode: ReleaseMode, size: u64) {
        if mode == self.mode {
            self.usage.store(size, Ordering::Release);
            self.ready.store(true, Ordering::Release);
        }
    }

    async fn latest(&self, refresh: bool) -> VfsResult<Release> {
        let mut fetched = self.fetched.lock().await;
        if let (Some(release), false) = (&fetched.latest, refresh) {
            return Ok(release.clone());
        }
        debug!(repo = %self.repo, "fetching latest release");
        let release = self.source.latest_release(&self.repo).await?;
        self.publish(ReleaseMode::Latest, release.size());
        fetched.latest = Some(release.clone());
        Ok(release)
    }

    async fn releases(&self, refresh: bool) -> VfsResult<Vec<Release>> {
        let mut fetched = self.fetched.lock().await;
        if let (Some(releases), false) = (&fetched.releases, refresh) {
            return Ok(releases.clone());
        }
        debug!(repo = %self.repo, "fetching releases");
        let releases = self.source.releases(&self.repo).await?;
        self.publish(
            ReleaseMode::AllVersions,
            releases.iter().map(Release::size).sum(),
        );
        fetched.releases = Some(releases.clone());
        Ok(releases)
    }

    async fn extras(&self, refresh: bool) -> VfsResult<Vec<Asset>> {
        let mut fetched = self.fetched.lock().await;
        if let (Some(extras), false) = (&fetched.extras, refresh) {
            return Ok(extras.clone());
        }
        let extras = self.source.extra_files(&self.repo).await?;
        fetched.extras = Some(extras.clone());
        Ok(extras)
    }

    /// Entries shown when the point itself is listed.
    async fn own_entries(&self, refresh: bool) -> VfsResult<Vec<Obj>> {
        let mut objs = match self.mode {
            ReleaseMode::Latest => assets_in(&self.point, &self.latest(refresh).await?.assets),
            ReleaseMode::AllVersions => self
                .releases(refresh)
                .await?
                .iter()
                .map(|r| {
                    Obj::directory(&self.point, r.tag_name.clone(), r.size())
                        .with_times(r.created_at, r.published_at)
                })
                .collect(),
        };
        if self.show_extras {
            match self.extras(refresh).await {
                Ok(extras) => objs.extend(assets_in(&self.point, &extras)),
                Err(e) => warn!(repo = %self.repo, error = %e, "extra files unavailable, listing assets only"),
            }
        }
        Ok(objs)
    }

    /// The single directory standing in for this point in an ancestor.
    async fn ancestor_entry(&self, request: &str, child: &str, refresh: bool) -> VfsResult<Vec<Obj>> {
        let (size, newest) = match self.mode {
            ReleaseMode::Latest => {
                let latest = self.latest(refresh).await?;
                (latest.size(), latest)
            }
            ReleaseMode::AllVersions => {
                let releases = self.releases(refresh).await?;
                let Some(newest) = releases.first().cloned() else {
                    return Ok(Vec::new());
                };
                (releases.iter().map(Release::size).sum(), newest)
            }
        };
        Ok(vec![
            Obj::directory(request, child, size).with_times(newest.created_at, newest.published_at),
        ])
    }

    /// Assets of the tag named by `selector`.
    async fn tag_entries(&self, selector: &str, rest: &str, refresh: bool) -> VfsResult<Vec<Obj>> {
        if self.mode == ReleaseMode::Latest || !rest.is_empty() {
            return Ok(Vec::new());
        }
        let releases = self.releases(refresh).await?;
        let dir = join_path(&self.point, selector);
        Ok(releases
            .iter()
            .find(|r| r.tag_name == selector)
            .map(|r| assets_in(&dir, &r.assets))
            .unwrap_or_default())
    }
}

fn assets_in(dir: &str, assets: &[Asset]) -> Vec<Obj> {
    assets
        .iter()
        .map(|a| {
            Obj::file(dir, a.name.clone(), a.size)
                .with_times(a.created_at, a.updated_at)
                .with_locator(a.download_url.clone())
        })
        .collect()
}

#[async_trait]
impl AggregatePoint for ReleasePoint {
    fn point(&self) -> &str {
        &self.point
    }

    async fn contribute(
        &self,
        request: &str,
        relation: &Relation,
        refresh: bool,
    ) -> VfsResult<Vec<Obj>> {
        match relation {
            Relation::Exact => self.own_entries(refresh).await,
            Relation::Ancestor { child } => self.ancestor_entry(request, child, refresh).await,
            Relation::Descendant { selector, rest } => {
                self.tag_entries(selector, rest, refresh).await
            }
            Relation::Unrelated => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::backends::releases::source::StaticReleaseSource;
    use std::time::Duration;

    fn source() -> Arc<StaticReleaseSource> {
        Arc::new(StaticReleaseSource::new().with_releases(
            "o/x",
            vec![
                Release::new("v2").with_asset(Asset::new("b.zip", 50, "https://github.com/o/x/b.zip")),
                Release::new("v1").with_asset(Asset::new("a.zip", 100, "https://github.com/o/x/a.zip")),
            ],
        ))
    }

    #[tokio::test]
    async fn test_latest_is_memoized_until_refresh() {
        let src = source();
        let point = ReleasePoint::new("/gh/x", "o/x", ReleaseMode::Latest, false, src.clone());
        assert_eq!(point.usage(), 0);

        let objs = point.contribute("/gh/x", &Relation::Exact, false).await.unwrap();
        assert_eq!(objs.len(), 1);
        assert_eq!(objs[0].name, "b.zip");
        assert_eq!(objs[0].locator.as_deref(), Some("https://github.com/o/x/b.zip"));
        assert!(point.is_fetched());
        assert_eq!(point.usage(), 50);

        point.contribute("/gh/x", &Relation::Exact, false).await.unwrap();
        assert_eq!(src.calls(), 1);
        point.contribute("/gh/x", &Relation::Exact, true).await.unwrap();
        assert_eq!(src.calls(), 2);
    }

    #[tokio::test]
    async fn test_all_versions_views() {
        let point = ReleasePoint::new("/gh/x", "o/x", ReleaseMode::AllVersions, false, source());

        let exact = point.contribute("/gh/x", &Relation::Exact, false).await.unwrap();
        let tags: Vec<_> = exact.iter().map(|o| (o.name.as_str(), o.size)).collect();
        assert_eq!(tags, vec![("v2", 50), ("v1", 100)]);

        let ancestor = point
            .contribute("/gh", &Relation::Ancestor { child: "x".into() }, false)
            .await
            .unwrap();
        assert_eq!(ancestor[0].size, 150);
        assert!(ancestor[0].is_dir());

        let tag = point
            .contribute(
                "/gh/x/v1",
                &Relation::Descendant {
                    selector: "v1".into(),
                    rest: String::new(),
                },
                false,
            )
            .await
            .unwrap();
        assert_eq!(tag.len(), 1);
        assert_eq!(tag[0].path, "/gh/x/v1/a.zip");

        let too_deep = point
            .contribute(
                "/gh/x/v1/a.zip",
                &Relation::Descendant {
                    selector: "v1".into(),
                    rest: "a.zip".into(),
                },
                false,
            )
            .await
            .unwrap();
        assert!(too_deep.is_empty());
    }

    #[tokio::test]
    async fn test_extras_beside_assets() {
        let src = Arc::new(
            StaticReleaseSource::new()
                .with_releases("o/x", vec![Release::new("v1").with_asset(Asset::new("a", 1, "u"))])
                .with_extras("o/x", vec![Asset::new("README.md", 9, "r")]),
        );
        let point = ReleasePoint::new("/", "o/x", ReleaseMode::Latest, true, src);
        let objs = point.contribute("/", &Relation::Exact, false).await.unwrap();
        let names: Vec<_> = objs.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["a", "README.md"]);
    }

    #[tokio::test]
    async fn test_extras_failure_keeps_assets() {
        let src = Arc::new(
            StaticReleaseSource::new()
                .with_releases("o/x", vec![Release::new("v1").with_asset(Asset::new("a", 1, "u"))]),
        );
        src.set_extras_failing("o/x", true);
        let point = ReleasePoint::new("/", "o/x", ReleaseMode::Latest, true, src.clone());

        let objs = point.contribute("/", &Relation::Exact, false).await.unwrap();
        let names: Vec<_> = objs.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["a"]);

        // Not memoized: the next listing asks again.
        src.set_extras_failing("o/x", false);
        point.contribute("/", &Relation::Exact, false).await.unwrap();
        assert_eq!(src.calls(), 3);
    }

    #[tokio::test]
    async fn test_usage_stable_during_refresh() {
        let src = Arc::new(
            StaticReleaseSource::new()
                .with_delay(Duration::from_millis(300))
                .with_releases(
                    "o/x",
                    vec![
                        Release::new("v2").with_asset(Asset::new("b.zip", 50, "u")),
                        Release::new("v1").with_asset(Asset::new("a.zip", 100, "u")),
                    ],
                ),
        );
        let point = Arc::new(ReleasePoint::new(
            "/gh/x",
            "o/x",
            ReleaseMode::AllVersions,
            false,
            src.clone(),
        ));
        point.contribute("/gh/x", &Relation::Exact, false).await.unwrap();
        assert_eq!(point.usage(), 150);

        let refreshing = Arc::clone(&point);
        let refresh = tokio::spawn(async move {
            refreshing.contribute("/gh/x", &Relation::Exact, true).await
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(src.calls(), 2);
        assert_eq!(point.usage(), 150);
        assert!(point.is_fetched());

        refresh.await.unwrap().unwrap();
        assert_eq!(point.usage(), 150);
    }
}
