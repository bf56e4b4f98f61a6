//! Multi-mount aggregation inside one driver.
//!
//! Some drivers own several independent sub-trees ("points"), each backed
//! by its own upstream. A listing classifies the request path against
//! every point, asks each related point for its contribution, and folds
//! the results through [`ObjMerge`].
//!
//! ```text
//!                 request: /gh
//!   ┌────────────────┬──────────────────┬────────────────┐
//!   ▼                ▼                  ▼                ▼
//! /gh (Exact)    /gh/x (Ancestor)   /a (Unrelated)   (fetched concurrently
//! own entries    dir "x"            never fetched     when enabled)
//!   └────────────────┴─────────┬────────┘
//!                              ▼
//!                  ObjMerge (one lock, append only)
//! ```
//!
//! A failing point contributes nothing and is logged; the listing only
//! fails when no related point answered at all.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use mosaic_types::path::{clean_path, next_segment, path_equal, split_selector};

use super::error::{VfsError, VfsResult};
use super::merge::ObjMerge;
use super::types::{ListArgs, Obj};

/// How a point relates to a request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Relation {
    /// The request names the point itself.
    Exact,
    /// The request is a strict ancestor; `child` is the next segment
    /// toward the point.
    Ancestor { child: String },
    /// The request is under the point; `selector` is the first segment
    /// below it and `rest` whatever follows.
    Descendant { selector: String, rest: String },
    /// Nothing in common.
    Unrelated,
}

impl Relation {
    /// Classify `point` against `request`.
    pub fn classify(point: &str, request: &str) -> Self {
        if path_equal(point, request) {
            return Relation::Exact;
        }
        if let Some(child) = next_segment(point, request) {
            return Relation::Ancestor { child };
        }
        if let Some((selector, rest)) = split_selector(request, point) {
            return Relation::Descendant { selector, rest };
        }
        Relation::Unrelated
    }
}

/// One independently fetchable sub-tree.
#[async_trait]
pub trait AggregatePoint: Send + Sync + 'static {
    /// Clean virtual path of the point, relative to the driver.
    fn point(&self) -> &str;

    /// Entries this point contributes to a listing of `request`.
    ///
    /// Never called for [`Relation::Unrelated`].
    async fn contribute(
        &self,
        request: &str,
        relation: &Relation,
        refresh: bool,
    ) -> VfsResult<Vec<Obj>>;
}

/// Aggregation options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregateOptions {
    /// Fan out one task per related point.
    pub concurrent: bool,
    /// Upper bound on in-flight tasks when concurrent.
    pub max_concurrency: usize,
}

impl Default for AggregateOptions {
    fn default() -> Self {
        Self {
            concurrent: false,
            max_concurrency: 8,
        }
    }
}

impl AggregateOptions {
    /// Concurrent fan-out with at most `max` in-flight tasks.
    pub fn concurrent(max: usize) -> Self {
        Self {
            concurrent: true,
            max_concurrency: max.max(1),
        }
    }
}

/// What the points produced, shared by the workers.
#[derive(Debug, Default)]
struct Accumulator {
    merge: ObjMerge,
    /// Points that answered, even with nothing to show.
    succeeded: usize,
    failures: Vec<String>,
}

impl Accumulator {
    fn record(&mut self, point: &str, result: VfsResult<Vec<Obj>>) {
        match result {
            Ok(objs) => {
                self.succeeded += 1;
                self.merge.extend(objs);
            }
            Err(VfsError::Cancelled) => debug!(point, "mount point fetch cancelled"),
            Err(e) => {
                warn!(point, error = %e, "mount point fetch failed, skipping");
                self.failures.push(format!("{point}: {e}"));
            }
        }
    }
}

/// Classifies, fans out and folds.
#[derive(Debug, Clone, Default)]
pub struct MountAggregator {
    options: AggregateOptions,
}

impl MountAggregator {
    pub fn new(options: AggregateOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> AggregateOptions {
        self.options
    }

    /// List `request` across `points`.
    pub async fn list<P: AggregatePoint>(
        &self,
        points: &[Arc<P>],
        request: &str,
        args: &ListArgs,
    ) -> VfsResult<Vec<Obj>> {
        let request = clean_path(request);
        let related: Vec<(Arc<P>, Relation)> = points
            .iter()
            .filter_map(|p| match Relation::classify(p.point(), &request) {
                Relation::Unrelated => None,
                relation => Some((Arc::clone(p), relation)),
            })
            .collect();

        let acc = if self.options.concurrent && related.len() > 1 {
            self.fan_out(related, &request, args).await
        } else {
            Self::sequential(related, &request, args).await
        };

        if args.cancel.is_cancelled() {
            return Err(VfsError::Cancelled);
        }
        if acc.succeeded == 0 && !acc.failures.is_empty() {
            return Err(VfsError::unavailable(acc.failures.join("; ")));
        }
        Ok(acc.merge.into_vec())
    }

    async fn sequential<P: AggregatePoint>(
        related: Vec<(Arc<P>, Relation)>,
        request: &str,
        args: &ListArgs,
    ) -> Accumulator {
        let mut acc = Accumulator::default();
        for (point, relation) in related {
            if args.cancel.is_cancelled() {
                break;
            }
            let result = contribute_or_cancel(point.as_ref(), request, &relation, args).await;
            acc.record(point.point(), result);
        }
        acc
    }

    async fn fan_out<P: AggregatePoint>(
        &self,
        related: Vec<(Arc<P>, Relation)>,
        request: &str,
        args: &ListArgs,
    ) -> Accumulator {
        let acc = Arc::new(Mutex::new(Accumulator::default()));
        let permits = Arc::new(Semaphore::new(self.options.max_concurrency.max(1)));
        let mut tasks = JoinSet::new();

        for (point, relation) in related {
            let acc = Arc::clone(&acc);
            let permits = Arc::clone(&permits);
            let request = request.to_string();
            let args = args.clone();
            tasks.spawn(async move {
                let Ok(_permit) = permits.acquire_owned().await else {
                    return;
                };
                // Fetch outside the lock; only the append is serialized.
                let result =
                    contribute_or_cancel(point.as_ref(), &request, &relation, &args).await;
                acc.lock().record(point.point(), result);
            });
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "aggregation task aborted");
                acc.lock().failures.push(e.to_string());
            }
        }

        std::mem::take(&mut *acc.lock())
    }
}

/// Run one contribution, abandoning it if the caller cancels first.
async fn contribute_or_cancel<P: AggregatePoint + ?Sized>(
    point: &P,
    request: &str,
    relation: &Relation,
    args: &ListArgs,
) -> VfsResult<Vec<Obj>> {
    tokio::select! {
        biased;
        _ = args.cancel.cancelled() => Err(VfsError::Cancelled),
        result = point.contribute(request, relation, args.refresh) => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct FixedPoint {
        point: String,
        size: u64,
        fail: bool,
        delay: Option<Duration>,
        empty: bool,
        calls: AtomicUsize,
    }

    impl FixedPoint {
        fn new(point: &str, size: u64) -> Arc<Self> {
            Arc::new(Self {
                point: point.to_string(),
                size,
                fail: false,
                delay: None,
                empty: false,
                calls: AtomicUsize::new(0),
            })
        }

        fn failing(point: &str) -> Arc<Self> {
            Arc::new(Self {
                point: point.to_string(),
                size: 0,
                fail: true,
                delay: None,
                empty: false,
                calls: AtomicUsize::new(0),
            })
        }

        fn slow(point: &str, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                point: point.to_string(),
                size: 1,
                fail: false,
                delay: Some(delay),
                empty: false,
                calls: AtomicUsize::new(0),
            })
        }

        fn empty(point: &str) -> Arc<Self> {
            Arc::new(Self {
                point: point.to_string(),
                size: 0,
                fail: false,
                delay: None,
                empty: true,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl AggregatePoint for FixedPoint {
        fn point(&self) -> &str {
            &self.point
        }

        async fn contribute(
            &self,
            request: &str,
            relation: &Relation,
            _refresh: bool,
        ) -> VfsResult<Vec<Obj>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail {
                return Err(VfsError::unavailable("upstream down"));
            }
            if self.empty {
                return Ok(Vec::new());
            }
            Ok(match relation {
                Relation::Exact => vec![Obj::file(request, "asset.bin", self.size)],
                Relation::Ancestor { child } => vec![Obj::directory(request, child, self.size)],
                Relation::Descendant { selector, .. } => {
                    vec![Obj::file(request, format!("{selector}.bin"), self.size)]
                }
                Relation::Unrelated => Vec::new(),
            })
        }
    }

    #[test]
    fn test_classify() {
        assert_eq!(Relation::classify("/gh/x", "/gh/x"), Relation::Exact);
        assert_eq!(
            Relation::classify("/gh/x", "/gh"),
            Relation::Ancestor { child: "x".into() }
        );
        assert_eq!(
            Relation::classify("/gh/x/y", "/"),
            Relation::Ancestor { child: "gh".into() }
        );
        assert_eq!(
            Relation::classify("/gh/x", "/gh/x/v1"),
            Relation::Descendant {
                selector: "v1".into(),
                rest: String::new()
            }
        );
        assert_eq!(Relation::classify("/gh/x", "/gh/xy"), Relation::Unrelated);
        assert_eq!(Relation::classify("/gh/x", "/other"), Relation::Unrelated);
    }

    #[tokio::test]
    async fn test_ancestor_dirs_fold() {
        let points = vec![
            FixedPoint::new("/repo/a/v1", 100),
            FixedPoint::new("/repo/a/v2", 50),
            FixedPoint::new("/repo/b", 7),
        ];
        let objs = MountAggregator::default()
            .list(&points, "/repo", &ListArgs::default())
            .await
            .unwrap();

        assert_eq!(objs.len(), 2);
        let a = objs.iter().find(|o| o.name == "a").unwrap();
        assert!(a.is_dir());
        assert_eq!(a.size, 150);
    }

    #[tokio::test]
    async fn test_unrelated_points_not_fetched() {
        let near = FixedPoint::new("/gh/x", 1);
        let far = FixedPoint::new("/elsewhere", 1);
        let points = vec![Arc::clone(&near), Arc::clone(&far)];

        MountAggregator::default()
            .list(&points, "/gh", &ListArgs::default())
            .await
            .unwrap();

        assert_eq!(near.calls.load(Ordering::SeqCst), 1);
        assert_eq!(far.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failure_is_soft_when_others_succeed() {
        let points = vec![FixedPoint::failing("/gh/bad"), FixedPoint::new("/gh/good", 3)];
        for options in [AggregateOptions::default(), AggregateOptions::concurrent(4)] {
            let objs = MountAggregator::new(options)
                .list(&points, "/gh", &ListArgs::default())
                .await
                .unwrap();
            assert_eq!(objs.len(), 1);
            assert_eq!(objs[0].name, "good");
        }
    }

    #[tokio::test]
    async fn test_all_failed_is_unavailable() {
        let points = vec![FixedPoint::failing("/gh/a"), FixedPoint::failing("/gh/b")];
        let err = MountAggregator::new(AggregateOptions::concurrent(2))
            .list(&points, "/gh", &ListArgs::default())
            .await
            .unwrap_err();
        assert!(matches!(err, VfsError::BackendUnavailable(_)));
    }

    #[tokio::test]
    async fn test_empty_answer_beside_failure_is_not_error() {
        let points = vec![FixedPoint::failing("/gh"), FixedPoint::empty("/gh")];
        for options in [AggregateOptions::default(), AggregateOptions::concurrent(2)] {
            let objs = MountAggregator::new(options)
                .list(&points, "/gh", &ListArgs::default())
                .await
                .unwrap();
            assert!(objs.is_empty());
        }
    }

    #[tokio::test]
    async fn test_nothing_related_is_empty_not_error() {
        let points = vec![FixedPoint::new("/gh/a", 1)];
        let objs = MountAggregator::default()
            .list(&points, "/nowhere", &ListArgs::default())
            .await
            .unwrap();
        assert!(objs.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_abandons_fetches() {
        let points = vec![
            FixedPoint::slow("/gh/a", Duration::from_secs(30)),
            FixedPoint::slow("/gh/b", Duration::from_secs(30)),
        ];
        let args = ListArgs::default();
        let cancel = args.cancel.clone();
        let aggregator = MountAggregator::new(AggregateOptions::concurrent(2));

        let handle = tokio::spawn(async move { aggregator.list(&points, "/gh", &args).await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();

        let result = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result, Err(VfsError::Cancelled));
    }
}
