//! Concurrent fan-out / fan-in over many sources.
//!
//! ## Flow
//!
//! ```text
//!              ┌─► fetch(A) ─┐
//! aggregate ───┼─► fetch(B) ─┼─► channel ─► report ─► AggregateResult
//!              └─► fetch(C) ─┘   (arrival     │
//!                                  order)     └─ merge (stable, newest first)
//! ```
//!
//! One tokio task per source; the tasks share nothing but the outcome
//! channel. The coordinator waits for *every* task and never short-circuits:
//! a failing source ends up in [`AggregateResult::failures`] while the other
//! sources' posts are still merged. Only an empty source set fails the call.

mod fan_out;
pub mod merge;
pub mod report;

pub use merge::merge;
pub use report::report;

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::source::{FeedFetcher, FetchOptions, Post, SourceId, SourceResolver};
use fan_out::fan_out;

/// What one fetch task produced. Exactly one per launched task.
#[derive(Debug)]
pub enum FetchOutcome {
    Success { source: SourceId, posts: Vec<Post> },
    Failure { source: SourceId, error: Error },
}

impl FetchOutcome {
    fn from_result(source: SourceId, result: Result<Vec<Post>>) -> Self {
        match result {
            Ok(posts) => FetchOutcome::Success { source, posts },
            Err(error) => FetchOutcome::Failure { source, error },
        }
    }

    pub fn source(&self) -> &SourceId {
        match self {
            FetchOutcome::Success { source, .. } | FetchOutcome::Failure { source, .. } => source,
        }
    }
}

/// The merged timeline plus a keyed record of every source that failed.
#[derive(Debug, Default)]
pub struct AggregateResult {
    /// Posts from all successful sources, newest first.
    pub posts: Vec<Post>,
    /// Sources that answered, in arrival order.
    pub succeeded: Vec<SourceId>,
    /// Sources that failed, with the reason.
    pub failures: BTreeMap<SourceId, Error>,
}

impl AggregateResult {
    /// Every source answered.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// No source answered. Still a successful call; whether this is an
    /// error is up to the caller.
    pub fn all_failed(&self) -> bool {
        self.succeeded.is_empty() && !self.failures.is_empty()
    }

    pub fn source_count(&self) -> usize {
        self.succeeded.len() + self.failures.len()
    }
}

/// Fans one fetch out per source and merges the results.
///
/// Holds an explicitly constructed fetcher; cloning is cheap and shares it.
#[derive(Clone)]
pub struct Aggregator {
    fetcher: Arc<dyn FeedFetcher>,
}

impl Aggregator {
    pub fn new(fetcher: Arc<dyn FeedFetcher>) -> Self {
        Self { fetcher }
    }

    /// Fetch every source concurrently and merge what comes back.
    ///
    /// Duplicate ids in `sources` are fetched once. All sources share
    /// `options`.
    ///
    /// # Errors
    /// [`Error::InvalidArgument`] when `sources` is empty; no task is
    /// launched in that case. Per-source failures never fail the call.
    pub async fn aggregate(
        &self,
        sources: &[SourceId],
        options: &FetchOptions,
    ) -> Result<AggregateResult> {
        let outcomes = self.collect(sources, options).await?;
        let result = report(outcomes);

        if result.all_failed() {
            warn!(sources = result.source_count(), "every source failed");
        } else {
            info!(
                posts = result.posts.len(),
                succeeded = result.succeeded.len(),
                failed = result.failures.len(),
                "aggregate complete"
            );
        }
        Ok(result)
    }

    /// Launch one fetch per distinct source and return the raw outcomes in
    /// arrival order.
    pub async fn collect(
        &self,
        sources: &[SourceId],
        options: &FetchOptions,
    ) -> Result<Vec<FetchOutcome>> {
        let sources = distinct(sources);
        if sources.is_empty() {
            return Err(Error::InvalidArgument(
                "at least one source is required".into(),
            ));
        }

        debug!(sources = sources.len(), ?options, "fanning out");

        let fetcher = Arc::clone(&self.fetcher);
        let options = Arc::new(options.clone());
        let results = fan_out(sources, move |source: SourceId| {
            let fetcher = Arc::clone(&fetcher);
            let options = Arc::clone(&options);
            async move { fetcher.fetch(&source, &options).await }
        })
        .await;

        Ok(results
            .into_iter()
            .map(|(source, result)| {
                match &result {
                    Ok(posts) => debug!(%source, posts = posts.len(), "source answered"),
                    Err(error) => warn!(%source, %error, "source failed"),
                }
                FetchOutcome::from_result(source, result)
            })
            .collect())
    }
}

/// Handles mapped to source ids, plus the handles that could not be.
#[derive(Debug, Default)]
pub struct Resolution {
    /// `(handle, id)` pairs in the order the handles were given.
    pub resolved: Vec<(String, SourceId)>,
    pub unresolved: BTreeMap<String, Error>,
}

impl Resolution {
    pub fn source_ids(&self) -> Vec<SourceId> {
        self.resolved.iter().map(|(_, id)| id.clone()).collect()
    }
}

/// Resolve every handle concurrently.
///
/// A handle that cannot be resolved is recorded in
/// [`Resolution::unresolved`] and does not affect the others.
pub async fn resolve_handles(resolver: Arc<dyn SourceResolver>, handles: &[String]) -> Resolution {
    let mut seen = HashSet::new();
    let handles: Vec<String> = handles
        .iter()
        .filter(|h| seen.insert(h.as_str()))
        .cloned()
        .collect();

    let results = fan_out(handles.clone(), move |handle: String| {
        let resolver = Arc::clone(&resolver);
        async move { resolver.resolve(&handle).await }
    })
    .await;

    let mut ids: BTreeMap<String, SourceId> = BTreeMap::new();
    let mut unresolved = BTreeMap::new();
    for (handle, result) in results {
        match result {
            Ok(id) => {
                debug!(%handle, %id, "handle resolved");
                ids.insert(handle, id);
            }
            Err(error) => {
                warn!(%handle, %error, "handle could not be resolved");
                unresolved.insert(handle, error);
            }
        }
    }

    let resolved = handles
        .into_iter()
        .filter_map(|h| ids.remove(&h).map(|id| (h, id)))
        .collect();

    Resolution {
        resolved,
        unresolved,
    }
}

/// Drop repeated ids, keeping first occurrences in order.
fn distinct(sources: &[SourceId]) -> Vec<SourceId> {
    let mut seen = HashSet::new();
    sources
        .iter()
        .filter(|s| seen.insert(*s))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::post::tests::make_post;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Scripted reply for one source: wait `delay_ms` of (paused) tokio time,
    /// then answer. With a paused clock, replies arrive strictly in delay
    /// order, which makes arrival order deterministic.
    enum Reply {
        Posts(u64, Vec<Post>),
        Fail(u64, &'static str),
    }

    #[derive(Default)]
    struct FakeFetcher {
        replies: HashMap<SourceId, Reply>,
        calls: AtomicUsize,
    }

    impl FakeFetcher {
        fn posts(mut self, source: &str, delay_ms: u64, posts: Vec<Post>) -> Self {
            self.replies.insert(id(source), Reply::Posts(delay_ms, posts));
            self
        }

        fn fail(mut self, source: &str, delay_ms: u64, message: &'static str) -> Self {
            self.replies.insert(id(source), Reply::Fail(delay_ms, message));
            self
        }
    }

    #[async_trait]
    impl FeedFetcher for FakeFetcher {
        async fn fetch(&self, source: &SourceId, _options: &FetchOptions) -> Result<Vec<Post>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.replies.get(source) {
                Some(Reply::Posts(delay, posts)) => {
                    tokio::time::sleep(Duration::from_millis(*delay)).await;
                    Ok(posts.clone())
                }
                Some(Reply::Fail(delay, message)) => {
                    tokio::time::sleep(Duration::from_millis(*delay)).await;
                    Err(Error::RemoteApi {
                        code: 500,
                        kind: "APIError".into(),
                        message: (*message).into(),
                    })
                }
                None => Err(Error::NotFound(source.to_string())),
            }
        }
    }

    fn id(s: &str) -> SourceId {
        SourceId::new(s).unwrap()
    }

    fn ids(posts: &[Post]) -> Vec<&str> {
        posts.iter().map(|p| p.id.as_str()).collect()
    }

    fn aggregator(fetcher: FakeFetcher) -> (Aggregator, Arc<FakeFetcher>) {
        let fetcher = Arc::new(fetcher);
        (Aggregator::new(fetcher.clone()), fetcher)
    }

    #[tokio::test]
    async fn empty_source_set_is_rejected_without_launching() {
        let (agg, fetcher) = aggregator(FakeFetcher::default());

        let err = agg.aggregate(&[], &FetchOptions::new()).await.unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert!(err.is_fatal());
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn one_failing_source_degrades_but_does_not_abort() {
        let (agg, _) = aggregator(
            FakeFetcher::default()
                .posts("A", 20, vec![make_post("1", "A", 100), make_post("2", "A", 90)])
                .fail("B", 5, "backend unavailable"),
        );

        let result = agg
            .aggregate(&[id("A"), id("B")], &FetchOptions::new())
            .await
            .unwrap();

        assert_eq!(ids(&result.posts), vec!["1", "2"]);
        assert_eq!(result.succeeded, vec![id("A")]);
        assert_eq!(result.failures.len(), 1);
        assert!(matches!(
            result.failures.get(&id("B")),
            Some(Error::RemoteApi { code: 500, .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_sources_are_awaited_after_an_early_failure() {
        let (agg, fetcher) = aggregator(
            FakeFetcher::default()
                .fail("A", 1, "boom")
                .posts("B", 500, vec![make_post("b", "B", 10)])
                .posts("C", 1_000, vec![make_post("c", "C", 20)]),
        );

        let result = agg
            .aggregate(&[id("A"), id("B"), id("C")], &FetchOptions::new())
            .await
            .unwrap();

        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 3);
        assert_eq!(ids(&result.posts), vec!["c", "b"]);
        assert_eq!(result.source_count(), 3);
    }

    #[tokio::test]
    async fn every_post_appears_once_when_all_succeed() {
        let (agg, _) = aggregator(
            FakeFetcher::default()
                .posts("A", 0, vec![make_post("a1", "A", 300), make_post("a2", "A", 100)])
                .posts("B", 0, vec![make_post("b1", "B", 200)])
                .posts("C", 0, Vec::new()),
        );

        let result = agg
            .aggregate(&[id("A"), id("B"), id("C")], &FetchOptions::new())
            .await
            .unwrap();

        assert!(result.is_complete());
        assert_eq!(result.succeeded.len(), 3);
        assert_eq!(ids(&result.posts), vec!["a1", "b1", "a2"]);
        assert!(result.posts.windows(2).all(|w| w[0].created >= w[1].created));
    }

    #[tokio::test]
    async fn all_sources_failing_is_still_ok() {
        let (agg, _) = aggregator(
            FakeFetcher::default()
                .fail("A", 0, "down")
                .fail("B", 0, "down"),
        );

        let result = agg
            .aggregate(&[id("A"), id("B")], &FetchOptions::new())
            .await
            .unwrap();

        assert!(result.posts.is_empty());
        assert!(result.all_failed());
        assert_eq!(
            result.failures.keys().cloned().collect::<Vec<_>>(),
            vec![id("A"), id("B")]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn ties_follow_outcome_arrival_order() {
        let a = vec![make_post("1", "A", 100)];
        let b = vec![make_post("2", "B", 100)];

        let (agg, _) = aggregator(
            FakeFetcher::default()
                .posts("A", 10, a.clone())
                .posts("B", 20, b.clone()),
        );
        let result = agg
            .aggregate(&[id("A"), id("B")], &FetchOptions::new())
            .await
            .unwrap();
        assert_eq!(ids(&result.posts), vec!["1", "2"]);

        // Same sources, reversed arrival.
        let (agg, _) = aggregator(FakeFetcher::default().posts("A", 20, a).posts("B", 10, b));
        let result = agg
            .aggregate(&[id("A"), id("B")], &FetchOptions::new())
            .await
            .unwrap();
        assert_eq!(ids(&result.posts), vec!["2", "1"]);
    }

    #[tokio::test(start_paused = true)]
    async fn collect_reports_arrival_not_request_order() {
        let (agg, _) = aggregator(
            FakeFetcher::default()
                .posts("A", 30, Vec::new())
                .fail("B", 10, "nope")
                .posts("C", 20, Vec::new()),
        );

        let outcomes = agg
            .collect(&[id("A"), id("B"), id("C")], &FetchOptions::new())
            .await
            .unwrap();

        let order: Vec<&str> = outcomes.iter().map(|o| o.source().as_str()).collect();
        assert_eq!(order, vec!["B", "C", "A"]);
    }

    #[tokio::test]
    async fn duplicate_sources_are_fetched_once() {
        let (agg, fetcher) =
            aggregator(FakeFetcher::default().posts("A", 0, vec![make_post("1", "A", 1)]));

        let result = agg
            .aggregate(&[id("A"), id("A")], &FetchOptions::new())
            .await
            .unwrap();

        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(result.posts.len(), 1);
        assert_eq!(result.source_count(), 1);
    }

    #[tokio::test]
    async fn many_sources_each_report_exactly_once() {
        let mut fake = FakeFetcher::default();
        let mut sources = Vec::new();
        for n in 0..40i64 {
            let name = format!("s{n}");
            fake = if n % 4 == 0 {
                fake.fail(&name, 0, "flaky")
            } else {
                fake.posts(&name, 0, vec![make_post(&format!("p{n}"), &name, n)])
            };
            sources.push(id(&name));
        }
        let (agg, fetcher) = aggregator(fake);

        let result = agg.aggregate(&sources, &FetchOptions::new()).await.unwrap();

        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 40);
        assert_eq!(result.source_count(), 40);
        assert_eq!(result.failures.len(), 10);
        assert_eq!(result.posts.len(), 30);
    }

    // -- resolution ------------------------------------------------------------

    struct FakeResolver;

    #[async_trait]
    impl SourceResolver for FakeResolver {
        async fn resolve(&self, handle: &str) -> Result<SourceId> {
            match handle {
                "alice" => SourceId::new("1"),
                "bob" => {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    SourceId::new("2")
                }
                other => Err(Error::NotFound(format!("no user found with username {other}"))),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn resolve_handles_keeps_input_order_and_isolates_misses() {
        let handles = vec![
            "bob".to_string(),
            "ghost".to_string(),
            "alice".to_string(),
            "bob".to_string(),
        ];

        let resolution = resolve_handles(Arc::new(FakeResolver), &handles).await;

        assert_eq!(
            resolution.resolved,
            vec![("bob".to_string(), id("2")), ("alice".to_string(), id("1"))]
        );
        assert_eq!(resolution.source_ids(), vec![id("2"), id("1")]);
        assert_eq!(resolution.unresolved.len(), 1);
        assert!(matches!(
            resolution.unresolved.get("ghost"),
            Some(Error::NotFound(_))
        ));
    }
}
