//! Turn collected fetch outcomes into an [`AggregateResult`].

use std::collections::BTreeMap;

use super::merge::merge;
use super::{AggregateResult, FetchOutcome};

/// Partition `outcomes` (in arrival order) into a merged timeline and a
/// failure record. Performs no I/O.
///
/// Every failed source appears once in `failures`. Should the same source
/// somehow report twice, the first failure is kept.
pub fn report(outcomes: Vec<FetchOutcome>) -> AggregateResult {
    let mut batches = Vec::new();
    let mut succeeded = Vec::new();
    let mut failures = BTreeMap::new();

    for outcome in outcomes {
        match outcome {
            FetchOutcome::Success { source, posts } => {
                succeeded.push(source);
                batches.push(posts);
            }
            FetchOutcome::Failure { source, error } => {
                failures.entry(source).or_insert(error);
            }
        }
    }

    AggregateResult {
        posts: merge(batches),
        succeeded,
        failures,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::source::post::tests::make_post;
    use crate::source::SourceId;

    fn id(s: &str) -> SourceId {
        SourceId::new(s).unwrap()
    }

    #[test]
    fn splits_successes_from_failures() {
        let outcomes = vec![
            FetchOutcome::Success {
                source: id("A"),
                posts: vec![make_post("1", "A", 100), make_post("2", "A", 90)],
            },
            FetchOutcome::Failure {
                source: id("B"),
                error: Error::Decode("truncated body".into()),
            },
        ];

        let result = report(outcomes);
        let ids: Vec<&str> = result.posts.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);
        assert_eq!(result.succeeded, vec![id("A")]);
        assert_eq!(result.failures.len(), 1);
        assert!(matches!(result.failures.get(&id("B")), Some(Error::Decode(_))));
    }

    #[test]
    fn same_error_for_many_sources_is_recorded_per_source() {
        let outcomes = ["A", "B", "C"]
            .into_iter()
            .map(|s| FetchOutcome::Failure {
                source: id(s),
                error: Error::NotFound("rate limited".into()),
            })
            .collect();

        let result = report(outcomes);
        assert!(result.posts.is_empty());
        assert!(result.all_failed());
        assert_eq!(
            result.failures.keys().cloned().collect::<Vec<_>>(),
            vec![id("A"), id("B"), id("C")]
        );
    }

    #[test]
    fn successful_source_with_no_posts_is_not_a_failure() {
        let result = report(vec![FetchOutcome::Success {
            source: id("A"),
            posts: Vec::new(),
        }]);
        assert!(result.posts.is_empty());
        assert!(result.is_complete());
        assert_eq!(result.source_count(), 1);
    }

    #[test]
    fn duplicate_failure_keeps_the_first() {
        let result = report(vec![
            FetchOutcome::Failure {
                source: id("A"),
                error: Error::Decode("first".into()),
            },
            FetchOutcome::Failure {
                source: id("A"),
                error: Error::Decode("second".into()),
            },
        ]);
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[&id("A")].to_string(), "decode error: first");
    }
}
