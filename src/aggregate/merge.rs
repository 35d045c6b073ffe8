//! Merge per-source batches into one reverse-chronological timeline.

use crate::source::{newest_first, Post};

/// Concatenate `batches` in the order given and sort newest first.
///
/// The sort is stable: posts with equal timestamps keep the order in which
/// their batches were supplied, and their order within a batch. Sources get
/// no precedence over one another.
pub fn merge(batches: Vec<Vec<Post>>) -> Vec<Post> {
    let mut posts: Vec<Post> = batches.into_iter().flatten().collect();
    posts.sort_by(newest_first);
    posts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::post::tests::make_post;

    fn ids(posts: &[Post]) -> Vec<&str> {
        posts.iter().map(|p| p.id.as_str()).collect()
    }

    #[test]
    fn interleaves_sources_by_timestamp() {
        let a = vec![make_post("a1", "A", 100), make_post("a2", "A", 90)];
        let b = vec![make_post("b1", "B", 95), make_post("b2", "B", 80)];

        let merged = merge(vec![a, b]);
        assert_eq!(ids(&merged), vec!["a1", "b1", "a2", "b2"]);
    }

    #[test]
    fn sorts_unsorted_batches() {
        let batch = vec![
            make_post("old", "A", 10),
            make_post("new", "A", 30),
            make_post("mid", "A", 20),
        ];
        assert_eq!(ids(&merge(vec![batch])), vec!["new", "mid", "old"]);
    }

    #[test]
    fn ties_keep_arrival_order() {
        let first = vec![make_post("1", "A", 100)];
        let second = vec![make_post("2", "B", 100)];

        assert_eq!(ids(&merge(vec![first.clone(), second.clone()])), vec!["1", "2"]);
        assert_eq!(ids(&merge(vec![second, first])), vec!["2", "1"]);
    }

    #[test]
    fn ties_within_a_batch_keep_their_order() {
        let batch = vec![
            make_post("x", "A", 50),
            make_post("y", "A", 70),
            make_post("z", "A", 50),
        ];
        assert_eq!(ids(&merge(vec![batch])), vec!["y", "x", "z"]);
    }

    #[test]
    fn keeps_every_post_exactly_once() {
        let batches = vec![
            (0..10).map(|i| make_post(&format!("a{i}"), "A", i * 7)).collect::<Vec<_>>(),
            (0..5).map(|i| make_post(&format!("b{i}"), "B", i * 11)).collect(),
            Vec::new(),
        ];

        let merged = merge(batches);
        assert_eq!(merged.len(), 15);
        let mut seen = ids(&merged);
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), 15);
        assert!(merged.windows(2).all(|w| w[0].created >= w[1].created));
    }

    #[test]
    fn empty_input_gives_empty_timeline() {
        assert!(merge(Vec::new()).is_empty());
        assert!(merge(vec![Vec::new(), Vec::new()]).is_empty());
    }
}
