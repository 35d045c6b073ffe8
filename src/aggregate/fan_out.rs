//! Spawn one task per key and drain their results as they arrive.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tokio::sync::mpsc;

use crate::error::{Error, Result};

/// Run `task(key)` concurrently for every key and return `(key, result)`
/// pairs in arrival order.
///
/// Each task runs on its own tokio task and reports through a shared
/// channel. A single consumer drains the channel until every sender is
/// gone, so exactly one result comes back per key: a task that panics is
/// reported as [`Error::TaskAborted`] instead of going missing.
///
/// Dropping the returned future does not cancel tasks already launched;
/// they run to completion and their results are discarded.
pub(crate) async fn fan_out<K, T, F, Fut>(keys: Vec<K>, task: F) -> Vec<(K, Result<T>)>
where
    K: Clone + Send + 'static,
    T: Send + 'static,
    F: Fn(K) -> Fut,
    Fut: Future<Output = Result<T>> + Send + 'static,
{
    let launched = keys.len();
    let (tx, mut rx) = mpsc::unbounded_channel();

    for key in keys {
        let tx = tx.clone();
        let work = task(key.clone());
        tokio::spawn(async move {
            let result = match AssertUnwindSafe(work).catch_unwind().await {
                Ok(result) => result,
                Err(panic) => Err(Error::TaskAborted(panic_message(&*panic))),
            };
            // The receiver is only gone when the caller was dropped.
            let _ = tx.send((key, result));
        });
    }
    drop(tx);

    let mut results = Vec::with_capacity(launched);
    while let Some(result) = rx.recv().await {
        results.push(result);
    }
    results
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "task panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn results_come_back_in_arrival_order() {
        let delays = vec![("slow", 30u64), ("fast", 10), ("mid", 20)];

        let results = fan_out(delays, |(name, delay)| async move {
            tokio::time::sleep(Duration::from_millis(delay)).await;
            Ok(name)
        })
        .await;

        let order: Vec<&str> = results.into_iter().map(|(_, r)| r.unwrap()).collect();
        assert_eq!(order, vec!["fast", "mid", "slow"]);
    }

    #[tokio::test]
    async fn one_result_per_key_even_on_errors() {
        let keys: Vec<u32> = (0..50).collect();

        let results = fan_out(keys, |k| async move {
            if k % 3 == 0 {
                Err(Error::NotFound(k.to_string()))
            } else {
                Ok(k)
            }
        })
        .await;

        assert_eq!(results.len(), 50);
        let mut seen: Vec<u32> = results.iter().map(|(k, _)| *k).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..50).collect::<Vec<_>>());
        assert_eq!(results.iter().filter(|(_, r)| r.is_err()).count(), 17);
    }

    #[tokio::test]
    async fn panicking_task_is_reported_not_lost() {
        let results = fan_out(vec![1u8, 2], |k| async move {
            if k == 2 {
                panic!("decoder exploded");
            }
            Ok(k)
        })
        .await;

        assert_eq!(results.len(), 2);
        let (_, failed) = results.iter().find(|(k, _)| *k == 2).unwrap();
        match failed {
            Err(Error::TaskAborted(msg)) => assert!(msg.contains("decoder exploded")),
            other => panic!("expected TaskAborted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn no_keys_launch_no_tasks() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let results: Vec<(u8, Result<u8>)> = fan_out(Vec::new(), move |k| {
            counter.fetch_add(1, Ordering::SeqCst);
            async move { Ok(k) }
        })
        .await;

        assert!(results.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
