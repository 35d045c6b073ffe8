//! Background timeline polling.
//!
//! A tokio task resolves the requested handles once (accounts already
//! looked up, such as those from `--following`, are added to that
//! resolution as-is), then re-aggregates all
//! accounts on a timer (or when the user asks for a refresh) and sends each
//! result to the UI thread over an unbounded channel.
//!
//! Each aggregate call is wrapped in a timeout. When it expires, fetches
//! still in flight are abandoned: they finish in the background and their
//! results are dropped.

use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::{mpsc, Notify};
use tokio::time::{self, MissedTickBehavior};
use tracing::{info, warn};

use feedmux::aggregate::resolve_handles;
use feedmux::config::PollConfig;
use feedmux::source::{SourceId, SourceResolver};
use feedmux::{AggregateResult, Aggregator, Resolution};

/// Messages sent from the poller task to the UI thread.
pub enum PollMsg {
    /// Handles were looked up; sent once before the first timeline.
    Resolved(Resolution),
    /// A completed aggregate call, possibly with per-account failures.
    Timeline(AggregateResult),
    /// The aggregate call itself failed or timed out.
    Error(String),
}

/// UI-side end of the poller.
pub struct Poller {
    pub rx: mpsc::UnboundedReceiver<PollMsg>,
    refresh: Arc<Notify>,
}

impl Poller {
    /// Ask for an immediate refresh instead of waiting for the next tick.
    pub fn refresh(&self) {
        self.refresh.notify_one();
    }
}

/// Spawn the polling task on `runtime`.
///
/// `known` holds `(label, id)` pairs that need no lookup. The task runs
/// until the receiver in the returned [`Poller`] is dropped.
pub fn spawn(
    runtime: &Handle,
    aggregator: Aggregator,
    resolver: Arc<dyn SourceResolver>,
    handles: Vec<String>,
    ids: Vec<SourceId>,
    known: Vec<(String, SourceId)>,
    config: PollConfig,
) -> Poller {
    let (tx, rx) = mpsc::unbounded_channel();
    let refresh = Arc::new(Notify::new());
    let wake = Arc::clone(&refresh);

    runtime.spawn(async move {
        let mut sources = ids;
        if !handles.is_empty() || !known.is_empty() {
            let mut resolution = if handles.is_empty() {
                Resolution::default()
            } else {
                resolve_handles(resolver, &handles).await
            };
            resolution.resolved.extend(known);
            sources.extend(resolution.source_ids());
            if tx.send(PollMsg::Resolved(resolution)).is_err() {
                return;
            }
        }

        let mut ticker = time::interval(config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = wake.notified() => ticker.reset(),
            }

            let msg = poll_once(&aggregator, &sources, &config).await;
            // If the receiver is gone the UI has exited; stop polling.
            if tx.send(msg).is_err() {
                return;
            }
        }
    });

    Poller { rx, refresh }
}

/// One bounded aggregate call, turned into a message for the UI.
async fn poll_once(aggregator: &Aggregator, sources: &[SourceId], config: &PollConfig) -> PollMsg {
    let call = aggregator.aggregate(sources, &config.options);
    match time::timeout(config.aggregate_timeout, call).await {
        Ok(Ok(result)) => {
            info!(
                posts = result.posts.len(),
                failed = result.failures.len(),
                "timeline refreshed"
            );
            PollMsg::Timeline(result)
        }
        Ok(Err(e)) => PollMsg::Error(e.to_string()),
        Err(_) => {
            warn!(
                timeout_secs = config.aggregate_timeout.as_secs(),
                "aggregate timed out; abandoning in-flight fetches"
            );
            PollMsg::Error(format!(
                "timed out after {}s",
                config.aggregate_timeout.as_secs()
            ))
        }
    }
}
