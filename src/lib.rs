//! feedmux: merge the recent posts of many accounts into one timeline.
//!
//! ## Architecture overview
//!
//! ```text
//!   handles ──► resolve_handles ──► SourceIds
//!                                      │
//!                                      ▼
//!   Aggregator::aggregate ──► one FeedFetcher::fetch task per source
//!                                      │  (mpsc, arrival order)
//!                                      ▼
//!                          report ──► merge ──► AggregateResult
//! ```
//!
//! * **`source`**: the [`FeedFetcher`](source::FeedFetcher) and
//!   [`SourceResolver`](source::SourceResolver) traits, the [`Post`](source::Post)
//!   type, and the REST implementation [`ApiClient`](source::ApiClient).
//! * **`aggregate`**: the concurrent fan-out / fan-in engine, the stable
//!   newest-first merge and the partial-failure report.
//! * **`config`**: plain configuration structs and defaults.
//! * **`error`**: the error taxonomy.

pub mod aggregate;
pub mod config;
pub mod error;
pub mod source;

pub use aggregate::{AggregateResult, Aggregator, FetchOutcome, Resolution};
pub use error::{Error, Result};
