//! Source abstraction layer.
//!
//! This module defines the two seams the aggregator talks to:
//!
//! * [`SourceResolver`] turns a human-readable handle into a [`SourceId`].
//! * [`FeedFetcher`] retrieves one page of [`Post`]s for a [`SourceId`].
//!
//! [`ApiClient`] implements both against the REST API. Tests and alternative
//! backends implement the traits directly; the aggregator never knows which
//! one it is talking to.

mod api;
mod auth;
pub(crate) mod post;

pub use api::{ApiClient, FeedPage, UserCounts, UserProfile, UserSummary};
pub use auth::{OAuthApp, StaticToken, TokenProvider};
pub use post::{newest_first, ImageUrl, Location, Post, PostImages};

use std::fmt;
use std::num::NonZeroU32;
use std::str::FromStr;

use async_trait::async_trait;

use crate::error::{Error, Result};

/// Opaque, non-empty key identifying one remote content owner.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SourceId(String);

impl SourceId {
    /// Wrap a raw identifier. Fails with [`Error::InvalidArgument`] when the
    /// identifier is empty or only whitespace.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(Error::InvalidArgument("source id cannot be empty".into()));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for SourceId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

/// Parameters for a single fetch.
///
/// Every source in one aggregate call receives the same options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchOptions {
    /// Maximum number of posts to return.
    pub count: Option<NonZeroU32>,
    /// Cursor: only return posts older than this post id.
    pub max_id: Option<String>,
    /// Only return posts newer than this post id.
    pub min_id: Option<String>,
}

impl FetchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_count(mut self, count: NonZeroU32) -> Self {
        self.count = Some(count);
        self
    }

    pub fn with_max_id(mut self, max_id: impl Into<String>) -> Self {
        self.max_id = Some(max_id.into());
        self
    }

    pub fn with_min_id(mut self, min_id: impl Into<String>) -> Self {
        self.min_id = Some(min_id.into());
        self
    }

    /// The options as URL query pairs, in a fixed order.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(count) = self.count {
            pairs.push(("count", count.to_string()));
        }
        if let Some(max_id) = &self.max_id {
            pairs.push(("max_id", max_id.clone()));
        }
        if let Some(min_id) = &self.min_id {
            pairs.push(("min_id", min_id.clone()));
        }
        pairs
    }
}

/// Retrieves one page of posts for a single source.
///
/// Implementations must be [`Send`] + [`Sync`]: the aggregator shares one
/// fetcher between all concurrently running fetch tasks.
#[async_trait]
pub trait FeedFetcher: Send + Sync {
    /// Fetch the newest page of posts matching `options`.
    ///
    /// An account with no posts yields `Ok(vec![])`. No pagination chaining
    /// happens here; callers wanting older posts call again with
    /// [`FetchOptions::max_id`] set.
    async fn fetch(&self, source: &SourceId, options: &FetchOptions) -> Result<Vec<Post>>;
}

/// Maps a handle (username) to a stable [`SourceId`] with one remote lookup.
#[async_trait]
pub trait SourceResolver: Send + Sync {
    /// Fails with [`Error::NotFound`] when no account matches.
    async fn resolve(&self, handle: &str) -> Result<SourceId>;
}
