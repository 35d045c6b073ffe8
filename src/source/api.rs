//! REST API source implementation.
//!
//! [`ApiClient`] is the production [`FeedFetcher`] and [`SourceResolver`].
//! It owns one `reqwest::Client` and one [`TokenProvider`]; construct it
//! once and share it behind an `Arc`.
//!
//! Every response body is an envelope:
//!
//! ```text
//! { "meta": { "code": 200 }, "pagination": { "next_max_id": "..." }, "data": ... }
//! ```
//!
//! An error body carries only the `meta` block, with `error_type` and
//! `error_message`; it becomes [`Error::RemoteApi`] whether the HTTP status
//! or `meta.code` reports the failure. `meta` is checked before `data` is
//! decoded.

use std::num::NonZeroU32;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{
    FeedFetcher, FetchOptions, ImageUrl, Location, Post, PostImages, SourceId, SourceResolver,
    TokenProvider,
};
use crate::config::ClientConfig;
use crate::error::{Error, Result};

/// How many search hits to inspect when resolving a handle.
const RESOLVE_CANDIDATES: NonZeroU32 = match NonZeroU32::new(5) {
    Some(n) => n,
    None => unreachable!(),
};

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    pagination: Option<Pagination>,
    data: T,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    meta: ResponseMeta,
}

#[derive(Debug, Default, Deserialize)]
struct ResponseMeta {
    #[serde(default)]
    code: Option<u16>,
    #[serde(default)]
    error_type: Option<String>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Pagination {
    #[serde(default)]
    next_max_id: Option<String>,
    /// Cursor of the liked-posts listing.
    #[serde(default)]
    next_max_like_id: Option<String>,
}

impl Pagination {
    fn cursor(self) -> Option<String> {
        self.next_max_id.or(self.next_max_like_id)
    }
}

#[derive(Debug, Deserialize)]
struct WirePost {
    id: String,
    #[serde(default)]
    user: Option<WireUser>,
    #[serde(default)]
    images: WireImages,
    #[serde(default)]
    caption: Option<WireCaption>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    location: Option<WireLocation>,
    #[serde(default)]
    link: Option<String>,
    created_time: WireTimestamp,
}

#[derive(Debug, Deserialize)]
struct WireUser {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    username: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct WireImages {
    #[serde(default)]
    thumbnail: Option<WireImage>,
    #[serde(default)]
    low_resolution: Option<WireImage>,
    #[serde(default)]
    standard_resolution: Option<WireImage>,
}

#[derive(Debug, Deserialize)]
struct WireImage {
    url: String,
    #[serde(default)]
    width: Option<u32>,
    #[serde(default)]
    height: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct WireCaption {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireLocation {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    latitude: Option<f64>,
    #[serde(default)]
    longitude: Option<f64>,
}

/// Unix seconds, sent either as a string or as a number.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireTimestamp {
    Number(i64),
    Text(String),
}

impl WireTimestamp {
    fn to_datetime(&self) -> Option<DateTime<Utc>> {
        let secs = match self {
            WireTimestamp::Number(n) => *n,
            WireTimestamp::Text(s) => s.trim().parse().ok()?,
        };
        DateTime::from_timestamp(secs, 0)
    }
}

impl From<WireImage> for ImageUrl {
    fn from(image: WireImage) -> Self {
        Self {
            url: image.url,
            width: image.width,
            height: image.height,
        }
    }
}

impl WirePost {
    fn into_post(self, owner: &SourceId) -> Result<Post> {
        let created = self.created_time.to_datetime().ok_or_else(|| {
            Error::Decode(format!(
                "post {} has an invalid created_time: {:?}",
                self.id, self.created_time
            ))
        })?;

        Ok(Post {
            id: self.id,
            owner: owner.clone(),
            owner_name: self.user.and_then(|u| u.username),
            images: PostImages {
                thumbnail: self.images.thumbnail.map(ImageUrl::from),
                low_resolution: self.images.low_resolution.map(ImageUrl::from),
                standard_resolution: self.images.standard_resolution.map(ImageUrl::from),
            },
            caption: self.caption.and_then(|c| c.text),
            tags: self.tags,
            location: self.location.map(|l| Location {
                name: l.name,
                latitude: l.latitude,
                longitude: l.longitude,
            }),
            link: self.link,
            created,
        })
    }

    /// Like [`into_post`](Self::into_post) for listings that mix accounts;
    /// the owner is read from the post's own `user` block.
    fn into_authored_post(self) -> Result<Post> {
        let owner = self
            .user
            .as_ref()
            .and_then(|u| u.id.clone())
            .and_then(|id| SourceId::new(id).ok())
            .ok_or_else(|| Error::Decode(format!("post {} has no owner id", self.id)))?;
        self.into_post(&owner)
    }
}

// ---------------------------------------------------------------------------
// Public response types
// ---------------------------------------------------------------------------

/// One hit of a user search.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UserSummary {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub profile_picture: Option<String>,
}

/// Full profile of one account.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub profile_picture: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub counts: UserCounts,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UserCounts {
    #[serde(default)]
    pub media: u64,
    #[serde(default)]
    pub follows: u64,
    #[serde(default)]
    pub followed_by: u64,
}

/// One page of an account's posts plus the cursor for the next older page.
#[derive(Debug, Clone)]
pub struct FeedPage {
    pub posts: Vec<Post>,
    /// Cursor for the next older page: `max_id` for account and home
    /// feeds, `max_like_id` for liked posts. `None` on the last page.
    pub next_max_id: Option<String>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Client for the REST API.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    token: Arc<dyn TokenProvider>,
}

impl ApiClient {
    /// Build a client from `config`.
    ///
    /// # Errors
    /// [`Error::InvalidArgument`] if `config.base_url` is not an absolute
    /// URL, [`Error::Transport`] if the HTTP client cannot be built.
    pub fn new(config: &ClientConfig, token: Arc<dyn TokenProvider>) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| Error::InvalidArgument(format!("invalid base URL {}: {e}", config.base_url)))?;
        if base_url.cannot_be_a_base() {
            return Err(Error::InvalidArgument(format!(
                "base URL cannot carry a path: {}",
                config.base_url
            )));
        }

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.as_str())
            .build()?;

        Ok(Self {
            http,
            base_url,
            token,
        })
    }

    /// Search accounts by name.
    pub async fn search_users(
        &self,
        query: &str,
        count: Option<NonZeroU32>,
    ) -> Result<Vec<UserSummary>> {
        if query.trim().is_empty() {
            return Err(Error::InvalidArgument("query string cannot be empty".into()));
        }

        let mut params = vec![("q", query.to_string())];
        if let Some(count) = count {
            params.push(("count", count.to_string()));
        }

        let envelope: Envelope<Vec<UserSummary>> =
            self.get(&["users", "search"], params).await?;
        Ok(envelope.data)
    }

    /// Full profile of one account.
    pub async fn user_profile(&self, source: &SourceId) -> Result<UserProfile> {
        let envelope: Envelope<UserProfile> =
            self.get(&["users", source.as_str()], Vec::new()).await?;
        Ok(envelope.data)
    }

    /// One page of `source`'s posts, newest first, with the next cursor.
    pub async fn fetch_page(&self, source: &SourceId, options: &FetchOptions) -> Result<FeedPage> {
        let envelope: Envelope<Vec<WirePost>> = self
            .get(&["users", source.as_str(), "media", "recent"], options.query_pairs())
            .await?;

        let posts = envelope
            .data
            .into_iter()
            .map(|wire| wire.into_post(source))
            .collect::<Result<Vec<_>>>()?;

        Ok(FeedPage {
            posts,
            next_max_id: envelope.pagination.and_then(Pagination::cursor),
        })
    }

    /// One page of the authenticated user's home feed.
    pub async fn self_feed(&self, options: &FetchOptions) -> Result<FeedPage> {
        self.authored_page(&["users", "self", "feed"], options.query_pairs())
            .await
    }

    /// One page of the posts the authenticated user liked, most recently
    /// liked first. `max_like_id` is the cursor from a previous page.
    pub async fn liked_posts(
        &self,
        count: Option<NonZeroU32>,
        max_like_id: Option<&str>,
    ) -> Result<FeedPage> {
        let mut params = Vec::new();
        if let Some(count) = count {
            params.push(("count", count.to_string()));
        }
        if let Some(cursor) = max_like_id {
            params.push(("max_like_id", cursor.to_string()));
        }
        self.authored_page(&["users", "self", "media", "liked"], params)
            .await
    }

    /// Accounts that `source` follows.
    pub async fn follows(&self, source: &SourceId) -> Result<Vec<UserSummary>> {
        let envelope: Envelope<Vec<UserSummary>> = self
            .get(&["users", source.as_str(), "follows"], Vec::new())
            .await?;
        Ok(envelope.data)
    }

    /// A page whose posts come from many accounts.
    async fn authored_page(
        &self,
        segments: &[&str],
        params: Vec<(&'static str, String)>,
    ) -> Result<FeedPage> {
        let envelope: Envelope<Vec<WirePost>> = self.get(segments, params).await?;
        let posts = envelope
            .data
            .into_iter()
            .map(WirePost::into_authored_post)
            .collect::<Result<Vec<_>>>()?;

        Ok(FeedPage {
            posts,
            next_max_id: envelope.pagination.and_then(Pagination::cursor),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::InvalidArgument(format!("base URL cannot carry a path: {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Send a GET request and decode the envelope.
    ///
    /// The access token is appended to `params`; it is never logged.
    async fn get<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        mut params: Vec<(&'static str, String)>,
    ) -> Result<Envelope<T>> {
        let url = self.endpoint(segments)?;
        debug!(path = url.path(), "GET");

        params.push(("access_token", self.token.access_token()));
        let response = self.http.get(url).query(&params).send().await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let err = api_error(status, &body);
            warn!(status = status.as_u16(), error = %err, "API request failed");
            return Err(err);
        }

        // Error bodies have no `data`, so read `meta` on its own first.
        let meta = serde_json::from_str::<ErrorEnvelope>(&body)?.meta;
        if let Some(code) = meta.code.filter(|code| !(200..300).contains(code)) {
            let err = Error::RemoteApi {
                code,
                kind: meta.error_type.unwrap_or_default(),
                message: meta.error_message.unwrap_or_default(),
            };
            warn!(code, error = %err, "API reported an error");
            return Err(err);
        }

        Ok(serde_json::from_str(&body)?)
    }
}

/// Build an [`Error::RemoteApi`] from a non-success response.
///
/// When the body has no usable `meta` block the HTTP status stands in for it.
fn api_error(status: StatusCode, body: &str) -> Error {
    let meta = serde_json::from_str::<ErrorEnvelope>(body)
        .map(|e| e.meta)
        .unwrap_or_default();

    Error::RemoteApi {
        code: meta.code.unwrap_or_else(|| status.as_u16()),
        kind: meta.error_type.unwrap_or_else(|| "HTTPError".to_string()),
        message: meta.error_message.unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("unexpected status")
                .to_string()
        }),
    }
}

#[async_trait]
impl FeedFetcher for ApiClient {
    async fn fetch(&self, source: &SourceId, options: &FetchOptions) -> Result<Vec<Post>> {
        Ok(self.fetch_page(source, options).await?.posts)
    }
}

#[async_trait]
impl SourceResolver for ApiClient {
    /// Prefers a hit whose username equals `handle` (ignoring case and a
    /// leading `@`); otherwise takes the search's best match.
    async fn resolve(&self, handle: &str) -> Result<SourceId> {
        let handle = handle.trim().trim_start_matches('@');
        let users = self.search_users(handle, Some(RESOLVE_CANDIDATES)).await?;

        let user = users
            .iter()
            .find(|u| u.username.eq_ignore_ascii_case(handle))
            .or_else(|| users.first())
            .ok_or_else(|| Error::NotFound(format!("no user found with username {handle}")))?;

        SourceId::new(user.id.clone())
            .map_err(|_| Error::Decode(format!("search hit for {handle} has an empty id")))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
