//! Runtime configuration.
//!
//! Values are filled in from command-line flags and environment variables by
//! the binary (see `cli.rs`); the library only sees these plain structs, so
//! every client is explicitly constructed and handed to whoever needs it.

use std::time::Duration;

use crate::source::FetchOptions;

/// Base URL of the REST API.
pub const DEFAULT_API_URL: &str = "https://api.instagram.com/v1";

/// Base URL of the OAuth endpoints (`/authorize`, `/access_token`).
pub const DEFAULT_OAUTH_URL: &str = "https://api.instagram.com/oauth";

/// Per-request HTTP timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// How often the timeline view re-aggregates all accounts.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Settings for the HTTP client behind [`crate::source::ApiClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// API root; endpoint paths such as `/users/search` are appended to it.
    pub base_url: String,
    /// Timeout applied to every individual request.
    pub request_timeout: Duration,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            user_agent: concat!("feedmux/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl ClientConfig {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// Settings for the background poller that feeds the timeline view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollConfig {
    /// Delay between two aggregate calls.
    pub interval: Duration,
    /// Upper bound on one whole aggregate call. Fetches still running when it
    /// expires are abandoned, not killed.
    pub aggregate_timeout: Duration,
    /// Options shared by every fetch in one aggregate call.
    pub options: FetchOptions,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            aggregate_timeout: DEFAULT_REQUEST_TIMEOUT * 2,
            options: FetchOptions::default(),
        }
    }
}
