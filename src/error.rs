//! Error types shared by the resolver, the fetcher and the aggregator.
//!
//! Only [`Error::InvalidArgument`] is ever fatal to a whole aggregate call.
//! Every other variant describes something that went wrong for a single
//! source and ends up in that source's entry of the failure record.

use thiserror::Error;

/// Result alias used throughout the library.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Caller misuse: an empty source set, an empty search query, etc.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A handle lookup found no matching account.
    #[error("not found: {0}")]
    NotFound(String),

    /// The request could not complete (connect, TLS, timeout, body read).
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The response body did not have the expected shape.
    #[error("decode error: {0}")]
    Decode(String),

    /// The API answered with a non-success status.
    ///
    /// `code`, `kind` and `message` come from the response's `meta` block
    /// when the body carries one.
    #[error("remote API error: code {code}, type {kind}: {message}")]
    RemoteApi {
        code: u16,
        kind: String,
        message: String,
    },

    /// A fetch task panicked before it could report an outcome.
    #[error("fetch task aborted: {0}")]
    TaskAborted(String),
}

impl Error {
    /// Whether this error should fail an entire aggregate call rather than
    /// be recorded against one source.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::InvalidArgument(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Decode(err.to_string())
    }
}
