//! Credentials.
//!
//! The fetcher attaches whatever [`TokenProvider`] hands it to every request
//! and never refreshes or inspects the token. [`OAuthApp`] covers the two
//! steps needed to obtain one: building the login URL and exchanging the
//! returned code.

use reqwest::Url;
use serde::Deserialize;
use tracing::debug;

use crate::config::DEFAULT_OAUTH_URL;
use crate::error::{Error, Result};

/// Supplies the bearer credential attached to outgoing requests.
pub trait TokenProvider: Send + Sync {
    fn access_token(&self) -> String;
}

/// A fixed access token, e.g. one passed on the command line.
#[derive(Clone)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl TokenProvider for StaticToken {
    fn access_token(&self) -> String {
        self.0.clone()
    }
}

// Never print the token itself.
impl std::fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StaticToken(..)")
    }
}

/// A registered OAuth application.
#[derive(Clone)]
pub struct OAuthApp {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: String,
    /// OAuth root, `DEFAULT_OAUTH_URL` unless overridden.
    pub oauth_base: String,
}

impl std::fmt::Debug for OAuthApp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthApp")
            .field("client_id", &self.client_id)
            .field("client_secret", &"..")
            .field("redirect_url", &self.redirect_url)
            .field("oauth_base", &self.oauth_base)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct AccessTokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct OAuthErrorBody {
    #[serde(default)]
    code: Option<u16>,
    #[serde(default)]
    error_type: Option<String>,
    #[serde(default)]
    error_message: Option<String>,
}

impl OAuthApp {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_url: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_url: redirect_url.into(),
            oauth_base: DEFAULT_OAUTH_URL.to_string(),
        }
    }

    pub fn with_oauth_base(mut self, base: impl Into<String>) -> Self {
        self.oauth_base = base.into();
        self
    }

    /// URL of the login page the user must visit to grant access.
    pub fn authorization_url(&self) -> Result<Url> {
        let endpoint = format!("{}/authorize/", self.oauth_base.trim_end_matches('/'));
        Url::parse_with_params(
            &endpoint,
            [
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", self.redirect_url.as_str()),
                ("response_type", "code"),
            ],
        )
        .map_err(|e| Error::InvalidArgument(format!("invalid OAuth base URL: {e}")))
    }

    /// Exchange the code from the login redirect for an access token.
    pub async fn exchange_code(&self, http: &reqwest::Client, code: &str) -> Result<String> {
        if code.is_empty() {
            return Err(Error::InvalidArgument("authorization code cannot be empty".into()));
        }

        let endpoint = format!("{}/access_token", self.oauth_base.trim_end_matches('/'));
        debug!(%endpoint, "exchanging authorization code");

        let response = http
            .post(&endpoint)
            .form(&[
                ("code", code),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("grant_type", "authorization_code"),
                ("redirect_uri", self.redirect_url.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let meta = serde_json::from_str::<OAuthErrorBody>(&body).ok();
            return Err(Error::RemoteApi {
                code: meta
                    .as_ref()
                    .and_then(|m| m.code)
                    .unwrap_or_else(|| status.as_u16()),
                kind: meta
                    .as_ref()
                    .and_then(|m| m.error_type.clone())
                    .unwrap_or_else(|| "OAuthException".into()),
                message: meta
                    .and_then(|m| m.error_message)
                    .unwrap_or_else(|| "failed to authenticate".into()),
            });
        }

        let token: AccessTokenResponse = serde_json::from_str(&body)?;
        Ok(token.access_token)
    }
}
