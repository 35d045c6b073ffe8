//! Command-line interface.
//!
//! Flags that every command shares live in [`GlobalArgs`]; most of them can
//! also come from `FEEDMUX_*` environment variables. The interactive
//! timeline is driven from `main.rs`; every other command is a one-shot
//! request handled here.

use std::num::NonZeroU32;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use feedmux::aggregate::resolve_handles;
use feedmux::config::{ClientConfig, PollConfig, DEFAULT_API_URL, DEFAULT_OAUTH_URL};
use feedmux::source::{
    ApiClient, FeedPage, FetchOptions, OAuthApp, Post, SourceId, SourceResolver, StaticToken,
};
use feedmux::{AggregateResult, Aggregator};

#[derive(Parser)]
#[command(
    name = "feedmux",
    version,
    about = "Merge the recent posts of several accounts into one live timeline",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[command(flatten)]
    pub global: GlobalArgs,
}

#[derive(Args, Clone)]
pub struct GlobalArgs {
    /// API access token
    #[arg(long, env = "FEEDMUX_ACCESS_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,

    /// API base URL
    #[arg(long, env = "FEEDMUX_API_URL", global = true, default_value = DEFAULT_API_URL)]
    pub api_url: String,

    /// Per-request timeout in seconds (at least 1)
    #[arg(long, global = true, default_value_t = 30)]
    pub request_timeout: u64,

    /// Append logs to this file
    #[arg(long, env = "FEEDMUX_LOG_FILE", global = true)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show the merged timeline of several accounts
    Timeline(TimelineArgs),

    /// Print one page of a single account's posts
    Posts {
        /// Username of the account
        handle: String,

        /// Number of posts to request
        #[arg(short, long)]
        count: Option<NonZeroU32>,

        /// Only return posts older than this post id
        #[arg(long)]
        max_id: Option<String>,
    },

    /// Search accounts by name
    Search {
        query: String,

        /// Maximum number of hits
        #[arg(short, long)]
        count: Option<NonZeroU32>,
    },

    /// Show an account's profile
    Profile { handle: String },

    /// List the accounts someone follows
    Follows { handle: String },

    /// Print one page of your own home feed
    Feed {
        /// Number of posts to request
        #[arg(short, long)]
        count: Option<NonZeroU32>,

        /// Only return posts older than this post id
        #[arg(long)]
        max_id: Option<String>,
    },

    /// Print one page of the posts you liked
    Liked {
        /// Number of posts to request
        #[arg(short, long)]
        count: Option<NonZeroU32>,

        /// Continue from this cursor of a previous page
        #[arg(long)]
        max_like_id: Option<String>,
    },

    /// Print the OAuth login URL
    AuthUrl {
        #[arg(long, env = "FEEDMUX_CLIENT_ID")]
        client_id: String,

        #[arg(long, env = "FEEDMUX_REDIRECT_URL")]
        redirect_url: String,

        #[arg(long, default_value = DEFAULT_OAUTH_URL)]
        oauth_url: String,
    },

    /// Exchange an OAuth code for an access token
    Exchange {
        #[arg(long, env = "FEEDMUX_CLIENT_ID")]
        client_id: String,

        #[arg(long, env = "FEEDMUX_CLIENT_SECRET", hide_env_values = true)]
        client_secret: String,

        #[arg(long, env = "FEEDMUX_REDIRECT_URL")]
        redirect_url: String,

        /// The `code` query parameter from the login redirect
        #[arg(long)]
        code: String,

        #[arg(long, default_value = DEFAULT_OAUTH_URL)]
        oauth_url: String,
    },
}

#[derive(Args, Clone)]
pub struct TimelineArgs {
    /// Usernames to follow
    pub handles: Vec<String>,

    /// Account ids to follow without a lookup
    #[arg(long = "id")]
    pub ids: Vec<SourceId>,

    /// Also show every account this user follows
    #[arg(long, value_name = "HANDLE")]
    pub following: Option<String>,

    /// Posts to request per account
    #[arg(short, long)]
    pub count: Option<NonZeroU32>,

    /// Seconds between refreshes
    #[arg(long, default_value_t = 60)]
    pub interval: u64,

    /// Give up on one refresh after this many seconds
    #[arg(long, default_value_t = 60)]
    pub timeout: u64,

    /// Fetch once, print the timeline and exit
    #[arg(long)]
    pub once: bool,
}

impl GlobalArgs {
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::default()
            .with_base_url(self.api_url.clone())
            .with_request_timeout(self.request_timeout())
    }

    /// A zero timeout would fail every request.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout.max(1))
    }

    /// Build the API client. Fails when no token was given.
    pub fn api_client(&self) -> Result<ApiClient> {
        let token = self
            .token
            .clone()
            .context("an access token is required (--token or FEEDMUX_ACCESS_TOKEN)")?;
        let client = ApiClient::new(&self.client_config(), Arc::new(StaticToken::new(token)))?;
        Ok(client)
    }
}

impl TimelineArgs {
    /// Whether any account was named at all.
    pub fn has_sources(&self) -> bool {
        !self.handles.is_empty() || !self.ids.is_empty() || self.following.is_some()
    }

    pub fn poll_config(&self) -> PollConfig {
        let mut options = FetchOptions::new();
        if let Some(count) = self.count {
            options = options.with_count(count);
        }
        PollConfig {
            interval: Duration::from_secs(self.interval.max(1)),
            aggregate_timeout: Duration::from_secs(self.timeout.max(1)),
            options,
        }
    }
}

/// Run every command except the interactive timeline.
pub async fn run(command: Command, global: &GlobalArgs) -> Result<()> {
    match command {
        Command::Timeline(args) => run_timeline_once(args, global).await,
        Command::Posts {
            handle,
            count,
            max_id,
        } => {
            let client = global.api_client()?;
            let source = client.resolve(&handle).await?;
            let mut options = FetchOptions::new();
            if let Some(count) = count {
                options = options.with_count(count);
            }
            if let Some(max_id) = max_id {
                options = options.with_max_id(max_id);
            }

            let page = client.fetch_page(&source, &options).await?;
            print_page(&page, Some(handle.as_str()), "--max-id");
            Ok(())
        }
        Command::Feed { count, max_id } => {
            let mut options = FetchOptions::new();
            if let Some(count) = count {
                options = options.with_count(count);
            }
            if let Some(max_id) = max_id {
                options = options.with_max_id(max_id);
            }
            let page = global.api_client()?.self_feed(&options).await?;
            print_page(&page, None, "--max-id");
            Ok(())
        }
        Command::Liked { count, max_like_id } => {
            let page = global
                .api_client()?
                .liked_posts(count, max_like_id.as_deref())
                .await?;
            print_page(&page, None, "--max-like-id");
            Ok(())
        }
        Command::Follows { handle } => {
            let client = global.api_client()?;
            let source = client.resolve(&handle).await?;
            let users = client.follows(&source).await?;
            if users.is_empty() {
                println!("@{handle} follows nobody");
            }
            for user in users {
                println!(
                    "{:<12} @{:<24} {}",
                    user.id,
                    user.username,
                    user.full_name.unwrap_or_default()
                );
            }
            Ok(())
        }
        Command::Search { query, count } => {
            let users = global.api_client()?.search_users(&query, count).await?;
            if users.is_empty() {
                println!("no users found");
            }
            for user in users {
                println!(
                    "{:<12} @{:<24} {}",
                    user.id,
                    user.username,
                    user.full_name.unwrap_or_default()
                );
            }
            Ok(())
        }
        Command::Profile { handle } => {
            let client = global.api_client()?;
            let source = client.resolve(&handle).await?;
            let profile = client.user_profile(&source).await?;
            println!("@{} ({})", profile.username, profile.id);
            if let Some(name) = profile.full_name.filter(|n| !n.is_empty()) {
                println!("{name}");
            }
            if let Some(bio) = profile.bio.filter(|b| !b.is_empty()) {
                println!("{bio}");
            }
            if let Some(website) = profile.website.filter(|w| !w.is_empty()) {
                println!("{website}");
            }
            println!(
                "{} posts  {} followers  {} following",
                profile.counts.media, profile.counts.followed_by, profile.counts.follows
            );
            Ok(())
        }
        Command::AuthUrl {
            client_id,
            redirect_url,
            oauth_url,
        } => {
            let app = OAuthApp::new(client_id, String::new(), redirect_url).with_oauth_base(oauth_url);
            println!("{}", app.authorization_url()?);
            Ok(())
        }
        Command::Exchange {
            client_id,
            client_secret,
            redirect_url,
            code,
            oauth_url,
        } => {
            let app = OAuthApp::new(client_id, client_secret, redirect_url).with_oauth_base(oauth_url);
            let http = reqwest::Client::builder()
                .timeout(global.request_timeout())
                .build()?;
            let token = app.exchange_code(&http, &code).await?;
            println!("{token}");
            Ok(())
        }
    }
}

/// `timeline --once`: one aggregate call, printed to stdout.
async fn run_timeline_once(args: TimelineArgs, global: &GlobalArgs) -> Result<()> {
    let client = Arc::new(global.api_client()?);
    let config = args.poll_config();

    let mut sources = args.ids.clone();
    let mut labels: Vec<(SourceId, String)> = Vec::new();
    if !args.handles.is_empty() {
        let resolution = resolve_handles(client.clone(), &args.handles).await;
        for (handle, error) in &resolution.unresolved {
            eprintln!("@{handle}: {error}");
        }
        sources.extend(resolution.source_ids());
        labels.extend(resolution.resolved.into_iter().map(|(h, id)| (id, h)));
    }
    if let Some(handle) = &args.following {
        let followed = followed_accounts(&client, handle).await?;
        sources.extend(followed.iter().map(|(_, id)| id.clone()));
        labels.extend(followed.into_iter().map(|(name, id)| (id, name)));
    }

    let aggregator = Aggregator::new(client);
    let result = tokio::time::timeout(
        config.aggregate_timeout,
        aggregator.aggregate(&sources, &config.options),
    )
    .await
    .context("timed out waiting for the timeline")??;

    print_timeline(&result, &labels);
    if result.all_failed() {
        anyhow::bail!("all {} account(s) failed", result.source_count());
    }
    Ok(())
}

/// Accounts that `handle` follows, as `(username, id)` pairs.
pub async fn followed_accounts(client: &ApiClient, handle: &str) -> Result<Vec<(String, SourceId)>> {
    let source = client
        .resolve(handle)
        .await
        .with_context(|| format!("cannot look up @{handle}"))?;
    let users = client
        .follows(&source)
        .await
        .with_context(|| format!("cannot list the accounts @{handle} follows"))?;

    users
        .into_iter()
        .map(|user| -> Result<(String, SourceId)> {
            let id = SourceId::new(user.id)?;
            Ok((user.username, id))
        })
        .collect()
}

/// Print a page of posts and how to ask for the next one.
///
/// Without a fixed `label` each post is labelled with its owner.
fn print_page(page: &FeedPage, label: Option<&str>, cursor_flag: &str) {
    for post in &page.posts {
        let label = label
            .or(post.owner_name.as_deref())
            .unwrap_or(post.owner.as_str());
        println!("{}", post_line(post, label));
    }
    match &page.next_max_id {
        Some(cursor) => println!("\nolder posts: {cursor_flag} {cursor}"),
        None => println!("\nno older posts"),
    }
}

fn label_for<'a>(labels: &'a [(SourceId, String)], post: &'a Post) -> &'a str {
    labels
        .iter()
        .find(|(id, _)| *id == post.owner)
        .map(|(_, handle)| handle.as_str())
        .or(post.owner_name.as_deref())
        .unwrap_or(post.owner.as_str())
}

fn print_timeline(result: &AggregateResult, labels: &[(SourceId, String)]) {
    for post in &result.posts {
        println!("{}", post_line(post, label_for(labels, post)));
    }
    for (source, error) in &result.failures {
        let label = labels
            .iter()
            .find(|(id, _)| id == source)
            .map(|(_, h)| h.as_str())
            .unwrap_or(source.as_str());
        eprintln!("@{label}: {error}");
    }
}

/// One line of plain-text output for a post.
pub fn post_line(post: &Post, label: &str) -> String {
    let caption = post
        .caption
        .as_deref()
        .and_then(|c| c.lines().next())
        .unwrap_or("");
    format!(
        "{}  @{:<16} {:<40} {}",
        post.created.format("%Y-%m-%d %H:%M"),
        label,
        caption,
        post.display_url().unwrap_or("-")
    )
}
