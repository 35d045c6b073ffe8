use std::collections::{HashMap, HashSet};

use ratatui::widgets::ListState;

use feedmux::aggregate::merge;
use feedmux::source::{Post, SourceId};
use feedmux::{AggregateResult, Resolution};

use crate::poll::PollMsg;

pub struct App {
    /// De-duplicated, reverse-chronological posts.
    pub posts: Vec<Post>,
    /// Post ids already in `posts`.
    seen: HashSet<String>,
    /// Handle the user typed for each resolved account.
    handles: HashMap<SourceId, String>,
    /// Handles that could not be resolved, with the reason.
    pub unresolved: Vec<String>,
    /// Accounts that failed on the last refresh, with the reason.
    pub failures: Vec<String>,
    /// List selection state for scrolling.
    pub list_state: ListState,
    /// Whether the user has requested to quit.
    pub quit: bool,
    /// Whether the user has asked for an immediate refresh.
    refresh_requested: bool,
    /// Last poll status message.
    pub status: String,
}

impl App {
    pub fn new() -> Self {
        Self {
            posts: Vec::new(),
            seen: HashSet::new(),
            handles: HashMap::new(),
            unresolved: Vec::new(),
            failures: Vec::new(),
            list_state: ListState::default(),
            quit: false,
            refresh_requested: false,
            status: "Starting…".into(),
        }
    }

    /// Apply one message from the poller.
    pub fn apply(&mut self, msg: PollMsg) {
        match msg {
            PollMsg::Resolved(resolution) => self.apply_resolution(resolution),
            PollMsg::Timeline(result) => self.apply_timeline(result),
            PollMsg::Error(e) => self.status = format!("Error: {e}"),
        }
    }

    fn apply_resolution(&mut self, resolution: Resolution) {
        self.unresolved = resolution
            .unresolved
            .iter()
            .map(|(handle, error)| format!("@{handle}: {error}"))
            .collect();
        let found = resolution.resolved.len();
        self.handles
            .extend(resolution.resolved.into_iter().map(|(handle, id)| (id, handle)));
        self.status = format!("Resolved {found} account(s), fetching…");
    }

    fn apply_timeline(&mut self, result: AggregateResult) {
        let total = result.source_count();
        let ok = result.succeeded.len();

        self.failures = result
            .failures
            .iter()
            .map(|(source, error)| format!("@{}: {error}", self.label(source)))
            .collect();

        let fetched = result.posts.len();
        self.merge_posts(result.posts);

        self.status = if ok == 0 {
            format!("All {total} account(s) failed")
        } else {
            format!("Fetched {fetched} posts from {ok}/{total} accounts")
        };
    }

    /// Merge newly-fetched posts, de-duplicate by id, and re-sort.
    ///
    /// Posts already shown keep their position among equal timestamps.
    pub fn merge_posts(&mut self, fresh: Vec<Post>) {
        let fresh: Vec<Post> = fresh
            .into_iter()
            .filter(|post| self.seen.insert(post.id.clone()))
            .collect();
        if fresh.is_empty() {
            return;
        }
        let existing = std::mem::take(&mut self.posts);
        self.posts = merge(vec![existing, fresh]);
    }

    /// Display name for an account: the handle the user gave, else the id.
    pub fn label<'a>(&'a self, source: &'a SourceId) -> &'a str {
        self.handles
            .get(source)
            .map(String::as_str)
            .unwrap_or(source.as_str())
    }

    /// Display name for a post's owner.
    pub fn owner_label<'a>(&'a self, post: &'a Post) -> &'a str {
        match self.handles.get(&post.owner) {
            Some(handle) => handle.as_str(),
            None => post.owner_name.as_deref().unwrap_or(post.owner.as_str()),
        }
    }

    pub fn request_refresh(&mut self) {
        self.refresh_requested = true;
        self.status = "Refreshing…".into();
    }

    /// Returns and clears the pending refresh request.
    pub fn take_refresh_request(&mut self) -> bool {
        std::mem::take(&mut self.refresh_requested)
    }

    // -- navigation ----------------------------------------------------------

    pub fn select_next(&mut self) {
        if self.posts.is_empty() {
            return;
        }
        let i = match self.list_state.selected() {
            Some(i) => (i + 1).min(self.posts.len() - 1),
            None => 0,
        };
        self.list_state.select(Some(i));
    }

    pub fn select_previous(&mut self) {
        if self.posts.is_empty() {
            return;
        }
        let i = match self.list_state.selected() {
            Some(i) => i.saturating_sub(1),
            None => 0,
        };
        self.list_state.select(Some(i));
    }

    pub fn select_first(&mut self) {
        if !self.posts.is_empty() {
            self.list_state.select(Some(0));
        }
    }

    pub fn select_last(&mut self) {
        if !self.posts.is_empty() {
            self.list_state.select(Some(self.posts.len() - 1));
        }
    }
}
