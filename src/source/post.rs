//! The core data type shared by every source.
//!
//! `Post` is a single timestamped entry from one account. The fetcher
//! converts the API's wire shape into `Post`s so that merging, sorting and
//! rendering never need to know where a post came from.

use chrono::{DateTime, Utc};
use std::cmp::Ordering;

use super::SourceId;

/// A single post, normalised from the API response.
///
/// ## Sorting
///
/// `Post` deliberately has no [`Ord`] impl: two different posts can share a
/// timestamp, so ordering is done with [`newest_first`] through a stable
/// sort instead.
#[derive(Debug, Clone, PartialEq)]
pub struct Post {
    /// Unique post identifier, also used for de-duplication.
    pub id: String,

    /// Account the post was fetched for.
    pub owner: SourceId,

    /// Username of the owner, when the API included it.
    pub owner_name: Option<String>,

    /// Image references at the available resolutions.
    pub images: PostImages,

    /// Caption text, if any.
    pub caption: Option<String>,

    pub tags: Vec<String>,

    pub location: Option<Location>,

    /// Permalink to the post's web page.
    pub link: Option<String>,

    /// Creation time; the merge key.
    pub created: DateTime<Utc>,
}

impl Post {
    /// Image reference to display: standard resolution, falling back to
    /// the smaller renditions.
    pub fn display_url(&self) -> Option<&str> {
        [
            &self.images.standard_resolution,
            &self.images.low_resolution,
            &self.images.thumbnail,
        ]
        .into_iter()
        .find_map(|image| image.as_ref().map(|i| i.url.as_str()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostImages {
    pub thumbnail: Option<ImageUrl>,
    pub low_resolution: Option<ImageUrl>,
    pub standard_resolution: Option<ImageUrl>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUrl {
    pub url: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    pub name: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Comparator for reverse-chronological order: newer posts first.
///
/// Posts with equal timestamps compare [`Ordering::Equal`]; used with a
/// stable sort this keeps them in the order they were received.
pub fn newest_first(a: &Post, b: &Post) -> Ordering {
    b.created.cmp(&a.created)
}
