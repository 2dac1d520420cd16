//! URL handling module for Forum-Tracker
//!
//! This module provides URL normalization, resource classification (thread,
//! forum or neither), thread id extraction, and site host matching.

mod host;
mod ids;
mod normalize;

// Re-export main functions
pub use host::{extract_host, is_same_site};
pub use ids::{extract_thread_id, first_number};
pub use normalize::normalize_url;

use std::fmt;
use url::Url;

/// What a tracked URL points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// A single discussion thread - new posts are announced
    Thread,
    /// A sub-forum listing - new topics are announced
    Forum,
    /// Anything else - never scheduled
    Unknown,
}

impl ResourceKind {
    /// Returns true if resources of this kind can be polled
    pub fn is_trackable(&self) -> bool {
        matches!(self, Self::Thread | Self::Forum)
    }

    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Thread => "thread",
            Self::Forum => "forum",
            Self::Unknown => "unknown",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "thread" => Some(Self::Thread),
            "forum" => Some(Self::Forum),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_string())
    }
}

/// Path/query fragments that mark a thread URL, checked before forum ones
const THREAD_MARKERS: &[&str] = &["/threads/", "?threads/", "threads=", "/posts/"];

/// Path/query fragments that mark a sub-forum listing
const FORUM_MARKERS: &[&str] = &["/forums/", "?forums/", "forums="];

/// Classifies a URL by the shape of its path and query
///
/// Both the pretty-URL layout (`/threads/slug.123/`) and the query-string
/// layout (`/index.php?threads/slug.123/`, `?threads=123`) are recognized.
/// Thread markers win over forum markers, so a post permalink inside a forum
/// path still classifies as a thread.
///
/// # Examples
///
/// ```
/// use forum_tracker::url::{classify_resource, ResourceKind};
/// use url::Url;
///
/// let url = Url::parse("https://forum.example.com/index.php?threads/hello.123/").unwrap();
/// assert_eq!(classify_resource(&url), ResourceKind::Thread);
///
/// let url = Url::parse("https://forum.example.com/forums/news.7/").unwrap();
/// assert_eq!(classify_resource(&url), ResourceKind::Forum);
/// ```
pub fn classify_resource(url: &Url) -> ResourceKind {
    let lowered = url.as_str().to_lowercase();

    if THREAD_MARKERS.iter().any(|m| lowered.contains(m)) {
        return ResourceKind::Thread;
    }

    if FORUM_MARKERS.iter().any(|m| lowered.contains(m)) {
        return ResourceKind::Forum;
    }

    ResourceKind::Unknown
}
