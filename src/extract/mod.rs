//! Content extraction from server-rendered forum pages
//!
//! Both extractors are pure: the same HTML and page URL always produce the
//! same records. Every field is read through an ordered cascade of probes
//! covering the classic and current template generations; a field nothing
//! matches degrades to a placeholder instead of failing the record.

mod candidates;
mod posts;
mod topics;

pub use candidates::{collapsed_text, resolve_link, Cascade, Containers, Probe};
pub use posts::extract_posts;
pub use topics::extract_topics;

/// Author shown when no author element is present
pub const PLACEHOLDER_AUTHOR: &str = "Unknown";

/// Timestamp shown when no date element is present
pub const PLACEHOLDER_TIMESTAMP: &str = "?";

/// Body shown when a post has no readable text
pub const PLACEHOLDER_BODY: &str = "(no text)";
