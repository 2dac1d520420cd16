//! Forum-Tracker: a polling watcher for server-rendered discussion boards
//!
//! This crate watches forum threads and sub-forums on behalf of many
//! subscribers, announces new posts and topics since each subscriber's last
//! observation, and can submit replies by emulating the site's web form.

pub mod config;
pub mod extract;
pub mod model;
pub mod notify;
pub mod reply;
pub mod storage;
pub mod tracker;
pub mod url;

use thiserror::Error;

/// Main error type for Forum-Tracker operations
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("Fetch failed: {0}")]
    Fetch(#[from] tracker::FetchFailure),

    #[error("Not a thread or forum URL: {url}")]
    UnknownResourceKind { url: String },

    #[error("URL {url} is not on the tracked site {expected_host}")]
    ForeignHost { url: String, expected_host: String },

    #[error("{url} is not a thread")]
    NotAThread { url: String },

    #[error("Reply failed: {0}")]
    Reply(#[from] reply::ReplyError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Background task failed: {0}")]
    Task(String),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid credential set '{label}': {reason}")]
    InvalidCredentials { label: String, reason: String },
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,

    #[error("Empty URL")]
    Empty,
}

/// Result type alias for Forum-Tracker operations
pub type Result<T> = std::result::Result<T, TrackerError>;


// Re-export commonly used types
pub use config::Config;
pub use model::{CredentialSet, Post, Resource, SubscriberId, Subscription, Topic};
pub use tracker::Tracker;
pub use url::{classify_resource, normalize_url, ResourceKind};
