//! Configuration module for Forum-Tracker
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use forum_tracker::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("tracker.toml")).unwrap();
//! println!("Polling every {}s", config.tracker.poll_interval_secs);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CredentialEntry, HttpConfig, ReplyConfig, SiteConfig, StorageConfig, TrackerConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
