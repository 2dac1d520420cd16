//! Domain model for the tracker
//!
//! # Components
//!
//! - `CredentialSet`: immutable bundle of session cookies for one site identity
//! - `Resource`: a normalized, classified URL that can be tracked
//! - `Subscription`: one subscriber's interest in one resource, plus its cursor
//! - `Post` / `Topic`: content units extracted from thread and forum pages

mod content;
mod credentials;
mod resource;
mod subscription;

// Re-export main types
pub use content::{Post, Topic};
pub use credentials::CredentialSet;
pub use resource::Resource;
pub use subscription::{SubscriberId, Subscription};
