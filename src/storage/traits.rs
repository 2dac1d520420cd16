//! Storage traits and error types
//!
//! This module defines the trait interface for subscription storage backends
//! and associated error types.

use crate::model::{SubscriberId, Subscription};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Corrupt subscription row {id}: {reason}")]
    CorruptRow { id: i64, reason: String },

    #[error("Storage lock poisoned")]
    Poisoned,

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for subscription storage backends
///
/// Rows are keyed by (subscriber, resource url). No operation spans more
/// than one row, so implementations only need per-statement atomicity.
pub trait SubscriptionStore {
    // ===== Subscription Management =====

    /// Adds a subscription with an unset cursor
    ///
    /// # Returns
    ///
    /// `true` if a new row was inserted, `false` if the subscriber already
    /// tracked this resource (the existing cursor is left untouched)
    fn add_subscription(&mut self, subscription: &Subscription) -> StorageResult<bool>;

    /// Removes a subscription
    ///
    /// Returns `true` if a row was deleted.
    fn remove_subscription(&mut self, subscriber: SubscriberId, url: &str)
        -> StorageResult<bool>;

    /// Gets a single subscription
    fn get_subscription(
        &self,
        subscriber: SubscriberId,
        url: &str,
    ) -> StorageResult<Option<Subscription>>;

    /// Lists every subscription of one subscriber, oldest first
    fn list_for_subscriber(&self, subscriber: SubscriberId) -> StorageResult<Vec<Subscription>>;

    /// Lists every subscription in the store
    ///
    /// Rows that cannot be decoded are left out rather than failing the list.
    fn list_all(&self) -> StorageResult<Vec<Subscription>>;

    // ===== Cursor Management =====

    /// Overwrites the cursor of one subscription
    ///
    /// Returns `false` when the subscription no longer exists (it was
    /// untracked while a check was in flight).
    fn update_cursor(
        &mut self,
        subscriber: SubscriberId,
        url: &str,
        cursor: &str,
    ) -> StorageResult<bool>;

    // ===== Statistics =====

    /// Counts all subscriptions
    fn count_subscriptions(&self) -> StorageResult<u64>;
}
