//! Storage module for persisting subscriptions
//!
//! This module handles all database operations for the tracker, including:
//! - SQLite database initialization and schema management
//! - Subscription creation and removal
//! - Per-subscriber cursor persistence

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{StorageError, StorageResult, SubscriptionStore};

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// A subscription store shared between the scheduler, the reply path and
/// the command facade
pub type SharedStore = Arc<Mutex<dyn SubscriptionStore + Send>>;

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(StorageError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> StorageResult<SqliteStorage> {
    SqliteStorage::new(path)
}

/// Wraps a store for sharing across tasks
pub fn shared<S: SubscriptionStore + Send + 'static>(store: S) -> SharedStore {
    Arc::new(Mutex::new(store))
}

/// Locks a shared store, mapping poisoning to a storage error
pub fn lock(store: &SharedStore) -> StorageResult<MutexGuard<'_, dyn SubscriptionStore + Send + 'static>> {
    store.lock().map_err(|_| StorageError::Poisoned)
}
