//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the
//! `SubscriptionStore` trait.

use crate::model::{Resource, SubscriberId, Subscription};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{StorageError, StorageResult, SubscriptionStore};
use crate::url::ResourceKind;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use url::Url;

const SELECT_COLUMNS: &str =
    "SELECT id, subscriber_id, resource_url, resource_kind, cursor FROM subscriptions";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

/// A subscription row before its URL and kind are validated
struct RawRow {
    id: i64,
    subscriber_id: i64,
    url: String,
    kind: String,
    cursor: Option<String>,
}

impl RawRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            subscriber_id: row.get(1)?,
            url: row.get(2)?,
            kind: row.get(3)?,
            cursor: row.get(4)?,
        })
    }

    fn into_subscription(self) -> StorageResult<Subscription> {
        let url = Url::parse(&self.url).map_err(|e| StorageError::CorruptRow {
            id: self.id,
            reason: format!("bad url '{}': {}", self.url, e),
        })?;
        let kind = ResourceKind::from_db_string(&self.kind).ok_or_else(|| {
            StorageError::CorruptRow {
                id: self.id,
                reason: format!("bad resource kind '{}'", self.kind),
            }
        })?;

        Ok(Subscription {
            subscriber: SubscriberId(self.subscriber_id),
            resource: Resource::with_kind(url, kind),
            cursor: self.cursor,
        })
    }
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Runs a listing query, leaving out rows that no longer decode
    ///
    /// A corrupt row is logged with its id and skipped so the remaining
    /// subscriptions stay visible to the scheduler and the command layer.
    fn query_subscriptions<P: rusqlite::Params>(
        &self,
        sql: &str,
        params: P,
    ) -> StorageResult<Vec<Subscription>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map(params, RawRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        let subscriptions = rows
            .into_iter()
            .filter_map(|row| match row.into_subscription() {
                Ok(sub) => Some(sub),
                Err(e) => {
                    tracing::warn!("Skipping subscription: {}", e);
                    None
                }
            })
            .collect();
        Ok(subscriptions)
    }
}

impl SubscriptionStore for SqliteStorage {
    // ===== Subscription Management =====

    fn add_subscription(&mut self, subscription: &Subscription) -> StorageResult<bool> {
        let now = Utc::now().to_rfc3339();
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO subscriptions
                (subscriber_id, resource_url, resource_kind, cursor, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![
                subscription.subscriber.0,
                subscription.resource.key(),
                subscription.resource.kind().to_db_string(),
                subscription.cursor,
                now,
            ],
        )?;
        Ok(inserted > 0)
    }

    fn remove_subscription(
        &mut self,
        subscriber: SubscriberId,
        url: &str,
    ) -> StorageResult<bool> {
        let deleted = self.conn.execute(
            "DELETE FROM subscriptions WHERE subscriber_id = ?1 AND resource_url = ?2",
            params![subscriber.0, url],
        )?;
        Ok(deleted > 0)
    }

    fn get_subscription(
        &self,
        subscriber: SubscriberId,
        url: &str,
    ) -> StorageResult<Option<Subscription>> {
        let sql = format!(
            "{} WHERE subscriber_id = ?1 AND resource_url = ?2",
            SELECT_COLUMNS
        );
        let row = self
            .conn
            .query_row(&sql, params![subscriber.0, url], RawRow::from_row)
            .optional()?;

        row.map(RawRow::into_subscription).transpose()
    }

    fn list_for_subscriber(&self, subscriber: SubscriberId) -> StorageResult<Vec<Subscription>> {
        let sql = format!("{} WHERE subscriber_id = ?1 ORDER BY id", SELECT_COLUMNS);
        self.query_subscriptions(&sql, params![subscriber.0])
    }

    fn list_all(&self) -> StorageResult<Vec<Subscription>> {
        let sql = format!("{} ORDER BY id", SELECT_COLUMNS);
        self.query_subscriptions(&sql, [])
    }

    // ===== Cursor Management =====

    fn update_cursor(
        &mut self,
        subscriber: SubscriberId,
        url: &str,
        cursor: &str,
    ) -> StorageResult<bool> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE subscriptions SET cursor = ?1, updated_at = ?2
             WHERE subscriber_id = ?3 AND resource_url = ?4",
            params![cursor, now, subscriber.0, url],
        )?;
        Ok(updated > 0)
    }

    // ===== Statistics =====

    fn count_subscriptions(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM subscriptions", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}
