//! Database schema definitions
//!
//! This module contains the SQL schema for the subscription database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One row per (subscriber, resource); cursor is NULL until the first check
CREATE TABLE IF NOT EXISTS subscriptions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    subscriber_id INTEGER NOT NULL,
    resource_url TEXT NOT NULL,
    resource_kind TEXT NOT NULL,
    cursor TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE(subscriber_id, resource_url)
);

CREATE INDEX IF NOT EXISTS idx_subscriptions_url ON subscriptions(resource_url);
CREATE INDEX IF NOT EXISTS idx_subscriptions_subscriber ON subscriptions(subscriber_id);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
