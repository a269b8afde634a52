//! SQLite database connection management.
//!
//! Provides a connection pool to the SQLite database with WAL mode enabled.
//! The database file and its parent directories are created automatically
//! if they don't exist.
//!
//! The pool is shared by the whole process, but a connection is only ever
//! held by one request at a time: [`SqliteStore`](crate::sqlite_store::SqliteStore)
//! checks one out lazily and returns it when the request's store is dropped.
//! SQLite itself serializes writers.

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

use crate::config::Config;

/// Create a connection pool to the configured SQLite database.
///
/// # Errors
///
/// Returns an error if the database cannot be created or connected to.
pub async fn connect(config: &Config) -> Result<SqlitePool> {
    let db_path = &config.db.path;

    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.db.max_connections)
        .connect_with(options)
        .await?;

    tracing::debug!(path = %db_path.display(), "opened database pool");
    Ok(pool)
}
