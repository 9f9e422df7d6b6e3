//! Preference store
//!
//! A single key-value table backed by SQLite. The same pool is shared by
//! every execution context in the process, so an explicit "remember"
//! written by the control panel is visible to the next engine load.

mod prefs;

pub use prefs::{load_speed, remember_site, save_speed, site_key};

use std::path::Path;
use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};

use crate::error::{Error, Result};

/// Open (or create) the preference store and ensure its schema.
///
/// `path = None` selects an in-memory store, which only lives as long as
/// the pool.
pub async fn connect(path: Option<&Path>) -> Result<Pool<Sqlite>> {
    let pool = match path {
        Some(path) => {
            let options = SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true);
            SqlitePoolOptions::new()
                .max_connections(1)
                .connect_with(options)
                .await?
        }
        None => {
            SqlitePoolOptions::new()
                .max_connections(1)
                .connect("sqlite::memory:")
                .await?
        }
    };

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS prefs (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
        "#,
    )
    .execute(&pool)
    .await?;

    Ok(pool)
}

/// Generic preference getter.
///
/// Returns `None` if the key does not exist. Parses the stored value via
/// `FromStr`.
pub async fn get_pref<T: FromStr>(db: &Pool<Sqlite>, key: &str) -> Result<Option<T>> {
    let value: Option<String> = sqlx::query_scalar("SELECT value FROM prefs WHERE key = ?")
        .bind(key)
        .fetch_optional(db)
        .await?;

    match value {
        Some(s) => match s.parse::<T>() {
            Ok(parsed) => Ok(Some(parsed)),
            Err(_) => Err(Error::Config(format!(
                "Failed to parse preference '{}' value: {}",
                key, s
            ))),
        },
        None => Ok(None),
    }
}

/// Generic preference setter (insert or update).
pub async fn set_pref<T: ToString>(db: &Pool<Sqlite>, key: &str, value: T) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO prefs (key, value)
        VALUES (?, ?)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value
        "#,
    )
    .bind(key)
    .bind(value.to_string())
    .execute(db)
    .await?;

    Ok(())
}
