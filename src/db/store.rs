//! SQLite database store implementation.

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Result as SqlResult, Row};
use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use super::models::*;

mod embedded {
    refinery::embed_migrations!("migrations");
}

/// Database error types.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Migration error: {0}")]
    Migration(String),
    #[error("Not found")]
    NotFound,
    #[error("{0}")]
    Invalid(String),
}

/// Thread-safe database store.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Create a new store with the given database path.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init()?;
        Ok(store)
    }

    /// Bring the schema up to date.
    fn init(&self) -> Result<(), DbError> {
        let mut conn = self.conn.lock().unwrap();
        let report = embedded::migrations::runner()
            .run(&mut *conn)
            .map_err(|e| DbError::Migration(e.to_string()))?;

        for migration in report.applied_migrations() {
            tracing::info!("Applied migration {}", migration);
        }

        Ok(())
    }

    /// Register a new target for `owner_id`.
    pub fn add_target(&self, url: &str, owner_id: &str) -> Result<Target, DbError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(DbError::Invalid("URL is required".to_string()));
        }

        let created_at = Utc::now();
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO targets (url, owner_id, created_at) VALUES (?1, ?2, ?3)",
            params![url, owner_id, format_db_time(created_at)],
        )?;

        Ok(Target {
            id: conn.last_insert_rowid(),
            url: url.to_string(),
            owner_id: owner_id.to_string(),
            created_at,
        })
    }

    /// Get every registered target, regardless of owner.
    pub fn get_targets(&self) -> Result<Vec<Target>, DbError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT id, url, owner_id, created_at FROM targets ORDER BY id")?;

        let targets = stmt
            .query_map([], target_from_row)?
            .collect::<SqlResult<Vec<_>>>()?;

        Ok(targets)
    }

    /// Get the targets belonging to one owner.
    pub fn get_targets_by_owner(&self, owner_id: &str) -> Result<Vec<Target>, DbError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, url, owner_id, created_at FROM targets WHERE owner_id = ?1 ORDER BY id",
        )?;

        let targets = stmt
            .query_map(params![owner_id], target_from_row)?
            .collect::<SqlResult<Vec<_>>>()?;

        Ok(targets)
    }

    /// Get a target by ID.
    pub fn get_target(&self, id: i64) -> Result<Target, DbError> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT id, url, owner_id, created_at FROM targets WHERE id = ?1",
            params![id],
            target_from_row,
        )
        .optional()?
        .ok_or(DbError::NotFound)
    }

    /// Delete a target, provided `owner_id` owns it.
    pub fn delete_target(&self, id: i64, owner_id: &str) -> Result<(), DbError> {
        let conn = self.conn.lock().unwrap();
        let deleted = conn.execute(
            "DELETE FROM targets WHERE id = ?1 AND owner_id = ?2",
            params![id, owner_id],
        )?;

        if deleted == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }
}

fn target_from_row(row: &Row<'_>) -> SqlResult<Target> {
    let created: String = row.get(3)?;
    Ok(Target {
        id: row.get(0)?,
        url: row.get(1)?,
        owner_id: row.get(2)?,
        created_at: parse_db_time(&created).unwrap_or_default(),
    })
}

fn format_db_time(dt: DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S%.9f").to_string()
}

/// Parse a datetime string from the database.
fn parse_db_time(s: &str) -> Option<DateTime<Utc>> {
    let formats = ["%Y-%m-%d %H:%M:%S%.9f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"];

    for fmt in &formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(DateTime::from_naive_utc_and_offset(dt, Utc));
        }
    }

    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
