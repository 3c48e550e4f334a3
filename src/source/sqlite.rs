use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OpenFlags};
use tracing::{info, warn};

use super::{warn_missing_dates, MessageSource, SourceError};
use crate::record::MessageRecord;

/// Reads a local message cache database:
///
/// ```sql
/// CREATE TABLE messages (
///     folder       TEXT NOT NULL,
///     sender_name  TEXT,
///     sender_email TEXT,
///     subject      TEXT,
///     received_at  INTEGER  -- Unix seconds
/// );
/// ```
///
/// Mail clients usually hold the cache open, so it is copied to a temporary
/// file and the copy is queried.
pub struct CacheSource {
    path: Option<PathBuf>,
    temp_path: Option<PathBuf>,
}

impl CacheSource {
    pub fn new(path: Option<PathBuf>, temp_path: Option<PathBuf>) -> Self {
        Self { path, temp_path }
    }
}

impl MessageSource for CacheSource {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn fetch(&self, folder: &str, limit: usize) -> Result<Vec<MessageRecord>, SourceError> {
        let cache_path = self.path.as_deref().ok_or_else(|| {
            SourceError::Unavailable("no cache database configured (use --cache)".to_string())
        })?;

        let temp_cache_path = copy_cache_database(cache_path, self.temp_path.as_deref())?;

        let result = Connection::open_with_flags(&temp_cache_path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .map_err(SourceError::from)
            .and_then(|conn| {
                info!(action = "connect", component = "cache_database", "Connected to database");
                query_messages(&conn, folder, limit, Utc::now())
            });

        if let Err(e) = fs::remove_file(&temp_cache_path) {
            warn!(action = "cleanup", component = "cache_database", error = %e, "Failed to remove temporary file");
        }

        result
    }
}

pub fn copy_cache_database(cache_path: &Path, temp_path: Option<&Path>) -> Result<PathBuf, SourceError> {
    let start_time = Instant::now();
    info!(action = "start", component = "database_copy", "Copying message cache database");

    let temp_path = temp_path
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| env::temp_dir().join(format!("inboxee_cache_{}.db", std::process::id())));

    info!(action = "copy", component = "database_copy", source = ?cache_path, destination = ?temp_path, "Database copy paths");

    if !cache_path.exists() {
        return Err(SourceError::Unavailable(format!(
            "cache database not found at {:?}",
            cache_path
        )));
    }

    fs::copy(cache_path, &temp_path)?;

    info!(action = "complete", component = "database_copy", duration_ms = start_time.elapsed().as_millis(), "Database copy completed");
    Ok(temp_path)
}

pub fn query_messages(
    conn: &Connection,
    folder: &str,
    limit: usize,
    fetched_at: DateTime<Utc>,
) -> Result<Vec<MessageRecord>, SourceError> {
    let start_time = Instant::now();

    let mut stmt = conn.prepare(
        r#"
        SELECT sender_name, sender_email, subject, received_at
        FROM messages
        WHERE lower(folder) = lower(?1)
        ORDER BY received_at IS NULL, received_at DESC
        LIMIT ?2
        "#,
    )?;

    let mut rows = stmt.query(params![folder, limit as i64])?;
    let mut records = Vec::new();
    let mut missing_dates = 0;

    while let Some(row) = rows.next()? {
        let name: Option<String> = row.get(0)?;
        let email: Option<String> = row.get(1)?;
        let subject: Option<String> = row.get(2)?;
        let received_at = row
            .get::<_, Option<i64>>(3)?
            .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0));
        if received_at.is_none() {
            missing_dates += 1;
        }

        records.push(MessageRecord::new(
            name.as_deref(),
            email.as_deref(),
            subject.as_deref(),
            received_at.unwrap_or(fetched_at),
        ));
    }

    warn_missing_dates("sqlite", missing_dates);
    info!(
        action = "query",
        component = "cache_database",
        record_count = records.len(),
        duration_ms = start_time.elapsed().as_millis(),
        "Queried cached messages"
    );
    Ok(records)
}
