//! Checkpoint store — one watermark row per ingestion process.
//!
//! The watermark marks the highest `(mtime, key)` pair already durably
//! processed. Callers must save it only after the corresponding data has
//! been committed; this module provides no locking or ordering of its own.

use chrono::Utc;
use log::info;
use rusqlite::params;

use super::{Database, DatabaseError};

/// Watermark schema version the current code expects. Stored rows with a
/// different version are ignored on load, which forces a full rescan.
pub const ETL_VERSION: i64 = 1;

/// High-water mark for one ingestion process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Watermark {
    pub etl_version: i64,
    pub last_mtime: i64,
    pub last_key: String,
}

impl Watermark {
    /// The cold-start watermark: everything is new.
    pub fn zero(etl_version: i64) -> Self {
        Self {
            etl_version,
            last_mtime: 0,
            last_key: String::new(),
        }
    }

    /// Strictly-after check: an item passes only if its `(mtime, key)` pair
    /// orders after the stored pair. Items at exactly the stored position
    /// are excluded — they were already processed.
    pub fn accepts(&self, mtime: i64, key: &str) -> bool {
        mtime > self.last_mtime || (mtime == self.last_mtime && key > self.last_key.as_str())
    }
}

/// Loads the watermark for a process, falling back to the zero value when no
/// row exists or the stored version differs from `expected_version`.
pub fn load(db: &Database, process: &str, expected_version: i64) -> Result<Watermark, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT etl_version, last_mtime, last_path FROM etl_state WHERE process = ?1",
        )?;
        let mut rows = stmt.query_map(params![process], |r| {
            Ok((
                r.get::<_, i64>(0)?,
                r.get::<_, i64>(1)?,
                r.get::<_, String>(2)?,
            ))
        })?;

        match rows.next() {
            Some(Ok((version, last_mtime, last_key))) if version == expected_version => {
                Ok(Watermark {
                    etl_version: version,
                    last_mtime,
                    last_key,
                })
            }
            Some(Ok((version, _, _))) => {
                info!(
                    "Watermark for '{}' has version {} (expected {}), forcing full rescan",
                    process, version, expected_version
                );
                Ok(Watermark::zero(expected_version))
            }
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(Watermark::zero(expected_version)),
        }
    })
}

/// Idempotent upsert of the watermark row for a process.
pub fn save(
    db: &Database,
    process: &str,
    etl_version: i64,
    last_mtime: i64,
    last_key: &str,
) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO etl_state (process, etl_version, last_mtime, last_path, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(process) DO UPDATE SET
               etl_version = excluded.etl_version,
               last_mtime  = excluded.last_mtime,
               last_path   = excluded.last_path,
               updated_at  = excluded.updated_at",
            params![
                process,
                etl_version,
                last_mtime,
                last_key,
                Utc::now().to_rfc3339()
            ],
        )?;
        Ok(())
    })
}
