//! Location registry repository — candidate spreadsheet paths discovered by
//! the external registry scanner and consumed by the extractor.

use std::path::Path;

use rusqlite::params;
use sha2::{Digest, Sha256};

use super::{Database, DatabaseError};

/// A candidate workbook location. `updated_epoch` is the registry's
/// last-touched time in epoch seconds and drives the extractor's watermark.
#[derive(Debug, Clone)]
pub struct LocationRow {
    pub uid: String,
    pub job_name: String,
    pub filepath: String,
    pub updated_epoch: i64,
}

/// Builds a stable uid from the normalized file path (lowercased, `/`
/// separators): SHA-256, first 12 hex chars. The same file always hashes to
/// the same uid, whatever the mount spelling.
pub fn make_uid(filepath: &Path) -> String {
    let norm = crate::classify::normalize_path(filepath);
    let mut hasher = Sha256::new();
    hasher.update(norm.as_bytes());
    let digest = hasher.finalize();
    hex_encode_lower(&digest)[..12].to_string()
}

fn hex_encode_lower(bytes: &[u8]) -> String {
    use std::fmt::Write;

    let mut out = String::with_capacity(bytes.len().saturating_mul(2));
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
    out
}

/// Upserts a location row, returning its uid. `updated_epoch` is only set on
/// first insert; re-registering an already-known path does not bump it, so
/// the extractor is not forced to reprocess unchanged files.
pub fn upsert(
    db: &Database,
    job_name: &str,
    filepath: &Path,
    updated_epoch: i64,
) -> Result<String, DatabaseError> {
    let uid = make_uid(filepath);
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO mu_locations (uid, job_name, filepath, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(uid) DO UPDATE SET
               job_name = excluded.job_name,
               filepath = excluded.filepath",
            params![
                uid,
                job_name,
                filepath.to_string_lossy().to_string(),
                updated_epoch
            ],
        )?;
        Ok(())
    })?;
    Ok(uid)
}

/// Touches a location's `updated_at`, re-queueing it for extraction.
pub fn touch(db: &Database, uid: &str, updated_epoch: i64) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE mu_locations SET updated_at = ?2 WHERE uid = ?1",
            params![uid, updated_epoch],
        )?;
        Ok(())
    })
}

/// All registered locations ordered by `(updated_at, uid)` — the order the
/// extractor's watermark is defined over.
pub fn list_ordered(db: &Database) -> Result<Vec<LocationRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT uid, job_name, filepath, updated_at FROM mu_locations ORDER BY updated_at, uid",
        )?;
        let rows: Vec<LocationRow> = stmt
            .query_map([], |r| {
                Ok(LocationRow {
                    uid: r.get(0)?,
                    job_name: r.get(1)?,
                    filepath: r.get(2)?,
                    updated_epoch: r.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}
