//! Asset index repository — upserts crawl output and serves the search
//! surface over the `resources` table.

use rusqlite::{params, Row};

use crate::classify::ResourceType;

use super::{Database, DatabaseError};

/// A new or changed file discovered by the crawler.
#[derive(Debug, Clone)]
pub struct AssetRecord {
    pub job_id: String,
    pub job_name: String,
    pub resource_type: ResourceType,
    pub abs_path: String,
    /// Case-folded, forward-slash form of `abs_path`. Used for ordering and
    /// as the watermark key; not persisted.
    pub norm_path: String,
    pub filename: String,
    /// ISO-8601 timestamp derived from the file's modification time.
    pub created_at: String,
    pub mtime_epoch: i64,
}

/// A stored asset row.
#[derive(Debug, Clone)]
pub struct AssetRow {
    pub id: i64,
    pub job_id: String,
    pub job_name: String,
    pub resource_type: String,
    pub abs_path: String,
    pub filename: String,
    pub created_at: String,
    pub mtime_epoch: i64,
}

impl AssetRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            job_id: row.get("job_id")?,
            job_name: row.get("job_name")?,
            resource_type: row.get("resource_type")?,
            abs_path: row.get("abs_path")?,
            filename: row.get("filename")?,
            created_at: row.get("created_at")?,
            mtime_epoch: row.get("mtime_epoch")?,
        })
    }
}

/// Upserts one chunk of records atomically, keyed on `abs_path`. Re-running
/// the same chunk is a no-op apart from refreshing the mutable fields.
pub fn upsert_batch(db: &Database, records: &[AssetRecord]) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        // The mutex guarantees exclusive access, so the unchecked variant is
        // safe here.
        let tx = conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO resources (job_id, job_name, resource_type, abs_path, filename, created_at, mtime_epoch)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(abs_path) DO UPDATE SET
                   job_id        = excluded.job_id,
                   job_name      = excluded.job_name,
                   resource_type = excluded.resource_type,
                   filename      = excluded.filename,
                   created_at    = excluded.created_at,
                   mtime_epoch   = excluded.mtime_epoch",
            )?;
            for r in records {
                stmt.execute(params![
                    r.job_id,
                    r.job_name,
                    r.resource_type.as_str(),
                    r.abs_path,
                    r.filename,
                    r.created_at,
                    r.mtime_epoch,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    })
}

/// Query filter parameters for the asset search surface.
#[derive(Debug, Default, Clone)]
pub struct AssetFilter {
    pub id: Option<i64>,
    pub job_id: Option<String>,
    /// Case-insensitive job-name substring.
    pub name: Option<String>,
    /// Year the file was created (from its modification time).
    pub year: Option<i32>,
    pub types: Vec<ResourceType>,
    pub limit: Option<u64>,
}

/// Queries assets with filters, ordered by (job_name, resource_type,
/// filename) and capped at the filter's limit (default 100).
pub fn query(db: &Database, filter: &AssetFilter) -> Result<Vec<AssetRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut conditions = Vec::new();
        let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if let Some(id) = filter.id {
            conditions.push(format!("id = ?{}", param_values.len() + 1));
            param_values.push(Box::new(id));
        }
        if let Some(ref job_id) = filter.job_id {
            conditions.push(format!("job_id = ?{}", param_values.len() + 1));
            param_values.push(Box::new(job_id.clone()));
        }
        if let Some(ref name) = filter.name {
            conditions.push(format!("job_name LIKE ?{}", param_values.len() + 1));
            param_values.push(Box::new(format!("%{}%", name)));
        }
        if let Some(year) = filter.year {
            conditions.push(format!(
                "CAST(strftime('%Y', created_at) AS INTEGER) = ?{}",
                param_values.len() + 1
            ));
            param_values.push(Box::new(year));
        }
        if !filter.types.is_empty() {
            let placeholders: Vec<String> = filter
                .types
                .iter()
                .enumerate()
                .map(|(i, _)| format!("?{}", param_values.len() + 1 + i))
                .collect();
            conditions.push(format!("resource_type IN ({})", placeholders.join(", ")));
            for t in &filter.types {
                param_values.push(Box::new(t.as_str()));
            }
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let limit = filter.limit.unwrap_or(100) as i64;
        param_values.push(Box::new(limit));
        let query_sql = format!(
            "SELECT * FROM resources {} ORDER BY job_name, resource_type, filename LIMIT ?{}",
            where_clause,
            param_values.len()
        );

        let params_ref: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&query_sql)?;
        let rows: Vec<AssetRow> = stmt
            .query_map(params_ref.as_slice(), AssetRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    })
}

/// Finds an asset by its unique absolute path.
pub fn find_by_path(db: &Database, abs_path: &str) -> Result<Option<AssetRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM resources WHERE abs_path = ?1")?;
        let mut rows = stmt.query_map(params![abs_path], AssetRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Total number of indexed assets.
pub fn count(db: &Database) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row("SELECT COUNT(*) FROM resources", [], |r| r.get(0))?;
        Ok(count)
    })
}
