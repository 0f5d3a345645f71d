//! Material-usage repository — extracted job, dimension and board rows.
//!
//! A single spreadsheet's writes go through `commit_extraction` as one
//! transaction: either the job, its dimensions and its full board set land
//! together, or nothing changes.

use rusqlite::{params, Row};
use rust_decimal::Decimal;

use crate::numeric;

use super::{Database, DatabaseError};

/// The job identity extracted from one spreadsheet.
#[derive(Debug, Clone)]
pub struct ExtractedJob {
    pub uid: String,
    pub job_id: String,
    pub job_name: String,
}

/// Overall product dimensions in millimetres, each axis optional.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Dimensions {
    pub width_mm: Option<i64>,
    pub height_mm: Option<i64>,
    pub depth_mm: Option<i64>,
}

/// One board line item as read from the sheet, fields still raw text.
/// Coercion to numbers happens at write time so a malformed thickness ends
/// up NULL rather than killing the whole file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardItem {
    pub xb_type: String,
    pub thickness: String,
    pub size_text: String,
    pub units_up: String,
}

/// Commits one file's extraction output atomically: upsert the job row,
/// upsert its dimensions, then replace the full board set for the uid
/// (the number of line items can change between runs).
pub fn commit_extraction(
    db: &Database,
    job: &ExtractedJob,
    dims: &Dimensions,
    boards: &[BoardItem],
) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        // The mutex guarantees exclusive access, so the unchecked variant is
        // safe here.
        let tx = conn.unchecked_transaction()?;

        tx.execute(
            "INSERT INTO mu_jobs (uid, job_id, job_name)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(uid) DO UPDATE SET
               job_id   = excluded.job_id,
               job_name = excluded.job_name",
            params![job.uid, job.job_id.to_lowercase(), job.job_name],
        )?;

        tx.execute(
            "INSERT INTO mu_dimensions (uid, width_mm, height_mm, depth_mm)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(uid) DO UPDATE SET
               width_mm  = excluded.width_mm,
               height_mm = excluded.height_mm,
               depth_mm  = excluded.depth_mm",
            params![job.uid, dims.width_mm, dims.height_mm, dims.depth_mm],
        )?;

        tx.execute("DELETE FROM mu_boards WHERE uid = ?1", params![job.uid])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO mu_boards (uid, xb_type, thickness_mm, size_text, units_up)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for board in boards {
                let thickness = numeric::to_decimal(&board.thickness).map(|d| d.to_string());
                let units_up = numeric::to_decimal(&board.units_up).map(|d| d.to_string());
                stmt.execute(params![
                    job.uid,
                    board.xb_type,
                    thickness,
                    board.size_text,
                    units_up,
                ])?;
            }
        }

        tx.commit()?;
        Ok(())
    })
}

/// A stored board row, numeric fields in their normalized text form.
#[derive(Debug, Clone)]
pub struct BoardRow {
    pub uid: String,
    pub xb_type: String,
    pub thickness_mm: Option<String>,
    pub size_text: String,
    pub units_up: Option<String>,
}

/// Fetches a job row by uid.
pub fn find_job(db: &Database, uid: &str) -> Result<Option<ExtractedJob>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT uid, job_id, job_name FROM mu_jobs WHERE uid = ?1")?;
        let mut rows = stmt.query_map(params![uid], |r| {
            Ok(ExtractedJob {
                uid: r.get(0)?,
                job_id: r.get(1)?,
                job_name: r.get(2)?,
            })
        })?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Fetches the dimensions row for a uid.
pub fn find_dimensions(db: &Database, uid: &str) -> Result<Option<Dimensions>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt =
            conn.prepare("SELECT width_mm, height_mm, depth_mm FROM mu_dimensions WHERE uid = ?1")?;
        let mut rows = stmt.query_map(params![uid], |r| {
            Ok(Dimensions {
                width_mm: r.get(0)?,
                height_mm: r.get(1)?,
                depth_mm: r.get(2)?,
            })
        })?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// All board rows for a uid, in insertion order.
pub fn boards_for(db: &Database, uid: &str) -> Result<Vec<BoardRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT uid, xb_type, thickness_mm, size_text, units_up
             FROM mu_boards WHERE uid = ?1 ORDER BY id",
        )?;
        let rows: Vec<BoardRow> = stmt
            .query_map(params![uid], |r| {
                Ok(BoardRow {
                    uid: r.get(0)?,
                    xb_type: r.get(1)?,
                    thickness_mm: r.get(2)?,
                    size_text: r.get(3)?,
                    units_up: r.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Query filter for the material-usage search surface.
#[derive(Debug, Default, Clone)]
pub struct MaterialUsageFilter {
    pub job_id: Option<String>,
    /// Case-insensitive job-name substring.
    pub name: Option<String>,
    /// Case-insensitive board-type substring.
    pub xb_type: Option<String>,
    pub thickness: Option<Decimal>,
    /// Case-insensitive size-text substring.
    pub size: Option<String>,
    pub units_up: Option<Decimal>,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub depth: Option<i64>,
    pub limit: Option<u64>,
}

/// A hit on the material-usage search surface: the indexed mu_sheet file the
/// extracted data came from.
#[derive(Debug, Clone)]
pub struct MaterialUsageRow {
    pub id: i64,
    pub job_id: String,
    pub job_name: String,
    pub resource_type: String,
    pub abs_path: String,
    pub filename: String,
}

impl MaterialUsageRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get(0)?,
            job_id: row.get(1)?,
            job_name: row.get(2)?,
            resource_type: row.get(3)?,
            abs_path: row.get(4)?,
            filename: row.get(5)?,
        })
    }
}

/// Queries material-usage data joined across jobs, boards, dimensions and
/// the asset index, ordered by job id, capped at the filter's limit
/// (default 100).
pub fn query(
    db: &Database,
    filter: &MaterialUsageFilter,
) -> Result<Vec<MaterialUsageRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut sql = String::from(
            "SELECT DISTINCT resources.id, mu_jobs.job_id, resources.job_name,
                    resources.resource_type, resources.abs_path, resources.filename
             FROM resources
             JOIN mu_jobs ON resources.job_id = mu_jobs.job_id
             JOIN mu_boards ON mu_jobs.uid = mu_boards.uid
             JOIN mu_dimensions ON mu_jobs.uid = mu_dimensions.uid
             WHERE resources.resource_type = 'mu_sheet'",
        );
        let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        fn push(
            sql: &mut String,
            clause: &str,
            value: Box<dyn rusqlite::types::ToSql>,
            param_values: &mut Vec<Box<dyn rusqlite::types::ToSql>>,
        ) {
            param_values.push(value);
            sql.push_str(&format!(" AND {} ?{}", clause, param_values.len()));
        }

        if let Some(ref job_id) = filter.job_id {
            push(&mut sql, "resources.job_id =", Box::new(job_id.clone()), &mut param_values);
        }
        if let Some(ref name) = filter.name {
            push(
                &mut sql,
                "resources.job_name LIKE",
                Box::new(format!("%{}%", name)),
                &mut param_values,
            );
        }
        if let Some(ref xb_type) = filter.xb_type {
            push(
                &mut sql,
                "mu_boards.xb_type LIKE",
                Box::new(format!("%{}%", xb_type)),
                &mut param_values,
            );
        }
        if let Some(thickness) = filter.thickness {
            push(
                &mut sql,
                "mu_boards.thickness_mm =",
                Box::new(thickness.normalize().to_string()),
                &mut param_values,
            );
        }
        if let Some(ref size) = filter.size {
            push(
                &mut sql,
                "mu_boards.size_text LIKE",
                Box::new(format!("%{}%", size)),
                &mut param_values,
            );
        }
        if let Some(units_up) = filter.units_up {
            push(
                &mut sql,
                "mu_boards.units_up =",
                Box::new(units_up.normalize().to_string()),
                &mut param_values,
            );
        }
        if let Some(width) = filter.width {
            push(&mut sql, "mu_dimensions.width_mm =", Box::new(width), &mut param_values);
        }
        if let Some(height) = filter.height {
            push(&mut sql, "mu_dimensions.height_mm =", Box::new(height), &mut param_values);
        }
        if let Some(depth) = filter.depth {
            push(&mut sql, "mu_dimensions.depth_mm =", Box::new(depth), &mut param_values);
        }

        let limit = filter.limit.unwrap_or(100) as i64;
        param_values.push(Box::new(limit));
        sql.push_str(&format!(
            " ORDER BY mu_jobs.job_id LIMIT ?{}",
            param_values.len()
        ));

        let params_ref: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&sql)?;
        let rows: Vec<MaterialUsageRow> = stmt
            .query_map(params_ref.as_slice(), MaterialUsageRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    })
}
