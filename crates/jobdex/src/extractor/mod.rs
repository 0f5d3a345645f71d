//! Material-usage extractor pipeline: pull candidate workbooks from the
//! location registry, parse each one into Job/Dimensions/Board records and
//! commit them transactionally per file, advancing the watermark as files
//! complete.
//!
//! Strictly sequential, no in-process parallelism. Runs safely alongside the
//! crawler (distinct process ids), but not alongside another extractor;
//! external scheduling must guarantee at most one running instance.

pub mod board;
pub mod dims;
pub mod identity;
pub mod workbook;

pub use identity::JobIdentityResolver;

use std::path::Path;

use log::{error, warn};
use tracing::{info, info_span};

use crate::db::{location_repo, mu_repo, state_repo, Database};
use crate::error::JobdexError;

/// Watermark process id for the extractor pipeline.
pub const PROCESS: &str = "mu_extractor";

#[derive(Debug, Default, Clone, Copy)]
pub struct ExtractSummary {
    /// Files parsed and committed.
    pub processed: usize,
    /// Files permanently skipped (unopenable, or no job identity).
    pub skipped: usize,
    /// Files whose commit failed; retried on the next run.
    pub failed: usize,
}

/// Runs one extraction pass over everything strictly after the stored
/// watermark. One file at a time: parse, commit, checkpoint.
pub fn run(db: &Database, etl_version: i64) -> Result<ExtractSummary, JobdexError> {
    let _span = info_span!("extract").entered();

    let mark = state_repo::load(db, PROCESS, etl_version)?;

    let mut candidates: Vec<location_repo::LocationRow> = location_repo::list_ordered(db)?
        .into_iter()
        .filter(|loc| mark.accepts(loc.updated_epoch, &loc.uid))
        .filter(|loc| Path::new(&loc.filepath).is_file())
        .collect();
    candidates.sort_by(|a, b| {
        (a.updated_epoch, a.uid.as_str()).cmp(&(b.updated_epoch, b.uid.as_str()))
    });

    if candidates.is_empty() {
        info!("MU extractor: nothing to do");
        return Ok(ExtractSummary::default());
    }
    info!("MU extractor: {} file(s) to process", candidates.len());

    let resolver = JobIdentityResolver::new();
    let mut summary = ExtractSummary::default();

    for candidate in &candidates {
        let _file_span = info_span!("extract_file", uid = %candidate.uid).entered();
        let path = Path::new(&candidate.filepath);

        let cells = match workbook::load_workbook(path) {
            Ok(cells) => cells,
            Err(e) => {
                // A broken file will not self-heal; skip it for good.
                warn!("Skipping {}: {}", candidate.filepath, e);
                state_repo::save(db, PROCESS, etl_version, candidate.updated_epoch, &candidate.uid)?;
                summary.skipped += 1;
                continue;
            }
        };

        let Some(job) = resolver.resolve(&cells, path) else {
            warn!("Skipping {}: job number not found", candidate.filepath);
            state_repo::save(db, PROCESS, etl_version, candidate.updated_epoch, &candidate.uid)?;
            summary.skipped += 1;
            continue;
        };

        let boards = board::extract_boards(&cells);
        let dimensions = dims::extract_dimensions(&cells);

        if let Err(e) = mu_repo::commit_extraction(db, &job, &dimensions, &boards) {
            // Watermark untouched: this file is retried on the next run.
            error!("Write failed for {}: {}", candidate.filepath, e);
            summary.failed += 1;
            continue;
        }

        state_repo::save(db, PROCESS, etl_version, candidate.updated_epoch, &candidate.uid)?;
        summary.processed += 1;
    }

    info!(
        "MU extractor: {} processed, {} skipped, {} failed",
        summary.processed, summary.skipped, summary.failed
    );
    Ok(summary)
}
