//! Batch writer — upserts scanner output in bounded chunks, advancing the
//! watermark after each chunk commits.
//!
//! Each chunk is a checkpoint boundary: a crash between a chunk's upsert and
//! its watermark save costs at most one chunk of redo work, and the redo is
//! harmless because the upsert is keyed on the path.

use log::debug;

use crate::db::asset_repo::{self, AssetRecord};
use crate::db::{state_repo, Database, DatabaseError};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WriteSummary {
    pub rows: usize,
    pub batches: usize,
}

pub struct BatchWriter {
    batch_size: usize,
}

impl BatchWriter {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
        }
    }

    /// Writes records already sorted by `(mtime_epoch, norm_path)`. The
    /// watermark is advanced to each chunk's last row only after that
    /// chunk's upsert committed.
    pub fn write(
        &self,
        db: &Database,
        process: &str,
        etl_version: i64,
        records: &[AssetRecord],
    ) -> Result<WriteSummary, DatabaseError> {
        let mut summary = WriteSummary::default();

        for chunk in records.chunks(self.batch_size) {
            asset_repo::upsert_batch(db, chunk)?;

            if let Some(last) = chunk.last() {
                state_repo::save(db, process, etl_version, last.mtime_epoch, &last.norm_path)?;
                debug!(
                    "Checkpointed {} row(s) at ({}, {})",
                    chunk.len(),
                    last.mtime_epoch,
                    last.norm_path
                );
            }

            summary.rows += chunk.len();
            summary.batches += 1;
        }

        Ok(summary)
    }
}
