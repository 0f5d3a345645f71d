//! Incremental crawler pipeline: scan the shares, upsert new assets in
//! batches, advance the watermark after each batch.
//!
//! Strictly sequential, no in-process parallelism. The pipeline provides no
//! locking against itself; external scheduling must guarantee at most one
//! running crawler instance.

mod scanner;
mod writer;

pub use scanner::ShareScanner;
pub use writer::{BatchWriter, WriteSummary};

use tracing::{info, info_span};

use crate::config::Config;
use crate::db::{state_repo, Database};
use crate::error::JobdexError;

/// Watermark process id for the crawler pipeline.
pub const PROCESS: &str = "crawler";

#[derive(Debug, Default, Clone, Copy)]
pub struct CrawlSummary {
    pub discovered: usize,
    pub written: usize,
    pub batches: usize,
}

/// Runs one crawl: everything strictly after the stored watermark is
/// re-indexed and checkpointed. Safe to re-run at any time; a run against an
/// unchanged tree writes nothing.
pub fn run(db: &Database, config: &Config) -> Result<CrawlSummary, JobdexError> {
    let _span = info_span!("crawl").entered();

    let mark = state_repo::load(db, PROCESS, config.etl_version)?;

    let scanner = ShareScanner::new(&config.roots, &config.allowed_extensions);
    let records = {
        let _step = info_span!("scan").entered();
        scanner.scan(&mark)
    };

    if records.is_empty() {
        info!("Crawler: nothing to do");
        return Ok(CrawlSummary::default());
    }
    info!("Crawler: {} new/changed file(s)", records.len());

    let write_summary = {
        let _step = info_span!("write").entered();
        let writer = BatchWriter::new(config.batch_size);
        writer.write(db, PROCESS, config.etl_version, &records)?
    };

    Ok(CrawlSummary {
        discovered: records.len(),
        written: write_summary.rows,
        batches: write_summary.batches,
    })
}
