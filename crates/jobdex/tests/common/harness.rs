//! Test harness for isolated pipeline runs.
//!
//! The `TestHarness` struct provides a complete isolated environment for
//! exercising the crawler and extractor end to end: a temp share tree, a
//! file-backed database (so reopening works like production) and builders
//! for share files and xlsx workbooks with controlled modification times.

#![allow(dead_code)]

use std::fs::{self, File, FileTimes};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, UNIX_EPOCH};

use tempfile::TempDir;

use jobdex::config::Config;
use jobdex::db::state_repo::{self, Watermark};
use jobdex::db::{location_repo, Database};

pub struct TestHarness {
    temp_dir: TempDir,
    /// Root of the simulated network share.
    pub share_root: PathBuf,
    pub db: Database,
    db_path: PathBuf,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let share_root = temp_dir.path().join("share");
        fs::create_dir_all(&share_root).expect("Failed to create share root");

        let db_path = temp_dir.path().join("data").join("jobdex.db");
        let db = Database::open(&db_path).expect("Failed to open test database");

        Self {
            temp_dir,
            share_root,
            db,
            db_path,
        }
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// A config pointing at the harness share and database.
    pub fn config(&self) -> Config {
        Config {
            version: "1.0".to_string(),
            roots: vec![self.share_root.to_string_lossy().to_string()],
            database_path: Some(self.db_path.to_string_lossy().to_string()),
            batch_size: 1000,
            allowed_extensions: jobdex::classify::DEFAULT_ALLOWED_EXTENSIONS
                .iter()
                .map(|e| e.to_string())
                .collect(),
            etl_version: state_repo::ETL_VERSION,
        }
    }

    /// Writes a file under the share root with a pinned modification time.
    pub fn write_share_file(&self, rel_path: &str, mtime_epoch: i64) -> PathBuf {
        let path = self.share_root.join(rel_path);
        write_file_with_mtime(&path, b"content", mtime_epoch);
        path
    }

    /// Writes a single-column xlsx workbook under the share root: cell `A{n}`
    /// holds `column[n-1]`. Flattened by the extractor, index i maps to
    /// `column[i]`, which keeps anchor arithmetic in tests readable.
    pub fn write_workbook(&self, rel_path: &str, column: &[Option<&str>]) -> PathBuf {
        let path = self.share_root.join(rel_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create workbook directory");
        }
        write_xlsx(&path, column);
        path
    }

    /// Writes a file with an xlsx name that is not a zip archive at all.
    pub fn write_broken_workbook(&self, rel_path: &str) -> PathBuf {
        let path = self.share_root.join(rel_path);
        write_file_with_mtime(&path, b"this is not a zip archive", 1_000);
        path
    }

    /// Registers a workbook in the location registry, as the external
    /// registry scanner would.
    pub fn register_location(&self, path: &Path, updated_epoch: i64) -> String {
        location_repo::upsert(&self.db, "Job", path, updated_epoch)
            .expect("Failed to register location")
    }

    pub fn crawler_watermark(&self) -> Watermark {
        state_repo::load(&self.db, jobdex::crawler::PROCESS, state_repo::ETL_VERSION)
            .expect("Failed to load crawler watermark")
    }

    pub fn extractor_watermark(&self) -> Watermark {
        state_repo::load(&self.db, jobdex::extractor::PROCESS, state_repo::ETL_VERSION)
            .expect("Failed to load extractor watermark")
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Writes `content` to `path` (creating parents) and pins its mtime.
pub fn write_file_with_mtime(path: &Path, content: &[u8], mtime_epoch: i64) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Failed to create parent directory");
    }
    fs::write(path, content).expect("Failed to write file");

    let mtime = UNIX_EPOCH + Duration::from_secs(mtime_epoch as u64);
    let file = File::options()
        .write(true)
        .open(path)
        .expect("Failed to reopen file");
    file.set_times(FileTimes::new().set_modified(mtime))
        .expect("Failed to set mtime");
}

/// Minimal xlsx writer: one column, shared strings for every value.
pub fn write_xlsx(path: &Path, column: &[Option<&str>]) {
    let file = File::create(path).expect("Failed to create workbook");
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default();

    let mut shared: Vec<&str> = Vec::new();
    let mut sheet = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#,
    );
    for (i, value) in column.iter().enumerate() {
        if let Some(value) = *value {
            let idx = match shared.iter().position(|s| *s == value) {
                Some(idx) => idx,
                None => {
                    shared.push(value);
                    shared.len() - 1
                }
            };
            let row = i + 1;
            sheet.push_str(&format!(
                r#"<row r="{row}"><c r="A{row}" t="s"><v>{idx}</v></c></row>"#
            ));
        }
    }
    sheet.push_str("</sheetData></worksheet>");

    let mut strings = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">"#,
    );
    for value in &shared {
        strings.push_str(&format!("<si><t>{}</t></si>", escape_xml(value)));
    }
    strings.push_str("</sst>");

    zip.start_file("xl/sharedStrings.xml", options)
        .expect("Failed to start shared strings entry");
    zip.write_all(strings.as_bytes())
        .expect("Failed to write shared strings");
    zip.start_file("xl/worksheets/sheet1.xml", options)
        .expect("Failed to start sheet entry");
    zip.write_all(sheet.as_bytes())
        .expect("Failed to write sheet");
    zip.finish().expect("Failed to finish workbook");
}

fn escape_xml(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// A template-shaped workbook column: job labels up front, the board
/// section behind its banner on the production stride, dimensions after the
/// section end.
pub fn template_workbook_column() -> Vec<Option<&'static str>> {
    let mut column: Vec<Option<&'static str>> = vec![None; 110];
    column[0] = Some("Job No:");
    column[1] = Some("10023");
    column[2] = Some("Job Name:");
    column[3] = Some("Retail Display");
    column[10] = Some("BOARD REQUIRED");
    // First record: banner + 54.
    column[64] = Some("X-Board 2S");
    column[65] = Some("16mm");
    column[66] = Some("2440 x 1220");
    column[68] = Some("4");
    // Second record: one stride further.
    column[82] = Some("X-Board Print");
    column[83] = Some("10,5");
    column[84] = Some("3050 x 1220");
    column[86] = Some("2");
    column[100] = Some("HARDWARE");
    column[102] = Some("Dims");
    column[103] = Some("1200w x 800h x 50d mm");
    column
}
