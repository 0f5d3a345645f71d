//! Share scanner — walks job folders under the configured roots and emits
//! asset records for files that pass the watermark filter and classify to a
//! resource type.
//!
//! Network shares fail in creative ways (permissions, vanished paths,
//! flapping mounts), so every stat and directory listing is allowed to fail
//! for a single entry without aborting the traversal. An entry lost this way
//! is simply absent from the run's output and gets picked up next time,
//! since the watermark never moved past it.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use chrono::{DateTime, SecondsFormat, Utc};
use log::{debug, info, warn};
use regex::Regex;
use walkdir::WalkDir;

use crate::classify;
use crate::db::asset_repo::AssetRecord;
use crate::db::state_repo::Watermark;

pub struct ShareScanner {
    roots: Vec<PathBuf>,
    allowed_exts: HashSet<String>,
    job_folder_re: Regex,
    job_id_re: Regex,
}

impl ShareScanner {
    pub fn new<P: AsRef<Path>>(roots: &[P], allowed_exts: &[String]) -> Self {
        Self {
            roots: roots.iter().map(|r| r.as_ref().to_path_buf()).collect(),
            allowed_exts: allowed_exts.iter().map(|e| e.to_lowercase()).collect(),
            // "job", optional separator, then a digit.
            job_folder_re: Regex::new(r"(?i)^job[\s_\-]*\d").expect("valid job folder regex"),
            job_id_re: Regex::new(r"(?i)^job[\s._\-]*(\d+)").expect("valid job id regex"),
        }
    }

    /// Scans all roots and returns the records strictly after the watermark,
    /// sorted by `(mtime_epoch, normalized path)`. This exact order is what
    /// makes per-batch checkpointing safe: the watermark only ever advances
    /// to positions with nothing unprocessed behind them.
    pub fn scan(&self, mark: &Watermark) -> Vec<AssetRecord> {
        let mut records = Vec::new();

        for root in &self.roots {
            if !root.exists() {
                warn!("Share root does not exist, skipping: {}", root.display());
                continue;
            }
            for (job_name, job_id, job_root) in self.job_folders(root) {
                self.scan_job_folder(&job_id, &job_name, &job_root, mark, &mut records);
            }
        }

        records.sort_by(|a, b| {
            (a.mtime_epoch, a.norm_path.as_str()).cmp(&(b.mtime_epoch, b.norm_path.as_str()))
        });
        records
    }

    /// Immediate subdirectories of a root that look like job folders and
    /// carry an extractable job id, sorted by name.
    fn job_folders(&self, root: &Path) -> Vec<(String, String, PathBuf)> {
        let mut folders: Vec<(String, String, PathBuf)> = WalkDir::new(root)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_dir())
            .filter_map(|e| {
                let name = e.file_name().to_str()?.to_string();
                if !self.job_folder_re.is_match(&name) {
                    return None;
                }
                let Some(job_id) = self.job_id(&name) else {
                    debug!("Could not extract job id from folder '{}'", name);
                    return None;
                };
                Some((name, job_id, e.into_path()))
            })
            .collect();

        folders.sort_by(|a, b| a.0.cmp(&b.0));
        info!(
            "Found {} job folder(s) under {}",
            folders.len(),
            root.display()
        );
        folders
    }

    fn job_id(&self, folder_name: &str) -> Option<String> {
        self.job_id_re
            .captures(folder_name)
            .map(|c| c[1].to_string())
    }

    /// Iterative depth-first walk of one job folder's subtree. Explicit
    /// stack rather than recursion: job trees on the shares nest arbitrarily
    /// deep and a single unreadable directory must only cost us that
    /// directory.
    fn scan_job_folder(
        &self,
        job_id: &str,
        job_name: &str,
        job_root: &Path,
        mark: &Watermark,
        out: &mut Vec<AssetRecord>,
    ) {
        let mut stack = vec![job_root.to_path_buf()];

        while let Some(dir) = stack.pop() {
            let entries = match fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(e) => {
                    debug!("Skipping unreadable directory {}: {}", dir.display(), e);
                    continue;
                }
            };

            for entry in entries {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        debug!("Skipping unreadable entry in {}: {}", dir.display(), e);
                        continue;
                    }
                };
                let path = entry.path();

                let file_type = match entry.file_type() {
                    Ok(t) => t,
                    Err(e) => {
                        debug!("Skipping unstattable entry {}: {}", path.display(), e);
                        continue;
                    }
                };
                if file_type.is_dir() {
                    stack.push(path);
                    continue;
                }
                if !file_type.is_file() {
                    // Symlinks are not followed.
                    continue;
                }

                let Some(ext) = path
                    .extension()
                    .and_then(|e| e.to_str())
                    .map(|e| e.to_lowercase())
                else {
                    continue;
                };
                if !self.allowed_exts.contains(&ext) {
                    continue;
                }

                let mtime = match entry.metadata() {
                    Ok(meta) => file_mtime_epoch(&meta),
                    Err(e) => {
                        debug!("Skipping unstattable file {}: {}", path.display(), e);
                        continue;
                    }
                };

                let norm_path = classify::normalize_path(&path);
                if !mark.accepts(mtime, &norm_path) {
                    continue;
                }

                let Some(resource_type) = classify::classify(&norm_path, &ext) else {
                    continue;
                };

                let filename = entry.file_name().to_string_lossy().to_string();
                out.push(AssetRecord {
                    job_id: job_id.to_string(),
                    job_name: job_name.to_string(),
                    resource_type,
                    abs_path: path.to_string_lossy().to_string(),
                    norm_path,
                    filename,
                    created_at: created_at_from_epoch(mtime),
                    mtime_epoch: mtime,
                });
            }
        }
    }
}

fn file_mtime_epoch(meta: &fs::Metadata) -> i64 {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

fn created_at_from_epoch(epoch: i64) -> String {
    DateTime::<Utc>::from_timestamp(epoch, 0)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::state_repo::{Watermark, ETL_VERSION};
    use tempfile::TempDir;

    fn scanner_for(root: &Path) -> ShareScanner {
        let exts: Vec<String> = crate::classify::DEFAULT_ALLOWED_EXTENSIONS
            .iter()
            .map(|e| e.to_string())
            .collect();
        ShareScanner::new(&[root], &exts)
    }

    fn write_file(path: &Path, content: &[u8]) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn test_scan_empty_root() {
        let temp = TempDir::new().unwrap();
        let scanner = scanner_for(temp.path());
        let records = scanner.scan(&Watermark::zero(ETL_VERSION));
        assert!(records.is_empty());
    }

    #[test]
    fn test_scan_classifies_nested_files() {
        let temp = TempDir::new().unwrap();
        let job = temp.path().join("Job 10023 - Display");
        write_file(
            &job.join("Design/Cut Files/Production/Job10023.ai"),
            b"cut",
        );
        write_file(&job.join("Pics and Assembly/photo.jpg"), b"jpg");
        // Unclassifiable: allowed extension, no matching rule.
        write_file(&job.join("Invoices/job10023.pdf"), b"pdf");
        // Not an allowed extension.
        write_file(&job.join("Design/Cut Files/Production/notes.txt"), b"txt");

        let scanner = scanner_for(temp.path());
        let records = scanner.scan(&Watermark::zero(ETL_VERSION));

        assert_eq!(records.len(), 2);
        for record in &records {
            assert_eq!(record.job_id, "10023");
            assert_eq!(record.job_name, "Job 10023 - Display");
            assert!(record.mtime_epoch > 0);
        }
    }

    #[test]
    fn test_non_job_folders_ignored() {
        let temp = TempDir::new().unwrap();
        write_file(
            &temp
                .path()
                .join("Archive/Pics and Assembly/photo.jpg"),
            b"jpg",
        );
        // "Job" with no digits: no extractable id.
        write_file(
            &temp
                .path()
                .join("Job templates/Pics and Assembly/photo.jpg"),
            b"jpg",
        );

        let scanner = scanner_for(temp.path());
        let records = scanner.scan(&Watermark::zero(ETL_VERSION));
        assert!(records.is_empty());
    }

    #[test]
    fn test_job_id_extraction_variants() {
        let temp = TempDir::new().unwrap();
        let scanner = scanner_for(temp.path());
        assert_eq!(scanner.job_id("Job 10023 - Display"), Some("10023".into()));
        assert_eq!(scanner.job_id("job_420"), Some("420".into()));
        assert_eq!(scanner.job_id("JOB-77 rework"), Some("77".into()));
        assert_eq!(scanner.job_id("Job templates"), None);
    }

    #[test]
    fn test_output_sorted_by_mtime_then_path() {
        let temp = TempDir::new().unwrap();
        let job = temp.path().join("Job 1");
        let b = job.join("Pics and Assembly/b.jpg");
        let a = job.join("Pics and Assembly/a.jpg");
        write_file(&b, b"jpg");
        write_file(&a, b"jpg");

        let scanner = scanner_for(temp.path());
        let records = scanner.scan(&Watermark::zero(ETL_VERSION));
        assert_eq!(records.len(), 2);
        for pair in records.windows(2) {
            assert!(
                (pair[0].mtime_epoch, pair[0].norm_path.as_str())
                    <= (pair[1].mtime_epoch, pair[1].norm_path.as_str())
            );
        }
    }

    #[test]
    fn test_watermark_filters_already_seen() {
        let temp = TempDir::new().unwrap();
        let job = temp.path().join("Job 1");
        write_file(&job.join("Pics and Assembly/photo.jpg"), b"jpg");

        let scanner = scanner_for(temp.path());
        let records = scanner.scan(&Watermark::zero(ETL_VERSION));
        assert_eq!(records.len(), 1);

        // A watermark at the emitted record's position excludes it.
        let mark = Watermark {
            etl_version: ETL_VERSION,
            last_mtime: records[0].mtime_epoch,
            last_key: records[0].norm_path.clone(),
        };
        assert!(scanner.scan(&mark).is_empty());
    }

    #[test]
    fn test_missing_root_is_not_an_error() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("unmounted-share");
        let exts: Vec<String> = vec!["jpg".to_string()];
        let scanner = ShareScanner::new(&[missing.as_path()], &exts);
        assert!(scanner.scan(&Watermark::zero(ETL_VERSION)).is_empty());
    }
}
