//! Job identity resolution from the flattened cell stream, with fallbacks
//! derived from the file's path.
//!
//! Sheets in the wild carry the job number as "Job No: 10023" in one cell,
//! as a label cell followed by a value cell, or not at all — in which case
//! the path usually knows. A file where no rule yields a job number is
//! unresolvable and the caller skips it permanently.

use std::path::{Component, Path};

use regex::Regex;

use crate::db::location_repo;
use crate::db::mu_repo::ExtractedJob;

pub struct JobIdentityResolver {
    inline_no: Regex,
    label_no: Regex,
    label_name: Regex,
    inline_name: Regex,
    path_job_part: Regex,
    path_digits: Regex,
}

impl JobIdentityResolver {
    pub fn new() -> Self {
        Self {
            // "Job no: 12345" / "Job number 12345" / "Job #12345", 3+ digits.
            inline_no: Regex::new(r"(?i)\bjob\s*(?:no\.?|number|#)\s*:?[\s\-]*([0-9]{3,})\b")
                .expect("valid inline job number regex"),
            // A cell that is only the label; the value sits in the next cell.
            label_no: Regex::new(r"(?i)^job\s*(?:no\.?|number|#)\s*:?$")
                .expect("valid job number label regex"),
            label_name: Regex::new(r"(?i)^(?:job|project)\s*name\s*:?$")
                .expect("valid job name label regex"),
            inline_name: Regex::new(r"(?i)\bjob\s*name\s*:?\s*(.+)$")
                .expect("valid inline job name regex"),
            path_job_part: Regex::new(r"(?i)^job\d+").expect("valid job folder regex"),
            path_digits: Regex::new(r"(?i)job\s*0*([0-9]{3,})").expect("valid path digits regex"),
        }
    }

    /// Resolves the identity of the job a spreadsheet describes, or `None`
    /// when no job number can be found by any rule.
    pub fn resolve(&self, cells: &[Option<String>], source_path: &Path) -> Option<ExtractedJob> {
        // Work over the non-blank cells only; "label followed by value"
        // means adjacency in this filtered sequence.
        let txts: Vec<&str> = cells
            .iter()
            .filter_map(|c| c.as_deref())
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect();

        let mut job_no = self.inline_job_no(&txts);
        if job_no.is_none() {
            job_no = self.labeled_job_no(&txts);
        }

        let mut job_name = self.sheet_job_name(&txts);

        // Path fallbacks.
        let job_folder = source_path.components().find_map(|c| match c {
            Component::Normal(part) => part
                .to_str()
                .filter(|p| self.path_job_part.is_match(p))
                .map(str::to_string),
            _ => None,
        });

        if job_no.is_none() {
            let path_text = source_path.to_string_lossy();
            job_no = self
                .path_digits
                .captures(&path_text)
                .map(|cap| cap[1].to_string());
        }

        if job_name.is_none() {
            job_name = job_folder.or_else(|| {
                source_path
                    .parent()
                    .and_then(|p| p.file_name())
                    .map(|n| n.to_string_lossy().into_owned())
            });
        }

        let job_no = job_no?;
        Some(ExtractedJob {
            uid: location_repo::make_uid(source_path),
            job_id: job_no,
            job_name: job_name.unwrap_or_default(),
        })
    }

    fn inline_job_no(&self, txts: &[&str]) -> Option<String> {
        txts.iter()
            .find_map(|t| self.inline_no.captures(t).map(|cap| cap[1].to_string()))
    }

    fn labeled_job_no(&self, txts: &[&str]) -> Option<String> {
        for (i, t) in txts.iter().enumerate() {
            if self.label_no.is_match(t) {
                if let Some(next) = txts.get(i + 1) {
                    let digits: String = next.chars().filter(|c| c.is_ascii_digit()).collect();
                    if !digits.is_empty() {
                        return Some(digits);
                    }
                }
            }
        }
        None
    }

    fn sheet_job_name(&self, txts: &[&str]) -> Option<String> {
        for (i, t) in txts.iter().enumerate() {
            if self.label_name.is_match(t) {
                if let Some(next) = txts.get(i + 1) {
                    return Some((*next).to_string());
                }
            }
            if let Some(cap) = self.inline_name.captures(t) {
                let name = cap[1].trim();
                if !name.is_empty() {
                    return Some(name.to_string());
                }
            }
        }
        None
    }
}

impl Default for JobIdentityResolver {
    fn default() -> Self {
        Self::new()
    }
}
