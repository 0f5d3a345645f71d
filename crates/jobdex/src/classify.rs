//! Path classification — maps a normalized share path to a business
//! resource type.
//!
//! Classification is an ordered rule list over path substrings plus the file
//! extension; the first matching rule wins. Paths that match no rule are not
//! an error, they are simply not interesting to the index.

use std::fmt;
use std::path::Path;

/// Extensions the crawler considers at all (without the dot). Everything else
/// is discarded before any substring matching happens.
pub const DEFAULT_ALLOWED_EXTENSIONS: &[&str] = &["xlsx", "ai", "pdf", "jpg", "jpeg", "3dm"];

/// Business classification of an indexed file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceType {
    MuSheet,
    CutFile,
    AssemblyInstructions,
    Pics,
    LowRes,
    PrintFiles,
    SetUp,
    TechnicalDrawings,
    ThreeDFile,
}

impl ResourceType {
    /// Stable tag used in the database and over the query surface.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MuSheet => "mu_sheet",
            Self::CutFile => "cut_file",
            Self::AssemblyInstructions => "assembly_instructions",
            Self::Pics => "pics",
            Self::LowRes => "low_res",
            Self::PrintFiles => "print_files",
            Self::SetUp => "set_up",
            Self::TechnicalDrawings => "technical_drawings",
            Self::ThreeDFile => "3d_file",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "mu_sheet" => Some(Self::MuSheet),
            "cut_file" => Some(Self::CutFile),
            "assembly_instructions" => Some(Self::AssemblyInstructions),
            "pics" => Some(Self::Pics),
            "low_res" => Some(Self::LowRes),
            "print_files" => Some(Self::PrintFiles),
            "set_up" => Some(Self::SetUp),
            "technical_drawings" => Some(Self::TechnicalDrawings),
            "3d_file" => Some(Self::ThreeDFile),
            _ => None,
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Case-folded, forward-slash form of a path, used for all ordering and
/// substring comparisons so the index behaves the same against Windows UNC
/// paths and POSIX mounts.
pub fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/").to_lowercase()
}

/// Classifies a file by its normalized path and lowercase extension
/// (without the dot). Returns `None` for files the index does not track.
pub fn classify(norm_path: &str, ext: &str) -> Option<ResourceType> {
    let filename = norm_path.rsplit('/').next().unwrap_or(norm_path);
    let is_jobfile = filename.starts_with("job");
    let has = |needle: &str| norm_path.contains(needle);
    let prod_or_one_off = has("production") || has("1 off");
    let jpg = ext == "jpg" || ext == "jpeg";

    if has("sales") && has("material usages and factory handover") && is_jobfile && ext == "xlsx" {
        Some(ResourceType::MuSheet)
    } else if has("design") && has("cut files") && prod_or_one_off && is_jobfile && ext == "ai" {
        Some(ResourceType::CutFile)
    } else if has("pics and assembly") && is_jobfile && ext == "pdf" {
        Some(ResourceType::AssemblyInstructions)
    } else if has("pics and assembly") && jpg {
        Some(ResourceType::Pics)
    } else if has("design") && has("low res") && prod_or_one_off && is_jobfile && ext == "pdf" {
        Some(ResourceType::LowRes)
    } else if has("design") && has("print files") && prod_or_one_off && is_jobfile && ext == "pdf" {
        Some(ResourceType::PrintFiles)
    } else if has("design") && has("set up") && prod_or_one_off && is_jobfile && ext == "pdf" {
        Some(ResourceType::SetUp)
    } else if has("design") && has("technical drawings") && jpg {
        Some(ResourceType::TechnicalDrawings)
    } else if has("design") && has("technical drawings") && ext == "3dm" {
        Some(ResourceType::ThreeDFile)
    } else {
        None
    }
}
