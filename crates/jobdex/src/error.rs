use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum JobdexError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Extraction error: {0}")]
    Extract(#[from] ExtractError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },
}

/// Content-level failures while opening or reading a workbook. These are
/// permanent for a given file: a workbook that cannot be opened today will
/// not open tomorrow either, so the extractor skips past them.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Failed to open workbook '{path}': {reason}")]
    OpenWorkbook { path: PathBuf, reason: String },

    #[error("No worksheet found in '{path}'")]
    MissingSheet { path: PathBuf },

    #[error("Failed to parse sheet XML in '{path}': {reason}")]
    SheetXml { path: PathBuf, reason: String },
}

pub type Result<T> = std::result::Result<T, JobdexError>;
