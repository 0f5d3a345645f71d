use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    /// Ordered list of share roots containing job folders.
    pub roots: Vec<String>,
    /// SQLite database file; defaults to `~/.jobdex/data/jobdex.db`.
    #[serde(default)]
    pub database_path: Option<String>,
    /// Rows upserted per crawler checkpoint boundary.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Extensions (without dot) the crawler considers at all.
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
    /// Expected watermark schema version. Bumping it invalidates every stored
    /// watermark and forces a full rescan.
    #[serde(default = "default_etl_version")]
    pub etl_version: i64,
}

fn default_batch_size() -> usize {
    1000
}

fn default_allowed_extensions() -> Vec<String> {
    crate::classify::DEFAULT_ALLOWED_EXTENSIONS
        .iter()
        .map(|e| e.to_string())
        .collect()
}

fn default_etl_version() -> i64 {
    crate::db::state_repo::ETL_VERSION
}
