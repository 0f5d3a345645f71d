pub mod classify;
pub mod config;
pub mod crawler;
pub mod db;
pub mod error;
pub mod extractor;
pub mod numeric;

pub use classify::ResourceType;
pub use config::{load_config, Config};
pub use error::{ConfigError, ExtractError, JobdexError, Result};
