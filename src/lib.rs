//! Kolesa-Harvest: a resumable classifieds crawler
//!
//! This crate walks the listing pages of a classifieds site, collects the
//! detail page of every advert, extracts one record per advert and appends it
//! to a CSV file as soon as it is fetched. Re-running against an existing file
//! only fetches adverts that are not in it yet.

pub mod config;
pub mod crawler;
pub mod frontier;
pub mod geo;
pub mod output;
pub mod reconcile;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Kolesa-Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Storage error: {0}")]
    Store(#[from] storage::StoreError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid CSS selector for {field}: {selector}")]
    InvalidSelector { field: &'static str, selector: String },

    #[error("Unknown text encoding: {0}")]
    UnknownEncoding(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Link cannot be followed: {0}")]
    NotFollowable(String),
}

/// Result type alias for Kolesa-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use frontier::{Frontier, WorkItem};
pub use reconcile::{pending_work, ResumeMode};
pub use state::ItemState;
pub use storage::{CsvStore, Record, RecordStore};
pub use crate::url::{normalize_url, resolve_link};
