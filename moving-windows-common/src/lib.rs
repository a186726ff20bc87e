pub mod config;
pub mod logging;
pub use config::{AggregationConfig, CacheConfig, Config, PlotConfig, StoreConfig};
pub use logging::init_logging;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MovingWindowsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("store error: {0}")]
    Store(String),
    #[error("run {run}: boundary marker {marker} not found in run information headers")]
    MissingBoundary { run: u32, marker: String },
    #[error("malformed validity header for {key} at {timestamp}: {detail}")]
    MalformedHeader {
        key: String,
        timestamp: i64,
        detail: String,
    },
    #[error("invalid bin scheme: {0}")]
    InvalidBinScheme(String),
    #[error("bin layout mismatch: expected {expected} bins, found {found}")]
    BinMismatch { expected: usize, found: usize },
    #[error("invalid artifact name: {0}")]
    InvalidArtifactName(String),
    #[error("config error: {0}")]
    Config(String),
    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, MovingWindowsError>;
