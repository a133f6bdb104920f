use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShelverError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Work {work} has no suggestion with sequence id {sequence_id}")]
    InvalidSelection { work: String, sequence_id: u32 },

    #[error("No path result: {0}")]
    NoPathResult(String),

    #[error("Media root is unavailable: {}", .0.display())]
    MediaRootUnavailable(PathBuf),

    #[error("Destination is unavailable: {}", .0.display())]
    DestinationUnavailable(PathBuf),

    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, ShelverError>;
