//! Centralized configuration management.
//!
//! All environment variables are read once through this module; the engine
//! itself only ever sees an explicit [`LibraryConfig`].

use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Duration;

use shelver::LibraryConfig;

const DEFAULT_WATCH_INTERVAL_SECS: u64 = 45;
const MIN_WATCH_INTERVAL_SECS: u64 = 10;
const MAX_WATCH_INTERVAL_SECS: u64 = 600;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// Source audiobook collection (default: "/audiobooks")
    pub media_root: PathBuf,
    /// Default organize destination (default: "/library")
    pub dest_root: PathBuf,
    /// Work records and the tracking summary (default: "./metadata")
    pub metadata_dir: PathBuf,
    /// Extracted cover art (default: "./covers")
    pub covers_dir: PathBuf,
    /// Polling period for the background watcher, clamped to 10..=600 seconds
    pub watch_interval_secs: u64,
    pub watch_enabled: bool,
    /// Catalog command (default: "audible")
    pub audible_cli: String,
    /// Upper bound for one catalog query (default: 30)
    pub catalog_timeout_secs: u64,
    /// Query Open Library and Google Books for series positions
    pub series_lookup: bool,
}

fn var_or(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// Anything but `false`/`0` (or unset) counts as on.
fn flag(name: &str) -> bool {
    match std::env::var(name) {
        Ok(v) => !matches!(v.trim().to_ascii_lowercase().as_str(), "false" | "0"),
        Err(_) => true,
    }
}

fn number(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            media_root: PathBuf::from(var_or("MEDIA_ROOT", "/audiobooks")),
            dest_root: PathBuf::from(var_or("DEST_ROOT", "/library")),
            metadata_dir: PathBuf::from(var_or("METADATA_DIR", "./metadata")),
            covers_dir: PathBuf::from(var_or("COVERS_DIR", "./covers")),
            watch_interval_secs: number("WATCH_INTERVAL_SECS", DEFAULT_WATCH_INTERVAL_SECS)
                .clamp(MIN_WATCH_INTERVAL_SECS, MAX_WATCH_INTERVAL_SECS),
            watch_enabled: flag("WATCH_ENABLED"),
            audible_cli: var_or("AUDIBLE_CLI", "audible"),
            catalog_timeout_secs: number("CATALOG_TIMEOUT_SECS", 30),
            series_lookup: flag("SERIES_LOOKUP"),
        }
    }

    pub fn library_config(&self) -> LibraryConfig {
        LibraryConfig::new(&self.media_root, &self.metadata_dir, &self.covers_dir)
    }

    pub fn watch_interval(&self) -> Duration {
        Duration::from_secs(self.watch_interval_secs)
    }

    pub fn catalog_timeout(&self) -> Duration {
        Duration::from_secs(self.catalog_timeout_secs)
    }
}

/// Global application configuration singleton.
/// Loaded once at startup from environment variables.
pub static CONFIG: LazyLock<AppConfig> = LazyLock::new(AppConfig::from_env);
