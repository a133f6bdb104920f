use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::work::{Suggestion, WorkId, WorkRecord};

/// What the tracker knows about one source folder.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FolderEntry {
    pub file_names: BTreeSet<String>,
    pub file_count: usize,
    /// Newest modification time among the folder's audio files, in
    /// milliseconds since the epoch. Kept integral so it reads back exactly.
    pub last_modified_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingSummary {
    pub created: Option<DateTime<Utc>>,
    pub last_scan: Option<DateTime<Utc>>,
    pub last_updated: Option<DateTime<Utc>>,
    pub tracked_folders: BTreeMap<String, FolderEntry>,
    pub work_count: usize,
    pub total_audio_files: usize,
    pub last_processed_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrphanReason {
    NoPaths,
    FilesMissing,
    FolderUntracked,
    Duplicate,
    Unreadable,
}

impl OrphanReason {
    pub fn describe(&self) -> &'static str {
        match self {
            OrphanReason::NoPaths => "no source paths",
            OrphanReason::FilesMissing => "source files no longer exist",
            OrphanReason::FolderUntracked => "source folder is not tracked",
            OrphanReason::Duplicate => "duplicate",
            OrphanReason::Unreadable => "record file could not be parsed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrphanedRecord {
    pub id: WorkId,
    pub title: String,
    pub reason: OrphanReason,
    /// Record file name inside the metadata directory.
    pub file: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OrphanReport {
    pub records: Vec<OrphanedRecord>,
    /// Cover file names inside the covers directory.
    pub covers: Vec<String>,
}

impl OrphanReport {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty() && self.covers.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CleanedKind {
    Metadata,
    Cover,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanedItem {
    pub kind: CleanedKind,
    pub file: String,
    pub title: Option<String>,
    pub reason: Option<OrphanReason>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CleanupReport {
    pub orphaned_metadata_count: usize,
    pub orphaned_covers_count: usize,
    pub cleaned_items: Vec<CleanedItem>,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResult {
    pub processed_count: usize,
    pub full: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ScanReport {
    pub last_scan: Option<DateTime<Utc>>,
    pub works_tracked: usize,
    pub current_audio_files: usize,
    pub current_folders: usize,
    pub orphaned_metadata: usize,
    pub orphaned_covers: usize,
    pub needs_cleanup: bool,
}

/// Outcome of one enrichment attempt for a single work.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EnrichmentOutcome {
    pub enhanced: bool,
    pub suggestions: Vec<Suggestion>,
    pub selected_suggestion_id: Option<u32>,
    pub total_results: usize,
    pub message: String,
}

impl EnrichmentOutcome {
    pub fn not_enhanced(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BulkEnrichReport {
    pub processed: usize,
    pub enhanced: usize,
    pub failed: usize,
    pub cancelled: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WorkPage {
    pub works: Vec<WorkRecord>,
    pub total: usize,
    pub offset: usize,
    pub limit: usize,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PurgeReport {
    pub removed_records: usize,
    pub removed_covers: usize,
    pub rebuilt: usize,
}
