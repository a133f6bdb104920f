//! Change tracking: which source folders need a rescan, and which persisted
//! records and covers no longer have live source files behind them.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use chrono::Utc;
use itertools::Itertools;
use shared::library::{
    CleanedItem, CleanedKind, CleanupReport, FolderEntry, OrphanReason, OrphanReport,
    OrphanedRecord, ScanReport, TrackingSummary,
};
use shared::work::{folder_key, WorkId};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{Result, ShelverError};
use crate::store::{cover_stem, LibraryStore, StoredRecord};
use crate::tags::is_audio_file;

/// Current state of the media root.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FolderInventory {
    pub folders: BTreeMap<String, FolderEntry>,
    /// Every audio file, media-root-relative.
    pub files: BTreeSet<String>,
}

/// Folders due for (re)processing, plus the state they were judged against.
#[derive(Debug, Clone, Default)]
pub struct ScanPlan {
    pub due: Vec<String>,
    pub current: FolderInventory,
}

/// Media-root-relative path with `/` separators.
pub(crate) fn relative_key(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<_> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect();
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}

/// Absolute folder for a folder key.
pub(crate) fn folder_path(root: &Path, key: &str) -> PathBuf {
    if key == "." {
        root.to_path_buf()
    } else {
        key.split('/').fold(root.to_path_buf(), |acc, part| acc.join(part))
    }
}

fn modified_ms(path: &Path) -> u64 {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

#[derive(Debug, Clone)]
pub struct ChangeTracker {
    media_root: PathBuf,
    store: LibraryStore,
}

impl ChangeTracker {
    pub fn new(media_root: impl Into<PathBuf>, store: LibraryStore) -> Self {
        Self {
            media_root: media_root.into(),
            store,
        }
    }

    pub fn media_root(&self) -> &Path {
        &self.media_root
    }

    /// Walks the whole media root. Unreadable subtrees are skipped; a missing
    /// root is an error.
    pub fn inventory(&self) -> Result<FolderInventory> {
        if !self.media_root.is_dir() {
            return Err(ShelverError::MediaRootUnavailable(self.media_root.clone()));
        }

        let mut inventory = FolderInventory::default();
        for entry in WalkDir::new(&self.media_root).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable path during scan: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_file() || !is_audio_file(entry.path()) {
                continue;
            }
            let Some(key) = relative_key(&self.media_root, entry.path()) else {
                continue;
            };
            let name = entry.file_name().to_string_lossy().into_owned();
            let modified = modified_ms(entry.path());

            let folder = inventory.folders.entry(folder_key(&key)).or_default();
            folder.file_names.insert(name);
            folder.file_count = folder.file_names.len();
            folder.last_modified_ms = folder.last_modified_ms.max(modified);
            inventory.files.insert(key);
        }
        Ok(inventory)
    }

    /// New folders, and folders whose files or newest modification time moved
    /// since the last completed scan.
    pub fn get_folders_to_scan(&self) -> Result<ScanPlan> {
        let summary = self.store.load_summary()?;
        let current = self.inventory()?;
        let due = current
            .folders
            .iter()
            .filter(|(key, entry)| match summary.tracked_folders.get(*key) {
                None => true,
                Some(tracked) => {
                    tracked.last_modified_ms != entry.last_modified_ms
                        || tracked.file_count != entry.file_count
                        || tracked.file_names != entry.file_names
                }
            })
            .map(|(key, _)| key.clone())
            .collect::<Vec<_>>();
        debug!(
            "{} of {} folders due for scanning",
            due.len(),
            current.folders.len()
        );
        Ok(ScanPlan { due, current })
    }

    /// Read-only. Everything this reports is exactly what cleanup removes.
    pub fn find_orphaned_metadata(&self) -> Result<OrphanReport> {
        let summary = self.store.load_summary()?;
        let current = self.inventory()?;
        let scanned = self.store.scan_records()?;

        let mut orphans: Vec<OrphanedRecord> = scanned
            .unreadable
            .iter()
            .map(|file| OrphanedRecord {
                id: WorkId::from(cover_stem(file)),
                title: file.clone(),
                reason: OrphanReason::Unreadable,
                file: file.clone(),
            })
            .collect();
        let mut live: Vec<&StoredRecord> = Vec::new();
        for stored in &scanned.records {
            match orphan_reason(stored, &current, &summary) {
                Some(reason) => orphans.push(orphaned(stored, reason)),
                None => live.push(stored),
            }
        }

        // Latest record file wins a folder; ties go to the first file name.
        let groups = live
            .into_iter()
            .into_group_map_by(|s| s.record.original.primary_folder().unwrap_or_default());
        let mut live_ids: HashSet<&str> = HashSet::new();
        for (_, mut claimants) in groups {
            claimants.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| a.file.cmp(&b.file)));
            let mut claimants = claimants.into_iter();
            if let Some(winner) = claimants.next() {
                live_ids.insert(winner.record.id.as_str());
            }
            orphans.extend(claimants.map(|s| orphaned(s, OrphanReason::Duplicate)));
        }
        orphans.sort_by(|a, b| a.file.cmp(&b.file));

        let covers = self
            .store
            .cover_files()?
            .into_iter()
            .filter(|name| !live_ids.contains(cover_stem(name)))
            .collect();

        Ok(OrphanReport {
            records: orphans,
            covers,
        })
    }

    /// Deletes (or, on a dry run, only lists) every orphaned record and cover.
    /// Counts cover everything found; `cleaned_items` lists what was removed.
    pub fn cleanup_orphaned_data(&self, dry_run: bool) -> Result<CleanupReport> {
        let orphans = self.find_orphaned_metadata()?;
        let mut report = CleanupReport {
            orphaned_metadata_count: orphans.records.len(),
            orphaned_covers_count: orphans.covers.len(),
            cleaned_items: Vec::new(),
            dry_run,
        };

        for orphan in orphans.records {
            if !dry_run {
                if let Err(e) = self.store.delete_record_file(&orphan.file) {
                    warn!("Failed to delete orphaned record {}: {}", orphan.file, e);
                    continue;
                }
            }
            report.cleaned_items.push(CleanedItem {
                kind: CleanedKind::Metadata,
                file: orphan.file,
                title: Some(orphan.title),
                reason: Some(orphan.reason),
            });
        }

        for cover in orphans.covers {
            if !dry_run {
                if let Err(e) = self.store.delete_cover_file(&cover) {
                    warn!("Failed to delete orphaned cover {}: {}", cover, e);
                    continue;
                }
            }
            report.cleaned_items.push(CleanedItem {
                kind: CleanedKind::Cover,
                file: cover,
                title: None,
                reason: None,
            });
        }

        info!(
            "{} {} orphaned records and {} orphaned covers",
            if dry_run { "Found" } else { "Cleaned" },
            report.orphaned_metadata_count,
            report.orphaned_covers_count
        );
        Ok(report)
    }

    /// Re-walks the media root and records it as the tracked state.
    pub fn update_tracking_after_scan(
        &self,
        processed_count: usize,
        unfinished: &[String],
    ) -> Result<TrackingSummary> {
        let current = self.inventory()?;
        self.update_tracking_with(processed_count, current, unfinished)
    }

    /// Records `current` as the tracked state, recounts persisted records and
    /// saves the summary. Folders in `unfinished` were never built, so they
    /// keep their previous entry, or stay untracked when they had none.
    pub fn update_tracking_with(
        &self,
        processed_count: usize,
        mut current: FolderInventory,
        unfinished: &[String],
    ) -> Result<TrackingSummary> {
        let mut summary = self.store.load_summary()?;
        for key in unfinished {
            match summary.tracked_folders.get(key) {
                Some(previous) => {
                    current.folders.insert(key.clone(), previous.clone());
                }
                None => {
                    current.folders.remove(key);
                }
            }
        }
        if !unfinished.is_empty() {
            info!("{} folders left for the next scan", unfinished.len());
        }

        let now = Utc::now();
        summary.created.get_or_insert(now);
        summary.last_scan = Some(now);
        summary.last_updated = Some(now);
        summary.total_audio_files = tracked_file_count(&current.folders);
        summary.tracked_folders = current.folders;
        summary.work_count = self.store.count_records()?;
        summary.last_processed_count = processed_count;
        self.store.save_summary(&summary)?;
        debug!(
            "Tracking {} folders, {} works",
            summary.tracked_folders.len(),
            summary.work_count
        );
        Ok(summary)
    }

    /// After a commit: tracked folders that no longer hold audio are dropped
    /// and the `touched` ones are re-read. Folders the last scan never saw
    /// stay untracked until a scan builds them.
    pub fn refresh_tracking_after_commit(
        &self,
        touched: &BTreeSet<String>,
    ) -> Result<TrackingSummary> {
        let mut summary = self.store.load_summary()?;
        let mut current = self.inventory()?;
        summary.tracked_folders = std::mem::take(&mut summary.tracked_folders)
            .into_iter()
            .filter_map(|(key, tracked)| {
                let entry = current.folders.remove(&key)?;
                let entry = if touched.contains(&key) { entry } else { tracked };
                Some((key, entry))
            })
            .collect();
        summary.total_audio_files = tracked_file_count(&summary.tracked_folders);
        summary.work_count = self.store.count_records()?;
        summary.last_updated = Some(Utc::now());
        self.store.save_summary(&summary)?;
        debug!(
            "Tracking {} folders after commit",
            summary.tracked_folders.len()
        );
        Ok(summary)
    }

    pub fn scan_report(&self) -> Result<ScanReport> {
        let summary = self.store.load_summary()?;
        let current = self.inventory()?;
        let orphans = self.find_orphaned_metadata()?;
        Ok(ScanReport {
            last_scan: summary.last_scan,
            works_tracked: self.store.count_records()?,
            current_audio_files: current.files.len(),
            current_folders: current.folders.len(),
            orphaned_metadata: orphans.records.len(),
            orphaned_covers: orphans.covers.len(),
            needs_cleanup: !orphans.is_empty(),
        })
    }
}

fn tracked_file_count(folders: &BTreeMap<String, FolderEntry>) -> usize {
    folders.values().map(|entry| entry.file_count).sum()
}

fn orphan_reason(
    stored: &StoredRecord,
    current: &FolderInventory,
    summary: &TrackingSummary,
) -> Option<OrphanReason> {
    let paths = &stored.record.original.paths;
    if paths.is_empty() {
        return Some(OrphanReason::NoPaths);
    }
    if !paths.iter().any(|p| current.files.contains(p)) {
        return Some(OrphanReason::FilesMissing);
    }
    if paths
        .iter()
        .any(|p| !summary.tracked_folders.contains_key(&folder_key(p)))
    {
        return Some(OrphanReason::FolderUntracked);
    }
    None
}

fn orphaned(stored: &StoredRecord, reason: OrphanReason) -> OrphanedRecord {
    OrphanedRecord {
        id: stored.record.id.clone(),
        title: stored.record.original.title.clone(),
        reason,
        file: stored.file.clone(),
    }
}
