//! On-disk persistence for work records, the tracking summary and cover assets.
//!
//! Every structure is read and written wholesale. Writes land in a hidden
//! temporary file first and are renamed into place.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::Serialize;
use shared::library::TrackingSummary;
use shared::work::{WorkId, WorkRecord};
use tracing::warn;

use crate::error::Result;
use crate::traits::CoverImage;

pub const SUMMARY_FILE: &str = "tracking_summary.json";

/// Image extensions probed when looking up a work's cover, in priority order.
pub const COVER_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif", "bmp"];

/// A record as found on disk, with the file it came from.
#[derive(Debug, Clone)]
pub struct StoredRecord {
    pub record: WorkRecord,
    pub file: String,
    pub modified: SystemTime,
}

/// Every record file, split into the ones that parsed and the ones that did not.
#[derive(Debug, Clone, Default)]
pub struct RecordScan {
    pub records: Vec<StoredRecord>,
    /// Record file names whose contents are not a valid record.
    pub unreadable: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct LibraryStore {
    metadata_dir: PathBuf,
    covers_dir: PathBuf,
}

impl LibraryStore {
    pub fn open(metadata_dir: impl Into<PathBuf>, covers_dir: impl Into<PathBuf>) -> Result<Self> {
        let store = Self {
            metadata_dir: metadata_dir.into(),
            covers_dir: covers_dir.into(),
        };
        fs::create_dir_all(&store.metadata_dir)?;
        fs::create_dir_all(&store.covers_dir)?;
        Ok(store)
    }

    pub fn metadata_dir(&self) -> &Path {
        &self.metadata_dir
    }

    pub fn covers_dir(&self) -> &Path {
        &self.covers_dir
    }

    pub fn record_path(&self, id: &WorkId) -> PathBuf {
        self.metadata_dir.join(format!("{}.json", id))
    }

    pub fn load_record(&self, id: &WorkId) -> Result<Option<WorkRecord>> {
        match fs::read(self.record_path(id)) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save_record(&self, record: &WorkRecord) -> Result<()> {
        write_json_atomic(&self.record_path(&record.id), record)
    }

    /// Returns whether a file was actually removed.
    pub fn delete_record(&self, id: &WorkId) -> Result<bool> {
        remove_if_exists(&self.record_path(id))
    }

    pub fn delete_record_file(&self, file: &str) -> Result<bool> {
        remove_if_exists(&self.metadata_dir.join(file))
    }

    /// Names of every record file, sorted, excluding the summary.
    pub fn record_files(&self) -> Result<Vec<String>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.metadata_dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name == SUMMARY_FILE || name.starts_with('.') || !name.ends_with(".json") {
                continue;
            }
            if entry.file_type()?.is_file() {
                files.push(name);
            }
        }
        files.sort();
        Ok(files)
    }

    pub fn count_records(&self) -> Result<usize> {
        Ok(self.record_files()?.len())
    }

    /// Loads every readable record. Files that fail to parse are skipped with
    /// a warning so one bad file never hides the rest.
    pub fn load_records(&self) -> Result<Vec<StoredRecord>> {
        Ok(self.scan_records()?.records)
    }

    /// Like `load_records`, but also names the files that failed to parse.
    pub fn scan_records(&self) -> Result<RecordScan> {
        let mut scan = RecordScan::default();
        for file in self.record_files()? {
            let path = self.metadata_dir.join(&file);
            let modified = match fs::metadata(&path).and_then(|m| m.modified()) {
                Ok(modified) => modified,
                Err(e) => {
                    warn!("Skipping record {}: {}", file, e);
                    continue;
                }
            };
            let bytes = match fs::read(&path) {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!("Skipping record {}: {}", file, e);
                    continue;
                }
            };
            match serde_json::from_slice::<WorkRecord>(&bytes) {
                Ok(record) => scan.records.push(StoredRecord {
                    record,
                    file,
                    modified,
                }),
                Err(e) => {
                    warn!("Skipping unreadable record {}: {}", file, e);
                    scan.unreadable.push(file);
                }
            }
        }
        Ok(scan)
    }

    /// Loads the summary, or a fresh one when none exists or it is corrupt.
    pub fn load_summary(&self) -> Result<TrackingSummary> {
        let path = self.metadata_dir.join(SUMMARY_FILE);
        match fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(summary) => Ok(summary),
                Err(e) => {
                    warn!("Tracking summary is corrupt, starting fresh: {}", e);
                    Ok(TrackingSummary::default())
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(TrackingSummary::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save_summary(&self, summary: &TrackingSummary) -> Result<()> {
        write_json_atomic(&self.metadata_dir.join(SUMMARY_FILE), summary)
    }

    pub fn delete_summary(&self) -> Result<bool> {
        remove_if_exists(&self.metadata_dir.join(SUMMARY_FILE))
    }

    /// Writes `<id>.<ext>` and returns the file name.
    pub fn write_cover(&self, id: &WorkId, cover: &CoverImage) -> Result<String> {
        let name = format!("{}.{}", id, cover.extension);
        write_atomic(&self.covers_dir.join(&name), &cover.data)?;
        Ok(name)
    }

    /// First existing cover for `id` among the known extensions.
    pub fn find_cover(&self, id: &WorkId) -> Option<String> {
        COVER_EXTENSIONS
            .iter()
            .map(|ext| format!("{}.{}", id, ext))
            .find(|name| self.covers_dir.join(name).is_file())
    }

    /// Deletes the first cover found for `id` and returns its file name.
    pub fn delete_cover_for(&self, id: &WorkId) -> Result<Option<String>> {
        match self.find_cover(id) {
            Some(name) => {
                remove_if_exists(&self.covers_dir.join(&name))?;
                Ok(Some(name))
            }
            None => Ok(None),
        }
    }

    pub fn delete_cover_file(&self, file: &str) -> Result<bool> {
        remove_if_exists(&self.covers_dir.join(file))
    }

    /// Names of every cover asset, sorted.
    pub fn cover_files(&self) -> Result<Vec<String>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.covers_dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') || !entry.file_type()?.is_file() {
                continue;
            }
            files.push(name);
        }
        files.sort();
        Ok(files)
    }
}

/// File stem of a cover name, i.e. the work id it belongs to.
pub fn cover_stem(file: &str) -> &str {
    Path::new(file)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file)
}

fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value)?;
    write_atomic(path, &bytes)
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!(".{}.tmp", file_name));
    fs::write(&tmp, bytes)?;
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}

fn remove_if_exists(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::library::FolderEntry;
    use shared::work::OriginalMetadata;

    fn store() -> (tempfile::TempDir, LibraryStore) {
        let dir = tempfile::tempdir().unwrap();
        let store =
            LibraryStore::open(dir.path().join("metadata"), dir.path().join("covers")).unwrap();
        (dir, store)
    }

    #[test]
    fn records_round_trip_and_summary_is_excluded() {
        let (_dir, store) = store();
        let record = WorkRecord::new(OriginalMetadata {
            title: "Dune".into(),
            paths: vec!["Herbert/Dune/01.mp3".into()],
            ..Default::default()
        });
        store.save_record(&record).unwrap();
        store.save_summary(&TrackingSummary::default()).unwrap();

        assert_eq!(store.load_record(&record.id).unwrap(), Some(record.clone()));
        assert_eq!(store.record_files().unwrap(), vec![format!("{}.json", record.id)]);
        assert_eq!(store.count_records().unwrap(), 1);
        assert!(store.delete_record(&record.id).unwrap());
        assert!(!store.delete_record(&record.id).unwrap());
    }

    #[test]
    fn unreadable_records_are_skipped() {
        let (_dir, store) = store();
        fs::write(store.metadata_dir().join("garbage.json"), b"{not json").unwrap();
        let record = WorkRecord::new(OriginalMetadata::default());
        store.save_record(&record).unwrap();

        let loaded = store.load_records().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].record.id, record.id);

        let scan = store.scan_records().unwrap();
        assert_eq!(scan.records.len(), 1);
        assert_eq!(scan.unreadable, vec!["garbage.json".to_string()]);
    }

    #[test]
    fn missing_or_corrupt_summary_defaults() {
        let (_dir, store) = store();
        assert_eq!(store.load_summary().unwrap(), TrackingSummary::default());
        fs::write(store.metadata_dir().join(SUMMARY_FILE), b"[]").unwrap();
        assert_eq!(store.load_summary().unwrap(), TrackingSummary::default());
    }

    #[test]
    fn folder_mtimes_read_back_exactly() {
        let (_dir, store) = store();
        let mut summary = TrackingSummary::default();
        for i in 0..5_000u64 {
            let entry = FolderEntry {
                file_names: ["01.mp3".to_string()].into_iter().collect(),
                file_count: 1,
                last_modified_ms: 1_760_000_000_123 + i * 7_919,
            };
            summary.tracked_folders.insert(format!("Author/Book {}", i), entry);
        }
        store.save_summary(&summary).unwrap();
        assert_eq!(store.load_summary().unwrap(), summary);
    }

    #[test]
    fn cover_lookup_uses_first_known_extension() {
        let (_dir, store) = store();
        let id = WorkId::new();
        let name = store
            .write_cover(
                &id,
                &CoverImage {
                    data: vec![1, 2, 3],
                    extension: "png",
                },
            )
            .unwrap();
        assert_eq!(name, format!("{}.png", id));
        assert_eq!(store.find_cover(&id), Some(name.clone()));
        assert_eq!(cover_stem(&name), id.as_str());
        assert_eq!(store.delete_cover_for(&id).unwrap(), Some(name));
        assert!(store.cover_files().unwrap().is_empty());
    }
}
