//! Commits accepted works into the canonical layout under a destination root,
//! then retires the tracked state of works that were fully moved.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use shared::organize::{OrganizeReport, OrganizeRequest};
use shared::work::{folder_key, WorkRecord, WorkStatus};
use tracing::{debug, error, info, warn};

use crate::error::{Result, ShelverError};
use crate::paths;
use crate::store::LibraryStore;
use crate::tracker::folder_path;

#[derive(Debug, Clone)]
pub struct Organizer {
    media_root: PathBuf,
    store: LibraryStore,
}

/// A finished commit, plus the source folder keys it read from.
#[derive(Debug, Clone, Default)]
pub struct CommitOutcome {
    pub report: OrganizeReport,
    pub touched: BTreeSet<String>,
}

/// How one work fared.
struct WorkOutcome {
    errors: usize,
    fully_moved: bool,
}

impl Organizer {
    pub fn new(media_root: impl Into<PathBuf>, store: LibraryStore) -> Self {
        Self {
            media_root: media_root.into(),
            store,
        }
    }

    /// Accepted works that have at least one suggestion.
    pub fn eligible_works(&self) -> Result<Vec<WorkRecord>> {
        Ok(self
            .store
            .load_records()?
            .into_iter()
            .map(|stored| stored.record)
            .filter(|r| r.status == WorkStatus::Accepted && !r.suggestions.is_empty())
            .collect())
    }

    pub fn organize(&self, request: &OrganizeRequest) -> Result<CommitOutcome> {
        let destination = PathBuf::from(&request.destination_root);
        if request.destination_root.trim().is_empty() || fs::create_dir_all(&destination).is_err() {
            return Err(ShelverError::DestinationUnavailable(destination));
        }

        let mut report = OrganizeReport::default();
        let mut touched = BTreeSet::new();
        let mut touched_keys = BTreeSet::new();
        let mut retire = Vec::new();

        for record in self.eligible_works()? {
            report.processed += 1;
            touched_keys.extend(record.original.paths.iter().map(|p| folder_key(p)));
            let outcome = self.commit_work(&record, &destination, request.copy_only, &mut touched, &mut report);
            report.errors += outcome.errors;
            if !request.copy_only && outcome.fully_moved {
                retire.push(record);
            }
        }

        if request.cleanup_empty_folders {
            report.cleaned_folders = self.remove_empty_folders(&touched);
        }

        for record in &retire {
            self.retire(record, &mut report);
        }

        info!(
            "Organized {} works into {}: {} errors, {} folders, {} records and {} covers cleaned",
            report.processed,
            destination.display(),
            report.errors,
            report.cleaned_folders,
            report.cleaned_metadata,
            report.cleaned_covers
        );
        Ok(CommitOutcome {
            report,
            touched: touched_keys,
        })
    }

    fn commit_work(
        &self,
        record: &WorkRecord,
        destination: &Path,
        copy_only: bool,
        touched: &mut BTreeSet<PathBuf>,
        report: &mut OrganizeReport,
    ) -> WorkOutcome {
        let title = &record.original.title;
        let layout = record
            .selected_suggestion()
            .and_then(|s| paths::generate(s.into(), &record.original.paths));
        let Some(layout) = layout else {
            error!("No path result for '{}' ({})", title, record.id);
            report.messages.push(format!("{}: no path result", title));
            return WorkOutcome {
                errors: 1,
                fully_moved: false,
            };
        };

        let mut errors = 0;
        for (source, target) in layout.original_paths.iter().zip(&layout.organized_paths) {
            let from = folder_path(&self.media_root, source);
            let to = folder_path(destination, target);
            if let Some(parent) = from.parent() {
                touched.insert(parent.to_path_buf());
            }
            match transfer(&from, &to, copy_only) {
                Ok(()) => debug!("{} -> {}", from.display(), to.display()),
                Err(e) => {
                    errors += 1;
                    error!("Failed to organize {}: {}", from.display(), e);
                    report.messages.push(format!("{}: {}", source, e));
                }
            }
        }
        WorkOutcome {
            errors,
            fully_moved: errors == 0,
        }
    }

    /// Touched folders and their ancestors below the media root, deepest
    /// first. Folders holding anything but hidden entries are left alone.
    fn remove_empty_folders(&self, touched: &BTreeSet<PathBuf>) -> usize {
        let mut candidates = BTreeSet::new();
        for folder in touched {
            let mut current = Some(folder.as_path());
            while let Some(dir) = current {
                if dir == self.media_root || !dir.starts_with(&self.media_root) {
                    break;
                }
                candidates.insert(dir.to_path_buf());
                current = dir.parent();
            }
        }

        let mut ordered: Vec<_> = candidates.into_iter().collect();
        ordered.sort_by_key(|dir| std::cmp::Reverse(dir.components().count()));

        let mut removed = 0;
        for dir in ordered {
            match only_hidden_entries(&dir) {
                Ok(true) => match fs::remove_dir_all(&dir) {
                    Ok(()) => {
                        debug!("Removed empty folder {}", dir.display());
                        removed += 1;
                    }
                    Err(e) => warn!("Could not remove folder {}: {}", dir.display(), e),
                },
                Ok(false) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!("Could not inspect folder {}: {}", dir.display(), e),
            }
        }
        removed
    }

    fn retire(&self, record: &WorkRecord, report: &mut OrganizeReport) {
        let lingering = record
            .original
            .paths
            .iter()
            .find(|p| folder_path(&self.media_root, p).exists());
        if let Some(path) = lingering {
            warn!(
                "Keeping record for '{}': {} still exists after the move",
                record.original.title, path
            );
            return;
        }

        match self.store.delete_record(&record.id) {
            Ok(true) => report.cleaned_metadata += 1,
            Ok(false) => {}
            Err(e) => {
                warn!("Could not remove record {}: {}", record.id, e);
                return;
            }
        }
        match self.store.delete_cover_for(&record.id) {
            Ok(Some(_)) => report.cleaned_covers += 1,
            Ok(None) => {}
            Err(e) => warn!("Could not remove cover for {}: {}", record.id, e),
        }
    }
}

fn only_hidden_entries(dir: &Path) -> io::Result<bool> {
    for entry in fs::read_dir(dir)? {
        if !entry?.file_name().to_string_lossy().starts_with('.') {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Copies or moves one file. Never overwrites; a rename that fails (for
/// example across filesystems) falls back to copy then remove.
fn transfer(from: &Path, to: &Path, copy_only: bool) -> io::Result<()> {
    if !from.is_file() {
        return Err(io::Error::new(io::ErrorKind::NotFound, "source file is missing"));
    }
    if to.exists() {
        return Err(io::Error::new(io::ErrorKind::AlreadyExists, "destination already exists"));
    }
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)?;
    }
    if copy_only {
        fs::copy(from, to)?;
        return Ok(());
    }
    if fs::rename(from, to).is_err() {
        fs::copy(from, to)?;
        if let Err(e) = fs::remove_file(from) {
            let _ = fs::remove_file(to);
            return Err(e);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::work::{OriginalMetadata, Suggestion};

    struct Fixture {
        _dir: tempfile::TempDir,
        media: PathBuf,
        dest: PathBuf,
        store: LibraryStore,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let media = dir.path().join("media");
            fs::create_dir_all(&media).unwrap();
            let store = LibraryStore::open(dir.path().join("meta"), dir.path().join("covers")).unwrap();
            Self {
                media,
                dest: dir.path().join("library"),
                store,
                _dir: dir,
            }
        }

        fn touch(&self, relative: &str) {
            let path = self.media.join(relative);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, b"audio").unwrap();
        }

        fn accepted(&self, title: &str, paths: &[&str]) -> WorkRecord {
            let mut record = WorkRecord::new(OriginalMetadata {
                title: title.into(),
                paths: paths.iter().map(|p| p.to_string()).collect(),
                ..Default::default()
            });
            record.suggestions = vec![Suggestion {
                sequence_id: 1,
                title: title.into(),
                ..Default::default()
            }];
            record.selected_suggestion_id = Some(1);
            record.status = WorkStatus::Accepted;
            self.store.save_record(&record).unwrap();
            fs::write(self.store.covers_dir().join(format!("{}.jpg", record.id)), b"img").unwrap();
            record
        }

        fn organizer(&self) -> Organizer {
            Organizer::new(&self.media, self.store.clone())
        }

        fn request(&self, copy_only: bool, cleanup_empty_folders: bool) -> OrganizeRequest {
            OrganizeRequest {
                destination_root: self.dest.to_string_lossy().into_owned(),
                copy_only,
                cleanup_empty_folders,
            }
        }
    }

    #[test]
    fn partial_move_keeps_the_record_while_complete_moves_are_retired() {
        let fx = Fixture::new();
        fx.touch("Broken/01.mp3");
        fx.touch("Solo/book.m4b");
        let broken = fx.accepted("Broken", &["Broken/01.mp3", "Broken/02.mp3"]);
        let solo = fx.accepted("Solo", &["Solo/book.m4b"]);

        let report = fx.organizer().organize(&fx.request(false, false)).unwrap().report;
        assert_eq!(report.processed, 2);
        assert_eq!(report.errors, 1);
        assert_eq!(report.cleaned_metadata, 1);
        assert_eq!(report.cleaned_covers, 1);

        assert!(fx.store.load_record(&broken.id).unwrap().is_some());
        assert!(fx.store.find_cover(&broken.id).is_some());
        assert!(fx.store.load_record(&solo.id).unwrap().is_none());
        assert!(fx.dest.join("Solo/Solo/Solo.m4b").is_file());
        assert!(fx.dest.join("Broken/Broken/Broken [Part 01].mp3").is_file());
    }

    #[test]
    fn copy_mode_never_retires_records() {
        let fx = Fixture::new();
        fx.touch("Solo/book.m4b");
        let solo = fx.accepted("Solo", &["Solo/book.m4b"]);

        let outcome = fx.organizer().organize(&fx.request(true, true)).unwrap();
        assert_eq!(outcome.touched, BTreeSet::from(["Solo".to_string()]));
        let report = outcome.report;
        assert_eq!(report.errors, 0);
        assert_eq!(report.cleaned_metadata, 0);
        assert_eq!(report.cleaned_folders, 0);
        assert!(fx.media.join("Solo/book.m4b").is_file());
        assert!(fx.store.load_record(&solo.id).unwrap().is_some());
    }

    #[test]
    fn only_accepted_works_with_suggestions_are_committed() {
        let fx = Fixture::new();
        fx.touch("Pending/a.mp3");
        let mut pending = fx.accepted("Pending", &["Pending/a.mp3"]);
        pending.status = WorkStatus::Pending;
        fx.store.save_record(&pending).unwrap();

        let report = fx.organizer().organize(&fx.request(false, false)).unwrap().report;
        assert_eq!(report.processed, 0);
        assert!(fx.media.join("Pending/a.mp3").is_file());
    }

    #[test]
    fn existing_destination_is_never_overwritten() {
        let fx = Fixture::new();
        fx.touch("Solo/book.m4b");
        let solo = fx.accepted("Solo", &["Solo/book.m4b"]);
        let target = fx.dest.join("Solo/Solo/Solo.m4b");
        fs::create_dir_all(target.parent().unwrap()).unwrap();
        fs::write(&target, b"keep me").unwrap();

        let report = fx.organizer().organize(&fx.request(false, false)).unwrap().report;
        assert_eq!(report.errors, 1);
        assert_eq!(fs::read(&target).unwrap(), b"keep me");
        assert!(fx.store.load_record(&solo.id).unwrap().is_some());
    }

    #[test]
    fn emptied_folders_are_removed_unless_they_hold_visible_files() {
        let fx = Fixture::new();
        fx.touch("Author/One/a.mp3");
        fx.touch("Two/b.mp3");
        fs::write(fx.media.join("Two/.DS_Store"), b"").unwrap();
        fx.touch("Three/c.mp3");
        fs::write(fx.media.join("Three/notes.txt"), b"keep").unwrap();
        fx.accepted("One", &["Author/One/a.mp3"]);
        fx.accepted("Two", &["Two/b.mp3"]);
        fx.accepted("Three", &["Three/c.mp3"]);

        let report = fx.organizer().organize(&fx.request(false, true)).unwrap().report;
        assert_eq!(report.errors, 0);
        assert_eq!(report.cleaned_folders, 3);
        assert!(!fx.media.join("Author").exists());
        assert!(!fx.media.join("Two").exists());
        assert!(fx.media.join("Three/notes.txt").is_file());
        assert!(fx.media.is_dir());
        assert_eq!(report.cleaned_metadata, 3);
    }

    #[test]
    fn blank_destination_is_fatal() {
        let fx = Fixture::new();
        let request = OrganizeRequest {
            destination_root: "  ".into(),
            ..Default::default()
        };
        assert!(matches!(
            fx.organizer().organize(&request),
            Err(ShelverError::DestinationUnavailable(_))
        ));
    }
}
