//! Interval-based change detection that feeds incremental scans.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};

use shared::events::LibraryEventKind;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{Result, ShelverError};
use crate::library::Library;
use crate::tags::is_audio_file;
use crate::tracker::relative_key;

/// Audio file -> modification time in whole milliseconds.
pub type Snapshot = BTreeMap<String, u128>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub added: usize,
    pub modified: usize,
    pub removed: usize,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.added == 0 && self.modified == 0 && self.removed == 0
    }
}

pub fn snapshot(media_root: &Path) -> Result<Snapshot> {
    if !media_root.is_dir() {
        return Err(ShelverError::MediaRootUnavailable(media_root.to_path_buf()));
    }
    let mut files = Snapshot::new();
    for entry in WalkDir::new(media_root).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() || !is_audio_file(entry.path()) {
            continue;
        }
        let Some(key) = relative_key(media_root, entry.path()) else {
            continue;
        };
        let modified = entry
            .metadata()
            .ok()
            .and_then(|m| m.modified().ok())
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_millis())
            .unwrap_or(0);
        files.insert(key, modified);
    }
    Ok(files)
}

pub fn diff(previous: &Snapshot, current: &Snapshot) -> ChangeSet {
    let mut changes = ChangeSet::default();
    for (path, modified) in current {
        match previous.get(path) {
            None => changes.added += 1,
            Some(before) if before != modified => changes.modified += 1,
            Some(_) => {}
        }
    }
    changes.removed = previous.keys().filter(|p| !current.contains_key(*p)).count();
    changes
}

pub struct PollingWatcher {
    library: Arc<Library>,
    interval: Duration,
    cancel: CancellationToken,
}

impl PollingWatcher {
    /// Stops when either its own token or the library's is cancelled.
    pub fn new(library: Arc<Library>, interval: Duration) -> Self {
        let cancel = library.cancellation_token().child_token();
        Self {
            library,
            interval,
            cancel,
        }
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub async fn run(self) {
        info!(
            "Watching {} every {}s",
            self.library.media_root().display(),
            self.interval.as_secs()
        );
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut previous: Option<Snapshot> = None;

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let root = self.library.media_root().to_path_buf();
            let current = match tokio::task::spawn_blocking(move || snapshot(&root)).await {
                Ok(Ok(current)) => current,
                Ok(Err(e)) => {
                    warn!("Watcher could not read the media root: {}", e);
                    continue;
                }
                Err(e) => {
                    warn!("Watcher snapshot task failed: {}", e);
                    continue;
                }
            };

            let Some(before) = previous.replace(current) else {
                debug!("Watcher primed");
                continue;
            };
            let changes = previous
                .as_ref()
                .map(|now| diff(&before, now))
                .unwrap_or_default();
            if changes.is_empty() {
                continue;
            }

            info!(
                "Detected changes: {} added, {} modified, {} removed",
                changes.added, changes.modified, changes.removed
            );
            self.library.events().publish(LibraryEventKind::ChangesDetected {
                added: changes.added,
                modified: changes.modified,
                removed: changes.removed,
            });
            if let Err(e) = self.library.scan(false).await {
                warn!("Incremental scan after changes failed: {}", e);
            }
        }
        info!("Watcher stopped");
    }
}
