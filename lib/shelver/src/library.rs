//! The engine's front door. Every mutating operation runs under one lock so
//! scans, enrichment and commits never interleave their wholesale writes.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use shared::events::LibraryEventKind;
use shared::library::{
    BulkEnrichReport, CleanupReport, EnrichmentOutcome, OrphanReport, PurgeReport, ScanReport,
    ScanResult, WorkPage,
};
use shared::organize::{OrganizeReport, OrganizeRequest, PathResult};
use shared::work::{Suggestion, WorkId, WorkRecord, WorkStatus};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::{Result, ShelverError};
use crate::events::EventBus;
use crate::organizer::{CommitOutcome, Organizer};
use crate::paths;
use crate::ranking::CandidateRanker;
use crate::scanner::{BuildOutcome, ScanTarget, WorkBuilder};
use crate::services::Services;
use crate::store::LibraryStore;
use crate::tracker::ChangeTracker;

#[derive(Debug, Clone, PartialEq)]
pub struct LibraryConfig {
    pub media_root: PathBuf,
    pub metadata_dir: PathBuf,
    pub covers_dir: PathBuf,
    /// Catalog provider id; the registry default when `None`.
    pub catalog: Option<String>,
    /// Series lookup id; the registry default when `None`.
    pub series: Option<String>,
}

impl LibraryConfig {
    pub fn new(
        media_root: impl Into<PathBuf>,
        metadata_dir: impl Into<PathBuf>,
        covers_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            media_root: media_root.into(),
            metadata_dir: metadata_dir.into(),
            covers_dir: covers_dir.into(),
            catalog: None,
            series: None,
        }
    }
}

/// Runs filesystem work off the async worker threads.
pub(crate) async fn blocking<T, F>(task: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task).await?
}

pub struct Library {
    media_root: PathBuf,
    store: LibraryStore,
    tracker: ChangeTracker,
    builder: WorkBuilder,
    ranker: CandidateRanker,
    organizer: Organizer,
    events: EventBus,
    op_lock: Mutex<()>,
    cancel: CancellationToken,
}

impl Library {
    pub fn new(config: LibraryConfig, services: Arc<Services>) -> Result<Self> {
        let store = LibraryStore::open(&config.metadata_dir, &config.covers_dir)?;
        let catalog = services
            .catalog(config.catalog.as_deref())
            .cloned()
            .ok_or_else(|| ShelverError::Config("no catalog provider configured".into()))?;
        let ranker = CandidateRanker::new(catalog, services.series(config.series.as_deref()).cloned());
        let builder = WorkBuilder::new(
            &config.media_root,
            store.clone(),
            services.tag_reader().clone(),
            services.cover_extractor().clone(),
            ranker.clone(),
        );

        Ok(Self {
            tracker: ChangeTracker::new(&config.media_root, store.clone()),
            organizer: Organizer::new(&config.media_root, store.clone()),
            media_root: config.media_root,
            store,
            builder,
            ranker,
            events: EventBus::new(),
            op_lock: Mutex::new(()),
            cancel: CancellationToken::new(),
        })
    }

    pub fn media_root(&self) -> &Path {
        &self.media_root
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Cancelling stops long operations between works and ends the watcher.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn load(&self, id: &WorkId) -> Result<WorkRecord> {
        self.store
            .load_record(id)?
            .ok_or_else(|| ShelverError::NotFound(format!("work {}", id)))
    }

    fn save_updated(&self, record: &WorkRecord) -> Result<()> {
        self.store.save_record(record)?;
        self.events.publish(LibraryEventKind::WorkUpdated {
            id: record.id.clone(),
            title: record.original.title.clone(),
        });
        Ok(())
    }

    pub async fn scan(&self, full: bool) -> Result<ScanResult> {
        let _guard = self.op_lock.lock().await;
        self.scan_locked(full).await
    }

    async fn scan_locked(&self, full: bool) -> Result<ScanResult> {
        self.events.publish(LibraryEventKind::ScanStarted { full });

        let processed_count = if full {
            let outcome = self
                .builder
                .build_works(ScanTarget::Full, Some(&self.cancel))
                .await?;
            let tracker = self.tracker.clone();
            let processed = outcome.records.len();
            let unfinished = outcome.unfinished;
            blocking(move || tracker.update_tracking_after_scan(processed, &unfinished)).await?;
            processed
        } else {
            let tracker = self.tracker.clone();
            let plan = blocking(move || tracker.get_folders_to_scan()).await?;
            let outcome = if plan.due.is_empty() {
                info!("No changed folders since the last scan");
                BuildOutcome::default()
            } else {
                info!("{} folders changed since the last scan", plan.due.len());
                self.builder
                    .build_works(ScanTarget::Folders(&plan.due), Some(&self.cancel))
                    .await?
            };
            let tracker = self.tracker.clone();
            let processed = outcome.records.len();
            let unfinished = outcome.unfinished;
            blocking(move || tracker.update_tracking_with(processed, plan.current, &unfinished))
                .await?;
            processed
        };

        info!(
            "{} scan finished: {} works processed",
            if full { "Full" } else { "Incremental" },
            processed_count
        );
        self.events.publish(LibraryEventKind::ScanFinished {
            processed: processed_count,
            full,
        });
        Ok(ScanResult {
            processed_count,
            full,
        })
    }

    fn apply_outcome(record: &mut WorkRecord, outcome: &EnrichmentOutcome) {
        record.suggestions = outcome.suggestions.clone();
        record.selected_suggestion_id = outcome.selected_suggestion_id;
        record.last_search = Some(outcome.message.clone());
    }

    /// Re-queries the catalog for one work and replaces its suggestions.
    pub async fn enrich(&self, id: &WorkId) -> Result<EnrichmentOutcome> {
        let _guard = self.op_lock.lock().await;
        let mut record = self.load(id)?;
        let outcome = self.ranker.enrich(&record.original).await;
        Self::apply_outcome(&mut record, &outcome);
        self.save_updated(&record)?;
        Ok(outcome)
    }

    pub async fn manual_search(&self, id: &WorkId, query: &str) -> Result<EnrichmentOutcome> {
        let _guard = self.op_lock.lock().await;
        let mut record = self.load(id)?;
        let outcome = self.ranker.manual_search(&record.original, query).await;
        Self::apply_outcome(&mut record, &outcome);
        self.save_updated(&record)?;
        Ok(outcome)
    }

    /// Enriches up to `limit` works that have no suggestions yet, or every
    /// work when `force_refresh` is set.
    pub async fn bulk_enrich(&self, limit: usize, force_refresh: bool) -> Result<BulkEnrichReport> {
        let _guard = self.op_lock.lock().await;
        let pending: Vec<WorkRecord> = self
            .store
            .load_records()?
            .into_iter()
            .map(|stored| stored.record)
            .filter(|r| force_refresh || r.suggestions.is_empty())
            .take(limit)
            .collect();

        let mut report = BulkEnrichReport::default();
        for mut record in pending {
            if self.cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            report.processed += 1;
            let outcome = self.ranker.enrich(&record.original).await;
            Self::apply_outcome(&mut record, &outcome);
            if let Err(e) = self.save_updated(&record) {
                warn!("Could not save enriched '{}': {}", record.original.title, e);
                report.failed += 1;
                continue;
            }
            if outcome.enhanced {
                report.enhanced += 1;
            } else {
                report.failed += 1;
            }
        }
        info!(
            "Bulk enrichment: {} processed, {} enhanced, {} without results",
            report.processed, report.enhanced, report.failed
        );
        Ok(report)
    }

    pub async fn suggestions(&self, id: &WorkId) -> Result<Vec<Suggestion>> {
        Ok(self.load(id)?.suggestions)
    }

    pub async fn work(&self, id: &WorkId) -> Result<WorkRecord> {
        self.load(id)
    }

    pub async fn select_suggestion(&self, id: &WorkId, sequence_id: u32) -> Result<WorkRecord> {
        let _guard = self.op_lock.lock().await;
        let mut record = self.load(id)?;
        if record.suggestion(sequence_id).is_none() {
            return Err(ShelverError::InvalidSelection {
                work: id.to_string(),
                sequence_id,
            });
        }
        record.selected_suggestion_id = Some(sequence_id);
        self.save_updated(&record)?;
        Ok(record)
    }

    pub async fn set_status(&self, id: &WorkId, status: WorkStatus) -> Result<WorkRecord> {
        let _guard = self.op_lock.lock().await;
        let mut record = self.load(id)?;
        record.status = status;
        self.save_updated(&record)?;
        Ok(record)
    }

    /// Layout for one suggestion, the selected one when `sequence_id` is
    /// `None`, or the local metadata when the work has no suggestions.
    pub async fn generate_paths(&self, id: &WorkId, sequence_id: Option<u32>) -> Result<PathResult> {
        let record = self.load(id)?;
        if let Some(sequence_id) = sequence_id {
            if record.suggestion(sequence_id).is_none() {
                return Err(ShelverError::InvalidSelection {
                    work: id.to_string(),
                    sequence_id,
                });
            }
        }
        paths::generate_for_record(&record, sequence_id)
            .ok_or_else(|| ShelverError::NoPathResult(format!("work {} has no source files", id)))
    }

    pub async fn preview_organization(&self, id: &WorkId, sequence_id: Option<u32>) -> Result<String> {
        let result = self.generate_paths(id, sequence_id).await?;
        Ok(paths::preview(&result))
    }

    /// Works sorted by title, case-insensitively.
    pub async fn list_works(&self, offset: usize, limit: usize) -> Result<WorkPage> {
        let mut works: Vec<WorkRecord> = self
            .store
            .load_records()?
            .into_iter()
            .map(|stored| stored.record)
            .collect();
        works.sort_by_cached_key(|r| r.original.title.to_lowercase());
        let total = works.len();
        Ok(WorkPage {
            works: works.into_iter().skip(offset).take(limit).collect(),
            total,
            offset,
            limit,
        })
    }

    pub async fn find_orphans(&self) -> Result<OrphanReport> {
        let tracker = self.tracker.clone();
        blocking(move || tracker.find_orphaned_metadata()).await
    }

    pub async fn cleanup(&self, dry_run: bool) -> Result<CleanupReport> {
        let _guard = self.op_lock.lock().await;
        let tracker = self.tracker.clone();
        let report = blocking(move || tracker.cleanup_orphaned_data(dry_run)).await?;
        self.events.publish(LibraryEventKind::CleanupFinished {
            metadata: report.orphaned_metadata_count,
            covers: report.orphaned_covers_count,
            dry_run,
        });
        Ok(report)
    }

    /// Commits accepted works, then refreshes tracking so moved folders drop
    /// out of the tracked state.
    pub async fn organize(&self, request: OrganizeRequest) -> Result<OrganizeReport> {
        let _guard = self.op_lock.lock().await;
        let organizer = self.organizer.clone();
        let CommitOutcome { report, touched } =
            blocking(move || organizer.organize(&request)).await?;

        let tracker = self.tracker.clone();
        if let Err(e) = blocking(move || tracker.refresh_tracking_after_commit(&touched)).await {
            warn!("Could not refresh tracking after organize: {}", e);
        }
        self.events.publish(LibraryEventKind::OrganizeFinished {
            processed: report.processed,
            errors: report.errors,
        });
        Ok(report)
    }

    pub async fn scan_report(&self) -> Result<ScanReport> {
        let tracker = self.tracker.clone();
        blocking(move || tracker.scan_report()).await
    }

    /// Forgets everything persisted and rebuilds from a full scan.
    pub async fn purge_and_rescan(&self) -> Result<PurgeReport> {
        let _guard = self.op_lock.lock().await;
        let store = self.store.clone();
        let (removed_records, removed_covers) = blocking(move || {
            let mut records = 0;
            for file in store.record_files()? {
                if store.delete_record_file(&file)? {
                    records += 1;
                }
            }
            let mut covers = 0;
            for file in store.cover_files()? {
                if store.delete_cover_file(&file)? {
                    covers += 1;
                }
            }
            store.delete_summary()?;
            Ok((records, covers))
        })
        .await?;
        info!("Purged {} records and {} covers", removed_records, removed_covers);

        let rebuilt = self.scan_locked(true).await?.processed_count;
        Ok(PurgeReport {
            removed_records,
            removed_covers,
            rebuilt,
        })
    }
}
