//! Groups audio files into works by folder and builds their records.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use regex::Regex;
use shared::work::{OriginalMetadata, WorkId, WorkRecord};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::error::{Result, ShelverError};
use crate::library::blocking;
use crate::ranking::CandidateRanker;
use crate::store::LibraryStore;
use crate::tags::is_audio_file;
use crate::tracker::{folder_path, relative_key};
use crate::traits::{keys, CoverExtractor, TagMap, TagReader};

static ASIN_IN_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)asin[:= ]?([A-Z0-9]{10})").expect("static asin pattern"));
static NARRATOR_IN_COMMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)narrat\w*(?:\s+by)?\s*[:\-]?\s*([^\n;]+)").expect("static narrator pattern")
});
static GENRE_SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[,;/]").expect("static genre pattern"));

/// Audio files sharing one parent folder.
#[derive(Debug, Clone, PartialEq)]
pub struct FolderGroup {
    pub key: String,
    /// Absolute paths in directory listing order.
    pub files: Vec<PathBuf>,
}

/// What one build pass produced.
#[derive(Debug, Default)]
pub struct BuildOutcome {
    pub records: Vec<WorkRecord>,
    /// Groups never attempted because the pass was cancelled.
    pub unfinished: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
pub enum ScanTarget<'a> {
    /// Everything under the media root, recursively.
    Full,
    /// Just these folder keys, each read non-recursively.
    Folders(&'a [String]),
}

/// Finds the folder groups a scan should (re)build.
pub fn collect_groups(media_root: &Path, target: ScanTarget<'_>) -> Result<Vec<FolderGroup>> {
    if !media_root.is_dir() {
        return Err(ShelverError::MediaRootUnavailable(media_root.to_path_buf()));
    }

    let mut groups: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    let mut collect = |walker: WalkDir| {
        for entry in walker.sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable path: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_file() || !is_audio_file(entry.path()) {
                continue;
            }
            if let Some(key) = relative_key(media_root, entry.path()) {
                groups
                    .entry(shared::work::folder_key(&key))
                    .or_default()
                    .push(entry.into_path());
            }
        }
    };

    match target {
        ScanTarget::Full => collect(WalkDir::new(media_root)),
        ScanTarget::Folders(keys) => {
            for key in keys {
                let dir = folder_path(media_root, key);
                if !dir.is_dir() {
                    warn!("Folder {} disappeared before it could be scanned", key);
                    continue;
                }
                collect(WalkDir::new(dir).min_depth(1).max_depth(1));
            }
        }
    }

    Ok(groups
        .into_iter()
        .map(|(key, files)| FolderGroup { key, files })
        .collect())
}

/// Leading integer of a track tag such as `"3/12"`; anything else is 0.
pub fn track_number(tags: Option<&TagMap>) -> u32 {
    tags.and_then(|t| t.get(keys::TRACK))
        .and_then(|v| v.split('/').next())
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(0)
}

fn narrator_from_comment(comment: &str) -> Option<String> {
    if !comment.to_lowercase().contains("narrat") {
        return None;
    }
    let narrator = NARRATOR_IN_COMMENT
        .captures(comment)
        .map(|caps| caps[1].trim().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| comment.trim().to_string());
    Some(narrator)
}

/// Derives the local record for one work from its members, already in play
/// order. Tag values come from the first member that has any.
pub fn build_original(folder_name: &str, members: &[(String, Option<TagMap>)]) -> OriginalMetadata {
    let tags = members
        .iter()
        .filter_map(|(_, tags)| tags.as_ref())
        .find(|t| t.has_tags());
    let get = |key: &str| tags.and_then(|t| t.get(key)).map(str::to_string);
    let comment = get(keys::COMMENT);

    let total_secs: f64 = members
        .iter()
        .filter_map(|(_, tags)| tags.as_ref())
        .map(|t| t.duration_secs)
        .sum();
    let runtime_minutes = (total_secs >= 60.0).then(|| (total_secs / 60.0) as u32);

    let title = get(keys::ALBUM)
        .or_else(|| get(keys::TITLE))
        .unwrap_or_else(|| folder_name.to_string());

    let identifier = get(keys::ASIN)
        .or_else(|| {
            comment
                .as_deref()
                .and_then(|c| ASIN_IN_COMMENT.captures(c))
                .map(|caps| caps[1].to_string())
        })
        .map(|id| id.to_uppercase());

    let genre = get(keys::GENRE)
        .map(|g| {
            GENRE_SEPARATORS
                .split(&g)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    OriginalMetadata {
        title,
        author: get(keys::ARTIST).or_else(|| get(keys::ALBUM_ARTIST)),
        narrator: get(keys::NARRATOR)
            .or_else(|| comment.as_deref().and_then(narrator_from_comment)),
        series: get(keys::SERIES),
        year: get(keys::YEAR),
        genre,
        runtime_minutes,
        identifier,
        cover: None,
        paths: members.iter().map(|(path, _)| path.clone()).collect(),
    }
}

/// Builds and persists work records for folder groups.
#[derive(Clone)]
pub struct WorkBuilder {
    media_root: PathBuf,
    store: LibraryStore,
    tag_reader: Arc<dyn TagReader>,
    cover_extractor: Arc<dyn CoverExtractor>,
    ranker: CandidateRanker,
}

impl WorkBuilder {
    pub fn new(
        media_root: impl Into<PathBuf>,
        store: LibraryStore,
        tag_reader: Arc<dyn TagReader>,
        cover_extractor: Arc<dyn CoverExtractor>,
        ranker: CandidateRanker,
    ) -> Self {
        Self {
            media_root: media_root.into(),
            store,
            tag_reader,
            cover_extractor,
            ranker,
        }
    }

    fn folder_name(&self, key: &str) -> String {
        let name = if key == "." {
            self.media_root.file_name().map(|n| n.to_string_lossy().into_owned())
        } else {
            key.rsplit('/').next().map(str::to_string)
        };
        name.filter(|n| !n.is_empty())
            .unwrap_or_else(|| "Unknown".to_string())
    }

    /// Builds one work for every group in `target`, replacing whatever
    /// records previously claimed those folders. A group that fails is logged
    /// and skipped. Stops early between groups when `cancel` fires.
    pub async fn build_works(
        &self,
        target: ScanTarget<'_>,
        cancel: Option<&CancellationToken>,
    ) -> Result<BuildOutcome> {
        let builder = self.clone();
        let folders = match target {
            ScanTarget::Full => None,
            ScanTarget::Folders(keys) => Some(keys.to_vec()),
        };
        let (groups, mut previous) = blocking(move || {
            let target = match &folders {
                None => ScanTarget::Full,
                Some(keys) => ScanTarget::Folders(keys.as_slice()),
            };
            let groups = collect_groups(&builder.media_root, target)?;
            Ok((groups, builder.records_by_folder()?))
        })
        .await?;

        let mut outcome = BuildOutcome::default();
        let mut groups = groups.into_iter();
        while let Some(group) = groups.next() {
            if cancel.is_some_and(|c| c.is_cancelled()) {
                info!("Scan cancelled after {} works", outcome.records.len());
                outcome.unfinished = std::iter::once(group)
                    .chain(groups)
                    .map(|g| g.key)
                    .collect();
                break;
            }
            let key = group.key.clone();
            let stale = previous.remove(&key).unwrap_or_default();
            match self.build_work(group, stale).await {
                Ok(record) => outcome.records.push(record),
                Err(e) => error!("Failed to build work for {}: {}", key, e),
            }
        }
        Ok(outcome)
    }

    /// Reads tags, extracts the cover, enriches and persists one work, then
    /// retires the `stale` records it replaces. Only enrichment runs on the
    /// async side.
    pub async fn build_work(&self, group: FolderGroup, stale: Vec<WorkId>) -> Result<WorkRecord> {
        let builder = self.clone();
        let mut record = blocking(move || Ok(builder.local_record(&group))).await?;

        let outcome = self.ranker.enrich(&record.original).await;
        record.suggestions = outcome.suggestions;
        record.selected_suggestion_id = outcome.selected_suggestion_id;
        record.last_search = Some(outcome.message);

        let builder = self.clone();
        blocking(move || {
            builder.store.save_record(&record)?;
            builder.retire(&stale, &record.id);
            Ok(record)
        })
        .await
    }

    /// The un-enriched record for one group, with its cover written.
    fn local_record(&self, group: &FolderGroup) -> WorkRecord {
        let mut members: Vec<(String, Option<TagMap>)> = group
            .files
            .iter()
            .filter_map(|path| {
                let key = relative_key(&self.media_root, path)?;
                Some((key, self.tag_reader.read_tags(path)))
            })
            .collect();
        members.sort_by_key(|(_, tags)| track_number(tags.as_ref()));

        let original = build_original(&self.folder_name(&group.key), &members);
        let mut record = WorkRecord::new(original);

        let first_tagged = members
            .iter()
            .filter_map(|(_, tags)| tags.as_ref())
            .find(|t| t.has_tags());
        if let Some(cover) = first_tagged.and_then(|t| self.cover_extractor.extract_cover(t)) {
            match self.store.write_cover(&record.id, &cover) {
                Ok(name) => record.original.cover = Some(name),
                Err(e) => warn!("Could not save cover for {}: {}", group.key, e),
            }
        }
        debug!(
            "Read '{}' from {} files in {}",
            record.original.title,
            record.original.paths.len(),
            group.key
        );
        record
    }

    fn records_by_folder(&self) -> Result<HashMap<String, Vec<WorkId>>> {
        let mut by_folder: HashMap<String, Vec<WorkId>> = HashMap::new();
        for stored in self.store.load_records()? {
            if let Some(folder) = stored.record.original.primary_folder() {
                by_folder.entry(folder).or_default().push(stored.record.id);
            }
        }
        Ok(by_folder)
    }

    fn retire(&self, stale: &[WorkId], replacement: &WorkId) {
        for id in stale.iter().filter(|id| *id != replacement) {
            if let Err(e) = self.store.delete_record(id) {
                warn!("Could not remove superseded record {}: {}", id, e);
                continue;
            }
            if let Err(e) = self.store.delete_cover_for(id) {
                warn!("Could not remove superseded cover {}: {}", id, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn tags() -> TagMap {
        TagMap::new()
    }

    #[test]
    fn track_numbers_parse_leading_integer() {
        assert_eq!(track_number(Some(&tags().with(keys::TRACK, "3/12"))), 3);
        assert_eq!(track_number(Some(&tags().with(keys::TRACK, "x"))), 0);
        assert_eq!(track_number(None), 0);
    }

    #[test]
    fn original_prefers_album_and_sums_runtime() {
        let mut first = tags()
            .with(keys::ALBUM, "The Hobbit")
            .with(keys::TITLE, "Chapter 1")
            .with(keys::ARTIST, "J.R.R. Tolkien")
            .with(keys::GENRE, "Fantasy; Classics")
            .with(keys::COMMENT, "ASIN=b0099sqw0k; Narrated by Andy Serkis");
        first.duration_secs = 1800.0;
        let mut second = tags().with(keys::ALBUM, "Ignored");
        second.duration_secs = 1830.0;

        let original = build_original(
            "Hobbit",
            &[
                ("Tolkien/Hobbit/01.mp3".into(), Some(first)),
                ("Tolkien/Hobbit/02.mp3".into(), Some(second)),
            ],
        );
        assert_eq!(original.title, "The Hobbit");
        assert_eq!(original.author.as_deref(), Some("J.R.R. Tolkien"));
        assert_eq!(original.narrator.as_deref(), Some("Andy Serkis"));
        assert_eq!(original.identifier.as_deref(), Some("B0099SQW0K"));
        assert_eq!(original.genre, vec!["Fantasy".to_string(), "Classics".to_string()]);
        assert_eq!(original.runtime_minutes, Some(60));
        assert_eq!(original.paths.len(), 2);
    }

    #[test]
    fn untagged_members_fall_back_to_folder_name() {
        let original = build_original(
            "Mystery Book",
            &[("Mystery Book/a.mp3".into(), None), ("Mystery Book/b.mp3".into(), Some(tags()))],
        );
        assert_eq!(original.title, "Mystery Book");
        assert_eq!(original.author, None);
        assert_eq!(original.runtime_minutes, None);
    }

    #[test]
    fn groups_by_parent_folder_and_reads_targets_non_recursively() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        for file in ["A/Book/02.mp3", "A/Book/01.mp3", "A/Book/notes.txt", "A/Book/Extras/x.mp3", "B/b.m4b"] {
            let path = root.join(file);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, b"x").unwrap();
        }

        let full = collect_groups(root, ScanTarget::Full).unwrap();
        let keys: Vec<_> = full.iter().map(|g| g.key.as_str()).collect();
        assert_eq!(keys, vec!["A/Book", "A/Book/Extras", "B"]);
        assert_eq!(
            full[0].files,
            vec![root.join("A/Book/01.mp3"), root.join("A/Book/02.mp3")]
        );

        let targeted = collect_groups(root, ScanTarget::Folders(&["A/Book".to_string(), "Gone".to_string()])).unwrap();
        assert_eq!(targeted.len(), 1);
        assert_eq!(targeted[0].files.len(), 2);
    }
}
