//! Audio tag reading backed by `lofty`, and embedded cover extraction.

use std::path::Path;

use lofty::picture::PictureType;
use lofty::prelude::*;
use tracing::debug;

use crate::traits::{keys, CoverExtractor, CoverImage, TagMap, TagReader};

/// Extensions (lowercase, no dot) treated as audiobook audio files.
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "m4b", "m4a", "flac", "aac", "ogg", "opus", "wav"];

/// Audio by extension. Hidden files such as `._chapter.mp3` resource forks
/// never count.
pub fn is_audio_file(path: &Path) -> bool {
    let hidden = path
        .file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.'))
        .unwrap_or(true);
    if hidden {
        return false;
    }
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| AUDIO_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LoftyTagReader;

impl LoftyTagReader {
    pub fn new() -> Self {
        Self
    }
}

impl TagReader for LoftyTagReader {
    fn read_tags(&self, path: &Path) -> Option<TagMap> {
        let tagged = match lofty::read_from_path(path) {
            Ok(tagged) => tagged,
            Err(e) => {
                debug!("Could not parse {}: {}", path.display(), e);
                return None;
            }
        };

        let mut tags = TagMap::new();
        tags.duration_secs = tagged.properties().duration().as_secs_f64();

        let Some(tag) = tagged.primary_tag().or_else(|| tagged.first_tag()) else {
            return Some(tags);
        };

        let mapped = [
            (keys::TITLE, ItemKey::TrackTitle),
            (keys::ALBUM, ItemKey::AlbumTitle),
            (keys::ARTIST, ItemKey::TrackArtist),
            (keys::ALBUM_ARTIST, ItemKey::AlbumArtist),
            (keys::COMMENT, ItemKey::Comment),
            (keys::GENRE, ItemKey::Genre),
            (keys::YEAR, ItemKey::RecordingDate),
        ];
        for (key, item_key) in mapped {
            if let Some(value) = tag.get_string(&item_key) {
                tags.insert(key, value);
            }
        }
        if let Some(year) = tag.year() {
            tags.insert(keys::YEAR, year.to_string());
        }
        if let Some(track) = tag.track() {
            tags.insert(keys::TRACK, track.to_string());
        }

        // Freeform frames/atoms come through as unknown keys, sometimes with a
        // vendor prefix such as "----:com.apple.iTunes:".
        for item in tag.items() {
            if let ItemKey::Unknown(name) = item.key() {
                let Some(text) = item.value().text() else {
                    continue;
                };
                let name = name.to_ascii_lowercase();
                if name.ends_with("narrator") {
                    tags.insert(keys::NARRATOR, text);
                } else if name.ends_with("asin") {
                    tags.insert(keys::ASIN, text);
                } else if name.ends_with("series") {
                    tags.insert(keys::SERIES, text);
                }
            }
        }
        if let Some(composer) = tag.get_string(&ItemKey::Composer) {
            tags.insert(keys::NARRATOR, composer);
        }

        let mut pictures: Vec<_> = tag.pictures().iter().collect();
        pictures.sort_by_key(|p| p.pic_type() != PictureType::CoverFront);
        tags.pictures = pictures.into_iter().map(|p| p.data().to_vec()).collect();

        Some(tags)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddedCoverExtractor;

impl EmbeddedCoverExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl CoverExtractor for EmbeddedCoverExtractor {
    fn extract_cover(&self, tags: &TagMap) -> Option<CoverImage> {
        let data = tags.pictures.iter().find(|p| !p.is_empty())?;
        Some(CoverImage {
            extension: image_extension(data),
            data: data.clone(),
        })
    }
}

/// File extension for an image buffer, sniffed from its magic bytes.
pub fn image_extension(data: &[u8]) -> &'static str {
    match infer::get(data) {
        Some(kind) if kind.matcher_type() == infer::MatcherType::Image => match kind.extension() {
            "jpeg" => "jpg",
            other => other,
        },
        _ => "jpg",
    }
}
