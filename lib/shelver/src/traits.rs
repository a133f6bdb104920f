use async_trait::async_trait;
use shared::catalog::{CatalogQuery, CatalogRecord, SeriesInfo};
use std::collections::HashMap;
use std::path::Path;

use crate::error::Result;

/// Normalized tag names used in a [`TagMap`].
pub mod keys {
    pub const TITLE: &str = "title";
    pub const ALBUM: &str = "album";
    pub const ARTIST: &str = "artist";
    pub const ALBUM_ARTIST: &str = "album_artist";
    pub const NARRATOR: &str = "narrator";
    pub const COMMENT: &str = "comment";
    pub const GENRE: &str = "genre";
    pub const YEAR: &str = "year";
    pub const TRACK: &str = "track";
    pub const SERIES: &str = "series";
    pub const ASIN: &str = "asin";
}

/// Tag values read from one audio file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TagMap {
    values: HashMap<String, String>,
    pub duration_secs: f64,
    /// Raw embedded pictures, front cover first when the container says so.
    pub pictures: Vec<Vec<u8>>,
}

impl TagMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Blank values are dropped; the first value for a key wins.
    pub fn insert(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        let value = value.trim();
        if value.is_empty() {
            return;
        }
        self.values
            .entry(key.to_string())
            .or_insert_with(|| value.to_string());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn has_tags(&self) -> bool {
        !self.values.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CoverImage {
    pub data: Vec<u8>,
    pub extension: &'static str,
}

pub trait TagReader: Send + Sync {
    /// `None` when the file cannot be parsed at all.
    fn read_tags(&self, path: &Path) -> Option<TagMap>;
}

pub trait CoverExtractor: Send + Sync {
    fn extract_cover(&self, tags: &TagMap) -> Option<CoverImage>;
}

#[async_trait]
pub trait CatalogProvider: Send + Sync {
    fn id(&self) -> &'static str;
    fn name(&self) -> &'static str;

    async fn search(&self, query: &CatalogQuery, limit: usize) -> Result<Vec<CatalogRecord>>;
}

#[async_trait]
pub trait SeriesLookup: Send + Sync {
    fn id(&self) -> &'static str;
    fn name(&self) -> &'static str;

    async fn find_series_info(&self, title: &str, author: Option<&str>) -> Result<SeriesInfo>;
}

pub struct FallbackCatalogProvider {
    providers: Vec<Box<dyn CatalogProvider>>,
}

impl FallbackCatalogProvider {
    pub fn new(providers: Vec<Box<dyn CatalogProvider>>) -> Self {
        Self { providers }
    }
}

#[async_trait]
impl CatalogProvider for FallbackCatalogProvider {
    fn id(&self) -> &'static str {
        "fallback"
    }

    fn name(&self) -> &'static str {
        "Fallback"
    }

    async fn search(&self, query: &CatalogQuery, limit: usize) -> Result<Vec<CatalogRecord>> {
        for provider in &self.providers {
            match provider.search(query, limit).await {
                Ok(results) if !results.is_empty() => return Ok(results),
                Ok(_) => continue,
                Err(e) => {
                    tracing::warn!("{} failed: {}", provider.name(), e);
                    continue;
                }
            }
        }
        Ok(vec![])
    }
}

/// Asks each source in turn and returns the first answer that found a series.
pub struct FallbackSeriesLookup {
    sources: Vec<Box<dyn SeriesLookup>>,
}

impl FallbackSeriesLookup {
    pub fn new(sources: Vec<Box<dyn SeriesLookup>>) -> Self {
        Self { sources }
    }
}

#[async_trait]
impl SeriesLookup for FallbackSeriesLookup {
    fn id(&self) -> &'static str {
        "fallback"
    }

    fn name(&self) -> &'static str {
        "Fallback"
    }

    async fn find_series_info(&self, title: &str, author: Option<&str>) -> Result<SeriesInfo> {
        for source in &self.sources {
            match source.find_series_info(title, author).await {
                Ok(info) if info.found => return Ok(info),
                Ok(_) => continue,
                Err(e) => {
                    tracing::warn!("{} failed: {}", source.name(), e);
                    continue;
                }
            }
        }
        Ok(SeriesInfo::not_found())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ShelverError;

    struct Failing;
    struct Fixed(Vec<CatalogRecord>);

    #[async_trait]
    impl CatalogProvider for Failing {
        fn id(&self) -> &'static str {
            "failing"
        }
        fn name(&self) -> &'static str {
            "Failing"
        }
        async fn search(&self, _: &CatalogQuery, _: usize) -> Result<Vec<CatalogRecord>> {
            Err(ShelverError::Catalog("offline".into()))
        }
    }

    #[async_trait]
    impl CatalogProvider for Fixed {
        fn id(&self) -> &'static str {
            "fixed"
        }
        fn name(&self) -> &'static str {
            "Fixed"
        }
        async fn search(&self, _: &CatalogQuery, _: usize) -> Result<Vec<CatalogRecord>> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn fallback_skips_failing_providers() {
        let record = CatalogRecord {
            title: "Dune".into(),
            ..Default::default()
        };
        let provider = FallbackCatalogProvider::new(vec![
            Box::new(Failing),
            Box::new(Fixed(vec![])),
            Box::new(Fixed(vec![record.clone()])),
        ]);
        let results = provider
            .search(&CatalogQuery::free_text("dune"), 10)
            .await
            .unwrap();
        assert_eq!(results, vec![record]);
    }

    #[test]
    fn tag_map_ignores_blank_values_and_keeps_first() {
        let tags = TagMap::new()
            .with(keys::TITLE, "  ")
            .with(keys::ARTIST, "First")
            .with(keys::ARTIST, "Second");
        assert_eq!(tags.get(keys::TITLE), None);
        assert_eq!(tags.get(keys::ARTIST), Some("First"));
        assert!(tags.has_tags());
    }
}
