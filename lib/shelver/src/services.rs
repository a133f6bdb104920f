use std::collections::HashMap;
use std::sync::Arc;

use crate::{CatalogProvider, CoverExtractor, SeriesLookup, TagReader};

/// Collaborators the engine talks to, keyed by provider id.
pub struct Services {
    tag_reader: Arc<dyn TagReader>,
    cover_extractor: Arc<dyn CoverExtractor>,
    catalog: HashMap<String, Arc<dyn CatalogProvider>>,
    series: HashMap<String, Arc<dyn SeriesLookup>>,
    default_catalog: Option<String>,
    default_series: Option<String>,
}

impl Services {
    pub fn tag_reader(&self) -> &Arc<dyn TagReader> {
        &self.tag_reader
    }

    pub fn cover_extractor(&self) -> &Arc<dyn CoverExtractor> {
        &self.cover_extractor
    }

    pub fn catalog(&self, id: Option<&str>) -> Option<&Arc<dyn CatalogProvider>> {
        let key = id.or(self.default_catalog.as_deref())?;
        self.catalog.get(key)
    }

    pub fn series(&self, id: Option<&str>) -> Option<&Arc<dyn SeriesLookup>> {
        let key = id.or(self.default_series.as_deref())?;
        self.series.get(key)
    }

    pub fn list_catalogs(&self) -> Vec<(&str, &str)> {
        self.catalog
            .values()
            .map(|p| (p.id(), p.name()))
            .collect()
    }

    pub fn list_series(&self) -> Vec<(&str, &str)> {
        self.series
            .values()
            .map(|p| (p.id(), p.name()))
            .collect()
    }
}

pub struct ServicesBuilder {
    tag_reader: Option<Arc<dyn TagReader>>,
    cover_extractor: Option<Arc<dyn CoverExtractor>>,
    catalog: HashMap<String, Arc<dyn CatalogProvider>>,
    series: HashMap<String, Arc<dyn SeriesLookup>>,
    default_catalog: Option<String>,
    default_series: Option<String>,
}

impl ServicesBuilder {
    pub fn new() -> Self {
        Self {
            tag_reader: None,
            cover_extractor: None,
            catalog: HashMap::new(),
            series: HashMap::new(),
            default_catalog: None,
            default_series: None,
        }
    }

    pub fn tag_reader(mut self, reader: impl TagReader + 'static) -> Self {
        self.tag_reader = Some(Arc::new(reader));
        self
    }

    pub fn cover_extractor(mut self, extractor: impl CoverExtractor + 'static) -> Self {
        self.cover_extractor = Some(Arc::new(extractor));
        self
    }

    /// The first provider added becomes the default.
    pub fn add_catalog(mut self, provider: impl CatalogProvider + 'static) -> Self {
        let id = provider.id().to_string();
        if self.default_catalog.is_none() {
            self.default_catalog = Some(id.clone());
        }
        self.catalog.insert(id, Arc::new(provider));
        self
    }

    pub fn add_series(mut self, lookup: impl SeriesLookup + 'static) -> Self {
        let id = lookup.id().to_string();
        if self.default_series.is_none() {
            self.default_series = Some(id.clone());
        }
        self.series.insert(id, Arc::new(lookup));
        self
    }

    /// Series lookup is optional; everything else is required.
    pub fn build(self) -> Result<Services, &'static str> {
        let tag_reader = self.tag_reader.ok_or("a tag reader is required")?;
        let cover_extractor = self
            .cover_extractor
            .ok_or("a cover extractor is required")?;
        if self.catalog.is_empty() {
            return Err("at least one catalog provider required");
        }

        Ok(Services {
            tag_reader,
            cover_extractor,
            catalog: self.catalog,
            series: self.series,
            default_catalog: self.default_catalog,
            default_series: self.default_series,
        })
    }
}

impl Default for ServicesBuilder {
    fn default() -> Self {
        Self::new()
    }
}
