#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use shared::catalog::{CatalogQuery, CatalogRecord};
use shelver::traits::keys;
use shelver::{
    CatalogProvider, CoverExtractor, CoverImage, Library, LibraryConfig, Services, ServicesBuilder,
    TagMap, TagReader,
};
use tempfile::TempDir;

/// Tags keyed by file name.
#[derive(Default, Clone)]
pub struct FakeTags(pub HashMap<String, TagMap>);

impl TagReader for FakeTags {
    fn read_tags(&self, path: &Path) -> Option<TagMap> {
        let name = path.file_name()?.to_str()?;
        self.0.get(name).cloned()
    }
}

pub struct FirstPicture;

impl CoverExtractor for FirstPicture {
    fn extract_cover(&self, tags: &TagMap) -> Option<CoverImage> {
        tags.pictures.first().map(|data| CoverImage {
            data: data.clone(),
            extension: "jpg",
        })
    }
}

/// Answers any query whose keywords mention one of its titles.
pub struct ScriptedCatalog(pub Vec<CatalogRecord>);

#[async_trait]
impl CatalogProvider for ScriptedCatalog {
    fn id(&self) -> &'static str {
        "scripted"
    }

    fn name(&self) -> &'static str {
        "Scripted"
    }

    async fn search(&self, query: &CatalogQuery, limit: usize) -> shelver::Result<Vec<CatalogRecord>> {
        let keywords = query.keywords().to_lowercase();
        Ok(self
            .0
            .iter()
            .filter(|r| keywords.contains(&r.title.to_lowercase()))
            .take(limit)
            .cloned()
            .collect())
    }
}

pub fn catalog_record(title: &str, author: &str, runtime: u32) -> CatalogRecord {
    CatalogRecord {
        identifier: Some(format!("B0{:08}", runtime)),
        title: title.into(),
        authors: vec![author.into()],
        runtime_minutes: Some(runtime),
        release_date: Some("2011-05-01".into()),
        ..Default::default()
    }
}

pub fn tagged(album: &str, artist: &str, track: u32, secs: f64) -> TagMap {
    let mut tags = TagMap::new()
        .with(keys::ALBUM, album)
        .with(keys::ARTIST, artist)
        .with(keys::TRACK, track.to_string());
    tags.duration_secs = secs;
    tags
}

pub struct TestLibrary {
    pub dir: TempDir,
    pub media: PathBuf,
    pub library: Arc<Library>,
    config: LibraryConfig,
    services: Arc<Services>,
}

impl TestLibrary {
    pub fn new(tags: FakeTags, catalog: Vec<CatalogRecord>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let media = dir.path().join("media");
        fs::create_dir_all(&media).unwrap();
        let services = ServicesBuilder::new()
            .tag_reader(tags)
            .cover_extractor(FirstPicture)
            .add_catalog(ScriptedCatalog(catalog))
            .build()
            .unwrap();
        let services = Arc::new(services);
        let config = LibraryConfig::new(&media, dir.path().join("metadata"), dir.path().join("covers"));
        let library = Library::new(config.clone(), services.clone()).unwrap();
        Self {
            dir,
            media,
            library: Arc::new(library),
            config,
            services,
        }
    }

    /// A fresh engine over the same directories, as after a restart.
    pub fn reopen(&self) -> Library {
        Library::new(self.config.clone(), self.services.clone()).unwrap()
    }

    pub fn touch(&self, relative: &str) {
        let path = self.media.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"audio").unwrap();
    }

    pub fn covers(&self) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(self.dir.path().join("covers"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}
