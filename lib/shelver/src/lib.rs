pub mod audible;
pub mod error;
pub mod events;
pub mod library;
pub mod organizer;
pub mod paths;
pub mod ranking;
pub mod scanner;
pub mod series;
pub mod services;
pub mod store;
pub mod tags;
pub mod tracker;
pub mod traits;
pub mod watcher;

pub use error::{Result, ShelverError};
pub use library::{Library, LibraryConfig};
pub use services::{Services, ServicesBuilder};
pub use traits::{
    CatalogProvider, CoverExtractor, CoverImage, FallbackCatalogProvider, FallbackSeriesLookup,
    SeriesLookup, TagMap, TagReader,
};
pub use watcher::PollingWatcher;
