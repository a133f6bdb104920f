use std::sync::{Arc, LazyLock, Once};

use shelver::{
    audible::AudibleCliProvider,
    series::standard_resolver,
    tags::{EmbeddedCoverExtractor, LoftyTagReader},
    Library, PollingWatcher, Services, ServicesBuilder,
};
use tracing::info;

use crate::config::CONFIG;

pub static SERVICES: LazyLock<Arc<Services>> = LazyLock::new(|| {
    let services = ServicesBuilder::new()
        .tag_reader(LoftyTagReader::new())
        .cover_extractor(EmbeddedCoverExtractor::new())
        .add_catalog(
            AudibleCliProvider::new(CONFIG.audible_cli.clone()).with_timeout(CONFIG.catalog_timeout()),
        )
        .add_series(standard_resolver(CONFIG.series_lookup))
        .build()
        .expect("Failed to build services");
    Arc::new(services)
});

pub static LIBRARY: LazyLock<Arc<Library>> = LazyLock::new(|| {
    let library = Library::new(CONFIG.library_config(), SERVICES.clone())
        .expect("Failed to open the library store");
    Arc::new(library)
});

/// Ensures the background watcher is started exactly once.
static WATCHER_INIT: Once = Once::new();

/// Start polling the media root for changes. No-op when disabled.
pub fn start_watcher() {
    if !CONFIG.watch_enabled {
        info!("Background watcher disabled");
        return;
    }
    WATCHER_INIT.call_once(|| {
        PollingWatcher::new(LIBRARY.clone(), CONFIG.watch_interval()).spawn();
        info!(
            "Started background watcher (interval: {}s)",
            CONFIG.watch_interval_secs
        );
    });
}

/// Stops the watcher and any long operation between works.
pub fn shutdown() {
    LIBRARY.cancellation_token().cancel();
}
