use api::config::CONFIG;
use api::globals::{self, LIBRARY};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    env_logger::init();

    info!(
        "Starting shelverd (media: {}, metadata: {})",
        CONFIG.media_root.display(),
        CONFIG.metadata_dir.display()
    );

    match LIBRARY.scan(false).await {
        Ok(result) => info!("Startup scan processed {} works", result.processed_count),
        Err(e) => error!("Startup scan failed: {}", e),
    }

    match LIBRARY.find_orphans().await {
        Ok(orphans) if !orphans.is_empty() => warn!(
            "{} orphaned records and {} orphaned covers; run cleanup to remove them",
            orphans.records.len(),
            orphans.covers.len()
        ),
        Ok(_) => {}
        Err(e) => warn!("Could not check for orphaned data: {}", e),
    }

    globals::start_watcher();

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutting down");
    globals::shutdown();
}
