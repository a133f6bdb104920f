use shared::events::LibraryEvent;
use shared::system::{AvailableBackends, BackendInfo, SystemHealth};

use crate::config::CONFIG;
use crate::error::ApiResult;
use crate::globals::{LIBRARY, SERVICES};

fn backend_info(list: Vec<(&str, &str)>) -> Vec<BackendInfo> {
    list.into_iter()
        .map(|(id, name)| BackendInfo {
            id: id.to_string(),
            name: name.to_string(),
        })
        .collect()
}

pub async fn get_system_health() -> ApiResult<SystemHealth> {
    let media_root_available = LIBRARY.media_root().is_dir();
    let (works_tracked, needs_cleanup) = if media_root_available {
        let report = LIBRARY.scan_report().await?;
        (report.works_tracked, report.needs_cleanup)
    } else {
        (0, false)
    };
    Ok(SystemHealth {
        media_root_available,
        watcher_enabled: CONFIG.watch_enabled,
        works_tracked,
        needs_cleanup,
    })
}

pub async fn get_backends() -> ApiResult<AvailableBackends> {
    Ok(AvailableBackends {
        catalog: backend_info(SERVICES.list_catalogs()),
        series: backend_info(SERVICES.list_series()),
    })
}

/// Most recent library events, oldest first.
pub async fn recent_events(limit: usize) -> ApiResult<Vec<LibraryEvent>> {
    Ok(LIBRARY.events().recent(limit))
}
