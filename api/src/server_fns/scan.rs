use serde::{Deserialize, Serialize};
use shared::library::{PurgeReport, ScanReport, ScanResult};

use crate::error::ApiResult;
use crate::globals::LIBRARY;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanRequest {
    #[serde(default)]
    pub full: bool,
}

pub async fn trigger_scan(request: ScanRequest) -> ApiResult<ScanResult> {
    Ok(LIBRARY.scan(request.full).await?)
}

pub async fn scan_status() -> ApiResult<ScanReport> {
    Ok(LIBRARY.scan_report().await?)
}

pub async fn purge_and_rescan() -> ApiResult<PurgeReport> {
    Ok(LIBRARY.purge_and_rescan().await?)
}
