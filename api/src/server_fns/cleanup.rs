use serde::{Deserialize, Serialize};
use shared::library::{CleanupReport, OrphanReport};

use crate::error::ApiResult;
use crate::globals::LIBRARY;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CleanupRequest {
    #[serde(default = "default_dry_run")]
    pub dry_run: bool,
}

fn default_dry_run() -> bool {
    true
}

impl Default for CleanupRequest {
    fn default() -> Self {
        Self { dry_run: true }
    }
}

pub async fn find_orphans() -> ApiResult<OrphanReport> {
    Ok(LIBRARY.find_orphans().await?)
}

pub async fn cleanup(request: CleanupRequest) -> ApiResult<CleanupReport> {
    Ok(LIBRARY.cleanup(request.dry_run).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleanup_defaults_to_a_dry_run() {
        let request: CleanupRequest = serde_json::from_str("{}").unwrap();
        assert!(request.dry_run);
        assert!(CleanupRequest::default().dry_run);
    }
}
