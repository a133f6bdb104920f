use serde::{Deserialize, Serialize};
use shared::library::{BulkEnrichReport, EnrichmentOutcome, WorkPage};
use shared::organize::PathResult;
use shared::work::{Suggestion, WorkId, WorkRecord, WorkStatus};

use crate::error::{ApiError, ApiResult};
use crate::globals::LIBRARY;

const DEFAULT_PAGE_SIZE: usize = 50;
const MAX_PAGE_SIZE: usize = 500;
const DEFAULT_BULK_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PageRequest {
    #[serde(default)]
    pub offset: usize,
    pub limit: Option<usize>,
}

impl PageRequest {
    pub fn limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BulkEnrichRequest {
    pub limit: Option<usize>,
    #[serde(default)]
    pub force_refresh: bool,
}

pub async fn list_works(request: PageRequest) -> ApiResult<WorkPage> {
    Ok(LIBRARY.list_works(request.offset, request.limit()).await?)
}

pub async fn get_work(id: WorkId) -> ApiResult<WorkRecord> {
    Ok(LIBRARY.work(&id).await?)
}

pub async fn get_suggestions(id: WorkId) -> ApiResult<Vec<Suggestion>> {
    Ok(LIBRARY.suggestions(&id).await?)
}

pub async fn enrich_work(id: WorkId) -> ApiResult<EnrichmentOutcome> {
    Ok(LIBRARY.enrich(&id).await?)
}

pub async fn manual_search(id: WorkId, query: String) -> ApiResult<EnrichmentOutcome> {
    if query.trim().is_empty() {
        return Err(ApiError::BadRequest("Search query is required".into()));
    }
    Ok(LIBRARY.manual_search(&id, &query).await?)
}

pub async fn bulk_enrich(request: BulkEnrichRequest) -> ApiResult<BulkEnrichReport> {
    let limit = request.limit.unwrap_or(DEFAULT_BULK_LIMIT);
    Ok(LIBRARY.bulk_enrich(limit, request.force_refresh).await?)
}

pub async fn select_suggestion(id: WorkId, sequence_id: u32) -> ApiResult<WorkRecord> {
    Ok(LIBRARY.select_suggestion(&id, sequence_id).await?)
}

pub async fn set_status(id: WorkId, status: String) -> ApiResult<WorkRecord> {
    let status: WorkStatus = status.parse().map_err(ApiError::BadRequest)?;
    Ok(LIBRARY.set_status(&id, status).await?)
}

pub async fn generate_paths(id: WorkId, sequence_id: Option<u32>) -> ApiResult<PathResult> {
    Ok(LIBRARY.generate_paths(&id, sequence_id).await?)
}

pub async fn preview_organization(id: WorkId, sequence_id: Option<u32>) -> ApiResult<String> {
    Ok(LIBRARY.preview_organization(&id, sequence_id).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_limits_are_bounded() {
        assert_eq!(PageRequest::default().limit(), DEFAULT_PAGE_SIZE);
        let huge = PageRequest {
            offset: 0,
            limit: Some(10_000),
        };
        assert_eq!(huge.limit(), MAX_PAGE_SIZE);
        let zero = PageRequest {
            offset: 0,
            limit: Some(0),
        };
        assert_eq!(zero.limit(), 1);
    }
}
