use shared::organize::{OrganizeReport, OrganizeRequest};

use crate::config::CONFIG;
use crate::error::ApiResult;
use crate::globals::LIBRARY;

/// Fills in the configured destination when the request leaves it blank.
pub fn with_default_destination(mut request: OrganizeRequest, default_root: &str) -> OrganizeRequest {
    if request.destination_root.trim().is_empty() {
        request.destination_root = default_root.to_string();
    }
    request
}

pub async fn organize(request: OrganizeRequest) -> ApiResult<OrganizeReport> {
    let request = with_default_destination(request, &CONFIG.dest_root.to_string_lossy());
    Ok(LIBRARY.organize(request).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_destination_uses_the_configured_root() {
        let request = with_default_destination(OrganizeRequest::default(), "/library");
        assert_eq!(request.destination_root, "/library");

        let explicit = OrganizeRequest {
            destination_root: "/elsewhere".into(),
            ..Default::default()
        };
        assert_eq!(
            with_default_destination(explicit, "/library").destination_root,
            "/elsewhere"
        );
    }
}
