mod models;

use std::time::Duration;

use async_trait::async_trait;
use shared::catalog::{CatalogQuery, CatalogRecord};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::{Result, ShelverError};
use crate::traits::CatalogProvider;

/// Default bound on a single catalog query.
const QUERY_TIMEOUT_SECS: u64 = 30;

const RESPONSE_GROUPS: &str = "product_desc,product_attrs,media,series";

/// Catalog client that shells out to the `audible` command line tool.
#[derive(Debug, Clone)]
pub struct AudibleCliProvider {
    program: String,
    timeout: Duration,
}

impl AudibleCliProvider {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            timeout: Duration::from_secs(QUERY_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn command(&self, keywords: &str, limit: usize) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("api")
            .arg("/1.0/catalog/products")
            .arg("-p")
            .arg(format!("keywords={}", keywords))
            .arg("-p")
            .arg(format!("num_results={}", limit))
            .arg("-p")
            .arg(format!("response_groups={}", RESPONSE_GROUPS))
            .arg("-f")
            .arg("json")
            .kill_on_drop(true);
        cmd
    }
}

impl Default for AudibleCliProvider {
    fn default() -> Self {
        Self::new("audible")
    }
}

#[async_trait]
impl CatalogProvider for AudibleCliProvider {
    fn id(&self) -> &'static str {
        "audible"
    }

    fn name(&self) -> &'static str {
        "Audible"
    }

    async fn search(&self, query: &CatalogQuery, limit: usize) -> Result<Vec<CatalogRecord>> {
        let keywords = query.keywords();
        if keywords.is_empty() {
            return Ok(Vec::new());
        }
        debug!("Querying {} for '{}'", self.name(), keywords);

        let output = match tokio::time::timeout(self.timeout, self.command(&keywords, limit).output())
            .await
        {
            Ok(result) => result?,
            Err(_) => {
                warn!(
                    "Catalog query timed out after {:?} for '{}'",
                    self.timeout, keywords
                );
                return Err(ShelverError::Timeout(self.timeout));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = if stderr.trim().is_empty() {
                format!("catalog query failed with exit code: {:?}", output.status.code())
            } else {
                stderr.trim().to_string()
            };
            return Err(ShelverError::Catalog(message));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let records = models::parse_products(&stdout)?;
        info!("{} returned {} results for '{}'", self.name(), records.len(), keywords);
        Ok(records)
    }
}
