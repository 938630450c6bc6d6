//! Ingestion Pipeline
//!
//! Turns a dataset code into a fetched CSV, a validated non-empty payload and
//! a newly created relation. Relation names are deterministic (`px_<CODE>`),
//! so re-ingesting a code overwrites the prior relation instead of
//! accumulating duplicates.

use crate::engine::EngineAdapter;
use crate::error::{Result, WorkbenchError};
use crate::session::SessionState;
use crate::sql;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

/// Fixed URL template for the remote dataset resource.
const DATASET_URL_TEMPLATE: &str =
    "https://ws.cso.ie/public/api.restful/PxStat.Data.Cube_API.ReadDataset/{code}/CSV/1.0/en";

/// Prefix for relations created by ingestion.
pub const RELATION_PREFIX: &str = "px_";

/// Trim and uppercase a user-entered dataset code.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Resource URL for a normalized code.
pub fn csv_url_for(code: &str) -> String {
    DATASET_URL_TEMPLATE.replace("{code}", code)
}

/// Deterministic relation name for a normalized code.
pub fn relation_name_for(code: &str) -> String {
    format!("{}{}", RELATION_PREFIX, code)
}

/// A fetched dataset resource, before classification.
#[derive(Debug, Clone)]
pub struct FetchedCsv {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

/// Seam between the pipeline and the network, so the pipeline is testable
/// without a live service.
#[async_trait]
pub trait DatasetFetcher: Send + Sync {
    async fn fetch_csv(&self, url: &str) -> Result<FetchedCsv>;
}

/// Production fetcher over reqwest.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DatasetFetcher for HttpFetcher {
    async fn fetch_csv(&self, url: &str) -> Result<FetchedCsv> {
        let resp = self.client.get(url).send().await?;
        let status = resp.status().as_u16();
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());
        let body = resp.text().await?;
        Ok(FetchedCsv {
            status,
            content_type,
            body,
        })
    }
}

/// Content types we accept as CSV. Directory services answer error pages as
/// HTML or JSON; those must not reach the engine.
fn is_csv_compatible(content_type: &str) -> bool {
    let ct = content_type.to_ascii_lowercase();
    ct.is_empty()
        || ct.contains("csv")
        || ct.contains("text/plain")
        || ct.contains("octet-stream")
}

pub struct IngestionPipeline {
    engine: Arc<dyn EngineAdapter>,
    fetcher: Arc<dyn DatasetFetcher>,
}

impl IngestionPipeline {
    pub fn new(engine: Arc<dyn EngineAdapter>, fetcher: Arc<dyn DatasetFetcher>) -> Self {
        Self { engine, fetcher }
    }

    /// Ingest the dataset behind `code` into a fresh relation and make it the
    /// active selection. An empty code (after trimming) is a silent no-op.
    /// No engine or session state changes happen before the payload checks
    /// pass.
    pub async fn ingest(&self, code: &str, session: &mut SessionState) -> Result<Option<String>> {
        let code = normalize_code(code);
        if code.is_empty() {
            return Ok(None);
        }
        let relation = relation_name_for(&code);
        // Codes are interpolated into the URL and the relation name; reject
        // anything outside the matrix-code alphabet up front.
        sql::validate_relation_name(&relation)?;

        let url = csv_url_for(&code);
        debug!("fetching dataset {} from {}", code, url);
        let fetched = self.fetcher.fetch_csv(&url).await?;

        match fetched.status {
            404 => return Err(WorkbenchError::NotFound { code }),
            s if (500..600).contains(&s) => {
                return Err(WorkbenchError::UpstreamUnavailable { code, status: s })
            }
            s if !(200..300).contains(&s) => {
                return Err(WorkbenchError::Fetch { code, status: s })
            }
            _ => {}
        }
        if let Some(ct) = fetched.content_type.as_deref() {
            if !is_csv_compatible(ct) {
                return Err(WorkbenchError::Format {
                    code,
                    content_type: ct.to_string(),
                });
            }
        }
        if fetched.body.trim().is_empty() {
            return Err(WorkbenchError::EmptyDataset { code });
        }

        self.engine
            .ingest_csv(&relation, &fetched.body)
            .await
            .map_err(|e| WorkbenchError::Ingestion {
                code: code.clone(),
                message: e.to_string(),
            })?;

        session.refresh(self.engine.as_ref()).await?;
        session.set_active(&relation);
        info!("loaded dataset {} as {}", code, relation);
        Ok(Some(relation))
    }
}
