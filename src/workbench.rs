//! Workbench Facade
//!
//! Owns the session, the engine adapter, the ingestion pipeline and the
//! catalog cache, and enforces the single-session busy discipline: primary
//! operations (load, run, schema, save view, drop) never overlap; a second
//! one fails fast with `Busy` instead of racing. Drill-down, join analysis
//! and catalog access stay outside the busy flag; drill-down in particular
//! runs on its own engine scope so it can proceed while a primary query is
//! in flight.

use crate::catalog::{self, CatalogClient, CatalogEntry};
use crate::engine::{ColumnDescriptor, EngineAdapter, QueryResult, RelationInfo};
use crate::error::{Result, WorkbenchError};
use crate::export;
use crate::ingest::{DatasetFetcher, IngestionPipeline};
use crate::join::{JoinAdvisor, JoinProposal, OverlapReport};
use crate::schema::{SchemaInspector, ValueFrequency};
use crate::session::SessionState;
use crate::sql;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

pub struct Workbench {
    engine: Arc<dyn EngineAdapter>,
    ingestion: IngestionPipeline,
    inspector: SchemaInspector,
    advisor: JoinAdvisor,
    catalog: CatalogClient,
    session: Mutex<SessionState>,
    catalog_cache: Mutex<Vec<CatalogEntry>>,
    busy: AtomicBool,
}

/// Releases the busy flag on every exit path, success or failure.
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Workbench {
    pub fn new(engine: Arc<dyn EngineAdapter>, fetcher: Arc<dyn DatasetFetcher>) -> Self {
        Self::with_catalog(engine, fetcher, CatalogClient::new())
    }

    pub fn with_catalog(
        engine: Arc<dyn EngineAdapter>,
        fetcher: Arc<dyn DatasetFetcher>,
        catalog: CatalogClient,
    ) -> Self {
        Self {
            ingestion: IngestionPipeline::new(Arc::clone(&engine), fetcher),
            inspector: SchemaInspector::new(Arc::clone(&engine)),
            advisor: JoinAdvisor::new(Arc::clone(&engine)),
            engine,
            catalog,
            session: Mutex::new(SessionState::new()),
            catalog_cache: Mutex::new(Vec::new()),
            busy: AtomicBool::new(false),
        }
    }

    fn begin_primary(&self) -> Result<BusyGuard<'_>> {
        if self.busy.swap(true, Ordering::SeqCst) {
            return Err(WorkbenchError::Busy);
        }
        Ok(BusyGuard(&self.busy))
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    // --- session reads -----------------------------------------------------

    pub async fn relations(&self) -> Vec<RelationInfo> {
        self.session.lock().await.relations().to_vec()
    }

    pub async fn active(&self) -> Option<String> {
        self.session.lock().await.active().map(|s| s.to_string())
    }

    pub async fn set_active(&self, name: &str) {
        self.session.lock().await.set_active(name);
    }

    // --- primary operations (busy-guarded) ---------------------------------

    /// Fetch and ingest a dataset by code. Returns the new relation name, or
    /// `None` for an empty code (silent no-op).
    pub async fn load_dataset(&self, code: &str) -> Result<Option<String>> {
        let _guard = self.begin_primary()?;
        let mut session = self.session.lock().await;
        self.ingestion.ingest(code, &mut session).await
    }

    /// Run ad-hoc SQL on the primary context.
    pub async fn run_sql(&self, query: &str) -> Result<QueryResult> {
        let _guard = self.begin_primary()?;
        let query = query.trim();
        if query.is_empty() {
            return Err(WorkbenchError::Validation("enter a query to run".to_string()));
        }
        self.engine.execute(query).await
    }

    /// Schema of an existing relation; the name must be in the current list.
    pub async fn describe(&self, relation: &str) -> Result<Vec<ColumnDescriptor>> {
        let _guard = self.begin_primary()?;
        self.require_listed(relation).await?;
        self.inspector.describe(relation).await
    }

    /// Save a query as a named view and select it. The name comes from
    /// free-form user input and is sanitized down to `[a-z0-9_]`.
    pub async fn save_view(&self, name: &str, query: &str) -> Result<String> {
        let _guard = self.begin_primary()?;
        let query = query.trim();
        if query.is_empty() {
            return Err(WorkbenchError::Validation("enter a query to save".to_string()));
        }
        let safe_name = sanitize_view_name(name)?;
        self.engine.create_view(&safe_name, query).await?;
        let mut session = self.session.lock().await;
        session.refresh(self.engine.as_ref()).await?;
        session.set_active(&safe_name);
        info!("saved view '{}'", safe_name);
        Ok(safe_name)
    }

    /// Drop a listed relation by its recorded kind, then resync from the
    /// engine catalog.
    pub async fn drop_relation(&self, relation: &str) -> Result<()> {
        let _guard = self.begin_primary()?;
        let mut session = self.session.lock().await;
        let kind = session.kind_of(relation).ok_or_else(|| {
            WorkbenchError::Validation(format!("'{}' is not a loaded relation", relation))
        })?;
        self.engine.drop_relation(relation, kind).await?;
        session.refresh(self.engine.as_ref()).await?;
        if session.active() == Some(relation) {
            session.clear_active();
        }
        info!("dropped {} '{}'", kind, relation);
        Ok(())
    }

    // --- concurrent read-side workflows (not busy-guarded) ------------------

    /// Per-column value drill-down on an isolated scope; may run while a
    /// primary operation is outstanding.
    pub async fn drill_down(&self, relation: &str, column: &str) -> Result<Vec<ValueFrequency>> {
        self.inspector.value_frequencies(relation, column).await
    }

    pub async fn propose_join(&self, left: &str, right: &str) -> Result<JoinProposal> {
        self.require_listed(left).await?;
        self.require_listed(right).await?;
        self.advisor.propose_join(left, right).await
    }

    pub async fn check_overlap(&self, left: &str, right: &str) -> Result<OverlapReport> {
        self.require_listed(left).await?;
        self.require_listed(right).await?;
        self.advisor.check_overlap(left, right).await
    }

    /// Refresh the catalog cache from the directory service.
    pub async fn load_catalog(&self) -> Result<usize> {
        let entries = self.catalog.load().await?;
        let count = entries.len();
        *self.catalog_cache.lock().await = entries;
        Ok(count)
    }

    /// Filter the cached catalog. Always filters from the unfiltered
    /// superset, so repeated searches are not lossy.
    pub async fn search_catalog(&self, query: &str) -> Vec<CatalogEntry> {
        catalog::search(&self.catalog_cache.lock().await, query)
    }

    /// Re-serialize a result as CSV together with its templated file name.
    pub async fn export_result(&self, result: &QueryResult) -> Result<(String, String)> {
        let active = self.active().await;
        let file_name = export::export_file_name(active.as_deref());
        let body = export::to_csv(result)?;
        Ok((file_name, body))
    }

    /// Starter query for the editor after selecting a relation.
    pub fn preview_query(&self, relation: &str) -> String {
        sql::preview_query(relation)
    }

    /// Filter query for a value picked out of a drill-down, null-aware.
    pub fn filter_query(&self, relation: &str, column: &str, value: &serde_json::Value) -> String {
        sql::filter_query(relation, column, value)
    }

    async fn require_listed(&self, relation: &str) -> Result<()> {
        if relation.is_empty() {
            return Err(WorkbenchError::Validation(
                "select a relation first".to_string(),
            ));
        }
        let session = self.session.lock().await;
        if !session.contains(relation) {
            return Err(WorkbenchError::Validation(format!(
                "'{}' is not a loaded relation",
                relation
            )));
        }
        Ok(())
    }
}

/// Lowercase and squash anything outside `[a-z0-9_]` to underscores.
fn sanitize_view_name(name: &str) -> Result<String> {
    let safe: String = name
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if safe.is_empty() || safe.chars().all(|c| c == '_') {
        return Err(WorkbenchError::Validation(
            "enter a name for the view".to_string(),
        ));
    }
    Ok(safe)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_view_name() {
        assert_eq!(sanitize_view_name("Dublin Stats!").unwrap(), "dublin_stats_");
        assert_eq!(sanitize_view_name("ok_name2").unwrap(), "ok_name2");
        assert!(sanitize_view_name("   ").is_err());
        assert!(sanitize_view_name("!!!").is_err());
    }
}
