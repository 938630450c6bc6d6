//! In-process analytical engine backed by polars `SQLContext`.
//!
//! Tables are materialized `DataFrame`s; views are stored as their defining
//! SQL and registered as lazy plans. The engine keeps its own registry of
//! relation kinds because the SQL context does not distinguish the two.

use crate::engine::adapter::{
    ColumnDescriptor, EngineAdapter, EngineScope, RelationInfo, RelationKind,
};
use crate::engine::result::QueryResult;
use crate::error::{Result, WorkbenchError};
use crate::sql;
use async_trait::async_trait;
use polars::prelude::*;
use polars::sql::SQLContext;
use std::collections::BTreeMap;
use std::io::Cursor;
use std::sync::Mutex;
use tracing::{debug, warn};

pub struct PolarsEngine {
    inner: Mutex<EngineInner>,
}

struct EngineInner {
    ctx: SQLContext,
    tables: BTreeMap<String, DataFrame>,
    /// View name -> defining SQL. The registered plan is a snapshot of the
    /// relations it referenced at creation time.
    views: BTreeMap<String, String>,
}

impl PolarsEngine {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(EngineInner {
                ctx: SQLContext::new(),
                tables: BTreeMap::new(),
                views: BTreeMap::new(),
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, EngineInner> {
        // Engine calls never hold the lock across an await; a poisoned lock
        // means a panic elsewhere, which we propagate.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for PolarsEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Map an engine dtype to the SQL-style declared type the schema view shows.
fn sql_type_name(dtype: &DataType) -> String {
    match dtype {
        DataType::Boolean => "BOOLEAN".to_string(),
        DataType::Int8 => "TINYINT".to_string(),
        DataType::Int16 => "SMALLINT".to_string(),
        DataType::Int32 => "INTEGER".to_string(),
        DataType::Int64 => "BIGINT".to_string(),
        DataType::UInt8 => "UTINYINT".to_string(),
        DataType::UInt16 => "USMALLINT".to_string(),
        DataType::UInt32 => "UINTEGER".to_string(),
        DataType::UInt64 => "UBIGINT".to_string(),
        DataType::Float32 => "FLOAT".to_string(),
        DataType::Float64 => "DOUBLE".to_string(),
        DataType::String => "VARCHAR".to_string(),
        DataType::Date => "DATE".to_string(),
        DataType::Time => "TIME".to_string(),
        DataType::Datetime(_, _) => "TIMESTAMP".to_string(),
        DataType::Duration(_) => "INTERVAL".to_string(),
        other => format!("{:?}", other).to_uppercase(),
    }
}

fn descriptors_from_schema<'a>(
    fields: impl Iterator<Item = (&'a str, &'a DataType)>,
) -> Vec<ColumnDescriptor> {
    fields
        .map(|(name, dtype)| ColumnDescriptor::new(name, sql_type_name(dtype)))
        .collect()
}

#[async_trait]
impl EngineAdapter for PolarsEngine {
    async fn list_relations(&self) -> Result<Vec<RelationInfo>> {
        let inner = self.lock();
        // BTreeMap iteration is name-ordered; tables before views gives the
        // (kind, name) ordering the session relies on.
        let mut out: Vec<RelationInfo> = inner
            .tables
            .keys()
            .map(|name| RelationInfo {
                name: name.clone(),
                kind: RelationKind::Table,
            })
            .collect();
        out.extend(inner.views.keys().map(|name| RelationInfo {
            name: name.clone(),
            kind: RelationKind::View,
        }));
        Ok(out)
    }

    async fn describe(&self, relation: &str) -> Result<Vec<ColumnDescriptor>> {
        let mut inner = self.lock();
        if let Some(df) = inner.tables.get(relation) {
            let schema = df.schema();
            return Ok(descriptors_from_schema(
                schema.iter().map(|(name, dtype)| (name.as_str(), dtype)),
            ));
        }
        if let Some(view_sql) = inner.views.get(relation).cloned() {
            let lf = inner.ctx.execute(&view_sql)?;
            let schema = lf.schema()?;
            return Ok(descriptors_from_schema(
                schema.iter().map(|(name, dtype)| (name.as_str(), dtype)),
            ));
        }
        Err(WorkbenchError::Engine(format!(
            "relation '{}' does not exist",
            relation
        )))
    }

    async fn execute(&self, sql_text: &str) -> Result<QueryResult> {
        let mut inner = self.lock();
        debug!("executing query: {}", sql_text);
        let df = inner.ctx.execute(sql_text)?.collect()?;
        QueryResult::from_dataframe(&df)
    }

    async fn ingest_csv(&self, relation: &str, csv_text: &str) -> Result<()> {
        sql::validate_relation_name(relation)?;
        // Parse fully before touching the registry so a malformed payload
        // leaves any prior relation of this name intact.
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(100))
            .into_reader_with_file_handle(Cursor::new(csv_text.as_bytes().to_vec()))
            .finish()?;
        let mut inner = self.lock();
        if inner.views.contains_key(relation) {
            return Err(WorkbenchError::Engine(format!(
                "'{}' already exists as a view",
                relation
            )));
        }
        inner.ctx.register(relation, df.clone().lazy());
        inner.tables.insert(relation.to_string(), df);
        debug!("registered table '{}'", relation);
        Ok(())
    }

    async fn create_view(&self, relation: &str, view_sql: &str) -> Result<()> {
        sql::validate_relation_name(relation)?;
        let mut inner = self.lock();
        if inner.tables.contains_key(relation) {
            return Err(WorkbenchError::Engine(format!(
                "'{}' already exists as a table",
                relation
            )));
        }
        // Building the plan validates the query and resolves every relation
        // it references before anything is replaced.
        let lf = inner.ctx.execute(view_sql)?;
        inner.ctx.register(relation, lf);
        inner.views.insert(relation.to_string(), view_sql.to_string());
        debug!("registered view '{}'", relation);
        Ok(())
    }

    async fn drop_relation(&self, relation: &str, kind: RelationKind) -> Result<()> {
        let mut inner = self.lock();
        let removed = match kind {
            RelationKind::Table => inner.tables.remove(relation).is_some(),
            RelationKind::View => inner.views.remove(relation).is_some(),
        };
        if removed {
            inner.ctx.unregister(relation);
            debug!("dropped {} '{}'", kind, relation);
        }
        Ok(())
    }

    async fn open_scope(&self) -> Result<Box<dyn EngineScope>> {
        let inner = self.lock();
        let mut ctx = SQLContext::new();
        for (name, df) in &inner.tables {
            ctx.register(name, df.clone().lazy());
        }
        for (name, view_sql) in &inner.views {
            match ctx.execute(view_sql) {
                Ok(lf) => ctx.register(name, lf),
                // A view whose source was defined in a different order may
                // not resolve in a fresh context; the scope stays usable for
                // everything else.
                Err(e) => warn!("view '{}' not visible in scope: {}", name, e),
            }
        }
        Ok(Box::new(PolarsScope { ctx }))
    }
}

/// One-shot isolated scope over a snapshot of the registered relations.
/// Dropping it releases the snapshot.
struct PolarsScope {
    ctx: SQLContext,
}

#[async_trait]
impl EngineScope for PolarsScope {
    async fn execute(&mut self, sql_text: &str) -> Result<QueryResult> {
        let df = self.ctx.execute(sql_text)?.collect()?;
        QueryResult::from_dataframe(&df)
    }

    async fn value_counts(&mut self, relation: &str, column: &str) -> Result<QueryResult> {
        // The SQL interface mis-evaluates COUNT(*) under GROUP BY, so the
        // group sizes are computed on the frame directly and ordered here.
        let projection = format!(
            "SELECT {} AS \"value\" FROM {}",
            sql::quote_ident(column),
            sql::quote_ident(relation)
        );
        let df = self.ctx.execute(&projection)?.collect()?;
        let counts = df
            .lazy()
            .group_by([col("value")])
            .agg([len().alias("freq")])
            .collect()?;
        let mut result = QueryResult::from_dataframe(&counts)?;
        result
            .rows
            .sort_by_key(|row| std::cmp::Reverse(row[1].as_u64().unwrap_or(0)));
        result.rows.truncate(10);
        result.row_count = result.rows.len();
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn engine_with_table(name: &str, csv: &str) -> PolarsEngine {
        let engine = PolarsEngine::new();
        engine.ingest_csv(name, csv).await.unwrap();
        engine
    }

    #[tokio::test]
    async fn test_ingest_and_list() {
        let engine = engine_with_table("px_T1", "Year,Value\n2020,1.5\n2021,2.5\n").await;
        let rels = engine.list_relations().await.unwrap();
        assert_eq!(rels.len(), 1);
        assert_eq!(rels[0].name, "px_T1");
        assert_eq!(rels[0].kind, RelationKind::Table);
    }

    #[tokio::test]
    async fn test_describe_preserves_declaration_order() {
        let engine =
            engine_with_table("px_T1", "Year,Region,Value\n2020,Dublin,1.5\n2021,Cork,2.5\n")
                .await;
        let cols = engine.describe("px_T1").await.unwrap();
        let names: Vec<&str> = cols.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Year", "Region", "Value"]);
        assert!(!cols[0].is_continuous); // BIGINT
        assert!(!cols[1].is_continuous); // VARCHAR
        assert!(cols[2].is_continuous); // DOUBLE
    }

    #[tokio::test]
    async fn test_ingest_replace_is_create_or_replace() {
        let engine = engine_with_table("px_T1", "a,b\n1,2\n").await;
        engine.ingest_csv("px_T1", "a,b\n3,4\n5,6\n").await.unwrap();
        let res = engine.execute("SELECT * FROM \"px_T1\"").await.unwrap();
        assert_eq!(res.row_count, 2);
        let rels = engine.list_relations().await.unwrap();
        assert_eq!(rels.len(), 1);
    }

    #[tokio::test]
    async fn test_view_lifecycle() {
        let engine = engine_with_table("px_T1", "Year,Value\n2020,1\n2021,2\n2022,3\n").await;
        engine
            .create_view("recent", "SELECT * FROM \"px_T1\" WHERE \"Year\" >= 2021")
            .await
            .unwrap();
        let rels = engine.list_relations().await.unwrap();
        assert_eq!(rels.len(), 2);
        assert_eq!(rels[1].kind, RelationKind::View);
        let res = engine.execute("SELECT * FROM \"recent\"").await.unwrap();
        assert_eq!(res.row_count, 2);
        engine.drop_relation("recent", RelationKind::View).await.unwrap();
        let rels = engine.list_relations().await.unwrap();
        assert_eq!(rels.len(), 1);
    }

    #[tokio::test]
    async fn test_scope_is_isolated_from_drops() {
        let engine = engine_with_table("px_T1", "a\n1\n2\n").await;
        let mut scope = engine.open_scope().await.unwrap();
        engine.drop_relation("px_T1", RelationKind::Table).await.unwrap();
        // The scope snapshot still sees the relation.
        let res = scope.execute("SELECT COUNT(*) AS n FROM \"px_T1\"").await.unwrap();
        assert_eq!(res.u64_at(0, "n").unwrap(), 2);
        // The primary context does not.
        assert!(engine.execute("SELECT * FROM \"px_T1\"").await.is_err());
    }

    #[tokio::test]
    async fn test_scope_value_counts_per_group_with_null_bucket() {
        let engine = engine_with_table(
            "px_T1",
            "Region,Value\nDublin,1\nDublin,2\nDublin,3\nCork,4\nCork,5\n,6\n",
        )
        .await;
        let mut scope = engine.open_scope().await.unwrap();
        let res = scope.value_counts("px_T1", "Region").await.unwrap();
        assert_eq!(res.columns, vec!["value", "freq"]);
        // Each group carries its own size, largest first.
        assert_eq!(res.rows[0][0], serde_json::json!("Dublin"));
        assert_eq!(res.u64_at(0, "freq").unwrap(), 3);
        assert_eq!(res.rows[1][0], serde_json::json!("Cork"));
        assert_eq!(res.u64_at(1, "freq").unwrap(), 2);
        let null_row = res.rows.iter().find(|r| r[0].is_null()).unwrap();
        assert_eq!(null_row[1].as_u64().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_view_name_colliding_with_table_is_rejected() {
        let engine = engine_with_table("px_T1", "a\n1\n").await;
        let err = engine
            .create_view("px_T1", "SELECT * FROM \"px_T1\"")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }
}
