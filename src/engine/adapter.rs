//! Engine adapter surface: relation listing, schema introspection, query
//! execution, CSV ingestion, relation drop and isolated connection scopes.

use crate::engine::result::QueryResult;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a materialized relation. Ordering matters: relation lists are
/// surfaced sorted by `(kind, name)`, tables first, so the two groups stay
/// together across refreshes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RelationKind {
    Table,
    View,
}

impl RelationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationKind::Table => "Table",
            RelationKind::View => "View",
        }
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named relation living inside the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationInfo {
    pub name: String,
    pub kind: RelationKind,
}

/// One column of a relation's schema, in engine declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    /// SQL-style type name as the engine declares it (BIGINT, DOUBLE, ...).
    pub declared_type: String,
    /// Continuous columns (floating point / decimal) get no value drill-down;
    /// enumerating their distinct values is rarely useful.
    pub is_continuous: bool,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, declared_type: impl Into<String>) -> Self {
        let declared_type = declared_type.into();
        let is_continuous = is_continuous_type(&declared_type);
        Self {
            name: name.into(),
            declared_type,
            is_continuous,
        }
    }
}

/// Case-insensitive substring match on the declared type.
pub fn is_continuous_type(declared_type: &str) -> bool {
    let upper = declared_type.to_uppercase();
    upper.contains("DOUBLE") || upper.contains("FLOAT") || upper.contains("DECIMAL")
}

/// Contract consumed by the workbench core. Implementations own the engine's
/// catalog namespace; create/ingest/drop must be atomic from the caller's
/// point of view (a failed replace leaves the prior relation untouched).
#[async_trait]
pub trait EngineAdapter: Send + Sync {
    /// All non-internal relations, sorted by `(kind, name)`.
    async fn list_relations(&self) -> Result<Vec<RelationInfo>>;

    /// Schema of a relation, preserving the engine's declaration order.
    async fn describe(&self, relation: &str) -> Result<Vec<ColumnDescriptor>>;

    /// Execute arbitrary SQL on the primary context.
    async fn execute(&self, sql: &str) -> Result<QueryResult>;

    /// Create or replace a table from CSV text with header-aware auto-typing.
    async fn ingest_csv(&self, relation: &str, csv_text: &str) -> Result<()>;

    /// Create or replace a view defined by a query.
    async fn create_view(&self, relation: &str, sql: &str) -> Result<()>;

    /// Drop a relation of the given kind. Dropping a name that does not exist
    /// under that kind is a no-op.
    async fn drop_relation(&self, relation: &str, kind: RelationKind) -> Result<()>;

    /// Open an isolated scope whose queries cannot interfere with the primary
    /// context. Request-scoped: used once, released on drop, never pooled.
    async fn open_scope(&self) -> Result<Box<dyn EngineScope>>;
}

/// A short-lived, isolated query scope. Dropping the scope closes it.
#[async_trait]
pub trait EngineScope: Send {
    async fn execute(&mut self, sql: &str) -> Result<QueryResult>;

    /// Top-10 value frequencies for one column as a `("value", "freq")`
    /// result, ordered by descending count. Null is counted as a group of
    /// its own.
    async fn value_counts(&mut self, relation: &str, column: &str) -> Result<QueryResult>;
}
