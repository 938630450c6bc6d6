//! Schema Inspector
//!
//! Column name/type introspection plus on-demand value-frequency drill-down.
//! Drill-down runs on its own engine scope so it can proceed while a primary
//! query is still in flight, and a failure stays local to the one column
//! being expanded.

use crate::engine::{ColumnDescriptor, EngineAdapter, QueryResult};
use crate::error::{Result, WorkbenchError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// One distinct value of a column and how often it occurs. `null` is a valid
/// bucket of its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueFrequency {
    pub value: serde_json::Value,
    pub count: u64,
}

pub struct SchemaInspector {
    engine: Arc<dyn EngineAdapter>,
}

impl SchemaInspector {
    pub fn new(engine: Arc<dyn EngineAdapter>) -> Self {
        Self { engine }
    }

    /// Column descriptors in engine declaration order.
    pub async fn describe(&self, relation: &str) -> Result<Vec<ColumnDescriptor>> {
        self.engine.describe(relation).await
    }

    /// Top-10 value frequencies for one column, computed lazily on a fresh
    /// scope. Continuous columns are refused without issuing a query.
    pub async fn value_frequencies(
        &self,
        relation: &str,
        column: &str,
    ) -> Result<Vec<ValueFrequency>> {
        let columns = self.engine.describe(relation).await?;
        let descriptor = columns
            .iter()
            .find(|c| c.name == column)
            .ok_or_else(|| {
                WorkbenchError::Validation(format!(
                    "relation '{}' has no column '{}'",
                    relation, column
                ))
            })?;
        if descriptor.is_continuous {
            return Err(WorkbenchError::Validation(format!(
                "column '{}' is continuous ({}); value drill-down is not available",
                column, descriptor.declared_type
            )));
        }

        debug!("drill-down on {}.{}", relation, column);
        // The scope is dropped (closed) on every exit path, including errors.
        let mut scope = self.engine.open_scope().await?;
        let result = scope.value_counts(relation, column).await?;
        frequencies_from_result(&result)
    }
}

fn frequencies_from_result(result: &QueryResult) -> Result<Vec<ValueFrequency>> {
    let value_idx = result
        .column_index("value")
        .ok_or_else(|| WorkbenchError::Engine("frequency result lacks 'value'".to_string()))?;
    let mut out = Vec::with_capacity(result.rows.len());
    for (i, row) in result.rows.iter().enumerate() {
        out.push(ValueFrequency {
            value: row[value_idx].clone(),
            count: result.u64_at(i, "freq")?,
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::PolarsEngine;

    async fn inspector_with_data() -> SchemaInspector {
        let engine = PolarsEngine::new();
        engine
            .ingest_csv(
                "px_T1",
                "Region,Value\nDublin,1.0\nDublin,2.0\nDublin,3.0\nCork,4.0\nCork,5.0\nGalway,6.0\n",
            )
            .await
            .unwrap();
        SchemaInspector::new(Arc::new(engine))
    }

    #[tokio::test]
    async fn test_frequencies_ordered_by_count_desc() {
        let inspector = inspector_with_data().await;
        let freqs = inspector
            .value_frequencies("px_T1", "Region")
            .await
            .unwrap();
        assert_eq!(freqs.len(), 3);
        assert_eq!(freqs[0].value, serde_json::json!("Dublin"));
        assert_eq!(freqs[0].count, 3);
        assert_eq!(freqs[1].count, 2);
        assert_eq!(freqs[2].count, 1);
    }

    #[tokio::test]
    async fn test_continuous_column_is_refused() {
        let inspector = inspector_with_data().await;
        let err = inspector
            .value_frequencies("px_T1", "Value")
            .await
            .unwrap_err();
        assert!(matches!(err, WorkbenchError::Validation(_)));
    }

    #[tokio::test]
    async fn test_unknown_column_is_a_validation_error() {
        let inspector = inspector_with_data().await;
        let err = inspector
            .value_frequencies("px_T1", "Nope")
            .await
            .unwrap_err();
        assert!(matches!(err, WorkbenchError::Validation(_)));
    }

    #[tokio::test]
    async fn test_limit_ten_distinct_values() {
        let engine = PolarsEngine::new();
        let mut csv = String::from("Letter\n");
        for c in 'a'..='z' {
            csv.push(c);
            csv.push('\n');
        }
        engine.ingest_csv("px_T2", &csv).await.unwrap();
        let inspector = SchemaInspector::new(Arc::new(engine));
        let freqs = inspector
            .value_frequencies("px_T2", "Letter")
            .await
            .unwrap();
        assert_eq!(freqs.len(), 10);
    }
}
