//! Query Result - row-oriented result format handed to the UI-facing caller.

use crate::error::{Result, WorkbenchError};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Materialized query result: column names plus JSON-typed rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
    pub row_count: usize,
}

impl QueryResult {
    pub fn from_dataframe(df: &DataFrame) -> Result<Self> {
        let columns: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();
        let series = df.get_columns();
        let mut rows = Vec::with_capacity(df.height());
        for i in 0..df.height() {
            let mut row = Vec::with_capacity(series.len());
            for s in series {
                let av = s.get(i).map_err(|e| WorkbenchError::Engine(e.to_string()))?;
                row.push(any_value_to_json(av));
            }
            rows.push(row);
        }
        Ok(Self {
            row_count: rows.len(),
            columns,
            rows,
        })
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Pull an unsigned count out of a cell, by column name. Engines report
    /// aggregate counts with varying integer widths, so anything numeric and
    /// non-negative is accepted.
    pub fn u64_at(&self, row: usize, column: &str) -> Result<u64> {
        let idx = self.column_index(column).ok_or_else(|| {
            WorkbenchError::Engine(format!("result has no column '{}'", column))
        })?;
        let cell = self
            .rows
            .get(row)
            .and_then(|r| r.get(idx))
            .ok_or_else(|| WorkbenchError::Engine(format!("result has no row {}", row)))?;
        json_to_u64(cell).ok_or_else(|| {
            WorkbenchError::Engine(format!(
                "column '{}' holds a non-count value: {}",
                column, cell
            ))
        })
    }
}

fn json_to_u64(value: &serde_json::Value) -> Option<u64> {
    match value {
        serde_json::Value::Number(n) => n.as_u64().or_else(|| {
            // Engines occasionally surface counts as floats.
            n.as_f64()
                .filter(|f| *f >= 0.0 && f.fract() == 0.0)
                .map(|f| f as u64)
        }),
        _ => None,
    }
}

/// Convert one engine cell to JSON. Temporal and other exotic types fall back
/// to their display form.
pub fn any_value_to_json(av: AnyValue) -> serde_json::Value {
    use serde_json::Value;
    match av {
        AnyValue::Null => Value::Null,
        AnyValue::Boolean(b) => Value::Bool(b),
        AnyValue::String(s) => Value::String(s.to_string()),
        AnyValue::StringOwned(s) => Value::String(s.to_string()),
        AnyValue::Int8(v) => Value::from(v),
        AnyValue::Int16(v) => Value::from(v),
        AnyValue::Int32(v) => Value::from(v),
        AnyValue::Int64(v) => Value::from(v),
        AnyValue::UInt8(v) => Value::from(v),
        AnyValue::UInt16(v) => Value::from(v),
        AnyValue::UInt32(v) => Value::from(v),
        AnyValue::UInt64(v) => Value::from(v),
        AnyValue::Float32(v) => serde_json::Number::from_f64(v as f64)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        AnyValue::Float64(v) => serde_json::Number::from_f64(v)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        other => Value::String(other.to_string()),
    }
}
