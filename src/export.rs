//! Result Export
//!
//! Re-serializes the current result set as RFC4180 CSV (fields containing
//! comma, quote or newline are quoted with embedded quotes doubled) and
//! templates the export file name from the active relation and today's date.

use crate::engine::QueryResult;
use crate::error::{Result, WorkbenchError};
use chrono::Utc;

const DEFAULT_EXPORT_STEM: &str = "cso_data_export";

pub fn to_csv(result: &QueryResult) -> Result<String> {
    let mut writer = csv::WriterBuilder::new().from_writer(Vec::new());
    writer.write_record(&result.columns)?;
    for row in &result.rows {
        writer.write_record(row.iter().map(field_text))?;
    }
    // into_inner surfaces the underlying writer's io::Error, not a csv error.
    let bytes = writer
        .into_inner()
        .map_err(|e| WorkbenchError::Io(e.into_error()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn field_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// `<activeRelationOrDefault>_<ISO date>.csv`
pub fn export_file_name(active_relation: Option<&str>) -> String {
    format!(
        "{}_{}.csv",
        active_relation.unwrap_or(DEFAULT_EXPORT_STEM),
        Utc::now().format("%Y-%m-%d")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(columns: &[&str], rows: Vec<Vec<serde_json::Value>>) -> QueryResult {
        QueryResult {
            columns: columns.iter().map(|s| s.to_string()).collect(),
            row_count: rows.len(),
            rows,
        }
    }

    #[test]
    fn test_plain_fields_unquoted() {
        let res = result(
            &["Year", "Value"],
            vec![vec![serde_json::json!(2020), serde_json::json!(1.5)]],
        );
        assert_eq!(to_csv(&res).unwrap(), "Year,Value\n2020,1.5\n");
    }

    #[test]
    fn test_quoting_and_doubled_quotes() {
        let res = result(
            &["Region"],
            vec![
                vec![serde_json::json!("Cork, City")],
                vec![serde_json::json!("The \"Rebel\" County")],
                vec![serde_json::json!("two\nlines")],
            ],
        );
        let csv = to_csv(&res).unwrap();
        assert!(csv.contains("\"Cork, City\""));
        assert!(csv.contains("\"The \"\"Rebel\"\" County\""));
        assert!(csv.contains("\"two\nlines\""));
    }

    #[test]
    fn test_null_becomes_empty_field() {
        let res = result(
            &["a", "b"],
            vec![vec![serde_json::Value::Null, serde_json::json!(1)]],
        );
        assert_eq!(to_csv(&res).unwrap(), "a,b\n,1\n");
    }

    #[test]
    fn test_export_file_name_template() {
        let name = export_file_name(Some("px_ABC01"));
        assert!(name.starts_with("px_ABC01_"));
        assert!(name.ends_with(".csv"));
        let name = export_file_name(None);
        assert!(name.starts_with("cso_data_export_"));
        // ISO date segment: YYYY-MM-DD.
        let date = name
            .trim_start_matches("cso_data_export_")
            .trim_end_matches(".csv");
        assert_eq!(date.len(), 10);
    }
}
