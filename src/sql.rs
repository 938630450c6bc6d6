//! Query Text Construction
//!
//! Pure functions that build the SQL sent to the engine adapter. Relation and
//! column names are not a closed set (they come from remote CSV headers), so
//! every identifier is escaped before interpolation, and relation names that
//! the workbench itself mints are additionally validated.

use crate::error::{Result, WorkbenchError};

/// Quote an identifier for the engine, doubling any embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Validate a relation name minted by the workbench (dataset codes, view
/// names). Column names from CSV headers are free-form and only ever escaped.
pub fn validate_relation_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(WorkbenchError::Validation(
            "relation name must not be empty".to_string(),
        ));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(WorkbenchError::Validation(format!(
            "relation name '{}' contains characters outside [A-Za-z0-9_]",
            name
        )));
    }
    Ok(())
}

/// Starter query placed in the editor after a dataset loads.
pub fn preview_query(relation: &str) -> String {
    format!("SELECT * FROM {} LIMIT 50", quote_ident(relation))
}

/// Single aggregate query for key overlap between two relations.
///
/// Distinct key sets are built once as CTEs; the three counts come back as
/// one row. Set semantics: duplicate key values in a relation count once.
pub fn overlap_query(left: &str, right: &str, key: &str) -> String {
    let k = quote_ident(key);
    format!(
        "WITH ka AS (SELECT DISTINCT {k} AS k FROM {l}), \
         kb AS (SELECT DISTINCT {k} AS k FROM {r}) \
         SELECT * FROM (SELECT COUNT(*) AS distinct_left FROM ka) AS la \
         CROSS JOIN (SELECT COUNT(*) AS distinct_right FROM kb) AS lb \
         CROSS JOIN (SELECT COUNT(*) AS matching_keys FROM ka INNER JOIN kb ON ka.k = kb.k) AS m",
        k = k,
        l = quote_ident(left),
        r = quote_ident(right),
    )
}

/// Starter SQL for joining two relations on a proposed key. When no key was
/// found the placeholder makes the manual edit obvious.
pub fn join_template(left: &str, right: &str, key: Option<&str>) -> String {
    let key = key.unwrap_or("REPLACE_WITH_COLUMN");
    format!(
        "SELECT a.*, b.* FROM {l} AS a INNER JOIN {r} AS b ON a.{k} = b.{k} LIMIT 100",
        l = quote_ident(left),
        r = quote_ident(right),
        k = quote_ident(key),
    )
}

/// Filter query generated from a clicked drill-down value.
pub fn filter_query(relation: &str, column: &str, value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => format!(
            "SELECT * FROM {} WHERE {} IS NULL LIMIT 100",
            quote_ident(relation),
            quote_ident(column)
        ),
        _ => format!(
            "SELECT * FROM {} WHERE {} = {} LIMIT 100",
            quote_ident(relation),
            quote_ident(column),
            sql_literal(value)
        ),
    }
}

/// Render a JSON value as a SQL literal, quoting strings with doubled
/// embedded quotes.
pub fn sql_literal(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => "NULL".to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::String(s) => format!("'{}'", s.replace('\'', "''")),
        other => format!("'{}'", other.to_string().replace('\'', "''")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident_doubles_embedded_quotes() {
        assert_eq!(quote_ident("Year"), "\"Year\"");
        assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
    }

    #[test]
    fn test_validate_relation_name() {
        assert!(validate_relation_name("px_ABC01").is_ok());
        assert!(validate_relation_name("").is_err());
        assert!(validate_relation_name("px_A; DROP TABLE x").is_err());
    }

    #[test]
    fn test_overlap_query_mentions_both_relations() {
        let sql = overlap_query("px_A", "px_B", "Year");
        assert!(sql.contains("\"px_A\""));
        assert!(sql.contains("\"px_B\""));
        assert!(sql.contains("DISTINCT \"Year\""));
        assert!(sql.contains("matching_keys"));
    }

    #[test]
    fn test_join_template_placeholder_without_key() {
        let sql = join_template("px_A", "px_B", None);
        assert!(sql.contains("REPLACE_WITH_COLUMN"));
        let sql = join_template("px_A", "px_B", Some("Year"));
        assert!(sql.contains("a.\"Year\" = b.\"Year\""));
    }

    #[test]
    fn test_sql_literal_escaping() {
        assert_eq!(sql_literal(&serde_json::json!("O'Brien")), "'O''Brien'");
        assert_eq!(sql_literal(&serde_json::json!(42)), "42");
        assert_eq!(sql_literal(&serde_json::Value::Null), "NULL");
    }
}
