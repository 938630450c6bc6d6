//! Relation Catalog
//!
//! Client for the remote dataset directory (JSON-RPC) plus pure search and
//! presentation grouping over the cached entry list. The service has shipped
//! two response shapes over the years; both are tolerated, tried in order.

use crate::error::{Result, WorkbenchError};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

const CATALOG_ENDPOINT: &str = "https://ws.cso.ie/public/api.jsonrpc";
const READ_COLLECTION_METHOD: &str = "PxStat.Data.Cube_API.ReadCollection";
/// Fixed lookback window bounding the directory result size.
const LOOKBACK_DAYS: i64 = 2 * 365;

/// A remotely available, not-yet-loaded dataset. `id` is the stable matrix
/// code used to build the ingestion URL; duplicates are tolerated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: String,
    pub title: String,
    pub last_modified: Option<String>,
}

pub struct CatalogClient {
    client: reqwest::Client,
    endpoint: String,
}

impl CatalogClient {
    pub fn new() -> Self {
        Self::with_endpoint(CATALOG_ENDPOINT)
    }

    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }

    /// Fetch the directory, filtered to the recent window.
    pub async fn load(&self) -> Result<Vec<CatalogEntry>> {
        let datefrom = (Utc::now().date_naive() - chrono::Duration::days(LOOKBACK_DAYS))
            .format("%Y-%m-%d")
            .to_string();
        let payload = serde_json::json!({
            "jsonrpc": "2.0",
            "method": READ_COLLECTION_METHOD,
            "params": { "language": "en", "datefrom": datefrom },
        });
        debug!("loading catalog from {} (datefrom {})", self.endpoint, datefrom);
        let resp = self.client.post(&self.endpoint).json(&payload).send().await?;
        let body: serde_json::Value = resp.json().await?;
        let entries = parse_collection(&body)?;
        info!("catalog loaded: {} datasets", entries.len());
        Ok(entries)
    }
}

impl Default for CatalogClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a directory response. Shape matchers tried in order, first
/// structural match wins: the item list under `result.link.item`, then a
/// list directly under `result`. Fails only if both shapes are absent.
pub fn parse_collection(body: &serde_json::Value) -> Result<Vec<CatalogEntry>> {
    let items = body
        .pointer("/result/link/item")
        .and_then(serde_json::Value::as_array)
        .or_else(|| body.get("result").and_then(serde_json::Value::as_array))
        .ok_or_else(|| {
            WorkbenchError::Catalog("unrecognized catalog response shape".to_string())
        })?;
    Ok(items.iter().filter_map(parse_item).collect())
}

/// Entries lacking a usable matrix code are dropped, not errored.
fn parse_item(item: &serde_json::Value) -> Option<CatalogEntry> {
    let id = item
        .pointer("/extension/matrix")?
        .as_str()
        .filter(|s| !s.is_empty())?
        .to_string();
    let title = item
        .get("label")
        .and_then(serde_json::Value::as_str)
        .unwrap_or("")
        .to_string();
    let last_modified = item
        .get("updated")
        .and_then(serde_json::Value::as_str)
        .map(|s| s.to_string());
    Some(CatalogEntry {
        id,
        title,
        last_modified,
    })
}

/// Pure, case-insensitive substring filter over id OR title. Never mutates
/// the cached superset; an empty query returns all entries unchanged in
/// order.
pub fn search(items: &[CatalogEntry], query: &str) -> Vec<CatalogEntry> {
    let term = query.to_lowercase();
    if term.is_empty() {
        return items.to_vec();
    }
    items
        .iter()
        .filter(|i| i.id.to_lowercase().contains(&term) || i.title.to_lowercase().contains(&term))
        .cloned()
        .collect()
}

/// Static first-letter-to-sector mapping used only for display grouping;
/// never part of identity or search.
pub fn sector_name(id: &str) -> &'static str {
    match id.chars().next().map(|c| c.to_ascii_uppercase()) {
        Some('A') => "Agriculture",
        Some('C') => "Crime/Justice",
        Some('E') => "Economy",
        Some('G') => "Government",
        Some('H') => "Housing",
        Some('L') => "Labour Market",
        Some('M') => "Manufacturing",
        Some('P') => "Population",
        Some('R') => "Retail",
        Some('V') => "Vital Stats",
        _ => "Other Statistics",
    }
}

/// Group entries for display: sorted by id, consecutive runs of the same
/// sector collapsed under one heading.
pub fn sectioned(items: &[CatalogEntry]) -> Vec<(&'static str, Vec<CatalogEntry>)> {
    let mut sorted = items.to_vec();
    sorted.sort_by(|a, b| a.id.cmp(&b.id));
    let mut out: Vec<(&'static str, Vec<CatalogEntry>)> = Vec::new();
    for entry in sorted {
        let sector = sector_name(&entry.id);
        match out.last_mut() {
            Some((current, bucket)) if *current == sector => bucket.push(entry),
            _ => out.push((sector, vec![entry])),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, title: &str) -> CatalogEntry {
        CatalogEntry {
            id: id.to_string(),
            title: title.to_string(),
            last_modified: None,
        }
    }

    #[test]
    fn test_parse_legacy_shape() {
        let body = serde_json::json!({
            "result": { "link": { "item": [
                { "label": "Population by Area", "updated": "2025-01-01T00:00:00Z",
                  "extension": { "matrix": "PEA01" } },
                { "label": "No matrix here", "extension": {} },
            ]}}
        });
        let entries = parse_collection(&body).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, "PEA01");
        assert_eq!(entries[0].title, "Population by Area");
        assert_eq!(entries[0].last_modified.as_deref(), Some("2025-01-01T00:00:00Z"));
    }

    #[test]
    fn test_parse_flat_shape() {
        let body = serde_json::json!({
            "result": [
                { "label": "Crime Stats", "extension": { "matrix": "CJA01" } },
            ]
        });
        let entries = parse_collection(&body).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, "CJA01");
    }

    #[test]
    fn test_both_shapes_absent_fails() {
        let body = serde_json::json!({ "error": { "code": -32000 } });
        assert!(parse_collection(&body).is_err());
    }

    #[test]
    fn test_search_is_a_pure_filter() {
        let items = vec![
            entry("PEA01", "Population by Area"),
            entry("CJA01", "Recorded Crime"),
            entry("EHA05", "Economic Output"),
        ];
        // Empty query: identity, order preserved.
        assert_eq!(search(&items, ""), items);
        // Case-insensitive over id OR title.
        let hits = search(&items, "crime");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "CJA01");
        let hits = search(&items, "pea");
        assert_eq!(hits.len(), 1);
        // Subset property, superset untouched.
        assert!(search(&items, "zzz").is_empty());
        assert_eq!(items.len(), 3);
    }

    #[test]
    fn test_sector_mapping_with_default_bucket() {
        assert_eq!(sector_name("PEA01"), "Population");
        assert_eq!(sector_name("cja01"), "Crime/Justice");
        assert_eq!(sector_name("XYZ01"), "Other Statistics");
        assert_eq!(sector_name(""), "Other Statistics");
    }

    #[test]
    fn test_sectioned_groups_do_not_affect_matching() {
        let items = vec![
            entry("PEA01", "a"),
            entry("PEA02", "b"),
            entry("CJA01", "c"),
        ];
        let groups = sectioned(&items);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, "Crime/Justice");
        assert_eq!(groups[1].0, "Population");
        assert_eq!(groups[1].1.len(), 2);
    }
}
