//! Join Advisor
//!
//! Proposes candidate join keys between two relations (shared column names,
//! preserving the left relation's declaration order) and quantifies key
//! overlap with a single aggregate query over the distinct key sets.

use crate::engine::EngineAdapter;
use crate::error::{Result, WorkbenchError};
use crate::sql;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// Derived join proposal. `chosen_key == None` means no automatic key was
/// found and manual selection is required; that is a valid degenerate
/// proposal, not an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinProposal {
    pub left: String,
    pub right: String,
    /// Shared column names, ordered by the left relation's declaration order.
    pub candidate_keys: Vec<String>,
    pub chosen_key: Option<String>,
}

impl JoinProposal {
    pub fn needs_manual_key(&self) -> bool {
        self.chosen_key.is_none()
    }

    /// Starter SQL for the proposed join.
    pub fn template(&self) -> String {
        sql::join_template(&self.left, &self.right, self.chosen_key.as_deref())
    }
}

/// Key-overlap statistics between two relations, set semantics (duplicate
/// key values count once). Only produced by a successful computation, so a
/// zero `matching_keys` is never confusable with a failed query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlapReport {
    pub key: String,
    pub distinct_left: u64,
    pub distinct_right: u64,
    pub matching_keys: u64,
    /// Percentage of the left relation's distinct keys that match; 0 when
    /// the left side has no distinct values.
    pub match_percent: f64,
}

pub struct JoinAdvisor {
    engine: Arc<dyn EngineAdapter>,
}

impl JoinAdvisor {
    pub fn new(engine: Arc<dyn EngineAdapter>) -> Self {
        Self { engine }
    }

    fn validate_pair(left: &str, right: &str) -> Result<()> {
        if left.is_empty() || right.is_empty() {
            return Err(WorkbenchError::Validation(
                "select two relations to join".to_string(),
            ));
        }
        if left == right {
            return Err(WorkbenchError::Validation(
                "select two different relations to join".to_string(),
            ));
        }
        Ok(())
    }

    /// Shared column names between the two relations, ordered by the left
    /// relation's declaration order (the tie-break when multiple names are
    /// shared: first in left's order wins).
    pub async fn propose_join(&self, left: &str, right: &str) -> Result<JoinProposal> {
        Self::validate_pair(left, right)?;
        let cols_left = self.engine.describe(left).await?;
        let cols_right = self.engine.describe(right).await?;
        let right_names: HashSet<&str> = cols_right.iter().map(|c| c.name.as_str()).collect();
        let candidate_keys: Vec<String> = cols_left
            .iter()
            .filter(|c| right_names.contains(c.name.as_str()))
            .map(|c| c.name.clone())
            .collect();
        let chosen_key = candidate_keys.first().cloned();
        debug!(
            "join proposal {} x {}: {} shared columns",
            left,
            right,
            candidate_keys.len()
        );
        Ok(JoinProposal {
            left: left.to_string(),
            right: right.to_string(),
            candidate_keys,
            chosen_key,
        })
    }

    /// Distinct-key counts and intersection size on the first candidate key,
    /// computed in one aggregate query.
    pub async fn check_overlap(&self, left: &str, right: &str) -> Result<OverlapReport> {
        let proposal = self.propose_join(left, right).await?;
        let key = proposal.chosen_key.ok_or_else(|| {
            WorkbenchError::Validation(format!(
                "no shared column names between '{}' and '{}'",
                left, right
            ))
        })?;

        let query = sql::overlap_query(left, right, &key);
        let result = self.engine.execute(&query).await?;
        let distinct_left = result.u64_at(0, "distinct_left")?;
        let distinct_right = result.u64_at(0, "distinct_right")?;
        let matching_keys = result.u64_at(0, "matching_keys")?;
        let match_percent = if distinct_left == 0 {
            0.0
        } else {
            matching_keys as f64 / distinct_left as f64 * 100.0
        };
        Ok(OverlapReport {
            key,
            distinct_left,
            distinct_right,
            matching_keys,
            match_percent,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::PolarsEngine;

    async fn advisor_with_tables() -> JoinAdvisor {
        let engine = PolarsEngine::new();
        engine
            .ingest_csv(
                "px_A",
                "Year,Region,Value\n2019,Dublin,1.0\n2020,Cork,2.0\n2021,Galway,3.0\n",
            )
            .await
            .unwrap();
        engine
            .ingest_csv(
                "px_B",
                "Year,County,Value\n2020,Mayo,4.0\n2021,Clare,5.0\n2022,Kerry,6.0\n",
            )
            .await
            .unwrap();
        JoinAdvisor::new(Arc::new(engine))
    }

    #[tokio::test]
    async fn test_candidates_preserve_left_declaration_order() {
        let advisor = advisor_with_tables().await;
        let proposal = advisor.propose_join("px_A", "px_B").await.unwrap();
        assert_eq!(proposal.candidate_keys, vec!["Year", "Value"]);
        assert_eq!(proposal.chosen_key.as_deref(), Some("Year"));
        assert!(!proposal.needs_manual_key());
    }

    #[tokio::test]
    async fn test_same_relation_twice_is_a_validation_error() {
        let advisor = advisor_with_tables().await;
        let err = advisor.propose_join("px_A", "px_A").await.unwrap_err();
        assert!(matches!(err, WorkbenchError::Validation(_)));
        let err = advisor.propose_join("", "px_A").await.unwrap_err();
        assert!(matches!(err, WorkbenchError::Validation(_)));
    }

    #[tokio::test]
    async fn test_no_shared_columns_is_a_valid_degenerate_proposal() {
        let engine = PolarsEngine::new();
        engine.ingest_csv("px_A", "x\n1\n").await.unwrap();
        engine.ingest_csv("px_B", "y\n1\n").await.unwrap();
        let advisor = JoinAdvisor::new(Arc::new(engine));
        let proposal = advisor.propose_join("px_A", "px_B").await.unwrap();
        assert!(proposal.candidate_keys.is_empty());
        assert!(proposal.needs_manual_key());
        assert!(proposal.template().contains("REPLACE_WITH_COLUMN"));
    }

    #[tokio::test]
    async fn test_overlap_counts_distinct_keys() {
        let advisor = advisor_with_tables().await;
        let report = advisor.check_overlap("px_A", "px_B").await.unwrap();
        assert_eq!(report.key, "Year");
        assert_eq!(report.distinct_left, 3);
        assert_eq!(report.distinct_right, 3);
        assert_eq!(report.matching_keys, 2);
        assert!((report.match_percent - 66.666).abs() < 0.1);
        assert!(report.matching_keys <= report.distinct_left.min(report.distinct_right));
    }

    #[tokio::test]
    async fn test_overlap_duplicates_count_once() {
        let engine = PolarsEngine::new();
        engine
            .ingest_csv("px_A", "Year\n2020\n2020\n2020\n2021\n")
            .await
            .unwrap();
        engine.ingest_csv("px_B", "Year\n2020\n2020\n").await.unwrap();
        let advisor = JoinAdvisor::new(Arc::new(engine));
        let report = advisor.check_overlap("px_A", "px_B").await.unwrap();
        assert_eq!(report.distinct_left, 2);
        assert_eq!(report.distinct_right, 1);
        assert_eq!(report.matching_keys, 1);
        assert_eq!(report.match_percent, 50.0);
    }
}
