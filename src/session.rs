//! Session State
//!
//! The set of relations currently materialized in the engine plus the active
//! selection. The list is only ever replaced wholesale from the engine's own
//! catalog (`refresh`); nothing mutates it incrementally, which is what keeps
//! it from drifting under out-of-order completions.

use crate::engine::{EngineAdapter, RelationInfo, RelationKind};
use crate::error::Result;
use tracing::debug;

#[derive(Debug, Default)]
pub struct SessionState {
    relations: Vec<RelationInfo>,
    active: Option<String>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-derive the relation list from the engine catalog. On failure the
    /// previous list is retained; the error propagates.
    pub async fn refresh(&mut self, engine: &dyn EngineAdapter) -> Result<()> {
        let listed = engine.list_relations().await?;
        debug!("session refresh: {} relations", listed.len());
        self.relations = listed;
        Ok(())
    }

    pub fn relations(&self) -> &[RelationInfo] {
        &self.relations
    }

    pub fn contains(&self, name: &str) -> bool {
        self.relations.iter().any(|r| r.name == name)
    }

    pub fn kind_of(&self, name: &str) -> Option<RelationKind> {
        self.relations.iter().find(|r| r.name == name).map(|r| r.kind)
    }

    /// Select the relation the rest of the UI operates on. Names not present
    /// in the current list are allowed (pending until a later refresh);
    /// operations that need an existing relation re-validate via `contains`.
    pub fn set_active(&mut self, name: impl Into<String>) {
        self.active = Some(name.into());
    }

    pub fn clear_active(&mut self) {
        self.active = None;
    }

    pub fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }
}
