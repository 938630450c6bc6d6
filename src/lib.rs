//! Dataset Session Workbench
//!
//! Core of an interactive workbench over an embedded analytical engine:
//! ingest remote CSV datasets into named relations, inspect schemas with
//! per-column value drill-down, discover join keys and key overlap between
//! loaded relations, and search the remote dataset catalog.

pub mod catalog;
pub mod engine;
pub mod error;
pub mod export;
pub mod ingest;
pub mod join;
pub mod schema;
pub mod session;
pub mod sql;
pub mod workbench;

pub use catalog::{CatalogClient, CatalogEntry};
pub use engine::{
    ColumnDescriptor, EngineAdapter, EngineScope, PolarsEngine, QueryResult, RelationInfo,
    RelationKind,
};
pub use error::{Result, WorkbenchError};
pub use ingest::{DatasetFetcher, FetchedCsv, HttpFetcher};
pub use join::{JoinProposal, OverlapReport};
pub use schema::ValueFrequency;
pub use workbench::Workbench;
