//! Engine Adapter
//!
//! The only layer that talks to the embedded analytical engine. The rest of
//! the workbench depends on the `EngineAdapter` trait, so the core stays
//! testable against any in-memory engine implementation.

pub mod adapter;
pub mod polars;
pub mod result;

pub use adapter::{
    ColumnDescriptor, EngineAdapter, EngineScope, RelationInfo, RelationKind,
};
pub use polars::PolarsEngine;
pub use result::QueryResult;
