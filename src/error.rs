use thiserror::Error;

#[derive(Error, Debug)]
pub enum WorkbenchError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Another operation is already in progress")]
    Busy,

    #[error("Dataset '{code}' not found on the remote service")]
    NotFound { code: String },

    #[error("Remote service unavailable for dataset '{code}' (HTTP {status})")]
    UpstreamUnavailable { code: String, status: u16 },

    #[error("Fetch failed for dataset '{code}' (HTTP {status})")]
    Fetch { code: String, status: u16 },

    #[error("Dataset '{code}' returned non-CSV content ({content_type})")]
    Format { code: String, content_type: String },

    #[error("Dataset '{code}' returned an empty body")]
    EmptyDataset { code: String },

    #[error("Ingestion of dataset '{code}' failed: {message}")]
    Ingestion { code: String, message: String },

    #[error("Engine error: {0}")]
    Engine(String),

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<polars::prelude::PolarsError> for WorkbenchError {
    fn from(e: polars::prelude::PolarsError) -> Self {
        WorkbenchError::Engine(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, WorkbenchError>;
