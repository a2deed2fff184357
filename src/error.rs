//! Error taxonomy for a pipeline run.
//!
//! Fetch, aggregation and report errors end the run. Per-record problems in
//! the deduplicator never surface here; they are logged and the record dropped.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Search API request failed: {0}")]
    Network(String),

    #[error("Search API returned an error: {message}")]
    Upstream { message: String, body: String },

    #[error("Record {index} is missing required field '{field}'")]
    Schema { index: usize, field: String },

    #[error("Record {index} is not a JSON object")]
    NotAnObject { index: usize },

    #[error("Failed to write report to {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    /// Taxonomy name used in structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Config(_) => "ConfigError",
            PipelineError::Network(_) => "NetworkError",
            PipelineError::Upstream { .. } => "UpstreamError",
            PipelineError::Schema { .. } | PipelineError::NotAnObject { .. } => "SchemaError",
            PipelineError::Io { .. } => "IOError",
        }
    }

    /// Raw upstream response body, when the error carries one.
    pub fn upstream_body(&self) -> Option<&str> {
        match self {
            PipelineError::Upstream { body, .. } => Some(body),
            _ => None,
        }
    }
}

impl From<config::ConfigError> for PipelineError {
    fn from(err: config::ConfigError) -> Self {
        PipelineError::Config(err.to_string())
    }
}
