//! socdigest library interface
//!
//! Exposes the pipeline stages for use by the binary and tests.

pub mod aggregator;
pub mod collector;
pub mod config;
pub mod dedup;
pub mod error;
pub mod models;
pub mod normalizer;
pub mod pipeline;
pub mod report;
pub mod utils;

pub use error::{PipelineError, Result};
pub use pipeline::{Pipeline, RunSummary};
