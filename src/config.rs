//! Configuration module
//!
//! Provides structured configuration for the digest pipeline.
//! Configuration can be loaded from:
//! 1. Default values (hardcoded)
//! 2. config.{toml,yaml,json} file (optional), or an explicit file path
//! 3. Environment variables with SOC__ prefix
//!
//! Example environment variable override:
//! SOC__LOGGING__LEVEL=debug
//! SOC__API__URL=https://soc.example.com/api/v1/events/search
//! SOC__PROCESSOR__EXCLUDE_FIELDS=id,raw_log
//!
//! `api.payload` is a JSON document held in a string. The `config` crate
//! lowercases map keys, and the search API is case-sensitive.

use crate::error::PipelineError;
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub processor: ProcessorConfig,
    pub logging: LogConfig,
}

/// Search API endpoint and request template
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub url: String,
    /// Sent verbatim as the `Cookie` header (session token of the search console)
    pub cookie: String,
    pub content_type: String,
    pub timeout_secs: u64,
    /// Ignore HTTP(S)_PROXY environment settings
    pub no_proxy: bool,
    /// Length of the rolling search window ending at run time
    pub window_hours: i64,
    /// Request body template; must hold a `search` object
    #[serde(default = "default_payload", deserialize_with = "payload_from_json")]
    pub payload: Value,
}

/// Record processing rules
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessorConfig {
    pub exclude_fields: Vec<String>,
    pub duplicate_fields: Vec<String>,
    /// Empty disables writing the report file
    pub output_file: String,
}

/// Operational logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    pub level: String,
    pub directory: PathBuf,
    pub filename: String,
    pub console_output: bool,
}

fn default_payload() -> Value {
    json!({ "search": {} })
}

fn payload_from_json<'de, D>(deserializer: D) -> Result<Value, D::Error>
where
    D: Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    serde_json::from_str(&text)
        .map_err(|err| serde::de::Error::custom(format!("api.payload is not valid JSON: {}", err)))
}

/// `SOC__SECTION__KEY` overrides; list fields take comma-separated values
fn environment() -> config::Environment {
    config::Environment::with_prefix("SOC")
        .separator("__")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("processor.exclude_fields")
        .with_list_parse_key("processor.duplicate_fields")
}

impl AppConfig {
    /// Load configuration from defaults, ./config.*, and environment variables
    pub fn new() -> Result<Self, config::ConfigError> {
        Self::load(None)
    }

    /// Load configuration, reading `path` instead of ./config.* when given.
    /// An explicit path must exist.
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        Self::load_with_env(path, environment())
    }

    fn load_with_env(
        path: Option<&Path>,
        env: config::Environment,
    ) -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            // --- Defaults ---
            // API
            .set_default("api.url", "")?
            .set_default("api.cookie", "")?
            .set_default("api.content_type", "application/json")?
            .set_default("api.timeout_secs", 30)?
            .set_default("api.no_proxy", false)?
            .set_default("api.window_hours", 24)?
            // Processor
            .set_default("processor.exclude_fields", Vec::<String>::new())?
            .set_default("processor.duplicate_fields", Vec::<String>::new())?
            .set_default("processor.output_file", "")?
            // Logging
            .set_default("logging.level", "info")?
            .set_default("logging.directory", "logs")?
            .set_default("logging.filename", "socdigest.log")?
            .set_default("logging.console_output", true)?;

        // --- Sources ---
        let builder = match path {
            Some(path) => builder.add_source(config::File::from(path).required(true)),
            None => builder.add_source(config::File::with_name("config").required(false)),
        };

        builder
            .add_source(env)
            .build()?
            .try_deserialize()
    }

    /// Reject settings the pipeline cannot run with, before any network call.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.api.url.trim().is_empty() {
            return Err(PipelineError::Config("api.url is not set".to_string()));
        }
        if self.api.timeout_secs == 0 {
            return Err(PipelineError::Config(
                "api.timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.api.window_hours <= 0 {
            return Err(PipelineError::Config(
                "api.window_hours must be greater than zero".to_string(),
            ));
        }
        match self.api.payload.get("search") {
            Some(Value::Object(_)) => Ok(()),
            Some(_) => Err(PipelineError::Config(
                "api.payload.search must be an object".to_string(),
            )),
            None => Err(PipelineError::Config(
                "api.payload must contain a search object".to_string(),
            )),
        }
    }

    /// Output path for the report, `None` when writing is disabled
    pub fn output_path(&self) -> Option<PathBuf> {
        let trimmed = self.processor.output_file.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(PathBuf::from(trimmed))
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig {
                url: String::new(),
                cookie: String::new(),
                content_type: "application/json".to_string(),
                timeout_secs: 30,
                no_proxy: false,
                window_hours: 24,
                payload: default_payload(),
            },
            processor: ProcessorConfig {
                exclude_fields: Vec::new(),
                duplicate_fields: Vec::new(),
                output_file: String::new(),
            },
            logging: LogConfig {
                level: "info".to_string(),
                directory: PathBuf::from("logs"),
                filename: "socdigest.log".to_string(),
                console_output: true,
            },
        }
    }
}
