//! Search API collector module
//!
//! Pulls one window of security events from the remote search API.
//!
//! ## Request
//! A single `POST` per run. The body is the configured payload template with
//! the run window merged into its `search` object:
//!
//! ```json
//! { "page": 1, "search": { "level": "high",
//!   "event_time_start": "2026-03-01 08:30:00",
//!   "event_time_end": "2026-03-02 08:30:00" } }
//! ```
//!
//! ## Response
//! `{ "code": 0, "data": { "data": [ {..}, {..} ] } }`. Any other `code`, or a
//! body that is not JSON, is an upstream failure carrying the raw body.
//! There is no retry here; the next scheduled run starts over.

use crate::config::{ApiConfig, AppConfig};
use crate::error::{PipelineError, Result};
use crate::models::{Record, RunWindow};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, COOKIE};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

const TARGET_COLLECTOR: &str = "collector";

/// Keys the run window adds to the template's `search` object
pub const WINDOW_START_KEY: &str = "event_time_start";
pub const WINDOW_END_KEY: &str = "event_time_end";

/// Anything that can answer a search payload with raw records.
pub trait RecordSource {
    fn fetch(&self, payload: &Value) -> Result<Vec<Record>>;
}

/// HTTP client for the search API
pub struct Collector {
    client: Client,
    url: String,
    headers: HeaderMap,
}

impl Collector {
    pub fn new(cfg: &ApiConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let content_type = HeaderValue::from_str(&cfg.content_type).map_err(|err| {
            PipelineError::Config(format!("api.content_type is not a valid header: {}", err))
        })?;
        headers.insert(CONTENT_TYPE, content_type);

        if !cfg.cookie.is_empty() {
            let mut cookie = HeaderValue::from_str(&cfg.cookie).map_err(|err| {
                PipelineError::Config(format!("api.cookie is not a valid header: {}", err))
            })?;
            cookie.set_sensitive(true);
            headers.insert(COOKIE, cookie);
        }

        let mut builder = Client::builder().timeout(Duration::from_secs(cfg.timeout_secs));
        if cfg.no_proxy {
            builder = builder.no_proxy();
        }
        let client = builder
            .build()
            .map_err(|err| PipelineError::Network(format!("HTTP client setup failed: {}", err)))?;

        Ok(Self {
            client,
            url: cfg.url.clone(),
            headers,
        })
    }
}

impl RecordSource for Collector {
    fn fetch(&self, payload: &Value) -> Result<Vec<Record>> {
        let body = serde_json::to_string(payload)
            .map_err(|err| PipelineError::Config(format!("payload is not serializable: {}", err)))?;

        debug!(target: TARGET_COLLECTOR, url = %self.url, payload = %body, "Posting search request");

        let response = self
            .client
            .post(&self.url)
            .headers(self.headers.clone())
            .body(body)
            .send()
            .map_err(|err| PipelineError::Network(err.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .map_err(|err| PipelineError::Network(format!("failed to read response: {}", err)))?;

        if !status.is_success() {
            return Err(PipelineError::Network(format!(
                "HTTP {} from {}",
                status, self.url
            )));
        }

        let records = parse_response(&text)?;
        info!(target: TARGET_COLLECTOR, count = records.len(), "Fetched raw records");
        Ok(records)
    }
}

/// Template plus run window. The template's own `search` keys are kept;
/// the window keys always win.
pub fn build_payload(template: &Value, window: &RunWindow) -> Result<Value> {
    let mut payload = template.clone();
    let search = payload
        .get_mut("search")
        .and_then(Value::as_object_mut)
        .ok_or_else(|| {
            PipelineError::Config("api.payload must contain a search object".to_string())
        })?;

    search.insert(
        WINDOW_START_KEY.to_string(),
        Value::String(window.start_text()),
    );
    search.insert(WINDOW_END_KEY.to_string(), Value::String(window.end_text()));
    Ok(payload)
}

/// Check the API status code and pull out `data.data`.
pub fn parse_response(body: &str) -> Result<Vec<Record>> {
    let upstream = |message: String| PipelineError::Upstream {
        message,
        body: body.to_string(),
    };

    let mut parsed: Value = serde_json::from_str(body)
        .map_err(|err| upstream(format!("response is not valid JSON: {}", err)))?;

    match parsed.get("code") {
        Some(code) if code.as_f64() == Some(0.0) => {}
        Some(code) => return Err(upstream(format!("status code {}", code))),
        None => return Err(upstream("response has no status code".to_string())),
    }

    match parsed
        .get_mut("data")
        .and_then(|data| data.get_mut("data"))
        .map(Value::take)
    {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(records)) => Ok(records),
        Some(other) => Err(upstream(format!(
            "data.data is not an array (found {})",
            json_type_name(&other)
        ))),
    }
}

/// Fetch the current window using the API section of `cfg`.
pub fn fetch(cfg: &AppConfig) -> Result<Vec<Record>> {
    cfg.validate()?;
    let window = RunWindow::current(cfg.api.window_hours);
    let payload = build_payload(&cfg.api.payload, &window)?;
    Collector::new(&cfg.api)?.fetch(&payload)
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
