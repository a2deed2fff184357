//! Pipeline run
//!
//! One strictly sequential pass:
//! `Idle -> Fetching -> Cleaning -> Deduplicating -> Aggregating -> Reporting -> Done`.
//! Any error moves the run to `Failed` and is returned as is; the next run
//! starts from `Idle` with a fresh window.

use crate::aggregator::aggregate;
use crate::collector::{build_payload, Collector, RecordSource};
use crate::config::AppConfig;
use crate::dedup::deduplicate_with;
use crate::error::{PipelineError, Result};
use crate::models::{RunWindow, Stage};
use crate::normalizer::{clean, FieldRules};
use crate::report::save_report;
use serde_json::Value;
use std::path::PathBuf;
use tracing::{error, info};

const TARGET_PIPELINE: &str = "pipeline";

/// Outcome of a successful run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub window: RunWindow,
    pub fetched: usize,
    pub cleaned: usize,
    pub unique: usize,
    pub report: String,
    pub written_to: Option<PathBuf>,
}

pub struct Pipeline<S: RecordSource> {
    cfg: AppConfig,
    rules: FieldRules,
    source: S,
    stage: Stage,
}

impl Pipeline<Collector> {
    /// Pipeline backed by the HTTP collector
    pub fn from_config(cfg: AppConfig) -> Result<Self> {
        cfg.validate()?;
        let collector = Collector::new(&cfg.api)?;
        Self::with_source(cfg, collector)
    }
}

impl<S: RecordSource> Pipeline<S> {
    pub fn with_source(cfg: AppConfig, source: S) -> Result<Self> {
        cfg.validate()?;
        Ok(Self {
            rules: FieldRules::from_config(&cfg.processor),
            cfg,
            source,
            stage: Stage::Idle,
        })
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Run once over a window ending now.
    pub fn run(&mut self) -> Result<RunSummary> {
        let window = RunWindow::current(self.cfg.api.window_hours);
        self.run_window(window)
    }

    /// Run once over the given window.
    pub fn run_window(&mut self, window: RunWindow) -> Result<RunSummary> {
        self.stage = Stage::Idle;
        info!(target: TARGET_PIPELINE, window = %window, "Run started");

        match self.execute(window) {
            Ok(summary) => {
                self.stage = Stage::Done;
                info!(
                    target: TARGET_PIPELINE,
                    fetched = summary.fetched,
                    unique = summary.unique,
                    written_to = ?summary.written_to,
                    "Run complete"
                );
                Ok(summary)
            }
            Err(err) => {
                let failed_in = self.stage;
                self.stage = Stage::Failed;
                match &err {
                    PipelineError::Upstream { body, .. } => error!(
                        target: TARGET_PIPELINE,
                        stage = %failed_in,
                        kind = err.kind(),
                        error = %err,
                        body = %body,
                        "Run failed"
                    ),
                    _ => error!(
                        target: TARGET_PIPELINE,
                        stage = %failed_in,
                        kind = err.kind(),
                        error = %err,
                        "Run failed"
                    ),
                }
                Err(err)
            }
        }
    }

    fn advance(&mut self) {
        self.stage = self.stage.next();
        tracing::debug!(target: TARGET_PIPELINE, stage = %self.stage, "Stage entered");
    }

    fn execute(&mut self, window: RunWindow) -> Result<RunSummary> {
        self.advance(); // Fetching
        let payload = build_payload(&self.cfg.api.payload, &window)?;
        let search = payload.get("search").cloned().unwrap_or(Value::Null);
        let raw = self.source.fetch(&payload)?;
        info!(target: TARGET_PIPELINE, count = raw.len(), "Fetched raw records");

        self.advance(); // Cleaning
        let cleaned = clean(&raw, &self.rules.exclude_fields);

        self.advance(); // Deduplicating
        let unique = deduplicate_with(&cleaned, &self.rules);

        self.advance(); // Aggregating
        let result = aggregate(&unique, &search)?;

        self.advance(); // Reporting
        let output = self.cfg.output_path().unwrap_or_default();
        let saved = save_report(&result, &output)?;

        Ok(RunSummary {
            window,
            fetched: raw.len(),
            cleaned: cleaned.len(),
            unique: unique.len(),
            report: saved.text,
            written_to: saved.written_to,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Record;
    use chrono::{Local, TimeZone};
    use serde_json::json;
    use std::cell::RefCell;

    /// Replays canned records and remembers the payloads it was sent
    struct StaticSource {
        records: Vec<Record>,
        payloads: RefCell<Vec<Value>>,
    }

    impl StaticSource {
        fn new(records: Vec<Record>) -> Self {
            Self {
                records,
                payloads: RefCell::new(Vec::new()),
            }
        }
    }

    impl RecordSource for StaticSource {
        fn fetch(&self, payload: &Value) -> Result<Vec<Record>> {
            self.payloads.borrow_mut().push(payload.clone());
            Ok(self.records.clone())
        }
    }

    struct FailingSource;

    impl RecordSource for FailingSource {
        fn fetch(&self, _payload: &Value) -> Result<Vec<Record>> {
            Err(PipelineError::Upstream {
                message: "status code 500".to_string(),
                body: r#"{"code":500}"#.to_string(),
            })
        }
    }

    fn config() -> AppConfig {
        let mut cfg = AppConfig::default();
        cfg.api.url = "http://127.0.0.1:9/search".to_string();
        cfg.api.payload = json!({ "size": 1000, "search": { "level": "high" } });
        cfg.processor.exclude_fields = vec!["id".to_string()];
        cfg.processor.duplicate_fields = vec![
            "task".to_string(),
            "from".to_string(),
            "username".to_string(),
            "ip_address".to_string(),
        ];
        cfg
    }

    fn window() -> RunWindow {
        RunWindow::ending_at(Local.with_ymd_and_hms(2026, 3, 2, 8, 30, 0).unwrap(), 24)
    }

    #[test]
    fn test_run_deduplicates_before_counting() {
        let source = StaticSource::new(vec![
            json!({"id": 1, "task": "scan", "from": "s1", "username": "a", "ip_address": "1.1.1.1"}),
            json!({"id": 2, "task": "scan", "from": "s1", "username": "a", "ip_address": "1.1.1.1"}),
        ]);
        let mut pipeline = Pipeline::with_source(config(), source).unwrap();
        let summary = pipeline.run_window(window()).unwrap();

        assert_eq!(pipeline.stage(), Stage::Done);
        assert_eq!(summary.fetched, 2);
        assert_eq!(summary.cleaned, 2);
        assert_eq!(summary.unique, 1);
        assert!(summary.report.contains("- Total events: 1"));
        assert!(summary.report.contains(r#"- Task distribution: {"scan": 1}"#));
        assert_eq!(summary.written_to, None);
    }

    #[test]
    fn test_run_sends_window_and_reports_it() {
        let source = StaticSource::new(Vec::new());
        let mut pipeline = Pipeline::with_source(config(), source).unwrap();
        let summary = pipeline.run_window(window()).unwrap();

        let sent = pipeline.source.payloads.borrow();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0]["size"], json!(1000));
        assert_eq!(sent[0]["search"]["event_time_start"], json!("2026-03-01 08:30:00"));
        assert!(summary.report.contains(r#""event_time_end":"2026-03-02 08:30:00""#));
        assert!(summary.report.contains("- Total events: 0"));
    }

    #[test]
    fn test_upstream_failure_marks_run_failed() {
        let mut pipeline = Pipeline::with_source(config(), FailingSource).unwrap();
        let err = pipeline.run_window(window()).unwrap_err();
        assert_eq!(err.kind(), "UpstreamError");
        assert_eq!(pipeline.stage(), Stage::Failed);
    }

    #[test]
    fn test_schema_failure_aborts_before_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.txt");
        let mut cfg = config();
        cfg.processor.output_file = path.to_string_lossy().into_owned();

        let source = StaticSource::new(vec![json!({"task": "scan", "from": "s1"})]);
        let mut pipeline = Pipeline::with_source(cfg, source).unwrap();
        let err = pipeline.run_window(window()).unwrap_err();

        assert_eq!(err.kind(), "SchemaError");
        assert!(!path.exists());
    }

    #[test]
    fn test_invalid_config_is_rejected_up_front() {
        let mut cfg = config();
        cfg.api.url.clear();
        let err = Pipeline::with_source(cfg, StaticSource::new(Vec::new()))
            .err()
            .unwrap();
        assert_eq!(err.kind(), "ConfigError");
    }

    #[test]
    fn test_failed_run_can_be_followed_by_fresh_run() {
        let source = StaticSource::new(vec![json!("broken"), json!({"task": "scan"})]);
        let mut cfg = config();
        cfg.processor.duplicate_fields = vec!["task".to_string()];
        let mut pipeline = Pipeline::with_source(cfg, source).unwrap();

        // dedup drops the non-object, aggregation then rejects the partial record
        assert!(pipeline.run_window(window()).is_err());
        assert_eq!(pipeline.stage(), Stage::Failed);
        assert!(pipeline.run_window(window()).is_err());
        assert_eq!(pipeline.source.payloads.borrow().len(), 2);
    }
}
