//! Report renderer and writer.
//!
//! Renders an aggregation result into the fixed plain-text digest and
//! overwrites the configured report file with it.

use crate::error::{PipelineError, Result};
use crate::models::AggregationResult;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const TARGET_REPORT: &str = "report";

/// Rendered digest and where it went, if anywhere
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedReport {
    pub text: String,
    pub written_to: Option<PathBuf>,
}

/// Fixed layout: search criteria, total, full task table, top users, top IPs.
pub fn render(result: &AggregationResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Source data:");
    let _ = writeln!(out, "- Search criteria: {}", result.search);
    let _ = writeln!(out, "- Total events: {}", result.total_events);
    let _ = writeln!(
        out,
        "- Task distribution: {{{}}}",
        result
            .task_counts
            .iter()
            .map(|(task, count)| format!("{}: {}", quote(task), count))
            .collect::<Vec<_>>()
            .join(", ")
    );
    let _ = writeln!(out, "- User counts: {}", render_pairs(&result.top_users));
    let _ = write!(out, "- Top 10 IPs: {}", render_pairs(&result.top_ips));
    out
}

/// Render and persist. An empty path skips the write but still returns the text.
pub fn save_report(result: &AggregationResult, output_path: &Path) -> Result<SavedReport> {
    let text = render(result);

    if output_path.as_os_str().is_empty() {
        warn!(target: TARGET_REPORT, "No output file configured; report not written");
        return Ok(SavedReport {
            text,
            written_to: None,
        });
    }

    std::fs::write(output_path, &text).map_err(|source| PipelineError::Io {
        path: output_path.to_path_buf(),
        source,
    })?;

    info!(target: TARGET_REPORT, path = ?output_path, bytes = text.len(), "Report saved");
    Ok(SavedReport {
        text,
        written_to: Some(output_path.to_path_buf()),
    })
}

pub fn save(result: &AggregationResult, output_path: impl AsRef<Path>) -> Result<String> {
    save_report(result, output_path.as_ref()).map(|saved| saved.text)
}

fn render_pairs(pairs: &[(String, u64)]) -> String {
    let body = pairs
        .iter()
        .map(|(key, count)| format!("({}, {})", quote(key), count))
        .collect::<Vec<_>>()
        .join(", ");
    format!("[{}]", body)
}

fn quote(text: &str) -> String {
    serde_json::Value::from(text).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::aggregate;
    use serde_json::json;

    fn sample() -> AggregationResult {
        let records = vec![
            json!({"task": "scan", "from": "edr", "username": "alice", "ip_address": "10.0.0.1"}),
            json!({"task": "scan", "from": "edr", "username": "bob", "ip_address": ""}),
            json!({"task": "login", "from": "vpn", "username": "alice", "ip_address": "10.0.0.1"}),
        ];
        aggregate(&records, &json!({"level": "high"})).unwrap()
    }

    #[test]
    fn test_render_layout() {
        let text = render(&sample());
        let expected = [
            "Source data:",
            r#"- Search criteria: {"level":"high"}"#,
            "- Total events: 3",
            r#"- Task distribution: {"scan": 2, "login": 1}"#,
            r#"- User counts: [("alice", 2), ("bob", 1)]"#,
            r#"- Top 10 IPs: [("10.0.0.1", 2)]"#,
        ]
        .join("\n");
        assert_eq!(text, expected);
    }

    #[test]
    fn test_render_empty_result() {
        let empty = aggregate(&[], &json!({})).unwrap();
        let text = render(&empty);
        assert!(text.contains("- Total events: 0"));
        assert!(text.contains("- Task distribution: {}"));
        assert!(text.contains("- User counts: []"));
        assert!(text.ends_with("- Top 10 IPs: []"));
    }

    #[test]
    fn test_empty_path_skips_write() {
        let saved = save_report(&sample(), Path::new("")).unwrap();
        assert_eq!(saved.written_to, None);
        assert_eq!(saved.text, render(&sample()));
    }

    #[test]
    fn test_save_overwrites_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.txt");
        std::fs::write(&path, "previous run contents that are much longer than the new one")
            .unwrap();

        let text = save(&sample(), &path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), text);
    }

    #[test]
    fn test_unwritable_path_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("report.txt");
        let err = save(&sample(), &path).unwrap_err();
        assert_eq!(err.kind(), "IOError");
    }
}
