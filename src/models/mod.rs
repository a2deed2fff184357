//! Data models module
//!
//! Defines the records flowing through a run and the derived structures
//! (dedup keys, frequency tables, aggregation result, run window, stage).

use crate::utils::format_local;
use chrono::{DateTime, Duration, Local};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// One security event as returned by the search API.
///
/// Expected to be a JSON object with an open field set; nothing else about
/// its shape is guaranteed upstream.
pub type Record = Value;

/// Text form of a field value used for dedup keys and counter keys.
///
/// Strings are taken verbatim, everything else is rendered as compact JSON.
pub fn stringify_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Whether a field value counts as present for optional counters.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Ordered tuple of stringified key-field values.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey(pub Vec<String>);

impl DedupKey {
    pub fn parts(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for DedupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.0.join(", "))
    }
}

/// Counter that remembers the order in which keys were first seen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrequencyTable {
    entries: Vec<(String, u64)>,
    index: HashMap<String, usize>,
}

impl FrequencyTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&mut self, key: &str) {
        match self.index.get(key) {
            Some(&pos) => self.entries[pos].1 += 1,
            None => {
                self.index.insert(key.to_string(), self.entries.len());
                self.entries.push((key.to_string(), 1));
            }
        }
    }

    pub fn get(&self, key: &str) -> u64 {
        self.index
            .get(key)
            .map(|&pos| self.entries[pos].1)
            .unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of all counts
    pub fn total(&self) -> u64 {
        self.entries.iter().map(|(_, count)| count).sum()
    }

    /// Entries in first-seen order
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.entries.iter().map(|(key, count)| (key.as_str(), *count))
    }

    /// The `n` highest counts, descending. Equal counts keep first-seen order.
    pub fn most_common(&self, n: usize) -> Vec<(String, u64)> {
        let mut ranked = self.entries.clone();
        // sort_by is stable, which is what gives the tie order
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked.truncate(n);
        ranked
    }
}

/// Per-source task counters, sources in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceTaskTable {
    sources: Vec<(String, FrequencyTable)>,
    index: HashMap<String, usize>,
}

impl SourceTaskTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&mut self, source: &str, task: &str) {
        let pos = match self.index.get(source) {
            Some(&pos) => pos,
            None => {
                self.index.insert(source.to_string(), self.sources.len());
                self.sources
                    .push((source.to_string(), FrequencyTable::new()));
                self.sources.len() - 1
            }
        };
        self.sources[pos].1.increment(task);
    }

    pub fn get(&self, source: &str) -> Option<&FrequencyTable> {
        self.index.get(source).map(|&pos| &self.sources[pos].1)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FrequencyTable)> {
        self.sources.iter().map(|(source, table)| (source.as_str(), table))
    }
}

/// Summary statistics for one run, consumed once by the reporter.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationResult {
    /// The `search` object that was sent to the API (window included)
    pub search: Value,
    pub total_events: usize,
    pub task_counts: FrequencyTable,
    pub by_source: SourceTaskTable,
    pub top_users: Vec<(String, u64)>,
    pub top_ips: Vec<(String, u64)>,
}

/// Rolling search interval `[end - length, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunWindow {
    pub start: DateTime<Local>,
    pub end: DateTime<Local>,
}

impl RunWindow {
    pub fn ending_at(end: DateTime<Local>, hours: i64) -> Self {
        Self {
            start: end - Duration::hours(hours),
            end,
        }
    }

    /// Window of `hours` ending now
    pub fn current(hours: i64) -> Self {
        Self::ending_at(Local::now(), hours)
    }

    pub fn start_text(&self) -> String {
        format_local(&self.start)
    }

    pub fn end_text(&self) -> String {
        format_local(&self.end)
    }
}

impl fmt::Display for RunWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start_text(), self.end_text())
    }
}

/// Position of a run in its state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Fetching,
    Cleaning,
    Deduplicating,
    Aggregating,
    Reporting,
    Done,
    Failed,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Idle => "idle",
            Stage::Fetching => "fetching",
            Stage::Cleaning => "cleaning",
            Stage::Deduplicating => "deduplicating",
            Stage::Aggregating => "aggregating",
            Stage::Reporting => "reporting",
            Stage::Done => "done",
            Stage::Failed => "failed",
        }
    }

    /// Next stage on success; terminal stages stay put
    pub fn next(&self) -> Stage {
        match self {
            Stage::Idle => Stage::Fetching,
            Stage::Fetching => Stage::Cleaning,
            Stage::Cleaning => Stage::Deduplicating,
            Stage::Deduplicating => Stage::Aggregating,
            Stage::Aggregating => Stage::Reporting,
            Stage::Reporting => Stage::Done,
            Stage::Done => Stage::Done,
            Stage::Failed => Stage::Failed,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Done | Stage::Failed)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
