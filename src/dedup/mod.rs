//! Deduplicator
//!
//! Drops records whose key-field values repeat an earlier record, keeping
//! the first occurrence and the input order.
//!
//! A record that cannot be keyed (not a JSON object) is logged and skipped;
//! the rest of the batch is still processed.

use crate::models::{stringify_value, DedupKey, Record};
use crate::normalizer::FieldRules;
use crate::utils::LogRateLimiter;
use std::collections::HashSet;
use thiserror::Error;
use tracing::{debug, info, warn};

const TARGET_DEDUP: &str = "dedup";

/// Per-record failures logged in full before the rest are only counted
const RECORD_ERROR_LOG_BUDGET: u64 = 5;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("record is not an object (found {0})")]
    NotAnObject(&'static str),
}

impl RecordError {
    fn key(&self) -> &'static str {
        match self {
            RecordError::NotAnObject(_) => "not_an_object",
        }
    }
}

/// Build the key of one record. Missing fields contribute an empty string.
pub fn dedup_key(record: &Record, key_fields: &[String]) -> Result<DedupKey, RecordError> {
    let fields = record
        .as_object()
        .ok_or_else(|| RecordError::NotAnObject(value_kind(record)))?;

    Ok(DedupKey(
        key_fields
            .iter()
            .map(|field| fields.get(field).map(stringify_value).unwrap_or_default())
            .collect(),
    ))
}

/// First occurrence of every distinct key, in input order.
pub fn deduplicate(
    records: &[Record],
    duplicate_fields: &[String],
    exclude_fields: &[String],
) -> Vec<Record> {
    let rules = FieldRules::new(duplicate_fields, exclude_fields);
    deduplicate_with(records, &rules)
}

pub fn deduplicate_with(records: &[Record], rules: &FieldRules) -> Vec<Record> {
    if rules.configured_key_fields().is_empty() && !records.is_empty() {
        warn!(
            target: TARGET_DEDUP,
            "No usable duplicate fields configured; keying on all non-excluded fields"
        );
    }
    let key_fields = rules.effective_key_fields(records);
    info!(target: TARGET_DEDUP, key_fields = ?key_fields, "Deduplicating records");

    let mut seen: HashSet<DedupKey> = HashSet::with_capacity(records.len());
    let mut unique = Vec::new();
    let mut limiter = LogRateLimiter::new(RECORD_ERROR_LOG_BUDGET);
    let mut skipped = 0usize;

    for (index, record) in records.iter().enumerate() {
        match dedup_key(record, &key_fields) {
            Ok(key) => {
                if !seen.contains(&key) {
                    debug!(target: TARGET_DEDUP, key = %key, "New record");
                    seen.insert(key);
                    unique.push(record.clone());
                }
            }
            Err(err) => {
                skipped += 1;
                if limiter.should_emit(err.key()).should_emit {
                    warn!(
                        target: TARGET_DEDUP,
                        index,
                        error = %err,
                        record = %record,
                        "Skipping record that cannot be keyed"
                    );
                }
            }
        }
    }

    for (kind, count) in limiter.suppressed() {
        warn!(
            target: TARGET_DEDUP,
            kind = %kind,
            suppressed = count,
            "Further record errors were not logged individually"
        );
    }

    info!(
        target: TARGET_DEDUP,
        input = records.len(),
        output = unique.len(),
        skipped,
        "Deduplication complete"
    );
    unique
}

fn value_kind(record: &Record) -> &'static str {
    match record {
        Record::Null => "null",
        Record::Bool(_) => "boolean",
        Record::Number(_) => "number",
        Record::String(_) => "string",
        Record::Array(_) => "array",
        Record::Object(_) => "object",
    }
}
