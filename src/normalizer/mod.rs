//! Record cleaner
//!
//! Strips configured fields from every record before deduplication.

pub mod field_maps;

pub use field_maps::FieldRules;

use crate::models::Record;
use serde_json::Value;
use tracing::info;

const TARGET_NORMALIZER: &str = "normalizer";

/// Copy of `records` without any field named in `exclude_fields`.
///
/// Non-object records have no fields to strip and are passed through as is.
pub fn clean(records: &[Record], exclude_fields: &[String]) -> Vec<Record> {
    info!(
        target: TARGET_NORMALIZER,
        exclude_fields = ?exclude_fields,
        "Cleaning records"
    );

    let cleaned: Vec<Record> = records
        .iter()
        .map(|record| strip_fields(record, exclude_fields))
        .collect();

    info!(
        target: TARGET_NORMALIZER,
        input = records.len(),
        output = cleaned.len(),
        "Cleaning complete"
    );
    cleaned
}

fn strip_fields(record: &Record, exclude_fields: &[String]) -> Record {
    match record {
        Value::Object(fields) => Value::Object(
            fields
                .iter()
                .filter(|(name, _)| !exclude_fields.iter().any(|ex| ex == *name))
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect(),
        ),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn excl(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn removes_excluded_fields_only() {
        let records = vec![json!({"task": "scan", "id": 7, "raw": "blob"})];
        let cleaned = clean(&records, &excl(&["id", "raw"]));
        assert_eq!(cleaned, vec![json!({"task": "scan"})]);
    }

    #[test]
    fn input_is_left_untouched() {
        let records = vec![json!({"task": "scan", "id": 7})];
        let _ = clean(&records, &excl(&["id"]));
        assert_eq!(records[0]["id"], json!(7));
    }

    #[test]
    fn absent_fields_are_not_an_error() {
        let records = vec![json!({"task": "scan"}), json!({})];
        assert_eq!(clean(&records, &excl(&["nope"])), records);
    }

    #[test]
    fn cleaning_twice_equals_once() {
        let records = vec![
            json!({"task": "scan", "id": 1, "ip_address": "1.1.1.1"}),
            json!({"task": "login", "id": 2}),
        ];
        let exclude = excl(&["id"]);
        let once = clean(&records, &exclude);
        assert_eq!(clean(&once, &exclude), once);
    }

    #[test]
    fn non_object_records_pass_through() {
        let records = vec![json!("not a record"), json!(null)];
        assert_eq!(clean(&records, &excl(&["task"])), records);
    }
}
