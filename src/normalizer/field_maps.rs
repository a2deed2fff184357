//! Field list rules
//!
//! Exclusion and dedup-key field lists as configured, and the derived
//! effective key-field list.

use crate::config::ProcessorConfig;
use crate::models::Record;

/// Ordered field lists that drive cleaning and key construction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldRules {
    pub exclude_fields: Vec<String>,
    pub duplicate_fields: Vec<String>,
}

impl FieldRules {
    pub fn new(duplicate_fields: &[String], exclude_fields: &[String]) -> Self {
        Self {
            exclude_fields: exclude_fields.to_vec(),
            duplicate_fields: duplicate_fields.to_vec(),
        }
    }

    pub fn from_config(cfg: &ProcessorConfig) -> Self {
        Self::new(&cfg.duplicate_fields, &cfg.exclude_fields)
    }

    pub fn is_excluded(&self, field: &str) -> bool {
        self.exclude_fields.iter().any(|f| f == field)
    }

    /// Configured duplicate fields minus excluded ones, in configured order
    pub fn configured_key_fields(&self) -> Vec<String> {
        self.duplicate_fields
            .iter()
            .filter(|field| !self.is_excluded(field))
            .cloned()
            .collect()
    }

    /// Key fields for a batch. Falls back to the field names of the first
    /// object record (minus exclusions) when no configured field survives.
    pub fn effective_key_fields(&self, records: &[Record]) -> Vec<String> {
        let configured = self.configured_key_fields();
        if !configured.is_empty() {
            return configured;
        }

        records
            .iter()
            .find_map(Record::as_object)
            .map(|first| {
                first
                    .keys()
                    .filter(|field| !self.is_excluded(field))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn excluded_fields_leave_the_key() {
        let rules = FieldRules::new(&names(&["ip_address", "task"]), &names(&["ip_address"]));
        assert_eq!(rules.configured_key_fields(), names(&["task"]));
    }

    #[test]
    fn configured_order_is_kept() {
        let rules = FieldRules::new(&names(&["username", "from", "task"]), &[]);
        assert_eq!(
            rules.effective_key_fields(&[json!({"task": "a", "from": "b", "username": "c"})]),
            names(&["username", "from", "task"])
        );
    }

    #[test]
    fn falls_back_to_first_record_fields() {
        let rules = FieldRules::new(&names(&["id"]), &names(&["id", "raw"]));
        let records = vec![
            json!({"id": 1, "task": "scan", "raw": "..", "from": "edr"}),
            json!({"other": true}),
        ];
        assert_eq!(rules.effective_key_fields(&records), names(&["task", "from"]));
    }

    #[test]
    fn fallback_skips_non_object_records() {
        let rules = FieldRules::default();
        let records = vec![json!("garbage"), json!({"task": "scan"})];
        assert_eq!(rules.effective_key_fields(&records), names(&["task"]));
    }

    #[test]
    fn empty_batch_has_no_key_fields() {
        assert!(FieldRules::default().effective_key_fields(&[]).is_empty());
    }
}
