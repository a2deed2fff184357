//! Aggregator
//!
//! Frequency tables over the deduplicated batch. Every record must carry
//! `task`, `from`, `username` and `ip_address`; the first record missing one
//! ends the run with a schema error.

use crate::error::{PipelineError, Result};
use crate::models::{
    is_truthy, stringify_value, AggregationResult, FrequencyTable, Record, SourceTaskTable,
};
use serde_json::{Map, Value};
use tracing::{error, info};

const TARGET_AGGREGATOR: &str = "aggregator";

pub const TASK_FIELD: &str = "task";
pub const SOURCE_FIELD: &str = "from";
pub const USER_FIELD: &str = "username";
pub const IP_FIELD: &str = "ip_address";

/// Length of the user and IP rankings
pub const TOP_N: usize = 10;

pub fn aggregate(records: &[Record], search_criteria: &Value) -> Result<AggregationResult> {
    let mut task_counts = FrequencyTable::new();
    let mut by_source = SourceTaskTable::new();
    let mut user_counts = FrequencyTable::new();
    // Exact address counts; no prefix bucketing.
    let mut ip_counts = FrequencyTable::new();

    for (index, record) in records.iter().enumerate() {
        let fields = record.as_object().ok_or_else(|| {
            error!(target: TARGET_AGGREGATOR, index, record = %record, "Record is not an object");
            PipelineError::NotAnObject { index }
        })?;

        let task = stringify_value(required(fields, index, TASK_FIELD)?);
        let source = stringify_value(required(fields, index, SOURCE_FIELD)?);
        let user = stringify_value(required(fields, index, USER_FIELD)?);
        let ip = required(fields, index, IP_FIELD)?;

        task_counts.increment(&task);
        by_source.increment(&source, &task);
        user_counts.increment(&user);
        if is_truthy(ip) {
            ip_counts.increment(&stringify_value(ip));
        }
    }

    let result = AggregationResult {
        search: search_criteria.clone(),
        total_events: records.len(),
        top_users: user_counts.most_common(TOP_N),
        top_ips: ip_counts.most_common(TOP_N),
        task_counts,
        by_source,
    };

    info!(
        target: TARGET_AGGREGATOR,
        total_events = result.total_events,
        tasks = result.task_counts.len(),
        sources = result.by_source.len(),
        users = user_counts.len(),
        ips = ip_counts.len(),
        "Aggregation complete"
    );
    Ok(result)
}

fn required<'a>(fields: &'a Map<String, Value>, index: usize, field: &str) -> Result<&'a Value> {
    fields.get(field).ok_or_else(|| {
        error!(target: TARGET_AGGREGATOR, index, field, "Record is missing a required field");
        PipelineError::Schema {
            index,
            field: field.to_string(),
        }
    })
}
