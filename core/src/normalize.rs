//! Response normalization.
//!
//! # Design
//! The remote API wraps payloads inconsistently and sometimes names the task
//! identifier `id` instead of `_id`. Decoding is split into two explicit
//! steps so the fallback order can be audited and tested on its own:
//!
//! 1. `ListShape::detect` / `RecordShape::detect` classify the payload by the
//!    first structural match, in priority order.
//! 2. `normalize_ids` copies the alternate `id` into `_id` when the primary
//!    identifier is missing or empty, then the record is decoded into `Task`.
//!
//! Every list and single-record response goes through this module.

use serde_json::{Map, Value};
use tracing::warn;

use crate::error::ApiError;
use crate::types::Task;

/// Primary identifier field of a task record.
pub const PRIMARY_ID: &str = "_id";
/// Alternate identifier field some backends send instead.
pub const ALTERNATE_ID: &str = "id";

/// Accepted wrappings of a task list, in priority order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ListShape<'a> {
    /// `[...]`
    Bare(&'a [Value]),
    /// `{"tasks": [...]}`
    Tasks(&'a [Value]),
    /// `{"data": [...]}`
    Data(&'a [Value]),
    /// Anything else, including no payload. Yields no records.
    Unrecognized,
}

impl<'a> ListShape<'a> {
    pub fn detect(payload: Option<&'a Value>) -> Self {
        match payload {
            Some(Value::Array(items)) => ListShape::Bare(items),
            Some(Value::Object(map)) => match (map.get("tasks"), map.get("data")) {
                (Some(Value::Array(items)), _) => ListShape::Tasks(items),
                (_, Some(Value::Array(items))) => ListShape::Data(items),
                _ => ListShape::Unrecognized,
            },
            _ => ListShape::Unrecognized,
        }
    }

    pub fn records(self) -> &'a [Value] {
        match self {
            ListShape::Bare(items) | ListShape::Tasks(items) | ListShape::Data(items) => items,
            ListShape::Unrecognized => &[],
        }
    }
}

/// Accepted wrappings of a single task, in priority order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RecordShape<'a> {
    /// `{"task": {...}}`
    Task(&'a Map<String, Value>),
    /// `{"data": {...}}`
    Data(&'a Map<String, Value>),
    /// The payload is the record itself.
    Bare(Option<&'a Value>),
}

impl<'a> RecordShape<'a> {
    pub fn detect(payload: Option<&'a Value>) -> Self {
        if let Some(Value::Object(map)) = payload {
            if let Some(Value::Object(task)) = map.get("task") {
                return RecordShape::Task(task);
            }
            if let Some(Value::Object(data)) = map.get("data") {
                return RecordShape::Data(data);
            }
        }
        RecordShape::Bare(payload)
    }

    pub fn record(self) -> Value {
        match self {
            RecordShape::Task(map) | RecordShape::Data(map) => Value::Object(map.clone()),
            RecordShape::Bare(payload) => payload.cloned().unwrap_or(Value::Null),
        }
    }
}

/// Copy the alternate identifier into the primary one when the primary is
/// absent or empty. All other fields, including the alternate, are kept.
pub fn normalize_ids(mut record: Value) -> Value {
    if let Value::Object(map) = &mut record {
        let has_primary = map.get(PRIMARY_ID).is_some_and(is_truthy);
        if !has_primary {
            if let Some(alternate) = map.get(ALTERNATE_ID).filter(|v| is_truthy(v)).cloned() {
                map.insert(PRIMARY_ID.to_string(), alternate);
            }
        }
    }
    record
}

/// Extract every task from a list-shaped payload. Unrecognized shapes yield
/// an empty list. A record that cannot be decoded is logged and skipped; it
/// never fails the rest of the list.
pub fn extract_tasks(payload: Option<&Value>) -> Vec<Task> {
    ListShape::detect(payload)
        .records()
        .iter()
        .cloned()
        .filter_map(|record| match decode(record) {
            Ok(task) => Some(task),
            Err(err) => {
                warn!(error = %err, "skipping undecodable task record");
                None
            }
        })
        .collect()
}

/// Extract one task from a single-record payload.
///
/// `None` when the response carried no payload (204, or a body that was not
/// JSON). A payload that is present but not a task record is an error.
pub fn extract_task(payload: Option<&Value>) -> Result<Option<Task>, ApiError> {
    match RecordShape::detect(payload).record() {
        Value::Null => Ok(None),
        record => decode(record).map(Some).map_err(ApiError::unexpected_payload),
    }
}

fn decode(record: Value) -> Result<Task, serde_json::Error> {
    serde_json::from_value(normalize_ids(record))
}

/// Whether an identifier field counts as present for `normalize_ids`: null,
/// `false`, `0` and `""` are treated as a missing `_id`.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn records() -> Value {
        json!([
            {"_id": "t1", "title": "One", "status": "todo"},
            {"_id": "t2", "title": "Two", "status": "done"}
        ])
    }

    #[test]
    fn list_shapes_yield_the_same_records() {
        let bare = records();
        let tasks = json!({"tasks": records()});
        let data = json!({"data": records()});

        let expected = extract_tasks(Some(&bare));
        assert_eq!(expected.len(), 2);
        assert_eq!(extract_tasks(Some(&tasks)), expected);
        assert_eq!(extract_tasks(Some(&data)), expected);
    }

    #[test]
    fn tasks_key_wins_over_data_key() {
        let payload = json!({"data": [{"_id": "d"}], "tasks": [{"_id": "t"}]});
        assert!(matches!(ListShape::detect(Some(&payload)), ListShape::Tasks(_)));
        let tasks = extract_tasks(Some(&payload));
        assert_eq!(tasks[0].id, "t");
    }

    #[test]
    fn non_array_tasks_key_falls_through_to_data() {
        let payload = json!({"tasks": {"_id": "x"}, "data": [{"_id": "d"}]});
        assert!(matches!(ListShape::detect(Some(&payload)), ListShape::Data(_)));
    }

    #[test]
    fn unrecognized_list_payloads_are_empty() {
        for payload in [json!({"items": []}), json!("tasks"), json!(3), Value::Null] {
            assert_eq!(ListShape::detect(Some(&payload)), ListShape::Unrecognized);
            assert!(extract_tasks(Some(&payload)).is_empty());
        }
        assert!(extract_tasks(None).is_empty());
    }

    #[test]
    fn record_shapes_yield_the_same_record() {
        let record = json!({"_id": "t1", "title": "One", "status": "todo"});
        let wrapped_task = json!({"task": record.clone()});
        let wrapped_data = json!({"data": record.clone()});

        let expected = extract_task(Some(&record)).unwrap().unwrap();
        assert_eq!(extract_task(Some(&wrapped_task)).unwrap().unwrap(), expected);
        assert_eq!(extract_task(Some(&wrapped_data)).unwrap().unwrap(), expected);
    }

    #[test]
    fn task_key_wins_over_data_key() {
        let payload = json!({"data": {"_id": "d"}, "task": {"_id": "t"}});
        assert!(matches!(RecordShape::detect(Some(&payload)), RecordShape::Task(_)));
        assert_eq!(extract_task(Some(&payload)).unwrap().unwrap().id, "t");
    }

    #[test]
    fn alternate_id_is_copied_and_kept() {
        let record = json!({"id": "t9", "title": "Nine", "status": "done", "tags": ["a"]});
        let normalized = normalize_ids(record.clone());
        assert_eq!(normalized["_id"], "t9");
        for (key, value) in record.as_object().unwrap() {
            assert_eq!(&normalized[key], value, "{key} changed");
        }
    }

    #[test]
    fn present_primary_id_is_untouched() {
        let record = json!({"_id": "primary", "id": "alternate"});
        assert_eq!(normalize_ids(record.clone()), record);
    }

    #[test]
    fn empty_primary_id_is_replaced() {
        let normalized = normalize_ids(json!({"_id": "", "id": "t3"}));
        assert_eq!(normalized["_id"], "t3");
        let normalized = normalize_ids(json!({"_id": null, "id": 12}));
        assert_eq!(normalized["_id"], 12);
    }

    #[test]
    fn list_records_are_normalized() {
        let payload = json!({"data": [{"id": "t1", "title": "X", "status": "todo"}]});
        let tasks = extract_tasks(Some(&payload));
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].id, "t1");
        assert_eq!(tasks[0].extra.get("id"), Some(&json!("t1")));
    }

    #[test]
    fn undecodable_records_are_skipped_not_fatal() {
        let payload = json!([
            {"_id": "t1", "title": "ok", "status": "todo"},
            {"_id": "t2", "title": null, "status": null},
            {"_id": "t3", "title": "Archived", "status": "archived"},
            "not a record",
            {"_id": "t4", "title": "last", "status": "done"}
        ]);
        let tasks = extract_tasks(Some(&payload));
        let ids: Vec<&str> = tasks.iter().map(|task| task.id.as_str()).collect();
        assert_eq!(ids, ["t1", "t2", "t4"]);
        assert_eq!(tasks[1].title, "");

        let wrapped = json!({"data": payload});
        assert_eq!(extract_tasks(Some(&wrapped)), tasks);
    }

    #[test]
    fn missing_record_payload_is_none() {
        assert_eq!(extract_task(None).unwrap(), None);
        assert_eq!(extract_task(Some(&Value::Null)).unwrap(), None);
    }

    #[test]
    fn present_but_unusable_record_is_an_api_error() {
        let err = extract_task(Some(&json!({"_id": "t1", "status": "archived"}))).unwrap_err();
        assert_eq!(err.status, 502);
        let err = extract_task(Some(&json!("Created"))).unwrap_err();
        assert_eq!(err.status, 502);
    }
}
