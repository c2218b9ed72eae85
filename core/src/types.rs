//! Domain DTOs for the task API.
//!
//! # Design
//! `Task` is decoded leniently: the remote API is not consistent about which
//! fields it sends, so every field tolerates being absent or `null`. Only a
//! status outside the known vocabulary, or an id that is neither a string nor
//! a number, makes a record undecodable.
//! Unknown fields are kept in `extra`, which also preserves the alternate `id`
//! field after normalization copies it into `_id`.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Workflow state of a task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Done,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 3] = [TaskStatus::Todo, TaskStatus::InProgress, TaskStatus::Done];

    /// Wire value.
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Done => "done",
        }
    }

    /// Human-readable label.
    pub fn label(self) -> &'static str {
        match self {
            TaskStatus::Todo => "To do",
            TaskStatus::InProgress => "In progress",
            TaskStatus::Done => "Done",
        }
    }
}

/// A task owned by the signed-in account, as returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Server-assigned identifier. Empty when the server sent none.
    #[serde(rename = "_id", default, deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(default, deserialize_with = "deserialize_nullable")]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "deserialize_nullable")]
    pub status: TaskStatus,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    /// Fields this client does not model.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The client-submittable part of a task. Create and update both send the
/// full payload; `due_date: None` clears the due date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPayload {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: TaskStatus,
    #[serde(default)]
    pub due_date: Option<String>,
}

/// Email and password for register and login.
#[derive(Clone, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Identifiers arrive as strings from most backends and as numbers from some.
fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(id)) => Ok(id),
        Some(Value::Number(id)) => Ok(id.to_string()),
        Some(other) => Err(serde::de::Error::custom(format!(
            "task id must be a string or number, got {other}"
        ))),
    }
}

/// `null` decodes to the field's default.
fn deserialize_nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn task_decodes_full_record() {
        let task: Task = serde_json::from_value(json!({
            "_id": "t1",
            "title": "Ship",
            "description": "Release build",
            "status": "in_progress",
            "dueDate": "2025-03-01T00:00:00.000Z",
            "createdAt": "2025-01-01T00:00:00.000Z",
            "updatedAt": "2025-01-02T00:00:00.000Z",
            "owner": "u1"
        }))
        .unwrap();
        assert_eq!(task.id, "t1");
        assert_eq!(task.status, TaskStatus::InProgress);
        assert_eq!(task.due_date.as_deref(), Some("2025-03-01T00:00:00.000Z"));
        assert_eq!(task.extra.get("owner"), Some(&json!("u1")));
    }

    #[test]
    fn task_tolerates_sparse_record() {
        let task: Task = serde_json::from_value(json!({"_id": 7, "dueDate": null})).unwrap();
        assert_eq!(task.id, "7");
        assert_eq!(task.title, "");
        assert_eq!(task.status, TaskStatus::Todo);
        assert!(task.due_date.is_none());
    }

    #[test]
    fn null_title_and_status_fall_back_to_defaults() {
        let task: Task = serde_json::from_value(json!({"_id": "t2", "title": null, "status": null})).unwrap();
        assert_eq!(task.title, "");
        assert_eq!(task.status, TaskStatus::Todo);
    }

    #[test]
    fn unknown_status_is_rejected() {
        let result: Result<Task, _> = serde_json::from_value(json!({"_id": "t1", "status": "blocked"}));
        assert!(result.is_err());
    }

    #[test]
    fn payload_serializes_camel_case_with_explicit_null_due_date() {
        let payload = TaskPayload {
            title: "Write docs".to_string(),
            description: None,
            status: TaskStatus::Todo,
            due_date: None,
        };
        let body = serde_json::to_value(&payload).unwrap();
        assert_eq!(body, json!({"title": "Write docs", "status": "todo", "dueDate": null}));
    }

    #[test]
    fn credentials_debug_hides_password() {
        let creds = Credentials::new("a@b.c", "hunter2");
        let rendered = format!("{creds:?}");
        assert!(rendered.contains("a@b.c"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn status_labels() {
        let labels: Vec<_> = TaskStatus::ALL.iter().map(|s| s.label()).collect();
        assert_eq!(labels, ["To do", "In progress", "Done"]);
        assert_eq!(TaskStatus::InProgress.as_str(), "in_progress");
    }
}
