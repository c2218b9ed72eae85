//! Task form input and its validation.
//!
//! # Design
//! The API layer sends whatever `TaskPayload` it is given; length limits and
//! due-date parsing are enforced here, before the payload is built. A draft
//! either becomes a payload or yields every field error at once so a form can
//! show them side by side.

use chrono::{NaiveTime, SecondsFormat};

use crate::auth::parse_due_date;
use crate::types::{Task, TaskPayload, TaskStatus};

pub const TITLE_MAX_CHARS: usize = 120;
pub const DESCRIPTION_MAX_CHARS: usize = 1000;

/// Form field an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Title,
    Description,
    DueDate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: Field,
    pub message: &'static str,
}

/// Raw form values, as typed by the user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskDraft {
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    /// `YYYY-MM-DD` or an RFC 3339 timestamp; blank for none.
    pub due_date: String,
}

impl TaskDraft {
    /// Pre-fill the edit form from an existing task.
    pub fn from_task(task: &Task) -> Self {
        Self {
            title: task.title.clone(),
            description: task.description.clone().unwrap_or_default(),
            status: task.status,
            due_date: task
                .due_date
                .as_deref()
                .and_then(parse_due_date)
                .map(|date| date.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
        }
    }

    pub fn validate(&self) -> Result<TaskPayload, Vec<FieldError>> {
        let mut errors = Vec::new();

        let title = self.title.trim();
        if title.is_empty() {
            errors.push(FieldError {
                field: Field::Title,
                message: "Title is required.",
            });
        } else if title.chars().count() > TITLE_MAX_CHARS {
            errors.push(FieldError {
                field: Field::Title,
                message: "Title must be 120 characters or fewer.",
            });
        }

        if self.description.chars().count() > DESCRIPTION_MAX_CHARS {
            errors.push(FieldError {
                field: Field::Description,
                message: "Description must be 1000 characters or fewer.",
            });
        }

        let due_date = if self.due_date.trim().is_empty() {
            None
        } else {
            match parse_due_date(&self.due_date) {
                Some(date) => Some(
                    date.and_time(NaiveTime::MIN)
                        .and_utc()
                        .to_rfc3339_opts(SecondsFormat::Millis, true),
                ),
                None => {
                    errors.push(FieldError {
                        field: Field::DueDate,
                        message: "Please choose a valid due date.",
                    });
                    None
                }
            }
        };

        if !errors.is_empty() {
            return Err(errors);
        }

        let description = self.description.trim();
        Ok(TaskPayload {
            title: title.to_string(),
            description: (!description.is_empty()).then(|| description.to_string()),
            status: self.status,
            due_date,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn draft(title: &str) -> TaskDraft {
        TaskDraft {
            title: title.to_string(),
            ..TaskDraft::default()
        }
    }

    #[test]
    fn valid_draft_becomes_trimmed_payload() {
        let draft = TaskDraft {
            title: "  Ship it  ".to_string(),
            description: "  tonight ".to_string(),
            status: TaskStatus::InProgress,
            due_date: "2025-03-07".to_string(),
        };
        let payload = draft.validate().unwrap();
        assert_eq!(payload.title, "Ship it");
        assert_eq!(payload.description.as_deref(), Some("tonight"));
        assert_eq!(payload.status, TaskStatus::InProgress);
        assert_eq!(payload.due_date.as_deref(), Some("2025-03-07T00:00:00.000Z"));
    }

    #[test]
    fn blank_optional_fields_are_dropped() {
        let mut input = draft("Ship it");
        input.description = "   ".to_string();
        let payload = input.validate().unwrap();
        assert!(payload.description.is_none());
        assert!(payload.due_date.is_none());
    }

    #[test]
    fn title_limits() {
        let errors = draft("   ").validate().unwrap_err();
        assert_eq!(errors, vec![FieldError { field: Field::Title, message: "Title is required." }]);

        assert!(draft(&"x".repeat(120)).validate().is_ok());
        let errors = draft(&"x".repeat(121)).validate().unwrap_err();
        assert_eq!(errors[0].message, "Title must be 120 characters or fewer.");
    }

    #[test]
    fn every_field_error_is_reported() {
        let input = TaskDraft {
            title: String::new(),
            description: "d".repeat(1001),
            status: TaskStatus::Done,
            due_date: "someday".to_string(),
        };
        let fields: Vec<Field> = input.validate().unwrap_err().into_iter().map(|e| e.field).collect();
        assert_eq!(fields, vec![Field::Title, Field::Description, Field::DueDate]);
    }

    #[test]
    fn from_task_prefills_date_input() {
        let task = Task {
            id: "t1".to_string(),
            title: "Ship".to_string(),
            description: None,
            status: TaskStatus::Done,
            due_date: Some("2025-03-07T18:30:00.000Z".to_string()),
            created_at: None,
            updated_at: None,
            extra: Map::new(),
        };
        let draft = TaskDraft::from_task(&task);
        assert_eq!(draft.title, "Ship");
        assert_eq!(draft.description, "");
        assert_eq!(draft.status, TaskStatus::Done);
        assert_eq!(draft.due_date, "2025-03-07");
    }
}
