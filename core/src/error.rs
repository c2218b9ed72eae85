//! Error types for the task API client.
//!
//! # Design
//! Every failure a caller can observe is an `ApiError` carrying an HTTP-like
//! status code. Status `0` means no response was received at all (connection
//! refused, DNS, timeout). Callers branch on `status`, or on the coarser
//! `kind()`, instead of matching variants: the remote API is the authority on
//! what a status means, the client only reports it faithfully.
//!
//! `ApiError` is `Clone` because a single session renewal outcome is handed to
//! every request waiting on it.

use serde_json::Value;

use crate::http::TransportError;

/// A failed API operation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct ApiError {
    /// HTTP status of the failed response, or `0` when none was received.
    pub status: u16,
    pub message: String,
    /// Structured payload echoed from the server, if any.
    pub details: Option<Value>,
}

/// Coarse classification of an `ApiError` by its status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// No response was received.
    Transport,
    /// 401: the session is missing, expired or could not be renewed.
    Unauthenticated,
    /// 400: malformed input, including ids rejected before any network call.
    InvalidInput,
    /// 404.
    NotFound,
    /// 405: the server does not support the method on this resource.
    Unsupported,
    /// Any other 4xx, usually a validation or business rule failure.
    Rejected,
    /// 5xx.
    Server,
    Other,
}

impl ApiError {
    pub fn new(message: impl Into<String>, status: u16) -> Self {
        Self {
            status,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// A failure before any response was received.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(message, 0)
    }

    /// Build an error from a non-2xx response and its parsed JSON body.
    pub fn from_response(status: u16, payload: Option<&Value>) -> Self {
        Self::from_response_with_fallback(status, payload, &format!("Request failed with status {status}"))
    }

    /// Like `from_response`, with a custom message for bodies that carry none.
    pub fn from_response_with_fallback(status: u16, payload: Option<&Value>, fallback: &str) -> Self {
        Self {
            status,
            message: error_message(payload, fallback),
            details: error_details(payload),
        }
    }

    pub fn invalid_task_id() -> Self {
        Self::new("Invalid task id", 400)
    }

    pub fn task_not_found() -> Self {
        Self::new("Task not found.", 404)
    }

    /// Terminal failure after the session could not be renewed.
    pub fn session_expired() -> Self {
        Self::new("Session expired. Please log in again.", 401)
    }

    /// A successful response whose body is not a usable task record.
    pub fn unexpected_payload(reason: impl std::fmt::Display) -> Self {
        Self::new("Unexpected task payload from server.", 502)
            .with_details(Value::String(reason.to_string()))
    }

    pub fn kind(&self) -> ErrorKind {
        match self.status {
            0 => ErrorKind::Transport,
            400 => ErrorKind::InvalidInput,
            401 => ErrorKind::Unauthenticated,
            404 => ErrorKind::NotFound,
            405 => ErrorKind::Unsupported,
            402..=499 => ErrorKind::Rejected,
            500..=599 => ErrorKind::Server,
            _ => ErrorKind::Other,
        }
    }

    pub fn is_network(&self) -> bool {
        self.status == 0
    }

    pub fn is_unauthenticated(&self) -> bool {
        self.status == 401
    }

    /// Statuses that mean "cannot fetch this resource individually", which
    /// makes a single-task lookup fall back to searching the full list.
    pub fn allows_list_fallback(&self) -> bool {
        matches!(self.status, 400 | 404 | 405)
    }
}

impl From<TransportError> for ApiError {
    fn from(err: TransportError) -> Self {
        Self::network(err.to_string())
    }
}

/// Pick a human-readable message out of an error body: a non-blank `message`
/// string, then a non-blank `error` string, then `fallback`.
fn error_message(payload: Option<&Value>, fallback: &str) -> String {
    let Some(Value::Object(map)) = payload else {
        return fallback.to_string();
    };

    ["message", "error"]
        .iter()
        .filter_map(|key| map.get(*key).and_then(Value::as_str))
        .find(|text| !text.trim().is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| fallback.to_string())
}

/// Objects contribute their `details` field when present, otherwise the whole
/// body is kept.
fn error_details(payload: Option<&Value>) -> Option<Value> {
    match payload {
        None => None,
        Some(Value::Object(map)) => match map.get("details") {
            Some(details) if !details.is_null() => Some(details.clone()),
            _ => Some(Value::Object(map.clone())),
        },
        Some(other) => Some(other.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn message_field_wins_over_error_field() {
        let body = json!({"message": "Title is required", "error": "Bad Request"});
        let err = ApiError::from_response(422, Some(&body));
        assert_eq!(err.status, 422);
        assert_eq!(err.message, "Title is required");
        assert_eq!(err.details, Some(body));
    }

    #[test]
    fn blank_message_falls_through_to_error_field() {
        let body = json!({"message": "   ", "error": "Forbidden"});
        let err = ApiError::from_response(403, Some(&body));
        assert_eq!(err.message, "Forbidden");
    }

    #[test]
    fn missing_body_uses_generic_message() {
        let err = ApiError::from_response(500, None);
        assert_eq!(err.message, "Request failed with status 500");
        assert!(err.details.is_none());
        assert_eq!(err.kind(), ErrorKind::Server);
    }

    #[test]
    fn non_string_message_is_ignored() {
        let body = json!({"message": 42});
        let err = ApiError::from_response(400, Some(&body));
        assert_eq!(err.message, "Request failed with status 400");
    }

    #[test]
    fn details_field_is_preferred_over_whole_body() {
        let body = json!({"message": "invalid", "details": {"field": "title"}});
        let err = ApiError::from_response(400, Some(&body));
        assert_eq!(err.details, Some(json!({"field": "title"})));
    }

    #[test]
    fn non_object_body_is_kept_as_details() {
        let body = json!(["a", "b"]);
        let err = ApiError::from_response(409, Some(&body));
        assert_eq!(err.message, "Request failed with status 409");
        assert_eq!(err.details, Some(body));
    }

    #[test]
    fn custom_fallback_message() {
        let err = ApiError::from_response_with_fallback(401, None, "Unable to refresh session.");
        assert_eq!(err.message, "Unable to refresh session.");
        assert!(err.is_unauthenticated());
    }

    #[test]
    fn kinds_follow_status() {
        assert_eq!(ApiError::network("refused").kind(), ErrorKind::Transport);
        assert_eq!(ApiError::invalid_task_id().kind(), ErrorKind::InvalidInput);
        assert_eq!(ApiError::session_expired().kind(), ErrorKind::Unauthenticated);
        assert_eq!(ApiError::task_not_found().kind(), ErrorKind::NotFound);
        assert_eq!(ApiError::new("nope", 405).kind(), ErrorKind::Unsupported);
        assert_eq!(ApiError::new("dup", 409).kind(), ErrorKind::Rejected);
        assert_eq!(ApiError::new("redirect", 302).kind(), ErrorKind::Other);
    }

    #[test]
    fn list_fallback_statuses() {
        for status in [400, 404, 405] {
            assert!(ApiError::new("x", status).allows_list_fallback(), "{status}");
        }
        for status in [0, 401, 403, 500] {
            assert!(!ApiError::new("x", status).allows_list_fallback(), "{status}");
        }
    }

    #[test]
    fn transport_error_becomes_status_zero() {
        let err: ApiError = TransportError::Connect("connection refused".to_string()).into();
        assert!(err.is_network());
        assert!(err.message.contains("connection refused"));
    }

    #[test]
    fn display_is_the_message() {
        assert_eq!(ApiError::task_not_found().to_string(), "Task not found.");
    }
}
