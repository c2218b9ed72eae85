//! Auth-related helpers for the UI layer.

use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate};
use regex::Regex;

use crate::error::ApiError;

const NO_DUE_DATE: &str = "No due date";

fn auth_cookie_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)(auth|token|session|jwt|refresh)").expect("invalid regex"))
}

/// Whether any cookie name looks like it carries authentication state.
///
/// The client cannot read the session itself; this is a cheap hint for route
/// guards, confirmed by the server on the next request.
pub fn has_likely_auth_cookie<I, S>(names: I) -> bool
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    names
        .into_iter()
        .any(|name| auth_cookie_pattern().is_match(name.as_ref()))
}

/// User-facing message for a failed operation.
pub fn auth_error_message(error: &ApiError, fallback: &str) -> String {
    if error.is_unauthenticated() {
        return "Your session is not valid. Please log in again.".to_string();
    }
    if error.message.trim().is_empty() {
        return fallback.to_string();
    }
    error.message.clone()
}

/// Format a due date as e.g. "Mar 7, 2025".
///
/// Accepts RFC 3339 timestamps and plain `YYYY-MM-DD` dates. Absent or
/// unparsable values read "No due date".
pub fn format_due_date(value: Option<&str>) -> String {
    match value.and_then(parse_due_date) {
        Some(date) => date.format("%b %-d, %Y").to_string(),
        None => NO_DUE_DATE.to_string(),
    }
}

/// Calendar date of a due-date string, if it parses.
pub fn parse_due_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc3339(value)
        .map(|stamp| stamp.date_naive())
        .or_else(|_| NaiveDate::parse_from_str(value, "%Y-%m-%d"))
        .ok()
}
