//! HTTP transport types for the host-does-IO pattern.
//!
//! # Design
//! Requests and responses are plain data. The client builds `HttpRequest`
//! values and interprets `HttpResponse` values; the actual round-trip goes
//! through the `Transport` trait. Production code uses `ReqwestTransport`,
//! tests plug in scripted transports that count calls per endpoint without a
//! network.
//!
//! Credentials are never part of a request: the transport owns the cookie jar
//! and attaches session cookies itself.

use async_trait::async_trait;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of an outgoing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestBody {
    /// Serialized JSON; sent with `content-type: application/json`.
    Json(String),
    /// Opaque bytes such as a multipart form. No content type is implied; the
    /// caller supplies one through header overrides.
    Binary(Vec<u8>),
}

impl RequestBody {
    pub fn is_json(&self) -> bool {
        matches!(self, RequestBody::Json(_))
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            RequestBody::Json(text) => text.into_bytes(),
            RequestBody::Binary(bytes) => bytes,
        }
    }
}

/// An HTTP request described as plain data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    /// Absolute URL.
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<RequestBody>,
}

impl HttpRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// An HTTP response described as plain data.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Whether the response declares a JSON content type.
    pub fn is_json(&self) -> bool {
        self.header("content-type")
            .is_some_and(|value| value.contains("application/json"))
    }

    /// The body parsed as JSON, or `None` when the response does not declare
    /// JSON or the body does not parse. Never fails.
    pub fn json(&self) -> Option<serde_json::Value> {
        if !self.is_json() {
            return None;
        }
        serde_json::from_str(&self.body).ok()
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

/// Failure to obtain any response.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("network request failed: {0}")]
    Other(String),
}

/// Executes one HTTP round-trip.
///
/// Any response, whatever its status, is `Ok`; `Err` is reserved for the
/// cases where no response arrived.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}
