//! Request execution with transparent session renewal.
//!
//! # Design
//! One logical call is at most two HTTP attempts: the original request and,
//! if it came back 401 and renewal succeeded, a single replay. The replay is
//! a straight-line second send whose response is settled as final, so a
//! second renewal or replay cannot happen by construction.
//!
//! Auth endpoints are marked `RefreshPolicy::Exempt`; the renewal endpoint
//! itself never triggers renewal regardless of policy.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse, RequestBody, Transport};
use crate::refresh::RefreshCoordinator;
use crate::session::SessionListener;

/// Path of the session renewal endpoint.
pub const REFRESH_PATH: &str = "/auth/refresh";

const JSON: &str = "application/json";

/// Whether a 401 on this request may trigger session renewal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshPolicy {
    Renew,
    Exempt,
}

/// One logical API operation, relative to the client's base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    pub method: HttpMethod,
    /// Path beginning with `/`, already percent-encoded.
    pub path: String,
    pub body: Option<RequestBody>,
    /// Overrides applied after the default headers.
    pub headers: Vec<(String, String)>,
    pub refresh: RefreshPolicy,
}

impl ApiRequest {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            headers: Vec::new(),
            refresh: RefreshPolicy::Renew,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Put, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, path)
    }

    /// Attach `input` as a JSON body.
    pub fn json<T: Serialize>(mut self, input: &T) -> Result<Self, ApiError> {
        let body = serde_json::to_string(input)
            .map_err(|e| ApiError::new(format!("failed to serialize request body: {e}"), 400))?;
        self.body = Some(RequestBody::Json(body));
        Ok(self)
    }

    pub fn body(mut self, body: RequestBody) -> Self {
        self.body = Some(body);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Never trigger session renewal for this request.
    pub fn exempt(mut self) -> Self {
        self.refresh = RefreshPolicy::Exempt;
        self
    }
}

/// Sends `ApiRequest`s through a `Transport`, renewing the session once when
/// it has expired.
pub struct Executor {
    base_url: String,
    transport: Arc<dyn Transport>,
    coordinator: RefreshCoordinator,
    listener: Option<Arc<dyn SessionListener>>,
}

impl Executor {
    pub fn new(base_url: &str, transport: Arc<dyn Transport>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            transport,
            coordinator: RefreshCoordinator::new(),
            listener: None,
        }
    }

    pub fn with_listener(mut self, listener: Arc<dyn SessionListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.coordinator
    }

    /// Turn a logical request into the HTTP request put on the wire.
    ///
    /// Always sends `accept: application/json`; JSON bodies add
    /// `content-type: application/json`. Overrides replace defaults with the
    /// same name.
    pub fn prepare(&self, request: &ApiRequest) -> HttpRequest {
        let mut headers = vec![("accept".to_string(), JSON.to_string())];
        if request.body.as_ref().is_some_and(RequestBody::is_json) {
            headers.push(("content-type".to_string(), JSON.to_string()));
        }
        for (name, value) in &request.headers {
            headers.retain(|(existing, _)| !existing.eq_ignore_ascii_case(name));
            headers.push((name.clone(), value.clone()));
        }

        HttpRequest {
            method: request.method,
            url: format!("{}{}", self.base_url, request.path),
            headers,
            body: request.body.clone(),
        }
    }

    /// Perform `request`, returning the parsed JSON body of a successful
    /// response (`None` for 204 or a body that is not JSON).
    pub async fn execute(&self, request: &ApiRequest) -> Result<Option<Value>, ApiError> {
        let response = self.send(request).await?;
        if !self.should_renew(request, &response) {
            return settle(response);
        }

        if let Err(err) = self.renew_session().await {
            debug!(status = err.status, path = %request.path, "giving up after failed renewal");
            if let Some(listener) = &self.listener {
                listener.session_expired();
            }
            return Err(ApiError::session_expired());
        }

        let replay = self.send(request).await?;
        if replay.status == 401 {
            warn!(method = %request.method, path = %request.path, "request still unauthorized after session renewal");
        }
        settle(replay)
    }

    fn should_renew(&self, request: &ApiRequest, response: &HttpResponse) -> bool {
        response.status == 401 && request.refresh == RefreshPolicy::Renew && request.path != REFRESH_PATH
    }

    async fn send(&self, request: &ApiRequest) -> Result<HttpResponse, ApiError> {
        let response = self.transport.send(self.prepare(request)).await.map_err(|err| {
            warn!(method = %request.method, path = %request.path, error = %err, "request failed before a response");
            ApiError::from(err)
        })?;
        debug!(method = %request.method, path = %request.path, status = response.status, "api response");
        Ok(response)
    }

    async fn renew_session(&self) -> Result<(), ApiError> {
        let transport = Arc::clone(&self.transport);
        let request = self.prepare(&ApiRequest::post(REFRESH_PATH).exempt());
        self.coordinator
            .ensure_renewed(move || async move {
                let response = match transport.send(request).await {
                    Ok(response) => response,
                    Err(err) => return Err(ApiError::from(err)),
                };
                if response.is_success() {
                    return Ok(());
                }
                let payload = response.json();
                Err(ApiError::from_response_with_fallback(
                    response.status,
                    payload.as_ref(),
                    "Unable to refresh session.",
                ))
            })
            .await
    }
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("base_url", &self.base_url)
            .field("coordinator", &self.coordinator)
            .field("listener", &self.listener.is_some())
            .finish()
    }
}

/// Map a final response to the caller's result.
fn settle(response: HttpResponse) -> Result<Option<Value>, ApiError> {
    let payload = response.json();
    if !response.is_success() {
        return Err(ApiError::from_response(response.status, payload.as_ref()));
    }
    if response.status == 204 {
        return Ok(None);
    }
    Ok(payload)
}
