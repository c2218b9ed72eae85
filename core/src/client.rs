//! Public operations of the task API.
//!
//! # Design
//! Each operation is split into a `build_*` method producing an `ApiRequest`
//! (pure, testable without I/O) and an async method that runs it through the
//! `Executor` and normalizes the response. Identifier arguments are validated
//! in the builders, so a malformed id never reaches the network.
//!
//! Auth operations are refresh-exempt: they establish or end the session, so a
//! 401 from them is a final answer.

use std::sync::Arc;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use tracing::debug;

use crate::config::{ClientConfig, ConfigError};
use crate::error::ApiError;
use crate::executor::{ApiRequest, Executor};
use crate::http::Transport;
use crate::normalize::{extract_task, extract_tasks};
use crate::refresh::RefreshCoordinator;
use crate::session::SessionListener;
use crate::transport::ReqwestTransport;
use crate::types::{Credentials, Task, TaskPayload};

/// Characters left unescaped in a path segment, matching the browser's
/// `encodeURIComponent`.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Client for the task API.
#[derive(Debug)]
pub struct TaskClient {
    executor: Executor,
}

impl TaskClient {
    /// Client over HTTP with a cookie-keeping `reqwest` transport.
    pub fn new(config: &ClientConfig) -> Result<Self, ConfigError> {
        let transport = ReqwestTransport::new(config.timeout)?;
        Ok(Self::with_transport(&config.base_url, Arc::new(transport)))
    }

    /// Client over an arbitrary transport.
    pub fn with_transport(base_url: &str, transport: Arc<dyn Transport>) -> Self {
        Self {
            executor: Executor::new(base_url, transport),
        }
    }

    /// Register the collaborator told about terminal session expiry.
    pub fn with_session_listener(mut self, listener: Arc<dyn SessionListener>) -> Self {
        self.executor = self.executor.with_listener(listener);
        self
    }

    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    pub fn coordinator(&self) -> &RefreshCoordinator {
        self.executor.coordinator()
    }

    // -----------------------------------------------------------------------
    // Request builders
    // -----------------------------------------------------------------------

    pub fn build_register(&self, credentials: &Credentials) -> Result<ApiRequest, ApiError> {
        Ok(ApiRequest::post("/auth/register").json(credentials)?.exempt())
    }

    pub fn build_login(&self, credentials: &Credentials) -> Result<ApiRequest, ApiError> {
        Ok(ApiRequest::post("/auth/login").json(credentials)?.exempt())
    }

    pub fn build_logout(&self) -> ApiRequest {
        ApiRequest::post("/auth/logout").exempt()
    }

    pub fn build_list_tasks(&self) -> ApiRequest {
        ApiRequest::get("/tasks")
    }

    pub fn build_get_task(&self, id: &str) -> Result<ApiRequest, ApiError> {
        Ok(ApiRequest::get(task_path(id)?))
    }

    pub fn build_create_task(&self, input: &TaskPayload) -> Result<ApiRequest, ApiError> {
        ApiRequest::post("/tasks").json(input)
    }

    pub fn build_update_task(&self, id: &str, input: &TaskPayload) -> Result<ApiRequest, ApiError> {
        ApiRequest::put(task_path(id)?).json(input)
    }

    pub fn build_delete_task(&self, id: &str) -> Result<ApiRequest, ApiError> {
        Ok(ApiRequest::delete(task_path(id)?))
    }

    // -----------------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------------

    pub async fn register(&self, credentials: &Credentials) -> Result<(), ApiError> {
        self.executor.execute(&self.build_register(credentials)?).await?;
        Ok(())
    }

    /// Establish a session. The session cookie is kept by the transport.
    pub async fn login(&self, credentials: &Credentials) -> Result<(), ApiError> {
        self.executor.execute(&self.build_login(credentials)?).await?;
        Ok(())
    }

    /// End the session. Callers typically ignore the error: the session is
    /// over from the user's point of view either way.
    pub async fn logout(&self) -> Result<(), ApiError> {
        self.executor.execute(&self.build_logout()).await?;
        Ok(())
    }

    /// Probe whether the current session is accepted. A 401 means it is not.
    pub async fn check_session(&self) -> Result<(), ApiError> {
        self.executor.execute(&self.build_list_tasks()).await?;
        Ok(())
    }

    pub async fn list_tasks(&self) -> Result<Vec<Task>, ApiError> {
        let payload = self.executor.execute(&self.build_list_tasks()).await?;
        Ok(extract_tasks(payload.as_ref()))
    }

    /// Fetch one task.
    ///
    /// If the server rejects the single-resource fetch with 400, 404 or 405,
    /// or answers it without a record, the full list is fetched and searched
    /// instead; a miss there is a 404.
    pub async fn get_task(&self, id: &str) -> Result<Task, ApiError> {
        let request = self.build_get_task(id)?;
        match self.executor.execute(&request).await {
            Ok(payload) => match extract_task(payload.as_ref())? {
                Some(task) => return Ok(task),
                None => debug!("single task fetch returned no record, searching task list"),
            },
            Err(err) if err.allows_list_fallback() => {
                debug!(status = err.status, "single task fetch rejected, searching task list");
            }
            Err(err) => return Err(err),
        }

        self.list_tasks()
            .await?
            .into_iter()
            .find(|task| task.id == id)
            .ok_or_else(ApiError::task_not_found)
    }

    /// Create a task. `None` means the server accepted it without echoing the
    /// record back.
    pub async fn create_task(&self, input: &TaskPayload) -> Result<Option<Task>, ApiError> {
        let payload = self.executor.execute(&self.build_create_task(input)?).await?;
        extract_task(payload.as_ref())
    }

    /// Replace the client-editable fields of a task. `None` as for
    /// `create_task`.
    pub async fn update_task(&self, id: &str, input: &TaskPayload) -> Result<Option<Task>, ApiError> {
        let payload = self.executor.execute(&self.build_update_task(id, input)?).await?;
        extract_task(payload.as_ref())
    }

    pub async fn delete_task(&self, id: &str) -> Result<(), ApiError> {
        self.executor.execute(&self.build_delete_task(id)?).await?;
        Ok(())
    }
}

/// Reject empty and whitespace-only task ids.
pub fn validate_task_id(id: &str) -> Result<&str, ApiError> {
    if id.trim().is_empty() {
        return Err(ApiError::invalid_task_id());
    }
    Ok(id)
}

fn task_path(id: &str) -> Result<String, ApiError> {
    let id = validate_task_id(id)?;
    Ok(format!("/tasks/{}", utf8_percent_encode(id, PATH_SEGMENT)))
}
