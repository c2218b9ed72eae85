//! In-memory task API with cookie sessions.
//!
//! # Design
//! Implements the endpoints the client consumes: register/login/logout/refresh
//! under `/auth` and task CRUD under `/tasks`. Login sets a short-lived
//! `session` cookie and a `refresh_token` cookie; `/auth/refresh` mints a new
//! session from the refresh token. Tests drive expiry through `ServerState`.
//!
//! The response shape is configurable (`MockOptions`) so the client's
//! normalization and fallback paths can be exercised against real HTTP.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{AppendHeaders, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "session";
pub const REFRESH_COOKIE: &str = "refresh_token";

const STATUSES: [&str; 3] = ["todo", "in_progress", "done"];

/// Wrapping used for task payloads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Envelope {
    /// Lists as `[...]`, records bare.
    #[default]
    Bare,
    /// `{"tasks": [...]}` and `{"task": {...}}`.
    Tasks,
    /// `{"data": [...]}` and `{"data": {...}}`.
    Data,
}

/// Name of the identifier field in task records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IdField {
    #[default]
    Underscore,
    Plain,
}

impl IdField {
    fn key(self) -> &'static str {
        match self {
            IdField::Underscore => "_id",
            IdField::Plain => "id",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockOptions {
    pub envelope: Envelope,
    pub id_field: IdField,
    /// When false, `GET /tasks/{id}` answers 405.
    pub single_fetch: bool,
}

impl Default for MockOptions {
    fn default() -> Self {
        Self {
            envelope: Envelope::Bare,
            id_field: IdField::Underscore,
            single_fetch: true,
        }
    }
}

#[derive(Clone, Debug)]
pub struct StoredTask {
    pub id: Uuid,
    pub owner: String,
    pub title: String,
    pub description: Option<String>,
    pub status: String,
    pub due_date: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskInput {
    pub title: String,
    pub description: Option<String>,
    pub status: String,
    pub due_date: Option<String>,
}

#[derive(Default)]
struct Store {
    users: HashMap<String, String>,
    sessions: HashMap<String, String>,
    refresh_tokens: HashMap<String, String>,
    tasks: HashMap<Uuid, StoredTask>,
}

/// Shared server state, also the test handle.
#[derive(Default)]
pub struct ServerState {
    options: MockOptions,
    store: RwLock<Store>,
    refresh_calls: AtomicUsize,
}

impl ServerState {
    pub fn new(options: MockOptions) -> Arc<Self> {
        Arc::new(Self {
            options,
            ..Self::default()
        })
    }

    /// Invalidate every session cookie. Refresh tokens stay valid.
    pub async fn expire_sessions(&self) {
        self.store.write().await.sessions.clear();
    }

    /// Invalidate every refresh token, so renewal fails.
    pub async fn revoke_refresh_tokens(&self) {
        self.store.write().await.refresh_tokens.clear();
    }

    /// Number of `POST /auth/refresh` calls received.
    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub async fn task_count(&self) -> usize {
        self.store.read().await.tasks.len()
    }
}

pub fn app() -> Router {
    app_with(ServerState::new(MockOptions::default()))
}

pub fn app_with(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/refresh", post(refresh))
        .route("/tasks", get(list_tasks).post(create_task))
        .route("/tasks/{id}", get(get_task).put(update_task).delete(delete_task))
        .with_state(state)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

pub async fn run_with(listener: TcpListener, state: Arc<ServerState>) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with(state)).await
}

// ---------------------------------------------------------------------------
// Errors and cookies
// ---------------------------------------------------------------------------

/// Error response with a JSON `message` body.
#[derive(Debug)]
pub struct Failure(StatusCode, &'static str);

impl IntoResponse for Failure {
    fn into_response(self) -> Response {
        (self.0, Json(json!({ "message": self.1 }))).into_response()
    }
}

fn cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
}

fn set_cookie(name: &str, value: &str) -> String {
    format!("{name}={value}; Path=/; HttpOnly; SameSite=Lax")
}

fn clear_cookie(name: &str) -> String {
    format!("{name}=; Path=/; HttpOnly; Max-Age=0")
}

async fn session_user(state: &ServerState, headers: &HeaderMap) -> Result<String, Failure> {
    let token = cookie(headers, SESSION_COOKIE).ok_or(Failure(StatusCode::UNAUTHORIZED, "Unauthorized"))?;
    state
        .store
        .read()
        .await
        .sessions
        .get(&token)
        .cloned()
        .ok_or(Failure(StatusCode::UNAUTHORIZED, "Unauthorized"))
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn render(task: &StoredTask, id_field: IdField) -> Value {
    let mut record = Map::new();
    record.insert(id_field.key().to_string(), json!(task.id));
    record.insert("title".to_string(), json!(task.title));
    if let Some(description) = &task.description {
        record.insert("description".to_string(), json!(description));
    }
    record.insert("status".to_string(), json!(task.status));
    record.insert("dueDate".to_string(), json!(task.due_date));
    record.insert("createdAt".to_string(), json!(task.created_at));
    record.insert("updatedAt".to_string(), json!(task.updated_at));
    Value::Object(record)
}

fn wrap_list(options: MockOptions, records: Vec<Value>) -> Value {
    match options.envelope {
        Envelope::Bare => Value::Array(records),
        Envelope::Tasks => json!({ "tasks": records }),
        Envelope::Data => json!({ "data": records }),
    }
}

fn wrap_record(options: MockOptions, record: Value) -> Value {
    match options.envelope {
        Envelope::Bare => record,
        Envelope::Tasks => json!({ "task": record }),
        Envelope::Data => json!({ "data": record }),
    }
}

fn validate(input: &TaskInput) -> Result<(), Failure> {
    if input.title.trim().is_empty() {
        return Err(Failure(StatusCode::BAD_REQUEST, "Title is required"));
    }
    if !STATUSES.contains(&input.status.as_str()) {
        return Err(Failure(StatusCode::BAD_REQUEST, "Invalid status"));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Auth handlers
// ---------------------------------------------------------------------------

async fn register(
    State(state): State<Arc<ServerState>>,
    Json(input): Json<Credentials>,
) -> Result<(StatusCode, Json<Value>), Failure> {
    if !input.email.contains('@') || input.password.len() < 6 {
        return Err(Failure(StatusCode::BAD_REQUEST, "Email and a 6+ character password are required"));
    }
    let mut store = state.store.write().await;
    if store.users.contains_key(&input.email) {
        return Err(Failure(StatusCode::CONFLICT, "Email already registered"));
    }
    store.users.insert(input.email, input.password);
    Ok((StatusCode::CREATED, Json(json!({ "message": "Registered" }))))
}

async fn login(
    State(state): State<Arc<ServerState>>,
    Json(input): Json<Credentials>,
) -> Result<impl IntoResponse, Response> {
    let mut store = state.store.write().await;
    if store.users.get(&input.email) != Some(&input.password) {
        let body = Json(json!({ "error": "Invalid credentials" }));
        return Err((StatusCode::UNAUTHORIZED, body).into_response());
    }

    let session = Uuid::new_v4().to_string();
    let refresh = Uuid::new_v4().to_string();
    store.sessions.insert(session.clone(), input.email.clone());
    store.refresh_tokens.insert(refresh.clone(), input.email.clone());
    tracing::info!(email = %input.email, "login");

    Ok((
        AppendHeaders([
            (header::SET_COOKIE, set_cookie(SESSION_COOKIE, &session)),
            (header::SET_COOKIE, set_cookie(REFRESH_COOKIE, &refresh)),
        ]),
        Json(json!({ "message": "Logged in" })),
    ))
}

async fn refresh(State(state): State<Arc<ServerState>>, headers: HeaderMap) -> Result<impl IntoResponse, Failure> {
    state.refresh_calls.fetch_add(1, Ordering::SeqCst);

    let token = cookie(&headers, REFRESH_COOKIE).ok_or(Failure(StatusCode::UNAUTHORIZED, "Refresh token missing"))?;
    let mut store = state.store.write().await;
    let email = store
        .refresh_tokens
        .get(&token)
        .cloned()
        .ok_or(Failure(StatusCode::UNAUTHORIZED, "Refresh token invalid"))?;

    let session = Uuid::new_v4().to_string();
    store.sessions.insert(session.clone(), email);
    tracing::info!("session refreshed");

    Ok((
        AppendHeaders([(header::SET_COOKIE, set_cookie(SESSION_COOKIE, &session))]),
        Json(json!({ "message": "Session refreshed" })),
    ))
}

async fn logout(State(state): State<Arc<ServerState>>, headers: HeaderMap) -> impl IntoResponse {
    let mut store = state.store.write().await;
    if let Some(token) = cookie(&headers, SESSION_COOKIE) {
        store.sessions.remove(&token);
    }
    if let Some(token) = cookie(&headers, REFRESH_COOKIE) {
        store.refresh_tokens.remove(&token);
    }

    (
        StatusCode::NO_CONTENT,
        AppendHeaders([
            (header::SET_COOKIE, clear_cookie(SESSION_COOKIE)),
            (header::SET_COOKIE, clear_cookie(REFRESH_COOKIE)),
        ]),
    )
}

// ---------------------------------------------------------------------------
// Task handlers
// ---------------------------------------------------------------------------

async fn list_tasks(State(state): State<Arc<ServerState>>, headers: HeaderMap) -> Result<Json<Value>, Failure> {
    let owner = session_user(&state, &headers).await?;
    let store = state.store.read().await;
    let mut tasks: Vec<&StoredTask> = store.tasks.values().filter(|task| task.owner == owner).collect();
    tasks.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
    let records = tasks.into_iter().map(|task| render(task, state.options.id_field)).collect();
    Ok(Json(wrap_list(state.options, records)))
}

async fn create_task(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Json(input): Json<TaskInput>,
) -> Result<(StatusCode, Json<Value>), Failure> {
    let owner = session_user(&state, &headers).await?;
    validate(&input)?;

    let stamp = now();
    let task = StoredTask {
        id: Uuid::new_v4(),
        owner,
        title: input.title.trim().to_string(),
        description: input.description,
        status: input.status,
        due_date: input.due_date,
        created_at: stamp.clone(),
        updated_at: stamp,
    };
    let record = render(&task, state.options.id_field);
    state.store.write().await.tasks.insert(task.id, task);
    Ok((StatusCode::CREATED, Json(wrap_record(state.options, record))))
}

async fn get_task(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, Failure> {
    if !state.options.single_fetch {
        return Err(Failure(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed"));
    }
    let owner = session_user(&state, &headers).await?;
    let store = state.store.read().await;
    let task = store
        .tasks
        .get(&id)
        .filter(|task| task.owner == owner)
        .ok_or(Failure(StatusCode::NOT_FOUND, "Task not found"))?;
    Ok(Json(wrap_record(state.options, render(task, state.options.id_field))))
}

async fn update_task(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(input): Json<TaskInput>,
) -> Result<Json<Value>, Failure> {
    let owner = session_user(&state, &headers).await?;
    validate(&input)?;

    let mut store = state.store.write().await;
    let task = store
        .tasks
        .get_mut(&id)
        .filter(|task| task.owner == owner)
        .ok_or(Failure(StatusCode::NOT_FOUND, "Task not found"))?;
    task.title = input.title.trim().to_string();
    task.description = input.description;
    task.status = input.status;
    task.due_date = input.due_date;
    task.updated_at = now();
    Ok(Json(wrap_record(state.options, render(task, state.options.id_field))))
}

async fn delete_task(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, Failure> {
    let owner = session_user(&state, &headers).await?;
    let mut store = state.store.write().await;
    match store.tasks.get(&id) {
        Some(task) if task.owner == owner => {
            store.tasks.remove(&id);
            Ok(StatusCode::NO_CONTENT)
        }
        _ => Err(Failure(StatusCode::NOT_FOUND, "Task not found")),
    }
}
