//! Session-aware async client for the task API.
//!
//! # Overview
//! Talks to a remote task API that authenticates with cookie sessions. Every
//! call goes through one executor. Failures of any kind surface as `ApiError`.
//! On an expired session the executor renews it once, shared across
//! concurrent callers, and replays the call.
//!
//! # Design
//! - Requests and responses are plain data (`HttpRequest` / `HttpResponse`);
//!   the network sits behind the `Transport` trait, so tests script the
//!   server without I/O.
//! - `TaskClient` splits each operation into a pure `build_*` step and an
//!   async step that executes and normalizes.
//! - Renewal state lives in a `RefreshCoordinator` owned by the client, never
//!   in a global.
//! - The client never navigates. Terminal session loss is reported through
//!   `SessionListener`.

pub mod auth;
pub mod board;
pub mod client;
pub mod config;
pub mod error;
pub mod executor;
pub mod form;
pub mod http;
pub mod normalize;
pub mod refresh;
pub mod session;
pub mod transport;
pub mod types;

pub use board::{Page, TaskBoard};
pub use client::TaskClient;
pub use config::{ClientConfig, ConfigError};
pub use error::{ApiError, ErrorKind};
pub use executor::{ApiRequest, Executor, RefreshPolicy};
pub use form::{Field, FieldError, TaskDraft};
pub use http::{HttpMethod, HttpRequest, HttpResponse, RequestBody, Transport, TransportError};
pub use refresh::RefreshCoordinator;
pub use session::{LoginRedirect, Navigator, SessionListener};
pub use transport::ReqwestTransport;
pub use types::{Credentials, Task, TaskPayload, TaskStatus};
