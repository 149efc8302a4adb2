//! HTTP client for the two remote collaborators.
//!
//! - identity endpoint: `POST {email}` → `{user_id, email}` or `{error}`
//! - task store endpoint: `GET`/`POST {tasks}` scoped by the `X-User-Id` header
//!
//! Both sit behind traits so the gateway and the login flow can be driven by
//! in-process fakes.

use std::sync::Arc;
use std::time::Duration;

use reqwest::blocking::{Client, Response};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::config::RemoteConfig;
use crate::model::session::User;
use crate::model::task::Task;

/// Header carrying the user id on task store requests
pub const USER_ID_HEADER: &str = "X-User-Id";

/// Error type for remote calls
#[derive(Debug, Clone, thiserror::Error)]
pub enum RemoteError {
    /// The request never got an HTTP response
    #[error("could not reach {url}: {message}")]
    Connectivity { url: String, message: String },
    /// Non-2xx response, with the server's `error` field when it sent one
    #[error("HTTP {status}: {}", .message.as_deref().unwrap_or("no error message"))]
    Status { status: u16, message: Option<String> },
    /// 2xx response whose body did not have the expected shape
    #[error("unexpected response from {url}: {message}")]
    Decode { url: String, message: String },
    /// The HTTP client could not be built from the remote settings
    #[error("could not set up HTTP client: {message}")]
    Setup { message: String },
}

/// Resolves an email into a server-side user
pub trait IdentityService: Send + Sync {
    fn login(&self, email: &str) -> Result<User, RemoteError>;
}

/// Remote copy of the task tree, one snapshot per user
pub trait TaskStore: Send + Sync {
    fn fetch(&self, user_id: i64) -> Result<Vec<Task>, RemoteError>;
    fn push(&self, user_id: i64, tasks: &[Task]) -> Result<(), RemoteError>;
}

/// The remote half of the app: either side may be missing.
#[derive(Clone, Default)]
pub struct Services {
    pub identity: Option<Arc<dyn IdentityService>>,
    pub task_store: Option<Arc<dyn TaskStore>>,
}

impl Services {
    /// No remote at all: purely local operation
    pub fn offline() -> Self {
        Services::default()
    }

    /// HTTP-backed services for whichever endpoints are configured
    pub fn from_config(config: &RemoteConfig) -> Result<Self, RemoteError> {
        if config.auth_url.is_none() && config.tasks_url.is_none() {
            return Ok(Services::offline());
        }
        let client = build_client(config)?;
        let identity = config.auth_url.as_ref().map(|url| {
            Arc::new(HttpIdentity {
                client: client.clone(),
                url: url.clone(),
            }) as Arc<dyn IdentityService>
        });
        let task_store = config.tasks_url.as_ref().map(|url| {
            Arc::new(HttpTaskStore {
                client: client.clone(),
                url: url.clone(),
            }) as Arc<dyn TaskStore>
        });
        Ok(Services {
            identity,
            task_store,
        })
    }
}

fn build_client(config: &RemoteConfig) -> Result<Client, RemoteError> {
    let mut builder = Client::builder();
    if let Some(secs) = config.timeout_secs {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    builder.build().map_err(|e| RemoteError::Setup {
        message: e.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    user_id: i64,
    email: String,
}

#[derive(Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    error: Option<String>,
}

#[derive(Serialize)]
struct TasksRequest<'a> {
    tasks: &'a [Task],
}

#[derive(Deserialize)]
struct TasksResponse {
    #[serde(default)]
    tasks: Vec<Task>,
}

// ---------------------------------------------------------------------------
// HTTP implementations
// ---------------------------------------------------------------------------

pub struct HttpIdentity {
    client: Client,
    url: String,
}

impl IdentityService for HttpIdentity {
    fn login(&self, email: &str) -> Result<User, RemoteError> {
        debug!(url = %self.url, "identity request");
        let resp = self
            .client
            .post(&self.url)
            .json(&LoginRequest { email })
            .send()
            .map_err(|e| connectivity(&self.url, e))?;
        let resp = check_status(resp)?;
        let body: LoginResponse = resp.json().map_err(|e| decode(&self.url, e))?;
        Ok(User {
            id: body.user_id,
            email: body.email,
        })
    }
}

pub struct HttpTaskStore {
    client: Client,
    url: String,
}

impl TaskStore for HttpTaskStore {
    fn fetch(&self, user_id: i64) -> Result<Vec<Task>, RemoteError> {
        debug!(url = %self.url, user_id, "fetching remote tree");
        let resp = self
            .client
            .get(&self.url)
            .header(USER_ID_HEADER, user_id.to_string())
            .send()
            .map_err(|e| connectivity(&self.url, e))?;
        let resp = check_status(resp)?;
        let body: TasksResponse = resp.json().map_err(|e| decode(&self.url, e))?;
        Ok(body.tasks)
    }

    fn push(&self, user_id: i64, tasks: &[Task]) -> Result<(), RemoteError> {
        debug!(url = %self.url, user_id, roots = tasks.len(), "pushing remote tree");
        let resp = self
            .client
            .post(&self.url)
            .header(USER_ID_HEADER, user_id.to_string())
            .json(&TasksRequest { tasks })
            .send()
            .map_err(|e| connectivity(&self.url, e))?;
        check_status(resp)?;
        Ok(())
    }
}

/// Pass 2xx responses through; turn anything else into `Status`, pulling
/// the `error` field out of the body when there is one.
fn check_status(resp: Response) -> Result<Response, RemoteError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let message = resp
        .text()
        .ok()
        .and_then(|body| serde_json::from_str::<ErrorResponse>(&body).ok())
        .and_then(|e| e.error)
        .filter(|m| !m.trim().is_empty());
    Err(RemoteError::Status {
        status: status.as_u16(),
        message,
    })
}

fn connectivity(url: &str, err: reqwest::Error) -> RemoteError {
    RemoteError::Connectivity {
        url: url.to_string(),
        message: err.to_string(),
    }
}

fn decode(url: &str, err: reqwest::Error) -> RemoteError {
    RemoteError::Decode {
        url: url.to_string(),
        message: err.to_string(),
    }
}
