//! Request handlers and routing.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderName, HeaderValue, StatusCode, header};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error};

use crate::agent::{
    ModelOption, Orchestrator, ProgressEvent, QueryOverrides, RagResponse, validate_question,
};
use crate::error::AgentError;

/// Shared handler state.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Pipeline shared by every request.
    pub orchestrator: Arc<Orchestrator>,
}

/// Body of `POST /chat` and `POST /chat/stream`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatBody {
    /// The technician's question.
    pub query: String,
    /// Per-request settings and prior turns.
    #[serde(flatten)]
    pub overrides: QueryOverrides,
}

/// Error response rendered as `{"detail": ...}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    /// HTTP status of the response.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Message sent to the client.
    #[must_use]
    pub fn detail(&self) -> &str {
        &self.detail
    }
}

impl From<AgentError> for ApiError {
    fn from(err: AgentError) -> Self {
        let status = match err {
            AgentError::InvalidQuery { .. } => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(error = %err, "request failed");
        }
        Self {
            status,
            detail: err.to_string(),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    detail: &'a str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { detail: &self.detail })).into_response()
    }
}

/// Builds the application router.
pub fn router(orchestrator: Arc<Orchestrator>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/chat", post(chat))
        .route("/chat/stream", post(chat_stream))
        .route("/chat/models", get(models))
        .with_state(AppState { orchestrator })
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok", "service": "hoprag" }))
}

/// Body of `GET /chat/models`.
#[derive(Debug, Serialize)]
pub struct ModelList {
    /// Models a client may pass as `model`.
    pub models: Vec<ModelOption>,
    /// Model used when a request names none.
    pub default: String,
}

async fn models(State(state): State<AppState>) -> Json<ModelList> {
    let config = state.orchestrator.config();
    Json(ModelList {
        models: config.models.clone(),
        default: config.model.clone(),
    })
}

async fn chat(
    State(state): State<AppState>,
    Json(body): Json<ChatBody>,
) -> Result<Json<RagResponse>, ApiError> {
    let response = state
        .orchestrator
        .query(&body.query, &body.overrides)
        .await?;
    Ok(Json(response))
}

async fn chat_stream(
    State(state): State<AppState>,
    Json(body): Json<ChatBody>,
) -> Result<Response, ApiError> {
    validate_question(&body.query)?;
    debug!(chars = body.query.len(), "streaming request accepted");

    let rx = state
        .orchestrator
        .query_stream(body.query, body.overrides);
    let stream = ReceiverStream::new(rx).map(|event| Ok::<_, Infallible>(to_sse_event(&event)));

    let headers = [
        (header::CACHE_CONTROL, HeaderValue::from_static("no-cache")),
        (
            HeaderName::from_static("x-accel-buffering"),
            HeaderValue::from_static("no"),
        ),
    ];
    Ok((headers, Sse::new(stream).keep_alive(KeepAlive::default())).into_response())
}

fn to_sse_event(event: &ProgressEvent) -> Event {
    Event::default().event(event.kind()).data(event.data())
}
