// Axum API Server Module
//
// Purpose: session protocol over HTTP (connect, requestFullDataset, processData,
// disconnect) in front of the forecasting pipeline. Pipeline work is CPU-bound
// and runs on the blocking pool so one slow session never stalls another.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::error::PipelineError;
use crate::pipeline::{CancelFlag, Emission, PipelineOrchestrator, PipelineOutcome};

// ============================================================================
// Application State
// ============================================================================

/// One connected client
///
/// `lock` serialises requests within the session; `cancel` is the parent of
/// every request flag and is tripped on disconnect.
pub struct Session {
    lock: tokio::sync::Mutex<()>,
    cancel: CancelFlag,
}

impl Session {
    fn new() -> Self {
        Self {
            lock: tokio::sync::Mutex::new(()),
            cancel: CancelFlag::new(),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<PipelineOrchestrator>,
    pub sessions: Cache<String, Arc<Session>>,
}

impl AppState {
    pub fn new(orchestrator: PipelineOrchestrator, session_idle: Duration) -> Self {
        tracing::info!("Initializing Moka session store (idle expiry {:?})...", session_idle);
        let sessions = Cache::builder()
            .max_capacity(10_000)
            .time_to_idle(session_idle)
            .build();

        Self {
            orchestrator: Arc::new(orchestrator),
            sessions,
        }
    }

    async fn session(&self, id: &str) -> Result<Arc<Session>, AppError> {
        self.sessions
            .get(id)
            .await
            .ok_or_else(|| AppError::NotFound(format!("Session {} not found", id)))
    }
}

// ============================================================================
// Router
// ============================================================================

pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health_check))

        // Session protocol
        .route("/api/sessions", post(connect))
        .route("/api/sessions/:id", axum::routing::delete(disconnect))
        .route("/api/sessions/:id/dataset", get(request_full_dataset))
        .route("/api/sessions/:id/process", post(process_data))

        // Middleware (applied in reverse order)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ============================================================================
// Endpoint Handlers
// ============================================================================

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn connect(State(state): State<AppState>) -> Result<Json<ConnectResponse>, AppError> {
    let orchestrator = state.orchestrator.clone();
    let columns = tokio::task::spawn_blocking(move || orchestrator.connect_columns())
        .await
        .map_err(|e| AppError::Internal(format!("Task join error: {}", e)))??;

    let session_id = format!("{:016x}", rand::random::<u64>());
    state
        .sessions
        .insert(session_id.clone(), Arc::new(Session::new()))
        .await;

    tracing::info!(session = %session_id, columns = columns.len(), "Client connected");
    Ok(Json(ConnectResponse { session_id, columns }))
}

async fn request_full_dataset(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.session(&id).await?;

    let orchestrator = state.orchestrator.clone();
    let table = tokio::task::spawn_blocking(move || orchestrator.full_dataset())
        .await
        .map_err(|e| AppError::Internal(format!("Task join error: {}", e)))??;

    tracing::info!(session = %id, rows = table.height(), "Full dataset requested");
    Ok(Json(serde_json::json!({
        "columns": table.columns,
        "rows": table.records(),
    })))
}

async fn process_data(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<ProcessRequest>,
) -> Result<Json<ProcessResponse>, AppError> {
    let session = state.session(&id).await?;

    // One request at a time per session
    let _guard = session.lock.lock().await;

    // Dropping this handler (client gone) cancels the blocking run
    let cancel = CancelOnDrop(session.cancel.child());
    let flag = cancel.0.clone();

    tracing::info!(session = %id, column = %payload.target_column, "Processing request");

    let orchestrator = state.orchestrator.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        orchestrator.process(&payload.target_column, &flag)
    })
    .await
    .map_err(|e| AppError::Internal(format!("Task join error: {}", e)))?;

    if let PipelineOutcome::Cancelled { .. } = outcome {
        return Err(AppError::Gone(format!("Session {} was disconnected", id)));
    }

    Ok(Json(ProcessResponse {
        events: outcome.into_emissions(),
    }))
}

async fn disconnect(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let session = state
        .sessions
        .remove(&id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Session {} not found", id)))?;

    session.cancel.cancel();
    tracing::info!(session = %id, "Client disconnected");
    Ok(StatusCode::NO_CONTENT)
}

/// Cancels the wrapped flag when the owning request future is dropped
struct CancelOnDrop(CancelFlag);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ProcessRequest {
    pub target_column: String,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ConnectResponse {
    pub session_id: String,
    pub columns: Vec<String>,
}

#[derive(Serialize, Debug)]
pub struct ProcessResponse {
    pub events: Vec<Emission>,
}

// ============================================================================
// Error Handling
// ============================================================================

#[derive(Debug)]
enum AppError {
    NotFound(String),
    Unavailable(String),
    Gone(String),
    Internal(String),
}

impl From<PipelineError> for AppError {
    fn from(error: PipelineError) -> Self {
        match error {
            PipelineError::DataUnavailable(_) => AppError::Unavailable(error.to_string()),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            AppError::Gone(msg) => (StatusCode::GONE, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        if status.is_server_error() {
            tracing::error!(%status, "{}", message);
        }

        let body = Json(serde_json::json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dropped_request_cancels_its_flag() {
        let session = CancelFlag::new();
        let guard = CancelOnDrop(session.child());
        let flag = guard.0.clone();

        assert!(!flag.is_cancelled());
        drop(guard);
        assert!(flag.is_cancelled());
        // Only the request is cancelled, not the session
        assert!(!session.is_cancelled());
    }
}
