//! HTTP request handlers

use super::sse::sse_stream;
use super::types::{
    AnswerRequest, CancelResponse, ErrorResponse, OptionsResponse, ProfileRequest,
    SessionResponse, SuccessResponse,
};
use super::AppState;
use crate::interview::{Event, SessionSnapshot, TransitionError};
use crate::llm::LlmErrorKind;
use crate::runtime::{SessionError, SessionEvent, SessionHandle};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Setup options
        .route("/api/options", get(get_options))
        // Session lifecycle
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/:id", get(get_session).delete(delete_session))
        // SSE streaming
        .route("/api/sessions/:id/stream", get(stream_session))
        // User actions
        .route("/api/sessions/:id/profile", put(update_profile))
        .route("/api/sessions/:id/start", post(start_interview))
        .route("/api/sessions/:id/answer", post(submit_answer))
        .route("/api/sessions/:id/retry", post(retry_reply))
        .route("/api/sessions/:id/feedback", post(request_feedback))
        .route("/api/sessions/:id/restart", post(restart_session))
        .route("/api/sessions/:id/cancel", post(cancel_session))
        // Version
        .route("/version", get(get_version))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ============================================================
// Options
// ============================================================

async fn get_options(State(state): State<AppState>) -> Json<OptionsResponse> {
    Json(OptionsResponse::new(state.sessions.has_client()))
}

// ============================================================
// Session Lifecycle
// ============================================================

fn session_response(handle: &SessionHandle) -> SessionResponse {
    SessionResponse {
        id: handle.id,
        created_at: handle.created_at,
        session: handle.snapshot(),
    }
}

async fn create_session(State(state): State<AppState>) -> (StatusCode, Json<SessionResponse>) {
    let handle = state.sessions.create().await;
    (StatusCode::CREATED, Json(session_response(&handle)))
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionResponse>, AppError> {
    let handle = state.sessions.get(id).await?;
    Ok(Json(session_response(&handle)))
}

async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SuccessResponse>, AppError> {
    state.sessions.remove(id).await?;
    Ok(Json(SuccessResponse { success: true }))
}

// ============================================================
// SSE Streaming
// ============================================================

async fn stream_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let handle = state.sessions.get(id).await?;

    // Subscribe before taking the snapshot so no change falls in between
    let broadcast_rx = handle.subscribe();
    let init_event = SessionEvent::Init {
        snapshot: handle.snapshot(),
    };

    Ok(sse_stream(init_event, broadcast_rx))
}

// ============================================================
// User Actions
// ============================================================

async fn dispatch(state: &AppState, id: Uuid, event: Event) -> Result<Json<SessionSnapshot>, AppError> {
    let snapshot = state.sessions.dispatch(id, event).await?;
    Ok(Json(snapshot))
}

async fn update_profile(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ProfileRequest>,
) -> Result<Json<SessionSnapshot>, AppError> {
    dispatch(
        &state,
        id,
        Event::UpdateProfile {
            profile: req.profile,
            configuration: req.configuration,
        },
    )
    .await
}

async fn start_interview(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionSnapshot>, AppError> {
    dispatch(&state, id, Event::CompleteSetup).await
}

async fn submit_answer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<AnswerRequest>,
) -> Result<Json<SessionSnapshot>, AppError> {
    dispatch(&state, id, Event::SubmitAnswer { text: req.text }).await
}

async fn retry_reply(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionSnapshot>, AppError> {
    dispatch(&state, id, Event::RetryReply).await
}

async fn request_feedback(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionSnapshot>, AppError> {
    dispatch(&state, id, Event::RequestFeedback).await
}

async fn restart_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionSnapshot>, AppError> {
    let snapshot = state.sessions.restart(id).await?;
    Ok(Json(snapshot))
}

async fn cancel_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CancelResponse>, AppError> {
    let cancelled = state.sessions.cancel(id).await?;
    Ok(Json(CancelResponse { cancelled }))
}

// ============================================================
// Version
// ============================================================

async fn get_version() -> &'static str {
    concat!("interview-coach ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
struct AppError(SessionError);

impl From<SessionError> for AppError {
    fn from(e: SessionError) -> Self {
        Self(e)
    }
}

fn status_for(error: &SessionError) -> StatusCode {
    match error {
        SessionError::Transition(TransitionError::Validation(_)) => StatusCode::UNPROCESSABLE_ENTITY,
        SessionError::Transition(_) | SessionError::Busy => StatusCode::CONFLICT,
        SessionError::Completion(e) => match e.kind {
            LlmErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
            LlmErrorKind::Cancelled => StatusCode::CONFLICT,
            _ => StatusCode::BAD_GATEWAY,
        },
        SessionError::CompletionUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        SessionError::NotFound(_) => StatusCode::NOT_FOUND,
        SessionError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        let mut body = ErrorResponse::new(self.0.to_string(), self.0.kind());
        if let SessionError::Completion(e) = &self.0 {
            body = body.with_class(e.kind.class());
        }
        (status, Json(body)).into_response()
    }
}
