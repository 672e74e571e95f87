use super::state::AppState;
use crate::session::{SessionStatus, Turn};
use crate::Error;
use axum::{
    extract::State,
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Json, Response,
    },
};
use futures::Stream;
use serde::{Deserialize, Serialize};
use tokio_stream::{wrappers::WatchStream, StreamExt};
use tracing::{error, info, warn};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct ConnectRequest {
    /// Coaching language code (defaults to the configured language)
    pub language: Option<String>,

    /// Authenticated user; summaries are persisted only when present
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ToggleResponse {
    pub enabled: bool,
    pub status: SessionStatus,
}

#[derive(Debug, Serialize)]
pub struct MuteResponse {
    pub muted: bool,
    pub status: SessionStatus,
}

#[derive(Debug, Serialize)]
pub struct TranscriptResponse {
    pub session_id: Option<String>,
    pub turns: Vec<Turn>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(e: Error) -> Response {
    let code = match &e {
        Error::InvalidState(_) => StatusCode::CONFLICT,
        Error::DeviceUnavailable(_) | Error::ControllerStopped => StatusCode::SERVICE_UNAVAILABLE,
        Error::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        e if e.is_connect_phase() => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    (
        code,
        Json(ErrorResponse {
            error: e.to_string(),
        }),
    )
        .into_response()
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /session/connect
/// Start a session and wait until it is connected or has failed; the body is optional
pub async fn connect(
    State(state): State<AppState>,
    body: Option<Json<ConnectRequest>>,
) -> impl IntoResponse {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let language = req
        .language
        .filter(|language| !language.trim().is_empty())
        .unwrap_or_else(|| state.default_language.clone());

    info!("Connect requested (language: {})", language);

    match state.session.connect(language, req.user_id).await {
        Ok(status) => (StatusCode::OK, Json(status)).into_response(),
        Err(e) => {
            error!("Connect failed: {}", e);
            error_response(e)
        }
    }
}

/// POST /session/disconnect
/// End the active session, or cancel one that is still connecting
pub async fn disconnect(State(state): State<AppState>) -> impl IntoResponse {
    info!("Disconnect requested");

    match state.session.disconnect().await {
        Ok(status) => (StatusCode::OK, Json(status)).into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /session/mute
/// Toggle microphone transmission
pub async fn toggle_mute(State(state): State<AppState>) -> impl IntoResponse {
    match state.session.toggle_mute().await {
        Ok(muted) => (
            StatusCode::OK,
            Json(MuteResponse {
                muted,
                status: state.session.status(),
            }),
        )
            .into_response(),
        Err(e) => {
            warn!("Mute toggle rejected: {}", e);
            error_response(e)
        }
    }
}

/// POST /session/speaker
/// Toggle agent audio rendering
pub async fn toggle_speaker(State(state): State<AppState>) -> impl IntoResponse {
    match state.session.toggle_speaker().await {
        Ok(enabled) => (
            StatusCode::OK,
            Json(ToggleResponse {
                enabled,
                status: state.session.status(),
            }),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /session/status
pub async fn get_status(State(state): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, Json(state.session.status()))
}

/// GET /session/transcript
/// Transcript of the active session, or of the last one once it ended
pub async fn get_transcript(State(state): State<AppState>) -> impl IntoResponse {
    match state.session.transcript().await {
        Ok(turns) => (
            StatusCode::OK,
            Json(TranscriptResponse {
                session_id: state.session.status().session_id,
                turns,
            }),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /session/events
/// Stream status snapshots; the current one is sent immediately
pub async fn status_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let stream = WatchStream::new(state.session.subscribe())
        .map(|status| Event::default().event("status").json_data(status));

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
