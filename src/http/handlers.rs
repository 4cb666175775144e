use super::state::AppState;
use crate::error::{CallError, CallErrorKind};
use crate::session::{CallSession, CallStats};
use crate::signals::SignalSnapshot;
use crate::transcript::TranscriptEntry;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct StartCallRequest {
    /// Overrides the configured assistant
    pub assistant_id: Option<String>,

    /// Overrides the configured voice
    pub voice: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct MuteRequest {
    pub muted: bool,
}

#[derive(Debug, Serialize)]
pub struct MuteResponse {
    pub applied: bool,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: CallErrorKind,
}

fn status_for(kind: CallErrorKind) -> StatusCode {
    match kind {
        CallErrorKind::AlreadyInProgress | CallErrorKind::Cancelled => StatusCode::CONFLICT,
        CallErrorKind::PermissionDenied => StatusCode::FORBIDDEN,
        CallErrorKind::DeviceNotFound => StatusCode::NOT_FOUND,
        CallErrorKind::ConnectionError | CallErrorKind::ConfigurationError => {
            StatusCode::BAD_GATEWAY
        }
        CallErrorKind::Disposed => StatusCode::SERVICE_UNAVAILABLE,
        CallErrorKind::Unknown => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for CallError {
    fn into_response(self) -> Response {
        (
            status_for(self.kind),
            Json(ErrorResponse {
                error: self.message,
                kind: self.kind,
            }),
        )
            .into_response()
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /call/start
/// Start a call and wait until it is active or has failed
pub async fn start_call(
    State(state): State<AppState>,
    body: Option<Json<StartCallRequest>>,
) -> Result<Json<CallSession>, CallError> {
    let req = body.map(|Json(req)| req).unwrap_or_default();

    let mut config = state.default_call.clone();
    if let Some(assistant_id) = req.assistant_id {
        config = config.with("assistantId", assistant_id);
    }
    if let Some(voice) = req.voice {
        config = config.with_voice(voice);
    }

    info!("Starting call via HTTP");
    match state.controller.start_call(config).await {
        Ok(session) => Ok(Json(session)),
        Err(e) => {
            warn!("Call start rejected ({}): {}", e.kind, e);
            Err(e)
        }
    }
}

/// POST /call/end
pub async fn end_call(State(state): State<AppState>) -> Json<CallSession> {
    Json(state.controller.end_call().await)
}

/// POST /call/reset
/// Acknowledge a failed call so a new one can start
pub async fn reset_call(State(state): State<AppState>) -> Json<CallSession> {
    Json(state.controller.reset())
}

/// POST /call/mute
pub async fn set_muted(
    State(state): State<AppState>,
    Json(req): Json<MuteRequest>,
) -> Json<MuteResponse> {
    let applied = state.controller.set_muted(req.muted).await;
    Json(MuteResponse { applied })
}

/// GET /call/status
pub async fn get_status(State(state): State<AppState>) -> Json<CallStats> {
    Json(state.controller.stats())
}

/// GET /call/session
pub async fn get_session(State(state): State<AppState>) -> Json<CallSession> {
    Json(state.controller.session())
}

/// GET /call/transcript
/// Reconciled transcript so far, in display order
pub async fn get_transcript(State(state): State<AppState>) -> Json<Vec<TranscriptEntry>> {
    Json(state.controller.transcript())
}

/// GET /call/signals
pub async fn get_signals(State(state): State<AppState>) -> Json<SignalSnapshot> {
    Json(state.controller.signals())
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(status_for(CallErrorKind::AlreadyInProgress), StatusCode::CONFLICT);
        assert_eq!(status_for(CallErrorKind::PermissionDenied), StatusCode::FORBIDDEN);
        assert_eq!(status_for(CallErrorKind::DeviceNotFound), StatusCode::NOT_FOUND);
        assert_eq!(status_for(CallErrorKind::ConnectionError), StatusCode::BAD_GATEWAY);
        assert_eq!(status_for(CallErrorKind::Disposed), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            status_for(CallErrorKind::Unknown),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
