use super::state::AppState;
use crate::calendar::CallerInfo;
use crate::conversation::TurnOutcome;
use crate::session::SessionConfig;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct StartCallRequest {
    /// Optional call ID (if not provided, generate UUID)
    pub call_id: Option<String>,

    pub caller: CallerInfo,

    /// Language tag (default: en-US)
    pub language: Option<String>,

    /// Selects the silence timing profile
    pub workflow_type: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StartCallResponse {
    pub call_id: String,
    pub status: String,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct UtteranceRequest {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct UtteranceResponse {
    pub call_id: String,
    #[serde(flatten)]
    pub outcome: TurnOutcome,
}

#[derive(Debug, Serialize)]
pub struct EndCallResponse {
    pub call_id: String,
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct MetricsQuery {
    /// Trailing window in seconds (default: 3600)
    pub window_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct ErrorsQuery {
    /// Maximum records returned (default: 20)
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn not_found(call_id: &str) -> axum::response::Response {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: format!("Call {} not found", call_id),
        }),
    )
        .into_response()
}

// ============================================================================
// Call Handlers
// ============================================================================

/// POST /calls/start
/// Register a new call and begin warming its appointment cache
pub async fn start_call(
    State(state): State<AppState>,
    Json(req): Json<StartCallRequest>,
) -> impl IntoResponse {
    let call_id = req
        .call_id
        .unwrap_or_else(|| format!("call-{}", uuid::Uuid::new_v4()));

    info!("Starting call: {}", call_id);

    if state.orchestrator.sessions().contains(&call_id).await {
        return (
            StatusCode::CONFLICT,
            Json(ErrorResponse {
                error: format!("Call {} is already active", call_id),
            }),
        )
            .into_response();
    }

    let config = SessionConfig {
        session_id: call_id.clone(),
        caller: req.caller,
        language: req.language.unwrap_or_else(|| "en-US".to_string()),
        workflow_type: req.workflow_type,
    };

    if let Err(e) = state.orchestrator.start_call(config).await {
        error!("Failed to start call: {}", e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: format!("Failed to start call: {}", e),
            }),
        )
            .into_response();
    }

    (
        StatusCode::OK,
        Json(StartCallResponse {
            call_id: call_id.clone(),
            status: "active".to_string(),
            message: format!("Call {} started", call_id),
        }),
    )
        .into_response()
}

/// POST /calls/:call_id/utterance
/// Run one conversation turn for a final caller transcript
pub async fn post_utterance(
    State(state): State<AppState>,
    Path(call_id): Path<String>,
    Json(req): Json<UtteranceRequest>,
) -> impl IntoResponse {
    let outcome = state.orchestrator.handle_utterance(&call_id, &req.text).await;

    (StatusCode::OK, Json(UtteranceResponse { call_id, outcome })).into_response()
}

/// POST /calls/:call_id/end
/// Tear down a call
pub async fn end_call(
    State(state): State<AppState>,
    Path(call_id): Path<String>,
) -> impl IntoResponse {
    info!("Ending call: {}", call_id);

    if state.orchestrator.end_call(&call_id).await {
        (
            StatusCode::OK,
            Json(EndCallResponse {
                call_id,
                status: "ended".to_string(),
            }),
        )
            .into_response()
    } else {
        not_found(&call_id)
    }
}

/// GET /calls/:call_id/status
pub async fn get_call_status(
    State(state): State<AppState>,
    Path(call_id): Path<String>,
) -> impl IntoResponse {
    match state.orchestrator.status(&call_id).await {
        Some(status) => (StatusCode::OK, Json(status)).into_response(),
        None => not_found(&call_id),
    }
}

// ============================================================================
// Turn-Taking Signals
// ============================================================================

/// POST /calls/:call_id/speech/started
pub async fn speech_started(
    State(state): State<AppState>,
    Path(call_id): Path<String>,
) -> impl IntoResponse {
    state.orchestrator.speech_started(&call_id);
    StatusCode::NO_CONTENT
}

/// POST /calls/:call_id/speech/ended
pub async fn speech_ended(
    State(state): State<AppState>,
    Path(call_id): Path<String>,
) -> impl IntoResponse {
    state.orchestrator.speech_ended(&call_id);
    StatusCode::NO_CONTENT
}

/// POST /calls/:call_id/assistant/started
pub async fn assistant_started(
    State(state): State<AppState>,
    Path(call_id): Path<String>,
) -> impl IntoResponse {
    state.orchestrator.assistant_started(&call_id);
    StatusCode::NO_CONTENT
}

/// POST /calls/:call_id/assistant/ended
pub async fn assistant_ended(
    State(state): State<AppState>,
    Path(call_id): Path<String>,
) -> impl IntoResponse {
    state.orchestrator.assistant_ended(&call_id);
    StatusCode::NO_CONTENT
}

// ============================================================================
// Audit Handlers
// ============================================================================

/// GET /audit/status
/// Queue depths and totals
pub async fn get_audit_status(State(state): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, Json(state.orchestrator.audit().status())).into_response()
}

/// GET /audit/metrics?window_secs=3600
pub async fn get_audit_metrics(
    State(state): State<AppState>,
    Query(query): Query<MetricsQuery>,
) -> impl IntoResponse {
    let window = Duration::from_secs(query.window_secs.unwrap_or(3600));
    let summary = state.orchestrator.audit().performance_metrics(window).await;
    (StatusCode::OK, Json(summary)).into_response()
}

/// GET /audit/errors?limit=20
pub async fn get_audit_errors(
    State(state): State<AppState>,
    Query(query): Query<ErrorsQuery>,
) -> impl IntoResponse {
    let records = state
        .orchestrator
        .audit()
        .recent_errors(query.limit.unwrap_or(20))
        .await;
    (StatusCode::OK, Json(records)).into_response()
}

/// GET /audit/:correlation_id
/// Audit records for one call
pub async fn get_audit_records(
    State(state): State<AppState>,
    Path(correlation_id): Path<String>,
) -> impl IntoResponse {
    let records = state.orchestrator.audit().records_for(&correlation_id).await;
    (StatusCode::OK, Json(records)).into_response()
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
