use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Call lifecycle
        .route("/calls/start", post(handlers::start_call))
        .route("/calls/:call_id/end", post(handlers::end_call))
        .route("/calls/:call_id/status", get(handlers::get_call_status))
        // Conversation and turn-taking signals
        .route("/calls/:call_id/utterance", post(handlers::post_utterance))
        .route(
            "/calls/:call_id/speech/started",
            post(handlers::speech_started),
        )
        .route("/calls/:call_id/speech/ended", post(handlers::speech_ended))
        .route(
            "/calls/:call_id/assistant/started",
            post(handlers::assistant_started),
        )
        .route(
            "/calls/:call_id/assistant/ended",
            post(handlers::assistant_ended),
        )
        // Audit trail
        .route("/audit/status", get(handlers::get_audit_status))
        .route("/audit/metrics", get(handlers::get_audit_metrics))
        .route("/audit/errors", get(handlers::get_audit_errors))
        .route("/audit/:correlation_id", get(handlers::get_audit_records))
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
