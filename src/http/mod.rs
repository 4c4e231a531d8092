//! HTTP API for call control and audit queries
//!
//! Lets a telephony bridge without NATS drive calls directly:
//! - POST /calls/start - Register a call
//! - POST /calls/:id/utterance - Run a conversation turn
//! - POST /calls/:id/speech/{started,ended} - Caller voice activity
//! - POST /calls/:id/assistant/{started,ended} - Playback activity
//! - POST /calls/:id/end - Tear down a call
//! - GET /calls/:id/status - Session and turn-taking state
//! - GET /audit/{status,metrics,errors,:correlation_id} - Audit trail
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
