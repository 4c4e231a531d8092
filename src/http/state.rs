use crate::orchestrator::CallOrchestrator;
use std::sync::Arc;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Owns every active call (call_id → session, turn state, cache)
    pub orchestrator: Arc<CallOrchestrator>,
}

impl AppState {
    pub fn new(orchestrator: Arc<CallOrchestrator>) -> Self {
        Self { orchestrator }
    }
}
