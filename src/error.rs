//! Error types callers branch on
//!
//! Everything else is `anyhow::Error`.

use thiserror::Error;

/// Why a capability invocation produced an error result
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CapabilityError {
    #[error("Unknown capability: {0}")]
    UnknownCapability(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Calendar error: {0}")]
    Calendar(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for CapabilityError {
    fn from(e: serde_json::Error) -> Self {
        CapabilityError::Internal(e.to_string())
    }
}

/// Failures that end processing of a caller turn
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CallError {
    #[error("Session not found: {0}")]
    SessionNotFound(String),
}
