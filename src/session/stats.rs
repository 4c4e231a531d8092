use crate::conversation::ConversationFlags;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Statistics about a call session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    pub session_id: String,

    /// When the call started
    pub started_at: DateTime<Utc>,

    /// Total duration in seconds
    pub duration_secs: f64,

    /// Transcript turns currently retained
    pub turns: usize,

    /// Appointments in the session cache
    pub cached_appointments: usize,

    /// A mutation is collecting details or awaiting confirmation
    pub has_pending_edit: bool,

    pub flags: ConversationFlags,

    /// The conversation ended and the call is waiting to hang up
    pub conversation_ended: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    Caller,
    Assistant,
}

/// A single transcript turn
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptTurn {
    pub speaker: Speaker,

    /// What was said
    pub text: String,

    /// When this turn was recorded
    pub timestamp: DateTime<Utc>,
}
