use crate::calendar::CallerInfo;
use serde::{Deserialize, Serialize};

/// Parameters for a new call session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Call-stream identifier from the telephony transport (e.g., "call-7f3a...")
    pub session_id: String,

    /// Who is calling
    pub caller: CallerInfo,

    /// Negotiated language tag, e.g. "en-US"
    pub language: String,

    /// Selects the silence timing profile
    pub workflow_type: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_id: format!("call-{}", uuid::Uuid::new_v4()),
            caller: CallerInfo::default(),
            language: "en-US".to_string(),
            workflow_type: None,
        }
    }
}
