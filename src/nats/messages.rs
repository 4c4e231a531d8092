use crate::calendar::CallerInfo;
use crate::session::SessionConfig;
use serde::{Deserialize, Serialize};

fn default_language() -> String {
    "en-US".to_string()
}

/// Call event published by the telephony bridge on `<events_subject>.<call_id>`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CallEvent {
    Started {
        call_id: String,
        caller: CallerInfo,
        #[serde(default = "default_language")]
        language: String,
        #[serde(default)]
        workflow_type: Option<String>,
    },
    SpeechStarted {
        call_id: String,
    },
    SpeechEnded {
        call_id: String,
    },
    /// Speech-to-text output; only final transcripts start a turn
    Transcript {
        call_id: String,
        text: String,
        #[serde(default)]
        partial: bool,
    },
    AssistantStarted {
        call_id: String,
    },
    AssistantEnded {
        call_id: String,
    },
    Hangup {
        call_id: String,
    },
}

impl CallEvent {
    pub fn call_id(&self) -> &str {
        match self {
            CallEvent::Started { call_id, .. }
            | CallEvent::SpeechStarted { call_id }
            | CallEvent::SpeechEnded { call_id }
            | CallEvent::Transcript { call_id, .. }
            | CallEvent::AssistantStarted { call_id }
            | CallEvent::AssistantEnded { call_id }
            | CallEvent::Hangup { call_id } => call_id,
        }
    }

    /// Session parameters for a `started` event
    pub fn session_config(&self) -> Option<SessionConfig> {
        match self {
            CallEvent::Started {
                call_id,
                caller,
                language,
                workflow_type,
            } => Some(SessionConfig {
                session_id: call_id.clone(),
                caller: caller.clone(),
                language: language.clone(),
                workflow_type: workflow_type.clone(),
            }),
            _ => None,
        }
    }
}

/// Text to synthesize, published on `<speech_subject>.<call_id>`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeakMessage {
    pub call_id: String,
    pub text: String,
    /// Hang up once this has been spoken
    #[serde(default)]
    pub end_call: bool,
    pub timestamp: String, // RFC3339 timestamp
}

/// Staff notification, published on `<notify_subject>.<role>`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaffNotification {
    pub recipient: String,
    pub message: String,
    pub timestamp: String,
}
