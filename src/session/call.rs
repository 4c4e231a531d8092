use super::config::SessionConfig;
use super::stats::{Speaker, TranscriptTurn};
use crate::calendar::{Appointment, CallerInfo};
use crate::conversation::ConversationFlags;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Which mutation a pending edit is collecting details for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditAction {
    Reschedule,
    Cancel,
    Book,
}

/// The piece of information a pending edit still needs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingDetail {
    Appointment,
    Title,
    Date,
    Time,
    Confirmation,
}

/// A mutation the caller has started describing but not finished confirming
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingEdit {
    pub action: EditAction,
    pub appointment_id: Option<String>,
    pub appointment_summary: Option<String>,
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    /// We read the change back and are waiting for a yes/no
    pub awaiting_confirmation: bool,
    /// The caller explicitly said yes to the read-back
    pub confirmation_received: bool,
}

impl PendingEdit {
    pub fn new(action: EditAction) -> Self {
        Self {
            action,
            appointment_id: None,
            appointment_summary: None,
            date: None,
            time: None,
            awaiting_confirmation: false,
            confirmation_received: false,
        }
    }

    /// First detail still missing before the edit can be read back
    pub fn missing_detail(&self) -> Option<MissingDetail> {
        match self.action {
            EditAction::Book if self.appointment_summary.is_none() => Some(MissingDetail::Title),
            EditAction::Reschedule | EditAction::Cancel if self.appointment_id.is_none() => {
                Some(MissingDetail::Appointment)
            }
            EditAction::Cancel => None,
            _ if self.date.is_none() => Some(MissingDetail::Date),
            _ if self.time.is_none() => Some(MissingDetail::Time),
            _ => None,
        }
    }

    /// Every detail present and explicitly confirmed
    pub fn is_ready(&self) -> bool {
        self.missing_detail().is_none() && self.confirmation_received
    }
}

/// All state for one active call
#[derive(Debug, Clone)]
pub struct CallSession {
    pub session_id: String,
    pub caller: CallerInfo,
    pub language: String,
    pub workflow_type: Option<String>,
    pub started_at: DateTime<Utc>,
    pub pending_edit: Option<PendingEdit>,
    pub flags: ConversationFlags,
    /// The conversation was ended (goodbye or end-call); waiting for hangup
    pub conversation_ended: bool,
    transcript: VecDeque<TranscriptTurn>,
    transcript_cap: usize,
    appointments: Vec<Appointment>,
    appointments_fetched_at: Option<DateTime<Utc>>,
    /// Held for the whole of a caller turn so turns for one call never overlap
    turn_lock: Arc<Mutex<()>>,
}

impl CallSession {
    pub fn new(config: SessionConfig, transcript_cap: usize) -> Self {
        Self {
            session_id: config.session_id,
            caller: config.caller,
            language: config.language,
            workflow_type: config.workflow_type,
            started_at: Utc::now(),
            pending_edit: None,
            flags: ConversationFlags::default(),
            conversation_ended: false,
            transcript: VecDeque::new(),
            transcript_cap: transcript_cap.max(1),
            appointments: Vec::new(),
            appointments_fetched_at: None,
            turn_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn turn_lock(&self) -> Arc<Mutex<()>> {
        self.turn_lock.clone()
    }

    /// Append a turn, dropping the oldest beyond the cap
    pub fn push_turn(&mut self, speaker: Speaker, text: impl Into<String>) {
        self.transcript.push_back(TranscriptTurn {
            speaker,
            text: text.into(),
            timestamp: Utc::now(),
        });
        while self.transcript.len() > self.transcript_cap {
            self.transcript.pop_front();
        }
    }

    pub fn transcript(&self) -> impl Iterator<Item = &TranscriptTurn> {
        self.transcript.iter()
    }

    /// The newest `n` turns, oldest first
    pub fn recent_turns(&self, n: usize) -> Vec<TranscriptTurn> {
        let skip = self.transcript.len().saturating_sub(n);
        self.transcript.iter().skip(skip).cloned().collect()
    }

    pub fn turn_count(&self) -> usize {
        self.transcript.len()
    }

    pub fn appointments(&self) -> &[Appointment] {
        &self.appointments
    }

    pub fn appointments_fetched_at(&self) -> Option<DateTime<Utc>> {
        self.appointments_fetched_at
    }

    /// Overwrite the cache with a successful fetch
    pub(crate) fn set_fetched_appointments(&mut self, appointments: Vec<Appointment>) {
        self.appointments = appointments;
        self.appointments_fetched_at = Some(Utc::now());
    }

    /// Keep the cache coherent after a successful mutation
    pub fn apply_updated_appointment(&mut self, updated: &Appointment) {
        match self.appointments.iter_mut().find(|a| a.id == updated.id) {
            Some(existing) => *existing = updated.clone(),
            None => self.appointments.push(updated.clone()),
        }
    }

    pub fn apply_cancelled_appointment(&mut self, appointment_id: &str) {
        self.appointments.retain(|a| a.id != appointment_id);
    }
}
