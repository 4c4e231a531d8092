use super::call::CallSession;
use super::config::SessionConfig;
use super::stats::SessionStats;
use crate::calendar::Appointment;
use anyhow::{bail, Result};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

/// Active calls keyed by call-stream id
///
/// All session access goes through these accessors; nothing hands out a shared
/// mutable reference that outlives a single call.
pub struct SessionStore {
    sessions: RwLock<HashMap<String, CallSession>>,
    transcript_cap: usize,
}

impl SessionStore {
    pub fn new(transcript_cap: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            transcript_cap,
        }
    }

    /// Register a call. Fails if the id is already active.
    pub async fn create(&self, config: SessionConfig) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&config.session_id) {
            bail!("Session {} already exists", config.session_id);
        }

        info!("Creating call session: {}", config.session_id);
        let id = config.session_id.clone();
        sessions.insert(id, CallSession::new(config, self.transcript_cap));
        Ok(())
    }

    pub async fn remove(&self, session_id: &str) -> Option<CallSession> {
        let removed = self.sessions.write().await.remove(session_id);
        if removed.is_some() {
            info!("Removed call session: {}", session_id);
        }
        removed
    }

    pub async fn contains(&self, session_id: &str) -> bool {
        self.sessions.read().await.contains_key(session_id)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Read from a session; `None` if it does not exist
    pub async fn read<R>(&self, session_id: &str, f: impl FnOnce(&CallSession) -> R) -> Option<R> {
        let sessions = self.sessions.read().await;
        sessions.get(session_id).map(f)
    }

    /// Mutate a session; `None` if it does not exist
    pub async fn update<R>(
        &self,
        session_id: &str,
        f: impl FnOnce(&mut CallSession) -> R,
    ) -> Option<R> {
        let mut sessions = self.sessions.write().await;
        sessions.get_mut(session_id).map(f)
    }

    /// Lock serializing caller turns for one call; `None` for an unknown session
    pub async fn turn_lock(&self, session_id: &str) -> Option<Arc<Mutex<()>>> {
        self.read(session_id, |s| s.turn_lock()).await
    }

    /// Cached appointments, or `None` for an unknown session
    pub async fn cached_appointments(&self, session_id: &str) -> Option<Vec<Appointment>> {
        self.read(session_id, |s| s.appointments().to_vec()).await
    }

    /// Store the result of a successful fetch.
    ///
    /// This is the only way to overwrite the appointment cache; failed fetches never
    /// reach it. Returns false when the session is gone.
    pub async fn store_fetched_appointments(
        &self,
        session_id: &str,
        appointments: Vec<Appointment>,
    ) -> bool {
        let count = appointments.len();
        let stored = self
            .update(session_id, |s| s.set_fetched_appointments(appointments))
            .await
            .is_some();

        if stored {
            debug!("Cached {} appointments for {}", count, session_id);
        } else {
            debug!("Dropping fetch result for ended session {}", session_id);
        }
        stored
    }

    pub async fn stats(&self, session_id: &str) -> Option<SessionStats> {
        self.read(session_id, |s| {
            let duration = Utc::now().signed_duration_since(s.started_at);
            SessionStats {
                session_id: s.session_id.clone(),
                started_at: s.started_at,
                duration_secs: duration.num_milliseconds() as f64 / 1000.0,
                turns: s.turn_count(),
                cached_appointments: s.appointments().len(),
                has_pending_edit: s.pending_edit.is_some(),
                flags: s.flags.clone(),
                conversation_ended: s.conversation_ended,
            }
        })
        .await
    }
}
