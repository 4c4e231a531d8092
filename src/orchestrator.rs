//! Per-process orchestration context
//!
//! Owns every component and wires them together for each call:
//! - Session store and turn-taking state
//! - Prefetch cache and audit queue
//! - Conversation engine with its capability registry
//!
//! Constructed once at startup and shared by the HTTP and NATS front ends.

use crate::audit::{AuditQueue, AuditStore};
use crate::calendar::CalendarProvider;
use crate::capabilities::{default_registry, CallServices, CapabilityRegistry};
use crate::config::Config;
use crate::conversation::{ConversationEngine, TurnOutcome};
use crate::error::CallError;
use crate::model::ChatModel;
use crate::notify::Notifier;
use crate::prefetch::PrefetchCache;
use crate::session::{SessionConfig, SessionStats, SessionStore, Speaker};
use crate::turn_taking::{TimingProfiles, TurnEvent, TurnTakingEngine};
use anyhow::Result;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Last-resort reply when a call's state is gone
pub const APOLOGY: &str = "I'm sorry, something went wrong on our end. Please try calling again in a moment.";

/// Turn-taking flags for status reporting
#[derive(Debug, Clone, Serialize)]
pub struct TurnSnapshot {
    pub is_speaking: bool,
    pub is_listening: bool,
    pub assistant_speaking: bool,
    pub grace_period_active: bool,
    pub has_prompted_for_silence: bool,
    /// How long the caller has been silent, if monitoring is armed
    pub silence_ms: Option<u64>,
    pub armed_timers: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CallStatus {
    pub session: SessionStats,
    pub turn: Option<TurnSnapshot>,
    pub preloading: bool,
}

/// Spoken reply produced outside a caller turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Prompt {
    pub session_id: String,
    pub text: String,
}

pub struct CallOrchestrator {
    services: CallServices,
    turns: TurnTakingEngine,
    engine: ConversationEngine,
}

impl CallOrchestrator {
    /// Build with the built-in capabilities
    pub fn new(
        config: &Config,
        calendar: Arc<dyn CalendarProvider>,
        model: Arc<dyn ChatModel>,
        audit_store: Arc<dyn AuditStore>,
        notifier: Arc<dyn Notifier>,
    ) -> (Self, mpsc::UnboundedReceiver<TurnEvent>) {
        Self::with_registry(config, calendar, model, audit_store, notifier, default_registry())
    }

    pub fn with_registry(
        config: &Config,
        calendar: Arc<dyn CalendarProvider>,
        model: Arc<dyn ChatModel>,
        audit_store: Arc<dyn AuditStore>,
        notifier: Arc<dyn Notifier>,
        registry: CapabilityRegistry,
    ) -> (Self, mpsc::UnboundedReceiver<TurnEvent>) {
        let sessions = Arc::new(SessionStore::new(config.conversation.transcript_cap));
        let prefetch = PrefetchCache::new(calendar.clone(), sessions.clone(), &config.prefetch);
        let audit = AuditQueue::new(audit_store, config.audit.clone());

        let services = CallServices {
            sessions,
            calendar,
            prefetch,
            audit,
            notifier,
        };

        let (turns, events) = TurnTakingEngine::new(TimingProfiles::from_config(&config.turn_taking));
        let engine = ConversationEngine::new(
            services.clone(),
            Arc::new(registry),
            model,
            config.conversation.clone(),
        );

        (
            Self {
                services,
                turns,
                engine,
            },
            events,
        )
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.services.sessions
    }

    pub fn audit(&self) -> &AuditQueue {
        &self.services.audit
    }

    pub fn prefetch(&self) -> &PrefetchCache {
        &self.services.prefetch
    }

    pub fn turns(&self) -> &TurnTakingEngine {
        &self.turns
    }

    pub fn engine(&self) -> &ConversationEngine {
        &self.engine
    }

    /// Periodic audit fallback retries
    pub fn spawn_background_tasks(&self) -> JoinHandle<()> {
        self.services.audit.spawn_retry_loop()
    }

    /// Register a call, start turn tracking, and warm the appointment cache in the background
    pub async fn start_call(&self, config: SessionConfig) -> Result<()> {
        let session_id = config.session_id.clone();
        let caller = config.caller.clone();
        let workflow_type = config.workflow_type.clone();

        self.services.sessions.create(config).await?;
        self.turns.start_session(&session_id, workflow_type.as_deref());

        let prefetch = self.services.prefetch.clone();
        tokio::spawn(async move {
            prefetch.start_preloading(&session_id, &caller).await;
        });

        Ok(())
    }

    /// Run the conversation for one final caller utterance. Always returns something to say.
    pub async fn handle_utterance(&self, session_id: &str, text: &str) -> TurnOutcome {
        match self.engine.run_turn(session_id, text).await {
            Ok(outcome) => outcome,
            Err(CallError::SessionNotFound(id)) => {
                error!("Utterance for unknown session {}", id);
                TurnOutcome {
                    reply: Some(APOLOGY.to_string()),
                    end_call: false,
                    tool_rounds: 0,
                }
            }
        }
    }

    pub fn speech_started(&self, session_id: &str) {
        self.turns.on_speech_started(session_id);
    }

    pub fn speech_ended(&self, session_id: &str) {
        self.turns.on_speech_ended(session_id);
    }

    pub fn assistant_started(&self, session_id: &str) {
        self.turns.on_assistant_speaking_start(session_id);
    }

    pub fn assistant_ended(&self, session_id: &str) {
        self.turns.on_assistant_speaking_end(session_id);
    }

    /// Turn a silence event into something to say; `None` if the call is gone or over
    pub async fn silence_prompt(&self, event: &TurnEvent) -> Option<Prompt> {
        let (session_id, timed_out) = match event {
            TurnEvent::SilencePrompt { session_id } => (session_id, false),
            TurnEvent::SilenceTimeout { session_id } => (session_id, true),
        };

        let text = self
            .services
            .sessions
            .update(session_id, |s| {
                if s.conversation_ended {
                    return None;
                }
                let text = silence_text(&s.language, timed_out);
                s.push_turn(Speaker::Assistant, text);
                Some(text)
            })
            .await
            .flatten()?;

        Some(Prompt {
            session_id: session_id.clone(),
            text: text.to_string(),
        })
    }

    /// Tear down a call without waiting on in-flight work. Returns false if unknown.
    pub async fn end_call(&self, session_id: &str) -> bool {
        self.turns.end_session(session_id);
        self.services.prefetch.cancel(session_id);
        let removed = self.services.sessions.remove(session_id).await;

        match removed {
            Some(session) => {
                info!(
                    "Call {} ended after {} turns",
                    session_id,
                    session.turn_count()
                );
                true
            }
            None => false,
        }
    }

    pub async fn status(&self, session_id: &str) -> Option<CallStatus> {
        let session = self.services.sessions.stats(session_id).await?;
        let turn = self.turns.state(session_id).map(|state| TurnSnapshot {
            is_speaking: state.is_speaking,
            is_listening: state.is_listening,
            assistant_speaking: state.assistant_speaking,
            grace_period_active: state.grace_period_active,
            has_prompted_for_silence: state.has_prompted_for_silence,
            silence_ms: state
                .silence_started_at
                .map(|t| t.elapsed().as_millis() as u64),
            armed_timers: self.turns.armed_timers(session_id),
        });

        Some(CallStatus {
            session,
            turn,
            preloading: self.services.prefetch.is_preloading(session_id),
        })
    }

    pub async fn active_calls(&self) -> usize {
        self.services.sessions.len().await
    }
}

fn silence_text(language: &str, timed_out: bool) -> &'static str {
    let spanish = language.to_lowercase().starts_with("es");
    match (spanish, timed_out) {
        (false, false) => "Are you still there?",
        (false, true) => "I haven't heard anything for a while. I'm still here whenever you're ready.",
        (true, false) => "¿Sigue ahí?",
        (true, true) => "No he escuchado nada en un rato. Sigo aquí cuando esté listo.",
    }
}
