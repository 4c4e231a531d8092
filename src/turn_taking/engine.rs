use super::profile::{TimingProfile, TimingProfiles};
use crate::timer::TimerSet;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Turn-taking flags for one call
#[derive(Debug, Clone, Default)]
pub struct TurnState {
    /// Caller is currently speaking
    pub is_speaking: bool,

    /// Silence monitoring is armed
    pub is_listening: bool,

    /// Assistant audio is currently playing
    pub assistant_speaking: bool,

    /// Assistant just stopped; silence is not monitored yet
    pub grace_period_active: bool,

    /// When the current silence clock started
    pub silence_started_at: Option<Instant>,

    /// The single silence warning was already emitted for this silence
    pub has_prompted_for_silence: bool,

    /// Selects the timing profile
    pub workflow_type: Option<String>,
}

/// Signals the engine raises when the caller stays silent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnEvent {
    /// Silence threshold elapsed; ask whether the caller is still there
    SilencePrompt { session_id: String },
    /// Timeout threshold elapsed; speak the timeout message
    SilenceTimeout { session_id: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum TimerKind {
    Silence,
    Timeout,
    Grace,
}

struct SessionTurns {
    state: TurnState,
    profile: TimingProfile,
    timers: TimerSet<TimerKind>,
    /// Bumped whenever timers are armed or cleared; callbacks from an older generation are ignored
    generation: u64,
}

impl SessionTurns {
    fn clear_timers(&mut self) {
        self.timers.cancel_all();
        self.generation += 1;
        self.state.is_listening = false;
        self.state.silence_started_at = None;
    }
}

struct Inner {
    profiles: TimingProfiles,
    sessions: Mutex<HashMap<String, SessionTurns>>,
    events: mpsc::UnboundedSender<TurnEvent>,
}

/// Per-call silence detection gated by assistant speech
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct TurnTakingEngine {
    inner: Arc<Inner>,
}

impl TurnTakingEngine {
    /// Create the engine and the receiver for its silence events
    pub fn new(profiles: TimingProfiles) -> (Self, mpsc::UnboundedReceiver<TurnEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let engine = Self {
            inner: Arc::new(Inner {
                profiles,
                sessions: Mutex::new(HashMap::new()),
                events,
            }),
        };
        (engine, rx)
    }

    /// Begin tracking a call. Re-registering an id resets its state.
    pub fn start_session(&self, session_id: &str, workflow_type: Option<&str>) {
        let profile = self.inner.profiles.resolve(workflow_type);
        let turns = SessionTurns {
            state: TurnState {
                workflow_type: workflow_type.map(str::to_string),
                ..TurnState::default()
            },
            profile,
            timers: TimerSet::new(),
            generation: 0,
        };

        self.inner.sessions.lock().insert(session_id.to_string(), turns);
        debug!("Turn tracking started for {} ({:?})", session_id, profile);
    }

    /// Stop tracking a call, cancelling every timer including the grace timer
    pub fn end_session(&self, session_id: &str) {
        let removed = self.inner.sessions.lock().remove(session_id);
        if let Some(mut turns) = removed {
            turns.clear_timers();
            debug!("Turn tracking ended for {}", session_id);
        }
    }

    pub fn state(&self, session_id: &str) -> Option<TurnState> {
        self.inner
            .sessions
            .lock()
            .get(session_id)
            .map(|t| t.state.clone())
    }

    pub fn profile(&self, session_id: &str) -> Option<TimingProfile> {
        self.inner.sessions.lock().get(session_id).map(|t| t.profile)
    }

    /// Number of pending timers for a call (0 for unknown calls)
    pub fn armed_timers(&self, session_id: &str) -> usize {
        self.inner
            .sessions
            .lock()
            .get(session_id)
            .map(|t| t.timers.armed_count())
            .unwrap_or(0)
    }

    /// Caller started speaking: clear all pending timers
    pub fn on_speech_started(&self, session_id: &str) {
        let mut sessions = self.inner.sessions.lock();
        let Some(turns) = sessions.get_mut(session_id) else {
            warn!("Speech start for unknown session {}", session_id);
            return;
        };

        turns.clear_timers();
        turns.state.is_speaking = true;
        turns.state.has_prompted_for_silence = false;
        turns.state.grace_period_active = false;
    }

    /// Caller stopped speaking: arm silence monitoring unless the assistant holds the floor
    pub fn on_speech_ended(&self, session_id: &str) {
        let mut sessions = self.inner.sessions.lock();
        let Some(turns) = sessions.get_mut(session_id) else {
            warn!("Speech end for unknown session {}", session_id);
            return;
        };

        turns.state.is_speaking = false;

        if turns.state.assistant_speaking || turns.state.grace_period_active {
            debug!(
                "Not monitoring silence for {} (assistant_speaking={}, grace={})",
                session_id, turns.state.assistant_speaking, turns.state.grace_period_active
            );
            return;
        }

        arm_silence_monitoring(&self.inner, session_id, turns);
    }

    pub fn on_assistant_speaking_start(&self, session_id: &str) {
        let mut sessions = self.inner.sessions.lock();
        let Some(turns) = sessions.get_mut(session_id) else {
            return;
        };

        turns.clear_timers();
        turns.state.assistant_speaking = true;
        turns.state.grace_period_active = false;
    }

    /// Assistant finished: start the grace period, after which silence monitoring
    /// resumes if the caller is still quiet
    pub fn on_assistant_speaking_end(&self, session_id: &str) {
        let mut sessions = self.inner.sessions.lock();
        let Some(turns) = sessions.get_mut(session_id) else {
            return;
        };

        turns.clear_timers();
        turns.state.assistant_speaking = false;
        turns.state.grace_period_active = true;

        let generation = turns.generation;
        let weak = Arc::downgrade(&self.inner);
        let id = session_id.to_string();
        turns
            .timers
            .schedule(TimerKind::Grace, turns.profile.grace, move || {
                on_grace_elapsed(weak, &id, generation);
            });
    }
}

fn arm_silence_monitoring(inner: &Arc<Inner>, session_id: &str, turns: &mut SessionTurns) {
    turns.timers.cancel(&TimerKind::Silence);
    turns.timers.cancel(&TimerKind::Timeout);
    turns.generation += 1;
    turns.state.is_listening = true;
    turns.state.silence_started_at = Some(Instant::now());

    let generation = turns.generation;

    let weak = Arc::downgrade(inner);
    let id = session_id.to_string();
    turns
        .timers
        .schedule(TimerKind::Silence, turns.profile.silence, move || {
            on_silence_elapsed(weak, &id, generation);
        });

    let weak = Arc::downgrade(inner);
    let id = session_id.to_string();
    turns
        .timers
        .schedule(TimerKind::Timeout, turns.profile.timeout, move || {
            on_timeout_elapsed(weak, &id, generation);
        });
}

fn on_grace_elapsed(inner: Weak<Inner>, session_id: &str, generation: u64) {
    let Some(inner) = inner.upgrade() else {
        return;
    };
    let mut sessions = inner.sessions.lock();
    let Some(turns) = sessions.get_mut(session_id) else {
        return;
    };
    if turns.generation != generation {
        return;
    }

    turns.timers.detach(&TimerKind::Grace);
    turns.state.grace_period_active = false;

    if !turns.state.is_speaking && !turns.state.assistant_speaking {
        arm_silence_monitoring(&inner, session_id, turns);
    }
}

fn on_silence_elapsed(inner: Weak<Inner>, session_id: &str, generation: u64) {
    let Some(inner) = inner.upgrade() else {
        return;
    };
    let mut sessions = inner.sessions.lock();
    let Some(turns) = sessions.get_mut(session_id) else {
        return;
    };
    if turns.generation != generation || turns.state.has_prompted_for_silence {
        return;
    }

    turns.state.has_prompted_for_silence = true;
    info!("Caller silent on {}, prompting", session_id);
    let _ = inner.events.send(TurnEvent::SilencePrompt {
        session_id: session_id.to_string(),
    });
}

fn on_timeout_elapsed(inner: Weak<Inner>, session_id: &str, generation: u64) {
    let Some(inner) = inner.upgrade() else {
        return;
    };
    let mut sessions = inner.sessions.lock();
    let Some(turns) = sessions.get_mut(session_id) else {
        return;
    };
    if turns.generation != generation {
        return;
    }

    info!("Caller silence timed out on {}", session_id);
    let _ = inner.events.send(TurnEvent::SilenceTimeout {
        session_id: session_id.to_string(),
    });

    // Restart the silence clock; this callback owns the timeout slot
    turns.timers.detach(&TimerKind::Timeout);
    turns.state.has_prompted_for_silence = false;
    arm_silence_monitoring(&inner, session_id, turns);
}
