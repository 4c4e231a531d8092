use super::agent::{agent_step, flag_update, FALLBACK_REPLY};
use super::prompt::{history_messages, system_prompt};
use super::router::{is_terminal_call, route, Route};
use super::tools::run_tools;
use crate::capabilities::{CallServices, CapabilityContext, CapabilityRegistry};
use crate::config::ConversationConfig;
use crate::error::CallError;
use crate::model::{ChatMessage, ChatModel, ChatRequest};
use crate::session::Speaker;
use crate::utterance::{classify_confirmation, Confirmation};
use chrono::{DateTime, FixedOffset, Offset, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Spoken when the model ends the call without saying anything
pub const FAREWELL: &str = "Thank you for calling. Goodbye!";

/// Spoken when the tool round limit is hit without a reply
const ROUND_LIMIT_REPLY: &str = "Sorry, that took longer than expected. Could you tell me again what you'd like to do?";

/// Result of one caller turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TurnOutcome {
    /// Text to speak; `None` when the conversation had already ended
    pub reply: Option<String>,
    /// The conversation is over; the transport should hang up after speaking
    pub end_call: bool,
    /// Tool node runs during this turn
    pub tool_rounds: usize,
}

/// Drives the agent/tool graph for one caller turn at a time
pub struct ConversationEngine {
    services: CallServices,
    registry: Arc<CapabilityRegistry>,
    model: Arc<dyn ChatModel>,
    config: ConversationConfig,
    offset: FixedOffset,
}

impl ConversationEngine {
    pub fn new(
        services: CallServices,
        registry: Arc<CapabilityRegistry>,
        model: Arc<dyn ChatModel>,
        config: ConversationConfig,
    ) -> Self {
        let offset = config.utc_offset.parse::<FixedOffset>().unwrap_or_else(|_| {
            warn!("Invalid utc_offset {:?}, using UTC", config.utc_offset);
            Utc.fix()
        });

        Self {
            services,
            registry,
            model,
            config,
            offset,
        }
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    pub fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.offset)
    }

    /// Process one final caller utterance and produce the reply
    ///
    /// Only a missing session is an error; every other failure degrades to a spoken reply.
    /// Turns for the same call run one at a time, in the order they arrive at the lock.
    pub async fn run_turn(&self, session_id: &str, utterance: &str) -> Result<TurnOutcome, CallError> {
        let lock = self
            .services
            .sessions
            .turn_lock(session_id)
            .await
            .ok_or_else(|| CallError::SessionNotFound(session_id.to_string()))?;
        let _turn = lock.lock().await;

        let confirmation = classify_confirmation(utterance);

        let started = self
            .services
            .sessions
            .update(session_id, |s| {
                if s.conversation_ended {
                    return None;
                }
                s.push_turn(Speaker::Caller, utterance);

                let awaiting = s
                    .pending_edit
                    .as_ref()
                    .map(|e| e.awaiting_confirmation)
                    .unwrap_or(false);
                if awaiting {
                    match confirmation {
                        Confirmation::Affirmative => {
                            if let Some(edit) = s.pending_edit.as_mut() {
                                edit.confirmation_received = true;
                            }
                        }
                        Confirmation::Negative => s.pending_edit = None,
                        Confirmation::Unclear => {}
                    }
                }
                Some(s.caller.clone())
            })
            .await
            .ok_or_else(|| CallError::SessionNotFound(session_id.to_string()))?;

        let Some(caller) = started else {
            debug!("Ignoring utterance for ended conversation {}", session_id);
            return Ok(TurnOutcome {
                reply: None,
                end_call: true,
                tool_rounds: 0,
            });
        };

        // Make sure the cache is warm before the first prompt is built
        self.services
            .prefetch
            .get_appointments(session_id, &caller)
            .await;

        let ctx = CapabilityContext {
            services: self.services.clone(),
            session_id: session_id.to_string(),
            caller,
            now: self.now(),
            confirmed_edit: None,
        };

        let mut working: Vec<ChatMessage> = Vec::new();
        let mut tool_rounds = 0;
        let mut end_call = false;

        let reply = loop {
            let request = self.build_request(&ctx, &working).await?;
            let output = agent_step(self.model.as_ref(), &request, self.config.model_timeout()).await;

            let update = flag_update(&output, &self.registry);
            self.services
                .sessions
                .update(session_id, |s| s.flags = s.flags.merge(update))
                .await;

            match route(&output, &self.registry) {
                Route::End => {
                    // Work requested alongside the hang-up still runs before the call ends
                    let remaining: Vec<_> = output
                        .tool_calls
                        .iter()
                        .filter(|call| !is_terminal_call(call, &self.registry))
                        .cloned()
                        .collect();
                    if !remaining.is_empty() {
                        tool_rounds += 1;
                        run_tools(&ctx, &self.registry, &remaining).await;
                    }

                    end_call = true;
                    break if output.text.is_empty() {
                        FAREWELL.to_string()
                    } else {
                        output.text
                    };
                }
                Route::AwaitInput => break output.text,
                Route::Tools if tool_rounds >= self.config.max_tool_rounds => {
                    warn!(
                        "Tool round limit ({}) reached for {}",
                        self.config.max_tool_rounds, session_id
                    );
                    break if output.text.is_empty() {
                        ROUND_LIMIT_REPLY.to_string()
                    } else {
                        output.text
                    };
                }
                Route::Tools => {
                    tool_rounds += 1;
                    let results = run_tools(&ctx, &self.registry, &output.tool_calls).await;
                    working.push(ChatMessage::assistant_with_calls(output.text, output.tool_calls));
                    working.extend(results);
                }
            }
        };

        let reply = if reply.is_empty() {
            FALLBACK_REPLY.to_string()
        } else {
            reply
        };

        self.services
            .sessions
            .update(session_id, |s| {
                s.push_turn(Speaker::Assistant, reply.clone());
                if end_call {
                    s.conversation_ended = true;
                }
            })
            .await;

        if end_call {
            info!("Conversation {} ended by the assistant", session_id);
        }

        Ok(TurnOutcome {
            reply: Some(reply),
            end_call,
            tool_rounds,
        })
    }

    async fn build_request(
        &self,
        ctx: &CapabilityContext,
        working: &[ChatMessage],
    ) -> Result<ChatRequest, CallError> {
        let history = self.config.history_turns.max(1);
        let (system, mut messages) = self
            .services
            .sessions
            .read(&ctx.session_id, |s| {
                let system = system_prompt(
                    &s.caller,
                    &s.language,
                    ctx.now,
                    s.appointments(),
                    s.pending_edit.as_ref(),
                );
                (system, history_messages(&s.recent_turns(history)))
            })
            .await
            .ok_or_else(|| CallError::SessionNotFound(ctx.session_id.clone()))?;

        messages.extend_from_slice(working);

        Ok(ChatRequest {
            system,
            messages,
            tools: self.registry.specs(),
        })
    }
}
