use super::state::FlagUpdate;
use crate::capabilities::CapabilityRegistry;
use crate::model::{self, ChatModel, ChatRequest, ToolCall};
use crate::utterance::offers_assistance;
use std::time::Duration;

/// Spoken when the model is unreachable
pub const FALLBACK_REPLY: &str = "I'm sorry, I didn't quite catch that. Could you say it again?";

/// One agent node step
#[derive(Debug, Clone, PartialEq)]
pub struct AgentOutput {
    pub text: String,
    pub tool_calls: Vec<ToolCall>,
    /// The model failed and `text` is the fallback utterance
    pub degraded: bool,
}

/// Invoke the model; never fails
pub async fn agent_step(model: &dyn ChatModel, request: &ChatRequest, timeout: Duration) -> AgentOutput {
    match model::invoke(model, request, timeout).await {
        Some(reply) => AgentOutput {
            text: reply.text.trim().to_string(),
            tool_calls: reply.tool_calls,
            degraded: false,
        },
        None => AgentOutput {
            text: FALLBACK_REPLY.to_string(),
            tool_calls: Vec::new(),
            degraded: true,
        },
    }
}

/// Flags this output contributes to the conversation state
pub fn flag_update(output: &AgentOutput, registry: &CapabilityRegistry) -> FlagUpdate {
    FlagUpdate {
        task_completed: output
            .tool_calls
            .iter()
            .any(|call| registry.is_mutating(&call.name)),
        offers_assistance: offers_assistance(&output.text),
    }
}
