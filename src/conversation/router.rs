use super::agent::AgentOutput;
use crate::capabilities::{CapabilityRegistry, END_CALL};
use crate::model::ToolCall;
use crate::utterance::is_goodbye;

/// Where the graph goes after the agent node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Run the requested capabilities, then return to the agent
    Tools,
    /// End the conversation
    End,
    /// Speak and wait for the caller
    AwaitInput,
}

pub fn is_terminal_call(call: &ToolCall, registry: &CapabilityRegistry) -> bool {
    call.name == END_CALL || registry.is_terminal(&call.name)
}

/// A terminal invocation wins over any others in the same step. The caller of
/// `route` still runs the non-terminal ones before ending.
pub fn route(output: &AgentOutput, registry: &CapabilityRegistry) -> Route {
    if !output.tool_calls.is_empty() {
        let terminal = output
            .tool_calls
            .iter()
            .any(|call| is_terminal_call(call, registry));
        return if terminal { Route::End } else { Route::Tools };
    }

    if is_goodbye(&output.text) {
        Route::End
    } else {
        Route::AwaitInput
    }
}
