//! Conversation state machine
//!
//! A two-node graph run once per caller turn:
//! - **Agent**: prompt from recent transcript + cached appointments, one model call
//! - **Tool**: run each requested capability, one result message per call id
//!
//! After the agent node the router picks the tool node, the end of the call, or
//! the end of the turn. Mutating capabilities pass through the pending-edit
//! confirmation discipline before they run.

mod agent;
mod machine;
mod prompt;
mod router;
mod state;
mod tools;

pub use agent::{agent_step, flag_update, AgentOutput, FALLBACK_REPLY};
pub use machine::{ConversationEngine, TurnOutcome, FAREWELL};
pub use prompt::{history_messages, system_prompt};
pub use router::{route, Route};
pub use state::{ConversationFlags, FlagUpdate};
pub use tools::run_tools;
