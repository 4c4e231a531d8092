use serde::{Deserialize, Serialize};

/// Conversation-state flags carried across agent turns
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationFlags {
    /// A mutating capability was invoked at some point in the call
    pub task_completed: bool,

    /// The assistant has offered further help ("anything else?")
    pub assistance_offered: bool,

    /// This turn answers the assistance offer made on the previous turn
    pub is_response_to_assistance: bool,

    /// The caller's request is done and help beyond it was offered
    pub end_call_eligible: bool,

    /// The most recent turn itself offered assistance
    #[serde(default)]
    pub last_turn_offered: bool,
}

/// What one agent turn contributed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlagUpdate {
    pub task_completed: bool,
    pub offers_assistance: bool,
}

impl ConversationFlags {
    /// Fold one turn into the running state
    pub fn merge(&self, update: FlagUpdate) -> Self {
        let task_completed = self.task_completed || update.task_completed;
        let assistance_offered = self.assistance_offered || update.offers_assistance;

        Self {
            task_completed,
            assistance_offered,
            is_response_to_assistance: self.last_turn_offered && !update.offers_assistance,
            end_call_eligible: self.end_call_eligible || (task_completed && assistance_offered),
            last_turn_offered: update.offers_assistance,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
