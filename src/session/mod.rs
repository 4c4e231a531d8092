//! Call session management
//!
//! One [`CallSession`] per active call, keyed by the transport's call-stream id:
//! - Caller identity and negotiated language
//! - Capped conversation transcript
//! - Cached appointments (only overwritten by successful fetches)
//! - Pending partial edit awaiting details or confirmation
//! - Conversation-state flags

mod call;
mod config;
mod stats;
mod store;

pub use call::{CallSession, EditAction, MissingDetail, PendingEdit};
pub use config::SessionConfig;
pub use stats::{SessionStats, Speaker, TranscriptTurn};
pub use store::SessionStore;
