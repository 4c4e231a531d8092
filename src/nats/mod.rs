//! NATS transport
//!
//! - Call events in from the telephony bridge
//! - Replies and silence prompts out to speech synthesis
//! - Chat completions over request/reply
//! - Staff notifications

pub mod bridge;
pub mod client;
pub mod messages;

pub use bridge::{dispatch, forward_silence_prompts, run_bridge, Reply};
pub use client::{decode_event, NatsChatModel, NatsClient, NatsNotifier};
pub use messages::{CallEvent, SpeakMessage, StaffNotification};
