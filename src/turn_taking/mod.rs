//! Turn-taking and silence detection
//!
//! Each call moves between idle, caller speaking, silent, prompted and timed-out
//! states. Silence is only monitored while the assistant is quiet and outside its
//! post-speech grace period. Expired silence raises a [`TurnEvent`] on the
//! engine's channel; the caller of the engine decides what to say.

mod engine;
mod profile;

pub use engine::{TurnEvent, TurnState, TurnTakingEngine};
pub use profile::{TimingProfile, TimingProfiles};
