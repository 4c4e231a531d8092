pub mod audit;
pub mod calendar;
pub mod capabilities;
pub mod config;
pub mod conversation;
pub mod error;
pub mod http;
pub mod matching;
pub mod model;
pub mod nats;
pub mod notify;
pub mod orchestrator;
pub mod prefetch;
pub mod session;
pub mod timer;
pub mod turn_taking;
pub mod utterance;

pub use audit::{AuditQueue, AuditRecord, AuditStore, MemoryAuditStore};
pub use calendar::{Appointment, CalendarProvider, CallerInfo, MemoryCalendar};
pub use capabilities::{default_registry, Capability, CapabilityRegistry};
pub use config::Config;
pub use conversation::{ConversationEngine, TurnOutcome};
pub use error::{CallError, CapabilityError};
pub use http::{create_router, AppState};
pub use model::{ChatModel, OfflineModel};
pub use nats::{CallEvent, NatsClient};
pub use notify::{LogNotifier, Notifier};
pub use orchestrator::CallOrchestrator;
pub use session::{SessionConfig, SessionStats, SessionStore};
pub use turn_taking::{TurnEvent, TurnTakingEngine};
