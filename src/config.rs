use anyhow::Result;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub nats: NatsConfig,
    pub turn_taking: TurnTakingConfig,
    pub prefetch: PrefetchConfig,
    pub audit: AuditConfig,
    pub conversation: ConversationConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "loqa-calls".to_string(),
            http: HttpConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 3030,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NatsConfig {
    pub url: String,
    /// Subject the telephony bridge publishes call events on (`<prefix>.<call_id>`)
    pub events_subject: String,
    /// Subject prefix for synthesized replies (`<prefix>.<call_id>`)
    pub speech_subject: String,
    /// Request/reply subject serving chat completions
    pub model_subject: String,
    /// Subject prefix for staff notifications (`<prefix>.<role>`)
    pub notify_subject: String,
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            url: "nats://localhost:4222".to_string(),
            events_subject: "calls.events".to_string(),
            speech_subject: "tts.speak".to_string(),
            model_subject: "llm.chat".to_string(),
            notify_subject: "notify.staff".to_string(),
        }
    }
}

/// Silence thresholds; `profiles` override the defaults per workflow type
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TurnTakingConfig {
    pub silence_ms: u64,
    pub timeout_ms: u64,
    pub grace_ms: u64,
    pub profiles: HashMap<String, TimingOverride>,
}

impl Default for TurnTakingConfig {
    fn default() -> Self {
        Self {
            silence_ms: 8_000,
            timeout_ms: 20_000,
            grace_ms: 1_500,
            profiles: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TimingOverride {
    pub silence_ms: Option<u64>,
    pub timeout_ms: Option<u64>,
    pub grace_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PrefetchConfig {
    /// Process-wide cap on concurrent calendar fetches
    pub max_concurrent: usize,
    pub timeout_ms: u64,
}

impl Default for PrefetchConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 3,
            timeout_ms: 4_000,
        }
    }
}

impl PrefetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub batch_size: usize,
    pub fallback_capacity: usize,
    pub max_retries: u32,
    pub retry_interval_ms: u64,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            fallback_capacity: 1_000,
            max_retries: 5,
            retry_interval_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConversationConfig {
    /// Transcript turns included in each model prompt
    pub history_turns: usize,
    /// Turns retained on the session
    pub transcript_cap: usize,
    /// Agent/tool round trips allowed within one caller turn
    pub max_tool_rounds: usize,
    pub model_timeout_ms: u64,
    /// Offset applied when the caller names a date/time without one, e.g. "-05:00"
    pub utc_offset: String,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            history_turns: 6,
            transcript_cap: 40,
            max_tool_rounds: 4,
            model_timeout_ms: 8_000,
            utc_offset: "+00:00".to_string(),
        }
    }
}

impl ConversationConfig {
    pub fn model_timeout(&self) -> Duration {
        Duration::from_millis(self.model_timeout_ms)
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("LOQA_CALLS").separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
