use super::messages::{CallEvent, SpeakMessage, StaffNotification};
use crate::config::NatsConfig;
use crate::model::{ChatModel, ChatRequest, ModelReply};
use crate::notify::Notifier;
use anyhow::{Context, Result};
use async_nats::Client;
use futures::StreamExt;
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct NatsClient {
    client: Client,
    config: NatsConfig,
}

impl NatsClient {
    /// Connect to NATS server
    pub async fn connect(config: &NatsConfig) -> Result<Self> {
        info!("Connecting to NATS at {}", config.url);

        let client = async_nats::connect(config.url.as_str())
            .await
            .context("Failed to connect to NATS")?;

        info!("Connected to NATS successfully");

        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    pub fn config(&self) -> &NatsConfig {
        &self.config
    }

    /// Subscribe to call events for every call
    pub async fn subscribe_events(&self) -> Result<async_nats::Subscriber> {
        let subject = format!("{}.>", self.config.events_subject);

        info!("Subscribing to call events on {}", subject);

        let subscriber = self
            .client
            .subscribe(subject.clone())
            .await
            .context("Failed to subscribe to call events")?;

        info!("Subscribed to {}", subject);

        Ok(subscriber)
    }

    /// Publish text for a call to speak
    pub async fn publish_speech(&self, call_id: &str, text: &str, end_call: bool) -> Result<()> {
        let subject = format!("{}.{}", self.config.speech_subject, call_id);

        let message = SpeakMessage {
            call_id: call_id.to_string(),
            text: text.to_string(),
            end_call,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        let payload = serde_json::to_vec(&message)?;

        self.client
            .publish(subject.clone(), payload.into())
            .await
            .context("Failed to publish speech")?;

        debug!(
            "Published speech to {} (chars={}, end_call={})",
            subject,
            text.len(),
            end_call
        );

        Ok(())
    }

    /// Chat model served over request/reply
    pub fn chat_model(&self) -> NatsChatModel {
        NatsChatModel {
            client: self.client.clone(),
            subject: self.config.model_subject.clone(),
        }
    }

    pub fn notifier(&self) -> NatsNotifier {
        NatsNotifier {
            client: self.client.clone(),
            subject_prefix: self.config.notify_subject.clone(),
        }
    }
}

/// Decode a call event payload; malformed events are logged and skipped
pub fn decode_event(payload: &[u8]) -> Option<CallEvent> {
    match serde_json::from_slice(payload) {
        Ok(event) => Some(event),
        Err(e) => {
            warn!("Ignoring malformed call event: {}", e);
            None
        }
    }
}

/// Forwards chat requests to the model service on `model_subject`
pub struct NatsChatModel {
    client: Client,
    subject: String,
}

#[async_trait::async_trait]
impl ChatModel for NatsChatModel {
    async fn complete(&self, request: &ChatRequest) -> Result<ModelReply> {
        let payload = serde_json::to_vec(request)?;

        let message = self
            .client
            .request(self.subject.clone(), payload.into())
            .await
            .context("Model request failed")?;

        serde_json::from_slice(&message.payload).context("Invalid model reply")
    }
}

pub struct NatsNotifier {
    client: Client,
    subject_prefix: String,
}

#[async_trait::async_trait]
impl Notifier for NatsNotifier {
    async fn notify(&self, recipient: &str, message: &str) -> Result<()> {
        let subject = format!("{}.{}", self.subject_prefix, recipient);

        let notification = StaffNotification {
            recipient: recipient.to_string(),
            message: message.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        let payload = serde_json::to_vec(&notification)?;

        self.client
            .publish(subject, payload.into())
            .await
            .context("Failed to publish notification")?;

        Ok(())
    }
}

/// Drain a subscriber into decoded events
pub async fn next_event(subscriber: &mut async_nats::Subscriber) -> Option<CallEvent> {
    loop {
        let message = subscriber.next().await?;
        if let Some(event) = decode_event(&message.payload) {
            return Some(event);
        }
    }
}
