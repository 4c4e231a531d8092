use super::client::{next_event, NatsClient};
use super::messages::CallEvent;
use crate::orchestrator::CallOrchestrator;
use crate::turn_taking::TurnEvent;
use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Something the call should say in response to an event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub call_id: String,
    pub text: String,
    pub end_call: bool,
}

/// Apply one call event to the orchestrator
pub async fn dispatch(orchestrator: &CallOrchestrator, event: CallEvent) -> Option<Reply> {
    match event {
        CallEvent::Started { .. } => {
            let config = event.session_config()?;
            let call_id = config.session_id.clone();
            if let Err(e) = orchestrator.start_call(config).await {
                error!("Failed to start call {}: {:#}", call_id, e);
            }
            None
        }
        CallEvent::SpeechStarted { call_id } => {
            orchestrator.speech_started(&call_id);
            None
        }
        CallEvent::SpeechEnded { call_id } => {
            orchestrator.speech_ended(&call_id);
            None
        }
        CallEvent::AssistantStarted { call_id } => {
            orchestrator.assistant_started(&call_id);
            None
        }
        CallEvent::AssistantEnded { call_id } => {
            orchestrator.assistant_ended(&call_id);
            None
        }
        CallEvent::Transcript { call_id, partial, .. } if partial => {
            debug!("Skipping partial transcript for {}", call_id);
            None
        }
        CallEvent::Transcript { call_id, text, .. } => {
            let outcome = orchestrator.handle_utterance(&call_id, &text).await;
            outcome.reply.map(|text| Reply {
                call_id,
                text,
                end_call: outcome.end_call,
            })
        }
        CallEvent::Hangup { call_id } => {
            orchestrator.end_call(&call_id).await;
            None
        }
    }
}

/// Consume call events until the subscription closes
///
/// Each call gets its own worker task fed in arrival order, so a slow model call
/// never holds up other calls and one call's events are never reordered.
pub async fn run_bridge(orchestrator: Arc<CallOrchestrator>, client: NatsClient) -> Result<()> {
    let mut subscriber = client.subscribe_events().await?;
    let mut workers: HashMap<String, mpsc::UnboundedSender<CallEvent>> = HashMap::new();

    info!("Call event bridge running");

    while let Some(event) = next_event(&mut subscriber).await {
        let call_id = event.call_id().to_string();
        let hangup = matches!(event, CallEvent::Hangup { .. });

        let worker = workers.entry(call_id.clone()).or_insert_with(|| {
            spawn_call_worker(orchestrator.clone(), client.clone(), call_id.clone())
        });
        if worker.send(event).is_err() {
            warn!("Worker for {} is gone, dropping event", call_id);
        }

        // The worker drains what it already has, then exits once the sender is dropped
        if hangup {
            workers.remove(&call_id);
        }
    }

    warn!("Call event subscription closed");
    Ok(())
}

/// Process one call's events strictly in the order they were received
fn spawn_call_worker(
    orchestrator: Arc<CallOrchestrator>,
    client: NatsClient,
    call_id: String,
) -> mpsc::UnboundedSender<CallEvent> {
    let (tx, mut rx) = mpsc::unbounded_channel::<CallEvent>();

    tokio::spawn(async move {
        debug!("Event worker started for {}", call_id);
        while let Some(event) = rx.recv().await {
            let Some(reply) = dispatch(&orchestrator, event).await else {
                continue;
            };
            if let Err(e) = client
                .publish_speech(&reply.call_id, &reply.text, reply.end_call)
                .await
            {
                error!("Failed to publish reply for {}: {:#}", reply.call_id, e);
            }
        }
        debug!("Event worker finished for {}", call_id);
    });

    tx
}

/// Speak silence prompts as turn-taking timers fire
pub async fn forward_silence_prompts(
    orchestrator: Arc<CallOrchestrator>,
    mut events: mpsc::UnboundedReceiver<TurnEvent>,
    client: Option<NatsClient>,
) {
    while let Some(event) = events.recv().await {
        let Some(prompt) = orchestrator.silence_prompt(&event).await else {
            continue;
        };

        match &client {
            Some(client) => {
                if let Err(e) = client
                    .publish_speech(&prompt.session_id, &prompt.text, false)
                    .await
                {
                    error!("Failed to publish prompt for {}: {:#}", prompt.session_id, e);
                }
            }
            None => info!("Silence prompt for {}: {}", prompt.session_id, prompt.text),
        }
    }
}
