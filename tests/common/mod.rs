// Shared fixtures: scripted chat model, recording notifier, seeded orchestrator

#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::DateTime;
use loqa_calls::audit::{AuditRecord, MemoryAuditStore};
use loqa_calls::calendar::{Appointment, CallerInfo, EventTime, MemoryCalendar};
use loqa_calls::config::Config;
use loqa_calls::model::{ChatModel, ChatRequest, ModelReply, Role, ToolCall};
use loqa_calls::notify::Notifier;
use loqa_calls::orchestrator::CallOrchestrator;
use loqa_calls::session::SessionConfig;
use loqa_calls::turn_taking::TurnEvent;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

pub const CALL_ID: &str = "call-1";
pub const CALLER_PHONE: &str = "+15550100";

/// One scripted agent step
pub enum Step {
    /// Return this reply as-is
    Reply(ModelReply),
    /// Speak the `message` of the most recent capability result
    EchoToolMessage,
}

pub fn say(text: &str) -> Step {
    Step::Reply(ModelReply {
        text: text.to_string(),
        tool_calls: Vec::new(),
    })
}

pub fn call(name: &str, arguments: Value) -> Step {
    calls(&[(name, arguments)])
}

pub fn calls(requested: &[(&str, Value)]) -> Step {
    Step::Reply(ModelReply {
        text: String::new(),
        tool_calls: requested
            .iter()
            .enumerate()
            .map(|(i, (name, arguments))| ToolCall {
                id: format!("call-{}-{}", name, i),
                name: name.to_string(),
                arguments: arguments.clone(),
            })
            .collect(),
    })
}

/// Chat model that plays back a fixed script and records every request
pub struct ScriptedModel {
    steps: Mutex<VecDeque<Step>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedModel {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn push(&self, steps: Vec<Step>) {
        self.steps.lock().unwrap().extend(steps);
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn remaining(&self) -> usize {
        self.steps.lock().unwrap().len()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn complete(&self, request: &ChatRequest) -> Result<ModelReply> {
        self.requests.lock().unwrap().push(request.clone());

        let step = self
            .steps
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| anyhow!("script exhausted"))?;

        match step {
            Step::Reply(reply) => Ok(reply),
            Step::EchoToolMessage => {
                let result = request
                    .messages
                    .iter()
                    .rev()
                    .find(|m| m.role == Role::Tool)
                    .ok_or_else(|| anyhow!("no capability result to echo"))?;
                let value: Value = serde_json::from_str(&result.content)?;
                let mut text = value["message"].as_str().unwrap_or_default().to_string();
                if value["status"] == "success" {
                    text.push_str(" Is there anything else I can help you with?");
                }
                Ok(ModelReply {
                    text,
                    tool_calls: Vec::new(),
                })
            }
        }
    }
}

/// Model that is always down
pub struct FailingModel;

#[async_trait]
impl ChatModel for FailingModel {
    async fn complete(&self, _request: &ChatRequest) -> Result<ModelReply> {
        Err(anyhow!("model service unavailable"))
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, recipient: &str, message: &str) -> Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((recipient.to_string(), message.to_string()));
        Ok(())
    }
}

pub fn appointment(id: &str, summary: &str, start: &str, end: &str) -> Appointment {
    Appointment {
        id: id.to_string(),
        summary: summary.to_string(),
        start: EventTime::new(DateTime::parse_from_rfc3339(start).unwrap()),
        end: EventTime::new(DateTime::parse_from_rfc3339(end).unwrap()),
    }
}

/// Dental (30 min) then Business Meeting (1 h)
pub fn seeded_appointments() -> Vec<Appointment> {
    vec![
        appointment(
            "evt-1",
            "Dental",
            "2026-10-20T10:00:00+00:00",
            "2026-10-20T10:30:00+00:00",
        ),
        appointment(
            "evt-2",
            "Business Meeting",
            "2026-10-21T14:00:00+00:00",
            "2026-10-21T15:00:00+00:00",
        ),
    ]
}

pub fn caller() -> CallerInfo {
    CallerInfo {
        phone: CALLER_PHONE.to_string(),
        name: Some("Dana".to_string()),
        calendar_id: None,
    }
}

pub struct Harness {
    pub orchestrator: Arc<CallOrchestrator>,
    pub calendar: Arc<MemoryCalendar>,
    pub audit_store: Arc<MemoryAuditStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub turn_events: mpsc::UnboundedReceiver<TurnEvent>,
}

pub async fn harness_with_model(config: Config, model: Arc<dyn ChatModel>) -> Harness {
    let calendar = Arc::new(MemoryCalendar::new());
    calendar.seed(CALLER_PHONE, seeded_appointments()).await;

    let audit_store = Arc::new(MemoryAuditStore::new());
    let notifier = Arc::new(RecordingNotifier::default());

    let (orchestrator, turn_events) = CallOrchestrator::new(
        &config,
        calendar.clone(),
        model,
        audit_store.clone(),
        notifier.clone(),
    );

    Harness {
        orchestrator: Arc::new(orchestrator),
        calendar,
        audit_store,
        notifier,
        turn_events,
    }
}

/// Orchestrator with one started call, driven by `model`
pub async fn started_call(model: Arc<dyn ChatModel>) -> Harness {
    let harness = harness_with_model(Config::default(), model).await;
    harness
        .orchestrator
        .start_call(SessionConfig {
            session_id: CALL_ID.to_string(),
            caller: caller(),
            language: "en-US".to_string(),
            workflow_type: None,
        })
        .await
        .unwrap();
    harness
}

/// Wait until the audit store holds `count` records
pub async fn wait_for_audit(store: &MemoryAuditStore, count: usize) -> Vec<AuditRecord> {
    for _ in 0..100 {
        let records = store.records().await;
        if records.len() >= count {
            return records;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    store.records().await
}
