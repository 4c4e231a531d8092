// Conversation engine: tool routing, confirmation discipline, end-of-call handling

mod common;

use chrono::{Datelike, Timelike, Weekday};
use common::*;
use loqa_calls::audit::AuditOperation;
use loqa_calls::calendar::CalendarMutation;
use loqa_calls::conversation::{ConversationFlags, FALLBACK_REPLY, FAREWELL};
use loqa_calls::model::Role;
use loqa_calls::session::EditAction;
use serde_json::json;
use std::sync::Arc;

#[tokio::test]
async fn test_reschedule_reads_back_then_applies_on_yes() {
    let model = Arc::new(ScriptedModel::new(vec![
        call(
            "reschedule_appointment",
            json!({ "appointment": "dental", "date": "Friday", "time": "3pm" }),
        ),
        Step::EchoToolMessage,
    ]));
    let h = started_call(model.clone()).await;

    let first = h
        .orchestrator
        .handle_utterance(CALL_ID, "Can I move my dental appointment to Friday at 3pm?")
        .await;

    let read_back = first.reply.unwrap();
    assert!(read_back.contains("Dental"), "{}", read_back);
    assert!(read_back.contains("Friday"), "{}", read_back);
    assert!(read_back.contains("3:00 PM"), "{}", read_back);
    assert!(!first.end_call);
    assert_eq!(first.tool_rounds, 1);
    assert!(h.calendar.mutations().await.is_empty());

    model.push(vec![call("reschedule_appointment", json!({})), Step::EchoToolMessage]);
    let second = h.orchestrator.handle_utterance(CALL_ID, "Yes, please").await;

    let done = second.reply.unwrap();
    assert!(done.starts_with("Done."), "{}", done);

    let mutations = h.calendar.mutations().await;
    assert_eq!(mutations.len(), 1);
    match &mutations[0] {
        CalendarMutation::Update { id, start, end } => {
            assert_eq!(id, "evt-1");
            assert_eq!(start.date_time.weekday(), Weekday::Fri);
            assert_eq!(start.date_time.hour(), 15);
            assert_eq!((end.date_time - start.date_time).num_minutes(), 30);
        }
        other => panic!("unexpected mutation {:?}", other),
    }

    let pending = h
        .orchestrator
        .sessions()
        .read(CALL_ID, |s| s.pending_edit.clone())
        .await
        .unwrap();
    assert!(pending.is_none());

    let records = wait_for_audit(&h.audit_store, 1).await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].operation, AuditOperation::Update);
    assert!(records[0].before.is_some());
    assert!(records[0].after.is_some());
}

#[tokio::test]
async fn test_cancel_notifies_staff_and_audits() {
    let model = Arc::new(ScriptedModel::new(vec![
        call("cancel_appointment", json!({ "appointment": "business meeting" })),
        Step::EchoToolMessage,
        call("cancel_appointment", json!({})),
        Step::EchoToolMessage,
    ]));
    let h = started_call(model).await;

    let first = h
        .orchestrator
        .handle_utterance(CALL_ID, "I need to cancel the business meeting")
        .await;
    let read_back = first.reply.unwrap();
    assert!(read_back.contains("cancel Business Meeting"), "{}", read_back);

    let second = h.orchestrator.handle_utterance(CALL_ID, "yes").await;
    assert!(second.reply.unwrap().contains("has been cancelled"));

    assert_eq!(
        h.calendar.mutations().await,
        vec![CalendarMutation::Cancel {
            id: "evt-2".to_string()
        }]
    );

    let sent = h.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "front_desk");
    assert!(sent[0].1.contains("Dana"));

    let records = wait_for_audit(&h.audit_store, 1).await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].operation, AuditOperation::Cancel);
    assert!(records[0].success);
    assert_eq!(records[0].correlation_id, CALL_ID);
    assert_eq!(records[0].side_effects["notification"]["delivered"], json!(true));

    let remaining = h
        .orchestrator
        .sessions()
        .cached_appointments(CALL_ID)
        .await
        .unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, "evt-1");
}

#[tokio::test]
async fn test_date_without_time_asks_for_time() {
    let model = Arc::new(ScriptedModel::new(vec![
        call(
            "reschedule_appointment",
            json!({ "appointment": "dental", "date": "Friday" }),
        ),
        Step::EchoToolMessage,
    ]));
    let h = started_call(model.clone()).await;

    let outcome = h
        .orchestrator
        .handle_utterance(CALL_ID, "Move my dental appointment to Friday")
        .await;
    let reply = outcome.reply.unwrap();
    assert!(reply.starts_with("What time on Friday"), "{}", reply);
    assert!(h.calendar.mutations().await.is_empty());

    let pending = h
        .orchestrator
        .sessions()
        .read(CALL_ID, |s| s.pending_edit.clone())
        .await
        .flatten()
        .unwrap();
    assert_eq!(pending.action, EditAction::Reschedule);
    assert_eq!(pending.appointment_id.as_deref(), Some("evt-1"));
    assert!(pending.date.is_some());
    assert!(pending.time.is_none());
    assert!(!pending.awaiting_confirmation);

    // Supplying the time completes the edit but still needs a yes
    model.push(vec![
        call("reschedule_appointment", json!({ "time": "3pm" })),
        Step::EchoToolMessage,
    ]);
    let outcome = h.orchestrator.handle_utterance(CALL_ID, "3pm").await;
    assert!(outcome.reply.unwrap().starts_with("To confirm"));
    assert!(h.calendar.mutations().await.is_empty());
}

#[tokio::test]
async fn test_declined_confirmation_discards_edit() {
    let model = Arc::new(ScriptedModel::new(vec![
        call("cancel_appointment", json!({ "appointment": "dental" })),
        Step::EchoToolMessage,
        say("No problem, I'll leave it as is. Is there anything else I can help you with?"),
    ]));
    let h = started_call(model).await;

    h.orchestrator
        .handle_utterance(CALL_ID, "cancel my dental appointment")
        .await;
    h.orchestrator
        .handle_utterance(CALL_ID, "no, don't do that")
        .await;

    assert!(h.calendar.mutations().await.is_empty());
    let pending = h
        .orchestrator
        .sessions()
        .read(CALL_ID, |s| s.pending_edit.clone())
        .await
        .unwrap();
    assert!(pending.is_none());
}

#[tokio::test]
async fn test_changed_detail_requires_fresh_confirmation() {
    let model = Arc::new(ScriptedModel::new(vec![
        call(
            "reschedule_appointment",
            json!({ "appointment": "dental", "date": "Friday", "time": "3pm" }),
        ),
        Step::EchoToolMessage,
        // The caller says yes but the model passes a different time
        call("reschedule_appointment", json!({ "time": "4pm" })),
        Step::EchoToolMessage,
    ]));
    let h = started_call(model).await;

    h.orchestrator
        .handle_utterance(CALL_ID, "move dental to Friday at 3")
        .await;
    let outcome = h
        .orchestrator
        .handle_utterance(CALL_ID, "yes actually make it 4pm")
        .await;

    let reply = outcome.reply.unwrap();
    assert!(reply.contains("4:00 PM"), "{}", reply);
    assert!(h.calendar.mutations().await.is_empty());
}

#[tokio::test]
async fn test_unknown_capability_becomes_error_result() {
    let model = Arc::new(ScriptedModel::new(vec![
        call("teleport_caller", json!({ "to": "the moon" })),
        say("Sorry, I can't help with that. Is there anything else?"),
    ]));
    let h = started_call(model.clone()).await;

    let outcome = h.orchestrator.handle_utterance(CALL_ID, "beam me up").await;
    assert_eq!(
        outcome.reply.as_deref(),
        Some("Sorry, I can't help with that. Is there anything else?")
    );
    assert!(!outcome.end_call);

    let requests = model.requests();
    let result = requests[1]
        .messages
        .iter()
        .rev()
        .find(|m| m.role == Role::Tool)
        .unwrap();
    assert_eq!(result.tool_call_id.as_deref(), Some("call-teleport_caller-0"));
    assert!(result.content.contains("\"status\":\"error\""));
    assert!(result.content.contains("teleport_caller"));
}

#[tokio::test]
async fn test_every_tool_call_gets_a_result() {
    let model = Arc::new(ScriptedModel::new(vec![
        calls(&[
            ("list_appointments", json!({})),
            ("cancel_appointment", json!({ "appointment": "yoga" })),
        ]),
        say("You have a dental appointment and a business meeting."),
    ]));
    let h = started_call(model.clone()).await;

    h.orchestrator
        .handle_utterance(CALL_ID, "what do I have coming up?")
        .await;

    let requests = model.requests();
    let results: Vec<_> = requests[1]
        .messages
        .iter()
        .filter(|m| m.role == Role::Tool)
        .collect();
    assert_eq!(results.len(), 2);
    assert!(results[0].content.contains("\"count\":2"));
    assert!(results[1].content.contains("not_found"));
}

#[tokio::test]
async fn test_end_call_ends_conversation() {
    let model = Arc::new(ScriptedModel::new(vec![Step::Reply(
        loqa_calls::model::ModelReply {
            text: "Thanks for calling, have a great day!".to_string(),
            tool_calls: vec![loqa_calls::model::ToolCall {
                id: "c1".to_string(),
                name: "end_call".to_string(),
                arguments: json!({}),
            }],
        },
    )]));
    let h = started_call(model.clone()).await;

    let outcome = h.orchestrator.handle_utterance(CALL_ID, "that's all, thanks").await;
    assert_eq!(
        outcome.reply.as_deref(),
        Some("Thanks for calling, have a great day!")
    );
    assert!(outcome.end_call);

    // Later input is ignored without consulting the model
    let later = h.orchestrator.handle_utterance(CALL_ID, "oh wait one more thing").await;
    assert!(later.reply.is_none());
    assert!(later.end_call);
    assert_eq!(model.requests().len(), 1);
}

#[tokio::test]
async fn test_spoken_goodbye_ends_conversation() {
    let model = Arc::new(ScriptedModel::new(vec![say("You're all set. Goodbye!")]));
    let h = started_call(model).await;

    let outcome = h.orchestrator.handle_utterance(CALL_ID, "nope, that's it").await;
    assert!(outcome.end_call);

    let ended = h
        .orchestrator
        .sessions()
        .read(CALL_ID, |s| s.conversation_ended)
        .await
        .unwrap();
    assert!(ended);
}

#[tokio::test]
async fn test_model_failure_uses_fallback_reply() {
    let h = started_call(Arc::new(FailingModel)).await;

    let outcome = h.orchestrator.handle_utterance(CALL_ID, "hello?").await;
    assert_eq!(outcome.reply.as_deref(), Some(FALLBACK_REPLY));
    assert!(!outcome.end_call);
}

#[tokio::test]
async fn test_tool_rounds_are_bounded() {
    let steps = (0..10)
        .map(|_| call("list_appointments", json!({})))
        .collect();
    let model = Arc::new(ScriptedModel::new(steps));
    let h = started_call(model.clone()).await;

    let outcome = h.orchestrator.handle_utterance(CALL_ID, "list them").await;
    assert_eq!(outcome.tool_rounds, 4);
    assert!(outcome.reply.is_some());
    assert!(!outcome.end_call);
    assert_eq!(model.requests().len(), 5);
}

async fn flags(h: &Harness) -> ConversationFlags {
    h.orchestrator
        .sessions()
        .read(CALL_ID, |s| s.flags.clone())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_flags_track_completion_and_assistance() {
    let model = Arc::new(ScriptedModel::new(vec![
        call("cancel_appointment", json!({ "appointment": "dental" })),
        Step::EchoToolMessage,
        call("cancel_appointment", json!({})),
        Step::EchoToolMessage,
        say("Great."),
    ]));
    let h = started_call(model).await;

    h.orchestrator.handle_utterance(CALL_ID, "cancel dental").await;
    let after_first = flags(&h).await;
    assert!(after_first.task_completed);
    assert!(!after_first.assistance_offered);

    h.orchestrator.handle_utterance(CALL_ID, "yes").await;
    let after_second = flags(&h).await;
    assert!(after_second.assistance_offered);
    assert!(after_second.last_turn_offered);
    assert!(after_second.end_call_eligible);

    h.orchestrator.handle_utterance(CALL_ID, "no that's all").await;
    let after_third = flags(&h).await;
    assert!(after_third.is_response_to_assistance);
    assert!(!after_third.last_turn_offered);
}

#[tokio::test]
async fn test_prompt_carries_recent_history() {
    let model = Arc::new(ScriptedModel::new(vec![
        say("Hi Dana, how can I help?"),
        say("Sure."),
    ]));
    let h = started_call(model.clone()).await;

    h.orchestrator.handle_utterance(CALL_ID, "hello").await;
    h.orchestrator.handle_utterance(CALL_ID, "I have a question").await;

    let requests = model.requests();
    let last = &requests[1];
    assert!(last.system.contains("1. Dental"));
    assert!(last.system.contains("2. Business Meeting"));
    let texts: Vec<&str> = last.messages.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(texts, vec!["hello", "Hi Dana, how can I help?", "I have a question"]);
    assert!(last.tools.iter().any(|t| t.name == "end_call"));
}

async fn reschedule_read_back(h: &Harness) {
    let read_back = h
        .orchestrator
        .handle_utterance(CALL_ID, "Can I move my dental appointment to Friday at 3pm?")
        .await
        .reply
        .unwrap();
    assert!(read_back.starts_with("To confirm"), "{}", read_back);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_overlapping_confirmations_mutate_once() {
    let model = Arc::new(ScriptedModel::new(vec![
        call(
            "reschedule_appointment",
            json!({ "appointment": "dental", "date": "Friday", "time": "3pm" }),
        ),
        Step::EchoToolMessage,
    ]));
    let h = started_call(model.clone()).await;
    reschedule_read_back(&h).await;

    // Whichever turn takes the edit executes it; the other finds it spent
    model.push(vec![
        call("reschedule_appointment", json!({})),
        Step::EchoToolMessage,
        say("Is there anything else I can help you with?"),
    ]);
    h.calendar.set_mutation_delay(std::time::Duration::from_millis(50));

    let first = {
        let orchestrator = h.orchestrator.clone();
        tokio::spawn(async move { orchestrator.handle_utterance(CALL_ID, "yes").await })
    };
    let second = {
        let orchestrator = h.orchestrator.clone();
        tokio::spawn(async move { orchestrator.handle_utterance(CALL_ID, "yes please").await })
    };
    let first = first.await.unwrap();
    let second = second.await.unwrap();
    assert!(first.reply.is_some());
    assert!(second.reply.is_some());

    assert_eq!(h.calendar.mutations().await.len(), 1);
    assert_eq!(model.remaining(), 0);

    let records = wait_for_audit(&h.audit_store, 2).await;
    assert_eq!(records.len(), 1);
    assert!(records[0].success);
}

#[tokio::test]
async fn test_mutation_failing_before_calendar_is_audited() {
    let model = Arc::new(ScriptedModel::new(vec![
        call(
            "reschedule_appointment",
            json!({ "appointment": "dental", "date": "Friday", "time": "3pm" }),
        ),
        Step::EchoToolMessage,
        call("reschedule_appointment", json!({})),
        say("Sorry, I can't find that appointment anymore."),
    ]));
    let h = started_call(model).await;
    reschedule_read_back(&h).await;

    // The appointment disappears from the cache before the caller confirms
    h.orchestrator
        .sessions()
        .update(CALL_ID, |s| s.apply_cancelled_appointment("evt-1"))
        .await
        .unwrap();

    let outcome = h.orchestrator.handle_utterance(CALL_ID, "yes").await;
    assert!(outcome.reply.unwrap().starts_with("Sorry"));
    assert!(h.calendar.mutations().await.is_empty());

    let records = wait_for_audit(&h.audit_store, 1).await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].operation, AuditOperation::Update);
    assert!(!records[0].success);
    assert!(records[0].before.is_none());
    assert!(records[0].errors[0].contains("evt-1"), "{:?}", records[0].errors);
}

#[tokio::test]
async fn test_end_call_step_still_runs_confirmed_cancel() {
    let model = Arc::new(ScriptedModel::new(vec![
        call("cancel_appointment", json!({ "appointment": "business meeting" })),
        Step::EchoToolMessage,
        calls(&[("cancel_appointment", json!({})), ("end_call", json!({}))]),
    ]));
    let h = started_call(model).await;

    let read_back = h
        .orchestrator
        .handle_utterance(CALL_ID, "Please cancel the business meeting")
        .await
        .reply
        .unwrap();
    assert!(read_back.contains("cancel Business Meeting"), "{}", read_back);

    let outcome = h
        .orchestrator
        .handle_utterance(CALL_ID, "Yes, that's everything")
        .await;
    assert!(outcome.end_call);
    assert_eq!(outcome.reply.as_deref(), Some(FAREWELL));
    assert_eq!(outcome.tool_rounds, 1);

    assert_eq!(
        h.calendar.mutations().await,
        vec![CalendarMutation::Cancel {
            id: "evt-2".to_string()
        }]
    );
    let records = wait_for_audit(&h.audit_store, 1).await;
    assert_eq!(records[0].operation, AuditOperation::Cancel);
    assert!(records[0].success);
}
