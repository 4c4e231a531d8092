// Orchestrator: call lifecycle, silence prompts, status and teardown

mod common;

use common::*;
use loqa_calls::config::Config;
use loqa_calls::orchestrator::APOLOGY;
use loqa_calls::session::SessionConfig;
use loqa_calls::turn_taking::TurnEvent;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_unknown_call_gets_apology() {
    let h = started_call(Arc::new(ScriptedModel::new(vec![]))).await;

    let outcome = h.orchestrator.handle_utterance("call-missing", "hello").await;
    assert_eq!(outcome.reply.as_deref(), Some(APOLOGY));
    assert!(!outcome.end_call);
}

#[tokio::test]
async fn test_duplicate_start_is_rejected() {
    let h = started_call(Arc::new(ScriptedModel::new(vec![]))).await;

    let again = h
        .orchestrator
        .start_call(SessionConfig {
            session_id: CALL_ID.to_string(),
            caller: caller(),
            ..SessionConfig::default()
        })
        .await;
    assert!(again.is_err());
    assert_eq!(h.orchestrator.active_calls().await, 1);
}

#[tokio::test(start_paused = true)]
async fn test_silence_prompt_is_spoken_and_recorded() {
    let mut h = started_call(Arc::new(ScriptedModel::new(vec![]))).await;

    h.orchestrator.speech_started(CALL_ID);
    h.orchestrator.speech_ended(CALL_ID);

    // Default profile warns after 8s
    tokio::time::sleep(Duration::from_millis(8_100)).await;
    let event = h.turn_events.try_recv().unwrap();
    assert_eq!(
        event,
        TurnEvent::SilencePrompt {
            session_id: CALL_ID.to_string()
        }
    );

    let prompt = h.orchestrator.silence_prompt(&event).await.unwrap();
    assert_eq!(prompt.session_id, CALL_ID);
    assert_eq!(prompt.text, "Are you still there?");

    let stats = h.orchestrator.sessions().stats(CALL_ID).await.unwrap();
    assert_eq!(stats.turns, 1);
}

#[tokio::test]
async fn test_silence_prompt_follows_language() {
    let h = harness_with_model(Config::default(), Arc::new(ScriptedModel::new(vec![]))).await;
    h.orchestrator
        .start_call(SessionConfig {
            session_id: "call-es".to_string(),
            caller: caller(),
            language: "es-MX".to_string(),
            workflow_type: None,
        })
        .await
        .unwrap();

    let prompt = h
        .orchestrator
        .silence_prompt(&TurnEvent::SilenceTimeout {
            session_id: "call-es".to_string(),
        })
        .await
        .unwrap();
    assert!(prompt.text.starts_with("No he escuchado"));
}

#[tokio::test]
async fn test_no_prompt_once_conversation_ended() {
    let h = started_call(Arc::new(ScriptedModel::new(vec![say("Goodbye!")]))).await;

    let outcome = h.orchestrator.handle_utterance(CALL_ID, "bye").await;
    assert!(outcome.end_call);

    let prompt = h
        .orchestrator
        .silence_prompt(&TurnEvent::SilencePrompt {
            session_id: CALL_ID.to_string(),
        })
        .await;
    assert!(prompt.is_none());

    // Unknown calls are ignored too
    let prompt = h
        .orchestrator
        .silence_prompt(&TurnEvent::SilencePrompt {
            session_id: "call-gone".to_string(),
        })
        .await;
    assert!(prompt.is_none());
}

#[tokio::test]
async fn test_status_reports_session_and_turn_state() {
    let h = started_call(Arc::new(ScriptedModel::new(vec![]))).await;
    h.orchestrator
        .prefetch()
        .get_appointments(CALL_ID, &caller())
        .await;

    h.orchestrator.speech_started(CALL_ID);

    let status = h.orchestrator.status(CALL_ID).await.unwrap();
    assert_eq!(status.session.session_id, CALL_ID);
    assert_eq!(status.session.cached_appointments, 2);
    assert!(!status.session.has_pending_edit);

    let turn = status.turn.unwrap();
    assert!(turn.is_speaking);
    assert!(!turn.is_listening);
    assert_eq!(turn.armed_timers, 0);
}

#[tokio::test(start_paused = true)]
async fn test_end_call_tears_everything_down() {
    let mut h = started_call(Arc::new(ScriptedModel::new(vec![]))).await;

    h.orchestrator.speech_ended(CALL_ID);
    assert_eq!(h.orchestrator.turns().armed_timers(CALL_ID), 2);

    assert!(h.orchestrator.end_call(CALL_ID).await);
    assert!(h.orchestrator.status(CALL_ID).await.is_none());
    assert!(h.orchestrator.turns().state(CALL_ID).is_none());
    assert_eq!(h.orchestrator.active_calls().await, 0);

    // Cancelled timers never fire
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert!(h.turn_events.try_recv().is_err());

    assert!(!h.orchestrator.end_call(CALL_ID).await);
    let outcome = h.orchestrator.handle_utterance(CALL_ID, "hello?").await;
    assert_eq!(outcome.reply.as_deref(), Some(APOLOGY));
}
