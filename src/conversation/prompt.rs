use crate::calendar::{Appointment, CallerInfo};
use crate::model::ChatMessage;
use crate::session::{PendingEdit, Speaker, TranscriptTurn};
use chrono::{DateTime, FixedOffset};
use std::fmt::Write;

/// Instructions, the caller's appointments, and any edit in progress
pub fn system_prompt(
    caller: &CallerInfo,
    language: &str,
    now: DateTime<FixedOffset>,
    appointments: &[Appointment],
    pending_edit: Option<&PendingEdit>,
) -> String {
    let mut prompt = String::new();

    prompt.push_str(
        "You are a friendly phone receptionist who manages the caller's appointments. \
         Keep replies short and conversational; they are spoken aloud.\n",
    );
    let _ = writeln!(prompt, "Reply in the caller's language ({}).", language);
    let _ = writeln!(prompt, "It is currently {}.", now.format("%A, %B %-d %Y, %-I:%M %p"));

    match &caller.name {
        Some(name) => {
            let _ = writeln!(prompt, "The caller is {} ({}).", name, caller.phone);
        }
        None => {
            let _ = writeln!(prompt, "The caller's number is {}.", caller.phone);
        }
    }

    prompt.push_str(
        "\nRules:\n\
         - To change or cancel an appointment, call the matching capability with whatever the caller said. \
           It will tell you what is missing or give you a sentence to read back for confirmation.\n\
         - Never claim a change is done until a capability reports success.\n\
         - After finishing a request, ask if there is anything else you can help with.\n\
         - When the caller has nothing else, say goodbye and call end_call.\n",
    );

    prompt.push_str("\nUpcoming appointments:\n");
    if appointments.is_empty() {
        prompt.push_str("(none on file)\n");
    }
    for (i, appointment) in appointments.iter().enumerate() {
        let _ = writeln!(prompt, "{}. {}", i + 1, appointment.describe());
    }

    if let Some(edit) = pending_edit {
        prompt.push_str("\nChange in progress: ");
        let _ = write!(prompt, "{:?}", edit.action);
        if let Some(summary) = &edit.appointment_summary {
            let _ = write!(prompt, " {}", summary);
        }
        if let Some(date) = edit.date {
            let _ = write!(prompt, " on {}", date.format("%A, %B %-d"));
        }
        if let Some(time) = edit.time {
            let _ = write!(prompt, " at {}", time.format("%-I:%M %p"));
        }
        if edit.confirmation_received {
            prompt.push_str(" (caller confirmed; call the capability again to apply it)");
        } else if edit.awaiting_confirmation {
            prompt.push_str(" (waiting for the caller to confirm)");
        }
        prompt.push('\n');
    }

    prompt
}

/// Transcript turns as chat history
pub fn history_messages(turns: &[TranscriptTurn]) -> Vec<ChatMessage> {
    turns
        .iter()
        .map(|turn| match turn.speaker {
            Speaker::Caller => ChatMessage::user(turn.text.clone()),
            Speaker::Assistant => ChatMessage::assistant(turn.text.clone()),
        })
        .collect()
}
