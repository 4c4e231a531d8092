use super::{string_arg, CapabilityContext};
use crate::calendar::Appointment;
use crate::error::CapabilityError;
use crate::matching::{match_appointment, MatchResult};
use crate::session::{EditAction, MissingDetail, PendingEdit};
use crate::utterance::{parse_date, parse_time};
use chrono::{NaiveDate, NaiveTime};
use serde_json::{json, Value};
use tracing::{debug, info};

/// Result of folding capability arguments into the pending edit
#[derive(Debug, Clone, PartialEq)]
pub enum Staged {
    /// Not executable yet; the value is the result message for the model
    Pending(Value),
    /// Every detail present and confirmed
    Ready(PendingEdit),
}

fn verb(action: EditAction) -> &'static str {
    match action {
        EditAction::Reschedule => "reschedule",
        EditAction::Cancel => "cancel",
        EditAction::Book => "book",
    }
}

fn spoken_date(date: NaiveDate) -> String {
    date.format("%A, %B %-d").to_string()
}

fn spoken_time(time: NaiveTime) -> String {
    time.format("%-I:%M %p").to_string()
}

fn numbered(appointments: &[Appointment]) -> Vec<String> {
    appointments
        .iter()
        .enumerate()
        .map(|(i, a)| format!("{}. {}", i + 1, a.describe()))
        .collect()
}

/// Sentence reading the change back to the caller
fn read_back(edit: &PendingEdit, appointments: &[Appointment]) -> String {
    let summary = edit.appointment_summary.as_deref().unwrap_or("the appointment");
    let when = match (edit.date, edit.time) {
        (Some(date), Some(time)) => format!("{} at {}", spoken_date(date), spoken_time(time)),
        _ => String::new(),
    };

    match edit.action {
        EditAction::Reschedule => format!(
            "To confirm: move {} to {}. Shall I go ahead?",
            summary, when
        ),
        EditAction::Cancel => {
            let current = edit
                .appointment_id
                .as_deref()
                .and_then(|id| appointments.iter().find(|a| a.id == id))
                .map(|a| a.describe())
                .unwrap_or_else(|| summary.to_string());
            format!("To confirm: cancel {}. Shall I go ahead?", current)
        }
        EditAction::Book => format!("To confirm: book {} on {}. Shall I go ahead?", summary, when),
    }
}

fn ask_for(missing: MissingDetail, edit: &PendingEdit, appointments: &[Appointment], unparsed: Option<&str>) -> String {
    match missing {
        MissingDetail::Appointment if appointments.is_empty() => {
            "I don't see any upcoming appointments on file for you.".to_string()
        }
        MissingDetail::Appointment => format!(
            "Which appointment would you like to {}? You have: {}",
            verb(edit.action),
            numbered(appointments).join("; ")
        ),
        MissingDetail::Title => "What is the new appointment for?".to_string(),
        MissingDetail::Date => match unparsed {
            Some(text) => format!("I didn't catch the day in \"{}\". What day works for you?", text),
            None => "What day works for you?".to_string(),
        },
        MissingDetail::Time => match (edit.date, unparsed) {
            (_, Some(text)) => format!("I didn't catch the time in \"{}\". What time works for you?", text),
            (Some(date), None) => format!("What time on {} works for you?", spoken_date(date)),
            (None, None) => "What time works for you?".to_string(),
        },
        MissingDetail::Confirmation => read_back(edit, appointments),
    }
}

fn missing_name(missing: MissingDetail) -> &'static str {
    match missing {
        MissingDetail::Appointment => "appointment",
        MissingDetail::Title => "title",
        MissingDetail::Date => "date",
        MissingDetail::Time => "time",
        MissingDetail::Confirmation => "confirmation",
    }
}

/// Fold arguments for a mutating capability into the session's pending edit
///
/// Partial information is kept on the session and answered with a request for the
/// missing piece. Complete but unconfirmed edits are read back and marked as awaiting
/// confirmation. Changing any detail clears an earlier confirmation.
pub async fn stage_edit(
    ctx: &CapabilityContext,
    action: EditAction,
    args: &Value,
) -> Result<Staged, CapabilityError> {
    let existing = ctx
        .services
        .sessions
        .read(&ctx.session_id, |s| s.pending_edit.clone())
        .await
        .ok_or_else(|| CapabilityError::Internal(format!("session {} not found", ctx.session_id)))?;

    let mut edit = existing
        .filter(|e| e.action == action)
        .unwrap_or_else(|| PendingEdit::new(action));
    let before = edit.clone();

    let appointments = if action == EditAction::Book {
        Vec::new()
    } else {
        ctx.appointments().await
    };

    if action == EditAction::Book {
        if let Some(title) = string_arg(args, "title") {
            edit.appointment_summary = Some(title.to_string());
        }
    } else if let Some(id) = string_arg(args, "appointment_id")
        .filter(|id| appointments.iter().any(|a| a.id == *id))
    {
        let summary = appointments.iter().find(|a| a.id == id).map(|a| a.summary.clone());
        edit.appointment_id = Some(id.to_string());
        edit.appointment_summary = summary;
    } else if let Some(selection) = string_arg(args, "appointment") {
        match match_appointment(selection, &appointments) {
            MatchResult::Found { index } => {
                edit.appointment_id = Some(appointments[index].id.clone());
                edit.appointment_summary = Some(appointments[index].summary.clone());
            }
            MatchResult::NotFound => {
                debug!("No appointment matches \"{}\" for {}", selection, ctx.session_id);
                return Ok(Staged::Pending(json!({
                    "status": "not_found",
                    "message": format!(
                        "I couldn't find an appointment matching \"{}\". You have: {}",
                        selection,
                        numbered(&appointments).join("; ")
                    ),
                })));
            }
        }
    }

    let mut unparsed = None;
    if action == EditAction::Cancel {
        // A cancellation targets the selected appointment's own slot
        let selected = edit
            .appointment_id
            .as_deref()
            .and_then(|id| appointments.iter().find(|a| a.id == id));
        if let Some(appointment) = selected {
            edit.date = Some(appointment.start.date_time.date_naive());
            edit.time = Some(appointment.start.date_time.time());
        }
    } else {
        for key in ["date", "time", "when"] {
            let Some(text) = string_arg(args, key) else {
                continue;
            };
            let date = parse_date(text, ctx.today());
            let time = parse_time(text);
            if date.is_none() && time.is_none() {
                unparsed = Some(text.to_string());
            }
            edit.date = date.or(edit.date);
            edit.time = time.or(edit.time);
        }
    }

    let details_changed = edit.appointment_id != before.appointment_id
        || edit.appointment_summary != before.appointment_summary
        || edit.date != before.date
        || edit.time != before.time;
    if details_changed {
        edit.awaiting_confirmation = false;
        edit.confirmation_received = false;
    }

    let result = if let Some(missing) = edit.missing_detail() {
        let message = ask_for(missing, &edit, &appointments, unparsed.as_deref());
        Staged::Pending(json!({
            "status": "need_more_info",
            "missing": missing_name(missing),
            "message": message,
        }))
    } else if !edit.confirmation_received {
        edit.awaiting_confirmation = true;
        info!("Awaiting confirmation to {} for {}", verb(action), ctx.session_id);
        Staged::Pending(json!({
            "status": "confirmation_required",
            "message": read_back(&edit, &appointments),
        }))
    } else {
        return Ok(Staged::Ready(edit));
    };

    ctx.services
        .sessions
        .update(&ctx.session_id, |s| s.pending_edit = Some(edit))
        .await;

    Ok(result)
}
