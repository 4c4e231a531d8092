use super::{string_arg, Capability, CapabilityContext};
use crate::audit::{AuditOperation, AuditRecord};
use crate::calendar::{Appointment, AppointmentDraft, EventTime};
use crate::error::CapabilityError;
use crate::notify::FRONT_DESK;
use crate::session::EditAction;
use chrono::Duration as ChronoDuration;
use serde_json::{json, Value};
use std::time::Instant;
use tracing::{error, info};

/// Length of appointments booked over the phone
const DEFAULT_BOOKING_MINUTES: i64 = 30;

fn selection_schema(action: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            "appointment": {
                "type": "string",
                "description": format!("Which appointment to {}, as the caller described it (title, position, or ordinal)", action)
            },
            "appointment_id": { "type": "string", "description": "Exact appointment id, if known" },
            "date": { "type": "string", "description": "New day as the caller said it, e.g. \"Friday\" or \"October 30\"" },
            "time": { "type": "string", "description": "New time as the caller said it, e.g. \"3pm\"" }
        }
    })
}

/// Write the audit record for a finished mutation and turn the outcome into a result
async fn finish_mutation(
    ctx: &CapabilityContext,
    mut record: AuditRecord,
    started: Instant,
    outcome: anyhow::Result<Appointment>,
    staff_message: impl FnOnce(&Appointment) -> String,
) -> Result<Appointment, CapabilityError> {
    let result = match outcome {
        Ok(appointment) => {
            record.success = true;
            let message = staff_message(&appointment);
            ctx.notify_staff(&mut record, FRONT_DESK, &message).await;
            Ok(appointment)
        }
        Err(e) => {
            error!(
                "Calendar {} failed for {}: {:#}",
                record.operation.as_str(),
                ctx.session_id,
                e
            );
            record.errors.push(format!("{:#}", e));
            Err(CapabilityError::Calendar(format!("{:#}", e)))
        }
    };

    record.duration_ms = started.elapsed().as_millis() as u64;
    let ack = ctx.services.audit.enqueue(record);
    info!("Audit record {} queued for {}", ack.id, ctx.session_id);

    result
}

/// Record a mutation that failed before reaching the calendar
fn abandon_mutation(
    ctx: &CapabilityContext,
    mut record: AuditRecord,
    started: Instant,
    err: CapabilityError,
) -> CapabilityError {
    error!(
        "Calendar {} abandoned for {}: {}",
        record.operation.as_str(),
        ctx.session_id,
        err
    );
    record.errors.push(err.to_string());
    record.duration_ms = started.elapsed().as_millis() as u64;
    let ack = ctx.services.audit.enqueue(record);
    info!("Audit record {} queued for {}", ack.id, ctx.session_id);
    err
}

fn caller_label(ctx: &CapabilityContext) -> String {
    match &ctx.caller.name {
        Some(name) => format!("{} ({})", name, ctx.caller.phone),
        None => ctx.caller.phone.clone(),
    }
}

// ============================================================================
// list_appointments
// ============================================================================

pub struct ListAppointments;

#[async_trait::async_trait]
impl Capability for ListAppointments {
    fn name(&self) -> &'static str {
        "list_appointments"
    }

    fn description(&self) -> &'static str {
        "List the caller's upcoming appointments."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "refresh": { "type": "boolean", "description": "Fetch again instead of using cached data" }
            }
        })
    }

    async fn execute(&self, ctx: &CapabilityContext, args: &Value) -> Result<Value, CapabilityError> {
        let refresh = args.get("refresh").and_then(Value::as_bool).unwrap_or(false);
        let appointments = if refresh {
            ctx.services
                .prefetch
                .refresh(&ctx.session_id, &ctx.caller)
                .await
        } else {
            ctx.appointments().await
        };

        let listed: Vec<Value> = appointments
            .iter()
            .enumerate()
            .map(|(i, a)| {
                json!({
                    "position": i + 1,
                    "id": a.id,
                    "summary": a.summary,
                    "when": a.describe(),
                })
            })
            .collect();

        Ok(json!({
            "status": "success",
            "count": listed.len(),
            "appointments": listed,
        }))
    }
}

// ============================================================================
// reschedule_appointment
// ============================================================================

pub struct RescheduleAppointment;

#[async_trait::async_trait]
impl Capability for RescheduleAppointment {
    fn name(&self) -> &'static str {
        "reschedule_appointment"
    }

    fn description(&self) -> &'static str {
        "Move one of the caller's appointments to a new date and time. Call it with whatever \
         details the caller gave; it asks for anything missing and for confirmation."
    }

    fn parameters(&self) -> Value {
        selection_schema("move")
    }

    fn edit_action(&self) -> Option<EditAction> {
        Some(EditAction::Reschedule)
    }

    async fn execute(&self, ctx: &CapabilityContext, _args: &Value) -> Result<Value, CapabilityError> {
        let mut record = AuditRecord::new(&ctx.session_id, AuditOperation::Update);
        let started = Instant::now();

        let prepared = async {
            let edit = ctx.confirmed_edit()?;
            let id = edit
                .appointment_id
                .clone()
                .ok_or_else(|| CapabilityError::InvalidArguments("no appointment selected".to_string()))?;
            let current = ctx.cached_appointment(&id).await?;
            let new_start = ctx.at(edit.date, edit.time)?;
            Ok::<_, CapabilityError>((id, current, new_start))
        }
        .await;
        let (id, current, new_start) = match prepared {
            Ok(prepared) => prepared,
            Err(e) => return Err(abandon_mutation(ctx, record, started, e)),
        };
        let (start, end) = current.shifted_to(new_start);
        record.before = serde_json::to_value(&current).ok();

        let outcome = ctx
            .services
            .calendar
            .update_appointment(&ctx.caller, &id, start, end)
            .await;

        if let Ok(updated) = &outcome {
            record.after = serde_json::to_value(updated).ok();
            ctx.services
                .sessions
                .update(&ctx.session_id, |s| s.apply_updated_appointment(updated))
                .await;
        }

        let who = caller_label(ctx);
        let updated = finish_mutation(ctx, record, started, outcome, |a| {
            format!("{} moved {} to {}", who, current.summary, a.start.date_time.format("%a %b %-d %-I:%M %p"))
        })
        .await?;

        Ok(json!({
            "status": "success",
            "message": format!("Done. Rescheduled: {}.", updated.describe()),
            "appointment": updated,
        }))
    }
}

// ============================================================================
// cancel_appointment
// ============================================================================

pub struct CancelAppointment;

#[async_trait::async_trait]
impl Capability for CancelAppointment {
    fn name(&self) -> &'static str {
        "cancel_appointment"
    }

    fn description(&self) -> &'static str {
        "Cancel one of the caller's appointments. Call it with the appointment the caller \
         named; it asks for confirmation before cancelling."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "appointment": {
                    "type": "string",
                    "description": "Which appointment to cancel, as the caller described it"
                },
                "appointment_id": { "type": "string", "description": "Exact appointment id, if known" }
            }
        })
    }

    fn edit_action(&self) -> Option<EditAction> {
        Some(EditAction::Cancel)
    }

    async fn execute(&self, ctx: &CapabilityContext, _args: &Value) -> Result<Value, CapabilityError> {
        let mut record = AuditRecord::new(&ctx.session_id, AuditOperation::Cancel);
        let started = Instant::now();

        let prepared = async {
            let edit = ctx.confirmed_edit()?;
            let id = edit
                .appointment_id
                .clone()
                .ok_or_else(|| CapabilityError::InvalidArguments("no appointment selected".to_string()))?;
            let current = ctx.cached_appointment(&id).await?;
            Ok::<_, CapabilityError>((id, current))
        }
        .await;
        let (id, current) = match prepared {
            Ok(prepared) => prepared,
            Err(e) => return Err(abandon_mutation(ctx, record, started, e)),
        };
        record.before = serde_json::to_value(&current).ok();

        let outcome = ctx
            .services
            .calendar
            .cancel_appointment(&ctx.caller, &id)
            .await;

        if outcome.is_ok() {
            ctx.services
                .sessions
                .update(&ctx.session_id, |s| s.apply_cancelled_appointment(&id))
                .await;
        }

        let who = caller_label(ctx);
        let cancelled = finish_mutation(ctx, record, started, outcome, |a| {
            format!("{} cancelled {}", who, a.describe())
        })
        .await?;

        Ok(json!({
            "status": "success",
            "message": format!("Done. {} has been cancelled.", cancelled.describe()),
        }))
    }
}

// ============================================================================
// book_appointment
// ============================================================================

pub struct BookAppointment;

#[async_trait::async_trait]
impl Capability for BookAppointment {
    fn name(&self) -> &'static str {
        "book_appointment"
    }

    fn description(&self) -> &'static str {
        "Book a new appointment for the caller. Call it with whatever details the caller gave; \
         it asks for anything missing and for confirmation."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "title": { "type": "string", "description": "What the appointment is for" },
                "date": { "type": "string", "description": "Day as the caller said it" },
                "time": { "type": "string", "description": "Time as the caller said it" }
            }
        })
    }

    fn edit_action(&self) -> Option<EditAction> {
        Some(EditAction::Book)
    }

    async fn execute(&self, ctx: &CapabilityContext, args: &Value) -> Result<Value, CapabilityError> {
        let mut record = AuditRecord::new(&ctx.session_id, AuditOperation::Create);
        let started = Instant::now();

        let prepared = async {
            let edit = ctx.confirmed_edit()?;
            let summary = edit
                .appointment_summary
                .clone()
                .or_else(|| string_arg(args, "title").map(str::to_string))
                .ok_or_else(|| CapabilityError::InvalidArguments("no title given".to_string()))?;
            let start = ctx.at(edit.date, edit.time)?;
            Ok::<_, CapabilityError>((summary, start))
        }
        .await;
        let (summary, start) = match prepared {
            Ok(prepared) => prepared,
            Err(e) => return Err(abandon_mutation(ctx, record, started, e)),
        };
        let draft = AppointmentDraft {
            summary,
            start: EventTime::new(start),
            end: EventTime::new(start + ChronoDuration::minutes(DEFAULT_BOOKING_MINUTES)),
        };

        let outcome = ctx
            .services
            .calendar
            .create_appointment(&ctx.caller, draft)
            .await;

        if let Ok(created) = &outcome {
            record.after = serde_json::to_value(created).ok();
            ctx.services
                .sessions
                .update(&ctx.session_id, |s| s.apply_updated_appointment(created))
                .await;
        }

        let who = caller_label(ctx);
        let created = finish_mutation(ctx, record, started, outcome, |a| {
            format!("{} booked {}", who, a.describe())
        })
        .await?;

        Ok(json!({
            "status": "success",
            "message": format!("Done. You're booked for {}.", created.describe()),
            "appointment": created,
        }))
    }
}
