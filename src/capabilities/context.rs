use crate::audit::{AuditQueue, AuditRecord};
use crate::calendar::{Appointment, CalendarProvider, CallerInfo};
use crate::error::CapabilityError;
use crate::notify::Notifier;
use crate::prefetch::PrefetchCache;
use crate::session::{PendingEdit, SessionStore};
use crate::timer::race_with_timeout;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Upper bound on a staff notification before it is recorded as failed
const NOTIFY_TIMEOUT: Duration = Duration::from_secs(3);

/// Process-wide collaborators shared by every call
#[derive(Clone)]
pub struct CallServices {
    pub sessions: Arc<SessionStore>,
    pub calendar: Arc<dyn CalendarProvider>,
    pub prefetch: PrefetchCache,
    pub audit: AuditQueue,
    pub notifier: Arc<dyn Notifier>,
}

/// Everything a capability may touch for one invocation
#[derive(Clone)]
pub struct CapabilityContext {
    pub services: CallServices,
    pub session_id: String,
    pub caller: CallerInfo,
    /// Reference instant for relative dates, in the business time zone
    pub now: DateTime<FixedOffset>,
    /// Set by the tool node once a mutating capability's edit is confirmed
    pub confirmed_edit: Option<PendingEdit>,
}

impl CapabilityContext {
    pub fn today(&self) -> NaiveDate {
        self.now.date_naive()
    }

    pub fn confirmed_edit(&self) -> Result<&PendingEdit, CapabilityError> {
        self.confirmed_edit
            .as_ref()
            .filter(|edit| edit.is_ready())
            .ok_or_else(|| CapabilityError::Internal("edit has not been confirmed".to_string()))
    }

    /// Local date and time in the business time zone
    pub fn at(
        &self,
        date: Option<NaiveDate>,
        time: Option<NaiveTime>,
    ) -> Result<DateTime<FixedOffset>, CapabilityError> {
        let (Some(date), Some(time)) = (date, time) else {
            return Err(CapabilityError::InvalidArguments(
                "both a date and a time are required".to_string(),
            ));
        };
        self.now
            .offset()
            .from_local_datetime(&NaiveDateTime::new(date, time))
            .single()
            .ok_or_else(|| CapabilityError::InvalidArguments(format!("invalid time {} {}", date, time)))
    }

    /// Appointments for this call, served from the session cache when possible
    pub async fn appointments(&self) -> Vec<Appointment> {
        self.services
            .prefetch
            .get_appointments(&self.session_id, &self.caller)
            .await
    }

    pub async fn cached_appointment(&self, id: &str) -> Result<Appointment, CapabilityError> {
        self.services
            .sessions
            .read(&self.session_id, |s| {
                s.appointments().iter().find(|a| a.id == id).cloned()
            })
            .await
            .flatten()
            .ok_or_else(|| CapabilityError::NotFound(format!("appointment {}", id)))
    }

    /// Notify staff and record the outcome on the audit record. Never fails the mutation.
    pub async fn notify_staff(&self, record: &mut AuditRecord, recipient: &str, message: &str) {
        let delivered = match race_with_timeout(
            NOTIFY_TIMEOUT,
            self.services.notifier.notify(recipient, message),
        )
        .await
        {
            Some(Ok(())) => true,
            Some(Err(e)) => {
                warn!("Staff notification for {} failed: {:#}", self.session_id, e);
                record.errors.push(format!("notification failed: {:#}", e));
                false
            }
            None => {
                warn!("Staff notification for {} timed out", self.session_id);
                record.errors.push("notification timed out".to_string());
                false
            }
        };

        record.side_effect(
            "notification",
            json!({ "recipient": recipient, "delivered": delivered }),
        );
    }
}
