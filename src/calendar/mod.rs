//! Calendar collaborator boundary
//!
//! The provider's API semantics live outside this crate. Everything here is the
//! contract the orchestration core depends on, plus an in-memory provider used by
//! the development binary and the tests.

mod memory;
mod types;

pub use memory::{CalendarMutation, MemoryCalendar};
pub use types::{Appointment, AppointmentDraft, CallerInfo, EventTime};

use anyhow::Result;
use async_trait::async_trait;

/// Calendar provider contract
#[async_trait]
pub trait CalendarProvider: Send + Sync {
    /// Upcoming appointments for the caller. `force_refresh` bypasses any provider-side cache.
    async fn fetch_appointments(
        &self,
        caller: &CallerInfo,
        force_refresh: bool,
    ) -> Result<Vec<Appointment>>;

    async fn create_appointment(
        &self,
        caller: &CallerInfo,
        draft: AppointmentDraft,
    ) -> Result<Appointment>;

    /// Move an appointment to a new start/end
    async fn update_appointment(
        &self,
        caller: &CallerInfo,
        appointment_id: &str,
        start: EventTime,
        end: EventTime,
    ) -> Result<Appointment>;

    /// Cancel an appointment, returning its final state
    async fn cancel_appointment(
        &self,
        caller: &CallerInfo,
        appointment_id: &str,
    ) -> Result<Appointment>;
}
