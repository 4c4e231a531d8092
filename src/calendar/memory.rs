use super::types::{Appointment, AppointmentDraft, CallerInfo, EventTime};
use super::CalendarProvider;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;

/// In-memory calendar keyed by caller phone
///
/// Records every mutation so callers can assert on what was invoked, and can be
/// told to fail or slow down fetches and mutations to simulate provider trouble.
#[derive(Default)]
pub struct MemoryCalendar {
    appointments: RwLock<HashMap<String, Vec<Appointment>>>,
    mutations: RwLock<Vec<CalendarMutation>>,
    fetches: AtomicUsize,
    fail_fetches: AtomicBool,
    fetch_delay_ms: AtomicU64,
    mutation_delay_ms: AtomicU64,
    next_id: AtomicU64,
}

/// A mutation the calendar received
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CalendarMutation {
    Create { id: String },
    Update { id: String, start: EventTime, end: EventTime },
    Cancel { id: String },
}

impl MemoryCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed(&self, phone: &str, appointments: Vec<Appointment>) {
        let mut map = self.appointments.write().await;
        map.insert(phone.to_string(), appointments);
    }

    pub async fn appointments_for(&self, phone: &str) -> Vec<Appointment> {
        let map = self.appointments.read().await;
        map.get(phone).cloned().unwrap_or_default()
    }

    pub async fn mutations(&self) -> Vec<CalendarMutation> {
        self.mutations.read().await.clone()
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn set_fail_fetches(&self, fail: bool) {
        self.fail_fetches.store(fail, Ordering::SeqCst);
    }

    pub fn set_fetch_delay(&self, delay: Duration) {
        self.fetch_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn set_mutation_delay(&self, delay: Duration) {
        self.mutation_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    async fn mutation_latency(&self) {
        let delay = self.mutation_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
    }
}

#[async_trait]
impl CalendarProvider for MemoryCalendar {
    async fn fetch_appointments(
        &self,
        caller: &CallerInfo,
        _force_refresh: bool,
    ) -> Result<Vec<Appointment>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);

        let delay = self.fetch_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        if self.fail_fetches.load(Ordering::SeqCst) {
            return Err(anyhow!("calendar provider unavailable"));
        }

        Ok(self.appointments_for(&caller.phone).await)
    }

    async fn create_appointment(
        &self,
        caller: &CallerInfo,
        draft: AppointmentDraft,
    ) -> Result<Appointment> {
        self.mutation_latency().await;
        let id = format!("appt-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let appointment = Appointment {
            id: id.clone(),
            summary: draft.summary,
            start: draft.start,
            end: draft.end,
        };

        {
            let mut map = self.appointments.write().await;
            map.entry(caller.phone.clone())
                .or_default()
                .push(appointment.clone());
        }
        self.mutations
            .write()
            .await
            .push(CalendarMutation::Create { id });

        Ok(appointment)
    }

    async fn update_appointment(
        &self,
        caller: &CallerInfo,
        appointment_id: &str,
        start: EventTime,
        end: EventTime,
    ) -> Result<Appointment> {
        self.mutation_latency().await;
        let updated = {
            let mut map = self.appointments.write().await;
            let appointment = map
                .get_mut(&caller.phone)
                .and_then(|list| list.iter_mut().find(|a| a.id == appointment_id))
                .ok_or_else(|| anyhow!("appointment {} not found", appointment_id))?;

            appointment.start = start.clone();
            appointment.end = end.clone();
            appointment.clone()
        };

        self.mutations.write().await.push(CalendarMutation::Update {
            id: appointment_id.to_string(),
            start,
            end,
        });

        Ok(updated)
    }

    async fn cancel_appointment(
        &self,
        caller: &CallerInfo,
        appointment_id: &str,
    ) -> Result<Appointment> {
        self.mutation_latency().await;
        let removed = {
            let mut map = self.appointments.write().await;
            let list = map
                .get_mut(&caller.phone)
                .ok_or_else(|| anyhow!("no calendar for {}", caller.phone))?;
            let index = list
                .iter()
                .position(|a| a.id == appointment_id)
                .ok_or_else(|| anyhow!("appointment {} not found", appointment_id))?;
            list.remove(index)
        };

        self.mutations.write().await.push(CalendarMutation::Cancel {
            id: appointment_id.to_string(),
        });

        Ok(removed)
    }
}
