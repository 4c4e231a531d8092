use crate::calendar::{Appointment, CalendarProvider, CallerInfo};
use crate::config::PrefetchConfig;
use crate::session::SessionStore;
use crate::timer::race_with_timeout;
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

type PreloadFuture = Shared<BoxFuture<'static, Vec<Appointment>>>;

/// An in-flight preload
struct PendingPreload {
    id: u64,
    future: PreloadFuture,
    driver: JoinHandle<()>,
    started_at: Instant,
}

/// Per-session appointment preloading with a global concurrency budget
///
/// Cheap to clone; clones share the budget and in-flight table.
#[derive(Clone)]
pub struct PrefetchCache {
    calendar: Arc<dyn CalendarProvider>,
    sessions: Arc<SessionStore>,
    budget: Arc<Semaphore>,
    max_concurrent: usize,
    timeout: Duration,
    pending: Arc<Mutex<HashMap<String, PendingPreload>>>,
    next_id: Arc<AtomicU64>,
}

impl PrefetchCache {
    pub fn new(
        calendar: Arc<dyn CalendarProvider>,
        sessions: Arc<SessionStore>,
        config: &PrefetchConfig,
    ) -> Self {
        let max_concurrent = config.max_concurrent.max(1);
        Self {
            calendar,
            sessions,
            budget: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
            timeout: config.timeout(),
            pending: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Fetches currently holding a budget slot
    pub fn active_preloads(&self) -> usize {
        self.max_concurrent - self.budget.available_permits()
    }

    /// Preloads registered but not yet settled (including those waiting for budget)
    pub fn pending_preloads(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_preloading(&self, session_id: &str) -> bool {
        self.pending.lock().contains_key(session_id)
    }

    /// How long the in-flight preload for a session has been running
    pub fn preload_age(&self, session_id: &str) -> Option<Duration> {
        self.pending
            .lock()
            .get(session_id)
            .map(|p| p.started_at.elapsed())
    }

    /// Return cached appointments if present, join an in-flight preload, or start one.
    ///
    /// Never fails: a failed or timed-out fetch yields whatever was cached before.
    pub async fn start_preloading(&self, session_id: &str, caller: &CallerInfo) -> Vec<Appointment> {
        if let Some(cached) = self.cached(session_id).await {
            return cached;
        }
        self.preload(session_id, caller, false).await
    }

    /// Appointments for the conversation turn, in priority order:
    /// session cache, in-flight preload, new preload.
    pub async fn get_appointments(&self, session_id: &str, caller: &CallerInfo) -> Vec<Appointment> {
        if let Some(cached) = self.cached(session_id).await {
            return cached;
        }

        let in_flight = self.pending.lock().get(session_id).map(|p| p.future.clone());
        if let Some(future) = in_flight {
            debug!("Awaiting in-flight preload for {}", session_id);
            let appointments = future.await;
            if !appointments.is_empty() {
                return appointments;
            }
        }

        self.preload(session_id, caller, false).await
    }

    /// Fetch again even if the cache is populated. A failure keeps the cached list.
    pub async fn refresh(&self, session_id: &str, caller: &CallerInfo) -> Vec<Appointment> {
        self.preload(session_id, caller, true).await
    }

    /// Drop the in-flight preload for an ending call without waiting for it
    pub fn cancel(&self, session_id: &str) {
        if let Some(pending) = self.pending.lock().remove(session_id) {
            pending.driver.abort();
            debug!("Cancelled preload {} for {}", pending.id, session_id);
        }
    }

    async fn cached(&self, session_id: &str) -> Option<Vec<Appointment>> {
        self.sessions
            .cached_appointments(session_id)
            .await
            .filter(|list| !list.is_empty())
    }

    fn preload(
        &self,
        session_id: &str,
        caller: &CallerInfo,
        force_refresh: bool,
    ) -> PreloadFuture {
        let mut pending = self.pending.lock();
        if let Some(existing) = pending.get(session_id) {
            return existing.future.clone();
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let future = self
            .clone()
            .run_preload(id, session_id.to_string(), caller.clone(), force_refresh)
            .boxed()
            .shared();

        // Drive the fetch even if every awaiting caller goes away
        let driver = tokio::spawn(future.clone().map(|_| ()));

        pending.insert(
            session_id.to_string(),
            PendingPreload {
                id,
                future: future.clone(),
                driver,
                started_at: Instant::now(),
            },
        );

        future
    }

    async fn run_preload(
        self,
        id: u64,
        session_id: String,
        caller: CallerInfo,
        force_refresh: bool,
    ) -> Vec<Appointment> {
        let guard = PendingGuard {
            pending: Arc::clone(&self.pending),
            session_id: session_id.clone(),
            id,
        };

        let permit = match Arc::clone(&self.budget).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => return self.fallback(&session_id).await,
        };

        let started = Instant::now();
        let fetched = race_with_timeout(
            self.timeout,
            self.calendar.fetch_appointments(&caller, force_refresh),
        )
        .await;
        drop(permit);

        let result = match fetched {
            Some(Ok(appointments)) => {
                info!(
                    "Preloaded {} appointments for {} in {}ms",
                    appointments.len(),
                    session_id,
                    started.elapsed().as_millis()
                );
                self.sessions
                    .store_fetched_appointments(&session_id, appointments.clone())
                    .await;
                appointments
            }
            Some(Err(e)) => {
                warn!("Calendar fetch failed for {}: {:#}", session_id, e);
                self.fallback(&session_id).await
            }
            None => {
                warn!(
                    "Calendar fetch for {} timed out after {}ms",
                    session_id,
                    self.timeout.as_millis()
                );
                self.fallback(&session_id).await
            }
        };

        drop(guard);
        result
    }

    /// Last known good data for a session (possibly empty)
    async fn fallback(&self, session_id: &str) -> Vec<Appointment> {
        self.sessions
            .cached_appointments(session_id)
            .await
            .unwrap_or_default()
    }
}

/// Removes the pending entry when the preload settles or is dropped
struct PendingGuard {
    pending: Arc<Mutex<HashMap<String, PendingPreload>>>,
    session_id: String,
    id: u64,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        let mut pending = self.pending.lock();
        if pending.get(&self.session_id).map(|p| p.id) == Some(self.id) {
            pending.remove(&self.session_id);
        }
    }
}
