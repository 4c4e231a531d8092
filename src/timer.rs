//! Cancellable timers and a soft timeout race
//!
//! Timers are spawned tokio tasks that sleep and then run a callback. Every timer
//! lives under a key; re-scheduling a key replaces the previous timer, and
//! cancellation is idempotent. Dropping a [`TimerSet`] cancels everything it owns.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::time::Duration;
use tokio::task::JoinHandle;

/// A set of keyed, cancellable timers
#[derive(Debug)]
pub struct TimerSet<K: Eq + Hash> {
    timers: HashMap<K, JoinHandle<()>>,
}

impl<K: Eq + Hash> TimerSet<K> {
    pub fn new() -> Self {
        Self {
            timers: HashMap::new(),
        }
    }

    /// Run `callback` after `delay`, replacing any timer already under `key`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn schedule<F>(&mut self, key: K, delay: Duration, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            callback();
        });

        if let Some(previous) = self.timers.insert(key, handle) {
            previous.abort();
        }
    }

    /// Cancel the timer under `key`. Returns whether a pending timer was aborted.
    pub fn cancel(&mut self, key: &K) -> bool {
        match self.timers.remove(key) {
            Some(handle) => {
                let pending = !handle.is_finished();
                handle.abort();
                pending
            }
            None => false,
        }
    }

    /// Forget the timer under `key` without aborting it.
    ///
    /// Used by a callback that re-arms its own key while still running.
    pub fn detach(&mut self, key: &K) {
        self.timers.remove(key);
    }

    pub fn cancel_all(&mut self) {
        for (_, handle) in self.timers.drain() {
            handle.abort();
        }
    }

    pub fn is_armed(&self, key: &K) -> bool {
        self.timers
            .get(key)
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    /// Number of timers that have not fired yet
    pub fn armed_count(&self) -> usize {
        self.timers.values().filter(|h| !h.is_finished()).count()
    }
}

impl<K: Eq + Hash> Default for TimerSet<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash> Drop for TimerSet<K> {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

/// Race `future` against `limit`.
///
/// Returns `None` when the limit elapses first; the future is dropped.
pub async fn race_with_timeout<F>(limit: Duration, future: F) -> Option<F::Output>
where
    F: Future,
{
    tokio::time::timeout(limit, future).await.ok()
}
