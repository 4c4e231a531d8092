use super::record::{AuditRecord, EnqueueAck, MetricsSummary, PerformanceMetric};
use super::AuditStore;
use crate::config::AuditConfig;
use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Snapshot of queue health
#[derive(Debug, Clone, Serialize)]
pub struct QueueStatus {
    pub primary: usize,
    pub fallback: usize,
    pub persisted: u64,
    pub dropped: u64,
    pub draining: bool,
}

struct QueueInner {
    store: Arc<dyn AuditStore>,
    config: AuditConfig,
    primary: Mutex<VecDeque<AuditRecord>>,
    fallback: Mutex<VecDeque<AuditRecord>>,
    draining: AtomicBool,
    persisted: AtomicU64,
    dropped: AtomicU64,
}

/// Non-blocking audit writer
///
/// `enqueue` only touches memory. A background drain writes batches to the store;
/// when a write fails the affected records move to a bounded fallback queue that is
/// retried once the primary queue is empty and the store is reachable again.
/// The fallback queue keeps its oldest records: once full, newly failed records are
/// dropped.
#[derive(Clone)]
pub struct AuditQueue {
    inner: Arc<QueueInner>,
}

impl AuditQueue {
    pub fn new(store: Arc<dyn AuditStore>, config: AuditConfig) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                store,
                config,
                primary: Mutex::new(VecDeque::new()),
                fallback: Mutex::new(VecDeque::new()),
                draining: AtomicBool::new(false),
                persisted: AtomicU64::new(0),
                dropped: AtomicU64::new(0),
            }),
        }
    }

    /// Queue a record and return immediately. Never blocks on I/O.
    pub fn enqueue(&self, record: AuditRecord) -> EnqueueAck {
        let ack = EnqueueAck {
            id: format!("pending-{}", uuid::Uuid::new_v4()),
            queued_at: Utc::now(),
        };

        debug!(
            "Queued audit record {} ({} for {})",
            ack.id,
            record.operation.as_str(),
            record.correlation_id
        );
        self.inner.primary.lock().push_back(record);
        self.schedule_drain();

        ack
    }

    pub fn status(&self) -> QueueStatus {
        QueueStatus {
            primary: self.inner.primary.lock().len(),
            fallback: self.inner.fallback.lock().len(),
            persisted: self.inner.persisted.load(Ordering::SeqCst),
            dropped: self.inner.dropped.load(Ordering::SeqCst),
            draining: self.inner.draining.load(Ordering::SeqCst),
        }
    }

    /// Records waiting in the fallback queue, oldest first
    pub fn fallback_records(&self) -> Vec<AuditRecord> {
        self.inner.fallback.lock().iter().cloned().collect()
    }

    fn schedule_drain(&self) {
        if self.inner.draining.load(Ordering::SeqCst) {
            return;
        }

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let queue = self.clone();
                handle.spawn(async move { queue.drain().await });
            }
            Err(_) => warn!("No runtime available; audit records stay queued until the next drain"),
        }
    }

    /// Write queued records until the primary queue is empty or a write fails
    pub async fn drain(&self) {
        if self
            .inner
            .draining
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        let failed = self.drain_batches().await;
        self.inner.draining.store(false, Ordering::SeqCst);

        // Pick up anything enqueued while the flag was still set
        if !failed && !self.inner.primary.lock().is_empty() {
            self.schedule_drain();
        }
    }

    /// Returns true if the cycle stopped on a failed write
    async fn drain_batches(&self) -> bool {
        loop {
            let batch: Vec<AuditRecord> = {
                let mut primary = self.inner.primary.lock();
                let n = primary.len().min(self.inner.config.batch_size.max(1));
                primary.drain(..n).collect()
            };

            if batch.is_empty() {
                if !self.inner.store.is_available() {
                    return false;
                }

                let recovered: Vec<AuditRecord> = self.inner.fallback.lock().drain(..).collect();
                if recovered.is_empty() {
                    return false;
                }

                info!("Retrying {} audit records from the fallback queue", recovered.len());
                self.inner.primary.lock().extend(recovered);
                continue;
            }

            let started = Instant::now();
            match self.inner.store.insert_records(&batch).await {
                Ok(()) => {
                    let write_ms = started.elapsed().as_millis() as u64;
                    self.inner
                        .persisted
                        .fetch_add(batch.len() as u64, Ordering::SeqCst);
                    debug!("Persisted {} audit records in {}ms", batch.len(), write_ms);
                    self.record_metric(&batch, write_ms).await;
                }
                Err(e) => {
                    error!("Audit batch write failed ({} records): {:#}", batch.len(), e);
                    self.move_to_fallback(batch, &format!("{:#}", e));
                    return true;
                }
            }
        }
    }

    /// Best-effort metric write; failure never fails the batch
    async fn record_metric(&self, batch: &[AuditRecord], write_ms: u64) {
        let total: u64 = batch.iter().map(|r| r.duration_ms).sum();
        let metric = PerformanceMetric {
            recorded_at: Utc::now(),
            batch_size: batch.len(),
            write_ms,
            avg_processing_ms: total as f64 / batch.len().max(1) as f64,
            failed_operations: batch.iter().filter(|r| !r.success).count(),
        };

        if let Err(e) = self.inner.store.insert_metric(&metric).await {
            warn!("Failed to record audit performance metric: {:#}", e);
        }
    }

    /// Move the failed batch and everything still queued into the fallback queue
    fn move_to_fallback(&self, failed_batch: Vec<AuditRecord>, error: &str) {
        let remaining: Vec<AuditRecord> = self.inner.primary.lock().drain(..).collect();

        let mut fallback = self.inner.fallback.lock();
        let mut moved = 0usize;
        let mut dropped = 0u64;

        for mut record in failed_batch.into_iter().chain(remaining) {
            record.retry_count += 1;
            record.last_error = Some(error.to_string());

            if record.retry_count > self.inner.config.max_retries {
                error!(
                    "Dropping audit record for {} after {} attempts",
                    record.correlation_id, record.retry_count
                );
                dropped += 1;
            } else if fallback.len() >= self.inner.config.fallback_capacity {
                dropped += 1;
            } else {
                fallback.push_back(record);
                moved += 1;
            }
        }

        if dropped > 0 {
            self.inner.dropped.fetch_add(dropped, Ordering::SeqCst);
            warn!(
                "Audit fallback queue full or retries exhausted, dropped {} records",
                dropped
            );
        }
        info!(
            "Moved {} audit records to the fallback queue ({} waiting)",
            moved,
            fallback.len()
        );
    }

    /// Periodically retry the fallback queue
    pub fn spawn_retry_loop(&self) -> JoinHandle<()> {
        let queue = self.clone();
        let period = Duration::from_millis(self.inner.config.retry_interval_ms.max(1));

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if !queue.inner.fallback.lock().is_empty() {
                    queue.drain().await;
                }
            }
        })
    }

    // ------------------------------------------------------------------------
    // Read side: best-effort, failures yield empty results
    // ------------------------------------------------------------------------

    pub async fn records_for(&self, correlation_id: &str) -> Vec<AuditRecord> {
        match self.inner.store.find_by_correlation(correlation_id).await {
            Ok(records) => records,
            Err(e) => {
                warn!("Audit lookup for {} failed: {:#}", correlation_id, e);
                Vec::new()
            }
        }
    }

    /// Aggregated batch metrics over the trailing `window`
    pub async fn performance_metrics(&self, window: Duration) -> MetricsSummary {
        let since = chrono::Duration::from_std(window)
            .map(|w| Utc::now() - w)
            .unwrap_or_else(|_| Utc::now());

        match self.inner.store.metrics_since(since).await {
            Ok(metrics) => MetricsSummary::from_metrics(&metrics),
            Err(e) => {
                warn!("Audit metrics query failed: {:#}", e);
                MetricsSummary::default()
            }
        }
    }

    pub async fn recent_errors(&self, limit: usize) -> Vec<AuditRecord> {
        match self.inner.store.recent_errors(limit).await {
            Ok(records) => records,
            Err(e) => {
                warn!("Audit error query failed: {:#}", e);
                Vec::new()
            }
        }
    }
}
