use super::record::{AuditRecord, PerformanceMetric};
use super::AuditStore;
use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;

/// In-process audit store
///
/// Used when no external store is configured and by tests, which can make it
/// unavailable, slow, or failing.
pub struct MemoryAuditStore {
    records: RwLock<Vec<AuditRecord>>,
    metrics: RwLock<Vec<PerformanceMetric>>,
    available: AtomicBool,
    fail_writes: AtomicBool,
    fail_metrics: AtomicBool,
    write_delay_ms: AtomicU64,
    write_calls: AtomicUsize,
}

impl Default for MemoryAuditStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryAuditStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            metrics: RwLock::new(Vec::new()),
            available: AtomicBool::new(true),
            fail_writes: AtomicBool::new(false),
            fail_metrics: AtomicBool::new(false),
            write_delay_ms: AtomicU64::new(0),
            write_calls: AtomicUsize::new(0),
        }
    }

    /// Simulate losing or regaining the connection. Writes fail while unavailable.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Reject record writes while still reporting the store as reachable
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_metrics(&self, fail: bool) {
        self.fail_metrics.store(fail, Ordering::SeqCst);
    }

    pub fn set_write_delay(&self, delay: Duration) {
        self.write_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub async fn records(&self) -> Vec<AuditRecord> {
        self.records.read().await.clone()
    }

    pub async fn metrics(&self) -> Vec<PerformanceMetric> {
        self.metrics.read().await.clone()
    }

    /// Bulk insert attempts, successful or not
    pub fn write_calls(&self) -> usize {
        self.write_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl AuditStore for MemoryAuditStore {
    async fn insert_records(&self, records: &[AuditRecord]) -> Result<()> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);

        let delay = self.write_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        if !self.is_available() {
            bail!("audit store unavailable");
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            bail!("bulk write rejected");
        }

        self.records.write().await.extend_from_slice(records);
        Ok(())
    }

    async fn insert_metric(&self, metric: &PerformanceMetric) -> Result<()> {
        if self.fail_metrics.load(Ordering::SeqCst) {
            bail!("metrics collection rejected write");
        }
        self.metrics.write().await.push(metric.clone());
        Ok(())
    }

    async fn find_by_correlation(&self, correlation_id: &str) -> Result<Vec<AuditRecord>> {
        if !self.is_available() {
            bail!("audit store unavailable");
        }
        Ok(self
            .records
            .read()
            .await
            .iter()
            .filter(|r| r.correlation_id == correlation_id)
            .cloned()
            .collect())
    }

    async fn metrics_since(&self, since: DateTime<Utc>) -> Result<Vec<PerformanceMetric>> {
        if !self.is_available() {
            bail!("audit store unavailable");
        }
        Ok(self
            .metrics
            .read()
            .await
            .iter()
            .filter(|m| m.recorded_at >= since)
            .cloned()
            .collect())
    }

    async fn recent_errors(&self, limit: usize) -> Result<Vec<AuditRecord>> {
        if !self.is_available() {
            bail!("audit store unavailable");
        }
        let mut errors: Vec<AuditRecord> = self
            .records
            .read()
            .await
            .iter()
            .filter(|r| !r.success)
            .cloned()
            .collect();
        errors.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        errors.truncate(limit);
        Ok(errors)
    }

    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }
}
