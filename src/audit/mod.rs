//! Durable audit trail for calendar mutations
//!
//! The conversation path never waits on audit persistence:
//! - `AuditQueue::enqueue` is synchronous and only touches memory
//! - batches are written in the background through an `AuditStore`
//! - failed batches land in a bounded fallback queue and are retried
//! - reads are best-effort and degrade to empty results

mod memory;
mod queue;
mod record;

pub use memory::MemoryAuditStore;
pub use queue::{AuditQueue, QueueStatus};
pub use record::{AuditOperation, AuditRecord, EnqueueAck, MetricsSummary, PerformanceMetric};

use anyhow::Result;
use chrono::{DateTime, Utc};

/// Document-oriented persistence for audit records and batch metrics
#[async_trait::async_trait]
pub trait AuditStore: Send + Sync {
    /// Unordered bulk insert
    async fn insert_records(&self, records: &[AuditRecord]) -> Result<()>;

    async fn insert_metric(&self, metric: &PerformanceMetric) -> Result<()>;

    async fn find_by_correlation(&self, correlation_id: &str) -> Result<Vec<AuditRecord>>;

    async fn metrics_since(&self, since: DateTime<Utc>) -> Result<Vec<PerformanceMetric>>;

    /// Most recent records describing failed mutations, newest first
    async fn recent_errors(&self, limit: usize) -> Result<Vec<AuditRecord>>;

    /// Whether the store is currently reachable
    fn is_available(&self) -> bool {
        true
    }
}
