use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Calendar mutation kinds that are audited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditOperation {
    Create,
    Update,
    Cancel,
}

impl AuditOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Cancel => "cancel",
        }
    }
}

/// One calendar mutation attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Call-stream id the mutation belongs to
    pub correlation_id: String,

    pub operation: AuditOperation,

    /// Appointment before the mutation (absent for creates)
    pub before: Option<Value>,

    /// Appointment after the mutation (absent on failure and for cancels)
    pub after: Option<Value>,

    /// Side-effect outcomes, e.g. `{"notification": {"recipient": "front_desk", "delivered": true}}`
    pub side_effects: Value,

    /// Everything that went wrong, including non-fatal side-effect failures
    pub errors: Vec<String>,

    /// Time spent processing the mutation
    pub duration_ms: u64,

    pub success: bool,

    pub created_at: DateTime<Utc>,

    /// Failed persistence attempts so far
    #[serde(default)]
    pub retry_count: u32,

    /// Error from the most recent failed persistence attempt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl AuditRecord {
    pub fn new(correlation_id: impl Into<String>, operation: AuditOperation) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            operation,
            before: None,
            after: None,
            side_effects: Value::Object(Default::default()),
            errors: Vec::new(),
            duration_ms: 0,
            success: false,
            created_at: Utc::now(),
            retry_count: 0,
            last_error: None,
        }
    }

    /// Record a side-effect outcome under `key`
    pub fn side_effect(&mut self, key: &str, value: Value) {
        if let Value::Object(map) = &mut self.side_effects {
            map.insert(key.to_string(), value);
        }
    }
}

/// Timing for one persisted batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetric {
    pub recorded_at: DateTime<Utc>,
    pub batch_size: usize,
    /// Store write latency
    pub write_ms: u64,
    /// Mean mutation processing time across the batch
    pub avg_processing_ms: f64,
    /// Records in the batch describing failed mutations
    pub failed_operations: usize,
}

/// Aggregate of metrics over a time window
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSummary {
    pub batches: usize,
    pub records: usize,
    pub avg_write_ms: f64,
    pub max_write_ms: u64,
    pub avg_processing_ms: f64,
    pub failed_operations: usize,
}

impl MetricsSummary {
    pub fn from_metrics(metrics: &[PerformanceMetric]) -> Self {
        if metrics.is_empty() {
            return Self::default();
        }

        let batches = metrics.len();
        let records: usize = metrics.iter().map(|m| m.batch_size).sum();
        let total_write: u64 = metrics.iter().map(|m| m.write_ms).sum();
        let weighted_processing: f64 = metrics
            .iter()
            .map(|m| m.avg_processing_ms * m.batch_size as f64)
            .sum();

        Self {
            batches,
            records,
            avg_write_ms: total_write as f64 / batches as f64,
            max_write_ms: metrics.iter().map(|m| m.write_ms).max().unwrap_or(0),
            avg_processing_ms: if records == 0 {
                0.0
            } else {
                weighted_processing / records as f64
            },
            failed_operations: metrics.iter().map(|m| m.failed_operations).sum(),
        }
    }
}

/// Returned by `enqueue` before anything is persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnqueueAck {
    /// Client-visible placeholder id; the store assigns the real one
    pub id: String,
    pub queued_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metric(batch_size: usize, write_ms: u64, avg_processing_ms: f64) -> PerformanceMetric {
        PerformanceMetric {
            recorded_at: Utc::now(),
            batch_size,
            write_ms,
            avg_processing_ms,
            failed_operations: 0,
        }
    }

    #[test]
    fn test_summary_of_nothing_is_zero() {
        assert_eq!(MetricsSummary::from_metrics(&[]), MetricsSummary::default());
    }

    #[test]
    fn test_summary_weights_processing_by_batch() {
        let summary = MetricsSummary::from_metrics(&[metric(1, 10, 100.0), metric(3, 30, 20.0)]);

        assert_eq!(summary.batches, 2);
        assert_eq!(summary.records, 4);
        assert_eq!(summary.avg_write_ms, 20.0);
        assert_eq!(summary.max_write_ms, 30);
        assert_eq!(summary.avg_processing_ms, 40.0);
    }

    #[test]
    fn test_operation_serializes_lowercase() {
        let json = serde_json::to_string(&AuditOperation::Cancel).unwrap();
        assert_eq!(json, "\"cancel\"");
    }
}
