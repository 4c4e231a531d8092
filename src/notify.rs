//! Outbound staff notifications

use anyhow::Result;
use tracing::info;

/// Role that hears about every calendar change made over the phone
pub const FRONT_DESK: &str = "front_desk";

/// Delivers a free-text message to a recipient role
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, recipient: &str, message: &str) -> Result<()>;
}

/// Writes notifications to the log; used when no messaging backend is connected
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, recipient: &str, message: &str) -> Result<()> {
        info!("Notification for {}: {}", recipient, message);
        Ok(())
    }
}
