//! Operational collaborator ports.
//!
//! Units receive these through their dependency structs; implementations
//! live outside the core (Slack, email, pager — whatever the deployment
//! wires in).

use async_trait::async_trait;
use serde_json::Value;

/// Monitoring/notification sink for operational alerts (e.g. "new contact
/// form submission"). Fire-and-forget from the unit's point of view.
#[async_trait]
pub trait Monitor: Send + Sync {
    async fn notify(&self, subject: &str, data: Value);
}

/// Discards notifications, logging them at debug level.
pub struct NullMonitor;

#[async_trait]
impl Monitor for NullMonitor {
    async fn notify(&self, subject: &str, data: Value) {
        tracing::debug!(subject, %data, "monitor notification dropped (null monitor)");
    }
}
