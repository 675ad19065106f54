//! Shared server state for the axum adapter.

use std::sync::Arc;

use crate::identity::{AnonymousResolver, IdentityResolver};

/// Shared state accessible by all endpoint handlers. Write-once at setup,
/// read-only thereafter.
pub struct ServerStateInner {
    pub identity: Arc<dyn IdentityResolver>,
}

pub type ServerState = Arc<ServerStateInner>;

impl ServerStateInner {
    pub fn new(identity: Arc<dyn IdentityResolver>) -> Self {
        Self { identity }
    }

    /// State with no identity resolution — every caller is anonymous.
    pub fn anonymous() -> Self {
        Self::new(Arc::new(AnonymousResolver))
    }
}
