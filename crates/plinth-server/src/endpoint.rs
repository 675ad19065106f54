//! Route bindings for query units.
//!
//! An [`Endpoint`] binds one unit to `{base_path}/{key}`, resolves the
//! caller's identity into a [`CallMeta`], enforces the binding's required
//! role before the unit ever runs, and writes the resulting envelope back
//! verbatim as the response body. Bindings are created once at setup time
//! and immutable thereafter.

use axum::body::Bytes;
use axum::http::HeaderMap;
use serde_json::Value;

use plinth_core::envelope::Envelope;
use plinth_core::meta::{CallMeta, Role};
use plinth_core::query::{BoxedQuery, QueryMap};
use plinth_core::signal::Signal;

use crate::state::ServerState;

/// One unit bound to one route, with an optional authorization requirement.
pub struct Endpoint {
    key: String,
    route: String,
    required_role: Option<Role>,
    unit: BoxedQuery,
}

impl Endpoint {
    pub fn new(base_path: &str, key: &str, unit: BoxedQuery) -> Self {
        let base = base_path.trim_end_matches('/');
        Self {
            key: key.to_string(),
            route: format!("{}/{}", base, key),
            required_role: None,
            unit,
        }
    }

    /// Require at least this role. Callers below it are rejected without
    /// the unit being invoked.
    pub fn with_auth(mut self, role: Role) -> Self {
        self.required_role = Some(role);
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn route(&self) -> &str {
        &self.route
    }

    pub fn required_role(&self) -> Option<Role> {
        self.required_role
    }

    /// Handler body shared by every bound route.
    pub(crate) async fn handle(
        &self,
        state: ServerState,
        headers: HeaderMap,
        body: Bytes,
    ) -> Envelope<Value> {
        let actor = state.identity.resolve(&headers).await;
        let meta = CallMeta::external(actor);

        // Cheaper, earlier rejection: the unit is never invoked.
        if let Some(required) = self.required_role {
            if !meta.role().satisfies(required) {
                tracing::warn!(
                    route = %self.route,
                    unit = self.unit.unit_name(),
                    trace_id = %meta.trace_id,
                    actor_role = ?meta.role(),
                    "permission denied"
                );
                return Signal::unauthorized(format!(
                    "caller role {:?} does not satisfy {:?}",
                    meta.role(),
                    required
                ))
                .into_envelope();
            }
        }

        let params: Value = if body.is_empty() {
            Value::Object(Default::default())
        } else {
            match serde_json::from_slice(&body) {
                Ok(value) => value,
                Err(e) => {
                    return Signal::validation(format!("invalid request body: {}", e))
                        .into_envelope()
                }
            }
        };

        self.unit.serve_value(params, &meta).await
    }
}

/// Build one endpoint per declared unit, preserving declaration order.
pub fn endpoints_from_queries(base_path: &str, queries: &QueryMap) -> Vec<Endpoint> {
    queries
        .iter()
        .map(|(key, unit)| Endpoint::new(base_path, key, unit.clone()))
        .collect()
}
