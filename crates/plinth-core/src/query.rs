//! The abstract business-logic unit and its serve boundary.
//!
//! A [`Query`] is a stateless unit constructed once with an explicit
//! dependency struct and shared across concurrent calls. Implementations
//! provide `run`; everything external goes through [`ErasedQuery::serve_value`],
//! which guarantees resolution to an [`Envelope`] — no fault channel in a
//! unit escapes as anything else.
//!
//! Multi-behavior units take a `#[serde(tag = "_action")]` enum as their
//! params type, so the action discriminant is a closed set matched
//! exhaustively at compile time and an unknown discriminant fails at the
//! deserialization boundary.

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::envelope::Envelope;
use crate::meta::CallMeta;
use crate::signal::Signal;

/// A stateless server-side business-logic unit.
///
/// `Params` must serialize as well as deserialize: the server parses it off
/// the wire and client proxies write it back on.
#[async_trait]
pub trait Query: Send + Sync + 'static {
    type Params: DeserializeOwned + Serialize + Send;
    type Data: Serialize + Send;

    /// Unit name used as logging context.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// The unit's logic. Report expected failures with `Err(Signal)`
    /// ([`crate::signal::stop`]); never pair a success envelope with an
    /// error condition.
    async fn run(
        &self,
        params: Self::Params,
        meta: &CallMeta,
    ) -> Result<Envelope<Self::Data>, Signal>;
}

/// Object-safe serving surface. Endpoints and proxies hold units through
/// this trait so heterogeneous units fit one route table.
#[async_trait]
pub trait ErasedQuery: Send + Sync {
    /// The only entry point external callers use. Always resolves to an
    /// envelope: parse failures become exposed validation errors, signals
    /// are translated and logged, success passes through unmodified.
    async fn serve_value(&self, params: Value, meta: &CallMeta) -> Envelope<Value>;

    fn unit_name(&self) -> &'static str;
}

#[async_trait]
impl<Q: Query> ErasedQuery for Q {
    async fn serve_value(&self, params: Value, meta: &CallMeta) -> Envelope<Value> {
        // Peek the action discriminant before deserializing so an unknown
        // action can be named in the failure without leaning on serde's
        // error prose.
        let action = params
            .get("_action")
            .and_then(Value::as_str)
            .map(str::to_owned);

        let params: Q::Params = match serde_json::from_value(params) {
            Ok(params) => params,
            Err(e) => {
                let detail = e.to_string();
                let message = if detail.contains("unknown variant") {
                    match action {
                        Some(action) => format!("unsupported action '{}'", action),
                        None => format!("unsupported action: {}", detail),
                    }
                } else {
                    format!("invalid params: {}", detail)
                };
                tracing::debug!(unit = self.name(), trace_id = %meta.trace_id, "{}", message);
                return Signal::validation(message).into_envelope();
            }
        };

        let envelope = match self.run(params, meta).await {
            Ok(envelope) => envelope,
            Err(signal) => {
                tracing::error!(
                    unit = self.name(),
                    trace_id = %meta.trace_id,
                    code = signal.code.as_str(),
                    internal = signal.internal.as_deref().unwrap_or(""),
                    "serve error: {}",
                    signal.message
                );
                return signal.into_envelope();
            }
        };

        match envelope.into_value() {
            Ok(envelope) => envelope,
            Err(e) => {
                let signal: Signal = e.into();
                tracing::error!(
                    unit = self.name(),
                    trace_id = %meta.trace_id,
                    internal = signal.internal.as_deref().unwrap_or(""),
                    "serve error: {}",
                    signal.message
                );
                signal.into_envelope()
            }
        }
    }

    fn unit_name(&self) -> &'static str {
        self.name()
    }
}

/// Shared handle to an erased unit — one instance per declared unit per
/// process.
pub type BoxedQuery = Arc<dyn ErasedQuery>;

/// A feature plugin's declaration of its units: `key → unit`, in
/// declaration order. Consumed by endpoint builders on the server and by
/// request proxies on the client.
#[derive(Default, Clone)]
pub struct QueryMap {
    entries: Vec<(String, BoxedQuery)>,
}

impl QueryMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a unit under a key. Builder-style so plugin setup reads as one
    /// declaration.
    pub fn with(mut self, key: impl Into<String>, unit: impl Query) -> Self {
        self.entries.push((key.into(), Arc::new(unit)));
        self
    }

    pub fn get(&self, key: &str) -> Option<&BoxedQuery> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, unit)| unit)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BoxedQuery)> {
        self.entries.iter().map(|(k, unit)| (k.as_str(), unit))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
