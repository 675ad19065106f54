//! The universal response contract.
//!
//! Every query unit call — server-side or through a client proxy — resolves
//! to an [`Envelope`]. Failures travel in-band as envelope fields, never as
//! transport-level errors. These types are defined standalone (not tied to
//! axum or any HTTP framework) so they can be serialized in any transport
//! context.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::filter::IndexMeta;

/// Outcome vocabulary shared by server and client layers.
///
/// `Loading` and `Unknown` are transitional placeholder states used by UI
/// layers; no server path produces them as a terminal outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvelopeStatus {
    Success,
    Error,
    Fail,
    Loading,
    Unknown,
}

/// Structured success/failure envelope carried by every query response.
///
/// Invariants:
/// - `status` is always present.
/// - `data` is present only on success.
/// - `message` is end-user-safe text only when `expose` is `Some(true)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T> {
    pub status: EnvelopeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expose: Option<bool>,
    /// Result-set pagination echo for index-style queries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_meta: Option<IndexMeta>,
    /// Free-form auxiliary payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
}

impl<T> Envelope<T> {
    /// Successful result carrying data.
    pub fn ok(data: T) -> Self {
        Self {
            status: EnvelopeStatus::Success,
            data: Some(data),
            message: None,
            code: None,
            expose: None,
            index_meta: None,
            meta: None,
        }
    }

    /// Successful result with an end-user message (e.g. "submission saved").
    pub fn ok_with_message(data: T, message: impl Into<String>) -> Self {
        let mut envelope = Self::ok(data);
        envelope.message = Some(message.into());
        envelope
    }

    /// Expected, user-visible rejection (validation, precondition).
    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            status: EnvelopeStatus::Fail,
            data: None,
            message: Some(message.into()),
            code: None,
            expose: Some(true),
            index_meta: None,
            meta: None,
        }
    }

    /// Internal failure with a generic, non-leaking message.
    pub fn error_internal(code: impl Into<String>) -> Self {
        Self {
            status: EnvelopeStatus::Error,
            data: None,
            message: Some("an internal error occurred".into()),
            code: Some(code.into()),
            expose: Some(false),
            index_meta: None,
            meta: None,
        }
    }

    /// Attach index pagination metadata.
    pub fn with_index_meta(mut self, index_meta: IndexMeta) -> Self {
        self.index_meta = Some(index_meta);
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == EnvelopeStatus::Success
    }
}

impl<T: Serialize> Envelope<T> {
    /// Erase the data payload to JSON for transport.
    pub fn into_value(self) -> Result<Envelope<serde_json::Value>, serde_json::Error> {
        let data = match self.data {
            Some(data) => Some(serde_json::to_value(data)?),
            None => None,
        };
        Ok(Envelope {
            status: self.status,
            data,
            message: self.message,
            code: self.code,
            expose: self.expose,
            index_meta: self.index_meta,
            meta: self.meta,
        })
    }
}

impl Envelope<serde_json::Value> {
    /// Reconstruct a typed envelope from its transport form.
    pub fn decode<T: DeserializeOwned>(self) -> Result<Envelope<T>, serde_json::Error> {
        let data = match self.data {
            Some(data) => Some(serde_json::from_value(data)?),
            None => None,
        };
        Ok(Envelope {
            status: self.status,
            data,
            message: self.message,
            code: self.code,
            expose: self.expose,
            index_meta: self.index_meta,
            meta: self.meta,
        })
    }
}

// ---------------------------------------------------------------------------
// axum integration (opt-in via feature flag)
// ---------------------------------------------------------------------------

#[cfg(feature = "axum")]
impl<T: Serialize> axum::response::IntoResponse for Envelope<T> {
    fn into_response(self) -> axum::response::Response {
        // Failures are in-band envelope states, not HTTP-level errors.
        match self.into_value() {
            Ok(envelope) => (axum::http::StatusCode::OK, axum::Json(envelope)).into_response(),
            Err(e) => {
                tracing::error!("failed to serialize envelope data: {}", e);
                let fallback: Envelope<serde_json::Value> = Envelope::error_internal("unknown");
                (axum::http::StatusCode::OK, axum::Json(fallback)).into_response()
            }
        }
    }
}
