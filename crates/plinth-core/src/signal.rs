//! Typed failure signal with exposure control.
//!
//! [`Signal`] is the only sanctioned way a query unit reports failure for
//! propagation: `run` implementations return `Err(Signal)` (usually via
//! [`stop`]) and the serve boundary translates it into an [`Envelope`].
//! `expose` decides whether `message` may be shown to the caller; it
//! defaults to `false` everywhere except validation failures, so leaking
//! internal detail requires an explicit opt-in.

use crate::envelope::{Envelope, EnvelopeStatus};

/// Closed failure taxonomy. Maps onto the envelope `code` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalCode {
    /// Missing or malformed required input. Always safe to show.
    Validation,
    /// Actor role insufficient. Rejected with a generic message.
    Unauthorized,
    /// A referenced record is absent.
    NotFound,
    /// The request conflicts with existing state.
    Conflict,
    /// A supported action's precondition was unmet mid-logic.
    Operation,
    /// Storage or external-service failure.
    Store,
    /// Any unexpected fault.
    Unknown,
}

impl SignalCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalCode::Validation => "validation",
            SignalCode::Unauthorized => "permission_denied",
            SignalCode::NotFound => "not_found",
            SignalCode::Conflict => "conflict",
            SignalCode::Operation => "operation",
            SignalCode::Store => "store",
            SignalCode::Unknown => "unknown",
        }
    }
}

/// Typed failure value raised inside query units.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct Signal {
    pub message: String,
    pub code: SignalCode,
    /// Whether `message` may be passed through to the caller verbatim.
    pub expose: bool,
    /// Detail for the logging sink only, never for the wire.
    pub internal: Option<String>,
}

/// Shorthand for an in-unit operation failure.
///
/// Not exposed by default; chain [`Signal::expose`] when the message is
/// written for the end user.
pub fn stop(message: impl Into<String>) -> Signal {
    Signal::new(message, SignalCode::Operation)
}

impl Signal {
    pub fn new(message: impl Into<String>, code: SignalCode) -> Self {
        Self {
            message: message.into(),
            code,
            expose: false,
            internal: None,
        }
    }

    /// Validation failure — exposed by default, `message` should name the
    /// offending field.
    pub fn validation(message: impl Into<String>) -> Self {
        Self {
            expose: true,
            ..Self::new(message, SignalCode::Validation)
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(message, SignalCode::Unauthorized)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(message, SignalCode::NotFound)
    }

    /// Unexpected fault. Never exposed; `code` is `unknown`.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(message, SignalCode::Unknown)
    }

    pub fn with_code(mut self, code: SignalCode) -> Self {
        self.code = code;
        self
    }

    pub fn with_internal(mut self, detail: impl Into<String>) -> Self {
        self.internal = Some(detail.into());
        self
    }

    /// Opt this signal's message into caller visibility.
    pub fn expose(mut self) -> Self {
        self.expose = true;
        self
    }

    /// Translate into the envelope the caller sees.
    ///
    /// Exposed signals pass `message` through unchanged. Unexposed signals
    /// get a generic replacement; the original message stays available to
    /// the serve boundary for logging.
    pub fn into_envelope<T>(self) -> Envelope<T> {
        let (status, message, expose) = match (self.code, self.expose) {
            (SignalCode::Unauthorized, _) => {
                (EnvelopeStatus::Fail, "not authorized".to_string(), false)
            }
            (_, true) => (EnvelopeStatus::Error, self.message, true),
            (_, false) => (
                EnvelopeStatus::Error,
                "an internal error occurred".to_string(),
                false,
            ),
        };
        Envelope {
            status,
            data: None,
            message: Some(message),
            code: Some(self.code.as_str().to_string()),
            expose: Some(expose),
            index_meta: None,
            meta: None,
        }
    }
}

impl From<crate::store::StoreError> for Signal {
    fn from(err: crate::store::StoreError) -> Self {
        Signal::new("backend storage failure", SignalCode::Store)
            .with_internal(err.to_string())
    }
}

impl From<serde_json::Error> for Signal {
    fn from(err: serde_json::Error) -> Self {
        Signal::internal("serialization failure").with_internal(err.to_string())
    }
}
