//! Plinth Core — transport-agnostic substrate for feature plugins.
//!
//! Independently developed feature modules declare maps of query units;
//! this crate defines the units themselves, the response envelope every
//! call resolves to, the failure signal with exposure control, the
//! index/filter query language, and the collaborator ports units depend
//! on. It has **no HTTP framework dependency** by default, so the same
//! types serve:
//!
//! - HTTP servers (via `plinth-server`)
//! - Client call proxies (via `plinth-client`)
//! - In-process/server-internal invocation
//!
//! # Feature Flags
//!
//! - `axum` — Enables `IntoResponse` impl on `Envelope` for use in axum
//!   handlers.

pub mod envelope;
pub mod filter;
pub mod meta;
pub mod ports;
pub mod query;
pub mod signal;
pub mod store;

// Convenience re-exports
pub use envelope::{Envelope, EnvelopeStatus};
pub use filter::{
    ComplexDataFilter, DataFilter, FilterOp, FilterValue, IndexMeta, IndexQuery, Order, Scalar,
    TaxonomyFilter,
};
pub use meta::{Actor, CallMeta, CallOrigin, Role};
pub use ports::{Monitor, NullMonitor};
pub use query::{BoxedQuery, ErasedQuery, Query, QueryMap};
pub use signal::{stop, Signal, SignalCode};
pub use store::{DataStore, MemStore, StoreError};
