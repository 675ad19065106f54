//! Plinth Client — typed call proxies for plinth query units.
//!
//! Depends only on `plinth-core` and an HTTP client, so UI processes and
//! generators can call server units with full type fidelity without
//! pulling in the server crate.

pub mod proxy;

pub use proxy::{RequestHandle, RequestProxy};
