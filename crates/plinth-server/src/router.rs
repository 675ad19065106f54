//! One-shot route table composition.
//!
//! All bindings are constructed first, collected, and handed to
//! [`build_router`] once at startup; there is no process-global mutable
//! registry. Duplicate route strings are a setup-time error, so
//! registration order never affects dispatch.

use std::collections::HashSet;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::post;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::endpoint::Endpoint;
use crate::state::ServerState;

#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("duplicate route: {0}")]
    DuplicateRoute(String),

    #[error("failed to bind: {0}")]
    Bind(#[from] std::io::Error),
}

/// Compose the immutable route table into an axum router.
pub fn build_router(endpoints: Vec<Endpoint>, state: ServerState) -> Result<Router, SetupError> {
    let mut seen = HashSet::new();
    let mut router = Router::new();

    for endpoint in endpoints {
        let route = endpoint.route().to_string();
        if !seen.insert(route.clone()) {
            return Err(SetupError::DuplicateRoute(route));
        }

        let endpoint = Arc::new(endpoint);
        let handler = move |State(state): State<ServerState>, headers: HeaderMap, body: Bytes| {
            let endpoint = endpoint.clone();
            async move { endpoint.handle(state, headers, body).await }
        };
        router = router.route(&route, post(handler));
    }

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Ok(router
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state))
}
