//! Plinth Server — axum adapter for plinth-core query units.
//!
//! Feature plugins declare `QueryMap`s; this crate binds each unit to a
//! route under the plugin's base path, enforces per-endpoint authorization,
//! and translates transport I/O to and from response envelopes. The route
//! table is composed once at startup and immutable afterwards.
//!
//! ```ignore
//! let queries = QueryMap::new().with("manageCert", ManageCert::new(deps));
//! let mut endpoints = endpoints_from_queries("/api/site", &queries);
//! // per-endpoint auth requirements applied here
//! let state = Arc::new(ServerStateInner::new(identity));
//! let router = build_router(endpoints, state)?;
//! let addr = serve("127.0.0.1:0", router).await?;
//! ```

pub mod endpoint;
pub mod identity;
pub mod router;
pub mod state;

use std::net::SocketAddr;

use axum::Router;

pub use endpoint::{endpoints_from_queries, Endpoint};
pub use identity::{AnonymousResolver, IdentityResolver, StaticTokenResolver};
pub use router::{build_router, SetupError};
pub use state::{ServerState, ServerStateInner};

/// Initialize tracing for server processes.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "plinth_server=info,tower_http=info".into()),
        )
        .init();
}

/// Bind the router and serve it on a background task.
///
/// Returns the actual address the server is listening on (useful with
/// port 0).
pub async fn serve(addr: &str, router: Router) -> Result<SocketAddr, SetupError> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let addr = listener.local_addr()?;

    tracing::info!("plinth server listening on {}", addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            tracing::error!("server task exited: {}", e);
        }
    });

    Ok(addr)
}
