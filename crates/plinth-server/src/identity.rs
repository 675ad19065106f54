//! Identity resolution port.
//!
//! Endpoints consume a resolved actor, they never verify credentials
//! themselves — session/credential issuance belongs to an external
//! identity collaborator behind this trait.

use std::collections::HashMap;

use async_trait::async_trait;
use axum::http::HeaderMap;
use plinth_core::meta::Actor;

/// Produces `{actor_id, role}` from transport request headers, or `None`
/// when the request carries no resolvable identity.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(&self, headers: &HeaderMap) -> Option<Actor>;
}

/// Resolves nothing. Every caller is anonymous.
pub struct AnonymousResolver;

#[async_trait]
impl IdentityResolver for AnonymousResolver {
    async fn resolve(&self, _headers: &HeaderMap) -> Option<Actor> {
        None
    }
}

/// Fixed bearer-token table. Intended for tests and single-tenant demos;
/// production deployments plug in a real session resolver.
#[derive(Default)]
pub struct StaticTokenResolver {
    tokens: HashMap<String, Actor>,
}

impl StaticTokenResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, token: impl Into<String>, actor: Actor) -> Self {
        self.tokens.insert(token.into(), actor);
        self
    }
}

#[async_trait]
impl IdentityResolver for StaticTokenResolver {
    async fn resolve(&self, headers: &HeaderMap) -> Option<Actor> {
        let header = headers.get(axum::http::header::AUTHORIZATION)?.to_str().ok()?;
        let token = header.strip_prefix("Bearer ")?;
        self.tokens.get(token).cloned()
    }
}
