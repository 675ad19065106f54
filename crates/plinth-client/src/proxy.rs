//! Client-side call proxies.
//!
//! A [`RequestProxy`] mirrors a server's declared unit map: one callable
//! per key, each with the unit's own params type, each resolving to an
//! envelope. When the base URL cannot be resolved (offline generation,
//! server not yet started) the proxy exposes zero callables instead of
//! failing — absence of a callable means "unavailable", not "error".
//!
//! Each call is independent: no retries, no batching, no deduplication.

use std::marker::PhantomData;

use serde_json::Value;

use plinth_core::envelope::Envelope;
use plinth_core::query::Query;

#[derive(Clone)]
struct Resolved {
    client: reqwest::Client,
    /// Base URL joined with the plugin base path, no trailing slash.
    prefix: String,
    bearer: Option<String>,
}

/// Factory for typed call handles under one `{base_url}{base_path}`.
#[derive(Clone)]
pub struct RequestProxy {
    inner: Option<Resolved>,
}

impl RequestProxy {
    /// Build a proxy. `base_url` may be absent or unparseable, in which
    /// case the proxy is unresolved and [`RequestProxy::handle`] always
    /// returns `None`.
    pub fn new(base_url: Option<&str>, base_path: &str) -> Self {
        let inner = base_url
            .and_then(|url| match reqwest::Url::parse(url) {
                Ok(_) => Some(url),
                Err(e) => {
                    tracing::warn!("unresolvable base url '{}': {}", url, e);
                    None
                }
            })
            .map(|url| Resolved {
                client: reqwest::Client::new(),
                prefix: format!(
                    "{}/{}",
                    url.trim_end_matches('/'),
                    base_path.trim_matches('/')
                ),
                bearer: None,
            });
        Self { inner }
    }

    /// Attach a bearer token to every call issued through this proxy.
    pub fn with_bearer(mut self, token: impl Into<String>) -> Self {
        if let Some(inner) = &mut self.inner {
            inner.bearer = Some(token.into());
        }
        self
    }

    pub fn is_resolved(&self) -> bool {
        self.inner.is_some()
    }

    /// Callable for one unit key, or `None` when the proxy is unresolved.
    pub fn handle<Q: Query>(&self, key: &str) -> Option<RequestHandle<Q>> {
        let inner = self.inner.as_ref()?;
        Some(RequestHandle {
            client: inner.client.clone(),
            url: format!("{}/{}", inner.prefix, key),
            bearer: inner.bearer.clone(),
            _unit: PhantomData,
        })
    }
}

/// A single unit's call stub. Its signature mirrors the server unit.
pub struct RequestHandle<Q: Query> {
    client: reqwest::Client,
    url: String,
    bearer: Option<String>,
    _unit: PhantomData<fn() -> Q>,
}

impl<Q: Query> RequestHandle<Q> {
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Issue the call. Always resolves to an envelope: transport faults
    /// (connect, parse) degrade to an unexposed `unknown` error rather
    /// than surfacing as client exceptions.
    pub async fn request(&self, params: &Q::Params) -> Envelope<Value> {
        let mut builder = self.client.post(&self.url).json(params);
        if let Some(bearer) = &self.bearer {
            builder = builder.bearer_auth(bearer);
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(url = %self.url, "request failed: {}", e);
                return Envelope::error_internal("unknown");
            }
        };

        match response.json::<Envelope<Value>>().await {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::error!(url = %self.url, "response was not an envelope: {}", e);
                Envelope::error_internal("unknown")
            }
        }
    }

    /// Issue the call and decode `data` into the unit's declared type.
    pub async fn request_typed(&self, params: &Q::Params) -> Envelope<Q::Data>
    where
        Q::Data: serde::de::DeserializeOwned,
    {
        let envelope = self.request(params).await;
        match envelope.decode::<Q::Data>() {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::error!(url = %self.url, "envelope data did not decode: {}", e);
                Envelope::error_internal("unknown")
            }
        }
    }
}
