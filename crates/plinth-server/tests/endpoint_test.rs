//! Integration test: compose endpoints from sample query units, start the
//! server, and drive it through the typed client proxy.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use plinth_client::RequestProxy;
use plinth_core::envelope::{Envelope, EnvelopeStatus};
use plinth_core::filter::IndexQuery;
use plinth_core::meta::{Actor, CallMeta, Role};
use plinth_core::ports::{Monitor, NullMonitor};
use plinth_core::query::{Query, QueryMap};
use plinth_core::signal::{stop, Signal};
use plinth_core::store::{DataStore, MemStore};
use plinth_server::{
    build_router, endpoints_from_queries, serve, ServerState, ServerStateInner,
    StaticTokenResolver,
};

const CERT_TABLE: &str = "certificates";

// ── Sample feature units ────────────────────────────────────────────────

struct CertDeps {
    store: Arc<dyn DataStore>,
    monitor: Arc<dyn Monitor>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "_action", rename_all = "camelCase")]
enum CertParams {
    Create { hostname: String },
    Retrieve { hostname: String },
    List { query: IndexQuery },
    Delete { hostname: String },
}

/// Certificate-provisioning style unit: `create` opts into upsert
/// semantics keyed on hostname, so repeated creates are idempotent.
struct ManageCert {
    deps: CertDeps,
}

#[async_trait]
impl Query for ManageCert {
    type Params = CertParams;
    type Data = Value;

    fn name(&self) -> &'static str {
        "ManageCert"
    }

    async fn run(
        &self,
        params: Self::Params,
        _meta: &CallMeta,
    ) -> Result<Envelope<Self::Data>, Signal> {
        match params {
            CertParams::Create { hostname } => {
                if hostname.trim().is_empty() {
                    return Err(Signal::validation("hostname is required"));
                }
                let row = self
                    .deps
                    .store
                    .upsert(
                        CERT_TABLE,
                        "hostname",
                        json!({ "hostname": hostname, "status": "issued" }),
                    )
                    .await?;
                self.deps
                    .monitor
                    .notify("certificate issued", row.clone())
                    .await;
                Ok(Envelope::ok_with_message(row, "certificate ready"))
            }
            CertParams::Retrieve { hostname } => {
                let (rows, _) = self
                    .deps
                    .store
                    .select(CERT_TABLE, &by_hostname(&hostname))
                    .await?;
                match rows.into_iter().next() {
                    Some(row) => Ok(Envelope::ok(row)),
                    None => Err(stop(format!("no certificate for {}", hostname)).expose()),
                }
            }
            CertParams::List { query } => {
                let (rows, count) = self.deps.store.select(CERT_TABLE, &query).await?;
                Ok(Envelope::ok(Value::Array(rows)).with_index_meta(query.into_meta(count)))
            }
            CertParams::Delete { hostname } => {
                let deleted = self
                    .deps
                    .store
                    .delete(CERT_TABLE, &by_hostname(&hostname))
                    .await?;
                Ok(Envelope::ok(json!({ "deletedCount": deleted })))
            }
        }
    }
}

fn by_hostname(hostname: &str) -> IndexQuery {
    serde_json::from_value(json!({
        "filters": [[{ "field": "hostname", "operator": "=", "value": hostname }]]
    }))
    .unwrap()
}

#[derive(Debug, Serialize, Deserialize)]
struct PurgeParams {}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct PurgeReport {
    purged: bool,
}

/// Admin-only maintenance unit with a call counter, so tests can verify
/// the authorization short-circuit never reaches `run`.
struct PurgeCerts {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Query for PurgeCerts {
    type Params = PurgeParams;
    type Data = PurgeReport;

    fn name(&self) -> &'static str {
        "PurgeCerts"
    }

    async fn run(
        &self,
        _params: Self::Params,
        _meta: &CallMeta,
    ) -> Result<Envelope<Self::Data>, Signal> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Envelope::ok(PurgeReport { purged: true }))
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ProbeParams {}

/// Always fails the way a dead backend would.
struct BackendProbe;

#[async_trait]
impl Query for BackendProbe {
    type Params = ProbeParams;
    type Data = Value;

    fn name(&self) -> &'static str {
        "BackendProbe"
    }

    async fn run(
        &self,
        _params: Self::Params,
        _meta: &CallMeta,
    ) -> Result<Envelope<Self::Data>, Signal> {
        Err(Signal::internal("db unreachable"))
    }
}

// ── Setup ───────────────────────────────────────────────────────────────

async fn start_test_server(calls: Arc<AtomicUsize>) -> String {
    let store: Arc<dyn DataStore> = Arc::new(MemStore::new());
    let monitor: Arc<dyn Monitor> = Arc::new(NullMonitor);

    let queries = QueryMap::new()
        .with(
            "manageCert",
            ManageCert {
                deps: CertDeps {
                    store: store.clone(),
                    monitor,
                },
            },
        )
        .with("purgeCerts", PurgeCerts { calls })
        .with("backendProbe", BackendProbe);

    let endpoints: Vec<_> = endpoints_from_queries("/api/site", &queries)
        .into_iter()
        .map(|endpoint| {
            if endpoint.key() == "purgeCerts" {
                endpoint.with_auth(Role::Admin)
            } else {
                endpoint
            }
        })
        .collect();

    let resolver = StaticTokenResolver::new()
        .with_token(
            "tok-member",
            Actor {
                actor_id: "user-member".into(),
                role: Role::Member,
            },
        )
        .with_token(
            "tok-admin",
            Actor {
                actor_id: "user-admin".into(),
                role: Role::Admin,
            },
        );
    let state: ServerState = Arc::new(ServerStateInner::new(Arc::new(resolver)));

    let router = build_router(endpoints, state).unwrap();
    let addr = serve("127.0.0.1:0", router).await.unwrap();

    // Give the server task a moment to start accepting
    tokio::time::sleep(Duration::from_millis(100)).await;

    format!("http://{}", addr)
}

// ── Tests ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_end_to_end_dispatch() {
    let calls = Arc::new(AtomicUsize::new(0));
    let base_url = start_test_server(calls.clone()).await;

    let proxy = RequestProxy::new(Some(&base_url), "/api/site");
    let certs = proxy.handle::<ManageCert>("manageCert").unwrap();

    // ── Idempotent create: same hostname twice, same id, one record ──
    let first = certs
        .request(&CertParams::Create {
            hostname: "a.test".into(),
        })
        .await;
    assert_eq!(first.status, EnvelopeStatus::Success);
    let first_id = first.data.as_ref().unwrap()["id"].clone();

    let second = certs
        .request(&CertParams::Create {
            hostname: "a.test".into(),
        })
        .await;
    assert_eq!(second.status, EnvelopeStatus::Success);
    assert_eq!(second.data.as_ref().unwrap()["id"], first_id);

    let listed = certs
        .request(&CertParams::List {
            query: by_hostname("a.test"),
        })
        .await;
    assert_eq!(listed.status, EnvelopeStatus::Success);
    assert_eq!(listed.index_meta.unwrap().count, Some(1));

    // ── Filter semantics through the wire: OR of AND-groups ──────────
    certs
        .request(&CertParams::Create {
            hostname: "b.test".into(),
        })
        .await;
    certs
        .request(&CertParams::Create {
            hostname: "c.test".into(),
        })
        .await;
    let query: IndexQuery = serde_json::from_value(json!({
        "filters": [
            [{ "field": "hostname", "operator": "=", "value": "a.test" }],
            [{ "field": "hostname", "operator": "like", "value": "b%" }]
        ],
        "orderBy": "hostname"
    }))
    .unwrap();
    let filtered = certs.request(&CertParams::List { query }).await;
    let rows = filtered.data.unwrap();
    let hostnames: Vec<&str> = rows
        .as_array()
        .unwrap()
        .iter()
        .map(|row| row["hostname"].as_str().unwrap())
        .collect();
    assert_eq!(hostnames, vec!["a.test", "b.test"]);

    // ── Exposed action failure names the problem ─────────────────────
    let missing = certs
        .request(&CertParams::Retrieve {
            hostname: "ghost.test".into(),
        })
        .await;
    assert_eq!(missing.status, EnvelopeStatus::Error);
    assert_eq!(missing.expose, Some(true));
    assert!(missing.message.unwrap().contains("ghost.test"));

    // ── Cleanup action ───────────────────────────────────────────────
    let deleted = certs
        .request(&CertParams::Delete {
            hostname: "c.test".into(),
        })
        .await;
    assert_eq!(deleted.data.unwrap()["deletedCount"], 1);
}

#[tokio::test]
async fn test_validation_and_unsupported_action_over_the_wire() {
    let base_url = start_test_server(Arc::new(AtomicUsize::new(0))).await;
    let client = reqwest::Client::new();

    // Missing required field for the selected action
    let envelope: Envelope<Value> = client
        .post(format!("{}/api/site/manageCert", base_url))
        .json(&json!({ "_action": "create" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(envelope.status, EnvelopeStatus::Error);
    assert_eq!(envelope.expose, Some(true));
    assert!(envelope.message.unwrap().contains("hostname"));

    // Unknown action discriminant
    let envelope: Envelope<Value> = client
        .post(format!("{}/api/site/manageCert", base_url))
        .json(&json!({ "_action": "explode", "hostname": "a.test" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(envelope.status, EnvelopeStatus::Error);
    assert!(envelope
        .message
        .unwrap()
        .starts_with("unsupported action"));

    // Malformed body still yields an envelope, not a transport error
    let response = client
        .post(format!("{}/api/site/manageCert", base_url))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let envelope: Envelope<Value> = response.json().await.unwrap();
    assert_eq!(envelope.status, EnvelopeStatus::Error);
}

#[tokio::test]
async fn test_exposure_discipline_over_the_wire() {
    let base_url = start_test_server(Arc::new(AtomicUsize::new(0))).await;

    let proxy = RequestProxy::new(Some(&base_url), "/api/site");
    let probe = proxy.handle::<BackendProbe>("backendProbe").unwrap();

    let envelope = probe.request(&ProbeParams {}).await;
    assert_eq!(envelope.status, EnvelopeStatus::Error);
    assert_eq!(envelope.code.as_deref(), Some("unknown"));
    assert_eq!(envelope.expose, Some(false));
    assert!(!envelope.message.unwrap().contains("db unreachable"));
}

#[tokio::test]
async fn test_authorization_short_circuit() {
    let calls = Arc::new(AtomicUsize::new(0));
    let base_url = start_test_server(calls.clone()).await;

    // Member role is insufficient for the admin-gated endpoint
    let member = RequestProxy::new(Some(&base_url), "/api/site").with_bearer("tok-member");
    let envelope = member
        .handle::<PurgeCerts>("purgeCerts")
        .unwrap()
        .request(&PurgeParams {})
        .await;
    assert_eq!(envelope.status, EnvelopeStatus::Fail);
    assert_eq!(envelope.message.as_deref(), Some("not authorized"));
    assert_eq!(calls.load(Ordering::SeqCst), 0, "run must not be invoked");

    // Anonymous caller fares no better
    let anon = RequestProxy::new(Some(&base_url), "/api/site");
    let envelope = anon
        .handle::<PurgeCerts>("purgeCerts")
        .unwrap()
        .request(&PurgeParams {})
        .await;
    assert_eq!(envelope.status, EnvelopeStatus::Fail);
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    // Admin passes through to the unit; decode into the unit's declared
    // data type to confirm the call stub mirrors the server signature
    let admin = RequestProxy::new(Some(&base_url), "/api/site").with_bearer("tok-admin");
    let envelope = admin
        .handle::<PurgeCerts>("purgeCerts")
        .unwrap()
        .request_typed(&PurgeParams {})
        .await;
    assert_eq!(envelope.status, EnvelopeStatus::Success);
    assert_eq!(envelope.data, Some(PurgeReport { purged: true }));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_unresolved_proxy_has_no_callables() {
    // No server involved: an unresolved proxy never attempts the network.
    let proxy = RequestProxy::new(None, "/api/site");
    assert!(proxy.handle::<ManageCert>("manageCert").is_none());
    assert!(proxy.handle::<PurgeCerts>("purgeCerts").is_none());
}

#[tokio::test]
async fn test_round_trip_preserves_envelope_structure() {
    let base_url = start_test_server(Arc::new(AtomicUsize::new(0))).await;

    let proxy = RequestProxy::new(Some(&base_url), "/api/site");
    let certs = proxy.handle::<ManageCert>("manageCert").unwrap();

    let created = certs
        .request(&CertParams::Create {
            hostname: "roundtrip.test".into(),
        })
        .await;
    assert_eq!(created.status, EnvelopeStatus::Success);
    assert_eq!(created.message.as_deref(), Some("certificate ready"));
    let row = created.data.unwrap();
    assert_eq!(row["hostname"], "roundtrip.test");
    assert_eq!(row["status"], "issued");
    assert!(row["id"].is_string());
}
