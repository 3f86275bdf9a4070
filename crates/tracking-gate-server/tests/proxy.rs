// crates/tracking-gate-server/tests/proxy.rs
// ============================================================================
// Module: Reverse Proxy Tests
// Description: End-to-end requests through the axum router to a scripted upstream.
// ============================================================================
//! ## Overview
//! Runs the full router against a tiny_http upstream backed by the in-memory
//! store, covering tagging after creation, denial before forwarding,
//! unauthenticated response shaping, search filtering, and rejection of
//! request paths that the upstream would normalize into another route.

#![allow(clippy::unwrap_used, reason = "Tests use unwrap on deterministic fixtures.")]

mod common;

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::Mutex;

use serde_json::Value;
use serde_json::json;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracking_gate_config::AuditConfig;
use tracking_gate_config::AuthorizationConfig;
use tracking_gate_config::GateConfig;
use tracking_gate_config::ProviderConfig;
use tracking_gate_config::ProviderKind;
use tracking_gate_config::ServerConfig;
use tracking_gate_core::InMemoryProjectDirectory;
use tracking_gate_core::InMemoryTrackingStore;
use tracking_gate_core::ProjectClientError;
use tracking_gate_core::SearchQuery;
use tracking_gate_core::TrackingStore;
use tracking_gate_core::tag_value;
use tracking_gate_server::AuditSink;
use tracking_gate_server::Collaborators;
use tracking_gate_server::TrackingGateServer;
use tracking_gate_server::audit::FilterAuditEvent;
use tracking_gate_server::audit::GateAuditEvent;

use crate::common::PROJECT_TAG;
use crate::common::ScriptedServer;
use crate::common::directory;
use crate::common::owned_by;
use crate::common::spawn_upstream;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

/// Audit sink that keeps events in memory.
#[derive(Default)]
struct RecordingSink {
    gates: Mutex<Vec<GateAuditEvent>>,
    filters: Mutex<Vec<FilterAuditEvent>>,
}

impl AuditSink for RecordingSink {
    fn record_gate(&self, event: &GateAuditEvent) {
        self.gates.lock().unwrap().push(event.clone());
    }

    fn record_filter(&self, event: &FilterAuditEvent) {
        self.filters.lock().unwrap().push(event.clone());
    }
}

fn config(upstream_url: &str) -> GateConfig {
    GateConfig {
        server: ServerConfig {
            upstream_url: upstream_url.to_string(),
            ..ServerConfig::default()
        },
        authorization: AuthorizationConfig::default(),
        provider: ProviderConfig {
            kind: ProviderKind::Gitlab,
            base_url: "http://127.0.0.1:9".to_string(),
            mandatory_topics: Vec::new(),
            connect_timeout_ms: 500,
            request_timeout_ms: 1_000,
            user_agent: "tracking-gate-tests".to_string(),
            max_response_bytes: 1024 * 1024,
        },
        audit: AuditConfig::default(),
    }
}

/// Starts the gate in front of `upstream` and returns its base URL.
async fn start_gate(
    upstream: &ScriptedServer,
    client: InMemoryProjectDirectory,
    store: &InMemoryTrackingStore,
    audit: Arc<RecordingSink>,
) -> String {
    let server = TrackingGateServer::with_collaborators(
        config(&upstream.url),
        Collaborators {
            project_client: Arc::new(client),
            store: Arc::new(store.clone()),
            audit,
        },
    )
    .unwrap();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    let app = server.router();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}")
}

/// Scripted tracking server over the shared in-memory store.
fn tracking_upstream(store: &InMemoryTrackingStore, max_requests: usize) -> ScriptedServer {
    let store = store.clone();
    spawn_upstream(max_requests, move |request| {
        let body: Value = serde_json::from_str(&request.body).unwrap_or(Value::Null);
        let path = request.url.split('?').next().unwrap_or_default();
        match path {
            "/api/2.0/mlflow/experiments/create" => {
                let name = body["name"].as_str().unwrap_or_default();
                let id = store.create_experiment(name, Vec::new()).unwrap();
                (200, json!({"experiment_id": id}).to_string())
            }
            "/api/2.0/mlflow/runs/search" => {
                let params = body.as_object().cloned().unwrap_or_default();
                let page = store.search_runs(&SearchQuery::from_params(params)).unwrap();
                let payload = json!({"runs": page.items, "next_page_token": page.next_page_token});
                (200, payload.to_string())
            }
            _ => (200, "{}".to_string()),
        }
    })
}

fn client() -> reqwest::Client {
    reqwest::Client::new()
}

async fn post(url: &str, body: &Value, token: Option<&str>, agent: &str) -> reqwest::Response {
    let mut request = client()
        .post(url)
        .header("content-type", "application/json")
        .header("user-agent", agent)
        .body(serde_json::to_vec(body).unwrap());
    if let Some(token) = token {
        request = request.bearer_auth(token);
    }
    request.send().await.unwrap()
}

/// Sends `target` verbatim on the request line and returns the status code.
///
/// HTTP clients resolve dot segments before sending, so non-canonical paths
/// are written to the socket directly.
async fn raw_status(
    gate: &str,
    method: &str,
    target: &str,
    body: &Value,
    token: Option<&str>,
) -> u16 {
    let addr = gate.trim_start_matches("http://");
    let payload = serde_json::to_vec(body).unwrap();
    let authorization =
        token.map(|token| format!("Authorization: Bearer {token}\r\n")).unwrap_or_default();
    let head = format!(
        "{method} {target} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\
         User-Agent: mlflow-python-client/2.9\r\nContent-Type: application/json\r\n\
         Content-Length: {}\r\n{authorization}\r\n",
        payload.len()
    );
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(head.as_bytes()).await.unwrap();
    stream.write_all(&payload).await.unwrap();
    let mut response = Vec::new();
    stream.read_to_end(&mut response).await.unwrap();
    let text = String::from_utf8_lossy(&response);
    text.split(' ').nth(1).unwrap().parse().unwrap()
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn developer_creation_is_forwarded_and_tagged() {
    let store = InMemoryTrackingStore::new();
    let upstream = tracking_upstream(&store, 1);
    let audit = Arc::new(RecordingSink::default());
    let gate = start_gate(&upstream, directory(), &store, Arc::clone(&audit)).await;

    let url = format!("{gate}/teams/alpha/tracking/api/2.0/mlflow/experiments/create");
    let response = post(&url, &json!({"name": "Run1 (42)"}), Some("token-1"), "mlflow").await;
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = serde_json::from_slice(&response.bytes().await.unwrap()).unwrap();
    let id = body["experiment_id"].as_str().unwrap().to_string();

    let experiment = store.get_experiment(&id).unwrap();
    assert_eq!(tag_value(&experiment.tags, PROJECT_TAG), Some("teams/alpha"));
    let received = upstream.received();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].url, "/api/2.0/mlflow/experiments/create");
    assert_eq!(received[0].authorization.as_deref(), Some("Bearer token-1"));
    let gates = audit.gates.lock().unwrap();
    assert_eq!(gates[0].outcome, "proceed");
    assert_eq!(gates[0].scope, "teams/alpha");
}

#[tokio::test(flavor = "multi_thread")]
async fn denied_requests_never_reach_the_upstream() {
    let store = InMemoryTrackingStore::new();
    let experiment = store.create_experiment("b (43)", owned_by("teams/beta")).unwrap();
    let run_id = store.create_run(&experiment).unwrap();
    let upstream = tracking_upstream(&store, 1);
    let gate = start_gate(&upstream, directory(), &store, Arc::default()).await;

    let url = format!("{gate}/api/2.0/mlflow/runs/delete");
    let response = post(&url, &json!({"run_id": run_id}), Some("token-1"), "mlflow").await;
    assert_eq!(response.status().as_u16(), 403);
    assert_eq!(response.bytes().await.unwrap().as_ref(), b"Permission denied.");
    assert!(upstream.received().is_empty());
    assert!(store.get_run(&run_id).is_ok());
}

#[tokio::test(flavor = "multi_thread")]
async fn unauthenticated_responses_depend_on_the_client() {
    let store = InMemoryTrackingStore::new();
    let upstream = tracking_upstream(&store, 1);
    let gate = start_gate(&upstream, directory(), &store, Arc::default()).await;
    let url = format!("{gate}/api/2.0/mlflow/runs/delete");

    let api = post(&url, &json!({"run_id": "run-0"}), None, "mlflow-python-client/2.9").await;
    assert_eq!(api.status().as_u16(), 401);
    let challenge = api.headers().get("www-authenticate").unwrap().to_str().unwrap();
    assert_eq!(challenge, "Bearer realm=\"mlflow\"");

    let browser = post(&url, &json!({"run_id": "run-0"}), None, "Mozilla/5.0").await;
    assert_eq!(browser.status().as_u16(), 401);
    assert!(browser.headers().get("www-authenticate").is_none());
    assert!(upstream.received().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn search_responses_are_filtered() {
    let store = InMemoryTrackingStore::new();
    let mine = store.create_experiment("a (42)", owned_by("teams/alpha")).unwrap();
    let other = store.create_experiment("x", owned_by("teams/hidden")).unwrap();
    let hidden = store.create_run(&other).unwrap();
    let visible = store.create_run(&mine).unwrap();
    let upstream = tracking_upstream(&store, 1);
    let audit = Arc::new(RecordingSink::default());
    let gate = start_gate(&upstream, directory(), &store, Arc::clone(&audit)).await;

    let url = format!("{gate}/api/2.0/mlflow/runs/search");
    let response = post(&url, &json!({"max_results": 10}), Some("token-1"), "mlflow").await;
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = serde_json::from_slice(&response.bytes().await.unwrap()).unwrap();
    let runs = body["runs"].as_array().unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0]["info"]["run_id"], visible.as_str());
    assert!(!body.to_string().contains(&hidden));
    let filters = audit.filters.lock().unwrap();
    assert_eq!(filters[0].hidden, 1);
    assert_eq!(filters[0].returned, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn provider_outage_is_a_bad_gateway() {
    let store = InMemoryTrackingStore::new();
    let experiment = store.create_experiment("a (42)", owned_by("teams/alpha")).unwrap();
    let upstream = tracking_upstream(&store, 1);
    let failing = directory().failing(ProjectClientError::Unavailable("down".to_string()));
    let gate = start_gate(&upstream, failing, &store, Arc::default()).await;

    let url = format!("{gate}/api/2.0/mlflow/experiments/delete");
    let response =
        post(&url, &json!({"experiment_id": experiment}), Some("token-1"), "mlflow").await;
    assert_eq!(response.status().as_u16(), 502);
    assert!(upstream.received().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn non_canonical_paths_are_rejected_before_forwarding() {
    let store = InMemoryTrackingStore::new();
    let experiment = store.create_experiment("b (43)", owned_by("teams/beta")).unwrap();
    let run_id = store.create_run(&experiment).unwrap();
    let upstream = tracking_upstream(&store, 1);
    let gate = start_gate(&upstream, directory(), &store, Arc::default()).await;
    let body = json!({"run_id": run_id});

    let with_token = [
        "/api/2.0/mlflow/x/../runs/delete",
        "/api/2.0/mlflow/x/%2e%2e/runs/delete",
        "/api/2.0/mlflow/./runs/delete",
        "/api/2.0/mlflow//runs/delete",
        "/teams/x/tracking/../../api/2.0/mlflow/runs/delete",
    ];
    for target in with_token {
        let status = raw_status(&gate, "POST", target, &body, Some("token-1")).await;
        assert_eq!(status, 400, "{target}");
    }
    let without_token = [
        "/health/../api/2.0/mlflow/runs/delete",
        "/auth/../api/2.0/mlflow/runs/delete",
        "/auth%2f..%2fapi/2.0/mlflow/runs/delete",
        "/static-files/static/../../api/2.0/mlflow/runs/delete",
    ];
    for target in without_token {
        assert_eq!(raw_status(&gate, "POST", target, &body, None).await, 400, "{target}");
    }
    assert!(upstream.received().is_empty());
    assert!(store.get_run(&run_id).is_ok());
}

#[tokio::test(flavor = "multi_thread")]
async fn encoded_route_names_are_gated_as_decoded() {
    let store = InMemoryTrackingStore::new();
    let experiment = store.create_experiment("b (43)", owned_by("teams/beta")).unwrap();
    let run_id = store.create_run(&experiment).unwrap();
    let upstream = tracking_upstream(&store, 1);
    let gate = start_gate(&upstream, directory(), &store, Arc::default()).await;
    let body = json!({"run_id": run_id});

    let target = "/api/2.0/mlflow/runs/%64elete";
    assert_eq!(raw_status(&gate, "POST", target, &body, Some("token-1")).await, 403);
    assert_eq!(raw_status(&gate, "POST", target, &body, None).await, 401);
    let trailing = "/api/2.0/mlflow/runs/delete/";
    assert_eq!(raw_status(&gate, "POST", trailing, &body, Some("token-1")).await, 403);
    assert!(upstream.received().is_empty());
    assert!(store.get_run(&run_id).is_ok());
}

#[tokio::test(flavor = "multi_thread")]
async fn forwarded_path_is_the_gated_path() {
    let store = InMemoryTrackingStore::new();
    let experiment = store.create_experiment("g (44)", owned_by("teams/gamma")).unwrap();
    let run_id = store.create_run(&experiment).unwrap();
    let upstream = tracking_upstream(&store, 1);
    let gate = start_gate(&upstream, directory(), &store, Arc::default()).await;

    let body = json!({"run_id": run_id});
    let target = "/api/2.0/mlflow/runs/%64elete";
    assert_eq!(raw_status(&gate, "POST", target, &body, Some("token-1")).await, 200);
    let received = upstream.received();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].url, "/api/2.0/mlflow/runs/delete");
}

#[tokio::test(flavor = "multi_thread")]
async fn unprotected_prefixes_match_whole_segments() {
    let store = InMemoryTrackingStore::new();
    let upstream = tracking_upstream(&store, 1);
    let gate = start_gate(&upstream, directory(), &store, Arc::default()).await;

    assert_eq!(raw_status(&gate, "GET", "/healthz", &Value::Null, None).await, 401);
    assert_eq!(raw_status(&gate, "GET", "/authz/token", &Value::Null, None).await, 401);
    assert!(upstream.received().is_empty());
    assert_eq!(raw_status(&gate, "GET", "/health", &Value::Null, None).await, 200);
    let received = upstream.received();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].url, "/health");
}
