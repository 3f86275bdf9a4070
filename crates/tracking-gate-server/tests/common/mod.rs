// crates/tracking-gate-server/tests/common/mod.rs
// ============================================================================
// Module: Server Test Fixtures
// Description: In-memory collaborators and request helpers for gate tests.
// ============================================================================
//! ## Overview
//! Builds a project directory, an in-memory tracking store, and a gate over
//! them so tests can drive requests without any network. [`spawn_upstream`]
//! stands in for the tracking server in proxy tests.

#![allow(dead_code, reason = "Shared helpers are used by a subset of test binaries.")]
#![allow(clippy::unwrap_used, reason = "Tests use unwrap on deterministic fixtures.")]

use std::sync::mpsc;
use std::thread;
use std::time::Duration;
use std::time::Instant;

use serde_json::Value;
use tiny_http::Header;
use tiny_http::Response;
use tiny_http::Server;
use tracking_gate_core::EntityTag;
use tracking_gate_core::InMemoryProjectDirectory;
use tracking_gate_core::InMemoryTrackingStore;
use tracking_gate_core::ProjectId;
use tracking_gate_core::ProjectPath;
use tracking_gate_core::RequestAuth;
use tracking_gate_core::Role;
use tracking_gate_server::AuthorizationGate;
use tracking_gate_server::GateError;
use tracking_gate_server::GateOutcome;
use tracking_gate_server::GateRequest;
use tracking_gate_server::RequestParams;
use tracking_gate_server::RouteTable;
use tracking_gate_server::SessionRegistry;
use tracking_gate_server::routes::split_project_path;

/// Reserved project tag key used throughout the tests.
pub const PROJECT_TAG: &str = "project";

pub fn path(raw: &str) -> ProjectPath {
    ProjectPath::parse(raw).unwrap()
}

/// Caller is Developer in alpha (42), Guest in beta (43), Owner in gamma (44).
pub fn directory() -> InMemoryProjectDirectory {
    InMemoryProjectDirectory::new()
        .with_project(path("teams/alpha"), ProjectId::new(42), Role::Developer)
        .with_project(path("teams/beta"), ProjectId::new(43), Role::Guest)
        .with_project(path("teams/gamma"), ProjectId::new(44), Role::Owner)
}

pub fn owned_by(project: &str) -> Vec<EntityTag> {
    vec![EntityTag::new(PROJECT_TAG, project)]
}

pub fn bearer() -> RequestAuth {
    RequestAuth::bearer("token-1")
}

/// Gate collaborators over in-memory state.
pub struct Fixture {
    pub store: InMemoryTrackingStore,
    pub directory: InMemoryProjectDirectory,
    pub routes: RouteTable,
    pub sessions: SessionRegistry,
}

impl Fixture {
    pub fn new(directory: InMemoryProjectDirectory) -> Self {
        Self {
            store: InMemoryTrackingStore::new(),
            directory,
            routes: RouteTable::new(),
            sessions: SessionRegistry::new(Duration::from_secs(300), Duration::from_secs(3600), 16),
        }
    }

    pub fn gate(&self) -> AuthorizationGate<'_> {
        AuthorizationGate::new(
            &self.routes,
            &self.directory,
            &self.store,
            &self.sessions,
            PROJECT_TAG,
        )
    }

    /// Runs the gate for a JSON-body request on `raw_path`.
    pub fn post(
        &self,
        raw_path: &str,
        body: &Value,
        auth: &RequestAuth,
    ) -> Result<GateOutcome, GateError> {
        let bytes = serde_json::to_vec(body).unwrap();
        self.send("POST", raw_path, None, &bytes, auth)
    }

    /// Runs the gate for a query-string request on `raw_path`.
    pub fn get(
        &self,
        raw_path: &str,
        query: &str,
        auth: &RequestAuth,
    ) -> Result<GateOutcome, GateError> {
        self.send("GET", raw_path, Some(query), &[], auth)
    }

    pub fn send(
        &self,
        method: &str,
        raw_path: &str,
        query: Option<&str>,
        body: &[u8],
        auth: &RequestAuth,
    ) -> Result<GateOutcome, GateError> {
        let (scope, routed) = split_project_path(raw_path);
        let params = RequestParams::resolve(method, query, body);
        self.gate().authorize(
            &GateRequest {
                method,
                path: &routed,
                scope: &scope,
                auth,
                params: &params,
            },
            Instant::now(),
        )
    }
}

// ============================================================================
// SECTION: Scripted Upstream
// ============================================================================

/// Request observed by the scripted upstream.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    /// Path and query.
    pub url: String,
    pub authorization: Option<String>,
    pub body: String,
}

/// Running scripted upstream.
pub struct ScriptedServer {
    /// Base URL (`http://127.0.0.1:port`).
    pub url: String,
    pub requests: mpsc::Receiver<Recorded>,
}

impl ScriptedServer {
    /// Returns the requests recorded so far.
    pub fn received(&self) -> Vec<Recorded> {
        self.requests.try_iter().collect()
    }
}

/// Serves up to `max_requests` requests with `handler` on a background thread.
pub fn spawn_upstream<F>(max_requests: usize, handler: F) -> ScriptedServer
where
    F: Fn(&Recorded) -> (u16, String) + Send + 'static,
{
    let server = Server::http("127.0.0.1:0").unwrap();
    let addr = server.server_addr().to_ip().unwrap();
    let (sender, requests) = mpsc::channel();
    thread::spawn(move || {
        for _ in 0 .. max_requests {
            let Ok(Some(mut request)) = server.recv_timeout(Duration::from_secs(10)) else {
                return;
            };
            let authorization = request
                .headers()
                .iter()
                .find(|header| header.field.equiv("Authorization"))
                .map(|header| header.value.as_str().to_string());
            let mut body = String::new();
            let _ = request.as_reader().read_to_string(&mut body);
            let recorded = Recorded {
                method: request.method().as_str().to_string(),
                url: request.url().to_string(),
                authorization,
                body,
            };
            let (status, payload) = handler(&recorded);
            let _ = sender.send(recorded);
            let content_type =
                Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]).unwrap();
            let response =
                Response::from_string(payload).with_status_code(status).with_header(content_type);
            let _ = request.respond(response);
        }
    });
    ScriptedServer {
        url: format!("http://{addr}"),
        requests,
    }
}
