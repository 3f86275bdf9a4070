// crates/tracking-gate-providers/tests/common/mod.rs
// ============================================================================
// Module: Common Test Fixtures
// Description: Scripted tiny_http servers standing in for remote services.
// Purpose: Provide reusable, deterministic HTTP fixtures for client tests.
// Dependencies: tiny_http
// ============================================================================

//! ## Overview
//! [`spawn_server`] serves a fixed number of requests from a handler closure
//! and records every request it sees so tests can assert on the outbound
//! URL, headers, and body.

#![allow(dead_code, reason = "Shared test helpers may be unused in some cases.")]
#![allow(clippy::unwrap_used, reason = "Fixture setup failures abort the test.")]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use tiny_http::Header;
use tiny_http::Request;
use tiny_http::Response;
use tiny_http::Server;

// ============================================================================
// SECTION: Recorded Requests
// ============================================================================

/// Request observed by a scripted server.
#[derive(Debug, Clone)]
pub struct Recorded {
    /// HTTP method.
    pub method: String,
    /// Path and query.
    pub url: String,
    /// `Authorization` header value.
    pub authorization: Option<String>,
    /// `Cookie` header value.
    pub cookie: Option<String>,
    /// Request body.
    pub body: String,
}

/// Running scripted server.
pub struct ScriptedServer {
    /// Base URL (`http://127.0.0.1:port`).
    pub url: String,
    /// Requests observed so far.
    pub requests: mpsc::Receiver<Recorded>,
    /// Server thread.
    pub handle: thread::JoinHandle<()>,
}

impl ScriptedServer {
    /// Waits for the server thread and returns every recorded request.
    pub fn finish(self) -> Vec<Recorded> {
        self.handle.join().unwrap();
        self.requests.try_iter().collect()
    }
}

// ============================================================================
// SECTION: Server
// ============================================================================

/// Returns the value of header `name`, if present.
fn header_value(request: &Request, name: &'static str) -> Option<String> {
    request
        .headers()
        .iter()
        .find(|header| header.field.equiv(name))
        .map(|header| header.value.as_str().to_string())
}

/// Serves up to `max_requests` requests with `handler`.
pub fn spawn_server<F>(max_requests: usize, handler: F) -> ScriptedServer
where
    F: Fn(&Recorded) -> (u16, String) + Send + 'static,
{
    let server = Server::http("127.0.0.1:0").unwrap();
    let addr = server.server_addr().to_ip().unwrap();
    let (sender, requests) = mpsc::channel();
    let handle = thread::spawn(move || {
        for _ in 0 .. max_requests {
            let Ok(Some(mut request)) = server.recv_timeout(Duration::from_secs(5)) else {
                return;
            };
            let authorization = header_value(&request, "Authorization");
            let cookie = header_value(&request, "Cookie");
            let mut body = String::new();
            let _ = request.as_reader().read_to_string(&mut body);
            let recorded = Recorded {
                method: request.method().as_str().to_string(),
                url: request.url().to_string(),
                authorization,
                cookie,
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
        handle,
    }
}
