// crates/tracking-gate-server/src/server.rs
// ============================================================================
// Module: Tracking Gate Server
// Description: Reverse proxy wiring the gate, filter, and initializer.
// Purpose: Front a tracking server with project-scoped authorization.
// Dependencies: axum, reqwest, tokio, tracking-gate-{config, core, providers}
// ============================================================================

//! ## Overview
//! One fallback handler serves every path. Per request it:
//! 1. strips an optional `/<project>/tracking` prefix into a [`ProjectScope`],
//! 2. runs the [`AuthorizationGate`] on a blocking worker,
//! 3. forwards allowed requests to the upstream tracking server,
//! 4. filters successful search responses and tags successful creations.
//!
//! Collaborator calls (provider, store) are synchronous and always run on
//! `spawn_blocking` workers so the async runtime never stalls on them.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::body::Body;
use axum::body::Bytes;
use axum::extract::Request;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::HeaderName;
use axum::http::Method;
use axum::http::StatusCode;
use axum::http::header;
use axum::response::Response;
use thiserror::Error;
use tracking_gate_config::AuditConfig;
use tracking_gate_config::AuditSinkKind;
use tracking_gate_config::AuthorizationConfig;
use tracking_gate_config::GateConfig;
use tracking_gate_config::ServerConfig;
use tracking_gate_core::CallerKey;
use tracking_gate_core::PermissionResolver;
use tracking_gate_core::ProjectAuthorizationClient;
use tracking_gate_core::ProjectScope;
use tracking_gate_core::RequestAuth;
use tracking_gate_core::SearchQuery;
use tracking_gate_core::TrackingStore;
use tracking_gate_providers::project_client_from_config;
use tracking_gate_providers::tracking_store_from_config;
use url::Url;

use crate::audit::AuditSink;
use crate::audit::FileAuditSink;
use crate::audit::FilterAuditEvent;
use crate::audit::FilterAuditEventParams;
use crate::audit::GateAuditEvent;
use crate::audit::GateAuditEventParams;
use crate::audit::InitializerAuditEvent;
use crate::audit::NoopAuditSink;
use crate::audit::StderrAuditSink;
use crate::filter::FilterError;
use crate::filter::FilteredResponse;
use crate::filter::VisibilityFilter;
use crate::gate::AuthorizationGate;
use crate::gate::GateError;
use crate::gate::GateOutcome;
use crate::gate::GateRequest;
use crate::gate::GateVerdict;
use crate::initializer::InitializerError;
use crate::initializer::ProjectTagInitializer;
use crate::initializer::TaggedEntity;
use crate::request::ParamError;
use crate::request::RequestParams;
use crate::responses;
use crate::routes;
use crate::routes::OperationKind;
use crate::routes::RouteTable;
use crate::routes::SearchKind;
use crate::session::SessionRegistry;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Logout path; the caller's cache scope is dropped before forwarding.
pub const LOGOUT_PATH: &str = "/auth/logout";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Server construction and transport failures.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Configuration was rejected.
    #[error("config error: {0}")]
    Config(String),
    /// A collaborator could not be built.
    #[error("init error: {0}")]
    Init(String),
    /// Listener or connection failure.
    #[error("transport error: {0}")]
    Transport(String),
}

// ============================================================================
// SECTION: Server
// ============================================================================

/// Collaborators the server delegates to.
#[derive(Clone)]
pub struct Collaborators {
    /// Project authorization backend.
    pub project_client: Arc<dyn ProjectAuthorizationClient>,
    /// Tracking store for entity lookup, refetch, and tag writes.
    pub store: Arc<dyn TrackingStore>,
    /// Audit sink.
    pub audit: Arc<dyn AuditSink>,
}

/// Shared request-handling state.
struct ServerState {
    /// Proxy settings.
    server: ServerConfig,
    /// Authorization tuning.
    authorization: AuthorizationConfig,
    /// Route classification.
    routes: RouteTable,
    /// Project authorization backend.
    client: Arc<dyn ProjectAuthorizationClient>,
    /// Tracking store.
    store: Arc<dyn TrackingStore>,
    /// Per-caller role cache scopes.
    sessions: SessionRegistry,
    /// Audit sink.
    audit: Arc<dyn AuditSink>,
    /// Upstream HTTP client.
    http: reqwest::Client,
    /// Upstream base URL.
    upstream: Url,
}

impl ServerState {
    /// Returns a gate over this state's collaborators.
    fn gate(&self) -> AuthorizationGate<'_> {
        AuthorizationGate::new(
            &self.routes,
            self.client.as_ref(),
            self.store.as_ref(),
            &self.sessions,
            &self.authorization.project_tag,
        )
    }
}

/// Authorization reverse proxy in front of a tracking server.
pub struct TrackingGateServer {
    /// Shared state handed to every request.
    state: Arc<ServerState>,
}

impl TrackingGateServer {
    /// Builds a server and its collaborators from configuration.
    ///
    /// The REST store uses a blocking client; call this off the async runtime.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when validation or collaborator setup fails.
    pub fn from_config(config: GateConfig) -> Result<Self, ServerError> {
        config.validate().map_err(|err| ServerError::Config(err.to_string()))?;
        let project_client = project_client_from_config(&config.provider)
            .map_err(|err| ServerError::Init(format!("project client: {err}")))?;
        let store = tracking_store_from_config(
            &config.server.upstream_url,
            &config.provider,
            config.server.max_body_bytes,
        )
        .map_err(|err| ServerError::Init(format!("tracking store: {err}")))?;
        let audit = audit_sink_from_config(&config.audit)?;
        Self::with_collaborators(
            config,
            Collaborators {
                project_client,
                store: Arc::new(store),
                audit,
            },
        )
    }

    /// Builds a server around explicit collaborators.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when the upstream URL or HTTP client is invalid.
    pub fn with_collaborators(
        config: GateConfig,
        collaborators: Collaborators,
    ) -> Result<Self, ServerError> {
        let upstream = Url::parse(&config.server.upstream_url)
            .map_err(|err| ServerError::Config(format!("server.upstream_url: {err}")))?;
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|err| ServerError::Init(format!("upstream client: {err}")))?;
        let sessions = SessionRegistry::new(
            config.authorization.cache_timeout(),
            config.authorization.auth_cache_timeout(),
            config.authorization.max_sessions,
        );
        let state = ServerState {
            server: config.server,
            authorization: config.authorization,
            routes: RouteTable::new(),
            client: collaborators.project_client,
            store: collaborators.store,
            sessions,
            audit: collaborators.audit,
            http,
            upstream,
        };
        Ok(Self {
            state: Arc::new(state),
        })
    }

    /// Returns the HTTP router.
    #[must_use]
    pub fn router(&self) -> Router {
        Router::new().fallback(handle_request).with_state(Arc::clone(&self.state))
    }

    /// Binds the configured address and serves until the listener fails.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Transport`] when binding or serving fails.
    pub async fn serve(self) -> Result<(), ServerError> {
        let addr =
            self.state.server.bind_addr().map_err(|err| ServerError::Config(err.to_string()))?;
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|err| ServerError::Transport(format!("http bind failed: {err}")))?;
        let app = self.router();
        axum::serve(listener, app)
            .await
            .map_err(|err| ServerError::Transport(format!("http server failed: {err}")))
    }
}

/// Builds the configured audit sink.
///
/// # Errors
///
/// Returns [`ServerError::Init`] when the audit file cannot be opened.
pub fn audit_sink_from_config(config: &AuditConfig) -> Result<Arc<dyn AuditSink>, ServerError> {
    match (config.sink, config.path.as_deref()) {
        (AuditSinkKind::Stderr, _) => Ok(Arc::new(StderrAuditSink)),
        (AuditSinkKind::None, _) => Ok(Arc::new(NoopAuditSink)),
        (AuditSinkKind::File, Some(path)) => {
            let sink = FileAuditSink::new(Path::new(path))
                .map_err(|err| ServerError::Init(format!("audit log: {err}")))?;
            Ok(Arc::new(sink))
        }
        (AuditSinkKind::File, None) => {
            Err(ServerError::Config("audit.sink=file requires audit.path".to_string()))
        }
    }
}

// ============================================================================
// SECTION: Request Handling
// ============================================================================

/// Per-request facts carried from the gate to post-processing.
struct Exchange {
    /// HTTP method.
    method: Method,
    /// Canonical routed path without any project prefix.
    path: String,
    /// Raw query string.
    query: Option<String>,
    /// Project scope.
    scope: ProjectScope,
    /// Caller credentials.
    auth: RequestAuth,
    /// Parsed parameters.
    params: Result<RequestParams, ParamError>,
}

/// Handles every inbound request.
async fn handle_request(State(state): State<Arc<ServerState>>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let canonical = match routes::canonical_path(parts.uri.path()) {
        Ok(canonical) => canonical,
        Err(err) => return responses::bad_request(&err.to_string()),
    };
    let Ok(body) = axum::body::to_bytes(body, state.server.max_body_bytes).await else {
        return responses::payload_too_large();
    };
    let (scope, path) = routes::split_project_path(&canonical);
    let auth = RequestAuth::from_headers(
        header_str(&parts.headers, &header::AUTHORIZATION),
        header_str(&parts.headers, &header::COOKIE),
        &state.server.session_cookie,
    );
    let query = parts.uri.query().map(str::to_string);
    let params = RequestParams::resolve(parts.method.as_str(), query.as_deref(), &body);
    let exchange = Exchange {
        method: parts.method.clone(),
        path,
        query,
        scope,
        auth,
        params,
    };

    if exchange.path == LOGOUT_PATH
        && let Some(caller) = exchange.auth.caller_key()
        && state.sessions.clear(&caller).is_err()
    {
        return responses::internal_error();
    }

    let gated = {
        let state = Arc::clone(&state);
        tokio::task::spawn_blocking(move || {
            let result = state.gate().authorize(
                &GateRequest {
                    method: exchange.method.as_str(),
                    path: &exchange.path,
                    scope: &exchange.scope,
                    auth: &exchange.auth,
                    params: &exchange.params,
                },
                Instant::now(),
            );
            (result, exchange)
        })
        .await
    };
    let Ok((decision, exchange)) = gated else {
        return responses::internal_error();
    };
    record_gate(&state, &exchange, &decision);

    let outcome = match decision {
        Ok(outcome) => outcome,
        Err(err) => return responses::gate_error(&err),
    };
    match outcome.verdict {
        GateVerdict::Unauthenticated => {
            let user_agent = header_str(&parts.headers, &header::USER_AGENT);
            return responses::unauthenticated(&state.server, user_agent, &exchange.scope);
        }
        GateVerdict::Forbidden => return responses::forbidden(),
        GateVerdict::Proceed => {}
    }

    let Ok((status, headers, upstream_body)) =
        forward(&state, &exchange, &parts.headers, body).await
    else {
        return responses::bad_gateway();
    };
    if !status.is_success() {
        return build_response(status, &headers, upstream_body);
    }
    match outcome.operation {
        Some(operation) => {
            postprocess(state, outcome, operation, exchange, status, headers, upstream_body).await
        }
        None => build_response(status, &headers, upstream_body),
    }
}

/// Applies the visibility filter or the project-tag initializer to a success.
async fn postprocess(
    state: Arc<ServerState>,
    outcome: GateOutcome,
    operation: OperationKind,
    exchange: Exchange,
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Some(kind) = operation.search() {
        let Some(caller) = exchange.auth.caller_key() else {
            return build_response(status, &headers, body);
        };
        let audit_state = Arc::clone(&state);
        let scope_label = exchange.scope.label();
        let filtered = tokio::task::spawn_blocking(move || {
            filter_search(&state, kind, &caller, &exchange, &body)
                .map(|filtered| (filtered, caller))
        })
        .await;
        let Ok(filtered) = filtered else {
            return responses::internal_error();
        };
        return match filtered {
            Ok((filtered, caller)) => {
                let report = filtered.report;
                audit_state.audit.record_filter(&FilterAuditEvent::new(FilterAuditEventParams {
                    operation: operation.label(),
                    scope: scope_label,
                    caller: Some(fingerprint(&caller)),
                    returned: report.returned,
                    hidden: report.hidden,
                    backfill_requests: report.backfill_requests,
                    exhausted: report.exhausted,
                    error: None,
                }));
                build_response(status, &headers, Bytes::from(filtered.body))
            }
            Err(err) => {
                audit_state.audit.record_filter(&FilterAuditEvent::new(FilterAuditEventParams {
                    operation: operation.label(),
                    scope: scope_label,
                    caller: None,
                    returned: 0,
                    hidden: 0,
                    backfill_requests: 0,
                    exhausted: false,
                    error: Some(err.to_string()),
                }));
                responses::filter_error(&err)
            }
        };
    }

    if outcome.predicate.is_none() || exchange.scope.project().is_none() {
        return build_response(status, &headers, body);
    }
    let creation =
        matches!(operation, OperationKind::CreateExperiment | OperationKind::CreateRegisteredModel);
    if !creation {
        return build_response(status, &headers, body);
    }
    let task_state = Arc::clone(&state);
    let scope_label = exchange.scope.label();
    let initialized = tokio::task::spawn_blocking(move || {
        let result = tag_creation(&task_state, operation, &exchange, &body);
        (result, body)
    })
    .await;
    let Ok((result, body)) = initialized else {
        return responses::internal_error();
    };
    match result {
        Ok(tagged) => {
            let outcome = match tagged {
                Some(TaggedEntity::Experiment(_)) => "tagged_experiment",
                Some(TaggedEntity::RegisteredModel(_)) => "tagged_registered_model",
                None => "skipped",
            };
            state.audit.record_initializer(&InitializerAuditEvent::new(
                operation.label(),
                scope_label,
                outcome,
                None,
            ));
            build_response(status, &headers, body)
        }
        Err(err) => {
            state.audit.record_initializer(&InitializerAuditEvent::new(
                operation.label(),
                scope_label,
                "failed",
                Some(err.to_string()),
            ));
            responses::internal_error()
        }
    }
}

/// Runs the visibility filter for one search response.
fn filter_search(
    state: &ServerState,
    kind: SearchKind,
    caller: &CallerKey,
    exchange: &Exchange,
    body: &[u8],
) -> Result<FilteredResponse, FilterError> {
    let now = Instant::now();
    let cache = state.sessions.scope(caller, now)?;
    let mut resolver = PermissionResolver::new(
        state.client.as_ref(),
        &cache,
        &exchange.auth,
        &exchange.scope,
        &state.authorization.project_tag,
        now,
    );
    let values =
        exchange.params.as_ref().map(|params| params.values().clone()).unwrap_or_default();
    let query = SearchQuery::from_params(values);
    VisibilityFilter::new(state.store.as_ref(), state.authorization.max_backfill_requests)
        .apply(kind, body, &query, &mut resolver)
}

/// Runs the project-tag initializer for one creation response.
fn tag_creation(
    state: &ServerState,
    operation: OperationKind,
    exchange: &Exchange,
    body: &[u8],
) -> Result<Option<TaggedEntity>, InitializerError> {
    let Ok(params) = exchange.params.as_ref() else {
        return Err(InitializerError::MissingIdentifier("request parameters"));
    };
    ProjectTagInitializer::new(state.store.as_ref(), &state.authorization.project_tag).apply(
        operation,
        &exchange.scope,
        params,
        body,
    )
}

// ============================================================================
// SECTION: Upstream
// ============================================================================

/// Upstream failure; always surfaced as a bad gateway.
struct UpstreamError;

/// Forwards the request upstream and reads a bounded response.
async fn forward(
    state: &ServerState,
    exchange: &Exchange,
    inbound: &HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, HeaderMap, Bytes), UpstreamError> {
    let mut target = state.upstream.clone();
    let base = state.upstream.path().trim_end_matches('/');
    target.set_path(&format!("{base}{}", routes::encode_path(&exchange.path)));
    target.set_query(exchange.query.as_deref());

    let mut outbound = HeaderMap::new();
    for (name, value) in inbound {
        if *name == header::HOST || *name == header::CONTENT_LENGTH || is_hop_by_hop(name) {
            continue;
        }
        outbound.append(name.clone(), value.clone());
    }
    let mut response = state
        .http
        .request(exchange.method.clone(), target)
        .headers(outbound)
        .body(body)
        .send()
        .await
        .map_err(|_| UpstreamError)?;
    let status = response.status();
    let headers = response.headers().clone();
    let mut collected = Vec::new();
    while let Some(chunk) = response.chunk().await.map_err(|_| UpstreamError)? {
        if collected.len().saturating_add(chunk.len()) > state.server.max_body_bytes {
            return Err(UpstreamError);
        }
        collected.extend_from_slice(&chunk);
    }
    Ok((status, headers, Bytes::from(collected)))
}

/// Builds a client response from upstream parts.
fn build_response(status: StatusCode, upstream: &HeaderMap, body: Bytes) -> Response {
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    let headers = response.headers_mut();
    for (name, value) in upstream {
        if *name == header::CONTENT_LENGTH || is_hop_by_hop(name) {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }
    response
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns true for connection-scoped headers, which are never forwarded.
fn is_hop_by_hop(name: &HeaderName) -> bool {
    matches!(
        name.as_str(),
        "connection"
            | "keep-alive"
            | "proxy-authenticate"
            | "proxy-authorization"
            | "te"
            | "trailer"
            | "transfer-encoding"
            | "upgrade"
    )
}

/// Returns a header value as text when present and valid.
fn header_str<'a>(headers: &'a HeaderMap, name: &HeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// Returns a short caller fingerprint for audit logs.
fn fingerprint(caller: &CallerKey) -> String {
    caller.as_str().chars().take(16).collect()
}

/// Records the gate decision for one request.
fn record_gate(
    state: &ServerState,
    exchange: &Exchange,
    decision: &Result<GateOutcome, GateError>,
) {
    let (operation, outcome, reason) = match decision {
        Ok(outcome) => {
            (outcome.operation.map(OperationKind::label), outcome.verdict.label(), outcome.reason)
        }
        Err(err) => (None, err.label(), "error"),
    };
    state.audit.record_gate(&GateAuditEvent::new(GateAuditEventParams {
        method: exchange.method.as_str().to_string(),
        route: exchange.path.clone(),
        operation,
        scope: exchange.scope.label(),
        caller: exchange.auth.caller_key().as_ref().map(fingerprint),
        outcome,
        reason,
    }));
}
