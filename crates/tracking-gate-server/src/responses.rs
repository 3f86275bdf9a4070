// crates/tracking-gate-server/src/responses.rs
// ============================================================================
// Module: Gate Responses
// Description: HTTP responses produced by the gate instead of the upstream.
// Purpose: Shape denials so API clients and browsers each get a usable answer.
// Dependencies: axum, tracking-gate-config, url
// ============================================================================

//! ## Overview
//! API clients (recognized by user agent) get a bearer challenge on 401.
//! Browsers are either redirected to the login page or shown a short login
//! hint, depending on configuration. Failure bodies never reveal whether a
//! hidden entity exists.

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::body::Body;
use axum::http::HeaderValue;
use axum::http::StatusCode;
use axum::http::header;
use axum::response::Response;
use tracking_gate_config::ServerConfig;
use tracking_gate_core::ProjectScope;

use crate::filter::FilterError;
use crate::gate::GateError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Body returned to API clients without credentials.
pub const API_UNAUTHENTICATED_BODY: &str = "You are not authenticated. Please use the \
     Authorization header for bearer auth, if you are using the MLflow client set \
     MLFLOW_TRACKING_TOKEN.";

/// Body returned on permission denial.
pub const FORBIDDEN_BODY: &str = "Permission denied.";

/// Body returned on internal failures.
pub const INTERNAL_ERROR_BODY: &str = "Internal server error, something wrong happened.";

/// Body returned when the authorization backend is unreachable.
pub const BAD_GATEWAY_BODY: &str = "Authorization backend unavailable.";

// ============================================================================
// SECTION: Builders
// ============================================================================

/// Builds a plain-text response.
fn text(status: StatusCode, body: impl Into<String>) -> Response {
    let mut response = Response::new(Body::from(body.into()));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
    response
}

/// Returns true when `user_agent` belongs to a tracking API client.
#[must_use]
pub fn is_api_client(config: &ServerConfig, user_agent: Option<&str>) -> bool {
    let Some(agent) = user_agent else {
        return false;
    };
    let agent = agent.to_ascii_lowercase();
    config.api_user_agents.iter().any(|fragment| agent.contains(&fragment.to_ascii_lowercase()))
}

/// Builds the login URL, carrying the project when the request was scoped.
#[must_use]
pub fn login_location(config: &ServerConfig, scope: &ProjectScope) -> String {
    match scope.project() {
        Some(project) => {
            let query: String = url::form_urlencoded::Serializer::new(String::new())
                .append_pair("project", project.as_str())
                .finish();
            format!("{}?{query}", config.login_path)
        }
        None => config.login_path.clone(),
    }
}

/// Response for a request without usable credentials.
#[must_use]
pub fn unauthenticated(
    config: &ServerConfig,
    user_agent: Option<&str>,
    scope: &ProjectScope,
) -> Response {
    if is_api_client(config, user_agent) {
        let mut response = text(StatusCode::UNAUTHORIZED, API_UNAUTHENTICATED_BODY);
        let challenge = format!("Bearer realm=\"{}\"", config.auth_realm);
        if let Ok(value) = HeaderValue::from_str(&challenge) {
            response.headers_mut().insert(header::WWW_AUTHENTICATE, value);
        }
        return response;
    }
    let location = login_location(config, scope);
    if config.login_auto_redirect {
        let mut response = text(StatusCode::FOUND, "");
        if let Ok(value) = HeaderValue::from_str(&location) {
            response.headers_mut().insert(header::LOCATION, value);
        }
        return response;
    }
    text(
        StatusCode::UNAUTHORIZED,
        format!("You are not authenticated. Please log in at {location}."),
    )
}

/// Response for a denied request.
#[must_use]
pub fn forbidden() -> Response {
    text(StatusCode::FORBIDDEN, FORBIDDEN_BODY)
}

/// Response for an internal failure.
#[must_use]
pub fn internal_error() -> Response {
    text(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_BODY)
}

/// Response for an unreachable authorization backend or upstream.
#[must_use]
pub fn bad_gateway() -> Response {
    text(StatusCode::BAD_GATEWAY, BAD_GATEWAY_BODY)
}

/// Response for a request body over the configured limit.
#[must_use]
pub fn payload_too_large() -> Response {
    text(StatusCode::PAYLOAD_TOO_LARGE, "Request body too large.")
}

/// Response for a malformed request.
#[must_use]
pub fn bad_request(message: &str) -> Response {
    text(StatusCode::BAD_REQUEST, message)
}

/// Maps a gate failure to a response.
#[must_use]
pub fn gate_error(error: &GateError) -> Response {
    match error {
        GateError::Request(err) => bad_request(&err.to_string()),
        GateError::Provider(_) => bad_gateway(),
        GateError::Store(_) | GateError::Session(_) => internal_error(),
    }
}

/// Maps a filter failure to a response.
#[must_use]
pub fn filter_error(error: &FilterError) -> Response {
    match error {
        FilterError::Provider(_) => bad_gateway(),
        FilterError::Body(_)
        | FilterError::PageToken(_)
        | FilterError::Store(_)
        | FilterError::Session(_) => internal_error(),
    }
}
