// crates/tracking-gate-providers/src/catalog.rs
// ============================================================================
// Module: Catalog Project Client
// Description: Project authorization backed by a catalog access-check API.
// Purpose: Resolve caller roles from catalog category membership and access level.
// Dependencies: reqwest, serde, tracking-gate-core
// ============================================================================

//! ## Overview
//! Resolves `GET {base}/api/check/{encoded path}?info=true`, forwarding the
//! caller's `Authorization` and `Cookie` headers. The catalog reports a coarse
//! access level (0-3) mapped onto project roles; projects outside every
//! mandatory category are reported as absent.

// ============================================================================
// SECTION: Imports
// ============================================================================

use reqwest::StatusCode;
use reqwest::Url;
use reqwest::blocking::Client;
use reqwest::header::AUTHORIZATION;
use reqwest::header::COOKIE;
use reqwest::header::HeaderValue;
use serde::Deserialize;
use tracking_gate_core::ProjectAuthorizationClient;
use tracking_gate_core::ProjectClientError;
use tracking_gate_core::ProjectId;
use tracking_gate_core::ProjectInfo;
use tracking_gate_core::ProjectPath;
use tracking_gate_core::RequestAuth;
use tracking_gate_core::Role;

use crate::http::HttpClientSettings;
use crate::http::build_client;
use crate::http::join_segments;
use crate::http::parse_base_url;
use crate::http::read_response_limited;

// ============================================================================
// SECTION: Access Mapping
// ============================================================================

/// Maps a catalog access level onto a project role.
#[must_use]
pub const fn role_for_catalog_access(level: i64) -> Role {
    match level {
        1 => Role::Guest,
        2 => Role::Developer,
        3 => Role::Maintainer,
        _ => Role::NoAccess,
    }
}

/// Access-check payload subset.
#[derive(Debug, Deserialize)]
struct CatalogCheck {
    /// Project id.
    id: u64,
    /// Catalog categories the project belongs to.
    #[serde(default)]
    categories: Vec<String>,
    /// Coarse caller access level.
    #[serde(default)]
    access_level: i64,
}

// ============================================================================
// SECTION: Client
// ============================================================================

/// Catalog backed project authorization client.
pub struct CatalogProjectClient {
    /// Base URL with a trailing slash.
    base_url: Url,
    /// Categories every project must belong to.
    mandatory_categories: Vec<String>,
    /// Maximum accepted response size.
    max_response_bytes: usize,
    /// Blocking HTTP client.
    client: Client,
}

impl CatalogProjectClient {
    /// Builds a client.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectClientError::InvalidRequest`] when the base URL or
    /// HTTP client is invalid.
    pub fn new(
        settings: &HttpClientSettings,
        mandatory_categories: Vec<String>,
    ) -> Result<Self, ProjectClientError> {
        let base_url =
            parse_base_url(&settings.base_url).map_err(ProjectClientError::InvalidRequest)?;
        let client = build_client(settings).map_err(ProjectClientError::InvalidRequest)?;
        Ok(Self {
            base_url,
            mandatory_categories,
            max_response_bytes: settings.max_response_bytes,
            client,
        })
    }
}

impl ProjectAuthorizationClient for CatalogProjectClient {
    fn resolve(
        &self,
        path: &ProjectPath,
        auth: &RequestAuth,
    ) -> Result<Option<ProjectInfo>, ProjectClientError> {
        let mut url = join_segments(&self.base_url, &["api", "check", path.as_str()])
            .map_err(ProjectClientError::InvalidRequest)?;
        url.set_query(Some("info=true"));
        let mut request = self.client.get(url);
        if let Some(token) = auth.bearer_token() {
            let value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
                ProjectClientError::InvalidRequest("invalid bearer token".to_string())
            })?;
            request = request.header(AUTHORIZATION, value);
        }
        if let Some(cookies) = auth.cookie_header() {
            let value = HeaderValue::from_str(&cookies)
                .map_err(|_| ProjectClientError::InvalidRequest("invalid cookie".to_string()))?;
            request = request.header(COOKIE, value);
        }
        let mut response =
            request.send().map_err(|err| ProjectClientError::Unavailable(err.to_string()))?;
        match response.status() {
            StatusCode::OK => {}
            StatusCode::NOT_FOUND => return Ok(None),
            status => {
                return Err(ProjectClientError::Unavailable(format!(
                    "catalog check responded with status {status}"
                )));
            }
        }
        let body = read_response_limited(&mut response, self.max_response_bytes)
            .map_err(ProjectClientError::InvalidResponse)?;
        let check: CatalogCheck = serde_json::from_slice(&body)
            .map_err(|err| ProjectClientError::InvalidResponse(err.to_string()))?;
        let in_category =
            self.mandatory_categories.iter().all(|required| check.categories.contains(required));
        if !in_category {
            return Ok(None);
        }
        Ok(Some(ProjectInfo {
            id: ProjectId::new(check.id),
            path: path.clone(),
            role: role_for_catalog_access(check.access_level),
        }))
    }
}
