// crates/tracking-gate-providers/src/gitlab.rs
// ============================================================================
// Module: Git-Hosting Project Client
// Description: Project authorization backed by a GitLab-compatible project API.
// Purpose: Resolve caller roles from project and inherited group membership.
// Dependencies: reqwest, serde, tracking-gate-core
// ============================================================================

//! ## Overview
//! Resolves `GET {base}/api/v4/projects/{encoded path}?simple=true` with the
//! caller's bearer token. The caller's role is the higher of the direct
//! project access level and the inherited group access level. Projects that
//! do not carry every mandatory topic are reported as absent.

// ============================================================================
// SECTION: Imports
// ============================================================================

use reqwest::StatusCode;
use reqwest::Url;
use reqwest::blocking::Client;
use reqwest::header::AUTHORIZATION;
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
// SECTION: Wire Types
// ============================================================================

/// Project payload subset returned by the project API.
#[derive(Debug, Deserialize)]
struct GitlabProject {
    /// Project id.
    id: u64,
    /// Project topics.
    #[serde(default)]
    topics: Vec<String>,
    /// Caller permissions; absent for anonymous access.
    #[serde(default)]
    permissions: Option<GitlabPermissions>,
}

/// Caller permission block.
#[derive(Debug, Deserialize)]
struct GitlabPermissions {
    /// Direct project membership.
    #[serde(default)]
    project_access: Option<GitlabAccess>,
    /// Inherited group membership.
    #[serde(default)]
    group_access: Option<GitlabAccess>,
}

/// Membership access level.
#[derive(Debug, Deserialize)]
struct GitlabAccess {
    /// Numeric access level.
    access_level: i64,
}

impl GitlabProject {
    /// Returns the effective caller role.
    fn role(&self) -> Role {
        let Some(permissions) = &self.permissions else {
            return Role::NoAccess;
        };
        let level = |access: Option<&GitlabAccess>| access.map_or(0, |a| a.access_level);
        Role::from_access_level(
            level(permissions.project_access.as_ref())
                .max(level(permissions.group_access.as_ref())),
        )
    }
}

// ============================================================================
// SECTION: Client
// ============================================================================

/// Git-hosting backed project authorization client.
pub struct GitlabProjectClient {
    /// Base URL with a trailing slash.
    base_url: Url,
    /// Topics every project must carry.
    mandatory_topics: Vec<String>,
    /// Maximum accepted response size.
    max_response_bytes: usize,
    /// Blocking HTTP client.
    client: Client,
}

impl GitlabProjectClient {
    /// Builds a client.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectClientError::InvalidRequest`] when the base URL or
    /// HTTP client is invalid.
    pub fn new(
        settings: &HttpClientSettings,
        mandatory_topics: Vec<String>,
    ) -> Result<Self, ProjectClientError> {
        let base_url =
            parse_base_url(&settings.base_url).map_err(ProjectClientError::InvalidRequest)?;
        let client = build_client(settings).map_err(ProjectClientError::InvalidRequest)?;
        Ok(Self {
            base_url,
            mandatory_topics,
            max_response_bytes: settings.max_response_bytes,
            client,
        })
    }

    /// Returns the lookup URL for `path`.
    fn project_url(&self, path: &ProjectPath) -> Result<Url, ProjectClientError> {
        let mut url = join_segments(&self.base_url, &["api", "v4", "projects", path.as_str()])
            .map_err(ProjectClientError::InvalidRequest)?;
        url.set_query(Some("simple=true"));
        Ok(url)
    }
}

impl ProjectAuthorizationClient for GitlabProjectClient {
    fn resolve(
        &self,
        path: &ProjectPath,
        auth: &RequestAuth,
    ) -> Result<Option<ProjectInfo>, ProjectClientError> {
        let mut request = self.client.get(self.project_url(path)?);
        if let Some(token) = auth.bearer_token() {
            let value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
                ProjectClientError::InvalidRequest("invalid bearer token".to_string())
            })?;
            request = request.header(AUTHORIZATION, value);
        }
        let mut response =
            request.send().map_err(|err| ProjectClientError::Unavailable(err.to_string()))?;
        match response.status() {
            StatusCode::OK => {}
            StatusCode::NOT_FOUND => return Ok(None),
            status => {
                return Err(ProjectClientError::Unavailable(format!(
                    "project api responded with status {status}"
                )));
            }
        }
        let body = read_response_limited(&mut response, self.max_response_bytes)
            .map_err(ProjectClientError::InvalidResponse)?;
        let project: GitlabProject = serde_json::from_slice(&body)
            .map_err(|err| ProjectClientError::InvalidResponse(err.to_string()))?;
        let has_topics =
            self.mandatory_topics.iter().all(|required| project.topics.contains(required));
        if !has_topics {
            return Ok(None);
        }
        Ok(Some(ProjectInfo {
            id: ProjectId::new(project.id),
            path: path.clone(),
            role: project.role(),
        }))
    }
}
