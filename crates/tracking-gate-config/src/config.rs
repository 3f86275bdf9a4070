// crates/tracking-gate-config/src/config.rs
// ============================================================================
// Module: Tracking Gate Configuration
// Description: Configuration loading and validation for the tracking gate.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: serde, toml, url
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Missing or invalid configuration fails closed: the gate refuses to start
//! rather than run with an ambiguous authorization setup.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use url::Url;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "tracking-gate.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "TRACKING_GATE_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum length of the reserved project tag key.
pub(crate) const MAX_PROJECT_TAG_LENGTH: usize = 250;
/// Maximum number of mandatory topics.
pub(crate) const MAX_MANDATORY_TOPICS: usize = 32;
/// Maximum number of backfill refetches per filtered response.
pub(crate) const MAX_BACKFILL_REQUESTS: u32 = 10_000;
/// Minimum provider connect timeout in milliseconds.
pub(crate) const MIN_PROVIDER_CONNECT_TIMEOUT_MS: u64 = 100;
/// Maximum provider connect timeout in milliseconds.
pub(crate) const MAX_PROVIDER_CONNECT_TIMEOUT_MS: u64 = 10_000;
/// Minimum provider request timeout in milliseconds.
pub(crate) const MIN_PROVIDER_REQUEST_TIMEOUT_MS: u64 = 500;
/// Maximum provider request timeout in milliseconds.
pub(crate) const MAX_PROVIDER_REQUEST_TIMEOUT_MS: u64 = 120_000;
/// Maximum provider response size in bytes.
pub(crate) const MAX_PROVIDER_RESPONSE_BYTES: usize = 16 * 1024 * 1024;

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Tracking gate configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GateConfig {
    /// Proxy server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Authorization tuning.
    #[serde(default)]
    pub authorization: AuthorizationConfig,
    /// Project authorization provider.
    pub provider: ProviderConfig,
    /// Audit output configuration.
    #[serde(default)]
    pub audit: AuditConfig,
}

impl GateConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// Resolution order: explicit path, `TRACKING_GATE_CONFIG`, then
    /// `tracking-gate.toml` in the working directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.authorization.validate()?;
        self.provider.validate()?;
        self.audit.validate()?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Server
// ============================================================================

/// Reverse-proxy server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Listen address.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Base URL of the upstream tracking server.
    #[serde(default = "default_upstream_url")]
    pub upstream_url: String,
    /// Maximum request and upstream response body size in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// Redirect unauthenticated browsers to the login page.
    #[serde(default)]
    pub login_auto_redirect: bool,
    /// Realm advertised in `WWW-Authenticate` challenges.
    #[serde(default = "default_auth_realm")]
    pub auth_realm: String,
    /// Interactive login path.
    #[serde(default = "default_login_path")]
    pub login_path: String,
    /// Cookie carrying an authenticated browser session.
    #[serde(default = "default_session_cookie")]
    pub session_cookie: String,
    /// User-agent fragments identifying tracking API clients.
    #[serde(default = "default_api_user_agents")]
    pub api_user_agents: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            upstream_url: default_upstream_url(),
            max_body_bytes: default_max_body_bytes(),
            login_auto_redirect: false,
            auth_realm: default_auth_realm(),
            login_path: default_login_path(),
            session_cookie: default_session_cookie(),
            api_user_agents: default_api_user_agents(),
        }
    }
}

impl ServerConfig {
    /// Returns the parsed listen address.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the bind address is invalid.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind.parse().map_err(|_| ConfigError::Invalid("invalid bind address".to_string()))
    }

    /// Validates server configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        self.bind_addr()?;
        validate_http_url("server.upstream_url", &self.upstream_url)?;
        if self.max_body_bytes == 0 {
            return Err(ConfigError::Invalid("server.max_body_bytes must be > 0".to_string()));
        }
        if self.auth_realm.trim().is_empty() || self.auth_realm.contains('"') {
            return Err(ConfigError::Invalid(
                "server.auth_realm must be non-empty and unquoted".to_string(),
            ));
        }
        if !self.login_path.starts_with('/') {
            return Err(ConfigError::Invalid("server.login_path must start with '/'".to_string()));
        }
        if self.session_cookie.trim().is_empty()
            || self.session_cookie.contains([';', '=', ' '])
        {
            return Err(ConfigError::Invalid(
                "server.session_cookie must be a valid cookie name".to_string(),
            ));
        }
        if self.api_user_agents.iter().any(|agent| agent.trim().is_empty()) {
            return Err(ConfigError::Invalid(
                "server.api_user_agents entries must be non-empty".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Authorization
// ============================================================================

/// Authorization tuning.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthorizationConfig {
    /// Reserved tag key recording entity ownership.
    #[serde(default = "default_project_tag")]
    pub project_tag: String,
    /// Role cache entry lifetime in seconds.
    #[serde(default = "default_cache_timeout_secs")]
    pub cache_timeout_secs: u64,
    /// Idle lifetime of a caller's cache scope in seconds.
    #[serde(default = "default_auth_cache_timeout_secs")]
    pub auth_cache_timeout_secs: u64,
    /// Maximum number of live caller cache scopes.
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
    /// Maximum store refetches per filtered search response.
    #[serde(default = "default_max_backfill_requests")]
    pub max_backfill_requests: u32,
}

impl Default for AuthorizationConfig {
    fn default() -> Self {
        Self {
            project_tag: default_project_tag(),
            cache_timeout_secs: default_cache_timeout_secs(),
            auth_cache_timeout_secs: default_auth_cache_timeout_secs(),
            max_sessions: default_max_sessions(),
            max_backfill_requests: default_max_backfill_requests(),
        }
    }
}

impl AuthorizationConfig {
    /// Returns the role cache entry lifetime.
    #[must_use]
    pub const fn cache_timeout(&self) -> Duration {
        Duration::from_secs(self.cache_timeout_secs)
    }

    /// Returns the idle lifetime of a caller cache scope.
    #[must_use]
    pub const fn auth_cache_timeout(&self) -> Duration {
        Duration::from_secs(self.auth_cache_timeout_secs)
    }

    /// Validates authorization configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        let tag = self.project_tag.as_str();
        if tag.is_empty() || tag.trim() != tag || tag.len() > MAX_PROJECT_TAG_LENGTH {
            return Err(ConfigError::Invalid(
                "authorization.project_tag must be non-empty without surrounding whitespace"
                    .to_string(),
            ));
        }
        if self.cache_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "authorization.cache_timeout_secs must be > 0".to_string(),
            ));
        }
        if self.auth_cache_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "authorization.auth_cache_timeout_secs must be > 0".to_string(),
            ));
        }
        if self.max_sessions == 0 {
            return Err(ConfigError::Invalid("authorization.max_sessions must be > 0".to_string()));
        }
        if self.max_backfill_requests == 0 || self.max_backfill_requests > MAX_BACKFILL_REQUESTS {
            return Err(ConfigError::Invalid(format!(
                "authorization.max_backfill_requests must be between 1 and {MAX_BACKFILL_REQUESTS}"
            )));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Provider
// ============================================================================

/// Project authorization backend selection.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Git-hosting project API.
    Gitlab,
    /// Catalog access-check API.
    Catalog,
}

/// Project authorization provider configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// Backend selection.
    #[serde(rename = "type")]
    pub kind: ProviderKind,
    /// Backend base URL.
    pub base_url: String,
    /// Topics (Git-hosting) or categories (catalog) every project must carry.
    #[serde(default)]
    pub mandatory_topics: Vec<String>,
    /// Connect timeout in milliseconds.
    #[serde(default = "default_provider_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Request timeout in milliseconds.
    #[serde(default = "default_provider_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// User agent sent to the backend.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Maximum accepted response size in bytes.
    #[serde(default = "default_provider_max_response_bytes")]
    pub max_response_bytes: usize,
}

impl ProviderConfig {
    /// Returns the connect timeout.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Returns the request timeout.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Validates provider configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_http_url("provider.base_url", &self.base_url)?;
        if self.mandatory_topics.len() > MAX_MANDATORY_TOPICS {
            return Err(ConfigError::Invalid(format!(
                "provider.mandatory_topics exceeds {MAX_MANDATORY_TOPICS} entries"
            )));
        }
        if self.mandatory_topics.iter().any(|topic| topic.trim().is_empty()) {
            return Err(ConfigError::Invalid(
                "provider.mandatory_topics entries must be non-empty".to_string(),
            ));
        }
        if self.kind == ProviderKind::Catalog && self.mandatory_topics.is_empty() {
            return Err(ConfigError::Invalid(
                "provider.type=catalog requires at least one mandatory category".to_string(),
            ));
        }
        validate_timeout_range(
            "provider.connect_timeout_ms",
            self.connect_timeout_ms,
            MIN_PROVIDER_CONNECT_TIMEOUT_MS,
            MAX_PROVIDER_CONNECT_TIMEOUT_MS,
        )?;
        validate_timeout_range(
            "provider.request_timeout_ms",
            self.request_timeout_ms,
            MIN_PROVIDER_REQUEST_TIMEOUT_MS,
            MAX_PROVIDER_REQUEST_TIMEOUT_MS,
        )?;
        if self.user_agent.trim().is_empty() {
            return Err(ConfigError::Invalid("provider.user_agent must be non-empty".to_string()));
        }
        if self.max_response_bytes == 0 || self.max_response_bytes > MAX_PROVIDER_RESPONSE_BYTES {
            return Err(ConfigError::Invalid(format!(
                "provider.max_response_bytes must be between 1 and {MAX_PROVIDER_RESPONSE_BYTES}"
            )));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Audit
// ============================================================================

/// Audit sink selection.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuditSinkKind {
    /// JSON lines on stderr.
    #[default]
    Stderr,
    /// JSON lines appended to a file.
    File,
    /// Audit disabled.
    None,
}

/// Audit output configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditConfig {
    /// Sink selection.
    #[serde(default)]
    pub sink: AuditSinkKind,
    /// Audit log path for the file sink.
    #[serde(default)]
    pub path: Option<String>,
}

impl AuditConfig {
    /// Validates audit configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match (self.sink, &self.path) {
            (AuditSinkKind::File, Some(path)) => validate_path_string("audit.path", path),
            (AuditSinkKind::File, None) => {
                Err(ConfigError::Invalid("audit.sink=file requires audit.path".to_string()))
            }
            (_, Some(_)) => {
                Err(ConfigError::Invalid("audit.path only allowed when sink=file".to_string()))
            }
            (_, None) => Ok(()),
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against security limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    if path.as_os_str().len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    if path.components().any(|component| component.as_os_str().len() > MAX_PATH_COMPONENT_LENGTH) {
        return Err(ConfigError::Invalid("config path component too long".to_string()));
    }
    Ok(())
}

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    let too_long = Path::new(trimmed)
        .components()
        .any(|component| component.as_os_str().len() > MAX_PATH_COMPONENT_LENGTH);
    if too_long {
        return Err(ConfigError::Invalid(format!("{field} path component too long")));
    }
    Ok(())
}

/// Validates an http(s) URL without embedded credentials.
fn validate_http_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value.trim())
        .map_err(|err| ConfigError::Invalid(format!("{field} is not a valid url: {err}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::Invalid(format!("{field} must use http or https")));
    }
    if url.host_str().is_none() {
        return Err(ConfigError::Invalid(format!("{field} must include a host")));
    }
    if !url.username().is_empty() || url.password().is_some() {
        return Err(ConfigError::Invalid(format!("{field} must not embed credentials")));
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(ConfigError::Invalid(format!("{field} must not carry a query or fragment")));
    }
    Ok(())
}

/// Validates a millisecond timeout against an inclusive range.
fn validate_timeout_range(
    field: &str,
    value_ms: u64,
    min_ms: u64,
    max_ms: u64,
) -> Result<(), ConfigError> {
    if value_ms < min_ms || value_ms > max_ms {
        return Err(ConfigError::Invalid(format!(
            "{field} must be between {min_ms} and {max_ms} milliseconds",
        )));
    }
    Ok(())
}

// ============================================================================
// SECTION: Defaults
// ============================================================================

/// Default listen address.
fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

/// Default upstream tracking server.
fn default_upstream_url() -> String {
    "http://127.0.0.1:5000".to_string()
}

/// Default body limit; artifact uploads pass through the proxy.
const fn default_max_body_bytes() -> usize {
    512 * 1024 * 1024
}

/// Default challenge realm.
fn default_auth_realm() -> String {
    "mlflow".to_string()
}

/// Default login path.
fn default_login_path() -> String {
    "/auth/login".to_string()
}

/// Default session cookie name.
fn default_session_cookie() -> String {
    "session".to_string()
}

/// Default API client user-agent fragments.
fn default_api_user_agents() -> Vec<String> {
    vec!["mlflow".to_string()]
}

/// Default project tag key.
fn default_project_tag() -> String {
    "project".to_string()
}

/// Default role cache lifetime (seconds).
const fn default_cache_timeout_secs() -> u64 {
    300
}

/// Default caller scope idle lifetime (seconds).
const fn default_auth_cache_timeout_secs() -> u64 {
    3600
}

/// Default maximum live caller scopes.
const fn default_max_sessions() -> usize {
    10_000
}

/// Default backfill refetch cap.
const fn default_max_backfill_requests() -> u32 {
    100
}

/// Default provider connect timeout (milliseconds).
const fn default_provider_connect_timeout_ms() -> u64 {
    2_000
}

/// Default provider request timeout (milliseconds).
const fn default_provider_request_timeout_ms() -> u64 {
    30_000
}

/// Default provider user agent.
fn default_user_agent() -> String {
    concat!("tracking-gate/", env!("CARGO_PKG_VERSION")).to_string()
}

/// Default provider response limit (bytes).
const fn default_provider_max_response_bytes() -> usize {
    1024 * 1024
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_range_is_inclusive() {
        assert!(validate_timeout_range("t", 100, 100, 200).is_ok());
        assert!(validate_timeout_range("t", 200, 100, 200).is_ok());
        assert!(validate_timeout_range("t", 99, 100, 200).is_err());
    }

    #[test]
    fn url_validation_rejects_credentials_and_schemes() {
        assert!(validate_http_url("u", "https://gitlab.example.com").is_ok());
        assert!(validate_http_url("u", "https://user:pw@gitlab.example.com").is_err());
        assert!(validate_http_url("u", "ftp://gitlab.example.com").is_err());
        assert!(validate_http_url("u", "not a url").is_err());
    }
}
