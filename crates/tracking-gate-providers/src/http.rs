// crates/tracking-gate-providers/src/http.rs
// ============================================================================
// Module: Shared HTTP Plumbing
// Description: Client construction, URL building, and bounded response reads.
// Purpose: Give every outbound client the same timeouts and size limits.
// Dependencies: reqwest
// ============================================================================

//! ## Overview
//! Outbound clients are built with connect and request timeouts, a fixed user
//! agent, and redirects disabled. Response bodies are read through
//! [`read_response_limited`], which rejects oversized or truncated bodies.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Read;
use std::time::Duration;

use reqwest::Url;
use reqwest::blocking::Client;
use reqwest::blocking::Response;
use reqwest::redirect::Policy;

// ============================================================================
// SECTION: Settings
// ============================================================================

/// Connection settings shared by outbound clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpClientSettings {
    /// Service base URL.
    pub base_url: String,
    /// Connect timeout.
    pub connect_timeout: Duration,
    /// Whole-request timeout.
    pub request_timeout: Duration,
    /// User agent for outbound requests.
    pub user_agent: String,
    /// Maximum accepted response size in bytes.
    pub max_response_bytes: usize,
}

impl HttpClientSettings {
    /// Returns settings for `base_url` with conservative defaults.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            connect_timeout: Duration::from_secs(2),
            request_timeout: Duration::from_secs(30),
            user_agent: concat!("tracking-gate/", env!("CARGO_PKG_VERSION")).to_string(),
            max_response_bytes: 1024 * 1024,
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds a blocking client from `settings`.
pub(crate) fn build_client(settings: &HttpClientSettings) -> Result<Client, String> {
    Client::builder()
        .connect_timeout(settings.connect_timeout)
        .timeout(settings.request_timeout)
        .user_agent(settings.user_agent.clone())
        .redirect(Policy::none())
        .build()
        .map_err(|err| format!("http client build failed: {err}"))
}

/// Parses `base_url`, forcing a trailing slash so relative joins keep its path.
pub(crate) fn parse_base_url(base_url: &str) -> Result<Url, String> {
    let mut normalized = base_url.trim().trim_end_matches('/').to_string();
    normalized.push('/');
    let url = Url::parse(&normalized).map_err(|err| format!("invalid base url: {err}"))?;
    if url.cannot_be_a_base() {
        return Err("base url cannot carry a path".to_string());
    }
    Ok(url)
}

/// Appends path segments to `base`, percent-encoding each one.
///
/// A segment containing `/` is encoded as a single segment, which is how
/// namespace-qualified project paths are addressed.
pub(crate) fn join_segments(base: &Url, segments: &[&str]) -> Result<Url, String> {
    let mut url = base.clone();
    {
        let mut path = url.path_segments_mut().map_err(|()| "base url cannot be a base")?;
        path.pop_if_empty();
        for segment in segments {
            path.push(segment);
        }
    }
    Ok(url)
}

/// Reads the response body while enforcing a byte limit.
pub(crate) fn read_response_limited(
    response: &mut Response,
    max_bytes: usize,
) -> Result<Vec<u8>, String> {
    let expected_len = response.content_length();
    let max_bytes_u64 =
        u64::try_from(max_bytes).map_err(|_| "response size limit exceeds u64".to_string())?;
    if let Some(expected) = expected_len
        && expected > max_bytes_u64
    {
        return Err("http response exceeds size limit".to_string());
    }
    let mut buf = Vec::new();
    let mut handle = response.take(max_bytes_u64.saturating_add(1));
    handle.read_to_end(&mut buf).map_err(|_| "failed to read response".to_string())?;
    if buf.len() > max_bytes {
        return Err("http response exceeds size limit".to_string());
    }
    if let Some(expected) = expected_len {
        let expected =
            usize::try_from(expected).map_err(|_| "invalid response length".to_string())?;
        if buf.len() < expected {
            return Err("http response truncated".to_string());
        }
    }
    Ok(buf)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "Test-only assertions use unwrap for clarity.")]
mod tests {
    use super::*;

    #[test]
    fn project_path_is_one_encoded_segment() {
        let base = parse_base_url("https://gitlab.example.com/").unwrap();
        let url = join_segments(&base, &["api", "v4", "projects", "teams/alpha"]).unwrap();
        assert_eq!(url.as_str(), "https://gitlab.example.com/api/v4/projects/teams%2Falpha");
    }

    #[test]
    fn base_path_is_preserved() {
        let base = parse_base_url("https://hub.example.com/sharinghub").unwrap();
        let url = join_segments(&base, &["api", "check", "a/b"]).unwrap();
        assert_eq!(url.as_str(), "https://hub.example.com/sharinghub/api/check/a%2Fb");
    }
}
