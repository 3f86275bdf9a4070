// crates/tracking-gate-core/src/core/credentials.rs
// ============================================================================
// Module: Tracking Gate Request Credentials
// Description: Transport-level caller credentials extracted once per request.
// Purpose: Carry bearer tokens and cookies to providers without exposing them.
// Dependencies: sha2, crate::core
// ============================================================================

//! ## Overview
//! [`RequestAuth`] is built from the `Authorization` and `Cookie` headers of an
//! inbound request and is never mutated afterwards. It is forwarded to the
//! project authorization provider and fingerprinted into a [`CallerKey`] that
//! scopes per-caller state. Raw credential material never appears in `Debug`
//! output or in caller keys.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use sha2::Digest;
use sha2::Sha256;

use crate::core::identifiers::CallerKey;

// ============================================================================
// SECTION: Request Credentials
// ============================================================================

/// Caller credentials extracted from an inbound request.
///
/// # Invariants
/// - Immutable after construction.
/// - A caller is authenticated when it presents a bearer token or a session cookie.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct RequestAuth {
    /// Bearer token from the `Authorization` header.
    bearer_token: Option<String>,
    /// Value of the session cookie, when present.
    session: Option<String>,
    /// All cookies in header order.
    cookies: Vec<(String, String)>,
}

impl RequestAuth {
    /// Returns credentials for a caller that presented nothing.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Returns credentials carrying only a bearer token.
    #[must_use]
    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            bearer_token: Some(token.into()),
            ..Self::default()
        }
    }

    /// Parses credentials from raw header values.
    ///
    /// `session_cookie` names the cookie that carries an authenticated session.
    #[must_use]
    pub fn from_headers(
        authorization: Option<&str>,
        cookie_header: Option<&str>,
        session_cookie: &str,
    ) -> Self {
        let bearer_token = authorization.and_then(parse_bearer);
        let cookies = cookie_header.map(parse_cookies).unwrap_or_default();
        let session = cookies
            .iter()
            .find(|(name, value)| name == session_cookie && !value.is_empty())
            .map(|(_, value)| value.clone());
        Self {
            bearer_token,
            session,
            cookies,
        }
    }

    /// Returns the bearer token, if present.
    #[must_use]
    pub fn bearer_token(&self) -> Option<&str> {
        self.bearer_token.as_deref()
    }

    /// Returns all cookies in header order.
    #[must_use]
    pub fn cookies(&self) -> &[(String, String)] {
        &self.cookies
    }

    /// Re-serializes the cookies as a `Cookie` header value.
    #[must_use]
    pub fn cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        let pairs: Vec<String> =
            self.cookies.iter().map(|(name, value)| format!("{name}={value}")).collect();
        Some(pairs.join("; "))
    }

    /// Returns true when the caller presented a usable credential.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.bearer_token.is_some() || self.session.is_some()
    }

    /// Derives the caller key from the presented credential.
    ///
    /// Returns `None` for anonymous callers. Bearer tokens take precedence over
    /// session cookies.
    #[must_use]
    pub fn caller_key(&self) -> Option<CallerKey> {
        let (kind, secret) = match (&self.bearer_token, &self.session) {
            (Some(token), _) => ("bearer", token),
            (None, Some(session)) => ("session", session),
            (None, None) => return None,
        };
        let mut hasher = Sha256::new();
        hasher.update(kind.as_bytes());
        hasher.update([0u8]);
        hasher.update(secret.as_bytes());
        Some(CallerKey::new(hex_encode(&hasher.finalize())))
    }
}

impl fmt::Debug for RequestAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestAuth")
            .field("bearer_token", &self.bearer_token.as_ref().map(|_| "<redacted>"))
            .field("session", &self.session.as_ref().map(|_| "<redacted>"))
            .field("cookies", &self.cookies.len())
            .finish()
    }
}

// ============================================================================
// SECTION: Header Parsing
// ============================================================================

/// Extracts the token from a `Bearer` authorization value.
fn parse_bearer(value: &str) -> Option<String> {
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    if token.is_empty() {
        return None;
    }
    Some(token.to_string())
}

/// Splits a `Cookie` header into name/value pairs.
fn parse_cookies(header: &str) -> Vec<(String, String)> {
    header
        .split(';')
        .filter_map(|pair| {
            let (name, value) = pair.split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            Some((name.to_string(), value.trim().to_string()))
        })
        .collect()
}

/// Encodes bytes as a lowercase hex string.
fn hex_encode(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(char::from(HEX[usize::from(byte >> 4)]));
        out.push(char::from(HEX[usize::from(byte & 0x0f)]));
    }
    out
}
