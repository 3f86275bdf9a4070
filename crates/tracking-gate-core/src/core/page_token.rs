// crates/tracking-gate-core/src/core/page_token.rs
// ============================================================================
// Module: Tracking Page Tokens
// Description: Offset page tokens in the tracking store's encoding.
// Purpose: Let the visibility filter resume a search at an exact store offset.
// Dependencies: base64, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! The tracking store encodes page tokens as standard base64 over the JSON
//! object `{"offset": N}`. Tokens minted here use the same bytes so callers
//! cannot tell filtered pages from unfiltered ones.

// ============================================================================
// SECTION: Imports
// ============================================================================

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Page token decoding errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PageTokenError {
    /// Token is not valid base64.
    #[error("page token is not base64: {0}")]
    Encoding(String),
    /// Token payload is not an offset object.
    #[error("page token payload is invalid: {0}")]
    Payload(String),
}

// ============================================================================
// SECTION: Page Token
// ============================================================================

/// Decoded offset page token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageToken {
    /// Zero-based offset into the store's ordered result set.
    offset: u64,
}

/// Wire payload of a page token.
#[derive(Deserialize)]
struct TokenPayload {
    /// Offset value.
    offset: u64,
}

impl PageToken {
    /// Creates a token for `offset`.
    #[must_use]
    pub const fn new(offset: u64) -> Self {
        Self { offset }
    }

    /// Returns the offset.
    #[must_use]
    pub const fn offset(self) -> u64 {
        self.offset
    }

    /// Encodes the token in the store's wire form.
    #[must_use]
    pub fn encode(self) -> String {
        STANDARD.encode(format!("{{\"offset\": {}}}", self.offset))
    }

    /// Decodes a wire token.
    ///
    /// # Errors
    ///
    /// Returns [`PageTokenError`] when the token is not a base64 offset object.
    pub fn decode(token: &str) -> Result<Self, PageTokenError> {
        let bytes =
            STANDARD.decode(token.trim()).map_err(|err| PageTokenError::Encoding(err.to_string()))?;
        let payload: TokenPayload =
            serde_json::from_slice(&bytes).map_err(|err| PageTokenError::Payload(err.to_string()))?;
        Ok(Self::new(payload.offset))
    }
}
