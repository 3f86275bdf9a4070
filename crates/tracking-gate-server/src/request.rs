// crates/tracking-gate-server/src/request.rs
// ============================================================================
// Module: Request Parameters
// Description: Method-aware extraction of tracking API request parameters.
// Purpose: Give predicates and filters one view over query and JSON inputs.
// Dependencies: serde_json, thiserror, url
// ============================================================================

//! ## Overview
//! Tracking API reads carry their parameters in the query string while writes
//! carry a JSON object body. [`RequestParams`] normalizes both into one JSON
//! map. Repeated query keys become arrays so list parameters such as
//! `experiment_ids` survive intact.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Map;
use serde_json::Value;
use thiserror::Error;
use url::form_urlencoded;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Request parameter errors, reported to the caller as HTTP 400.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParamError {
    /// Required parameter absent.
    #[error("Missing value for required parameter '{0}'")]
    Missing(String),
    /// Request body is not a JSON object.
    #[error("request body must be a JSON object")]
    InvalidBody,
}

// ============================================================================
// SECTION: Parameters
// ============================================================================

/// Parameters of one tracking API request.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RequestParams {
    /// Normalized parameter values.
    values: Map<String, Value>,
}

impl RequestParams {
    /// Resolves parameters for `method`: query string for reads, JSON body for writes.
    ///
    /// # Errors
    ///
    /// Returns [`ParamError::InvalidBody`] when a write carries a non-object body.
    pub fn resolve(method: &str, query: Option<&str>, body: &[u8]) -> Result<Self, ParamError> {
        match method {
            "POST" | "PATCH" | "DELETE" => Self::from_json_body(body),
            _ => Ok(Self::from_query(query.unwrap_or_default())),
        }
    }

    /// Parses a URL query string.
    #[must_use]
    pub fn from_query(query: &str) -> Self {
        let mut values = Map::new();
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            let value = Value::String(value.into_owned());
            match values.get_mut(key.as_ref()) {
                Some(Value::Array(existing)) => existing.push(value),
                Some(existing) => {
                    let first = existing.take();
                    *existing = Value::Array(vec![first, value]);
                }
                None => {
                    values.insert(key.into_owned(), value);
                }
            }
        }
        Self { values }
    }

    /// Parses a JSON object body. An empty body yields no parameters.
    ///
    /// # Errors
    ///
    /// Returns [`ParamError::InvalidBody`] when the body is not a JSON object.
    pub fn from_json_body(body: &[u8]) -> Result<Self, ParamError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        match serde_json::from_slice(body) {
            Ok(Value::Object(values)) => Ok(Self { values }),
            _ => Err(ParamError::InvalidBody),
        }
    }

    /// Wraps an existing map.
    #[must_use]
    pub const fn from_map(values: Map<String, Value>) -> Self {
        Self { values }
    }

    /// Returns a scalar parameter rendered as a string.
    #[must_use]
    pub fn optional(&self, key: &str) -> Option<String> {
        match self.values.get(key)? {
            Value::String(text) => Some(text.clone()),
            Value::Number(number) => Some(number.to_string()),
            Value::Array(items) => items.first().and_then(Value::as_str).map(str::to_string),
            _ => None,
        }
    }

    /// Returns a required scalar parameter.
    ///
    /// # Errors
    ///
    /// Returns [`ParamError::Missing`] when the parameter is absent.
    pub fn required(&self, key: &str) -> Result<String, ParamError> {
        self.optional(key).ok_or_else(|| ParamError::Missing(key.to_string()))
    }

    /// Returns the run id, falling back to the legacy `run_uuid` parameter.
    ///
    /// # Errors
    ///
    /// Returns [`ParamError::Missing`] when neither parameter is present.
    pub fn run_id(&self) -> Result<String, ParamError> {
        self.optional("run_id")
            .or_else(|| self.optional("run_uuid"))
            .ok_or_else(|| ParamError::Missing("run_id".to_string()))
    }

    /// Returns a list parameter, accepting a scalar or an array.
    #[must_use]
    pub fn list(&self, key: &str) -> Vec<String> {
        match self.values.get(key) {
            Some(Value::String(text)) => vec![text.clone()],
            Some(Value::Array(items)) => {
                items.iter().filter_map(Value::as_str).map(str::to_string).collect()
            }
            _ => Vec::new(),
        }
    }

    /// Returns the raw parameter map.
    #[must_use]
    pub const fn values(&self) -> &Map<String, Value> {
        &self.values
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "Test-only assertions use unwrap for clarity.")]
mod tests {
    use super::*;

    #[test]
    fn reads_use_query_and_writes_use_body() {
        let read = RequestParams::resolve("GET", Some("experiment_id=7"), b"{}").unwrap();
        assert_eq!(read.optional("experiment_id").as_deref(), Some("7"));
        let write =
            RequestParams::resolve("POST", Some("experiment_id=1"), br#"{"experiment_id": 9}"#)
                .unwrap();
        assert_eq!(write.optional("experiment_id").as_deref(), Some("9"));
    }

    #[test]
    fn repeated_query_keys_become_lists() {
        let params = RequestParams::from_query("run_ids=a&run_ids=b&run_ids=c");
        assert_eq!(params.list("run_ids"), vec!["a", "b", "c"]);
    }

    #[test]
    fn run_uuid_is_accepted() {
        let params = RequestParams::from_json_body(br#"{"run_uuid": "r1"}"#).unwrap();
        assert_eq!(params.run_id().unwrap(), "r1");
        assert_eq!(
            RequestParams::default().run_id(),
            Err(ParamError::Missing("run_id".to_string()))
        );
    }

    #[test]
    fn non_object_body_is_rejected() {
        assert_eq!(RequestParams::from_json_body(b"[1, 2]"), Err(ParamError::InvalidBody));
        assert!(RequestParams::from_json_body(b"  ").unwrap().values().is_empty());
    }
}
