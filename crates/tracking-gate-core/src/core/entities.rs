// crates/tracking-gate-core/src/core/entities.rs
// ============================================================================
// Module: Tracking Entities
// Description: Wire-compatible views of tracking-server entities and search pages.
// Purpose: Expose the fields authorization needs while preserving everything else.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Entities mirror the JSON objects returned by the tracking server. Only the
//! identity and tag fields are typed; every other field is captured in a
//! flattened `extra` map so a filtered response re-serializes without loss.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

// ============================================================================
// SECTION: Tags
// ============================================================================

/// Key/value tag attached to an experiment, registered model, or version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityTag {
    /// Tag key.
    pub key: String,
    /// Tag value.
    #[serde(default)]
    pub value: String,
}

impl EntityTag {
    /// Creates a tag.
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Returns the value of the first tag named `key`.
#[must_use]
pub fn tag_value<'a>(tags: &'a [EntityTag], key: &str) -> Option<&'a str> {
    tags.iter().find(|tag| tag.key == key).map(|tag| tag.value.as_str())
}

// ============================================================================
// SECTION: Entities
// ============================================================================

/// Experiment record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experiment {
    /// Experiment identifier.
    pub experiment_id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Experiment tags, including the project tag.
    #[serde(default)]
    pub tags: Vec<EntityTag>,
    /// Remaining wire fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Run metadata block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunInfo {
    /// Run identifier.
    pub run_id: String,
    /// Owning experiment identifier.
    pub experiment_id: String,
    /// Remaining wire fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Run record. Runs inherit ownership from their experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    /// Run metadata.
    pub info: RunInfo,
    /// Remaining wire fields (data, inputs).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Registered model record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisteredModel {
    /// Model name.
    pub name: String,
    /// Model tags, including the project tag.
    #[serde(default)]
    pub tags: Vec<EntityTag>,
    /// Remaining wire fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Model version record. Versions inherit ownership from their source run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelVersion {
    /// Registered model name.
    pub name: String,
    /// Version number as reported on the wire.
    pub version: String,
    /// Source run identifier; empty for versions registered without a run.
    #[serde(default)]
    pub run_id: String,
    /// Version tags.
    #[serde(default)]
    pub tags: Vec<EntityTag>,
    /// Remaining wire fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ============================================================================
// SECTION: Search
// ============================================================================

/// One page of search results.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    /// Entities in store order.
    pub items: Vec<T>,
    /// Token for the next page; `None` when the store is exhausted.
    pub next_page_token: Option<String>,
}

/// Search request parameters as received from the caller.
///
/// # Invariants
/// - Parameters are kept verbatim so the same query can be replayed against
///   the store with only the page token changed.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SearchQuery {
    /// Raw request parameters.
    params: Map<String, Value>,
}

impl SearchQuery {
    /// Wraps raw request parameters.
    #[must_use]
    pub const fn from_params(params: Map<String, Value>) -> Self {
        Self { params }
    }

    /// Returns the raw parameters.
    #[must_use]
    pub const fn params(&self) -> &Map<String, Value> {
        &self.params
    }

    /// Returns the requested page size, accepting numbers or numeric strings.
    #[must_use]
    pub fn max_results(&self) -> Option<u64> {
        match self.params.get("max_results")? {
            Value::Number(number) => number.as_u64(),
            Value::String(text) => text.trim().parse().ok(),
            _ => None,
        }
    }

    /// Returns the non-empty page token, if any.
    #[must_use]
    pub fn page_token(&self) -> Option<&str> {
        self.params.get("page_token").and_then(Value::as_str).filter(|token| !token.is_empty())
    }

    /// Returns a string-list parameter, accepting a scalar or an array.
    #[must_use]
    pub fn string_list(&self, key: &str) -> Vec<String> {
        match self.params.get(key) {
            Some(Value::String(text)) => vec![text.clone()],
            Some(Value::Array(values)) => {
                values.iter().filter_map(Value::as_str).map(str::to_string).collect()
            }
            _ => Vec::new(),
        }
    }

    /// Returns a copy of the query that starts at `token`.
    #[must_use]
    pub fn with_page_token(&self, token: &str) -> Self {
        let mut params = self.params.clone();
        params.insert("page_token".to_string(), Value::String(token.to_string()));
        Self { params }
    }
}
