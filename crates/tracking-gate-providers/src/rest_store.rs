// crates/tracking-gate-providers/src/rest_store.rs
// ============================================================================
// Module: REST Tracking Store
// Description: TrackingStore implementation over the upstream tracking REST API.
// Purpose: Let the gate look up, search, and tag entities on the upstream server.
// Dependencies: reqwest, serde, serde_json, tracking-gate-core
// ============================================================================

//! ## Overview
//! Talks to the upstream tracking server's `/api/2.0/mlflow` endpoints
//! directly, bypassing the gate. Lookups that the server answers with 404 map
//! to [`StoreError::NotFound`]; any other failure maps to
//! [`StoreError::Unavailable`] or [`StoreError::Invalid`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use reqwest::StatusCode;
use reqwest::Url;
use reqwest::blocking::Client;
use reqwest::blocking::RequestBuilder;
use reqwest::header::CONTENT_TYPE;
use serde::de::DeserializeOwned;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;
use tracking_gate_core::Experiment;
use tracking_gate_core::ModelVersion;
use tracking_gate_core::Page;
use tracking_gate_core::RegisteredModel;
use tracking_gate_core::Run;
use tracking_gate_core::SearchQuery;
use tracking_gate_core::StoreError;
use tracking_gate_core::TrackingStore;

use crate::http::HttpClientSettings;
use crate::http::build_client;
use crate::http::join_segments;
use crate::http::parse_base_url;
use crate::http::read_response_limited;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// REST API prefix segments.
const API_PREFIX: [&str; 3] = ["api", "2.0", "mlflow"];

// ============================================================================
// SECTION: Store
// ============================================================================

/// Upstream tracking server client.
pub struct RestTrackingStore {
    /// Upstream base URL with a trailing slash.
    base_url: Url,
    /// Maximum accepted response size.
    max_response_bytes: usize,
    /// Blocking HTTP client.
    client: Client,
}

impl RestTrackingStore {
    /// Builds a store client.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Invalid`] when the base URL or client is invalid.
    pub fn new(settings: &HttpClientSettings) -> Result<Self, StoreError> {
        let base_url = parse_base_url(&settings.base_url).map_err(StoreError::Invalid)?;
        let client = build_client(settings).map_err(StoreError::Invalid)?;
        Ok(Self {
            base_url,
            max_response_bytes: settings.max_response_bytes,
            client,
        })
    }

    /// Returns the URL for an API endpoint such as `experiments/get`.
    fn endpoint(&self, endpoint: &str) -> Result<Url, StoreError> {
        let segments: Vec<&str> = API_PREFIX.into_iter().chain(endpoint.split('/')).collect();
        join_segments(&self.base_url, &segments).map_err(StoreError::Invalid)
    }

    /// Issues a GET with query parameters.
    fn get(&self, endpoint: &str, params: &Map<String, Value>) -> Result<Value, StoreError> {
        let mut url = self.endpoint(endpoint)?;
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in params {
                for text in query_values(value) {
                    pairs.append_pair(key, &text);
                }
            }
        }
        self.execute(self.client.get(url))
    }

    /// Issues a POST with a JSON body.
    fn post(&self, endpoint: &str, body: &Value) -> Result<Value, StoreError> {
        let url = self.endpoint(endpoint)?;
        let bytes = serde_json::to_vec(body).map_err(|err| StoreError::Invalid(err.to_string()))?;
        self.execute(self.client.post(url).header(CONTENT_TYPE, "application/json").body(bytes))
    }

    /// Sends a request and decodes the JSON response.
    fn execute(&self, request: RequestBuilder) -> Result<Value, StoreError> {
        let mut response =
            request.send().map_err(|err| StoreError::Unavailable(err.to_string()))?;
        let status = response.status();
        let body = read_response_limited(&mut response, self.max_response_bytes)
            .map_err(StoreError::Unavailable)?;
        match status {
            StatusCode::OK => {}
            StatusCode::NOT_FOUND => {
                return Err(StoreError::NotFound(error_code(&body)));
            }
            status => {
                return Err(StoreError::Unavailable(format!(
                    "tracking server responded with status {status}: {}",
                    error_code(&body)
                )));
            }
        }
        if body.is_empty() {
            return Ok(Value::Object(Map::new()));
        }
        serde_json::from_slice(&body).map_err(|err| StoreError::Invalid(err.to_string()))
    }
}

/// Returns the tracking server's error code, if the body carries one.
fn error_code(body: &[u8]) -> String {
    serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|value| value.get("error_code").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| "unknown error".to_string())
}

/// Renders a JSON parameter as query-string values.
fn query_values(value: &Value) -> Vec<String> {
    match value {
        Value::String(text) => vec![text.clone()],
        Value::Number(number) => vec![number.to_string()],
        Value::Bool(flag) => vec![flag.to_string()],
        Value::Array(items) => items.iter().flat_map(query_values).collect(),
        Value::Null | Value::Object(_) => Vec::new(),
    }
}

/// Extracts and decodes a required response field.
fn field<T: DeserializeOwned>(mut value: Value, key: &str) -> Result<T, StoreError> {
    let raw = value
        .get_mut(key)
        .map(Value::take)
        .ok_or_else(|| StoreError::Invalid(format!("response missing {key}")))?;
    serde_json::from_value(raw).map_err(|err| StoreError::Invalid(err.to_string()))
}

/// Decodes a search page whose entities live under `key`.
fn page<T: DeserializeOwned>(mut value: Value, key: &str) -> Result<Page<T>, StoreError> {
    let items = match value.get_mut(key).map(Value::take) {
        Some(raw) => {
            serde_json::from_value(raw).map_err(|err| StoreError::Invalid(err.to_string()))?
        }
        None => Vec::new(),
    };
    let next_page_token = value
        .get("next_page_token")
        .and_then(Value::as_str)
        .filter(|token| !token.is_empty())
        .map(str::to_string);
    Ok(Page {
        items,
        next_page_token,
    })
}

/// Builds a string parameter map.
fn params(pairs: &[(&str, &str)]) -> Map<String, Value> {
    pairs
        .iter()
        .map(|(key, value)| ((*key).to_string(), Value::String((*value).to_string())))
        .collect()
}

impl TrackingStore for RestTrackingStore {
    fn get_experiment(&self, experiment_id: &str) -> Result<Experiment, StoreError> {
        let value = self.get("experiments/get", &params(&[("experiment_id", experiment_id)]))?;
        field(value, "experiment")
    }

    fn get_experiment_by_name(&self, name: &str) -> Result<Option<Experiment>, StoreError> {
        match self.get("experiments/get-by-name", &params(&[("experiment_name", name)])) {
            Ok(value) => field(value, "experiment").map(Some),
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn get_run(&self, run_id: &str) -> Result<Run, StoreError> {
        let value = self.get("runs/get", &params(&[("run_id", run_id)]))?;
        field(value, "run")
    }

    fn get_registered_model(&self, name: &str) -> Result<RegisteredModel, StoreError> {
        let value = self.get("registered-models/get", &params(&[("name", name)]))?;
        field(value, "registered_model")
    }

    fn get_model_version(&self, name: &str, version: &str) -> Result<ModelVersion, StoreError> {
        let value =
            self.get("model-versions/get", &params(&[("name", name), ("version", version)]))?;
        field(value, "model_version")
    }

    fn search_experiments(&self, query: &SearchQuery) -> Result<Page<Experiment>, StoreError> {
        let value = self.post("experiments/search", &Value::Object(query.params().clone()))?;
        page(value, "experiments")
    }

    fn search_runs(&self, query: &SearchQuery) -> Result<Page<Run>, StoreError> {
        let value = self.post("runs/search", &Value::Object(query.params().clone()))?;
        page(value, "runs")
    }

    fn search_registered_models(
        &self,
        query: &SearchQuery,
    ) -> Result<Page<RegisteredModel>, StoreError> {
        let value = self.get("registered-models/search", query.params())?;
        page(value, "registered_models")
    }

    fn search_model_versions(&self, query: &SearchQuery) -> Result<Page<ModelVersion>, StoreError> {
        let value = self.get("model-versions/search", query.params())?;
        page(value, "model_versions")
    }

    fn set_experiment_tag(
        &self,
        experiment_id: &str,
        key: &str,
        value: &str,
    ) -> Result<(), StoreError> {
        let body = json!({"experiment_id": experiment_id, "key": key, "value": value});
        self.post("experiments/set-experiment-tag", &body).map(|_| ())
    }

    fn set_registered_model_tag(
        &self,
        name: &str,
        key: &str,
        value: &str,
    ) -> Result<(), StoreError> {
        let body = json!({"name": name, "key": key, "value": value});
        self.post("registered-models/set-tag", &body).map(|_| ())
    }
}
