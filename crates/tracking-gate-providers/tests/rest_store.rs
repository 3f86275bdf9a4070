// crates/tracking-gate-providers/tests/rest_store.rs
// ============================================================================
// Module: REST Tracking Store Tests
// Description: Upstream tracking REST client behaviour.
// Purpose: Validate endpoint routing, decoding, and error classification.
// Dependencies: tracking-gate-providers, tracking-gate-core, tiny_http
// ============================================================================

//! ## Overview
//! Runs the REST tracking store against scripted upstream servers and checks
//! request shapes, page decoding, 404 handling, and tag writes.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

mod common;

use serde_json::Value;
use serde_json::json;
use tracking_gate_core::SearchQuery;
use tracking_gate_core::StoreError;
use tracking_gate_core::TrackingStore;
use tracking_gate_core::tag_value;
use tracking_gate_providers::HttpClientSettings;
use tracking_gate_providers::RestTrackingStore;

use crate::common::spawn_server;

fn store(url: &str) -> RestTrackingStore {
    RestTrackingStore::new(&HttpClientSettings::new(url)).unwrap()
}

fn query(value: Value) -> SearchQuery {
    let Value::Object(params) = value else { panic!("query must be an object") };
    SearchQuery::from_params(params)
}

#[test]
fn get_experiment_decodes_tags() {
    let server = spawn_server(1, |_| {
        let body = json!({"experiment": {
            "experiment_id": "3",
            "name": "exp (42)",
            "tags": [{"key": "project", "value": "teams/alpha"}]
        }});
        (200, body.to_string())
    });
    let experiment = store(&server.url).get_experiment("3").unwrap();
    assert_eq!(tag_value(&experiment.tags, "project"), Some("teams/alpha"));
    let requests = server.finish();
    assert_eq!(requests[0].method, "GET");
    assert_eq!(requests[0].url, "/api/2.0/mlflow/experiments/get?experiment_id=3");
}

#[test]
fn missing_experiment_by_name_is_none() {
    let server = spawn_server(1, |_| {
        (404, json!({"error_code": "RESOURCE_DOES_NOT_EXIST"}).to_string())
    });
    assert_eq!(store(&server.url).get_experiment_by_name("ghost").unwrap(), None);
    server.finish();
}

#[test]
fn missing_run_is_not_found() {
    let server = spawn_server(1, |_| {
        (404, json!({"error_code": "RESOURCE_DOES_NOT_EXIST"}).to_string())
    });
    let err = store(&server.url).get_run("nope").unwrap_err();
    assert_eq!(err, StoreError::NotFound("RESOURCE_DOES_NOT_EXIST".to_string()));
    server.finish();
}

#[test]
fn server_errors_are_unavailable() {
    let server = spawn_server(1, |_| (500, json!({"error_code": "INTERNAL_ERROR"}).to_string()));
    let err = store(&server.url).get_registered_model("m").unwrap_err();
    assert!(matches!(err, StoreError::Unavailable(message) if message.contains("INTERNAL_ERROR")));
    server.finish();
}

#[test]
fn search_runs_posts_query_and_reads_page() {
    let server = spawn_server(1, |_| {
        let body = json!({
            "runs": [{"info": {"run_id": "r1", "experiment_id": "1"}, "data": {}}],
            "next_page_token": "tok"
        });
        (200, body.to_string())
    });
    let page = store(&server.url)
        .search_runs(&query(json!({"experiment_ids": ["1"], "max_results": 5})))
        .unwrap();
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].info.run_id, "r1");
    assert_eq!(page.next_page_token.as_deref(), Some("tok"));
    let requests = server.finish();
    assert_eq!(requests[0].method, "POST");
    assert_eq!(requests[0].url, "/api/2.0/mlflow/runs/search");
    let sent: Value = serde_json::from_str(&requests[0].body).unwrap();
    assert_eq!(sent["max_results"], json!(5));
}

#[test]
fn search_registered_models_uses_query_string() {
    let server = spawn_server(1, |_| (200, "{}".to_string()));
    let page = store(&server.url)
        .search_registered_models(&query(json!({"max_results": "10", "order_by": ["name ASC"]})))
        .unwrap();
    assert!(page.items.is_empty());
    assert_eq!(page.next_page_token, None);
    let requests = server.finish();
    assert!(requests[0].url.starts_with("/api/2.0/mlflow/registered-models/search?"));
    assert!(requests[0].url.contains("max_results=10"));
    assert!(requests[0].url.contains("order_by=name+ASC"));
}

#[test]
fn set_experiment_tag_posts_body() {
    let server = spawn_server(1, |_| (200, "{}".to_string()));
    store(&server.url).set_experiment_tag("3", "project", "teams/alpha").unwrap();
    let requests = server.finish();
    assert_eq!(requests[0].url, "/api/2.0/mlflow/experiments/set-experiment-tag");
    let sent: Value = serde_json::from_str(&requests[0].body).unwrap();
    assert_eq!(sent, json!({"experiment_id": "3", "key": "project", "value": "teams/alpha"}));
}
