// crates/tracking-gate-providers/tests/factory.rs
// ============================================================================
// Module: Provider Factory Tests
// Description: Backend selection from provider configuration.
// Purpose: Ensure the configured backend kind drives the outbound protocol.
// Dependencies: tracking-gate-providers, tracking-gate-config, tiny_http
// ============================================================================

//! ## Overview
//! Builds clients through the factory and checks which endpoint they call.

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

use tracking_gate_config::ProviderConfig;
use tracking_gate_config::ProviderKind;
use tracking_gate_core::ProjectPath;
use tracking_gate_core::RequestAuth;
use tracking_gate_core::Role;
use tracking_gate_core::SearchQuery;
use tracking_gate_core::TrackingStore;
use tracking_gate_providers::project_client_from_config;
use tracking_gate_providers::provider_settings;
use tracking_gate_providers::tracking_store_from_config;

use crate::common::spawn_server;

fn provider(kind: ProviderKind, base_url: &str, topics: &[&str]) -> ProviderConfig {
    ProviderConfig {
        kind,
        base_url: base_url.to_string(),
        mandatory_topics: topics.iter().map(ToString::to_string).collect(),
        connect_timeout_ms: 500,
        request_timeout_ms: 2_000,
        user_agent: "gate-test/1".to_string(),
        max_response_bytes: 4096,
    }
}

#[test]
fn settings_follow_provider_config() {
    let config = provider(ProviderKind::Gitlab, "https://git.example.com", &[]);
    let settings = provider_settings(&config);
    assert_eq!(settings.user_agent, "gate-test/1");
    assert_eq!(settings.max_response_bytes, 4096);
    assert_eq!(settings.request_timeout.as_millis(), 2_000);
}

#[test]
fn gitlab_kind_queries_project_api() {
    let server = spawn_server(1, |_| {
        (200, r#"{"id": 3, "permissions": {"project_access": {"access_level": 40}}}"#.to_string())
    });
    let client =
        project_client_from_config(&provider(ProviderKind::Gitlab, &server.url, &[])).unwrap();
    let path = ProjectPath::parse("teams/alpha").unwrap();
    let info = client.resolve(&path, &RequestAuth::bearer("tok")).unwrap().unwrap();
    assert_eq!(info.role, Role::Maintainer);
    let requests = server.finish();
    assert!(requests[0].url.starts_with("/api/v4/projects/"));
}

#[test]
fn catalog_kind_queries_check_api() {
    let server = spawn_server(1, |_| {
        (200, r#"{"id": 9, "categories": ["ai-model"], "access_level": 1}"#.to_string())
    });
    let config = provider(ProviderKind::Catalog, &server.url, &["ai-model"]);
    let client = project_client_from_config(&config).unwrap();
    let path = ProjectPath::parse("teams/alpha").unwrap();
    let info = client.resolve(&path, &RequestAuth::bearer("tok")).unwrap().unwrap();
    assert_eq!(info.role, Role::Guest);
    let requests = server.finish();
    assert!(requests[0].url.starts_with("/api/check/"));
}

#[test]
fn tracking_store_targets_upstream_url() {
    let server = spawn_server(1, |_| (200, r#"{"experiments": []}"#.to_string()));
    let config = provider(ProviderKind::Gitlab, "https://git.example.com", &[]);
    let store = tracking_store_from_config(&server.url, &config, 1024 * 1024).unwrap();
    let page = store.search_experiments(&SearchQuery::default()).unwrap();
    assert!(page.items.is_empty());
    let requests = server.finish();
    assert_eq!(requests[0].url, "/api/2.0/mlflow/experiments/search");
}
