// crates/tracking-gate-server/tests/initializer.rs
// ============================================================================
// Module: Project-Tag Initializer Tests
// Description: Ownership tagging after successful creations.
// ============================================================================
//! ## Overview
//! Checks which creations are tagged, where identifiers come from, and that
//! replays leave a single tag.

#![allow(clippy::unwrap_used, reason = "Tests use unwrap on deterministic fixtures.")]

mod common;

use serde_json::json;
use tracking_gate_core::InMemoryTrackingStore;
use tracking_gate_core::ProjectScope;
use tracking_gate_core::TrackingStore;
use tracking_gate_core::tag_value;
use tracking_gate_server::InitializerError;
use tracking_gate_server::OperationKind;
use tracking_gate_server::ProjectTagInitializer;
use tracking_gate_server::RequestParams;
use tracking_gate_server::TaggedEntity;

use crate::common::PROJECT_TAG;
use crate::common::path;

fn params(body: &serde_json::Value) -> RequestParams {
    RequestParams::from_json_body(&serde_json::to_vec(body).unwrap()).unwrap()
}

fn alpha() -> ProjectScope {
    ProjectScope::Project(path("teams/alpha"))
}

#[test]
fn created_experiment_is_tagged_with_the_scope_project() {
    let store = InMemoryTrackingStore::new();
    let id = store.create_experiment("Run1 (42)", Vec::new()).unwrap();
    let initializer = ProjectTagInitializer::new(&store, PROJECT_TAG);
    let response = serde_json::to_vec(&json!({"experiment_id": id})).unwrap();
    let tagged = initializer
        .apply(
            OperationKind::CreateExperiment,
            &alpha(),
            &params(&json!({"name": "Run1 (42)"})),
            &response,
        )
        .unwrap();
    assert_eq!(tagged, Some(TaggedEntity::Experiment(id.clone())));
    let experiment = store.get_experiment(&id).unwrap();
    assert_eq!(tag_value(&experiment.tags, PROJECT_TAG), Some("teams/alpha"));
}

#[test]
fn numeric_experiment_ids_are_accepted_and_replays_keep_one_tag() {
    let store = InMemoryTrackingStore::new();
    let id = store.create_experiment("Run1 (42)", Vec::new()).unwrap();
    let initializer = ProjectTagInitializer::new(&store, PROJECT_TAG);
    let numeric: u64 = id.parse().unwrap();
    let response = serde_json::to_vec(&json!({"experiment_id": numeric})).unwrap();
    let request = params(&json!({}));
    for _ in 0 .. 2 {
        initializer.apply(OperationKind::CreateExperiment, &alpha(), &request, &response).unwrap();
    }
    let experiment = store.get_experiment(&id).unwrap();
    let project_tags = experiment.tags.iter().filter(|tag| tag.key == PROJECT_TAG).count();
    assert_eq!(project_tags, 1);
}

#[test]
fn model_name_falls_back_to_the_request() {
    let store = InMemoryTrackingStore::new();
    store.create_registered_model("m (42)", Vec::new()).unwrap();
    let initializer = ProjectTagInitializer::new(&store, PROJECT_TAG);
    let tagged = initializer
        .apply(
            OperationKind::CreateRegisteredModel,
            &alpha(),
            &params(&json!({"name": "m (42)"})),
            b"{}",
        )
        .unwrap();
    assert_eq!(tagged, Some(TaggedEntity::RegisteredModel("m (42)".to_string())));
    let model = store.get_registered_model("m (42)").unwrap();
    assert_eq!(tag_value(&model.tags, PROJECT_TAG), Some("teams/alpha"));
}

#[test]
fn global_scope_and_other_operations_are_skipped() {
    let store = InMemoryTrackingStore::new();
    let id = store.create_experiment("e", Vec::new()).unwrap();
    let initializer = ProjectTagInitializer::new(&store, PROJECT_TAG);
    let response = serde_json::to_vec(&json!({"experiment_id": id})).unwrap();
    let request = params(&json!({}));
    let global = initializer
        .apply(OperationKind::CreateExperiment, &ProjectScope::Global, &request, &response)
        .unwrap();
    assert_eq!(global, None);
    let other = initializer.apply(OperationKind::CreateRun, &alpha(), &request, &response).unwrap();
    assert_eq!(other, None);
    assert!(store.get_experiment(&id).unwrap().tags.is_empty());
}

#[test]
fn missing_identifier_is_reported() {
    let store = InMemoryTrackingStore::new();
    let initializer = ProjectTagInitializer::new(&store, PROJECT_TAG);
    let result =
        initializer.apply(OperationKind::CreateExperiment, &alpha(), &params(&json!({})), b"{}");
    assert_eq!(result, Err(InitializerError::MissingIdentifier("experiment_id")));
}
