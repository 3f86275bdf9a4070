// crates/tracking-gate-server/src/initializer.rs
// ============================================================================
// Module: Project-Tag Initializer
// Description: Stamps newly created experiments and models with their project.
// Purpose: Record ownership so later checks can attribute the entity.
// Dependencies: tracking-gate-core, serde_json, thiserror
// ============================================================================

//! ## Overview
//! After a successful creation inside a project scope, the initializer reads
//! the new identifier from the creation response and writes the project tag
//! through the tracking store. The write is an upsert, so replaying it with
//! the same value changes nothing. A failure here leaves the entity created
//! but unowned; it is reported, never rolled back.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;
use thiserror::Error;
use tracking_gate_core::ProjectScope;
use tracking_gate_core::StoreError;
use tracking_gate_core::TrackingStore;

use crate::request::RequestParams;
use crate::routes::OperationKind;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Initializer failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InitializerError {
    /// Creation response did not identify the new entity.
    #[error("creation response missing {0}")]
    MissingIdentifier(&'static str),
    /// Creation response was not valid JSON.
    #[error("creation response invalid: {0}")]
    Body(String),
    /// Tag write failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Entity that received a project tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaggedEntity {
    /// Experiment by id.
    Experiment(String),
    /// Registered model by name.
    RegisteredModel(String),
}

/// Writes project tags after creations.
pub struct ProjectTagInitializer<'a> {
    /// Store receiving the tag write.
    store: &'a dyn TrackingStore,
    /// Reserved project tag key.
    project_tag: &'a str,
}

impl<'a> ProjectTagInitializer<'a> {
    /// Creates an initializer.
    #[must_use]
    pub fn new(store: &'a dyn TrackingStore, project_tag: &'a str) -> Self {
        Self { store, project_tag }
    }

    /// Tags the entity created by `operation`, if it is a tagged creation.
    ///
    /// Returns `Ok(None)` for other operations and for the global scope.
    ///
    /// # Errors
    ///
    /// Returns [`InitializerError`] when the response lacks the new identifier
    /// or the tag write fails.
    pub fn apply(
        &self,
        operation: OperationKind,
        scope: &ProjectScope,
        params: &RequestParams,
        response_body: &[u8],
    ) -> Result<Option<TaggedEntity>, InitializerError> {
        let Some(project) = scope.project() else {
            return Ok(None);
        };
        match operation {
            OperationKind::CreateExperiment => {
                let response = parse_body(response_body)?;
                let experiment_id = match response.get("experiment_id") {
                    Some(Value::String(id)) if !id.is_empty() => id.clone(),
                    Some(Value::Number(id)) => id.to_string(),
                    _ => return Err(InitializerError::MissingIdentifier("experiment_id")),
                };
                self.store.set_experiment_tag(&experiment_id, self.project_tag, project.as_str())?;
                Ok(Some(TaggedEntity::Experiment(experiment_id)))
            }
            OperationKind::CreateRegisteredModel => {
                let response = parse_body(response_body)?;
                let name = response
                    .pointer("/registered_model/name")
                    .and_then(Value::as_str)
                    .filter(|name| !name.is_empty())
                    .map(str::to_string)
                    .or_else(|| params.optional("name"))
                    .ok_or(InitializerError::MissingIdentifier("registered_model.name"))?;
                self.store.set_registered_model_tag(&name, self.project_tag, project.as_str())?;
                Ok(Some(TaggedEntity::RegisteredModel(name)))
            }
            _ => Ok(None),
        }
    }
}

/// Parses a creation response body.
fn parse_body(body: &[u8]) -> Result<Value, InitializerError> {
    serde_json::from_slice(body).map_err(|err| InitializerError::Body(err.to_string()))
}
