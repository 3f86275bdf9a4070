// crates/tracking-gate-core/src/interfaces/mod.rs
// ============================================================================
// Module: Tracking Gate Interfaces
// Description: Collaborator contracts for project authorization and tracking storage.
// Purpose: Keep backend specifics out of the gate, filter, and initializer.
// Dependencies: thiserror, crate::core
// ============================================================================

//! ## Overview
//! The gate depends on two external collaborators: a project authorization
//! provider that answers "what role does this caller hold in project P", and
//! the tracking store that owns experiments, runs, and models. Both are
//! synchronous; hosts run them off the async executor. Implementations must
//! fail closed: transport failures are errors, never permission decisions.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::core::credentials::RequestAuth;
use crate::core::entities::Experiment;
use crate::core::entities::ModelVersion;
use crate::core::entities::Page;
use crate::core::entities::RegisteredModel;
use crate::core::entities::Run;
use crate::core::entities::SearchQuery;
use crate::core::identifiers::ProjectPath;
use crate::core::project::ProjectInfo;

// ============================================================================
// SECTION: Project Authorization
// ============================================================================

/// Project authorization provider errors.
///
/// Absent projects are not errors; they resolve to `Ok(None)`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProjectClientError {
    /// Provider unreachable, timed out, or answered with an unexpected status.
    #[error("project provider unavailable: {0}")]
    Unavailable(String),
    /// Provider answered with a body that could not be interpreted.
    #[error("project provider invalid response: {0}")]
    InvalidResponse(String),
    /// Request could not be built from the supplied inputs.
    #[error("project provider invalid request: {0}")]
    InvalidRequest(String),
}

/// Resolves a caller's role inside a project.
pub trait ProjectAuthorizationClient: Send + Sync {
    /// Performs one provider lookup for `path` on behalf of `auth`.
    ///
    /// Returns `Ok(None)` when the project does not exist, is invisible to the
    /// caller, or lacks a mandatory topic.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectClientError`] on transport or decoding failures.
    fn resolve(
        &self,
        path: &ProjectPath,
        auth: &RequestAuth,
    ) -> Result<Option<ProjectInfo>, ProjectClientError>;
}

// ============================================================================
// SECTION: Tracking Store
// ============================================================================

/// Tracking store errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Referenced entity does not exist.
    #[error("tracking store entity not found: {0}")]
    NotFound(String),
    /// Store unreachable or failed.
    #[error("tracking store unavailable: {0}")]
    Unavailable(String),
    /// Store returned data that could not be interpreted.
    #[error("tracking store invalid data: {0}")]
    Invalid(String),
}

/// Tracking store consulted for entity lookup, search backfill, and tagging.
pub trait TrackingStore: Send + Sync {
    /// Loads an experiment by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the experiment does not exist.
    fn get_experiment(&self, experiment_id: &str) -> Result<Experiment, StoreError>;

    /// Loads an experiment by name, returning `None` when absent.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the lookup fails.
    fn get_experiment_by_name(&self, name: &str) -> Result<Option<Experiment>, StoreError>;

    /// Loads a run by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the run does not exist.
    fn get_run(&self, run_id: &str) -> Result<Run, StoreError>;

    /// Loads a registered model by name.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the model does not exist.
    fn get_registered_model(&self, name: &str) -> Result<RegisteredModel, StoreError>;

    /// Loads one version of a registered model.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the version does not exist.
    fn get_model_version(&self, name: &str, version: &str) -> Result<ModelVersion, StoreError>;

    /// Searches experiments.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the search fails.
    fn search_experiments(&self, query: &SearchQuery) -> Result<Page<Experiment>, StoreError>;

    /// Searches runs.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the search fails.
    fn search_runs(&self, query: &SearchQuery) -> Result<Page<Run>, StoreError>;

    /// Searches registered models.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the search fails.
    fn search_registered_models(
        &self,
        query: &SearchQuery,
    ) -> Result<Page<RegisteredModel>, StoreError>;

    /// Searches model versions.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the search fails.
    fn search_model_versions(&self, query: &SearchQuery) -> Result<Page<ModelVersion>, StoreError>;

    /// Sets a tag on an experiment. Setting an identical value is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn set_experiment_tag(&self, experiment_id: &str, key: &str, value: &str)
    -> Result<(), StoreError>;

    /// Sets a tag on a registered model. Setting an identical value is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn set_registered_model_tag(&self, name: &str, key: &str, value: &str)
    -> Result<(), StoreError>;
}
