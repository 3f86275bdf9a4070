// crates/tracking-gate-server/src/routes.rs
// ============================================================================
// Module: Route Table
// Description: Tracking API route classification and project-scoped path splitting.
// Purpose: Resolve (method, path) pairs to operation kinds and their predicates.
// Dependencies: tracking-gate-core, percent-encoding, thiserror
// ============================================================================

//! ## Overview
//! Every tracking API operation the gate knows about is an [`OperationKind`].
//! The [`RouteTable`] maps `(method, path)` under both API prefixes to an
//! operation, built once at startup. Each operation names the [`Predicate`]
//! that guards it, the [`SearchKind`] whose responses are filtered, or both.
//!
//! Project-scoped requests arrive as `/<project path>/tracking/<rest>`; the
//! project path becomes the request scope and the rest is routed as usual.
//!
//! Paths are canonicalized before any of this happens. [`canonical_path`]
//! percent-decodes every segment and rejects dot segments, empty interior
//! segments, encoded separators, and control characters, so the path the gate
//! checks is the path the upstream serves. [`encode_path`] re-encodes the
//! canonical path for forwarding.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;

use percent_encoding::AsciiSet;
use percent_encoding::CONTROLS;
use percent_encoding::percent_decode_str;
use percent_encoding::utf8_percent_encode;
use thiserror::Error;
use tracking_gate_core::Action;
use tracking_gate_core::ProjectPath;
use tracking_gate_core::ProjectScope;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Prefixes under which the tracking REST API is served.
pub const API_PREFIXES: [&str; 2] = ["/api/2.0/mlflow", "/ajax-api/2.0/mlflow"];
/// Prefixes of the proxied artifact API.
pub const ARTIFACT_PREFIXES: [&str; 2] =
    ["/api/2.0/mlflow-artifacts/artifacts", "/ajax-api/2.0/mlflow-artifacts/artifacts"];
/// Route prefixes served without credentials, matched on whole segments.
const UNPROTECTED_PREFIXES: [&str; 5] =
    ["/health", "/version", "/auth", "/static-files/static", "/static-files/favicon.ico"];
/// Characters percent-encoded when a canonical path is forwarded.
const PATH_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'\\')
    .add(b'`')
    .add(b'{')
    .add(b'}');
/// Separator between a project path and the tracking route.
const PROJECT_SEPARATOR: &str = "/tracking/";

// ============================================================================
// SECTION: Operations
// ============================================================================

/// Tracking API operation recognized by the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    /// Create an experiment.
    CreateExperiment,
    /// Get an experiment by id.
    GetExperiment,
    /// Get an experiment by name.
    GetExperimentByName,
    /// Delete an experiment.
    DeleteExperiment,
    /// Restore a deleted experiment.
    RestoreExperiment,
    /// Update (rename) an experiment.
    UpdateExperiment,
    /// Set an experiment tag.
    SetExperimentTag,
    /// Delete an experiment tag.
    DeleteExperimentTag,
    /// Search experiments.
    SearchExperiments,
    /// Create a run.
    CreateRun,
    /// Get a run.
    GetRun,
    /// Delete a run.
    DeleteRun,
    /// Restore a deleted run.
    RestoreRun,
    /// Update run info.
    UpdateRun,
    /// Log a metric.
    LogMetric,
    /// Log a batch of metrics, params, and tags.
    LogBatch,
    /// Log a model.
    LogModel,
    /// Log dataset inputs.
    LogInputs,
    /// Log a parameter.
    LogParam,
    /// Set a run tag.
    SetTag,
    /// Delete a run tag.
    DeleteTag,
    /// Read a metric history.
    GetMetricHistory,
    /// Read metric histories for several runs.
    GetMetricHistoryBulkInterval,
    /// List run artifacts.
    ListArtifacts,
    /// Search runs.
    SearchRuns,
    /// Create a registered model.
    CreateRegisteredModel,
    /// Get a registered model.
    GetRegisteredModel,
    /// Delete a registered model.
    DeleteRegisteredModel,
    /// Update a registered model.
    UpdateRegisteredModel,
    /// Rename a registered model.
    RenameRegisteredModel,
    /// Get the latest versions of a registered model.
    GetLatestVersions,
    /// Set a registered model tag.
    SetRegisteredModelTag,
    /// Delete a registered model tag.
    DeleteRegisteredModelTag,
    /// Set a registered model alias.
    SetRegisteredModelAlias,
    /// Delete a registered model alias.
    DeleteRegisteredModelAlias,
    /// Get a model version by alias.
    GetModelVersionByAlias,
    /// Search registered models.
    SearchRegisteredModels,
    /// Create a model version.
    CreateModelVersion,
    /// Get a model version.
    GetModelVersion,
    /// Delete a model version.
    DeleteModelVersion,
    /// Update a model version.
    UpdateModelVersion,
    /// Transition a model version stage.
    TransitionModelVersionStage,
    /// Get a model version download URI.
    GetModelVersionDownloadUri,
    /// Set a model version tag.
    SetModelVersionTag,
    /// Delete a model version tag.
    DeleteModelVersionTag,
    /// Search model versions.
    SearchModelVersions,
}

/// Permission check guarding an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Predicate {
    /// Creation inside the active project, bound by display-name suffix.
    CreateInProject,
    /// Action on the experiment named by `experiment_id`.
    Experiment(Action),
    /// Read of the experiment named by `experiment_name`.
    ExperimentByName,
    /// Update of an experiment; a `new_name` must preserve the suffix.
    ExperimentUpdate,
    /// Experiment tag mutation; the project tag is never writable.
    ExperimentTag,
    /// Action on the run named by `run_id`, through its experiment.
    Run(Action),
    /// Action on every run named by `run_ids`.
    Runs(Action),
    /// Action on the registered model named by `name`.
    Model(Action),
    /// Rename of a registered model; the suffix must be preserved.
    ModelRename,
    /// Registered model tag mutation; the project tag is never writable.
    ModelTag,
    /// Action on the experiment owning a proxied artifact.
    Artifact(Action),
}

/// Search operation whose responses pass through the visibility filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchKind {
    /// Experiment search.
    Experiments,
    /// Run search.
    Runs,
    /// Registered model search.
    RegisteredModels,
    /// Model version search.
    ModelVersions,
}

impl SearchKind {
    /// Returns the response field holding the entity list.
    #[must_use]
    pub const fn response_field(self) -> &'static str {
        match self {
            Self::Experiments => "experiments",
            Self::Runs => "runs",
            Self::RegisteredModels => "registered_models",
            Self::ModelVersions => "model_versions",
        }
    }

    /// Returns the page size the tracking server applies when none is requested.
    #[must_use]
    pub const fn default_max_results(self) -> u64 {
        match self {
            Self::Experiments | Self::Runs => 1000,
            Self::RegisteredModels => 100,
            Self::ModelVersions => 10_000,
        }
    }
}

impl OperationKind {
    /// Returns the predicate guarding the operation, if any.
    #[must_use]
    pub const fn predicate(self) -> Option<Predicate> {
        let predicate = match self {
            Self::CreateExperiment | Self::CreateRegisteredModel => Predicate::CreateInProject,
            Self::GetExperiment => Predicate::Experiment(Action::Read),
            Self::GetExperimentByName => Predicate::ExperimentByName,
            Self::DeleteExperiment | Self::RestoreExperiment => {
                Predicate::Experiment(Action::Delete)
            }
            Self::UpdateExperiment => Predicate::ExperimentUpdate,
            Self::SetExperimentTag | Self::DeleteExperimentTag => Predicate::ExperimentTag,
            Self::CreateRun => Predicate::Experiment(Action::Update),
            Self::GetRun | Self::GetMetricHistory | Self::ListArtifacts => {
                Predicate::Run(Action::Read)
            }
            Self::GetMetricHistoryBulkInterval => Predicate::Runs(Action::Read),
            Self::DeleteRun | Self::RestoreRun => Predicate::Run(Action::Delete),
            Self::UpdateRun
            | Self::LogMetric
            | Self::LogBatch
            | Self::LogModel
            | Self::LogInputs
            | Self::LogParam
            | Self::SetTag
            | Self::DeleteTag => Predicate::Run(Action::Update),
            Self::GetRegisteredModel
            | Self::GetLatestVersions
            | Self::GetModelVersionByAlias
            | Self::GetModelVersion
            | Self::GetModelVersionDownloadUri => Predicate::Model(Action::Read),
            Self::DeleteRegisteredModel
            | Self::DeleteRegisteredModelAlias
            | Self::DeleteModelVersion
            | Self::DeleteModelVersionTag => Predicate::Model(Action::Delete),
            Self::UpdateRegisteredModel
            | Self::SetRegisteredModelAlias
            | Self::CreateModelVersion
            | Self::UpdateModelVersion
            | Self::TransitionModelVersionStage
            | Self::SetModelVersionTag => Predicate::Model(Action::Update),
            Self::RenameRegisteredModel => Predicate::ModelRename,
            Self::SetRegisteredModelTag | Self::DeleteRegisteredModelTag => Predicate::ModelTag,
            Self::SearchExperiments
            | Self::SearchRuns
            | Self::SearchRegisteredModels
            | Self::SearchModelVersions => return None,
        };
        Some(predicate)
    }

    /// Returns the search kind when the operation's responses are filtered.
    #[must_use]
    pub const fn search(self) -> Option<SearchKind> {
        match self {
            Self::SearchExperiments => Some(SearchKind::Experiments),
            Self::SearchRuns => Some(SearchKind::Runs),
            Self::SearchRegisteredModels => Some(SearchKind::RegisteredModels),
            Self::SearchModelVersions => Some(SearchKind::ModelVersions),
            _ => None,
        }
    }

    /// Returns a stable label for audit logs.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::CreateExperiment => "create_experiment",
            Self::GetExperiment => "get_experiment",
            Self::GetExperimentByName => "get_experiment_by_name",
            Self::DeleteExperiment => "delete_experiment",
            Self::RestoreExperiment => "restore_experiment",
            Self::UpdateExperiment => "update_experiment",
            Self::SetExperimentTag => "set_experiment_tag",
            Self::DeleteExperimentTag => "delete_experiment_tag",
            Self::SearchExperiments => "search_experiments",
            Self::CreateRun => "create_run",
            Self::GetRun => "get_run",
            Self::DeleteRun => "delete_run",
            Self::RestoreRun => "restore_run",
            Self::UpdateRun => "update_run",
            Self::LogMetric => "log_metric",
            Self::LogBatch => "log_batch",
            Self::LogModel => "log_model",
            Self::LogInputs => "log_inputs",
            Self::LogParam => "log_param",
            Self::SetTag => "set_tag",
            Self::DeleteTag => "delete_tag",
            Self::GetMetricHistory => "get_metric_history",
            Self::GetMetricHistoryBulkInterval => "get_metric_history_bulk_interval",
            Self::ListArtifacts => "list_artifacts",
            Self::SearchRuns => "search_runs",
            Self::CreateRegisteredModel => "create_registered_model",
            Self::GetRegisteredModel => "get_registered_model",
            Self::DeleteRegisteredModel => "delete_registered_model",
            Self::UpdateRegisteredModel => "update_registered_model",
            Self::RenameRegisteredModel => "rename_registered_model",
            Self::GetLatestVersions => "get_latest_versions",
            Self::SetRegisteredModelTag => "set_registered_model_tag",
            Self::DeleteRegisteredModelTag => "delete_registered_model_tag",
            Self::SetRegisteredModelAlias => "set_registered_model_alias",
            Self::DeleteRegisteredModelAlias => "delete_registered_model_alias",
            Self::GetModelVersionByAlias => "get_model_version_by_alias",
            Self::SearchRegisteredModels => "search_registered_models",
            Self::CreateModelVersion => "create_model_version",
            Self::GetModelVersion => "get_model_version",
            Self::DeleteModelVersion => "delete_model_version",
            Self::UpdateModelVersion => "update_model_version",
            Self::TransitionModelVersionStage => "transition_model_version_stage",
            Self::GetModelVersionDownloadUri => "get_model_version_download_uri",
            Self::SetModelVersionTag => "set_model_version_tag",
            Self::DeleteModelVersionTag => "delete_model_version_tag",
            Self::SearchModelVersions => "search_model_versions",
        }
    }
}

/// `(method, path below the API prefix, operation)` for every known endpoint.
const ENDPOINTS: &[(&str, &str, OperationKind)] = &[
    ("POST", "/experiments/create", OperationKind::CreateExperiment),
    ("GET", "/experiments/get", OperationKind::GetExperiment),
    ("GET", "/experiments/get-by-name", OperationKind::GetExperimentByName),
    ("POST", "/experiments/delete", OperationKind::DeleteExperiment),
    ("POST", "/experiments/restore", OperationKind::RestoreExperiment),
    ("POST", "/experiments/update", OperationKind::UpdateExperiment),
    ("POST", "/experiments/set-experiment-tag", OperationKind::SetExperimentTag),
    ("POST", "/experiments/delete-experiment-tag", OperationKind::DeleteExperimentTag),
    ("POST", "/experiments/search", OperationKind::SearchExperiments),
    ("GET", "/experiments/search", OperationKind::SearchExperiments),
    ("POST", "/runs/create", OperationKind::CreateRun),
    ("GET", "/runs/get", OperationKind::GetRun),
    ("POST", "/runs/delete", OperationKind::DeleteRun),
    ("POST", "/runs/restore", OperationKind::RestoreRun),
    ("POST", "/runs/update", OperationKind::UpdateRun),
    ("POST", "/runs/log-metric", OperationKind::LogMetric),
    ("POST", "/runs/log-batch", OperationKind::LogBatch),
    ("POST", "/runs/log-model", OperationKind::LogModel),
    ("POST", "/runs/log-inputs", OperationKind::LogInputs),
    ("POST", "/runs/log-parameter", OperationKind::LogParam),
    ("POST", "/runs/set-tag", OperationKind::SetTag),
    ("POST", "/runs/delete-tag", OperationKind::DeleteTag),
    ("POST", "/runs/search", OperationKind::SearchRuns),
    ("GET", "/metrics/get-history", OperationKind::GetMetricHistory),
    ("GET", "/metrics/get-history-bulk-interval", OperationKind::GetMetricHistoryBulkInterval),
    ("GET", "/artifacts/list", OperationKind::ListArtifacts),
    ("POST", "/registered-models/create", OperationKind::CreateRegisteredModel),
    ("GET", "/registered-models/get", OperationKind::GetRegisteredModel),
    ("DELETE", "/registered-models/delete", OperationKind::DeleteRegisteredModel),
    ("PATCH", "/registered-models/update", OperationKind::UpdateRegisteredModel),
    ("POST", "/registered-models/rename", OperationKind::RenameRegisteredModel),
    ("POST", "/registered-models/get-latest-versions", OperationKind::GetLatestVersions),
    ("GET", "/registered-models/get-latest-versions", OperationKind::GetLatestVersions),
    ("POST", "/registered-models/set-tag", OperationKind::SetRegisteredModelTag),
    ("DELETE", "/registered-models/delete-tag", OperationKind::DeleteRegisteredModelTag),
    ("POST", "/registered-models/alias", OperationKind::SetRegisteredModelAlias),
    ("DELETE", "/registered-models/alias", OperationKind::DeleteRegisteredModelAlias),
    ("GET", "/registered-models/alias", OperationKind::GetModelVersionByAlias),
    ("GET", "/registered-models/search", OperationKind::SearchRegisteredModels),
    ("POST", "/model-versions/create", OperationKind::CreateModelVersion),
    ("GET", "/model-versions/get", OperationKind::GetModelVersion),
    ("DELETE", "/model-versions/delete", OperationKind::DeleteModelVersion),
    ("PATCH", "/model-versions/update", OperationKind::UpdateModelVersion),
    ("POST", "/model-versions/transition-stage", OperationKind::TransitionModelVersionStage),
    ("GET", "/model-versions/get-download-uri", OperationKind::GetModelVersionDownloadUri),
    ("POST", "/model-versions/set-tag", OperationKind::SetModelVersionTag),
    ("DELETE", "/model-versions/delete-tag", OperationKind::DeleteModelVersionTag),
    ("GET", "/model-versions/search", OperationKind::SearchModelVersions),
];

// ============================================================================
// SECTION: Route Table
// ============================================================================

/// Static `(method, path)` to operation table.
#[derive(Debug, Clone)]
pub struct RouteTable {
    /// Operations keyed by method and full path.
    entries: HashMap<(String, String), OperationKind>,
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::new()
    }
}

impl RouteTable {
    /// Builds the table with every endpoint under every API prefix.
    #[must_use]
    pub fn new() -> Self {
        let mut entries = HashMap::with_capacity(ENDPOINTS.len() * API_PREFIXES.len());
        for prefix in API_PREFIXES {
            for (method, path, operation) in ENDPOINTS {
                entries.insert(((*method).to_string(), format!("{prefix}{path}")), *operation);
            }
        }
        Self { entries }
    }

    /// Returns the operation served at `(method, path)`.
    ///
    /// `HEAD` is looked up as `GET` and a single trailing slash is ignored,
    /// matching how the upstream dispatches those requests.
    #[must_use]
    pub fn operation(&self, method: &str, path: &str) -> Option<OperationKind> {
        let method = if method == "HEAD" { "GET" } else { method };
        let path = path.strip_suffix('/').filter(|trimmed| !trimmed.is_empty()).unwrap_or(path);
        self.entries.get(&(method.to_string(), path.to_string())).copied()
    }

    /// Returns the number of routed `(method, path)` pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ============================================================================
// SECTION: Canonical Paths
// ============================================================================

/// Reasons a request path has no canonical form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PathError {
    /// Path does not start with `/`.
    #[error("request path must be absolute")]
    NotAbsolute,
    /// A segment does not decode to UTF-8.
    #[error("request path is not valid UTF-8 once decoded")]
    InvalidEncoding,
    /// A segment decodes to a path separator.
    #[error("request path contains an encoded separator")]
    EncodedSeparator,
    /// A segment is `.` or `..`, literally or encoded.
    #[error("request path contains a dot segment")]
    DotSegment,
    /// Two separators follow each other.
    #[error("request path contains an empty segment")]
    EmptySegment,
    /// A segment decodes to a control character.
    #[error("request path contains a control character")]
    ControlCharacter,
}

/// Returns the percent-decoded form of `raw`, or why it has none.
///
/// A trailing slash is kept; every other segment must be non-empty.
///
/// # Errors
///
/// Returns [`PathError`] for paths that could name a different route once
/// normalized by the upstream.
pub fn canonical_path(raw: &str) -> Result<String, PathError> {
    let Some(rest) = raw.strip_prefix('/') else {
        return Err(PathError::NotAbsolute);
    };
    let segments: Vec<&str> = rest.split('/').collect();
    let last = segments.len() - 1;
    let mut canonical = String::with_capacity(raw.len());
    for (index, segment) in segments.into_iter().enumerate() {
        canonical.push('/');
        if segment.is_empty() {
            if index == last {
                continue;
            }
            return Err(PathError::EmptySegment);
        }
        let decoded =
            percent_decode_str(segment).decode_utf8().map_err(|_| PathError::InvalidEncoding)?;
        if decoded.contains(['/', '\\']) {
            return Err(PathError::EncodedSeparator);
        }
        if decoded.chars().any(char::is_control) {
            return Err(PathError::ControlCharacter);
        }
        if decoded == "." || decoded == ".." {
            return Err(PathError::DotSegment);
        }
        canonical.push_str(&decoded);
    }
    Ok(canonical)
}

/// Percent-encodes a canonical path for the upstream request line.
#[must_use]
pub fn encode_path(canonical: &str) -> String {
    utf8_percent_encode(canonical, PATH_SET).to_string()
}

// ============================================================================
// SECTION: Path Helpers
// ============================================================================

/// Returns true for routes served without credentials.
///
/// Prefixes match whole segments: `/health` and `/health/live` are
/// unprotected, `/healthz` is not.
#[must_use]
pub fn is_unprotected(path: &str) -> bool {
    UNPROTECTED_PREFIXES.iter().any(|prefix| {
        path.strip_prefix(prefix).is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    })
}

/// Splits a request path into its project scope and the routed remainder.
///
/// `/teams/alpha/tracking/api/...` yields the `teams/alpha` scope and
/// `/api/...`; any other path is routed as-is in the global scope.
#[must_use]
pub fn split_project_path(path: &str) -> (ProjectScope, String) {
    let Some(index) = path.find(PROJECT_SEPARATOR) else {
        return (ProjectScope::Global, path.to_string());
    };
    let Some(project) = ProjectPath::parse(&path[.. index]) else {
        return (ProjectScope::Global, path.to_string());
    };
    let rest = &path[index + PROJECT_SEPARATOR.len() - 1 ..];
    (ProjectScope::Project(project), rest.to_string())
}

/// Returns the artifact path below the artifact proxy prefix.
///
/// The listing endpoint itself yields an empty artifact path.
#[must_use]
pub fn artifact_path(path: &str) -> Option<&str> {
    ARTIFACT_PREFIXES.iter().find_map(|prefix| {
        let rest = path.strip_prefix(prefix)?;
        if rest.is_empty() {
            return Some(rest);
        }
        rest.strip_prefix('/')
    })
}

/// Returns the action an artifact proxy request performs.
///
/// Listing (no artifact path) is a read; downloads, uploads and deletes map
/// to read, update and delete. Other methods have no action.
#[must_use]
pub fn artifact_action(method: &str, artifact_path: &str) -> Option<Action> {
    if artifact_path.is_empty() {
        return Some(Action::Read);
    }
    match method {
        "GET" | "HEAD" => Some(Action::Read),
        "PUT" => Some(Action::Update),
        "DELETE" => Some(Action::Delete),
        _ => None,
    }
}

/// Returns the experiment id leading an artifact path (`<id>/...`).
#[must_use]
pub fn artifact_experiment_id(artifact_path: &str) -> Option<&str> {
    let end = artifact_path.find(|ch: char| !ch.is_ascii_digit()).unwrap_or(artifact_path.len());
    if end == 0 {
        return None;
    }
    let rest = &artifact_path[end ..];
    (rest.is_empty() || rest.starts_with('/')).then(|| &artifact_path[.. end])
}
