// crates/tracking-gate-core/src/runtime/memory.rs
// ============================================================================
// Module: In-Memory Collaborators
// Description: In-memory tracking store and project directory for tests and demos.
// Purpose: Provide deterministic collaborator implementations without network deps.
// Dependencies: serde_json, crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! [`InMemoryTrackingStore`] pages results with the store's offset token
//! encoding and counts search calls so backfill behaviour can be asserted.
//! [`InMemoryProjectDirectory`] answers project lookups from a fixed table and
//! counts provider calls so cache hits can be asserted. Neither is intended
//! for production use.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use crate::core::credentials::RequestAuth;
use crate::core::entities::EntityTag;
use crate::core::entities::Experiment;
use crate::core::entities::ModelVersion;
use crate::core::entities::Page;
use crate::core::entities::RegisteredModel;
use crate::core::entities::Run;
use crate::core::entities::RunInfo;
use crate::core::entities::SearchQuery;
use crate::core::identifiers::ProjectId;
use crate::core::identifiers::ProjectPath;
use crate::core::page_token::PageToken;
use crate::core::project::ProjectInfo;
use crate::core::role::Role;
use crate::interfaces::ProjectAuthorizationClient;
use crate::interfaces::ProjectClientError;
use crate::interfaces::StoreError;
use crate::interfaces::TrackingStore;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Page size used when a search omits `max_results`.
const DEFAULT_PAGE_SIZE: u64 = 1000;

// ============================================================================
// SECTION: In-Memory Tracking Store
// ============================================================================

/// Entity tables held by the in-memory store.
#[derive(Debug, Default)]
struct StoreState {
    /// Experiments in creation order.
    experiments: Vec<Experiment>,
    /// Runs in creation order.
    runs: Vec<Run>,
    /// Registered models in creation order.
    models: Vec<RegisteredModel>,
    /// Model versions in creation order.
    versions: Vec<ModelVersion>,
}

/// In-memory tracking store for tests and examples.
#[derive(Debug, Default, Clone)]
pub struct InMemoryTrackingStore {
    /// Entity tables protected by a mutex.
    state: Arc<Mutex<StoreState>>,
    /// Number of search calls served.
    search_calls: Arc<AtomicUsize>,
}

impl InMemoryTrackingStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks the entity tables.
    fn lock(&self) -> Result<MutexGuard<'_, StoreState>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Unavailable("tracking store mutex poisoned".to_string()))
    }

    /// Creates an experiment and returns its id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Invalid`] when the name is already taken.
    pub fn create_experiment(
        &self,
        name: &str,
        tags: Vec<EntityTag>,
    ) -> Result<String, StoreError> {
        let mut state = self.lock()?;
        if state.experiments.iter().any(|experiment| experiment.name == name) {
            return Err(StoreError::Invalid(format!("experiment name already exists: {name}")));
        }
        let experiment_id = state.experiments.len().to_string();
        state.experiments.push(Experiment {
            experiment_id: experiment_id.clone(),
            name: name.to_string(),
            tags,
            extra: serde_json::Map::new(),
        });
        drop(state);
        Ok(experiment_id)
    }

    /// Creates a run inside `experiment_id` and returns its id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the experiment does not exist.
    pub fn create_run(&self, experiment_id: &str) -> Result<String, StoreError> {
        let mut state = self.lock()?;
        if !state.experiments.iter().any(|experiment| experiment.experiment_id == experiment_id) {
            return Err(StoreError::NotFound(format!("experiment {experiment_id}")));
        }
        let run_id = format!("run-{}", state.runs.len());
        state.runs.push(Run {
            info: RunInfo {
                run_id: run_id.clone(),
                experiment_id: experiment_id.to_string(),
                extra: serde_json::Map::new(),
            },
            extra: serde_json::Map::new(),
        });
        drop(state);
        Ok(run_id)
    }

    /// Creates a registered model.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Invalid`] when the name is already taken.
    pub fn create_registered_model(
        &self,
        name: &str,
        tags: Vec<EntityTag>,
    ) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        if state.models.iter().any(|model| model.name == name) {
            return Err(StoreError::Invalid(format!("registered model already exists: {name}")));
        }
        state.models.push(RegisteredModel {
            name: name.to_string(),
            tags,
            extra: serde_json::Map::new(),
        });
        Ok(())
    }

    /// Creates the next version of `name` sourced from `run_id` and returns its number.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the model does not exist.
    pub fn create_model_version(&self, name: &str, run_id: &str) -> Result<String, StoreError> {
        let mut state = self.lock()?;
        if !state.models.iter().any(|model| model.name == name) {
            return Err(StoreError::NotFound(format!("registered model {name}")));
        }
        let existing = state.versions.iter().filter(|candidate| candidate.name == name).count();
        let version = (existing + 1).to_string();
        state.versions.push(ModelVersion {
            name: name.to_string(),
            version: version.clone(),
            run_id: run_id.to_string(),
            tags: Vec::new(),
            extra: serde_json::Map::new(),
        });
        drop(state);
        Ok(version)
    }

    /// Deletes a run.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the run does not exist.
    pub fn delete_run(&self, run_id: &str) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        let before = state.runs.len();
        state.runs.retain(|run| run.info.run_id != run_id);
        if state.runs.len() == before {
            return Err(StoreError::NotFound(format!("run {run_id}")));
        }
        Ok(())
    }

    /// Returns the number of search calls served so far.
    #[must_use]
    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    /// Records one search call.
    fn count_search(&self) {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
    }
}

/// Returns one offset-addressed page of `items`.
fn paginate<T: Clone>(items: &[T], query: &SearchQuery) -> Result<Page<T>, StoreError> {
    let offset = match query.page_token() {
        Some(token) => PageToken::decode(token)
            .map_err(|err| StoreError::Invalid(err.to_string()))?
            .offset(),
        None => 0,
    };
    let page_size = query.max_results().unwrap_or(DEFAULT_PAGE_SIZE);
    let start = usize::try_from(offset).unwrap_or(usize::MAX).min(items.len());
    let size = usize::try_from(page_size).unwrap_or(usize::MAX);
    let end = start.saturating_add(size).min(items.len());
    let next_page_token = (end < items.len())
        .then(|| PageToken::new(u64::try_from(end).unwrap_or(u64::MAX)).encode());
    Ok(Page {
        items: items[start .. end].to_vec(),
        next_page_token,
    })
}

/// Inserts or replaces `key` in `tags`.
fn upsert_tag(tags: &mut Vec<EntityTag>, key: &str, value: &str) {
    if let Some(tag) = tags.iter_mut().find(|tag| tag.key == key) {
        value.clone_into(&mut tag.value);
        return;
    }
    tags.push(EntityTag::new(key, value));
}

impl TrackingStore for InMemoryTrackingStore {
    fn get_experiment(&self, experiment_id: &str) -> Result<Experiment, StoreError> {
        self.lock()?
            .experiments
            .iter()
            .find(|experiment| experiment.experiment_id == experiment_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("experiment {experiment_id}")))
    }

    fn get_experiment_by_name(&self, name: &str) -> Result<Option<Experiment>, StoreError> {
        Ok(self.lock()?.experiments.iter().find(|experiment| experiment.name == name).cloned())
    }

    fn get_run(&self, run_id: &str) -> Result<Run, StoreError> {
        self.lock()?
            .runs
            .iter()
            .find(|run| run.info.run_id == run_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("run {run_id}")))
    }

    fn get_registered_model(&self, name: &str) -> Result<RegisteredModel, StoreError> {
        self.lock()?
            .models
            .iter()
            .find(|model| model.name == name)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("registered model {name}")))
    }

    fn get_model_version(&self, name: &str, version: &str) -> Result<ModelVersion, StoreError> {
        self.lock()?
            .versions
            .iter()
            .find(|candidate| candidate.name == name && candidate.version == version)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("model version {name}/{version}")))
    }

    fn search_experiments(&self, query: &SearchQuery) -> Result<Page<Experiment>, StoreError> {
        self.count_search();
        paginate(&self.lock()?.experiments, query)
    }

    fn search_runs(&self, query: &SearchQuery) -> Result<Page<Run>, StoreError> {
        self.count_search();
        let experiment_ids = query.string_list("experiment_ids");
        let state = self.lock()?;
        let runs: Vec<Run> = state
            .runs
            .iter()
            .filter(|run| {
                experiment_ids.is_empty() || experiment_ids.contains(&run.info.experiment_id)
            })
            .cloned()
            .collect();
        drop(state);
        paginate(&runs, query)
    }

    fn search_registered_models(
        &self,
        query: &SearchQuery,
    ) -> Result<Page<RegisteredModel>, StoreError> {
        self.count_search();
        paginate(&self.lock()?.models, query)
    }

    fn search_model_versions(&self, query: &SearchQuery) -> Result<Page<ModelVersion>, StoreError> {
        self.count_search();
        paginate(&self.lock()?.versions, query)
    }

    fn set_experiment_tag(
        &self,
        experiment_id: &str,
        key: &str,
        value: &str,
    ) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        let experiment = state
            .experiments
            .iter_mut()
            .find(|experiment| experiment.experiment_id == experiment_id)
            .ok_or_else(|| StoreError::NotFound(format!("experiment {experiment_id}")))?;
        upsert_tag(&mut experiment.tags, key, value);
        Ok(())
    }

    fn set_registered_model_tag(
        &self,
        name: &str,
        key: &str,
        value: &str,
    ) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        let model = state
            .models
            .iter_mut()
            .find(|model| model.name == name)
            .ok_or_else(|| StoreError::NotFound(format!("registered model {name}")))?;
        upsert_tag(&mut model.tags, key, value);
        Ok(())
    }
}

// ============================================================================
// SECTION: In-Memory Project Directory
// ============================================================================

/// Fixed-table project authorization client for tests and examples.
///
/// Every caller holds the same role in a listed project.
#[derive(Debug, Default, Clone)]
pub struct InMemoryProjectDirectory {
    /// Project id and role keyed by path.
    projects: BTreeMap<ProjectPath, (ProjectId, Role)>,
    /// Failure returned for every lookup when set.
    failure: Option<ProjectClientError>,
    /// Number of lookups served.
    calls: Arc<AtomicUsize>,
}

impl InMemoryProjectDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a project visible with `role`.
    #[must_use]
    pub fn with_project(mut self, path: ProjectPath, id: ProjectId, role: Role) -> Self {
        self.projects.insert(path, (id, role));
        self
    }

    /// Makes every lookup fail with `error`.
    #[must_use]
    pub fn failing(mut self, error: ProjectClientError) -> Self {
        self.failure = Some(error);
        self
    }

    /// Returns the number of lookups served so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ProjectAuthorizationClient for InMemoryProjectDirectory {
    fn resolve(
        &self,
        path: &ProjectPath,
        _auth: &RequestAuth,
    ) -> Result<Option<ProjectInfo>, ProjectClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }
        Ok(self.projects.get(path).map(|(id, role)| ProjectInfo {
            id: *id,
            path: path.clone(),
            role: *role,
        }))
    }
}
