// crates/tracking-gate-server/src/filter.rs
// ============================================================================
// Module: Visibility Filter
// Description: Post-processing of search responses with pagination backfill.
// Purpose: Return only readable entities while keeping the requested page size.
// Dependencies: tracking-gate-core, serde, serde_json, crate::routes
// ============================================================================

//! ## Overview
//! Search responses from the tracking server list entities the caller may not
//! read. The filter removes them and, while the page is short and the store
//! still has data, refetches further pages with the caller's own query and
//! appends readable entries until `max_results` is met.
//!
//! Termination: the refetch loop stops when the quota is met, the store
//! returns no token, the store returns an empty batch, or the configured
//! refetch cap is reached. The returned token always resumes exactly after
//! the last store entry the filter examined, so no entry is skipped or
//! repeated by a client that keeps paging.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::collections::HashSet;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Map;
use serde_json::Value;
use thiserror::Error;
use tracking_gate_core::Action;
use tracking_gate_core::EntityTag;
use tracking_gate_core::Experiment;
use tracking_gate_core::ModelVersion;
use tracking_gate_core::Page;
use tracking_gate_core::PageToken;
use tracking_gate_core::PageTokenError;
use tracking_gate_core::PermissionResolver;
use tracking_gate_core::ProjectClientError;
use tracking_gate_core::RegisteredModel;
use tracking_gate_core::Run;
use tracking_gate_core::SearchQuery;
use tracking_gate_core::StoreError;
use tracking_gate_core::TrackingStore;

use crate::routes::SearchKind;
use crate::session::SessionError;

// ============================================================================
// SECTION: Errors and Reports
// ============================================================================

/// Visibility filter failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FilterError {
    /// Upstream response body could not be interpreted.
    #[error("search response invalid: {0}")]
    Body(String),
    /// A page token could not be decoded for offset arithmetic.
    #[error(transparent)]
    PageToken(#[from] PageTokenError),
    /// Tracking store failed during backfill or entity lookup.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Project authorization provider failed.
    #[error(transparent)]
    Provider(#[from] ProjectClientError),
    /// Caller session state failed.
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Summary of one filtering pass, for server-side audit only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FilterReport {
    /// Entities returned to the caller.
    pub returned: usize,
    /// Entities examined and withheld.
    pub hidden: usize,
    /// Refetch calls issued against the store.
    pub backfill_requests: u32,
    /// True when no continuation token is returned.
    pub exhausted: bool,
}

/// Rewritten response body plus its report.
#[derive(Debug, Clone, PartialEq)]
pub struct FilteredResponse {
    /// Serialized response body.
    pub body: Vec<u8>,
    /// Filtering summary.
    pub report: FilterReport,
}

// ============================================================================
// SECTION: Readability
// ============================================================================

/// Read-permission oracle shared by every entity kind in one pass.
struct Visibility<'r, 'a> {
    /// Request-scoped permission resolver.
    resolver: &'r mut PermissionResolver<'a>,
    /// Store used to reach owning experiments.
    store: &'r dyn TrackingStore,
    /// Readability memoized per experiment id.
    experiments: HashMap<String, bool>,
}

impl Visibility<'_, '_> {
    /// Returns true when the entity carrying `tags` is readable.
    fn tags_readable(&mut self, tags: &[EntityTag]) -> Result<bool, FilterError> {
        Ok(self.resolver.entity_permission(tags)?.allows(Action::Read))
    }

    /// Returns true when the experiment `experiment_id` is readable.
    fn experiment_readable(&mut self, experiment_id: &str) -> Result<bool, FilterError> {
        if let Some(readable) = self.experiments.get(experiment_id) {
            return Ok(*readable);
        }
        let readable = match self.store.get_experiment(experiment_id) {
            Ok(experiment) => self.tags_readable(&experiment.tags)?,
            Err(StoreError::NotFound(_)) => false,
            Err(err) => return Err(err.into()),
        };
        self.experiments.insert(experiment_id.to_string(), readable);
        Ok(readable)
    }

    /// Returns true when the run `run_id` is readable through its experiment.
    fn run_readable(&mut self, run_id: &str) -> Result<bool, FilterError> {
        if run_id.is_empty() {
            return Ok(false);
        }
        match self.store.get_run(run_id) {
            Ok(run) => self.experiment_readable(&run.info.experiment_id),
            Err(StoreError::NotFound(_)) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }
}

/// Search result entity handled by the filter.
trait SearchEntity: Serialize + DeserializeOwned {
    /// Stable identity used to drop duplicates across pages.
    fn identity(&self) -> String;

    /// Issues the search against the store.
    fn search(store: &dyn TrackingStore, query: &SearchQuery) -> Result<Page<Self>, StoreError>;

    /// Returns true when the caller may read the entity.
    fn readable(&self, visibility: &mut Visibility<'_, '_>) -> Result<bool, FilterError>;
}

impl SearchEntity for Experiment {
    fn identity(&self) -> String {
        self.experiment_id.clone()
    }

    fn search(store: &dyn TrackingStore, query: &SearchQuery) -> Result<Page<Self>, StoreError> {
        store.search_experiments(query)
    }

    fn readable(&self, visibility: &mut Visibility<'_, '_>) -> Result<bool, FilterError> {
        visibility.tags_readable(&self.tags)
    }
}

impl SearchEntity for Run {
    fn identity(&self) -> String {
        self.info.run_id.clone()
    }

    fn search(store: &dyn TrackingStore, query: &SearchQuery) -> Result<Page<Self>, StoreError> {
        store.search_runs(query)
    }

    fn readable(&self, visibility: &mut Visibility<'_, '_>) -> Result<bool, FilterError> {
        visibility.experiment_readable(&self.info.experiment_id)
    }
}

impl SearchEntity for RegisteredModel {
    fn identity(&self) -> String {
        self.name.clone()
    }

    fn search(store: &dyn TrackingStore, query: &SearchQuery) -> Result<Page<Self>, StoreError> {
        store.search_registered_models(query)
    }

    fn readable(&self, visibility: &mut Visibility<'_, '_>) -> Result<bool, FilterError> {
        visibility.tags_readable(&self.tags)
    }
}

impl SearchEntity for ModelVersion {
    fn identity(&self) -> String {
        format!("{}\u{0}{}", self.name, self.version)
    }

    fn search(store: &dyn TrackingStore, query: &SearchQuery) -> Result<Page<Self>, StoreError> {
        store.search_model_versions(query)
    }

    fn readable(&self, visibility: &mut Visibility<'_, '_>) -> Result<bool, FilterError> {
        visibility.run_readable(&self.run_id)
    }
}

// ============================================================================
// SECTION: Filter
// ============================================================================

/// Search response filter with bounded backfill.
pub struct VisibilityFilter<'a> {
    /// Store used for refetches and owner lookups.
    store: &'a dyn TrackingStore,
    /// Hard cap on refetch calls per response.
    max_backfill_requests: u32,
}

impl<'a> VisibilityFilter<'a> {
    /// Creates a filter.
    #[must_use]
    pub fn new(store: &'a dyn TrackingStore, max_backfill_requests: u32) -> Self {
        Self {
            store,
            max_backfill_requests,
        }
    }

    /// Filters a successful search response body for `kind`.
    ///
    /// `query` carries the caller's original search parameters; refetches
    /// replay it with only the page token replaced.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError`] when the body is malformed or a collaborator fails.
    pub fn apply(
        &self,
        kind: SearchKind,
        body: &[u8],
        query: &SearchQuery,
        resolver: &mut PermissionResolver<'_>,
    ) -> Result<FilteredResponse, FilterError> {
        let mut visibility = Visibility {
            resolver,
            store: self.store,
            experiments: HashMap::new(),
        };
        match kind {
            SearchKind::Experiments => {
                self.filter_page::<Experiment>(kind, body, query, &mut visibility)
            }
            SearchKind::Runs => self.filter_page::<Run>(kind, body, query, &mut visibility),
            SearchKind::RegisteredModels => {
                self.filter_page::<RegisteredModel>(kind, body, query, &mut visibility)
            }
            SearchKind::ModelVersions => {
                self.filter_page::<ModelVersion>(kind, body, query, &mut visibility)
            }
        }
    }

    /// Filters and backfills one response for entity type `T`.
    fn filter_page<T: SearchEntity>(
        &self,
        kind: SearchKind,
        body: &[u8],
        query: &SearchQuery,
        visibility: &mut Visibility<'_, '_>,
    ) -> Result<FilteredResponse, FilterError> {
        let mut response = parse_object(body)?;
        let field = kind.response_field();
        let first_page: Vec<T> = match response.remove(field) {
            Some(items) => {
                serde_json::from_value(items).map_err(|err| FilterError::Body(err.to_string()))?
            }
            None => Vec::new(),
        };
        let mut token = match response.remove("next_page_token") {
            Some(Value::String(token)) if !token.is_empty() => Some(token),
            _ => None,
        };
        let quota = usize::try_from(query.max_results().unwrap_or(kind.default_max_results()))
            .unwrap_or(usize::MAX);

        let mut seen = HashSet::new();
        let mut kept: Vec<T> = Vec::new();
        let mut report = FilterReport::default();
        for entity in first_page {
            if seen.insert(entity.identity()) && entity.readable(visibility)? {
                kept.push(entity);
            } else {
                report.hidden += 1;
            }
        }

        while kept.len() < quota && report.backfill_requests < self.max_backfill_requests {
            let Some(current) = token.take() else {
                break;
            };
            report.backfill_requests += 1;
            let batch = T::search(self.store, &query.with_page_token(&current))?;
            if batch.items.is_empty() {
                break;
            }
            let fetched = batch.items.len();
            let mut consumed = 0usize;
            for entity in batch.items {
                if kept.len() >= quota {
                    break;
                }
                consumed += 1;
                if seen.insert(entity.identity()) && entity.readable(visibility)? {
                    kept.push(entity);
                } else {
                    report.hidden += 1;
                }
            }
            token = if consumed == fetched {
                batch.next_page_token.filter(|next| !next.is_empty())
            } else {
                let start = PageToken::decode(&current)?.offset();
                let consumed = u64::try_from(consumed).unwrap_or(u64::MAX);
                Some(PageToken::new(start.saturating_add(consumed)).encode())
            };
        }

        report.returned = kept.len();
        report.exhausted = token.is_none();
        if !kept.is_empty() {
            let items =
                serde_json::to_value(&kept).map_err(|err| FilterError::Body(err.to_string()))?;
            response.insert(field.to_string(), items);
        }
        if let Some(token) = token {
            response.insert("next_page_token".to_string(), Value::String(token));
        }
        let body = serde_json::to_vec(&Value::Object(response))
            .map_err(|err| FilterError::Body(err.to_string()))?;
        Ok(FilteredResponse { body, report })
    }
}

/// Parses a response body as a JSON object; an empty body is an empty page.
fn parse_object(body: &[u8]) -> Result<Map<String, Value>, FilterError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }
    match serde_json::from_slice(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(FilterError::Body("search response is not an object".to_string())),
        Err(err) => Err(FilterError::Body(err.to_string())),
    }
}
