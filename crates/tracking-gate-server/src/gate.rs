// crates/tracking-gate-server/src/gate.rs
// ============================================================================
// Module: Authorization Gate
// Description: Pre-request permission checks for tracking API operations.
// Purpose: Decide proceed / unauthenticated / forbidden before the upstream call.
// Dependencies: tracking-gate-core, crate::{routes, request, session}
// ============================================================================

//! ## Overview
//! The gate evaluates one request in a fixed order:
//! 1. Unprotected routes proceed without credentials.
//! 2. Requests without a usable credential are unauthenticated.
//! 3. Routed operations are checked with their [`Predicate`].
//! 4. Artifact proxy paths are checked by HTTP method against the owning
//!    experiment.
//! 5. Anything else proceeds unchecked.
//!
//! Predicates are pure decisions. A missing entity denies exactly like a
//! hidden one; provider and store failures are errors, never decisions.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Instant;

use thiserror::Error;
use tracking_gate_core::Action;
use tracking_gate_core::EntityTag;
use tracking_gate_core::PermissionResolver;
use tracking_gate_core::ProjectAuthorizationClient;
use tracking_gate_core::ProjectClientError;
use tracking_gate_core::ProjectScope;
use tracking_gate_core::RequestAuth;
use tracking_gate_core::StoreError;
use tracking_gate_core::TrackingStore;
use tracking_gate_core::name_bound_to_project;
use tracking_gate_core::rename_preserves_suffix;

use crate::request::ParamError;
use crate::request::RequestParams;
use crate::routes;
use crate::routes::OperationKind;
use crate::routes::Predicate;
use crate::routes::RouteTable;
use crate::session::SessionError;
use crate::session::SessionRegistry;

// ============================================================================
// SECTION: Outcomes
// ============================================================================

/// Gate decision for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateVerdict {
    /// Forward the request upstream.
    Proceed,
    /// No usable credential was presented.
    Unauthenticated,
    /// The caller lacks permission, or the target is absent.
    Forbidden,
}

impl GateVerdict {
    /// Returns a stable label for audit logs.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Proceed => "proceed",
            Self::Unauthenticated => "unauthenticated",
            Self::Forbidden => "forbidden",
        }
    }
}

/// Gate decision plus the classification that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateOutcome {
    /// Decision.
    pub verdict: GateVerdict,
    /// Routed operation, when the route is known.
    pub operation: Option<OperationKind>,
    /// Predicate that was evaluated, if any.
    pub predicate: Option<Predicate>,
    /// Short reason label.
    pub reason: &'static str,
}

impl GateOutcome {
    /// Builds an outcome without an evaluated predicate.
    const fn unchecked(
        verdict: GateVerdict,
        operation: Option<OperationKind>,
        reason: &'static str,
    ) -> Self {
        Self {
            verdict,
            operation,
            predicate: None,
            reason,
        }
    }
}

/// Gate failures. None of these is a permission decision.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GateError {
    /// Required request parameters were missing or malformed.
    #[error(transparent)]
    Request(#[from] ParamError),
    /// Project authorization provider failed.
    #[error(transparent)]
    Provider(#[from] ProjectClientError),
    /// Tracking store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Caller session state failed.
    #[error(transparent)]
    Session(#[from] SessionError),
}

impl GateError {
    /// Returns a stable label for audit logs.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Request(_) => "bad_request",
            Self::Provider(_) => "provider_failure",
            Self::Store(_) => "store_failure",
            Self::Session(_) => "session_failure",
        }
    }
}

// ============================================================================
// SECTION: Request
// ============================================================================

/// Request facts the gate decides on.
#[derive(Debug, Clone, Copy)]
pub struct GateRequest<'a> {
    /// HTTP method.
    pub method: &'a str,
    /// Canonical routed path, with any project prefix removed.
    pub path: &'a str,
    /// Project context of the request.
    pub scope: &'a ProjectScope,
    /// Caller credentials.
    pub auth: &'a RequestAuth,
    /// Parsed parameters, or the reason they could not be parsed.
    pub params: &'a Result<RequestParams, ParamError>,
}

impl GateRequest<'_> {
    /// Returns the parameters, surfacing a parse failure only when needed.
    fn params(&self) -> Result<&RequestParams, GateError> {
        self.params.as_ref().map_err(|err| GateError::Request(err.clone()))
    }
}

// ============================================================================
// SECTION: Gate
// ============================================================================

/// Pre-request authorization gate.
pub struct AuthorizationGate<'a> {
    /// Route classification table.
    routes: &'a RouteTable,
    /// Active project authorization backend.
    client: &'a dyn ProjectAuthorizationClient,
    /// Tracking store used for entity lookup.
    store: &'a dyn TrackingStore,
    /// Per-caller role cache scopes.
    sessions: &'a SessionRegistry,
    /// Reserved project tag key.
    project_tag: &'a str,
}

impl<'a> AuthorizationGate<'a> {
    /// Creates a gate over the given collaborators.
    #[must_use]
    pub fn new(
        routes: &'a RouteTable,
        client: &'a dyn ProjectAuthorizationClient,
        store: &'a dyn TrackingStore,
        sessions: &'a SessionRegistry,
        project_tag: &'a str,
    ) -> Self {
        Self {
            routes,
            client,
            store,
            sessions,
            project_tag,
        }
    }

    /// Decides whether `request` may reach the tracking server.
    ///
    /// # Errors
    ///
    /// Returns [`GateError`] when parameters are malformed or a collaborator fails.
    pub fn authorize(
        &self,
        request: &GateRequest<'_>,
        now: Instant,
    ) -> Result<GateOutcome, GateError> {
        let operation = self.routes.operation(request.method, request.path);
        if routes::is_unprotected(request.path) {
            return Ok(GateOutcome::unchecked(GateVerdict::Proceed, operation, "unprotected"));
        }
        let Some(caller) = request.auth.caller_key() else {
            return Ok(GateOutcome::unchecked(
                GateVerdict::Unauthenticated,
                operation,
                "missing_credentials",
            ));
        };
        let predicate = match (operation, routes::artifact_path(request.path)) {
            (Some(kind), _) => match kind.predicate() {
                Some(predicate) => predicate,
                None => {
                    return Ok(GateOutcome::unchecked(GateVerdict::Proceed, operation, "filtered"));
                }
            },
            (None, Some(artifact)) => match routes::artifact_action(request.method, artifact) {
                Some(action) => Predicate::Artifact(action),
                None => {
                    return Ok(GateOutcome::unchecked(
                        GateVerdict::Forbidden,
                        None,
                        "artifact_method",
                    ));
                }
            },
            (None, None) => {
                return Ok(GateOutcome::unchecked(GateVerdict::Proceed, None, "unchecked"));
            }
        };

        let cache = self.sessions.scope(&caller, now)?;
        let mut resolver = PermissionResolver::new(
            self.client,
            &cache,
            request.auth,
            request.scope,
            self.project_tag,
            now,
        );
        let allowed = self.evaluate(predicate, request, &mut resolver)?;
        let (verdict, reason) = if allowed {
            (GateVerdict::Proceed, "allowed")
        } else {
            (GateVerdict::Forbidden, "denied")
        };
        Ok(GateOutcome {
            verdict,
            operation,
            predicate: Some(predicate),
            reason,
        })
    }

    /// Evaluates one predicate.
    fn evaluate(
        &self,
        predicate: Predicate,
        request: &GateRequest<'_>,
        resolver: &mut PermissionResolver<'_>,
    ) -> Result<bool, GateError> {
        match predicate {
            Predicate::CreateInProject => can_create(request.params()?, resolver),
            Predicate::Experiment(action) => {
                let experiment_id = request.params()?.required("experiment_id")?;
                self.experiment_allows(&experiment_id, action, resolver)
            }
            Predicate::ExperimentByName => {
                let name = request.params()?.required("experiment_name")?;
                match self.store.get_experiment_by_name(&name)? {
                    Some(experiment) => tags_allow(resolver, &experiment.tags, Action::Read),
                    None => Ok(false),
                }
            }
            Predicate::ExperimentUpdate => {
                let params = request.params()?;
                let experiment_id = params.required("experiment_id")?;
                let Some(experiment) = found(self.store.get_experiment(&experiment_id))? else {
                    return Ok(false);
                };
                if let Some(new_name) = params.optional("new_name")
                    && !rename_preserves_suffix(&experiment.name, &new_name)
                {
                    return Ok(false);
                }
                tags_allow(resolver, &experiment.tags, Action::Update)
            }
            Predicate::ExperimentTag => {
                let params = request.params()?;
                if self.targets_project_tag(params) {
                    return Ok(false);
                }
                let experiment_id = params.required("experiment_id")?;
                self.experiment_allows(&experiment_id, Action::Update, resolver)
            }
            Predicate::Run(action) => {
                let run_id = request.params()?.run_id()?;
                self.run_allows(&run_id, action, resolver)
            }
            Predicate::Runs(action) => {
                let run_ids = request.params()?.list("run_ids");
                if run_ids.is_empty() {
                    return Err(ParamError::Missing("run_ids".to_string()).into());
                }
                for run_id in run_ids {
                    if !self.run_allows(&run_id, action, resolver)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Predicate::Model(action) => {
                let name = request.params()?.required("name")?;
                self.model_allows(&name, action, resolver)
            }
            Predicate::ModelRename => {
                let params = request.params()?;
                let name = params.required("name")?;
                let Some(model) = found(self.store.get_registered_model(&name))? else {
                    return Ok(false);
                };
                let new_name = params.optional("new_name").unwrap_or_default();
                if !rename_preserves_suffix(&model.name, &new_name) {
                    return Ok(false);
                }
                tags_allow(resolver, &model.tags, Action::Update)
            }
            Predicate::ModelTag => {
                let params = request.params()?;
                if self.targets_project_tag(params) {
                    return Ok(false);
                }
                let name = params.required("name")?;
                self.model_allows(&name, Action::Update, resolver)
            }
            Predicate::Artifact(action) => {
                let artifact = routes::artifact_path(request.path).unwrap_or_default();
                let location = if artifact.is_empty() {
                    request.params()?.optional("path").unwrap_or_default()
                } else {
                    artifact.to_string()
                };
                match routes::artifact_experiment_id(&location) {
                    Some(experiment_id) => self.experiment_allows(experiment_id, action, resolver),
                    None => Ok(false),
                }
            }
        }
    }

    /// Returns true when a tag mutation names the reserved project tag.
    fn targets_project_tag(&self, params: &RequestParams) -> bool {
        params.optional("key").is_some_and(|key| key == self.project_tag)
    }

    /// Checks `action` on an experiment by id.
    fn experiment_allows(
        &self,
        experiment_id: &str,
        action: Action,
        resolver: &mut PermissionResolver<'_>,
    ) -> Result<bool, GateError> {
        match found(self.store.get_experiment(experiment_id))? {
            Some(experiment) => tags_allow(resolver, &experiment.tags, action),
            None => Ok(false),
        }
    }

    /// Checks `action` on a run through its experiment.
    fn run_allows(
        &self,
        run_id: &str,
        action: Action,
        resolver: &mut PermissionResolver<'_>,
    ) -> Result<bool, GateError> {
        match found(self.store.get_run(run_id))? {
            Some(run) => self.experiment_allows(&run.info.experiment_id, action, resolver),
            None => Ok(false),
        }
    }

    /// Checks `action` on a registered model by name.
    fn model_allows(
        &self,
        name: &str,
        action: Action,
        resolver: &mut PermissionResolver<'_>,
    ) -> Result<bool, GateError> {
        match found(self.store.get_registered_model(name))? {
            Some(model) => tags_allow(resolver, &model.tags, action),
            None => Ok(false),
        }
    }
}

// ============================================================================
// SECTION: Predicate Helpers
// ============================================================================

/// Creation check: project scope, bound display name, create permission.
fn can_create(
    params: &RequestParams,
    resolver: &mut PermissionResolver<'_>,
) -> Result<bool, GateError> {
    let Some(project) = resolver.scope().project().cloned() else {
        return Ok(false);
    };
    let Some(info) = resolver.resolve_project(&project)? else {
        return Ok(false);
    };
    let Some(name) = params.optional("name") else {
        return Ok(false);
    };
    if !name_bound_to_project(&name, info.id) {
        return Ok(false);
    }
    Ok(info.role.permission().can_create)
}

/// Tests `action` against the permission carried by `tags`.
fn tags_allow(
    resolver: &mut PermissionResolver<'_>,
    tags: &[EntityTag],
    action: Action,
) -> Result<bool, GateError> {
    Ok(resolver.entity_permission(tags)?.allows(action))
}

/// Maps a store lookup so that absence is `None` rather than an error.
fn found<T>(result: Result<T, StoreError>) -> Result<Option<T>, GateError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(StoreError::NotFound(_)) => Ok(None),
        Err(err) => Err(err.into()),
    }
}
