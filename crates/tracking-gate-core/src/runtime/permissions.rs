// crates/tracking-gate-core/src/runtime/permissions.rs
// ============================================================================
// Module: Permission Resolver
// Description: Project tag -> project path -> role -> permission resolution.
// Purpose: Answer every permission question for one request through the role cache.
// Dependencies: crate::{core, interfaces}, crate::runtime::cache
// ============================================================================

//! ## Overview
//! A [`PermissionResolver`] lives for one request. It borrows the caller's role
//! cache, the active project client, and the request credentials, and resolves
//! permissions for projects and for tagged entities.
//!
//! The cache lock is taken only around single reads and writes. Provider
//! lookups run with the lock released, so concurrent requests from the same
//! caller never queue behind a slow provider.
//!
//! Invariants:
//! - An entity without a usable project tag resolves to no permissions.
//! - In a project scope, entities owned by another project resolve to no
//!   permissions without contacting the provider.
//! - Absent projects are cached as [`Role::NoAccess`].
//! - Provider failures propagate; they are never converted into a role.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;
use std::time::Instant;

use crate::core::credentials::RequestAuth;
use crate::core::entities::EntityTag;
use crate::core::entities::tag_value;
use crate::core::identifiers::ProjectPath;
use crate::core::project::ProjectInfo;
use crate::core::project::ProjectScope;
use crate::core::role::Permission;
use crate::core::role::Role;
use crate::interfaces::ProjectAuthorizationClient;
use crate::interfaces::ProjectClientError;
use crate::runtime::cache::RoleCache;

// ============================================================================
// SECTION: Resolver
// ============================================================================

/// Request-scoped permission resolver.
pub struct PermissionResolver<'a> {
    /// Active project authorization backend.
    client: &'a dyn ProjectAuthorizationClient,
    /// Caller-owned role cache.
    cache: &'a Mutex<RoleCache>,
    /// Caller credentials forwarded to the provider.
    auth: &'a RequestAuth,
    /// Project context of the request.
    scope: &'a ProjectScope,
    /// Reserved tag key recording entity ownership.
    project_tag: &'a str,
    /// Request instant used for cache expiry.
    now: Instant,
}

impl<'a> PermissionResolver<'a> {
    /// Creates a resolver for one request.
    #[must_use]
    pub fn new(
        client: &'a dyn ProjectAuthorizationClient,
        cache: &'a Mutex<RoleCache>,
        auth: &'a RequestAuth,
        scope: &'a ProjectScope,
        project_tag: &'a str,
        now: Instant,
    ) -> Self {
        Self {
            client,
            cache,
            auth,
            scope,
            project_tag,
            now,
        }
    }

    /// Returns the request's project scope.
    #[must_use]
    pub const fn scope(&self) -> &ProjectScope {
        self.scope
    }

    /// Returns the reserved project tag key.
    #[must_use]
    pub const fn project_tag(&self) -> &str {
        self.project_tag
    }

    /// Returns the request credentials.
    #[must_use]
    pub const fn auth(&self) -> &RequestAuth {
        self.auth
    }

    /// Locks the role cache. A poisoned cache is still a valid map of roles.
    fn cache(&self) -> MutexGuard<'_, RoleCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queries the provider for `path` and refreshes the cached role.
    ///
    /// Always performs a provider call; callers that need the project id use
    /// this instead of [`Self::project_role`].
    ///
    /// # Errors
    ///
    /// Returns [`ProjectClientError`] when the provider lookup fails.
    pub fn resolve_project(
        &mut self,
        path: &ProjectPath,
    ) -> Result<Option<ProjectInfo>, ProjectClientError> {
        let info = self.client.resolve(path, self.auth)?;
        let role = info.as_ref().map_or(Role::NoAccess, |project| project.role);
        self.cache().set(path.clone(), role, self.now);
        Ok(info)
    }

    /// Returns the caller's role in `path`, consulting the cache first.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectClientError`] when a provider lookup is needed and fails.
    pub fn project_role(&mut self, path: &ProjectPath) -> Result<Role, ProjectClientError> {
        let cached = self.cache().get(path, self.now);
        if let Some(role) = cached {
            return Ok(role);
        }
        Ok(self.resolve_project(path)?.map_or(Role::NoAccess, |project| project.role))
    }

    /// Returns the caller's permission in `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectClientError`] when a provider lookup is needed and fails.
    pub fn project_permission(
        &mut self,
        path: &ProjectPath,
    ) -> Result<Permission, ProjectClientError> {
        Ok(self.project_role(path)?.permission())
    }

    /// Returns the caller's permission on an entity carrying `tags`.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectClientError`] when a provider lookup is needed and fails.
    pub fn entity_permission(
        &mut self,
        tags: &[EntityTag],
    ) -> Result<Permission, ProjectClientError> {
        let Some(owner) = self.entity_owner(tags) else {
            return Ok(Permission::none());
        };
        if !self.scope.admits(&owner) {
            return Ok(Permission::none());
        }
        self.project_permission(&owner)
    }

    /// Returns the owning project recorded in `tags`, if any.
    #[must_use]
    pub fn entity_owner(&self, tags: &[EntityTag]) -> Option<ProjectPath> {
        tag_value(tags, self.project_tag).and_then(ProjectPath::parse)
    }
}
