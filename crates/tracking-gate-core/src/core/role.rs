// crates/tracking-gate-core/src/core/role.rs
// ============================================================================
// Module: Tracking Gate Roles
// Description: Ordered project roles and the CRUD permissions they grant.
// Purpose: Provide a total, pure role -> permission mapping for every check.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Roles are the privilege levels a caller holds inside a project, as reported
//! by the project authorization provider. Each role carries a stable numeric
//! access level used for ordering and cache storage. Permissions are derived
//! from roles and are never mutated independently.
//!
//! Invariants:
//! - Access levels are strictly monotonic with privilege.
//! - Unknown access levels decode to [`Role::NoAccess`].
//! - [`permission_for`] is total and side-effect free.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Roles
// ============================================================================

/// Project role held by a caller.
///
/// # Invariants
/// - Variant order matches privilege order (`NoAccess` lowest).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// No access to the project.
    #[default]
    NoAccess,
    /// Minimal access (membership without content visibility).
    Minimal,
    /// Guest access.
    Guest,
    /// Reporter access.
    Reporter,
    /// Developer access.
    Developer,
    /// Maintainer access.
    Maintainer,
    /// Owner access.
    Owner,
}

impl Role {
    /// All roles in ascending privilege order.
    pub const ALL: [Self; 7] = [
        Self::NoAccess,
        Self::Minimal,
        Self::Guest,
        Self::Reporter,
        Self::Developer,
        Self::Maintainer,
        Self::Owner,
    ];

    /// Returns the stable numeric access level for the role.
    #[must_use]
    pub const fn access_level(self) -> u8 {
        match self {
            Self::NoAccess => 0,
            Self::Minimal => 5,
            Self::Guest => 10,
            Self::Reporter => 20,
            Self::Developer => 30,
            Self::Maintainer => 40,
            Self::Owner => 50,
        }
    }

    /// Decodes a numeric access level, falling back to [`Role::NoAccess`].
    #[must_use]
    pub const fn from_access_level(level: i64) -> Self {
        match level {
            5 => Self::Minimal,
            10 => Self::Guest,
            20 => Self::Reporter,
            30 => Self::Developer,
            40 => Self::Maintainer,
            50 => Self::Owner,
            _ => Self::NoAccess,
        }
    }

    /// Returns a stable label for logs and diagnostics.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::NoAccess => "no_access",
            Self::Minimal => "minimal",
            Self::Guest => "guest",
            Self::Reporter => "reporter",
            Self::Developer => "developer",
            Self::Maintainer => "maintainer",
            Self::Owner => "owner",
        }
    }

    /// Returns the permission set granted by the role.
    #[must_use]
    pub const fn permission(self) -> Permission {
        permission_for(self)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ============================================================================
// SECTION: Permissions
// ============================================================================

/// CRUD action evaluated against a [`Permission`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Create a resource inside a project.
    Create,
    /// Read a resource.
    Read,
    /// Update a resource.
    Update,
    /// Delete or restore a resource.
    Delete,
}

impl Action {
    /// Returns a stable label for the action.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

/// CRUD permission set derived from a [`Role`].
///
/// # Invariants
/// - Values are only produced by [`permission_for`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Permission {
    /// Priority of the originating role, kept for tie-breaks and debugging.
    pub priority: u8,
    /// Whether resources may be created.
    pub can_create: bool,
    /// Whether resources may be read.
    pub can_read: bool,
    /// Whether resources may be updated.
    pub can_update: bool,
    /// Whether resources may be deleted.
    pub can_delete: bool,
}

impl Permission {
    /// Returns true when the permission grants the action.
    #[must_use]
    pub const fn allows(self, action: Action) -> bool {
        match action {
            Action::Create => self.can_create,
            Action::Read => self.can_read,
            Action::Update => self.can_update,
            Action::Delete => self.can_delete,
        }
    }

    /// Returns the permission granted to callers without access.
    #[must_use]
    pub const fn none() -> Self {
        permission_for(Role::NoAccess)
    }
}

/// Returns the permission set for a role.
#[must_use]
pub const fn permission_for(role: Role) -> Permission {
    let (priority, can_create, can_read, can_update, can_delete) = match role {
        Role::NoAccess => (0, false, false, false, false),
        Role::Minimal => (10, false, false, false, false),
        Role::Guest => (20, false, true, false, false),
        Role::Reporter => (30, false, true, false, false),
        Role::Developer => (40, true, true, true, false),
        Role::Maintainer => (50, true, true, true, true),
        Role::Owner => (60, true, true, true, true),
    };
    Permission {
        priority,
        can_create,
        can_read,
        can_update,
        can_delete,
    }
}
