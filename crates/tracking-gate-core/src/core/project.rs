// crates/tracking-gate-core/src/core/project.rs
// ============================================================================
// Module: Tracking Gate Projects
// Description: Project resolution results, request scope, and display-name binding.
// Purpose: Attribute tracking resources to exactly one backing project.
// Dependencies: serde, crate::core
// ============================================================================

//! ## Overview
//! A request runs either in the global context or inside one project. Tracking
//! entities record their owning project in a reserved tag, and creation
//! requests bind their display name to the owning project's numeric id with a
//! trailing `(<id>)` suffix.
//!
//! Invariants:
//! - The global scope admits every owner; a project scope admits only itself.
//! - Suffix extraction is deterministic and independent of caller state.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::ProjectId;
use crate::core::identifiers::ProjectPath;
use crate::core::role::Role;

// ============================================================================
// SECTION: Project Info
// ============================================================================

/// Resolved project visible to the caller.
///
/// # Invariants
/// - Produced per provider lookup; absent projects are represented by `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectInfo {
    /// Provider-assigned numeric id.
    pub id: ProjectId,
    /// Namespace-qualified path that was resolved.
    pub path: ProjectPath,
    /// Caller role inside the project.
    pub role: Role,
}

// ============================================================================
// SECTION: Request Scope
// ============================================================================

/// Project context a request runs in.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ProjectScope {
    /// Global view spanning every project.
    #[default]
    Global,
    /// Single-project view.
    Project(ProjectPath),
}

impl ProjectScope {
    /// Returns the active project, if any.
    #[must_use]
    pub const fn project(&self) -> Option<&ProjectPath> {
        match self {
            Self::Global => None,
            Self::Project(path) => Some(path),
        }
    }

    /// Returns true when an entity owned by `owner` is visible in this scope.
    #[must_use]
    pub fn admits(&self, owner: &ProjectPath) -> bool {
        match self {
            Self::Global => true,
            Self::Project(path) => path == owner,
        }
    }

    /// Returns a stable label for audit logs.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Global => "global".to_string(),
            Self::Project(path) => path.as_str().to_string(),
        }
    }
}

// ============================================================================
// SECTION: Display Name Suffix
// ============================================================================

/// Returns the trailing `(...)` suffix of a display name.
///
/// The suffix must be separated from the rest of the name by whitespace and
/// contain at least one character. When several candidates exist, the
/// leftmost one wins, so `"a (b) (1)"` yields `"(b) (1)"`.
#[must_use]
pub fn display_name_suffix(name: &str) -> Option<&str> {
    if !name.ends_with(')') {
        return None;
    }
    let mut previous: Option<char> = None;
    for (index, ch) in name.char_indices() {
        let preceded_by_space = previous.is_some_and(char::is_whitespace);
        previous = Some(ch);
        if ch != '(' || !preceded_by_space {
            continue;
        }
        let candidate = &name[index..];
        let inner = &candidate[1..candidate.len() - 1];
        if !inner.is_empty() && !inner.contains('\n') {
            return Some(candidate);
        }
    }
    None
}

/// Returns the suffix binding a display name to `id`.
#[must_use]
pub fn project_suffix(id: ProjectId) -> String {
    format!("({id})")
}

/// Returns true when the display name carries the suffix of project `id`.
#[must_use]
pub fn name_bound_to_project(name: &str, id: ProjectId) -> bool {
    display_name_suffix(name).is_some_and(|suffix| suffix == project_suffix(id))
}

/// Returns true when a rename keeps the original, present suffix unchanged.
#[must_use]
pub fn rename_preserves_suffix(old_name: &str, new_name: &str) -> bool {
    match (display_name_suffix(old_name), display_name_suffix(new_name)) {
        (Some(old), Some(new)) => old == new,
        _ => false,
    }
}
