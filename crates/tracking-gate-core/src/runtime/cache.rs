// crates/tracking-gate-core/src/runtime/cache.rs
// ============================================================================
// Module: Role Cache
// Description: Per-caller, per-project role cache with a fixed time-to-live.
// Purpose: Avoid one provider call per tracking call without serving stale roles.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! A [`RoleCache`] belongs to exactly one caller; the host keeps one instance
//! per caller and never shares it. Entries store the role's numeric access
//! level and their insertion instant. An entry is valid for `timeout` from
//! insertion; reads past that point evict it and report a miss.
//!
//! Invariants:
//! - Expired entries are removed before a lookup can return them.
//! - `set` always replaces the previous entry and restarts its lifetime.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::time::Duration;
use std::time::Instant;

use crate::core::identifiers::ProjectPath;
use crate::core::role::Role;

// ============================================================================
// SECTION: Cache Entry
// ============================================================================

/// Cached role decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachedRoleEntry {
    /// Numeric access level of the cached role.
    pub access_level: u8,
    /// Instant the entry was written.
    pub inserted_at: Instant,
}

impl CachedRoleEntry {
    /// Returns the cached role.
    #[must_use]
    pub fn role(&self) -> Role {
        Role::from_access_level(i64::from(self.access_level))
    }

    /// Returns true when the entry has outlived `timeout` at `now`.
    #[must_use]
    pub fn is_expired(&self, timeout: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.inserted_at) >= timeout
    }
}

// ============================================================================
// SECTION: Role Cache
// ============================================================================

/// Time-bounded role cache for a single caller.
#[derive(Debug, Clone)]
pub struct RoleCache {
    /// Entry lifetime.
    timeout: Duration,
    /// Entries keyed by project path.
    entries: BTreeMap<ProjectPath, CachedRoleEntry>,
}

impl RoleCache {
    /// Creates an empty cache whose entries live for `timeout`.
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            entries: BTreeMap::new(),
        }
    }

    /// Returns the configured entry lifetime.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns the cached role for `path`, evicting it if expired.
    pub fn get(&mut self, path: &ProjectPath, now: Instant) -> Option<Role> {
        let entry = *self.entries.get(path)?;
        if entry.is_expired(self.timeout, now) {
            self.entries.remove(path);
            return None;
        }
        Some(entry.role())
    }

    /// Stores `role` for `path` as of `now`.
    pub fn set(&mut self, path: ProjectPath, role: Role, now: Instant) {
        self.entries.insert(
            path,
            CachedRoleEntry {
                access_level: role.access_level(),
                inserted_at: now,
            },
        );
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Returns the number of stored entries, including not-yet-evicted expired ones.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
