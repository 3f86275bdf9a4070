// crates/tracking-gate-core/tests/role_cache.rs
// ============================================================================
// Module: Role Cache Tests
// Description: Expiry, overwrite, and eviction behaviour of the role cache.
// ============================================================================
//! ## Overview
//! Validates that cached roles expire exactly at the configured timeout and
//! that expired entries never resurface.

#![allow(clippy::unwrap_used, reason = "Tests use unwrap on deterministic fixtures.")]

use std::time::Duration;
use std::time::Instant;

use tracking_gate_core::ProjectPath;
use tracking_gate_core::Role;
use tracking_gate_core::RoleCache;

fn alpha() -> ProjectPath {
    ProjectPath::parse("teams/alpha").unwrap()
}

#[test]
fn set_then_get_returns_role() {
    let now = Instant::now();
    let mut cache = RoleCache::new(Duration::from_secs(300));
    cache.set(alpha(), Role::Developer, now);
    assert_eq!(cache.get(&alpha(), now), Some(Role::Developer));
    assert_eq!(cache.get(&alpha(), now + Duration::from_secs(299)), Some(Role::Developer));
}

#[test]
fn expired_entry_is_evicted() {
    let now = Instant::now();
    let mut cache = RoleCache::new(Duration::from_secs(300));
    cache.set(alpha(), Role::Owner, now);
    assert_eq!(cache.get(&alpha(), now + Duration::from_secs(300)), None);
    assert!(cache.is_empty());
}

#[test]
fn overwrite_after_expiry_starts_fresh() {
    let now = Instant::now();
    let later = now + Duration::from_secs(301);
    let mut cache = RoleCache::new(Duration::from_secs(300));
    cache.set(alpha(), Role::Owner, now);
    assert_eq!(cache.get(&alpha(), later), None);
    cache.set(alpha(), Role::Guest, later);
    assert_eq!(cache.get(&alpha(), later + Duration::from_secs(10)), Some(Role::Guest));
}

#[test]
fn clear_drops_all_entries() {
    let now = Instant::now();
    let mut cache = RoleCache::new(Duration::from_secs(300));
    cache.set(alpha(), Role::Owner, now);
    cache.set(ProjectPath::parse("teams/beta").unwrap(), Role::Guest, now);
    assert_eq!(cache.len(), 2);
    cache.clear();
    assert_eq!(cache.get(&alpha(), now), None);
}
