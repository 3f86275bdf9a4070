// crates/tracking-gate-core/tests/proptest_roles.rs
// ============================================================================
// Module: Role Property-Based Tests
// Description: Property tests for the role -> permission mapping.
// Purpose: Check monotonicity and fail-closed decoding across all inputs.
// ============================================================================

//! Property-based tests for role and permission invariants.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use proptest::prelude::*;
use tracking_gate_core::Action;
use tracking_gate_core::Role;
use tracking_gate_core::permission_for;

fn role_strategy() -> impl Strategy<Value = Role> {
    prop::sample::select(Role::ALL.to_vec())
}

const ACTIONS: [Action; 4] = [Action::Create, Action::Read, Action::Update, Action::Delete];

proptest! {
    #[test]
    fn higher_roles_never_lose_capabilities(low in role_strategy(), high in role_strategy()) {
        prop_assume!(low <= high);
        let low_permission = permission_for(low);
        let high_permission = permission_for(high);
        prop_assert!(low_permission.priority <= high_permission.priority);
        for action in ACTIONS {
            if low_permission.allows(action) {
                prop_assert!(high_permission.allows(action), "{high} lost {}", action.label());
            }
        }
    }

    #[test]
    fn unknown_access_levels_grant_nothing(level in any::<i64>()) {
        let known = Role::ALL.iter().any(|role| i64::from(role.access_level()) == level);
        prop_assume!(!known);
        let role = Role::from_access_level(level);
        prop_assert_eq!(role, Role::NoAccess);
        prop_assert_eq!(permission_for(role), permission_for(Role::NoAccess));
    }
}

#[test]
fn role_table_matches_capabilities() {
    assert!(!Role::Minimal.permission().can_read);
    assert!(Role::Guest.permission().can_read);
    assert!(!Role::Reporter.permission().can_update);
    let developer = Role::Developer.permission();
    assert!(developer.can_create && developer.can_update && !developer.can_delete);
    assert!(Role::Maintainer.permission().can_delete);
    assert_eq!(Role::Owner.permission().priority, 60);
}
