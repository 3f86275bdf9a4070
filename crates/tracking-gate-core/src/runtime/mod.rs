// crates/tracking-gate-core/src/runtime/mod.rs
// ============================================================================
// Module: Tracking Gate Runtime
// Description: Role cache, permission resolution, and in-memory collaborators.
// Purpose: Turn caller credentials and entity tags into permission decisions.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! Runtime helpers are synchronous and take the current instant as an
//! argument so expiry is deterministic under test.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod cache;
pub mod memory;
pub mod permissions;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use cache::CachedRoleEntry;
pub use cache::RoleCache;
pub use memory::InMemoryProjectDirectory;
pub use memory::InMemoryTrackingStore;
pub use permissions::PermissionResolver;
