// crates/tracking-gate-core/src/lib.rs
// ============================================================================
// Module: Tracking Gate Core Library
// Description: Public API surface for the Tracking Gate core.
// Purpose: Expose role types, collaborator interfaces, and runtime helpers.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! Tracking Gate core holds the transport-independent half of a multi-tenant
//! authorization layer for an experiment-tracking server: the role model, the
//! per-caller role cache, and the resolver that turns a project tag into a
//! permission. Network backends and the HTTP surface live in sibling crates
//! and plug in through [`ProjectAuthorizationClient`] and [`TrackingStore`].

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use crate::core::*;

pub use interfaces::ProjectAuthorizationClient;
pub use interfaces::ProjectClientError;
pub use interfaces::StoreError;
pub use interfaces::TrackingStore;
pub use runtime::CachedRoleEntry;
pub use runtime::InMemoryProjectDirectory;
pub use runtime::InMemoryTrackingStore;
pub use runtime::PermissionResolver;
pub use runtime::RoleCache;
