// crates/tracking-gate-core/src/core/mod.rs
// ============================================================================
// Module: Tracking Gate Core Types
// Description: Roles, identifiers, credentials, and tracking entity views.
// Purpose: Provide stable, serializable types shared by every gate component.
// Dependencies: serde, serde_json, sha2, base64
// ============================================================================

//! ## Overview
//! Core types are pure data: none of them perform I/O or read the clock.
//! Hosts supply timestamps and collaborators through the interfaces module.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod credentials;
pub mod entities;
pub mod identifiers;
pub mod page_token;
pub mod project;
pub mod role;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use credentials::RequestAuth;
pub use entities::EntityTag;
pub use entities::Experiment;
pub use entities::ModelVersion;
pub use entities::Page;
pub use entities::RegisteredModel;
pub use entities::Run;
pub use entities::RunInfo;
pub use entities::SearchQuery;
pub use entities::tag_value;
pub use identifiers::CallerKey;
pub use identifiers::ProjectId;
pub use identifiers::ProjectPath;
pub use page_token::PageToken;
pub use page_token::PageTokenError;
pub use project::ProjectInfo;
pub use project::ProjectScope;
pub use project::display_name_suffix;
pub use project::name_bound_to_project;
pub use project::project_suffix;
pub use project::rename_preserves_suffix;
pub use role::Action;
pub use role::Permission;
pub use role::Role;
pub use role::permission_for;
