// crates/tracking-gate-providers/src/lib.rs
// ============================================================================
// Module: Tracking Gate Providers
// Description: HTTP-backed project authorization clients and tracking store.
// Purpose: Implement the core collaborator traits against real services.
// Dependencies: tracking-gate-config, tracking-gate-core, reqwest, serde_json
// ============================================================================

//! ## Overview
//! This crate provides the two interchangeable project authorization
//! backends (Git-hosting project API, catalog access check) and a REST client
//! implementing [`tracking_gate_core::TrackingStore`] against the upstream
//! tracking server. All clients are blocking, refuse redirects, and bound the
//! size of every response they read.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod catalog;
pub mod factory;
pub mod gitlab;
pub mod http;
pub mod rest_store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use catalog::CatalogProjectClient;
pub use factory::project_client_from_config;
pub use factory::provider_settings;
pub use factory::tracking_store_from_config;
pub use gitlab::GitlabProjectClient;
pub use http::HttpClientSettings;
pub use rest_store::RestTrackingStore;
