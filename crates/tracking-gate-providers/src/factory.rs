// crates/tracking-gate-providers/src/factory.rs
// ============================================================================
// Module: Provider Factory
// Description: Builds the configured project authorization backend.
// Purpose: Select exactly one backend per deployment from configuration.
// Dependencies: tracking-gate-config, tracking-gate-core
// ============================================================================

//! ## Overview
//! The factory turns validated configuration into collaborator instances. The
//! project authorization backend is chosen once at startup; callers only ever
//! see the [`ProjectAuthorizationClient`] contract.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use tracking_gate_config::ProviderConfig;
use tracking_gate_config::ProviderKind;
use tracking_gate_core::ProjectAuthorizationClient;
use tracking_gate_core::ProjectClientError;
use tracking_gate_core::StoreError;

use crate::CatalogProjectClient;
use crate::GitlabProjectClient;
use crate::HttpClientSettings;
use crate::RestTrackingStore;

// ============================================================================
// SECTION: Builders
// ============================================================================

/// Returns outbound client settings for the configured provider.
#[must_use]
pub fn provider_settings(config: &ProviderConfig) -> HttpClientSettings {
    let mut settings = HttpClientSettings::new(config.base_url.clone());
    settings.connect_timeout = config.connect_timeout();
    settings.request_timeout = config.request_timeout();
    settings.max_response_bytes = config.max_response_bytes;
    settings.user_agent.clone_from(&config.user_agent);
    settings
}

/// Builds the project authorization client selected by `config.kind`.
///
/// # Errors
///
/// Returns [`ProjectClientError::InvalidRequest`] when the client cannot be built.
pub fn project_client_from_config(
    config: &ProviderConfig,
) -> Result<Arc<dyn ProjectAuthorizationClient>, ProjectClientError> {
    let settings = provider_settings(config);
    let topics = config.mandatory_topics.clone();
    let client: Arc<dyn ProjectAuthorizationClient> = match config.kind {
        ProviderKind::Gitlab => Arc::new(GitlabProjectClient::new(&settings, topics)?),
        ProviderKind::Catalog => Arc::new(CatalogProjectClient::new(&settings, topics)?),
    };
    Ok(client)
}

/// Builds the REST tracking store for the upstream server at `upstream_url`.
///
/// Store calls reuse the provider timeouts; upstream search pages can be
/// large, so the response bound is `max_response_bytes`.
///
/// # Errors
///
/// Returns [`StoreError::Invalid`] when the client cannot be built.
pub fn tracking_store_from_config(
    upstream_url: &str,
    provider: &ProviderConfig,
    max_response_bytes: usize,
) -> Result<RestTrackingStore, StoreError> {
    let mut settings = provider_settings(provider);
    settings.base_url = upstream_url.to_string();
    settings.max_response_bytes = max_response_bytes;
    RestTrackingStore::new(&settings)
}
