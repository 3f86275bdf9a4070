// crates/tracking-gate-config/tests/common/mod.rs
// =============================================================================
// Module: Config Test Helpers
// Description: Shared helpers for config validation tests.
// Purpose: Reduce duplication across integration tests for tracking-gate-config.
// =============================================================================

#![allow(dead_code, reason = "Test helpers are selectively used across suites.")]

use tracking_gate_config::GateConfig;

/// Minimal valid GitLab-backed configuration.
pub const GITLAB_TOML: &str = r#"
[provider]
type = "gitlab"
base_url = "https://gitlab.example.com"
"#;

/// Minimal valid catalog-backed configuration.
pub const CATALOG_TOML: &str = r#"
[provider]
type = "catalog"
base_url = "https://hub.example.com"
mandatory_topics = ["ai-model"]
"#;

/// Parses a TOML string into a `GateConfig` for tests.
pub fn config_from_toml(toml_str: &str) -> Result<GateConfig, toml::de::Error> {
    toml::from_str(toml_str)
}

/// Returns a minimal config with all defaults applied.
pub fn minimal_config() -> Result<GateConfig, toml::de::Error> {
    config_from_toml(GITLAB_TOML)
}
