// crates/tracking-gate-cli/src/serve_policy.rs
// ============================================================================
// Module: Serve Policy
// Description: Network exposure checks for the proxy launcher.
// Purpose: Keep the proxy on loopback unless an operator opts in.
// Dependencies: tracking-gate-config, thiserror
// ============================================================================

//! ## Overview
//! The proxy forwards caller credentials to the upstream tracking server, so
//! binding it to a routable address is an explicit decision. Loopback binds
//! always pass; anything else requires `--allow-non-loopback` or
//! [`ALLOW_NON_LOOPBACK_ENV`].

use std::env;
use std::net::SocketAddr;

use thiserror::Error;
use tracking_gate_config::GateConfig;

/// Environment variable enabling non-loopback binds.
pub const ALLOW_NON_LOOPBACK_ENV: &str = "TRACKING_GATE_ALLOW_NON_LOOPBACK";

/// Resolved bind decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindOutcome {
    /// Address the proxy will listen on.
    pub bind_addr: SocketAddr,
    /// True when the address is reachable beyond the local host.
    pub network_exposed: bool,
}

/// Serve policy failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServePolicyError {
    /// Opt-in environment variable holds an unrecognized value.
    #[error("TRACKING_GATE_ALLOW_NON_LOOPBACK has invalid value '{value}'")]
    InvalidEnv {
        /// Raw environment value.
        value: String,
    },
    /// Bind string failed to parse.
    #[error("invalid bind address '{bind}': {error}")]
    InvalidBind {
        /// Raw bind value.
        bind: String,
        /// Parse error message.
        error: String,
    },
    /// Non-loopback binding without opt-in.
    #[error(
        "refusing non-loopback bind {bind}; pass --allow-non-loopback or set \
         TRACKING_GATE_ALLOW_NON_LOOPBACK=true"
    )]
    NonLoopbackOptInRequired {
        /// Bind address.
        bind: String,
    },
}

/// Resolves the opt-in from the CLI flag, then the environment.
///
/// # Errors
///
/// Returns [`ServePolicyError::InvalidEnv`] when the environment value is not boolean.
pub fn resolve_allow_non_loopback(flag: bool) -> Result<bool, ServePolicyError> {
    if flag {
        return Ok(true);
    }
    let Some(value) = env::var_os(ALLOW_NON_LOOPBACK_ENV) else {
        return Ok(false);
    };
    parse_allow_non_loopback_value(&value.to_string_lossy())
}

/// Checks the configured bind address against the opt-in.
///
/// # Errors
///
/// Returns [`ServePolicyError`] for unparsable or unapproved non-loopback binds.
pub fn enforce_local_only(
    config: &GateConfig,
    allow_non_loopback: bool,
) -> Result<BindOutcome, ServePolicyError> {
    let bind = config.server.bind.as_str();
    let bind_addr: SocketAddr =
        bind.parse().map_err(|err: std::net::AddrParseError| ServePolicyError::InvalidBind {
            bind: bind.to_string(),
            error: err.to_string(),
        })?;
    if bind_addr.ip().is_loopback() {
        return Ok(BindOutcome {
            bind_addr,
            network_exposed: false,
        });
    }
    if !allow_non_loopback {
        return Err(ServePolicyError::NonLoopbackOptInRequired {
            bind: bind.to_string(),
        });
    }
    Ok(BindOutcome {
        bind_addr,
        network_exposed: true,
    })
}

/// Parses a bool-ish string (true/false/1/0/yes/no/on/off).
fn parse_boolish(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}

/// Parses the opt-in environment value.
fn parse_allow_non_loopback_value(value: &str) -> Result<bool, ServePolicyError> {
    parse_boolish(value).ok_or_else(|| ServePolicyError::InvalidEnv {
        value: value.to_string(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "Test-only assertions use unwrap for clarity.")]
mod tests {
    use tracking_gate_config::AuditConfig;
    use tracking_gate_config::AuthorizationConfig;
    use tracking_gate_config::GateConfig;
    use tracking_gate_config::ProviderConfig;
    use tracking_gate_config::ProviderKind;
    use tracking_gate_config::ServerConfig;

    use super::ServePolicyError;
    use super::enforce_local_only;
    use super::parse_allow_non_loopback_value;

    fn config(bind: &str) -> GateConfig {
        let mut config = GateConfig {
            server: ServerConfig::default(),
            authorization: AuthorizationConfig::default(),
            provider: ProviderConfig {
                kind: ProviderKind::Gitlab,
                base_url: "https://gitlab.example.com".to_string(),
                mandatory_topics: Vec::new(),
                connect_timeout_ms: 2_000,
                request_timeout_ms: 30_000,
                user_agent: "tracking-gate-tests".to_string(),
                max_response_bytes: 1024 * 1024,
            },
            audit: AuditConfig::default(),
        };
        config.server.bind = bind.to_string();
        config
    }

    #[test]
    fn loopback_needs_no_opt_in() {
        let outcome = enforce_local_only(&config("127.0.0.1:8080"), false).unwrap();
        assert!(!outcome.network_exposed);
        let outcome = enforce_local_only(&config("[::1]:8080"), false).unwrap();
        assert!(!outcome.network_exposed);
    }

    #[test]
    fn non_loopback_requires_opt_in() {
        let err = enforce_local_only(&config("0.0.0.0:8080"), false).unwrap_err();
        assert!(matches!(err, ServePolicyError::NonLoopbackOptInRequired { .. }));
        assert!(err.to_string().contains("non-loopback"));
        let outcome = enforce_local_only(&config("0.0.0.0:8080"), true).unwrap();
        assert!(outcome.network_exposed);
    }

    #[test]
    fn unparsable_bind_is_rejected() {
        let err = enforce_local_only(&config("localhost"), true).unwrap_err();
        assert!(matches!(err, ServePolicyError::InvalidBind { .. }));
    }

    #[test]
    fn env_values_are_boolish() {
        assert!(parse_allow_non_loopback_value(" YES ").unwrap());
        assert!(!parse_allow_non_loopback_value("off").unwrap());
        let err = parse_allow_non_loopback_value("maybe").unwrap_err();
        assert!(matches!(err, ServePolicyError::InvalidEnv { .. }));
    }
}
