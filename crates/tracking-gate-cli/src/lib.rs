// crates/tracking-gate-cli/src/lib.rs
// ============================================================================
// Module: Tracking Gate CLI Library
// Description: Shared helpers for the tracking-gate command-line interface.
// Purpose: Expose launch policy checks to the binary and its tests.
// Dependencies: tracking-gate-config
// ============================================================================

//! ## Overview
//! Houses the serve policy used by `tracking-gate serve` before the proxy
//! binds its listener.

// ============================================================================
// SECTION: Modules
// ============================================================================

/// Bind exposure checks for the proxy launcher.
pub mod serve_policy;
