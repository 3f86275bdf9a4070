// crates/tracking-gate-config/src/lib.rs
// ============================================================================
// Module: Tracking Gate Config Library
// Description: Canonical config model and validation.
// Purpose: Single source of truth for tracking-gate.toml semantics.
// Dependencies: serde, toml, url
// ============================================================================

//! ## Overview
//! `tracking-gate-config` defines the configuration model for the tracking
//! gate: proxy settings, authorization tuning, the project authorization
//! provider, and audit output. Validation is strict and fails closed.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
