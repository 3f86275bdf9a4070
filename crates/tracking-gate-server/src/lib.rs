// crates/tracking-gate-server/src/lib.rs
// ============================================================================
// Module: Tracking Gate Server
// Description: Authorization gate, visibility filter, and reverse proxy.
// Purpose: Enforce project-scoped access in front of a tracking server.
// Dependencies: tracking-gate-core, tracking-gate-config, tracking-gate-providers, axum
// ============================================================================

//! ## Overview
//! This crate wires the core authorization model into an HTTP front door.
//! Every inbound request is classified by the [`routes::RouteTable`], checked
//! by the [`gate::AuthorizationGate`], forwarded to the upstream tracking
//! server, and post-processed by the [`filter::VisibilityFilter`] or the
//! [`initializer::ProjectTagInitializer`].
//! Security posture: request inputs and upstream responses are untrusted; the
//! gate fails closed on every provider or store error.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod filter;
pub mod gate;
pub mod initializer;
pub mod request;
pub mod responses;
pub mod routes;
pub mod server;
pub mod session;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::AuditSink;
pub use audit::FileAuditSink;
pub use audit::NoopAuditSink;
pub use audit::StderrAuditSink;
pub use filter::FilterError;
pub use filter::FilterReport;
pub use filter::FilteredResponse;
pub use filter::VisibilityFilter;
pub use gate::AuthorizationGate;
pub use gate::GateError;
pub use gate::GateOutcome;
pub use gate::GateRequest;
pub use gate::GateVerdict;
pub use initializer::InitializerError;
pub use initializer::ProjectTagInitializer;
pub use initializer::TaggedEntity;
pub use request::ParamError;
pub use request::RequestParams;
pub use routes::OperationKind;
pub use routes::PathError;
pub use routes::Predicate;
pub use routes::RouteTable;
pub use routes::SearchKind;
pub use server::Collaborators;
pub use server::ServerError;
pub use server::TrackingGateServer;
pub use server::audit_sink_from_config;
pub use session::SessionError;
pub use session::SessionRegistry;
