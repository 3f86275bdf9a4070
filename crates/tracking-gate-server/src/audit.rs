// crates/tracking-gate-server/src/audit.rs
// ============================================================================
// Module: Gate Audit Logging
// Description: Structured audit events for gate, filter, and initializer activity.
// Purpose: Emit redacted JSON-line audit logs without hard dependencies.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! This module defines audit event payloads and sinks for authorization
//! decisions. Events never carry credentials; callers are identified by the
//! credential fingerprint only. Hidden-entity counts from the visibility
//! filter appear here and nowhere in client responses.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Gate decision audit event.
#[derive(Debug, Clone, Serialize)]
pub struct GateAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// HTTP method.
    pub method: String,
    /// Routed path.
    pub route: String,
    /// Operation label when the route is known.
    pub operation: Option<&'static str>,
    /// Project scope label.
    pub scope: String,
    /// Caller fingerprint when authenticated.
    pub caller: Option<String>,
    /// Decision label.
    pub outcome: &'static str,
    /// Reason label.
    pub reason: &'static str,
}

/// Visibility filter audit event.
#[derive(Debug, Clone, Serialize)]
pub struct FilterAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Operation label.
    pub operation: &'static str,
    /// Project scope label.
    pub scope: String,
    /// Caller fingerprint.
    pub caller: Option<String>,
    /// Entities returned.
    pub returned: usize,
    /// Entities withheld.
    pub hidden: usize,
    /// Refetch calls issued.
    pub backfill_requests: u32,
    /// True when no continuation token was returned.
    pub exhausted: bool,
    /// Error label when filtering failed.
    pub error: Option<String>,
}

/// Project-tag initializer audit event.
#[derive(Debug, Clone, Serialize)]
pub struct InitializerAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Operation label.
    pub operation: &'static str,
    /// Project scope label.
    pub scope: String,
    /// Outcome label.
    pub outcome: &'static str,
    /// Error text on failure.
    pub error: Option<String>,
}

/// Inputs required to construct a gate audit event.
pub struct GateAuditEventParams {
    /// HTTP method.
    pub method: String,
    /// Routed path.
    pub route: String,
    /// Operation label when the route is known.
    pub operation: Option<&'static str>,
    /// Project scope label.
    pub scope: String,
    /// Caller fingerprint when authenticated.
    pub caller: Option<String>,
    /// Decision label.
    pub outcome: &'static str,
    /// Reason label.
    pub reason: &'static str,
}

/// Inputs required to construct a filter audit event.
pub struct FilterAuditEventParams {
    /// Operation label.
    pub operation: &'static str,
    /// Project scope label.
    pub scope: String,
    /// Caller fingerprint.
    pub caller: Option<String>,
    /// Entities returned.
    pub returned: usize,
    /// Entities withheld.
    pub hidden: usize,
    /// Refetch calls issued.
    pub backfill_requests: u32,
    /// True when no continuation token was returned.
    pub exhausted: bool,
    /// Error label when filtering failed.
    pub error: Option<String>,
}

/// Returns the current time in milliseconds since the epoch.
fn now_ms() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis()
}

impl GateAuditEvent {
    /// Creates a new gate audit event with a consistent timestamp.
    #[must_use]
    pub fn new(params: GateAuditEventParams) -> Self {
        Self {
            event: "gate_decision",
            timestamp_ms: now_ms(),
            method: params.method,
            route: params.route,
            operation: params.operation,
            scope: params.scope,
            caller: params.caller,
            outcome: params.outcome,
            reason: params.reason,
        }
    }
}

impl FilterAuditEvent {
    /// Creates a new filter audit event with a consistent timestamp.
    #[must_use]
    pub fn new(params: FilterAuditEventParams) -> Self {
        Self {
            event: "visibility_filter",
            timestamp_ms: now_ms(),
            operation: params.operation,
            scope: params.scope,
            caller: params.caller,
            returned: params.returned,
            hidden: params.hidden,
            backfill_requests: params.backfill_requests,
            exhausted: params.exhausted,
            error: params.error,
        }
    }
}

impl InitializerAuditEvent {
    /// Creates a new initializer audit event with a consistent timestamp.
    #[must_use]
    pub fn new(
        operation: &'static str,
        scope: String,
        outcome: &'static str,
        error: Option<String>,
    ) -> Self {
        Self {
            event: "project_tag_initializer",
            timestamp_ms: now_ms(),
            operation,
            scope,
            outcome,
            error,
        }
    }
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Audit sink for authorization events.
pub trait AuditSink: Send + Sync {
    /// Record a gate decision.
    fn record_gate(&self, event: &GateAuditEvent);

    /// Record a visibility filter pass.
    fn record_filter(&self, _event: &FilterAuditEvent) {}

    /// Record a project-tag initializer run.
    fn record_initializer(&self, _event: &InitializerAuditEvent) {}
}

/// Writes one JSON line for `event` to `writer`.
fn write_line<W: Write, E: Serialize>(writer: &mut W, event: &E) {
    if let Ok(payload) = serde_json::to_string(event) {
        let _ = writeln!(writer, "{payload}");
        let _ = writer.flush();
    }
}

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

impl AuditSink for StderrAuditSink {
    fn record_gate(&self, event: &GateAuditEvent) {
        write_line(&mut io::stderr(), event);
    }

    fn record_filter(&self, event: &FilterAuditEvent) {
        write_line(&mut io::stderr(), event);
    }

    fn record_initializer(&self, event: &InitializerAuditEvent) {
        write_line(&mut io::stderr(), event);
    }
}

/// Audit sink that logs JSON lines to a file.
pub struct FileAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    /// Appends one event while holding the file lock.
    fn append<E: Serialize>(&self, event: &E) {
        if let Ok(mut file) = self.file.lock() {
            write_line(&mut *file, event);
        }
    }
}

impl AuditSink for FileAuditSink {
    fn record_gate(&self, event: &GateAuditEvent) {
        self.append(event);
    }

    fn record_filter(&self, event: &FilterAuditEvent) {
        self.append(event);
    }

    fn record_initializer(&self, event: &InitializerAuditEvent) {
        self.append(event);
    }
}

/// No-op audit sink.
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn record_gate(&self, _event: &GateAuditEvent) {}
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "Test-only assertions use unwrap for clarity.")]
mod tests {
    use super::*;

    #[test]
    fn file_sink_appends_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.log");
        let sink = FileAuditSink::new(&path).unwrap();
        sink.record_gate(&GateAuditEvent::new(GateAuditEventParams {
            method: "POST".to_string(),
            route: "/api/2.0/mlflow/runs/delete".to_string(),
            operation: Some("delete_run"),
            scope: "teams/alpha".to_string(),
            caller: Some("abc".to_string()),
            outcome: "forbidden",
            reason: "denied",
        }));
        sink.record_initializer(&InitializerAuditEvent::new(
            "create_experiment",
            "teams/alpha".to_string(),
            "tagged",
            None,
        ));
        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> =
            contents.lines().map(|line| serde_json::from_str(line).unwrap()).collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["event"], "gate_decision");
        assert_eq!(lines[0]["outcome"], "forbidden");
        assert_eq!(lines[1]["event"], "project_tag_initializer");
    }
}
