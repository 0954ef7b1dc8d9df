//! Security audit events.
//!
//! The core reports security-relevant events (today: authorization
//! denials) to an external sink, fire-and-forget. Persistence is the host
//! service's concern.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use uuid::Uuid;

/// Audit event types emitted by the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventKind {
    PermissionDenied,
}

/// Security audit event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: Uuid,
    pub kind: AuditEventKind,
    pub actor_id: Option<Uuid>,
    /// Structured context: required/actual permission sets, request path,
    /// method. Never raw secrets or codes.
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(kind: AuditEventKind, actor_id: Option<Uuid>, metadata: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            actor_id,
            metadata,
            created_at: Utc::now(),
        }
    }
}

/// Fire-and-forget audit sink contract.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: AuditEvent);
}

/// Sink that emits audit events as structured warnings.
#[derive(Default)]
pub struct TracingAuditSink;

impl TracingAuditSink {
    pub fn new() -> Self {
        Self
    }
}

impl AuditSink for TracingAuditSink {
    fn record(&self, event: AuditEvent) {
        tracing::warn!(
            event_id = %event.id,
            kind = ?event.kind,
            actor_id = ?event.actor_id,
            metadata = %event.metadata,
            "Security event"
        );
    }
}

/// Sink that captures events for assertions in tests.
#[derive(Default)]
pub struct RecordingAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl RecordingAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl AuditSink for RecordingAuditSink {
    fn record(&self, event: AuditEvent) {
        self.events.lock().unwrap().push(event);
    }
}
