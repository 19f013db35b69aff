//! Audit event types and emission functions.

use crate::core::{Document, DocumentId, Verdict};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Tracing target shared by every audit event.
pub const AUDIT_TARGET: &str = "scangate::audit";

/// Lifecycle events recorded in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    /// A new pending document was stored.
    DocumentCreated,
    /// A new document inherited the verdict of a byte-identical one.
    VerdictPropagated,
    /// A scan produced a verdict that was persisted.
    VerdictRecorded,
    /// Payload bytes were removed after their verdict was persisted.
    BytesReleased,
    /// Every scan attempt failed; the document stays pending.
    ScanAbandoned,
    /// A verdict was obtained but could not be persisted.
    VerdictLost,
    /// The retention sweeper removed expired documents.
    PurgeCompleted,
}

impl AuditEventType {
    /// Returns the `event_type` field value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DocumentCreated => "document_created",
            Self::VerdictPropagated => "verdict_propagated",
            Self::VerdictRecorded => "verdict_recorded",
            Self::BytesReleased => "bytes_released",
            Self::ScanAbandoned => "scan_abandoned",
            Self::VerdictLost => "verdict_lost",
            Self::PurgeCompleted => "purge_completed",
        }
    }
}

impl fmt::Display for AuditEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Emits an audit event for a new pending document.
pub fn emit_document_created(document: &Document, size: u64) {
    tracing::info!(
        target: AUDIT_TARGET,
        event_type = %AuditEventType::DocumentCreated,
        document_id = %document.id,
        hash = %document.hash,
        tag = %document.tag,
        size = size,
        "Document created"
    );
}

/// Emits an audit event for a document created with an inherited verdict.
pub fn emit_verdict_propagated(document: &Document, source: &DocumentId) {
    tracing::info!(
        target: AUDIT_TARGET,
        event_type = %AuditEventType::VerdictPropagated,
        document_id = %document.id,
        source_id = %source,
        hash = %document.hash,
        status = %document.status,
        "Verdict propagated from identical content"
    );
}

/// Emits an audit event for a persisted scan verdict.
pub fn emit_verdict_recorded(id: &DocumentId, verdict: &Verdict, engine: &str, attempt: usize) {
    tracing::info!(
        target: AUDIT_TARGET,
        event_type = %AuditEventType::VerdictRecorded,
        document_id = %id,
        status = %verdict.status(),
        threat = ?verdict.threat(),
        engine = %engine,
        attempt = attempt,
        "Verdict recorded"
    );
}

/// Emits an audit event once pending bytes are gone.
pub fn emit_bytes_released(id: &DocumentId) {
    tracing::info!(
        target: AUDIT_TARGET,
        event_type = %AuditEventType::BytesReleased,
        document_id = %id,
        "Payload bytes released"
    );
}

/// Emits an audit event for a scan that exhausted its attempts.
pub fn emit_scan_abandoned(id: &DocumentId, attempts: usize, last_error: &str) {
    tracing::error!(
        target: AUDIT_TARGET,
        event_type = %AuditEventType::ScanAbandoned,
        document_id = %id,
        attempts = attempts,
        error = %last_error,
        "Scan abandoned; document stays pending"
    );
}

/// Emits an audit event for a verdict that could not be persisted.
pub fn emit_verdict_lost(id: &DocumentId, verdict: &Verdict, error: &dyn std::error::Error) {
    tracing::error!(
        target: AUDIT_TARGET,
        event_type = %AuditEventType::VerdictLost,
        document_id = %id,
        status = %verdict.status(),
        error = %error,
        "Verdict could not be recorded; document stays pending"
    );
}

/// Emits an audit event for a retention sweep.
pub fn emit_purge_completed(removed: u64, cutoff: DateTime<Utc>) {
    tracing::info!(
        target: AUDIT_TARGET,
        event_type = %AuditEventType::PurgeCompleted,
        removed = removed,
        cutoff = %cutoff.to_rfc3339(),
        "Expired documents purged"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_names() {
        assert_eq!(AuditEventType::ScanAbandoned.as_str(), "scan_abandoned");
        assert_eq!(
            serde_json::to_value(AuditEventType::VerdictPropagated).unwrap(),
            "verdict_propagated"
        );
        assert_eq!(AuditEventType::PurgeCompleted.to_string(), "purge_completed");
    }
}
