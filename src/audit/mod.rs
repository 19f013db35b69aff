//! Structured audit logging of document lifecycle events.
//!
//! Every function here emits one `tracing` event under the
//! `scangate::audit` target with an `event_type` field, so a subscriber
//! can route the audit trail separately from diagnostics.

mod events;

pub use events::{
    emit_bytes_released, emit_document_created, emit_purge_completed, emit_scan_abandoned,
    emit_verdict_lost, emit_verdict_propagated, emit_verdict_recorded, AuditEventType,
    AUDIT_TARGET,
};
