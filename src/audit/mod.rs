//! Tamper-evident audit trail: event model, durable JSONL store, SQLite index.

pub mod event;
#[cfg(feature = "sqlite")]
pub mod index;
pub mod trail;

pub use event::{AuditEntry, AuditEvent, AuditFilter, AuditKind, AuditRecord};
pub use trail::{AuditTrail, IntegrityReport};
