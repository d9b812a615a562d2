//! # strata-audit
//!
//! Audit trail for Strata workspaces.
//!
//! [`AuditExtension`] observes submits and writes one [`AuditRecord`] per
//! pending entity through a pluggable [`AuditSink`]. For modified entities
//! it computes property-level before/after diffs, re-fetching the pristine
//! version through the registry's default factory so the submitting
//! workspace's tracked state is never disturbed.
//!
//! Sinks: [`JsonlAuditSink`] appends one JSON object per line and flushes
//! after every record; [`MemoryAuditSink`] collects records for tests.

pub mod diff;
pub mod error;
pub mod extension;
pub mod record;
pub mod sink;

pub use diff::{diff_properties, PropertyChange};
pub use error::AuditError;
pub use extension::AuditExtension;
pub use record::{AuditAction, AuditRecord};
pub use sink::{AuditSink, JsonlAuditSink, MemoryAuditSink};
