// record.rs — Audit record data model.
//
// One record per entity per submit: what changed, on which entity, through
// which workspace, when. Records serialize with serde so any sink can
// persist them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use strata_workspace::WorkspaceId;

use crate::diff::PropertyChange;

/// Which pending-change bucket the audited entity came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Added,
    Modified,
    Deleted,
}

/// One line in the audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Unique identifier for this record.
    pub record_id: Uuid,

    /// When the submit that produced this record ran (UTC).
    pub timestamp: DateTime<Utc>,

    /// The workspace whose submit produced this record.
    pub workspace_id: WorkspaceId,

    /// Declared type of the audited entity.
    pub entity_type: String,

    /// Key of the audited entity.
    pub entity_key: String,

    pub action: AuditAction,

    /// Property-level changes: after-only for inserts, before-only for
    /// deletes, both sides for modifications.
    pub changes: Vec<PropertyChange>,
}

impl AuditRecord {
    pub fn new(
        workspace_id: WorkspaceId,
        entity_type: impl Into<String>,
        entity_key: impl Into<String>,
        action: AuditAction,
    ) -> Self {
        Self {
            record_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            workspace_id,
            entity_type: entity_type.into(),
            entity_key: entity_key.into(),
            action,
            changes: Vec::new(),
        }
    }

    /// Set the property changes and return self.
    pub fn with_changes(mut self, changes: Vec<PropertyChange>) -> Self {
        self.changes = changes;
        self
    }
}
