// extension.rs — The audit workspace extension.
//
// Built by composition: the extension implements the full hook surface and
// funnels every record through one pluggable AuditSink. Records are written
// from on_submitting_changes, so the audit trail describes exactly the
// batch the provider was asked to commit.
//
// Pristine state for modification diffs is re-fetched through a workspace
// obtained from the registry's default factory, never through the active
// workspace: diffing must not disturb the tracked state of the workspace
// that is mid-submit. Write through the current workspace, read originals
// through the factory.

use std::sync::Arc;
use tracing::debug;

use strata_changeset::EntityRecord;
use strata_workspace::{
    Workspace, WorkspaceError, WorkspaceExtension, WorkspaceRegistry,
};

use crate::diff::{added_properties, diff_properties, removed_properties};
use crate::record::{AuditAction, AuditRecord};
use crate::sink::AuditSink;

/// Workspace extension that writes one audit record per pending entity on
/// every submit.
///
/// A sink failure aborts the submit like any other extension error: no
/// audit trail, no commit.
pub struct AuditExtension {
    registry: Arc<WorkspaceRegistry>,
    sink: Box<dyn AuditSink>,
}

impl AuditExtension {
    pub fn new(registry: Arc<WorkspaceRegistry>, sink: Box<dyn AuditSink>) -> Self {
        Self { registry, sink }
    }

    fn write(&mut self, record: AuditRecord) -> Result<(), WorkspaceError> {
        self.sink.write(&record).map_err(WorkspaceError::extension)
    }
}

impl WorkspaceExtension for AuditExtension {
    fn name(&self) -> &str {
        "audit"
    }

    fn on_submitting_changes(
        &mut self,
        workspace: &mut dyn Workspace,
        deleted: &[EntityRecord],
        added: &[EntityRecord],
        modified: &[EntityRecord],
    ) -> Result<(), WorkspaceError> {
        let workspace_id = workspace.id();
        debug!(
            %workspace_id,
            deleted = deleted.len(),
            added = added.len(),
            modified = modified.len(),
            "writing audit trail for submit"
        );

        for record in deleted {
            let audit = AuditRecord::new(
                workspace_id,
                record.type_name(),
                record.key().as_str(),
                AuditAction::Deleted,
            )
            .with_changes(removed_properties(record.snapshot()));
            self.write(audit)?;
        }

        for record in added {
            let audit = AuditRecord::new(
                workspace_id,
                record.type_name(),
                record.key().as_str(),
                AuditAction::Added,
            )
            .with_changes(added_properties(record.snapshot()));
            self.write(audit)?;
        }

        if !modified.is_empty() {
            let factory = self.registry.default_factory()?;
            let mut pristine = factory.create()?;

            for record in modified {
                let before = pristine.get_record(record.identity())?;
                let changes = match &before {
                    Some(original) => diff_properties(original.snapshot(), record.snapshot()),
                    // No pristine counterpart (e.g. modified while pending
                    // insert elsewhere); report after-values only.
                    None => added_properties(record.snapshot()),
                };
                let audit = AuditRecord::new(
                    workspace_id,
                    record.type_name(),
                    record.key().as_str(),
                    AuditAction::Modified,
                )
                .with_changes(changes);
                self.write(audit)?;
            }

            factory.release(pristine);
        }

        Ok(())
    }
}
