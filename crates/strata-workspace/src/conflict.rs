// conflict.rs — Normalized optimistic-concurrency conflict reporting.
//
// Providers each signal write-write conflicts in their own way. The
// workspace normalizes them all into one ConflictError carrying the ordered
// set of entities that lost the race, so callers and extensions reconcile
// against a single stable shape regardless of the backing store.

use thiserror::Error;

use strata_changeset::EntityRecord;

/// One entity involved in an optimistic-concurrency violation.
///
/// `object` is the submitting workspace's in-flight version, not the version
/// that won the race; `type_name` is the entity's declared type tag.
#[derive(Debug, Clone)]
pub struct ConflictedObject {
    pub object: EntityRecord,
    pub type_name: String,
}

impl ConflictedObject {
    pub fn new(object: EntityRecord) -> Self {
        let type_name = object.type_name().to_string();
        Self { object, type_name }
    }
}

/// The normalized conflict raised when a provider rejects a commit because
/// another workspace committed first.
///
/// The submitting workspace's change set is left dirty: nothing from the
/// batch was applied, and the caller may reconcile and resubmit.
#[derive(Debug, Clone, Error)]
#[error("optimistic concurrency conflict affecting {} entity(ies): {}", .conflicts.len(), describe(.conflicts))]
pub struct ConflictError {
    conflicts: Vec<ConflictedObject>,
}

impl ConflictError {
    pub fn new(conflicts: Vec<ConflictedObject>) -> Self {
        Self { conflicts }
    }

    /// The conflicted entities, in the order the provider reported them.
    pub fn conflicts(&self) -> &[ConflictedObject] {
        &self.conflicts
    }
}

fn describe(conflicts: &[ConflictedObject]) -> String {
    conflicts
        .iter()
        .map(|c| c.object.identity().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
