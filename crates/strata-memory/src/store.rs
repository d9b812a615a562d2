// store.rs — Versioned in-memory document store.
//
// Rows are JSON snapshots keyed by (entity type, key), each carrying a
// monotonically increasing version. The version is the whole optimistic
// concurrency mechanism: a commit is valid only if every row it updates or
// deletes still has the version the submitting workspace observed when it
// loaded the row.
//
// The store is shared between workspaces by Arc; the interior RwLock makes
// independent workspaces on different threads safe. Commit validation and
// application happen under one write lock, so a batch is atomic: either
// every row is applied or none is.

use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

use strata_changeset::{EntityRecord, RecordKey};
use strata_workspace::ConflictedObject;

/// Native failures of the in-memory provider. Surface untranslated, like
/// any other provider-transport error.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("a row for {identity} already exists")]
    DuplicateKey { identity: RecordKey },
}

/// Outcome of a rejected commit, before normalization by the workspace.
#[derive(Debug)]
pub(crate) enum CommitError {
    /// One or more rows were changed or removed since the workspace
    /// observed them.
    Conflict(Vec<ConflictedObject>),
    /// A native store failure; not a concurrency matter.
    Store(StoreError),
}

#[derive(Debug, Clone)]
struct StoredRow {
    snapshot: Value,
    version: u64,
}

/// The shared backing store of the in-memory provider.
#[derive(Default, Debug)]
pub struct MemoryStore {
    rows: RwLock<HashMap<RecordKey, StoredRow>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The stored row and its current version, if present.
    pub fn load(&self, identity: &RecordKey) -> Option<(EntityRecord, u64)> {
        let rows = self.rows.read();
        rows.get(identity).map(|row| {
            (
                EntityRecord::from_parts(identity.clone(), row.snapshot.clone()),
                row.version,
            )
        })
    }

    /// Current version of a row, if present.
    pub fn version_of(&self, identity: &RecordKey) -> Option<u64> {
        self.rows.read().get(identity).map(|row| row.version)
    }

    /// All rows of one entity type with their versions, ordered by key for
    /// deterministic enumeration.
    pub fn scan(&self, type_name: &str) -> Vec<(EntityRecord, u64)> {
        let rows = self.rows.read();
        let mut out: Vec<(EntityRecord, u64)> = rows
            .iter()
            .filter(|(identity, _)| identity.type_name() == type_name)
            .map(|(identity, row)| {
                (
                    EntityRecord::from_parts(identity.clone(), row.snapshot.clone()),
                    row.version,
                )
            })
            .collect();
        out.sort_by(|(a, _), (b, _)| a.key().as_str().cmp(b.key().as_str()));
        out
    }

    pub fn row_count(&self) -> usize {
        self.rows.read().len()
    }

    /// Apply one change batch atomically.
    ///
    /// Validation order: deletes, then updates, against the versions the
    /// workspace observed. Every stale or vanished row contributes one
    /// conflicted object; a single conflict rejects the whole batch with
    /// nothing applied. Inserting over an existing key is a native store
    /// error, not a conflict.
    ///
    /// Returns the new version of every row the batch wrote.
    pub(crate) fn commit(
        &self,
        deleted: &[EntityRecord],
        added: &[EntityRecord],
        modified: &[EntityRecord],
        observed: &HashMap<RecordKey, u64>,
    ) -> Result<HashMap<RecordKey, u64>, CommitError> {
        let mut rows = self.rows.write();

        // The updates bucket may carry the same identity more than once;
        // the last snapshot recorded wins.
        let mut final_updates: Vec<(RecordKey, &EntityRecord)> = Vec::new();
        for record in modified {
            let identity = record.identity().clone();
            match final_updates.iter_mut().find(|(id, _)| id == &identity) {
                Some((_, slot)) => *slot = record,
                None => final_updates.push((identity, record)),
            }
        }

        let mut conflicts: Vec<ConflictedObject> = Vec::new();

        for record in deleted {
            match rows.get(record.identity()) {
                None => conflicts.push(ConflictedObject::new(record.clone())),
                Some(row) => {
                    if let Some(expected) = observed.get(record.identity()) {
                        if *expected != row.version {
                            conflicts.push(ConflictedObject::new(record.clone()));
                        }
                    }
                }
            }
        }

        for (identity, record) in &final_updates {
            match rows.get(identity) {
                None => conflicts.push(ConflictedObject::new((*record).clone())),
                Some(row) => {
                    if let Some(expected) = observed.get(identity) {
                        if *expected != row.version {
                            conflicts.push(ConflictedObject::new((*record).clone()));
                        }
                    }
                }
            }
        }

        if !conflicts.is_empty() {
            return Err(CommitError::Conflict(conflicts));
        }

        for record in added {
            if rows.contains_key(record.identity()) {
                return Err(CommitError::Store(StoreError::DuplicateKey {
                    identity: record.identity().clone(),
                }));
            }
        }

        // Validated; apply.
        let mut new_versions = HashMap::new();

        for record in deleted {
            rows.remove(record.identity());
        }
        for (identity, record) in final_updates {
            // A row deleted by the same batch stays deleted.
            if let Some(row) = rows.get_mut(&identity) {
                row.snapshot = record.snapshot().clone();
                row.version += 1;
                new_versions.insert(identity, row.version);
            }
        }
        for record in added {
            rows.insert(
                record.identity().clone(),
                StoredRow {
                    snapshot: record.snapshot().clone(),
                    version: 1,
                },
            );
            new_versions.insert(record.identity().clone(), 1);
        }

        Ok(new_versions)
    }
}
