// changeset.rs — The three pending-change buckets of one workspace.
//
// A ChangeSet belongs exclusively to a single workspace and is mutated from
// one thread, so it carries no locking. The invariant it maintains: an
// entity identity appears in at most one bucket at a time. Duplicates are
// allowed within the updates bucket only.

use tracing::debug;

use crate::record::{EntityRecord, RecordKey};
use crate::tracking::TrackingState;

/// Pending inserts, updates, and deletes awaiting `submit_changes`.
#[derive(Debug, Default)]
pub struct ChangeSet {
    inserts: Vec<EntityRecord>,
    updates: Vec<EntityRecord>,
    deletes: Vec<EntityRecord>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a pending insert.
    ///
    /// No-op if the same entity identity is already pending insert.
    pub fn record_insert(&mut self, record: EntityRecord) {
        if self.contains(&self.inserts, record.identity()) {
            return;
        }
        self.inserts.push(record);
    }

    /// Record a pending delete.
    ///
    /// Deleting an entity that is only pending insert cancels the insert
    /// instead: the entity never existed in the store, so the net effect of
    /// the pair is nothing.
    pub fn record_delete(&mut self, record: EntityRecord) {
        if self.contains(&self.inserts, record.identity()) {
            let identity = record.identity().clone();
            self.inserts.retain(|r| r.identity() != &identity);
            debug!(entity = %identity, "pending insert cancelled by delete");
            return;
        }
        // An entity cannot be both pending update and pending delete.
        let identity = record.identity().clone();
        self.updates.retain(|r| r.identity() != &identity);
        if !self.contains(&self.deletes, &identity) {
            self.deletes.push(record);
        }
    }

    /// Record a pending update.
    ///
    /// An entity that is pending insert stays in the inserts bucket; the
    /// insert snapshot is refreshed instead. An entity pending delete is
    /// left alone. Duplicate updates for the same identity are allowed;
    /// consumers must tolerate re-notification.
    pub fn record_update(&mut self, record: EntityRecord) {
        let identity = record.identity().clone();
        if let Some(position) = self
            .inserts
            .iter()
            .position(|r| r.identity() == &identity)
        {
            self.inserts[position] = record;
            return;
        }
        if self.contains(&self.deletes, &identity) {
            return;
        }
        self.updates.push(record);
    }

    /// Records in the buckets selected by `mask`, concatenated in
    /// Deleted, Added, Modified order.
    pub fn entities_with_state(&self, mask: TrackingState) -> Vec<EntityRecord> {
        let mut out = Vec::new();
        if mask.contains(TrackingState::DELETED) {
            out.extend(self.deletes.iter().cloned());
        }
        if mask.contains(TrackingState::ADDED) {
            out.extend(self.inserts.iter().cloned());
        }
        if mask.contains(TrackingState::MODIFIED) {
            out.extend(self.updates.iter().cloned());
        }
        out
    }

    /// The tracking state of one entity identity, if it is pending at all.
    pub fn state_of(&self, identity: &RecordKey) -> Option<TrackingState> {
        if self.contains(&self.inserts, identity) {
            Some(TrackingState::ADDED)
        } else if self.contains(&self.deletes, identity) {
            Some(TrackingState::DELETED)
        } else if self.contains(&self.updates, identity) {
            Some(TrackingState::MODIFIED)
        } else {
            None
        }
    }

    /// Latest pending snapshot for an identity, preferring inserts, then
    /// updates. Deletes carry no useful snapshot for readers.
    pub fn pending_snapshot(&self, identity: &RecordKey) -> Option<&EntityRecord> {
        self.inserts
            .iter()
            .find(|r| r.identity() == identity)
            .or_else(|| self.updates.iter().rev().find(|r| r.identity() == identity))
    }

    /// Drop pending updates for one identity. Used by providers
    /// implementing store-wins refresh semantics.
    pub fn discard_updates(&mut self, identity: &RecordKey) {
        self.updates.retain(|r| r.identity() != identity);
    }

    pub fn inserts(&self) -> &[EntityRecord] {
        &self.inserts
    }

    pub fn updates(&self) -> &[EntityRecord] {
        &self.updates
    }

    pub fn deletes(&self) -> &[EntityRecord] {
        &self.deletes
    }

    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty() && self.updates.is_empty() && self.deletes.is_empty()
    }

    /// Empty all three buckets. Called after a successful commit and on an
    /// explicit cache clean.
    pub fn clear(&mut self) {
        self.inserts.clear();
        self.updates.clear();
        self.deletes.clear();
    }

    fn contains(&self, bucket: &[EntityRecord], identity: &RecordKey) -> bool {
        bucket.iter().any(|r| r.identity() == identity)
    }
}
