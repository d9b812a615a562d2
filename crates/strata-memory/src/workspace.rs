// workspace.rs — The in-memory unit of work.
//
// A MemoryWorkspace pairs one ChangeSet with one shared MemoryStore and the
// extension chain attached at creation. It remembers the store version of
// every row it has observed (loaded, scanned, attached, or targeted by an
// update); at submit time the store checks those versions, and any mismatch
// becomes a normalized conflict.
//
// Extension dispatch temporarily takes the chain out of the workspace so
// the workspace itself can be handed into each hook. A hook that calls back
// into the workspace therefore runs with an empty chain: nested operations
// do not re-enter the extensions.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use strata_changeset::{ChangeSet, EntityRecord, RecordKey, TrackingState};
use strata_workspace::{
    ConflictError, Extensions, Workspace, WorkspaceError, WorkspaceExtension, WorkspaceFactory,
    WorkspaceId,
};

use crate::store::{CommitError, MemoryStore};

/// Unit of work over a shared [`MemoryStore`].
pub struct MemoryWorkspace {
    id: WorkspaceId,
    store: Arc<MemoryStore>,
    changes: ChangeSet,
    /// Identity bookkeeping populated by explicit attach calls.
    attached: HashMap<RecordKey, EntityRecord>,
    /// Store version of every row this workspace has observed. The
    /// baseline for optimistic concurrency checks at submit time.
    observed: HashMap<RecordKey, u64>,
    extensions: Extensions,
}

impl MemoryWorkspace {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self {
            id: WorkspaceId::new(),
            store,
            changes: ChangeSet::new(),
            attached: HashMap::new(),
            observed: HashMap::new(),
            extensions: Extensions::new(),
        }
    }

    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }

    /// Remember the current store version of a row, unless an earlier
    /// observation already set the baseline.
    fn observe(&mut self, identity: &RecordKey) {
        if let Some(version) = self.store.version_of(identity) {
            self.observed.entry(identity.clone()).or_insert(version);
        }
    }

    fn notify_each<F>(&mut self, f: F)
    where
        F: FnMut(&mut dyn WorkspaceExtension, &mut dyn Workspace),
    {
        let mut extensions = std::mem::take(&mut self.extensions);
        extensions.notify(self, f);
        self.extensions = extensions;
    }

    fn try_notify_each<F>(&mut self, f: F) -> Result<(), WorkspaceError>
    where
        F: FnMut(&mut dyn WorkspaceExtension, &mut dyn Workspace) -> Result<(), WorkspaceError>,
    {
        let mut extensions = std::mem::take(&mut self.extensions);
        let result = extensions.try_notify(self, f);
        self.extensions = extensions;
        result
    }
}

impl Workspace for MemoryWorkspace {
    fn id(&self) -> WorkspaceId {
        self.id
    }

    fn add_record(&mut self, record: EntityRecord) -> Result<(), WorkspaceError> {
        debug!(entity = %record.identity(), "pending insert recorded");
        self.changes.record_insert(record.clone());
        self.notify_each(|ext, ws| ext.on_entity_added(ws, &record));
        Ok(())
    }

    fn update_record(&mut self, record: EntityRecord) -> Result<(), WorkspaceError> {
        let identity = record.identity().clone();
        let pending_insert = self.changes.state_of(&identity) == Some(TrackingState::ADDED);

        if !pending_insert {
            if self.store.version_of(&identity).is_none() {
                let error = WorkspaceError::NotFound {
                    type_name: identity.type_name().to_string(),
                    key: identity.key().clone(),
                };
                self.notify_each(|ext, ws| ext.on_exception(ws, &error));
                return Err(error);
            }
            self.observe(&identity);
        }

        debug!(entity = %identity, "pending update recorded");
        self.changes.record_update(record.clone());
        self.notify_each(|ext, ws| ext.on_entity_updated(ws, &record));
        Ok(())
    }

    fn delete_record(&mut self, record: EntityRecord) -> Result<(), WorkspaceError> {
        let identity = record.identity().clone();
        self.observe(&identity);
        debug!(entity = %identity, "pending delete recorded");
        self.changes.record_delete(record.clone());
        self.notify_each(|ext, ws| ext.on_entity_deleted(ws, &record));
        Ok(())
    }

    fn get_record(&mut self, identity: &RecordKey) -> Result<Option<EntityRecord>, WorkspaceError> {
        // In-flight version first: pending insert or update snapshots.
        if let Some(pending) = self.changes.pending_snapshot(identity) {
            return Ok(Some(pending.clone()));
        }
        if let Some(attached) = self.attached.get(identity) {
            return Ok(Some(attached.clone()));
        }

        let rendered = format!(
            "get {} where key = '{}'",
            identity.type_name(),
            identity.key()
        );
        self.notify_each(|ext, ws| ext.on_pre_query(ws, &rendered));

        match self.store.load(identity) {
            Some((record, version)) => {
                self.observed.entry(identity.clone()).or_insert(version);
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    fn refresh_record(&mut self, identity: &RecordKey) -> Result<EntityRecord, WorkspaceError> {
        let (record, version) = match self.store.load(identity) {
            Some(found) => found,
            None => {
                return Err(WorkspaceError::NotFound {
                    type_name: identity.type_name().to_string(),
                    key: identity.key().clone(),
                })
            }
        };

        // Store wins: reset the concurrency baseline and drop any local
        // pending modification of this entity.
        self.observed.insert(identity.clone(), version);
        self.changes.discard_updates(identity);
        if let Some(slot) = self.attached.get_mut(identity) {
            *slot = record.clone();
        }

        self.notify_each(|ext, ws| ext.on_entity_refreshed(ws, &record));
        Ok(record)
    }

    fn attach_record(&mut self, record: EntityRecord) -> Result<(), WorkspaceError> {
        let identity = record.identity().clone();
        self.observe(&identity);
        self.attached.insert(identity, record.clone());
        self.notify_each(|ext, ws| ext.on_entity_attached(ws, &record));
        Ok(())
    }

    fn detach_record(&mut self, record: &EntityRecord) -> Result<(), WorkspaceError> {
        self.attached.remove(record.identity());
        self.observed.remove(record.identity());
        self.notify_each(|ext, ws| ext.on_entity_detached(ws, record));
        Ok(())
    }

    fn scan_records(&mut self, type_name: &str) -> Result<Vec<EntityRecord>, WorkspaceError> {
        let rendered = format!("scan {type_name}");
        self.notify_each(|ext, ws| ext.on_pre_query(ws, &rendered));

        let rows = self.store.scan(type_name);
        for (record, version) in &rows {
            self.observed
                .entry(record.identity().clone())
                .or_insert(*version);
        }
        Ok(rows.into_iter().map(|(record, _)| record).collect())
    }

    fn clean(&mut self) {
        debug!("cache cleaned; pending changes discarded");
        self.changes.clear();
        self.attached.clear();
        self.observed.clear();
        self.notify_each(|ext, ws| ext.on_cache_cleaned(ws));
    }

    fn is_dirty(&self) -> bool {
        !self.changes.is_empty()
    }

    fn submit_changes(&mut self) -> Result<(), WorkspaceError> {
        // The three buckets are computed exactly once; every extension sees
        // these same sequences even if a hook mutates the change set.
        let deleted = self.changes.entities_with_state(TrackingState::DELETED);
        let added = self.changes.entities_with_state(TrackingState::ADDED);
        let modified = self.changes.entities_with_state(TrackingState::MODIFIED);
        debug!(
            deleted = deleted.len(),
            added = added.len(),
            modified = modified.len(),
            "submitting changes"
        );

        self.try_notify_each(|ext, ws| ext.on_submitting_changes(ws, &deleted, &added, &modified))?;

        match self.store.commit(&deleted, &added, &modified, &self.observed) {
            Ok(new_versions) => {
                self.changes.clear();
                for (identity, version) in new_versions {
                    self.observed.insert(identity, version);
                }
                for record in &deleted {
                    self.observed.remove(record.identity());
                    self.attached.remove(record.identity());
                }
                Ok(())
            }
            Err(CommitError::Conflict(conflicts)) => {
                let conflict = ConflictError::new(conflicts);
                warn!(%conflict, "commit rejected by concurrency check");
                // An error from the hook propagates and masks the conflict.
                self.try_notify_each(|ext, ws| ext.on_conflict(ws, &conflict))?;
                Err(WorkspaceError::Conflict(conflict))
            }
            Err(CommitError::Store(error)) => {
                let error = WorkspaceError::provider(error);
                self.notify_each(|ext, ws| ext.on_exception(ws, &error));
                Err(error)
            }
        }
    }

    fn attach_extension(&mut self, extension: Box<dyn WorkspaceExtension>) {
        self.extensions.attach(extension);
    }
}

/// Creates [`MemoryWorkspace`]s bound to one shared store.
#[derive(Debug)]
pub struct MemoryWorkspaceFactory {
    store: Arc<MemoryStore>,
}

impl MemoryWorkspaceFactory {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> Arc<MemoryStore> {
        self.store.clone()
    }
}

impl WorkspaceFactory for MemoryWorkspaceFactory {
    fn create(&self) -> Result<Box<dyn Workspace>, WorkspaceError> {
        Ok(Box::new(MemoryWorkspace::new(self.store.clone())))
    }

    fn release(&self, workspace: Box<dyn Workspace>) {
        debug!(workspace = %workspace.id(), "memory workspace released");
        drop(workspace);
    }
}
