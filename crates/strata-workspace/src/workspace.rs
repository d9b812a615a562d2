// workspace.rs — The unit-of-work contract.
//
// The object-safe Workspace trait operates on type-erased EntityRecords so
// factories, scopes, and extensions can hold `dyn Workspace`. The blanket
// WorkspaceExt layer restores the typed surface applications use: it
// captures entities into records on the way in and decodes them on the way
// out.
//
// Lifecycle: a workspace is constructed bound to its provider resources with
// extensions attached, moves between clean and dirty as changes accumulate,
// and is disposed by releasing it through the factory that created it.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use strata_changeset::{Entity, EntityKey, EntityRecord, RecordKey};

use crate::error::WorkspaceError;
use crate::extension::WorkspaceExtension;
use crate::query::EntitySet;

/// Identity of one workspace instance, for diagnostics and audit records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkspaceId(Uuid);

impl WorkspaceId {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for WorkspaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Optional provider capability for explicit connection control, used to
/// avoid holding a native connection open across ambient transactions.
/// Providers without a native connection simply never expose one.
pub trait ConnectionManager {
    fn is_connected(&self) -> bool;
    fn disconnect(&mut self) -> Result<(), WorkspaceError>;
    fn reconnect(&mut self) -> Result<(), WorkspaceError>;
}

/// The unit-of-work contract every provider implements.
///
/// A workspace instance is single-threaded: its change set, identity
/// bookkeeping, and extension chain are mutated without internal locking.
/// Open several independent workspaces to simulate concurrent users.
pub trait Workspace: Send {
    fn id(&self) -> WorkspaceId;

    /// Place an entity record into pending-insert state and notify
    /// extensions. Providers with a required entity contract reject
    /// incompatible types with [`WorkspaceError::UnsupportedEntityType`].
    fn add_record(&mut self, record: EntityRecord) -> Result<(), WorkspaceError>;

    /// Mark an entity for property-level reconciliation. Fails with
    /// [`WorkspaceError::NotFound`] when neither the store nor the pending
    /// changes know the entity.
    fn update_record(&mut self, record: EntityRecord) -> Result<(), WorkspaceError>;

    /// Place an entity record into pending-delete state, or cancel its
    /// pending insert.
    fn delete_record(&mut self, record: EntityRecord) -> Result<(), WorkspaceError>;

    /// The tracked instance for an identity if one exists, otherwise the
    /// stored row, otherwise `None`. Absence is not an error.
    fn get_record(&mut self, identity: &RecordKey) -> Result<Option<EntityRecord>, WorkspaceError>;

    /// Overwrite the tracked state of an entity with the values currently
    /// persisted in the backing store. Store wins.
    fn refresh_record(&mut self, identity: &RecordKey) -> Result<EntityRecord, WorkspaceError>;

    /// Bring a record with a known key into identity bookkeeping without
    /// scheduling a write.
    fn attach_record(&mut self, record: EntityRecord) -> Result<(), WorkspaceError>;

    /// Remove a record from identity bookkeeping without scheduling a write.
    fn detach_record(&mut self, record: &EntityRecord) -> Result<(), WorkspaceError>;

    /// Materialize all stored rows of one entity type. Providers with
    /// statement logging report the rendered statement through
    /// `on_pre_query` before executing.
    fn scan_records(&mut self, type_name: &str) -> Result<Vec<EntityRecord>, WorkspaceError>;

    /// Discard all tracked entities and pending changes without persisting.
    fn clean(&mut self);

    /// True iff at least one insert, update, or delete is pending.
    fn is_dirty(&self) -> bool;

    /// Submit the pending generation of changes as one all-or-nothing batch.
    ///
    /// Protocol: compute the three buckets once; run every extension's
    /// `on_submitting_changes` in order, aborting on the first error with
    /// nothing committed; attempt the provider commit; on success clear the
    /// change set; on a concurrency violation notify every extension's
    /// `on_conflict` in order and surface the normalized
    /// [`crate::ConflictError`] with the change set left dirty.
    fn submit_changes(&mut self) -> Result<(), WorkspaceError>;

    /// Append an extension to this workspace's chain.
    fn attach_extension(&mut self, extension: Box<dyn WorkspaceExtension>);

    /// The provider's connection-control capability, when it has one.
    fn connection_manager(&mut self) -> Option<&mut dyn ConnectionManager> {
        None
    }
}

/// Typed convenience layer over any [`Workspace`], including `dyn Workspace`.
pub trait WorkspaceExt: Workspace {
    /// Place an entity into pending-insert state.
    fn add<T: Entity>(&mut self, entity: &T) -> Result<(), WorkspaceError> {
        self.add_record(EntityRecord::capture(entity)?)
    }

    /// Mark an entity for property-level reconciliation.
    fn update<T: Entity>(&mut self, entity: &T) -> Result<(), WorkspaceError> {
        self.update_record(EntityRecord::capture(entity)?)
    }

    /// Place an entity into pending-delete state.
    fn delete<T: Entity>(&mut self, entity: &T) -> Result<(), WorkspaceError> {
        self.delete_record(EntityRecord::capture(entity)?)
    }

    /// The tracked or stored entity with the given key, if any.
    fn get<T: Entity>(&mut self, key: impl Into<EntityKey>) -> Result<Option<T>, WorkspaceError> {
        let identity = RecordKey::new(T::type_name(), key);
        match self.get_record(&identity)? {
            Some(record) => Ok(Some(record.decode()?)),
            None => Ok(None),
        }
    }

    /// Re-read an entity from the backing store, overwriting tracked state.
    fn refresh<T: Entity>(&mut self, entity: &T) -> Result<T, WorkspaceError> {
        let record = self.refresh_record(&RecordKey::of(entity))?;
        Ok(record.decode()?)
    }

    /// Attach an entity without scheduling a write.
    fn attach<T: Entity>(&mut self, entity: &T) -> Result<(), WorkspaceError> {
        self.attach_record(EntityRecord::capture(entity)?)
    }

    /// Detach an entity without scheduling a write.
    fn detach<T: Entity>(&mut self, entity: &T) -> Result<(), WorkspaceError> {
        self.detach_record(&EntityRecord::capture(entity)?)
    }

    /// A fresh queryable context scoped to `T`.
    fn query<T: Entity>(&self) -> EntitySet<T> {
        EntitySet::new()
    }
}

impl<W: Workspace + ?Sized> WorkspaceExt for W {}
