// query.rs — Lazy, composable query surface over one entity type.
//
// An EntitySet accumulates filters, an ordering, and include directives
// without touching the provider. Nothing executes until `load`, and every
// `load` re-reads the provider snapshot: results are not cached between
// enumerations.

use std::cmp::Ordering;
use std::marker::PhantomData;

use strata_changeset::{Entity, Navigation};

use crate::error::WorkspaceError;
use crate::workspace::{Workspace, WorkspaceExt};

/// A composable query over the persisted collection of entities of type `T`.
///
/// Also exposes the table-level mutation operations, which feed the owning
/// workspace's change set exactly like the workspace-level calls.
pub struct EntitySet<T: Entity> {
    filters: Vec<Box<dyn Fn(&T) -> bool>>,
    order: Option<Box<dyn Fn(&T, &T) -> Ordering>>,
    includes: Vec<String>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Entity> std::fmt::Debug for EntitySet<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntitySet")
            .field("filters", &self.filters.len())
            .field("order", &self.order.is_some())
            .field("includes", &self.includes)
            .finish()
    }
}

impl<T: Entity> Default for EntitySet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Entity> EntitySet<T> {
    pub fn new() -> Self {
        Self {
            filters: Vec::new(),
            order: None,
            includes: Vec::new(),
            _marker: PhantomData,
        }
    }

    /// Restrict the result to entities matching `predicate`. Composable;
    /// not executed until [`Self::load`].
    pub fn filter(mut self, predicate: impl Fn(&T) -> bool + 'static) -> Self {
        self.filters.push(Box::new(predicate));
        self
    }

    /// Order the result by the given key. The last ordering wins.
    pub fn order_by<K: Ord>(mut self, key: impl Fn(&T) -> K + 'static) -> Self {
        self.order = Some(Box::new(move |a, b| key(a).cmp(&key(b))));
        self
    }

    /// Declare eager loading of the association named by a dot-separated
    /// navigation path.
    ///
    /// The path is validated segment by segment against `T`'s navigation
    /// metadata; an unknown segment is a programmer error. For providers
    /// without deferred loading the validated directive is a no-op, and
    /// repeating it is harmless.
    pub fn include(mut self, path: &str) -> Result<Self, WorkspaceError> {
        validate_include_path::<T>(path)?;
        self.includes.push(path.to_string());
        Ok(self)
    }

    /// The include directives recorded so far, for providers that honor them.
    pub fn includes(&self) -> &[String] {
        &self.includes
    }

    /// Execute the query against the workspace's backing store.
    ///
    /// Each call re-executes: the provider snapshot is taken afresh, then
    /// filters and ordering apply in memory on the decoded entities.
    pub fn load(&self, workspace: &mut dyn Workspace) -> Result<Vec<T>, WorkspaceError> {
        let records = workspace.scan_records(T::type_name())?;

        let mut entities = Vec::with_capacity(records.len());
        for record in records {
            let entity: T = record.decode()?;
            if self.filters.iter().all(|f| f(&entity)) {
                entities.push(entity);
            }
        }

        if let Some(order) = &self.order {
            entities.sort_by(|a, b| order(a, b));
        }

        Ok(entities)
    }

    /// The first matching entity, if any.
    pub fn first(&self, workspace: &mut dyn Workspace) -> Result<Option<T>, WorkspaceError> {
        Ok(self.load(workspace)?.into_iter().next())
    }

    // Table-level mutations feed the owning workspace's change set.

    pub fn insert(&self, workspace: &mut dyn Workspace, entity: &T) -> Result<(), WorkspaceError> {
        workspace.add(entity)
    }

    pub fn update(&self, workspace: &mut dyn Workspace, entity: &T) -> Result<(), WorkspaceError> {
        workspace.update(entity)
    }

    pub fn delete(&self, workspace: &mut dyn Workspace, entity: &T) -> Result<(), WorkspaceError> {
        workspace.delete(entity)
    }

    pub fn attach(&self, workspace: &mut dyn Workspace, entity: &T) -> Result<(), WorkspaceError> {
        workspace.attach(entity)
    }
}

/// Walk a dot-separated include path through navigation metadata, failing on
/// the first segment that does not name a navigation property.
pub fn validate_include_path<T: Entity>(path: &str) -> Result<(), WorkspaceError> {
    let mut level: &[Navigation] = T::navigations();

    for segment in path.split('.') {
        if segment.is_empty() {
            return Err(WorkspaceError::InvalidInclude {
                path: path.to_string(),
                segment: segment.to_string(),
            });
        }
        match level.iter().find(|nav| nav.name == segment) {
            Some(nav) => level = (nav.nested)(),
            None => {
                return Err(WorkspaceError::InvalidInclude {
                    path: path.to_string(),
                    segment: segment.to_string(),
                })
            }
        }
    }

    Ok(())
}
