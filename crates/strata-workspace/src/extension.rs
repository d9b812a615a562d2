// extension.rs — Lifecycle hooks observed by workspace extensions.
//
// Extensions are created fresh for every workspace by the registry and owned
// by the workspace they observe. Ownership is the binding: an extension
// cannot receive a hook before the workspace holding it exists, and stops
// receiving hooks when the workspace is released. The owning workspace is
// handed into every hook as an explicit context argument.
//
// Invocation order is attachment order, which the registry derives from
// registration order. The order is stable for the lifetime of the process.

use tracing::debug;

use strata_changeset::EntityRecord;

use crate::conflict::ConflictError;
use crate::error::WorkspaceError;
use crate::workspace::Workspace;

/// Observer of one workspace's lifecycle.
///
/// Every hook has a no-op default, so an extension implements only the
/// transitions it cares about. All hooks run synchronously on the thread
/// driving the workspace.
#[allow(unused_variables)]
pub trait WorkspaceExtension: Send {
    /// A short name for diagnostics.
    fn name(&self) -> &str {
        "extension"
    }

    /// An entity entered pending-insert state. Side effect only; validation
    /// belongs in [`Self::on_submitting_changes`].
    ///
    /// Whether store-generated keys are already assigned at this point is
    /// provider-specific; no cross-provider guarantee exists.
    fn on_entity_added(&mut self, workspace: &mut dyn Workspace, entity: &EntityRecord) {}

    /// An entity entered pending-delete state (including a delete that
    /// cancelled a pending insert).
    fn on_entity_deleted(&mut self, workspace: &mut dyn Workspace, entity: &EntityRecord) {}

    /// An entity entered pending-update state via an explicit update call.
    /// Never fired by mere property mutation.
    fn on_entity_updated(&mut self, workspace: &mut dyn Workspace, entity: &EntityRecord) {}

    /// An entity's in-memory state was overwritten from the backing store.
    fn on_entity_refreshed(&mut self, workspace: &mut dyn Workspace, entity: &EntityRecord) {}

    /// An entity was brought into the workspace's identity bookkeeping
    /// without scheduling a write.
    fn on_entity_attached(&mut self, workspace: &mut dyn Workspace, entity: &EntityRecord) {}

    /// An entity was removed from the workspace's identity bookkeeping.
    fn on_entity_detached(&mut self, workspace: &mut dyn Workspace, entity: &EntityRecord) {}

    /// The workspace discarded all tracked entities and pending changes.
    fn on_cache_cleaned(&mut self, workspace: &mut dyn Workspace) {}

    /// Fired once per extension, in attachment order, before the provider
    /// commit is attempted. All three buckets are computed exactly once per
    /// submit and every extension sees the same sequences, even if an
    /// earlier extension mutated the change set as a side effect.
    ///
    /// Returning an error aborts the submit: extensions later in the order
    /// are not invoked, the commit is not attempted, and the error reaches
    /// the caller unmodified.
    fn on_submitting_changes(
        &mut self,
        workspace: &mut dyn Workspace,
        deleted: &[EntityRecord],
        added: &[EntityRecord],
        modified: &[EntityRecord],
    ) -> Result<(), WorkspaceError> {
        Ok(())
    }

    /// The provider signalled a concurrency conflict during commit. Fired on
    /// every extension, in order, before the normalized conflict reaches the
    /// caller.
    ///
    /// An error returned here propagates immediately and masks the conflict
    /// (first-thrown-wins). Preserved from the reference behavior; see
    /// DESIGN.md before relying on it.
    fn on_conflict(
        &mut self,
        workspace: &mut dyn Workspace,
        conflict: &ConflictError,
    ) -> Result<(), WorkspaceError> {
        Ok(())
    }

    /// A provider-level failure other than a conflict occurred. Not
    /// guaranteed exhaustive across providers.
    fn on_exception(&mut self, workspace: &mut dyn Workspace, error: &WorkspaceError) {}

    /// A provider with statement logging is about to execute a query.
    fn on_pre_query(&mut self, workspace: &mut dyn Workspace, query_text: &str) {}
}

/// The ordered extension chain owned by one workspace.
///
/// Providers temporarily `std::mem::take` this container while dispatching
/// so the workspace itself can be passed into each hook, then restore it.
#[derive(Default)]
pub struct Extensions {
    items: Vec<Box<dyn WorkspaceExtension>>,
}

impl Extensions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an extension. Invocation order is attachment order.
    pub fn attach(&mut self, extension: Box<dyn WorkspaceExtension>) {
        debug!(extension = extension.name(), "extension attached");
        self.items.push(extension);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Invoke `f` for every extension in order.
    pub fn notify<F>(&mut self, workspace: &mut dyn Workspace, mut f: F)
    where
        F: FnMut(&mut dyn WorkspaceExtension, &mut dyn Workspace),
    {
        for extension in &mut self.items {
            f(extension.as_mut(), workspace);
        }
    }

    /// Invoke `f` for every extension in order, stopping at the first error.
    /// Extensions after the failing one are not invoked.
    pub fn try_notify<F>(
        &mut self,
        workspace: &mut dyn Workspace,
        mut f: F,
    ) -> Result<(), WorkspaceError>
    where
        F: FnMut(&mut dyn WorkspaceExtension, &mut dyn Workspace) -> Result<(), WorkspaceError>,
    {
        for extension in &mut self.items {
            f(extension.as_mut(), workspace)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for Extensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Extensions")
            .field("count", &self.items.len())
            .finish()
    }
}
