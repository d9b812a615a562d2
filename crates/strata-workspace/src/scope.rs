// scope.rs — Ambient nesting of logical units of work.
//
// A scope is a frame on a thread-local stack of shared workspace handles.
// Nested code that asks for `Required` joins the workspace of the enclosing
// scope; `RequiresNew` isolates itself with a fresh one. The stack being
// thread-local is deliberate: it prevents accidental cross-thread sharing of
// an ambient workspace, which the workspace contract forbids.
//
// Scopes must close in strict LIFO order. A scope dropped without an
// explicit close performs best-effort cleanup and logs instead of
// panicking, since Drop cannot report errors.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::WorkspaceError;
use crate::registry::{RegistryError, WorkspaceRegistry};
use crate::workspace::Workspace;

/// How a scope acquires its workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeOption {
    /// Reuse the enclosing scope's workspace; create one only at the
    /// outermost level.
    Required,
    /// Always create a fresh workspace, regardless of enclosing scopes.
    RequiresNew,
}

/// A workspace handle shared between nested scopes on one thread.
pub type SharedWorkspace = Rc<RefCell<Box<dyn Workspace>>>;

thread_local! {
    static SCOPE_STACK: RefCell<Vec<SharedWorkspace>> = RefCell::new(Vec::new());
}

/// Scope lifecycle errors.
#[derive(Debug, Error)]
pub enum ScopeError {
    /// Scopes were closed out of LIFO order. The offending scope stays
    /// open; close the inner scopes first.
    #[error("workspace scopes must be closed in LIFO order")]
    OutOfOrderDisposal,

    #[error(transparent)]
    Workspace(#[from] WorkspaceError),
}

impl From<RegistryError> for ScopeError {
    fn from(error: RegistryError) -> Self {
        Self::Workspace(error.into())
    }
}

/// One frame of the ambient unit-of-work stack.
pub struct WorkspaceScope {
    registry: Arc<WorkspaceRegistry>,
    workspace: Option<SharedWorkspace>,
    closed: bool,
}

impl WorkspaceScope {
    /// Open a scope, acquiring a workspace per `option` and pushing it onto
    /// this thread's scope stack.
    pub fn enter(
        registry: Arc<WorkspaceRegistry>,
        option: ScopeOption,
    ) -> Result<Self, ScopeError> {
        let workspace = match option {
            ScopeOption::Required => {
                let enclosing = SCOPE_STACK.with(|stack| stack.borrow().last().cloned());
                match enclosing {
                    Some(shared) => shared,
                    None => Rc::new(RefCell::new(registry.create_workspace()?)),
                }
            }
            ScopeOption::RequiresNew => Rc::new(RefCell::new(registry.create_workspace()?)),
        };

        SCOPE_STACK.with(|stack| stack.borrow_mut().push(workspace.clone()));
        debug!(?option, "workspace scope entered");

        Ok(Self {
            registry,
            workspace: Some(workspace),
            closed: false,
        })
    }

    /// The workspace this scope shares. `None` once the scope is closed.
    pub fn current(&self) -> Option<SharedWorkspace> {
        self.workspace.clone()
    }

    /// Close the scope: pop this thread's stack and, when no enclosing
    /// frame still shares the workspace, release it back to the factory.
    ///
    /// Closing out of LIFO order is a programmer error: the call fails, the
    /// stack is left intact, and the consumed scope's frame stays on the
    /// stack until the thread ends.
    pub fn close(mut self) -> Result<(), ScopeError> {
        let result = self.close_inner();
        if result.is_err() {
            // The scope is consumed; suppress the Drop retry.
            self.closed = true;
        }
        result
    }

    fn close_inner(&mut self) -> Result<(), ScopeError> {
        if self.closed {
            return Ok(());
        }
        let own = match self.workspace.take() {
            Some(workspace) => workspace,
            None => return Ok(()),
        };

        let popped = SCOPE_STACK.with(|stack| stack.borrow_mut().pop());
        let popped = match popped {
            Some(frame) => frame,
            None => {
                self.closed = true;
                return Err(ScopeError::OutOfOrderDisposal);
            }
        };

        if !Rc::ptr_eq(&popped, &own) {
            // Not our frame on top. Put the stack back and refuse.
            SCOPE_STACK.with(|stack| stack.borrow_mut().push(popped));
            self.workspace = Some(own);
            return Err(ScopeError::OutOfOrderDisposal);
        }

        self.closed = true;

        let still_shared =
            SCOPE_STACK.with(|stack| stack.borrow().iter().any(|frame| Rc::ptr_eq(frame, &popped)));
        drop(own);

        if still_shared {
            debug!("workspace scope closed; workspace remains with enclosing scope");
            return Ok(());
        }

        match Rc::try_unwrap(popped) {
            Ok(cell) => {
                self.registry.release_workspace(cell.into_inner())?;
            }
            Err(_) => {
                // A caller still holds a handle obtained from `current`;
                // releasing now would pull the workspace out from under it.
                debug!("workspace handle still held outside the scope stack; release skipped");
            }
        }
        Ok(())
    }
}

impl Drop for WorkspaceScope {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(error) = self.close_inner() {
                warn!(%error, "workspace scope dropped without an orderly close");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::WorkspaceFactory;
    use crate::workspace::{WorkspaceExt, WorkspaceId};
    use crate::WorkspaceExtension;
    use serde::{Deserialize, Serialize};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use strata_changeset::{ChangeSet, Entity, EntityKey, EntityRecord, RecordKey};

    #[derive(Debug, Serialize, Deserialize)]
    struct Doc {
        id: i64,
    }

    impl Entity for Doc {
        fn key(&self) -> EntityKey {
            self.id.into()
        }
    }

    /// Minimal provider for scope tests: tracks changes, commits nowhere.
    struct StubWorkspace {
        id: WorkspaceId,
        changes: ChangeSet,
    }

    impl StubWorkspace {
        fn new() -> Self {
            Self {
                id: WorkspaceId::new(),
                changes: ChangeSet::new(),
            }
        }
    }

    impl Workspace for StubWorkspace {
        fn id(&self) -> WorkspaceId {
            self.id
        }

        fn add_record(&mut self, record: EntityRecord) -> Result<(), WorkspaceError> {
            self.changes.record_insert(record);
            Ok(())
        }

        fn update_record(&mut self, record: EntityRecord) -> Result<(), WorkspaceError> {
            self.changes.record_update(record);
            Ok(())
        }

        fn delete_record(&mut self, record: EntityRecord) -> Result<(), WorkspaceError> {
            self.changes.record_delete(record);
            Ok(())
        }

        fn get_record(
            &mut self,
            _identity: &RecordKey,
        ) -> Result<Option<EntityRecord>, WorkspaceError> {
            Ok(None)
        }

        fn refresh_record(&mut self, identity: &RecordKey) -> Result<EntityRecord, WorkspaceError> {
            Err(WorkspaceError::NotFound {
                type_name: identity.type_name().to_string(),
                key: identity.key().clone(),
            })
        }

        fn attach_record(&mut self, _record: EntityRecord) -> Result<(), WorkspaceError> {
            Ok(())
        }

        fn detach_record(&mut self, _record: &EntityRecord) -> Result<(), WorkspaceError> {
            Ok(())
        }

        fn scan_records(&mut self, _type_name: &str) -> Result<Vec<EntityRecord>, WorkspaceError> {
            Ok(Vec::new())
        }

        fn clean(&mut self) {
            self.changes.clear();
        }

        fn is_dirty(&self) -> bool {
            !self.changes.is_empty()
        }

        fn submit_changes(&mut self) -> Result<(), WorkspaceError> {
            self.changes.clear();
            Ok(())
        }

        fn attach_extension(&mut self, _extension: Box<dyn WorkspaceExtension>) {}
    }

    #[derive(Default, Debug)]
    struct CountingFactory {
        created: AtomicUsize,
        released: AtomicUsize,
    }

    impl WorkspaceFactory for CountingFactory {
        fn create(&self) -> Result<Box<dyn Workspace>, WorkspaceError> {
            self.created.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(StubWorkspace::new()))
        }

        fn release(&self, _workspace: Box<dyn Workspace>) {
            self.released.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn registry_with_factory() -> (Arc<WorkspaceRegistry>, Arc<CountingFactory>) {
        let registry = Arc::new(WorkspaceRegistry::new());
        let factory = Arc::new(CountingFactory::default());
        registry.register_default_factory(factory.clone()).unwrap();
        (registry, factory)
    }

    #[test]
    fn required_inside_requires_new_shares_the_workspace() {
        let (registry, factory) = registry_with_factory();

        let outer = WorkspaceScope::enter(registry.clone(), ScopeOption::RequiresNew).unwrap();
        let inner = WorkspaceScope::enter(registry.clone(), ScopeOption::Required).unwrap();

        assert!(Rc::ptr_eq(
            &outer.current().unwrap(),
            &inner.current().unwrap()
        ));
        assert_eq!(factory.created.load(Ordering::SeqCst), 1);

        inner.close().unwrap();
        assert_eq!(factory.released.load(Ordering::SeqCst), 0);

        outer.close().unwrap();
        assert_eq!(factory.released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn nested_requires_new_isolates_workspaces() {
        let (registry, factory) = registry_with_factory();

        let outer = WorkspaceScope::enter(registry.clone(), ScopeOption::RequiresNew).unwrap();
        let outer_ws = outer.current().unwrap();
        let inner = WorkspaceScope::enter(registry.clone(), ScopeOption::RequiresNew).unwrap();
        let inner_ws = inner.current().unwrap();

        assert!(!Rc::ptr_eq(&outer_ws, &inner_ws));
        assert_eq!(factory.created.load(Ordering::SeqCst), 2);

        drop(inner_ws);
        inner.close().unwrap();
        // The outer workspace is untouched by the inner close; its release
        // is observed only when the outer scope itself closes.
        drop(outer_ws);
        let before_outer_close = factory.released.load(Ordering::SeqCst);
        outer.close().unwrap();
        assert_eq!(
            factory.released.load(Ordering::SeqCst),
            before_outer_close + 1
        );
    }

    #[test]
    fn required_at_the_outermost_level_creates_a_workspace() {
        let (registry, factory) = registry_with_factory();

        let scope = WorkspaceScope::enter(registry, ScopeOption::Required).unwrap();
        assert_eq!(factory.created.load(Ordering::SeqCst), 1);
        scope.close().unwrap();
        assert_eq!(factory.released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn out_of_order_close_is_rejected() {
        let (registry, _factory) = registry_with_factory();

        let outer = WorkspaceScope::enter(registry.clone(), ScopeOption::RequiresNew).unwrap();
        let inner = WorkspaceScope::enter(registry.clone(), ScopeOption::RequiresNew).unwrap();

        let err = outer.close().unwrap_err();
        assert!(matches!(err, ScopeError::OutOfOrderDisposal));

        // Orderly teardown still works afterwards.
        inner.close().unwrap();
    }

    #[test]
    fn scoped_workspace_is_usable_through_the_handle() {
        let (registry, _factory) = registry_with_factory();

        let scope = WorkspaceScope::enter(registry, ScopeOption::RequiresNew).unwrap();
        let shared = scope.current().unwrap();
        {
            let mut ws = shared.borrow_mut();
            ws.add(&Doc { id: 1 }).unwrap();
            assert!(ws.is_dirty());
            ws.submit_changes().unwrap();
            assert!(!ws.is_dirty());
        }
        drop(shared);
        scope.close().unwrap();
    }
}
