// Integration tests for the in-memory provider: the full workspace
// protocol exercised end to end, including the extension pipeline, the
// optimistic-concurrency conflict path, and ambient scopes.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::rc::Rc;
use std::sync::Arc;

use strata_changeset::{Entity, EntityKey, EntityRecord, Navigation, RecordKey};
use strata_memory::{MemoryStore, MemoryWorkspace, MemoryWorkspaceFactory};
use strata_workspace::{
    ConflictError, ScopeOption, ValidationError, ValidationResult, Workspace, WorkspaceError,
    WorkspaceExt, WorkspaceExtension, WorkspaceRegistry, WorkspaceScope,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Product {
    id: i64,
    name: String,
    price: i64,
}

impl Entity for Product {
    fn key(&self) -> EntityKey {
        self.id.into()
    }
}

fn product(id: i64, name: &str, price: i64) -> Product {
    Product {
        id,
        name: name.into(),
        price,
    }
}

/// Shared event log for observing extension invocations across the chain.
#[derive(Clone, Default)]
struct Recorder {
    events: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    fn push(&self, event: impl Into<String>) {
        self.events.lock().push(event.into());
    }

    fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }
}

/// Test extension that records every hook it sees, optionally failing the
/// submit or the conflict notification.
struct RecordingExtension {
    label: &'static str,
    recorder: Recorder,
    veto_submit: bool,
    fail_on_conflict: bool,
}

impl RecordingExtension {
    fn new(label: &'static str, recorder: Recorder) -> Self {
        Self {
            label,
            recorder,
            veto_submit: false,
            fail_on_conflict: false,
        }
    }

    fn vetoing(label: &'static str, recorder: Recorder) -> Self {
        Self {
            veto_submit: true,
            ..Self::new(label, recorder)
        }
    }

    fn failing_on_conflict(label: &'static str, recorder: Recorder) -> Self {
        Self {
            fail_on_conflict: true,
            ..Self::new(label, recorder)
        }
    }

    fn bucket_keys(records: &[EntityRecord]) -> String {
        records
            .iter()
            .map(|r| r.key().as_str().to_string())
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl WorkspaceExtension for RecordingExtension {
    fn name(&self) -> &str {
        self.label
    }

    fn on_entity_added(&mut self, _workspace: &mut dyn Workspace, entity: &EntityRecord) {
        self.recorder.push(format!("{}:added:{}", self.label, entity.key()));
    }

    fn on_entity_deleted(&mut self, _workspace: &mut dyn Workspace, entity: &EntityRecord) {
        self.recorder
            .push(format!("{}:deleted:{}", self.label, entity.key()));
    }

    fn on_entity_updated(&mut self, _workspace: &mut dyn Workspace, entity: &EntityRecord) {
        self.recorder
            .push(format!("{}:updated:{}", self.label, entity.key()));
    }

    fn on_cache_cleaned(&mut self, _workspace: &mut dyn Workspace) {
        self.recorder.push(format!("{}:cleaned", self.label));
    }

    fn on_submitting_changes(
        &mut self,
        _workspace: &mut dyn Workspace,
        deleted: &[EntityRecord],
        added: &[EntityRecord],
        modified: &[EntityRecord],
    ) -> Result<(), WorkspaceError> {
        self.recorder.push(format!(
            "{}:submitting:d[{}]a[{}]m[{}]",
            self.label,
            Self::bucket_keys(deleted),
            Self::bucket_keys(added),
            Self::bucket_keys(modified),
        ));
        if self.veto_submit {
            let target = added
                .first()
                .or(modified.first())
                .or(deleted.first())
                .map(|r| r.identity().clone())
                .unwrap_or_else(|| RecordKey::new("unknown", "?"));
            return Err(ValidationError::single(ValidationResult::error(
                target,
                "price",
                "rejected by test policy",
            ))
            .into());
        }
        Ok(())
    }

    fn on_conflict(
        &mut self,
        _workspace: &mut dyn Workspace,
        conflict: &ConflictError,
    ) -> Result<(), WorkspaceError> {
        self.recorder.push(format!(
            "{}:conflict:{}",
            self.label,
            conflict.conflicts().len()
        ));
        if self.fail_on_conflict {
            return Err(WorkspaceError::extension(std::io::Error::other(
                "conflict hook failure",
            )));
        }
        Ok(())
    }

    fn on_pre_query(&mut self, _workspace: &mut dyn Workspace, query_text: &str) {
        self.recorder
            .push(format!("{}:query:{}", self.label, query_text));
    }
}

fn workspace_with_extensions(
    store: Arc<MemoryStore>,
    extensions: Vec<Box<dyn WorkspaceExtension>>,
) -> MemoryWorkspace {
    let mut ws = MemoryWorkspace::new(store);
    for extension in extensions {
        ws.attach_extension(extension);
    }
    ws
}

// ── Bucket exclusivity ───────────────────────────────────────────

#[test]
fn delete_after_add_is_a_net_no_op_on_commit() {
    let store = Arc::new(MemoryStore::new());
    let mut ws = MemoryWorkspace::new(store.clone());

    let p = product(1, "anvil", 100);
    ws.add(&p).unwrap();
    ws.delete(&p).unwrap();

    assert!(!ws.is_dirty());
    ws.submit_changes().unwrap();
    assert_eq!(store.row_count(), 0);
}

#[test]
fn dirty_tracking_across_interleaved_operations() {
    let store = Arc::new(MemoryStore::new());
    let mut ws = MemoryWorkspace::new(store.clone());

    let a = product(1, "anvil", 100);
    let b = product(2, "bellows", 50);
    let c = product(3, "chisel", 25);

    assert!(!ws.is_dirty());
    ws.add(&a).unwrap();
    assert!(ws.is_dirty());
    ws.add(&b).unwrap();
    ws.add(&c).unwrap();
    ws.submit_changes().unwrap();
    assert!(!ws.is_dirty());

    ws.update(&product(1, "anvil", 120)).unwrap();
    assert!(ws.is_dirty());
    ws.delete(&b).unwrap();
    ws.submit_changes().unwrap();
    assert!(!ws.is_dirty());

    // One updated, one deleted, one untouched.
    let query = ws.query::<Product>();
    let remaining = query.load(&mut ws).unwrap();
    assert_eq!(remaining.len(), 2);
}

// ── Extension ordering and memoized buckets ──────────────────────

#[test]
fn submit_invokes_extensions_in_registration_order_with_identical_buckets() {
    let recorder = Recorder::default();
    let store = Arc::new(MemoryStore::new());
    let mut ws = workspace_with_extensions(
        store,
        vec![
            Box::new(RecordingExtension::new("e1", recorder.clone())),
            Box::new(RecordingExtension::new("e2", recorder.clone())),
            Box::new(RecordingExtension::new("e3", recorder.clone())),
        ],
    );

    ws.add(&product(1, "anvil", 100)).unwrap();
    ws.submit_changes().unwrap();

    let events = recorder.events();
    let submitting: Vec<&String> = events
        .iter()
        .filter(|e| e.contains(":submitting:"))
        .collect();

    assert_eq!(submitting.len(), 3);
    assert!(submitting[0].starts_with("e1:"));
    assert!(submitting[1].starts_with("e2:"));
    assert!(submitting[2].starts_with("e3:"));

    // Every extension saw the same three bucket contents.
    let payloads: Vec<String> = submitting
        .iter()
        .map(|e| e.splitn(2, ':').nth(1).unwrap().to_string())
        .collect();
    assert_eq!(payloads[0], payloads[1]);
    assert_eq!(payloads[1], payloads[2]);
}

#[test]
fn validation_failure_stops_the_chain_and_the_commit() {
    let recorder = Recorder::default();
    let store = Arc::new(MemoryStore::new());
    let mut ws = workspace_with_extensions(
        store.clone(),
        vec![
            Box::new(RecordingExtension::new("e1", recorder.clone())),
            Box::new(RecordingExtension::vetoing("e2", recorder.clone())),
            Box::new(RecordingExtension::new("e3", recorder.clone())),
        ],
    );

    ws.add(&product(1, "anvil", 100)).unwrap();
    let err = ws.submit_changes().unwrap_err();
    assert!(matches!(err, WorkspaceError::Validation(_)));

    let events = recorder.events();
    assert!(events.iter().any(|e| e.starts_with("e1:submitting")));
    assert!(events.iter().any(|e| e.starts_with("e2:submitting")));
    assert!(!events.iter().any(|e| e.starts_with("e3:submitting")));

    // The commit never happened and the generation is still pending.
    assert_eq!(store.row_count(), 0);
    assert!(ws.is_dirty());
}

// ── Conflict normalization ───────────────────────────────────────

#[test]
fn competing_workspaces_produce_a_normalized_conflict() {
    let store = Arc::new(MemoryStore::new());

    let mut seeder = MemoryWorkspace::new(store.clone());
    seeder.add(&product(1, "anvil", 100)).unwrap();
    seeder.submit_changes().unwrap();

    let mut w1 = MemoryWorkspace::new(store.clone());
    let mut w2 = MemoryWorkspace::new(store.clone());

    let theirs: Product = w1.get(1i64).unwrap().unwrap();
    let mine: Product = w2.get(1i64).unwrap().unwrap();

    w1.update(&Product {
        price: 150,
        ..theirs
    })
    .unwrap();
    w1.submit_changes().unwrap();

    let my_version = Product { price: 90, ..mine };
    w2.update(&my_version).unwrap();
    let err = w2.submit_changes().unwrap_err();

    let WorkspaceError::Conflict(conflict) = err else {
        panic!("expected a conflict, got: {err}");
    };
    assert_eq!(conflict.conflicts().len(), 1);

    let conflicted = &conflict.conflicts()[0];
    assert_eq!(conflicted.type_name, Product::type_name());

    // The conflicted object is w2's in-flight version, not the winner's.
    let in_flight: Product = conflicted.object.decode().unwrap();
    assert_eq!(in_flight.price, 90);

    // Nothing from the losing batch was applied.
    let stored: Product = w1.get(1i64).unwrap().unwrap();
    assert_eq!(stored.price, 150);

    // The losing workspace is still dirty and may reconcile and resubmit.
    assert!(w2.is_dirty());
}

#[test]
fn conflict_notifies_every_extension_in_order() {
    let store = Arc::new(MemoryStore::new());
    let mut seeder = MemoryWorkspace::new(store.clone());
    seeder.add(&product(1, "anvil", 100)).unwrap();
    seeder.submit_changes().unwrap();

    let recorder = Recorder::default();
    let mut w1 = MemoryWorkspace::new(store.clone());
    let mut w2 = workspace_with_extensions(
        store,
        vec![
            Box::new(RecordingExtension::new("e1", recorder.clone())),
            Box::new(RecordingExtension::new("e2", recorder.clone())),
        ],
    );

    let loaded: Product = w2.get(1i64).unwrap().unwrap();
    w1.get::<Product>(1i64).unwrap();
    w1.update(&product(1, "anvil", 150)).unwrap();
    w1.submit_changes().unwrap();

    w2.update(&Product {
        price: 90,
        ..loaded
    })
    .unwrap();
    let err = w2.submit_changes().unwrap_err();
    assert!(matches!(err, WorkspaceError::Conflict(_)));

    let conflicts: Vec<String> = recorder
        .events()
        .into_iter()
        .filter(|e| e.contains(":conflict:"))
        .collect();
    assert_eq!(conflicts, vec!["e1:conflict:1", "e2:conflict:1"]);
}

#[test]
fn conflict_hook_failure_masks_the_conflict() {
    let store = Arc::new(MemoryStore::new());
    let mut seeder = MemoryWorkspace::new(store.clone());
    seeder.add(&product(1, "anvil", 100)).unwrap();
    seeder.submit_changes().unwrap();

    let recorder = Recorder::default();
    let mut w1 = MemoryWorkspace::new(store.clone());
    let mut w2 = workspace_with_extensions(
        store,
        vec![
            Box::new(RecordingExtension::failing_on_conflict("e1", recorder.clone())),
            Box::new(RecordingExtension::new("e2", recorder.clone())),
        ],
    );

    let loaded: Product = w2.get(1i64).unwrap().unwrap();
    w1.get::<Product>(1i64).unwrap();
    w1.update(&product(1, "anvil", 150)).unwrap();
    w1.submit_changes().unwrap();

    w2.update(&Product {
        price: 90,
        ..loaded
    })
    .unwrap();

    // First-thrown-wins: e1's failure replaces the conflict, and e2 is
    // never notified.
    let err = w2.submit_changes().unwrap_err();
    assert!(matches!(err, WorkspaceError::Extension(_)));
    assert!(!recorder.events().iter().any(|e| e.starts_with("e2:conflict")));
}

// ── Queryable context ────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct OrderLine {
    sku: String,
    quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Order {
    id: i64,
    lines: Vec<OrderLine>,
}

impl Entity for Order {
    fn key(&self) -> EntityKey {
        self.id.into()
    }

    fn navigations() -> &'static [Navigation] {
        &[Navigation {
            name: "lines",
            nested: Navigation::none,
        }]
    }
}

#[test]
fn query_is_lazy_and_re_executes_on_every_load() {
    let store = Arc::new(MemoryStore::new());
    let mut ws = MemoryWorkspace::new(store);

    let query = ws
        .query::<Product>()
        .filter(|p| p.price >= 50)
        .order_by(|p| p.price);

    // Built before any data exists; nothing has executed yet.
    assert!(query.load(&mut ws).unwrap().is_empty());

    ws.add(&product(1, "anvil", 100)).unwrap();
    ws.add(&product(2, "bellows", 50)).unwrap();
    ws.add(&product(3, "tack", 5)).unwrap();
    ws.submit_changes().unwrap();

    // The same query object sees the new rows: results are not cached.
    let loaded = query.load(&mut ws).unwrap();
    let names: Vec<&str> = loaded.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["bellows", "anvil"]);
}

#[test]
fn include_is_a_validated_no_op_and_idempotent() {
    let store = Arc::new(MemoryStore::new());
    let mut ws = MemoryWorkspace::new(store);

    ws.add(&Order {
        id: 1,
        lines: vec![OrderLine {
            sku: "anvil".into(),
            quantity: 2,
        }],
    })
    .unwrap();
    ws.submit_changes().unwrap();

    let plain = ws.query::<Order>().load(&mut ws).unwrap();
    let once = ws
        .query::<Order>()
        .include("lines")
        .unwrap()
        .load(&mut ws)
        .unwrap();
    let twice = ws
        .query::<Order>()
        .include("lines")
        .unwrap()
        .include("lines")
        .unwrap()
        .load(&mut ws)
        .unwrap();

    assert_eq!(plain, once);
    assert_eq!(once, twice);
    // Associated collections are fully populated.
    assert!(!twice[0].lines.is_empty());
    assert_eq!(twice[0].lines[0].sku, "anvil");
}

#[test]
fn include_with_a_bad_path_names_the_segment() {
    let store = Arc::new(MemoryStore::new());
    let ws = MemoryWorkspace::new(store);

    let err = ws.query::<Order>().include("shipments").unwrap_err();
    match err {
        WorkspaceError::InvalidInclude { segment, .. } => assert_eq!(segment, "shipments"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn scans_report_the_rendered_statement() {
    let recorder = Recorder::default();
    let store = Arc::new(MemoryStore::new());
    let mut ws = workspace_with_extensions(
        store,
        vec![Box::new(RecordingExtension::new("e1", recorder.clone()))],
    );

    ws.query::<Product>().load(&mut ws).unwrap();

    assert!(recorder
        .events()
        .iter()
        .any(|e| e.starts_with("e1:query:scan ") && e.contains("Product")));
}

// ── Cache clean ──────────────────────────────────────────────────

#[test]
fn clean_fires_the_cache_cleaned_hook() {
    let recorder = Recorder::default();
    let store = Arc::new(MemoryStore::new());
    let mut ws = workspace_with_extensions(
        store,
        vec![Box::new(RecordingExtension::new("e1", recorder.clone()))],
    );

    ws.add(&product(1, "anvil", 100)).unwrap();
    ws.clean();

    assert!(recorder.events().contains(&"e1:cleaned".to_string()));
    assert!(!ws.is_dirty());
}

// ── Ambient scopes over the memory factory ───────────────────────

#[test]
fn nested_required_scope_shares_the_workspace_end_to_end() {
    let registry = Arc::new(WorkspaceRegistry::new());
    let store = Arc::new(MemoryStore::new());
    registry
        .register_default_factory(Arc::new(MemoryWorkspaceFactory::new(store.clone())))
        .unwrap();

    let outer = WorkspaceScope::enter(registry.clone(), ScopeOption::RequiresNew).unwrap();
    {
        let inner = WorkspaceScope::enter(registry.clone(), ScopeOption::Required).unwrap();
        let outer_ws = outer.current().unwrap();
        let inner_ws = inner.current().unwrap();
        assert!(Rc::ptr_eq(&outer_ws, &inner_ws));

        inner_ws
            .borrow_mut()
            .add(&product(1, "anvil", 100))
            .unwrap();
        drop(outer_ws);
        drop(inner_ws);
        inner.close().unwrap();
    }

    // The shared workspace is still dirty in the outer scope; submit there.
    let shared = outer.current().unwrap();
    assert!(shared.borrow().is_dirty());
    shared.borrow_mut().submit_changes().unwrap();
    drop(shared);
    outer.close().unwrap();

    assert_eq!(store.row_count(), 1);
}

#[test]
fn requires_new_scopes_are_isolated_end_to_end() {
    let registry = Arc::new(WorkspaceRegistry::new());
    let store = Arc::new(MemoryStore::new());
    registry
        .register_default_factory(Arc::new(MemoryWorkspaceFactory::new(store)))
        .unwrap();

    let outer = WorkspaceScope::enter(registry.clone(), ScopeOption::RequiresNew).unwrap();
    let inner = WorkspaceScope::enter(registry.clone(), ScopeOption::RequiresNew).unwrap();

    let outer_ws = outer.current().unwrap();
    let inner_ws = inner.current().unwrap();
    assert!(!Rc::ptr_eq(&outer_ws, &inner_ws));

    outer_ws.borrow_mut().add(&product(1, "a", 1)).unwrap();
    assert!(!inner_ws.borrow().is_dirty());

    drop(inner_ws);
    inner.close().unwrap();

    // The outer workspace survives the inner close untouched.
    assert!(outer_ws.borrow().is_dirty());
    drop(outer_ws);
    outer.close().unwrap();
}

// ── Registry-driven workspace creation ───────────────────────────

#[test]
fn registry_attaches_fresh_extensions_to_every_workspace() {
    let recorder = Recorder::default();
    let registry = Arc::new(WorkspaceRegistry::new());
    let store = Arc::new(MemoryStore::new());
    registry
        .register_default_factory(Arc::new(MemoryWorkspaceFactory::new(store)))
        .unwrap();

    let recorder_for_extension = recorder.clone();
    registry.add_extension(move || {
        RecordingExtension::new("reg", recorder_for_extension.clone())
    });

    let mut first = registry.create_workspace().unwrap();
    let mut second = registry.create_workspace().unwrap();

    first.add(&product(1, "a", 1)).unwrap();
    second.add(&product(2, "b", 2)).unwrap();

    let adds: Vec<String> = recorder
        .events()
        .into_iter()
        .filter(|e| e.contains(":added:"))
        .collect();
    assert_eq!(adds, vec!["reg:added:1", "reg:added:2"]);
}
