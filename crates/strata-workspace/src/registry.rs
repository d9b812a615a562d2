// registry.rs — Factory and extension registration.
//
// The registry is an explicitly constructed object shared by Arc, not a
// process-wide static. Configuration cardinality: exactly one workspace
// factory at a time, any number of extension registrations (the same type
// may legitimately appear twice). A single coarse lock guards both; it
// covers registration and lookup only, never workspace usage.

use parking_lot::Mutex;
use std::any::TypeId;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::error::WorkspaceError;
use crate::extension::WorkspaceExtension;
use crate::workspace::Workspace;

/// Creates and disposes workspace instances for one provider.
///
/// Releasing a workspace through its factory disposes the provider
/// resources the workspace exclusively owns.
pub trait WorkspaceFactory: Send + Sync + std::fmt::Debug {
    fn create(&self) -> Result<Box<dyn Workspace>, WorkspaceError>;
    fn release(&self, workspace: Box<dyn Workspace>);
}

/// Factory and extension registration misuse. Configuration errors, not
/// runtime conditions.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("a default workspace factory is already registered")]
    FactoryAlreadyRegistered,

    #[error("no default workspace factory is registered")]
    NoFactoryRegistered,

    #[error("extension type '{type_name}' was never registered")]
    ExtensionNotRegistered { type_name: &'static str },
}

type ExtensionConstructor = Arc<dyn Fn() -> Box<dyn WorkspaceExtension> + Send + Sync>;

struct ExtensionRegistration {
    type_id: TypeId,
    type_name: &'static str,
    construct: ExtensionConstructor,
}

#[derive(Default)]
struct Inner {
    factory: Option<Arc<dyn WorkspaceFactory>>,
    extensions: Vec<ExtensionRegistration>,
}

/// Resolves which workspace implementation and which extensions are active.
///
/// Construct one at process start and thread it through by `Arc`.
#[derive(Default)]
pub struct WorkspaceRegistry {
    inner: Mutex<Inner>,
}

impl WorkspaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the factory new workspaces are created from.
    ///
    /// Fails if one is already registered; remove it first to replace it.
    pub fn register_default_factory(
        &self,
        factory: Arc<dyn WorkspaceFactory>,
    ) -> Result<(), RegistryError> {
        let mut inner = self.inner.lock();
        if inner.factory.is_some() {
            return Err(RegistryError::FactoryAlreadyRegistered);
        }
        inner.factory = Some(factory);
        Ok(())
    }

    /// Register a factory by type; equivalent to registering a default
    /// constructed instance.
    pub fn register_default_factory_of<F>(&self) -> Result<(), RegistryError>
    where
        F: WorkspaceFactory + Default + 'static,
    {
        self.register_default_factory(Arc::new(F::default()))
    }

    /// Remove and return the registered factory.
    pub fn remove_default_factory(&self) -> Result<Arc<dyn WorkspaceFactory>, RegistryError> {
        let mut inner = self.inner.lock();
        inner
            .factory
            .take()
            .ok_or(RegistryError::NoFactoryRegistered)
    }

    /// The registered factory.
    pub fn default_factory(&self) -> Result<Arc<dyn WorkspaceFactory>, RegistryError> {
        let inner = self.inner.lock();
        inner
            .factory
            .clone()
            .ok_or(RegistryError::NoFactoryRegistered)
    }

    /// Register an extension type by its constructor.
    ///
    /// No duplicate check: registering the same type twice yields two
    /// instances on every new workspace. Instantiation order is
    /// registration order, stable for the process lifetime.
    pub fn add_extension<E, F>(&self, construct: F)
    where
        E: WorkspaceExtension + 'static,
        F: Fn() -> E + Send + Sync + 'static,
    {
        let registration = ExtensionRegistration {
            type_id: TypeId::of::<E>(),
            type_name: std::any::type_name::<E>(),
            construct: Arc::new(move || Box::new(construct())),
        };
        debug!(extension = registration.type_name, "extension type registered");
        self.inner.lock().extensions.push(registration);
    }

    /// Remove the earliest registration of an extension type.
    pub fn remove_extension<E: WorkspaceExtension + 'static>(&self) -> Result<(), RegistryError> {
        let mut inner = self.inner.lock();
        let type_id = TypeId::of::<E>();
        match inner.extensions.iter().position(|r| r.type_id == type_id) {
            Some(index) => {
                inner.extensions.remove(index);
                Ok(())
            }
            None => Err(RegistryError::ExtensionNotRegistered {
                type_name: std::any::type_name::<E>(),
            }),
        }
    }

    /// Materialize one fresh instance of every registered extension type,
    /// in registration order. Extensions are never shared between
    /// workspaces.
    pub fn extension_instances(&self) -> Vec<Box<dyn WorkspaceExtension>> {
        // Constructors run outside the lock; they are arbitrary user code.
        let constructors: Vec<ExtensionConstructor> = {
            let inner = self.inner.lock();
            inner.extensions.iter().map(|r| r.construct.clone()).collect()
        };
        constructors.iter().map(|construct| construct()).collect()
    }

    /// Create a workspace from the registered factory with fresh instances
    /// of every registered extension attached.
    pub fn create_workspace(&self) -> Result<Box<dyn Workspace>, WorkspaceError> {
        let factory = self.default_factory()?;
        let mut workspace = factory.create()?;
        for extension in self.extension_instances() {
            workspace.attach_extension(extension);
        }
        debug!(workspace = %workspace.id(), "workspace created");
        Ok(workspace)
    }

    /// Release a workspace back to the registered factory.
    pub fn release_workspace(&self, workspace: Box<dyn Workspace>) -> Result<(), RegistryError> {
        let factory = self.default_factory()?;
        debug!(workspace = %workspace.id(), "workspace released");
        factory.release(workspace);
        Ok(())
    }
}
