// error.rs — Error taxonomy of the workspace layer.
//
// The layer performs no retries and only one translation: provider-specific
// concurrency failures become ConflictError. Everything else either carries
// workspace-level context (not-found, invalid include) or passes through
// untranslated (provider transport failures, extension failures).

use thiserror::Error;

use strata_changeset::{EntityKey, RecordError};

use crate::conflict::ConflictError;
use crate::registry::RegistryError;
use crate::validation::ValidationError;

/// Errors surfaced by workspace operations.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    /// An extension vetoed the submit. Recoverable; nothing was committed.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The provider rejected the commit because another workspace committed
    /// first. Recoverable by reconciling the conflicted objects.
    #[error(transparent)]
    Conflict(#[from] ConflictError),

    /// An update or refresh targeted an entity with no persisted or tracked
    /// counterpart.
    #[error("no persisted counterpart for {type_name} with key '{key}'")]
    NotFound { type_name: String, key: EntityKey },

    /// The entity's runtime type does not satisfy the provider's entity
    /// contract. Programmer error.
    #[error("entity type '{type_name}' is not supported by this provider: {reason}")]
    UnsupportedEntityType { type_name: String, reason: String },

    /// An include path named a navigation property that does not exist.
    /// Programmer error.
    #[error("include path '{path}' does not resolve: unknown navigation segment '{segment}'")]
    InvalidInclude { path: String, segment: String },

    /// Factory or extension registry misuse.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Entity state could not be captured or decoded.
    #[error(transparent)]
    Record(#[from] RecordError),

    /// A provider-transport failure, passed through untranslated.
    #[error("provider error: {0}")]
    Provider(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// An extension failed for a reason other than validation.
    #[error("extension error: {0}")]
    Extension(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl WorkspaceError {
    /// Wrap a provider's native error without translating it.
    pub fn provider(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Provider(Box::new(source))
    }

    /// Wrap an extension's own failure type.
    pub fn extension(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Extension(Box::new(source))
    }
}
