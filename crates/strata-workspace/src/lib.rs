//! # strata-workspace
//!
//! The unit-of-work contract at the heart of Strata.
//!
//! A [`Workspace`] collects pending changes against a backing store and
//! submits them as one all-or-nothing batch. An ordered chain of
//! [`WorkspaceExtension`]s observes every lifecycle transition and can veto
//! a submit; provider concurrency failures are normalized into one
//! [`ConflictError`] shape before they reach the caller.
//!
//! ## Key components
//!
//! - [`Workspace`] / [`WorkspaceExt`] — the object-safe CRUD + submit
//!   contract and its typed convenience layer.
//! - [`WorkspaceExtension`] — nine lifecycle hooks with no-op defaults,
//!   invoked synchronously in attachment order.
//! - [`EntitySet`] — lazy, composable query surface with validated
//!   `include` directives.
//! - [`WorkspaceRegistry`] — which factory and which extensions are active;
//!   explicitly constructed and shared by `Arc`.
//! - [`WorkspaceScope`] — thread-local ambient nesting of logical units of
//!   work with strict LIFO disposal.

pub mod conflict;
pub mod error;
pub mod extension;
pub mod query;
pub mod registry;
pub mod scope;
pub mod validation;
pub mod workspace;

pub use conflict::{ConflictError, ConflictedObject};
pub use error::WorkspaceError;
pub use extension::{Extensions, WorkspaceExtension};
pub use query::{validate_include_path, EntitySet};
pub use registry::{RegistryError, WorkspaceFactory, WorkspaceRegistry};
pub use scope::{ScopeError, ScopeOption, SharedWorkspace, WorkspaceScope};
pub use validation::{ValidationError, ValidationResult, ValidationSeverity};
pub use workspace::{ConnectionManager, Workspace, WorkspaceExt, WorkspaceId};
