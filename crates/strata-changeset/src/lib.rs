//! # strata-changeset
//!
//! Data model for pending-change tracking in Strata.
//!
//! A workspace collects pending mutations in a [`ChangeSet`]: three buckets
//! of [`EntityRecord`]s (inserts, updates, deletes). Entities are plain
//! serde-serializable structs implementing the [`Entity`] trait; the record
//! type erases the concrete entity type so the change set, the extension
//! pipeline, and the conflict error all operate on one uniform shape.
//!
//! ## Key components
//!
//! - [`Entity`] — the contract an application type must satisfy to be
//!   tracked: a stable key plus optional navigation metadata.
//! - [`EntityRecord`] — non-generic entity handle: type tag, key, and a JSON
//!   snapshot of the entity's state at capture time.
//! - [`ChangeSet`] — the three pending-change buckets with cancel-on-insert
//!   semantics and bitmask filtering via [`TrackingState`].

pub mod changeset;
pub mod entity;
pub mod error;
pub mod record;
pub mod tracking;

pub use changeset::ChangeSet;
pub use entity::{Entity, EntityKey, Navigation};
pub use error::RecordError;
pub use record::{EntityRecord, RecordKey};
pub use tracking::TrackingState;
