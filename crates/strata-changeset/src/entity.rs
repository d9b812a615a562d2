// entity.rs — The contract an application type must satisfy to be tracked.
//
// Entities are plain structs. There is no required base type: anything that
// serializes with serde and can name a stable key participates. Navigation
// metadata exists only so that `include` paths can be validated at query
// construction time; providers without deferred loading ignore it otherwise.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A normalized entity key.
///
/// Providers key rows by many native types (integers, UUIDs, composite
/// strings). The workspace layer normalizes them all to a string form so the
/// identity of a record can be compared without knowing the concrete entity
/// type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityKey(String);

impl EntityKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl From<String> for EntityKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl From<Uuid> for EntityKey {
    fn from(key: Uuid) -> Self {
        Self(key.to_string())
    }
}

impl From<i64> for EntityKey {
    fn from(key: i64) -> Self {
        Self(key.to_string())
    }
}

/// One navigation property on an entity type.
///
/// `nested` points at the navigation list of the association's target type,
/// letting multi-level `include` paths ("customer.orders.lines") be walked
/// segment by segment without a runtime type registry.
#[derive(Clone, Copy)]
pub struct Navigation {
    /// The property name a dot-separated include path refers to.
    pub name: &'static str,
    /// Navigation metadata of the target type, for the next path segment.
    pub nested: fn() -> &'static [Navigation],
}

impl Navigation {
    /// Navigation list for types with no further associations.
    pub fn none() -> &'static [Navigation] {
        &[]
    }
}

impl fmt::Debug for Navigation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Navigation").field("name", &self.name).finish()
    }
}

/// An application type that a workspace can track.
///
/// The bounds make every entity self-describing: serde handles snapshotting
/// and rehydration, `key` names the row identity, and `navigations` lists the
/// association properties eligible for `include`.
pub trait Entity: Serialize + DeserializeOwned + Send + 'static {
    /// Stable identity of this instance within its entity type.
    fn key(&self) -> EntityKey;

    /// Type tag used to partition records by entity type.
    ///
    /// The default is the fully qualified Rust type name, which is stable
    /// within one process and unambiguous across crates.
    fn type_name() -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Navigation properties eligible for `include` paths.
    fn navigations() -> &'static [Navigation] {
        &[]
    }
}
