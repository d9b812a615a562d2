// record.rs — The non-generic entity handle.
//
// Generic workspace methods (`add<T>`, `update<T>`, ...) capture the typed
// entity into an EntityRecord at the API boundary. Everything downstream of
// that boundary (change buckets, extension hooks, conflict reporting, the
// backing store) handles records only, so none of it needs to be generic
// over entity types.

use serde_json::Value;
use std::fmt;

use crate::entity::{Entity, EntityKey};
use crate::error::RecordError;

/// Identity of a record: entity type plus key.
///
/// Two records refer to the same entity exactly when their `RecordKey`s are
/// equal. Used as the map key for identity bookkeeping and version tracking.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordKey {
    type_name: String,
    key: EntityKey,
}

impl RecordKey {
    pub fn new(type_name: impl Into<String>, key: impl Into<EntityKey>) -> Self {
        Self {
            type_name: type_name.into(),
            key: key.into(),
        }
    }

    /// Identity of a typed entity without building a full record.
    pub fn of<T: Entity>(entity: &T) -> Self {
        Self::new(T::type_name(), entity.key())
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn key(&self) -> &EntityKey {
        &self.key
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}['{}']", self.type_name, self.key)
    }
}

/// A type-erased entity handle: type tag, key, and a JSON snapshot of the
/// entity's property values at capture time.
///
/// The snapshot is a value copy. Mutating the original entity after capture
/// does not change a record already sitting in a change bucket; re-recording
/// the entity replaces the snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityRecord {
    identity: RecordKey,
    snapshot: Value,
}

impl EntityRecord {
    /// Capture a typed entity into a record.
    pub fn capture<T: Entity>(entity: &T) -> Result<Self, RecordError> {
        let snapshot = serde_json::to_value(entity).map_err(RecordError::Capture)?;
        Ok(Self {
            identity: RecordKey::of(entity),
            snapshot,
        })
    }

    /// Rebuild a record from its parts (used by providers materializing rows).
    pub fn from_parts(identity: RecordKey, snapshot: Value) -> Self {
        Self { identity, snapshot }
    }

    /// Decode the snapshot back into the typed entity.
    ///
    /// Fails if `T` is not the type this record was captured from.
    pub fn decode<T: Entity>(&self) -> Result<T, RecordError> {
        if self.identity.type_name() != T::type_name() {
            return Err(RecordError::TypeMismatch {
                expected: T::type_name().to_string(),
                actual: self.identity.type_name().to_string(),
            });
        }
        serde_json::from_value(self.snapshot.clone()).map_err(|source| RecordError::Decode {
            type_name: T::type_name().to_string(),
            source,
        })
    }

    pub fn identity(&self) -> &RecordKey {
        &self.identity
    }

    pub fn type_name(&self) -> &str {
        self.identity.type_name()
    }

    pub fn key(&self) -> &EntityKey {
        self.identity.key()
    }

    pub fn snapshot(&self) -> &Value {
        &self.snapshot
    }

    /// Whether two records refer to the same entity, regardless of snapshot.
    pub fn is_same_entity(&self, other: &Self) -> bool {
        self.identity == other.identity
    }
}
