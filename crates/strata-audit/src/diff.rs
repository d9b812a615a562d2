// diff.rs — Property-level comparison of entity snapshots.
//
// Snapshots are JSON objects, so a diff is a walk over the union of
// property names. Only top-level properties are compared; a changed nested
// structure shows up as one change on its root property with the full
// before and after values.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

/// One property that differs between two snapshots of an entity.
///
/// `before` is `None` for properties that did not exist before the change,
/// `after` is `None` for properties that no longer exist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyChange {
    pub property: String,
    pub before: Option<Value>,
    pub after: Option<Value>,
}

/// Compare two snapshots property by property, in property-name order.
/// Unchanged properties are omitted.
pub fn diff_properties(before: &Value, after: &Value) -> Vec<PropertyChange> {
    let (Some(before_map), Some(after_map)) = (before.as_object(), after.as_object()) else {
        // Snapshots of non-struct entities compare as one opaque value.
        if before == after {
            return Vec::new();
        }
        return vec![PropertyChange {
            property: "$value".to_string(),
            before: Some(before.clone()),
            after: Some(after.clone()),
        }];
    };

    let names: BTreeSet<&String> = before_map.keys().chain(after_map.keys()).collect();

    names
        .into_iter()
        .filter_map(|name| {
            let old = before_map.get(name);
            let new = after_map.get(name);
            if old == new {
                return None;
            }
            Some(PropertyChange {
                property: name.clone(),
                before: old.cloned(),
                after: new.cloned(),
            })
        })
        .collect()
}

/// Every property of a snapshot as an after-only change, for entities that
/// have no pristine counterpart (inserts).
pub fn added_properties(after: &Value) -> Vec<PropertyChange> {
    match after.as_object() {
        Some(map) => {
            let mut names: Vec<&String> = map.keys().collect();
            names.sort();
            names
                .into_iter()
                .map(|name| PropertyChange {
                    property: name.clone(),
                    before: None,
                    after: map.get(name).cloned(),
                })
                .collect()
        }
        None => vec![PropertyChange {
            property: "$value".to_string(),
            before: None,
            after: Some(after.clone()),
        }],
    }
}

/// Every property of a snapshot as a before-only change, for entities being
/// removed.
pub fn removed_properties(before: &Value) -> Vec<PropertyChange> {
    match before.as_object() {
        Some(map) => {
            let mut names: Vec<&String> = map.keys().collect();
            names.sort();
            names
                .into_iter()
                .map(|name| PropertyChange {
                    property: name.clone(),
                    before: map.get(name).cloned(),
                    after: None,
                })
                .collect()
        }
        None => vec![PropertyChange {
            property: "$value".to_string(),
            before: Some(before.clone()),
            after: None,
        }],
    }
}
