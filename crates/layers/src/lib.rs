//! # Strata Layers
//!
//! The generic merge-and-diff engine: priority-ordered snapshot layers
//! folded into one merged view, with each recomputation producing the
//! minimal set of add/update/remove changes against the previous view.
//! Both the preference pipeline and the keybinding override pipeline
//! are built on this.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Named values contributed by one layer
pub type Snapshot = HashMap<String, Value>;

/// Where a layer sits in the override chain; higher overrides lower
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LayerPriority {
    /// Built-in defaults
    Default = 0,
    /// User-global scope
    User = 10,
    /// Workspace scope
    Workspace = 20,
    /// Folder scope
    Folder = 30,
    /// Policy/admin scope (highest)
    Policy = 100,
}

/// One prioritized snapshot source
#[derive(Debug, Clone)]
pub struct Layer {
    pub priority: LayerPriority,
    pub snapshot: Snapshot,
}

impl Layer {
    pub fn new(priority: LayerPriority, snapshot: Snapshot) -> Self {
        Self { priority, snapshot }
    }

    pub fn empty(priority: LayerPriority) -> Self {
        Self {
            priority,
            snapshot: Snapshot::new(),
        }
    }
}

/// Minimal change record for one name
///
/// Presence of the value fields encodes the kind: add has no old value,
/// remove has no new value, update has both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_value: Option<Value>,
}

impl Change {
    pub fn added(name: impl Into<String>, new_value: Value) -> Self {
        Self {
            name: name.into(),
            old_value: None,
            new_value: Some(new_value),
        }
    }

    pub fn updated(name: impl Into<String>, old_value: Value, new_value: Value) -> Self {
        Self {
            name: name.into(),
            old_value: Some(old_value),
            new_value: Some(new_value),
        }
    }

    pub fn removed(name: impl Into<String>, old_value: Value) -> Self {
        Self {
            name: name.into(),
            old_value: Some(old_value),
            new_value: None,
        }
    }

    pub fn is_added(&self) -> bool {
        self.old_value.is_none() && self.new_value.is_some()
    }

    pub fn is_removed(&self) -> bool {
        self.old_value.is_some() && self.new_value.is_none()
    }

    pub fn is_updated(&self) -> bool {
        self.old_value.is_some() && self.new_value.is_some()
    }
}

/// Diff two name/value maps by deep equality
///
/// A key whose new value is deep-equal to its old value produces no
/// change, regardless of how the snapshot object was rebuilt. Changes
/// are sorted by name so batches are deterministic.
pub fn diff_maps(old: &Snapshot, new: &Snapshot) -> Vec<Change> {
    let mut changes = Vec::new();

    for (name, new_value) in new {
        match old.get(name) {
            Some(old_value) => {
                if old_value != new_value {
                    changes.push(Change::updated(name, old_value.clone(), new_value.clone()));
                }
            }
            None => changes.push(Change::added(name, new_value.clone())),
        }
    }

    for (name, old_value) in old {
        if !new.contains_key(name) {
            changes.push(Change::removed(name, old_value.clone()));
        }
    }

    changes.sort_by(|a, b| a.name.cmp(&b.name));
    changes
}

/// Merged view over prioritized layers, retained across recomputations
/// so each recompute can be diffed against the last published state
#[derive(Debug, Default)]
pub struct LayerStore {
    merged: Snapshot,
}

impl LayerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recompute the merged view and diff it against the previous one
    ///
    /// `layers` must be ordered by ascending priority; later snapshots
    /// unconditionally overwrite earlier ones for the same name. The
    /// previous view is swapped out atomically after diffing, and one
    /// call yields at most one batch. Recomputing with unchanged layer
    /// contents yields an empty batch.
    pub fn recompute(&mut self, layers: &[Layer]) -> Vec<Change> {
        let mut merged = Snapshot::new();
        for layer in layers {
            for (name, value) in &layer.snapshot {
                merged.insert(name.clone(), value.clone());
            }
        }

        let changes = diff_maps(&self.merged, &merged);
        self.merged = merged;
        changes
    }

    /// The currently published merged view
    pub fn merged(&self) -> &Snapshot {
        &self.merged
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.merged.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn snapshot(pairs: &[(&str, Value)]) -> Snapshot {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_merge_follows_ascending_priority() {
        let mut store = LayerStore::new();
        let layers = [
            Layer::new(
                LayerPriority::User,
                snapshot(&[("a", json!(1)), ("b", json!("user"))]),
            ),
            Layer::new(LayerPriority::Workspace, snapshot(&[("b", json!("ws"))])),
        ];

        store.recompute(&layers);

        assert_eq!(store.get("a"), Some(&json!(1)));
        assert_eq!(store.get("b"), Some(&json!("ws")));
    }

    #[test]
    fn test_recompute_is_idempotent() {
        let mut store = LayerStore::new();
        let layers = [Layer::new(
            LayerPriority::User,
            snapshot(&[("a", json!(1))]),
        )];

        let first = store.recompute(&layers);
        assert_eq!(first.len(), 1);
        assert!(first[0].is_added());

        let second = store.recompute(&layers);
        assert!(second.is_empty());
    }

    #[test]
    fn test_deep_equal_values_produce_no_change() {
        let mut store = LayerStore::new();
        store.recompute(&[Layer::new(
            LayerPriority::User,
            snapshot(&[("obj", json!({"x": [1, 2], "y": "z"}))]),
        )]);

        // Fresh snapshot instance, identical content.
        let changes = store.recompute(&[Layer::new(
            LayerPriority::User,
            snapshot(&[("obj", json!({"x": [1, 2], "y": "z"}))]),
        )]);
        assert!(changes.is_empty());
    }

    #[test]
    fn test_removed_key_yields_remove_change() {
        let mut store = LayerStore::new();
        store.recompute(&[Layer::new(
            LayerPriority::User,
            snapshot(&[("a", json!(1)), ("b", json!(2))]),
        )]);

        let changes = store.recompute(&[Layer::new(
            LayerPriority::User,
            snapshot(&[("a", json!(1))]),
        )]);

        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].name, "b");
        assert!(changes[0].is_removed());
        assert_eq!(changes[0].old_value, Some(json!(2)));
    }

    #[test]
    fn test_key_still_supplied_by_other_layer_is_not_removed() {
        let mut store = LayerStore::new();
        let user = Layer::new(LayerPriority::User, snapshot(&[("a", json!("low"))]));
        let ws = Layer::new(LayerPriority::Workspace, snapshot(&[("a", json!("high"))]));
        store.recompute(&[user.clone(), ws]);

        // Workspace layer stops supplying `a`; the user layer still does.
        let changes = store.recompute(&[user]);
        assert_eq!(changes.len(), 1);
        assert!(changes[0].is_updated());
        assert_eq!(changes[0].old_value, Some(json!("high")));
        assert_eq!(changes[0].new_value, Some(json!("low")));
    }

    #[test]
    fn test_recompute_equals_fold() {
        let layers = [
            Layer::new(LayerPriority::Default, snapshot(&[("x", json!(0))])),
            Layer::new(
                LayerPriority::User,
                snapshot(&[("x", json!(1)), ("y", json!(true))]),
            ),
            Layer::new(LayerPriority::Workspace, snapshot(&[("x", json!(2))])),
        ];

        let mut store = LayerStore::new();
        store.recompute(&layers);

        let mut folded = Snapshot::new();
        for layer in &layers {
            folded.extend(layer.snapshot.clone());
        }
        assert_eq!(store.merged(), &folded);
    }
}
