//! Scope snapshots: the server-side mirror of a run's namespace tree.
//!
//! A kernel reports the full tree after every execution; the server keeps
//! the previous tree per run and derives the incremental update sent to
//! clients with [`diff_snapshots`].

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Snapshot of one scope in a run's namespace tree.
///
/// `variables` maps identifiers to jobject JSON. A `None` value is an
/// explicit tombstone ("this name existed previously and is now absent");
/// a missing key means "never existed". `children` is keyed by the editor
/// group id that owns the child scope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScopeSnapshot {
    pub name: String,
    pub variables: IndexMap<String, Option<String>>,
    pub children: IndexMap<Uuid, ScopeSnapshot>,
}

impl ScopeSnapshot {
    pub fn named(name: impl Into<String>) -> Self {
        ScopeSnapshot {
            name: name.into(),
            variables: IndexMap::new(),
            children: IndexMap::new(),
        }
    }

    /// A copy of this snapshot with every variable (recursively) nulled.
    /// This is the shape a removed scope keeps in an update.
    fn tombstoned(&self) -> ScopeSnapshot {
        ScopeSnapshot {
            name: self.name.clone(),
            variables: self.variables.keys().map(|k| (k.clone(), None)).collect(),
            children: self
                .children
                .iter()
                .map(|(id, child)| (*id, child.tombstoned()))
                .collect(),
        }
    }
}

/// Compute the update a client needs to go from `old` to `new`.
///
/// At each scope the key set is the union of both sides: keys present in
/// `new` carry their new value, keys only in `old` become tombstones.
/// Children present in both sides are diffed recursively, children new in
/// `new` pass through wholesale, and children that disappeared keep their
/// skeleton with all variables nulled.
pub fn diff_snapshots(old: &ScopeSnapshot, new: &ScopeSnapshot) -> ScopeSnapshot {
    let mut variables: IndexMap<String, Option<String>> = IndexMap::new();
    for (key, value) in &new.variables {
        variables.insert(key.clone(), value.clone());
    }
    for key in old.variables.keys() {
        if !new.variables.contains_key(key) {
            variables.insert(key.clone(), None);
        }
    }

    let mut children: IndexMap<Uuid, ScopeSnapshot> = IndexMap::new();
    for (id, new_child) in &new.children {
        match old.children.get(id) {
            Some(old_child) => {
                children.insert(*id, diff_snapshots(old_child, new_child));
            }
            None => {
                children.insert(*id, new_child.clone());
            }
        }
    }
    for (id, old_child) in &old.children {
        if !new.children.contains_key(id) {
            children.insert(*id, old_child.tombstoned());
        }
    }

    ScopeSnapshot {
        name: new.name.clone(),
        variables,
        children,
    }
}
