//! Object-graph packing for fork handoffs.
//!
//! A fork deep-copies a run's live state by serializing `(globals, group
//! table)` in the source kernel and deserializing it in the heir. Containers
//! are id-interned into a flat object table, so aliasing and cycles survive
//! the round trip. Values without a stable serialization (bound methods,
//! the `parent_scope` proxy) fail the pack with a typed error.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use twinsong_core::model::ScopeKind;

use crate::value::{Builtin, Namespace, Value, new_namespace};

/// Errors raised while packing or unpacking kernel state.
#[derive(Debug, Error)]
pub enum PackError {
    /// The state holds a value the packer cannot encode.
    #[error("cannot serialize {0}")]
    Unsupported(String),

    /// The blob is corrupt or references unknown objects.
    #[error("invalid state blob: {0}")]
    Invalid(String),

    /// Encoding/decoding failure at the bincode layer.
    #[error("state codec error: {0}")]
    Codec(String),
}

/// An inline value or a reference into the object table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PackedValue {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Tuple(Vec<PackedValue>),
    Builtin(String),
    Ref(usize),
}

/// One interned container.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PackedObject {
    List(Vec<PackedValue>),
    Dict(Vec<(String, PackedValue)>),
}

/// A persisted group namespace with its place in the scope tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackedGroup {
    pub id: Uuid,
    pub name: String,
    pub scope: ScopeKind,
    pub parent: Option<Uuid>,
    pub variables: Vec<(String, PackedValue)>,
}

/// The full serialized state of a kernel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackedState {
    pub objects: Vec<PackedObject>,
    pub globals: Vec<(String, PackedValue)>,
    pub groups: Vec<PackedGroup>,
}

impl PackedState {
    pub fn encode(&self) -> Result<Vec<u8>, PackError> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| PackError::Codec(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> Result<PackedState, PackError> {
        let (state, _) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .map_err(|e| PackError::Codec(e.to_string()))?;
        Ok(state)
    }
}

/// Packs values into a flat object table, interning containers by address.
pub struct Packer {
    objects: Vec<PackedObject>,
    interned: HashMap<usize, usize>,
}

impl Packer {
    pub fn new() -> Self {
        Packer {
            objects: Vec::new(),
            interned: HashMap::new(),
        }
    }

    pub fn pack_namespace(&mut self, ns: &Namespace) -> Result<Vec<(String, PackedValue)>, PackError> {
        ns.borrow()
            .iter()
            .map(|(name, value)| Ok((name.clone(), self.pack(value)?)))
            .collect()
    }

    pub fn pack(&mut self, value: &Value) -> Result<PackedValue, PackError> {
        match value {
            Value::None => Ok(PackedValue::None),
            Value::Bool(b) => Ok(PackedValue::Bool(*b)),
            Value::Int(i) => Ok(PackedValue::Int(*i)),
            Value::Float(f) => Ok(PackedValue::Float(*f)),
            Value::Str(s) => Ok(PackedValue::Str(s.to_string())),
            Value::Builtin(builtin) => Ok(PackedValue::Builtin(builtin.name().to_string())),
            Value::Tuple(items) => {
                let items = items
                    .iter()
                    .map(|item| self.pack(item))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(PackedValue::Tuple(items))
            }
            Value::List(cell) => {
                let addr = Rc::as_ptr(cell) as usize;
                if let Some(&index) = self.interned.get(&addr) {
                    return Ok(PackedValue::Ref(index));
                }
                // Reserve the slot before descending so cycles resolve.
                let index = self.objects.len();
                self.interned.insert(addr, index);
                self.objects.push(PackedObject::List(Vec::new()));
                let items = cell
                    .borrow()
                    .iter()
                    .map(|item| self.pack(item))
                    .collect::<Result<Vec<_>, _>>()?;
                self.objects[index] = PackedObject::List(items);
                Ok(PackedValue::Ref(index))
            }
            Value::Dict(cell) => {
                let addr = Rc::as_ptr(cell) as usize;
                if let Some(&index) = self.interned.get(&addr) {
                    return Ok(PackedValue::Ref(index));
                }
                let index = self.objects.len();
                self.interned.insert(addr, index);
                self.objects.push(PackedObject::Dict(Vec::new()));
                let entries = cell
                    .borrow()
                    .iter()
                    .map(|(key, item)| Ok((key.clone(), self.pack(item)?)))
                    .collect::<Result<Vec<_>, PackError>>()?;
                self.objects[index] = PackedObject::Dict(entries);
                Ok(PackedValue::Ref(index))
            }
            other @ (Value::BoundMethod { .. } | Value::ScopeProxy(_)) => {
                Err(PackError::Unsupported(other.repr()))
            }
        }
    }

    pub fn into_objects(self) -> Vec<PackedObject> {
        self.objects
    }
}

impl Default for Packer {
    fn default() -> Self {
        Self::new()
    }
}

/// Rebuilds values from a packed object table, restoring shared identity.
pub struct Unpacker {
    /// Pre-created container cells, one per table slot.
    slots: Vec<Value>,
}

impl Unpacker {
    pub fn new(state: &PackedState) -> Result<Unpacker, PackError> {
        // Create every container empty first, then fill: references (and
        // cycles) can then resolve to the final Rc cells directly.
        let slots: Vec<Value> = state
            .objects
            .iter()
            .map(|object| match object {
                PackedObject::List(_) => Value::List(Rc::new(RefCell::new(Vec::new()))),
                PackedObject::Dict(_) => Value::Dict(Rc::new(RefCell::new(IndexMap::new()))),
            })
            .collect();
        let unpacker = Unpacker { slots };

        for (slot, object) in unpacker.slots.iter().zip(&state.objects) {
            match (slot, object) {
                (Value::List(cell), PackedObject::List(items)) => {
                    let items = items
                        .iter()
                        .map(|item| unpacker.unpack(item))
                        .collect::<Result<Vec<_>, _>>()?;
                    *cell.borrow_mut() = items;
                }
                (Value::Dict(cell), PackedObject::Dict(entries)) => {
                    let entries = entries
                        .iter()
                        .map(|(key, item)| Ok((key.clone(), unpacker.unpack(item)?)))
                        .collect::<Result<IndexMap<_, _>, PackError>>()?;
                    *cell.borrow_mut() = entries;
                }
                _ => unreachable!("slot kinds match the objects they were built from"),
            }
        }
        Ok(unpacker)
    }

    pub fn unpack(&self, value: &PackedValue) -> Result<Value, PackError> {
        match value {
            PackedValue::None => Ok(Value::None),
            PackedValue::Bool(b) => Ok(Value::Bool(*b)),
            PackedValue::Int(i) => Ok(Value::Int(*i)),
            PackedValue::Float(f) => Ok(Value::Float(*f)),
            PackedValue::Str(s) => Ok(Value::str(s.clone())),
            PackedValue::Tuple(items) => {
                let items = items
                    .iter()
                    .map(|item| self.unpack(item))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::Tuple(Rc::new(items)))
            }
            PackedValue::Builtin(name) => Builtin::from_name(name)
                .map(Value::Builtin)
                .ok_or_else(|| PackError::Invalid(format!("unknown builtin '{}'", name))),
            PackedValue::Ref(index) => self
                .slots
                .get(*index)
                .cloned()
                .ok_or_else(|| PackError::Invalid(format!("dangling object ref {}", index))),
        }
    }

    pub fn unpack_namespace(
        &self,
        variables: &[(String, PackedValue)],
    ) -> Result<Namespace, PackError> {
        let ns = new_namespace();
        for (name, value) in variables {
            ns.borrow_mut().insert(name.clone(), self.unpack(value)?);
        }
        Ok(ns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Method;

    fn roundtrip_namespace(ns: &Namespace) -> Namespace {
        let mut packer = Packer::new();
        let globals = packer.pack_namespace(ns).unwrap();
        let state = PackedState {
            objects: packer.into_objects(),
            globals,
            groups: Vec::new(),
        };
        let bytes = state.encode().unwrap();
        let state = PackedState::decode(&bytes).unwrap();
        let unpacker = Unpacker::new(&state).unwrap();
        unpacker.unpack_namespace(&state.globals).unwrap()
    }

    #[test]
    fn test_scalars_roundtrip() {
        let ns = new_namespace();
        {
            let mut ns = ns.borrow_mut();
            ns.insert("a".to_string(), Value::Int(3));
            ns.insert("b".to_string(), Value::Float(2.5));
            ns.insert("c".to_string(), Value::str("hi"));
            ns.insert("d".to_string(), Value::None);
            ns.insert("e".to_string(), Value::Bool(true));
            ns.insert("f".to_string(), Value::Builtin(Builtin::Print));
        }

        let restored = roundtrip_namespace(&ns);
        let restored = restored.borrow();
        assert!(matches!(restored["a"], Value::Int(3)));
        assert!(matches!(restored["b"], Value::Float(f) if f == 2.5));
        assert!(matches!(&restored["c"], Value::Str(s) if &**s == "hi"));
        assert!(matches!(restored["d"], Value::None));
        assert!(matches!(restored["e"], Value::Bool(true)));
        assert!(matches!(restored["f"], Value::Builtin(Builtin::Print)));
    }

    #[test]
    fn test_nested_containers_roundtrip() {
        let ns = new_namespace();
        let mut entries = IndexMap::new();
        entries.insert("xs".to_string(), Value::list(vec![Value::Int(1), Value::Int(2)]));
        ns.borrow_mut()
            .insert("d".to_string(), Value::dict(entries));

        let restored = roundtrip_namespace(&ns);
        let restored = restored.borrow();
        let Value::Dict(dict) = &restored["d"] else {
            panic!("expected dict");
        };
        let dict = dict.borrow();
        let Value::List(items) = &dict["xs"] else {
            panic!("expected list");
        };
        assert_eq!(items.borrow().len(), 2);
    }

    #[test]
    fn test_aliasing_is_preserved() {
        let ns = new_namespace();
        let shared = Value::list(vec![Value::Int(1)]);
        ns.borrow_mut().insert("x".to_string(), shared.clone());
        ns.borrow_mut().insert("y".to_string(), shared);

        let restored = roundtrip_namespace(&ns);
        let restored = restored.borrow();
        let (Value::List(x), Value::List(y)) = (&restored["x"], &restored["y"]) else {
            panic!("expected lists");
        };
        assert!(Rc::ptr_eq(x, y));

        x.borrow_mut().push(Value::Int(2));
        assert_eq!(y.borrow().len(), 2);
    }

    #[test]
    fn test_cycle_roundtrip() {
        let ns = new_namespace();
        let inner = Rc::new(RefCell::new(Vec::new()));
        let list = Value::List(inner.clone());
        inner.borrow_mut().push(list.clone());
        ns.borrow_mut().insert("loop".to_string(), list);

        let restored = roundtrip_namespace(&ns);
        let restored = restored.borrow();
        let Value::List(outer) = &restored["loop"] else {
            panic!("expected list");
        };
        let items = outer.borrow();
        let Value::List(inner) = &items[0] else {
            panic!("expected nested list");
        };
        assert!(Rc::ptr_eq(outer, inner));
    }

    #[test]
    fn test_bound_method_fails_with_typed_error() {
        let ns = new_namespace();
        ns.borrow_mut().insert(
            "f".to_string(),
            Value::BoundMethod {
                receiver: Box::new(Value::list(vec![])),
                method: Method::ListAppend,
            },
        );

        let mut packer = Packer::new();
        let err = packer.pack_namespace(&ns).unwrap_err();
        assert!(matches!(err, PackError::Unsupported(_)));
    }

    #[test]
    fn test_groups_roundtrip_with_tree_position() {
        let globals = new_namespace();
        globals.borrow_mut().insert("g".to_string(), Value::Int(1));
        let group_ns = new_namespace();
        group_ns.borrow_mut().insert("x".to_string(), Value::Int(3));

        let mut packer = Packer::new();
        let packed_globals = packer.pack_namespace(&globals).unwrap();
        let group_id = Uuid::new_v4();
        let groups = vec![PackedGroup {
            id: group_id,
            name: "G1".to_string(),
            scope: ScopeKind::Own,
            parent: None,
            variables: packer.pack_namespace(&group_ns).unwrap(),
        }];
        let state = PackedState {
            objects: packer.into_objects(),
            globals: packed_globals,
            groups,
        };

        let decoded = PackedState::decode(&state.encode().unwrap()).unwrap();
        assert_eq!(decoded.groups.len(), 1);
        assert_eq!(decoded.groups[0].id, group_id);
        assert_eq!(decoded.groups[0].name, "G1");
        assert_eq!(decoded.groups[0].parent, None);

        let unpacker = Unpacker::new(&decoded).unwrap();
        let ns = unpacker.unpack_namespace(&decoded.groups[0].variables).unwrap();
        assert!(matches!(ns.borrow()["x"], Value::Int(3)));
    }
}
