//! Jobject builder: structured JSON descriptions of runtime values.
//!
//! A jobject document is `{root, objects}` where `objects` holds one entry
//! per reachable object: `{id, kind?, repr, value_type?, children?}`.
//! Containers are interned by identity, so shared and self-referential
//! values appear exactly once and cycles terminate.

use std::collections::HashMap;

use serde::Serialize;
use uuid::Uuid;

use crate::value::{Value, float_repr, str_repr};

/// Lists at most this long keep their inline repr; longer ones show
/// `"N items"`. Tunable independently of the dict threshold.
pub const LIST_INLINE_MAX: usize = 30;

/// Dicts at most this long keep their inline repr.
pub const DICT_INLINE_MAX: usize = 15;

#[derive(Debug, Serialize)]
struct JObjectDoc {
    root: Uuid,
    objects: Vec<JObjectEntry>,
}

#[derive(Debug, Serialize)]
struct JObjectEntry {
    id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    kind: Option<&'static str>,
    repr: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    value_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    children: Option<Vec<(String, Uuid)>>,
}

/// Serialize a value into jobject JSON.
pub fn create_jobject(value: &Value) -> String {
    let mut builder = Builder {
        objects: Vec::new(),
        interned: HashMap::new(),
        in_progress: Vec::new(),
    };
    let root = builder.build(value);
    let doc = JObjectDoc {
        root,
        objects: builder.objects,
    };
    serde_json::to_string(&doc).unwrap_or_else(|_| "{}".to_string())
}

struct Builder {
    objects: Vec<JObjectEntry>,
    /// Container address → already-emitted id.
    interned: HashMap<usize, Uuid>,
    /// Containers currently being described, for cycle-aware typing.
    in_progress: Vec<usize>,
}

impl Builder {
    fn build(&mut self, value: &Value) -> Uuid {
        if let Some(addr) = value.identity() {
            if let Some(id) = self.interned.get(&addr) {
                return *id;
            }
        }

        let id = Uuid::new_v4();
        if let Some(addr) = value.identity() {
            self.interned.insert(addr, id);
            self.in_progress.push(addr);
        }

        let entry = self.describe(id, value);

        if value.identity().is_some() {
            self.in_progress.pop();
        }
        self.objects.push(entry);
        id
    }

    fn describe(&mut self, id: Uuid, value: &Value) -> JObjectEntry {
        match value {
            Value::None => JObjectEntry {
                id,
                kind: Some("null"),
                repr: "None".to_string(),
                value_type: None,
                children: None,
            },
            Value::Bool(b) => JObjectEntry {
                id,
                kind: Some("bool"),
                repr: if *b { "True" } else { "False" }.to_string(),
                value_type: Some("bool".to_string()),
                children: None,
            },
            Value::Int(i) => JObjectEntry {
                id,
                kind: Some("number"),
                repr: i.to_string(),
                value_type: Some("int".to_string()),
                children: None,
            },
            Value::Float(f) => JObjectEntry {
                id,
                kind: Some("number"),
                repr: float_repr(*f),
                value_type: Some("float".to_string()),
                children: None,
            },
            Value::Str(s) => JObjectEntry {
                id,
                kind: Some("string"),
                repr: str_repr(s),
                value_type: Some("str".to_string()),
                children: None,
            },
            Value::List(items) => {
                let items = items.borrow();
                let repr = if items.len() > LIST_INLINE_MAX {
                    format!("{} items", items.len())
                } else {
                    value.repr()
                };
                let value_type = self.sequence_type("list", items.as_slice());
                let children = self.indexed_children(items.as_slice());
                JObjectEntry {
                    id,
                    kind: Some("list"),
                    repr,
                    value_type: Some(value_type),
                    children: Some(children),
                }
            }
            Value::Tuple(items) => {
                let value_type = self.sequence_type("tuple", items.as_slice());
                let children = self.indexed_children(items.as_slice());
                JObjectEntry {
                    id,
                    kind: Some("tuple"),
                    repr: value.repr(),
                    value_type: Some(value_type),
                    children: Some(children),
                }
            }
            Value::Dict(entries) => {
                let entries = entries.borrow();
                let repr = if entries.len() > DICT_INLINE_MAX {
                    format!("{} items", entries.len())
                } else {
                    value.repr()
                };
                let value_type = self.dict_type(entries.values());
                let children = entries
                    .iter()
                    .map(|(key, child)| (key.clone(), self.build(child)))
                    .collect::<Vec<_>>();
                JObjectEntry {
                    id,
                    kind: Some("dict"),
                    repr,
                    value_type: Some(value_type),
                    children: Some(children),
                }
            }
            Value::Builtin(_) | Value::BoundMethod { .. } => JObjectEntry {
                id,
                kind: Some("callable"),
                repr: value.repr(),
                value_type: Some("function".to_string()),
                children: None,
            },
            // Anything without a dedicated row: repr + type name only.
            Value::ScopeProxy(_) => JObjectEntry {
                id,
                kind: None,
                repr: value.repr(),
                value_type: Some(value.type_name().to_string()),
                children: None,
            },
        }
    }

    fn indexed_children(&mut self, items: &[Value]) -> Vec<(String, Uuid)> {
        items
            .iter()
            .enumerate()
            .map(|(index, child)| (index.to_string(), self.build(child)))
            .collect()
    }

    /// `list[T]` / `tuple[T]` when every element has the same concrete
    /// type; the bare container name otherwise. An element still being
    /// described (a cycle back into this container) has no settled type,
    /// so cyclic containers fall back to the bare name.
    fn sequence_type(&self, base: &str, items: &[Value]) -> String {
        match self.homogeneous_type(items.iter()) {
            Some(element) => format!("{}[{}]", base, element),
            None => base.to_string(),
        }
    }

    fn dict_type<'a>(&self, values: impl Iterator<Item = &'a Value>) -> String {
        match self.homogeneous_type(values) {
            Some(element) => format!("dict[str, {}]", element),
            None => "dict".to_string(),
        }
    }

    fn homogeneous_type<'a>(
        &self,
        mut items: impl Iterator<Item = &'a Value>,
    ) -> Option<&'static str> {
        let first = items.next()?;
        if self.is_in_progress(first) {
            return None;
        }
        let expected = first.type_name();
        for item in items {
            if self.is_in_progress(item) || item.type_name() != expected {
                return None;
            }
        }
        Some(expected)
    }

    fn is_in_progress(&self, value: &Value) -> bool {
        value
            .identity()
            .is_some_and(|addr| self.in_progress.contains(&addr))
    }
}
