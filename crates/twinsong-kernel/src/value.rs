//! Dynamic runtime values of the embedded language.
//!
//! Lists and dicts have reference identity (shared `Rc` cells) and may form
//! cycles; everything else behaves as an immutable scalar. Containers print
//! Python-style, including the elided form for self-referential values.

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;

/// A variable namespace: an insertion-ordered map shared by reference.
pub type Namespace = Rc<RefCell<IndexMap<String, Value>>>;

pub fn new_namespace() -> Namespace {
    Rc::new(RefCell::new(IndexMap::new()))
}

/// True when both handles refer to the same underlying map.
pub fn same_namespace(a: &Namespace, b: &Namespace) -> bool {
    Rc::ptr_eq(a, b)
}

/// Builtin functions reachable by name from any namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Print,
    Len,
    Repr,
    Str,
    Range,
}

impl Builtin {
    pub fn name(&self) -> &'static str {
        match self {
            Builtin::Print => "print",
            Builtin::Len => "len",
            Builtin::Repr => "repr",
            Builtin::Str => "str",
            Builtin::Range => "range",
        }
    }

    pub fn from_name(name: &str) -> Option<Builtin> {
        match name {
            "print" => Some(Builtin::Print),
            "len" => Some(Builtin::Len),
            "repr" => Some(Builtin::Repr),
            "str" => Some(Builtin::Str),
            "range" => Some(Builtin::Range),
            _ => None,
        }
    }
}

/// Methods exposed on container values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    ListAppend,
    DictGet,
}

impl Method {
    pub fn name(&self) -> &'static str {
        match self {
            Method::ListAppend => "append",
            Method::DictGet => "get",
        }
    }
}

/// The `parent_scope` facade: reads resolve in the parent group's
/// namespace, writes land in the parent namespace and in the run globals.
#[derive(Debug, Clone, PartialEq)]
pub struct ScopeProxy {
    pub scope: Namespace,
    pub globals: Namespace,
}

/// A runtime value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    List(Rc<RefCell<Vec<Value>>>),
    Tuple(Rc<Vec<Value>>),
    Dict(Rc<RefCell<IndexMap<String, Value>>>),
    Builtin(Builtin),
    BoundMethod { receiver: Box<Value>, method: Method },
    ScopeProxy(ScopeProxy),
}

impl Value {
    pub fn str(text: impl Into<String>) -> Value {
        Value::Str(Rc::from(text.into().into_boxed_str()))
    }

    pub fn list(items: Vec<Value>) -> Value {
        Value::List(Rc::new(RefCell::new(items)))
    }

    pub fn dict(entries: IndexMap<String, Value>) -> Value {
        Value::Dict(Rc::new(RefCell::new(entries)))
    }

    /// The value's type name, as user code and jobjects see it.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
            Value::Dict(_) => "dict",
            Value::Builtin(_) | Value::BoundMethod { .. } => "function",
            Value::ScopeProxy(_) => "ScopeProxy",
        }
    }

    /// Address used for identity interning of containers. Scalars have no
    /// identity of their own.
    pub fn identity(&self) -> Option<usize> {
        match self {
            Value::List(cell) => Some(Rc::as_ptr(cell) as usize),
            Value::Dict(cell) => Some(Rc::as_ptr(cell) as usize),
            Value::Tuple(items) => Some(Rc::as_ptr(items) as *const u8 as usize),
            _ => None,
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.borrow().is_empty(),
            Value::Tuple(items) => !items.is_empty(),
            Value::Dict(entries) => !entries.borrow().is_empty(),
            Value::Builtin(_) | Value::BoundMethod { .. } | Value::ScopeProxy(_) => true,
        }
    }

    /// Python-style `repr`.
    pub fn repr(&self) -> String {
        let mut seen = Vec::new();
        self.repr_with(&mut seen)
    }

    fn repr_with(&self, seen: &mut Vec<usize>) -> String {
        match self {
            Value::None => "None".to_string(),
            Value::Bool(true) => "True".to_string(),
            Value::Bool(false) => "False".to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => float_repr(*f),
            Value::Str(s) => str_repr(s),
            Value::List(items) => {
                let ptr = Rc::as_ptr(items) as usize;
                if seen.contains(&ptr) {
                    return "[...]".to_string();
                }
                seen.push(ptr);
                let body = items
                    .borrow()
                    .iter()
                    .map(|item| item.repr_with(seen))
                    .collect::<Vec<_>>()
                    .join(", ");
                seen.pop();
                format!("[{}]", body)
            }
            Value::Tuple(items) => {
                let ptr = Rc::as_ptr(items) as *const u8 as usize;
                if seen.contains(&ptr) {
                    return "(...)".to_string();
                }
                seen.push(ptr);
                let parts: Vec<_> = items.iter().map(|item| item.repr_with(seen)).collect();
                seen.pop();
                if parts.len() == 1 {
                    format!("({},)", parts[0])
                } else {
                    format!("({})", parts.join(", "))
                }
            }
            Value::Dict(entries) => {
                let ptr = Rc::as_ptr(entries) as usize;
                if seen.contains(&ptr) {
                    return "{...}".to_string();
                }
                seen.push(ptr);
                let body = entries
                    .borrow()
                    .iter()
                    .map(|(key, value)| format!("{}: {}", str_repr(key), value.repr_with(seen)))
                    .collect::<Vec<_>>()
                    .join(", ");
                seen.pop();
                format!("{{{}}}", body)
            }
            Value::Builtin(builtin) => format!("<built-in function {}>", builtin.name()),
            Value::BoundMethod { receiver, method } => format!(
                "<built-in method {} of {} object>",
                method.name(),
                receiver.type_name()
            ),
            Value::ScopeProxy(_) => "<parent scope>".to_string(),
        }
    }

    /// Python-style `str`: strings print raw, everything else as `repr`.
    pub fn str_value(&self) -> String {
        match self {
            Value::Str(s) => s.to_string(),
            other => other.repr(),
        }
    }

    /// Python-style equality. Numeric types compare across int/float/bool.
    pub fn py_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => {
                if Rc::ptr_eq(a, b) {
                    return true;
                }
                let a = a.borrow();
                let b = b.borrow();
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.py_eq(y))
            }
            (Value::Tuple(a), Value::Tuple(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.py_eq(y))
            }
            (Value::Dict(a), Value::Dict(b)) => {
                if Rc::ptr_eq(a, b) {
                    return true;
                }
                let a = a.borrow();
                let b = b.borrow();
                a.len() == b.len()
                    && a.iter()
                        .all(|(key, value)| b.get(key).is_some_and(|v| value.py_eq(v)))
            }
            (Value::Builtin(a), Value::Builtin(b)) => a == b,
            _ => match (self.as_number(), other.as_number()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }

    /// Numeric view of ints, floats and bools.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }
}

/// Python float repr: always shows a fractional part for whole numbers.
pub fn float_repr(f: f64) -> String {
    if f.is_nan() {
        "nan".to_string()
    } else if f.is_infinite() {
        if f > 0.0 { "inf".to_string() } else { "-inf".to_string() }
    } else {
        format!("{:?}", f)
    }
}

/// Python string repr: single-quoted unless the text itself contains a
/// single quote (and no double quote).
pub fn str_repr(s: &str) -> String {
    let quote = if s.contains('\'') && !s.contains('"') {
        '"'
    } else {
        '\''
    };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}
