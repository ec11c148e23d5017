//! Evaluator and the code-executor entry point.
//!
//! [`run_code`] is the kernel-side contract for executing one code
//! fragment against a `(globals, locals)` namespace pair: parse once,
//! optionally split off a trailing bare expression so its value can be
//! captured, thread the stdout sink through evaluation, and keep the
//! `parent_scope` proxy bound only for the duration of the fragment.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::ast::{BinOp, BoolOp, CmpOp, Expr, Program, Stmt, Target, UnaryOp};
use crate::parser::parse;
use crate::value::{Builtin, Method, Namespace, ScopeProxy, Value, same_namespace, str_repr};

/// A raised user-level error, carrying its Python-style exception class.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecError {
    pub kind: String,
    pub message: String,
}

impl ExecError {
    pub fn new(kind: &str, message: impl Into<String>) -> Self {
        ExecError {
            kind: kind.to_string(),
            message: message.into(),
        }
    }

    pub fn syntax(line: u32, message: impl Into<String>) -> Self {
        ExecError {
            kind: "SyntaxError".to_string(),
            message: format!("{} (line {})", message.into(), line),
        }
    }

    pub fn name_error(name: &str) -> Self {
        ExecError::new("NameError", format!("name '{}' is not defined", name))
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        ExecError::new("TypeError", message)
    }

    /// Format the way a traceback reaches an output cell.
    pub fn traceback(&self) -> String {
        format!(
            "Traceback (most recent call last):\n  File \"<cell>\", in <module>\n{}",
            self
        )
    }
}

impl fmt::Display for ExecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

pub type ExecResult<T> = Result<T, ExecError>;

/// Evaluation context for one fragment.
struct Interp<'a> {
    globals: Namespace,
    locals: Namespace,
    sink: &'a mut dyn FnMut(&str),
}

/// Execute a fragment against `(globals, locals)`.
///
/// When `parent` is given (the enclosing namespace is distinct from its
/// parent's), a `parent_scope` proxy is bound in `locals` for the duration
/// of the call and removed afterwards on every exit path, unless user code
/// rebound the name itself.
///
/// With `capture_last` set, a trailing bare expression is evaluated
/// separately and its value returned; otherwise the result is `None`.
pub fn run_code(
    source: &str,
    globals: &Namespace,
    parent: Option<&Namespace>,
    locals: &Namespace,
    sink: &mut dyn FnMut(&str),
    capture_last: bool,
) -> ExecResult<Option<Value>> {
    let program = parse(source)?;

    let proxy = match parent {
        Some(parent) if !locals.borrow().contains_key("parent_scope") => {
            let proxy = ScopeProxy {
                scope: parent.clone(),
                globals: globals.clone(),
            };
            locals
                .borrow_mut()
                .insert("parent_scope".to_string(), Value::ScopeProxy(proxy.clone()));
            Some(proxy)
        }
        _ => None,
    };

    let result = run_program(program, globals, locals, sink, capture_last);

    if let Some(proxy) = proxy {
        let still_ours = matches!(
            locals.borrow().get("parent_scope"),
            Some(Value::ScopeProxy(current)) if same_namespace(&current.scope, &proxy.scope)
        );
        if still_ours {
            locals.borrow_mut().shift_remove("parent_scope");
        }
    }

    result
}

fn run_program(
    program: Program,
    globals: &Namespace,
    locals: &Namespace,
    sink: &mut dyn FnMut(&str),
    capture_last: bool,
) -> ExecResult<Option<Value>> {
    let mut interp = Interp {
        globals: globals.clone(),
        locals: locals.clone(),
        sink,
    };

    if !capture_last {
        interp.exec_block(&program.body)?;
        return Ok(None);
    }

    let (body, trailing) = program.split_trailing_expr();
    interp.exec_block(&body)?;
    match trailing {
        Some(expr) => Ok(Some(interp.eval(&expr)?)),
        None => Ok(None),
    }
}

impl Interp<'_> {
    fn exec_block(&mut self, stmts: &[Stmt]) -> ExecResult<()> {
        for stmt in stmts {
            self.exec_stmt(stmt)?;
        }
        Ok(())
    }

    fn exec_stmt(&mut self, stmt: &Stmt) -> ExecResult<()> {
        match stmt {
            Stmt::Expr(expr) => {
                self.eval(expr)?;
                Ok(())
            }
            Stmt::Assign { target, value } => {
                let value = self.eval(value)?;
                self.assign(target, value)
            }
            Stmt::If { branches, orelse } => {
                for (cond, body) in branches {
                    if self.eval(cond)?.truthy() {
                        return self.exec_block(body);
                    }
                }
                self.exec_block(orelse)
            }
            Stmt::While { cond, body } => {
                while self.eval(cond)?.truthy() {
                    self.exec_block(body)?;
                }
                Ok(())
            }
            Stmt::For { name, iter, body } => {
                let iterable = self.eval(iter)?;
                let items = self.iterate(&iterable)?;
                for item in items {
                    self.locals.borrow_mut().insert(name.clone(), item);
                    self.exec_block(body)?;
                }
                Ok(())
            }
            Stmt::Pass => Ok(()),
        }
    }

    fn assign(&mut self, target: &Target, value: Value) -> ExecResult<()> {
        match target {
            Target::Name(name) => {
                self.locals.borrow_mut().insert(name.clone(), value);
                Ok(())
            }
            Target::Attr { value: object, name } => {
                let object = self.eval(object)?;
                match object {
                    Value::ScopeProxy(proxy) => {
                        // Writes land in the parent namespace and shadow
                        // into the run globals.
                        proxy
                            .scope
                            .borrow_mut()
                            .insert(name.clone(), value.clone());
                        proxy.globals.borrow_mut().insert(name.clone(), value);
                        Ok(())
                    }
                    other => Err(ExecError::new(
                        "AttributeError",
                        format!(
                            "'{}' object attribute '{}' is read-only",
                            other.type_name(),
                            name
                        ),
                    )),
                }
            }
            Target::Subscript { value: object, index } => {
                let object = self.eval(object)?;
                let index = self.eval(index)?;
                match object {
                    Value::List(items) => {
                        let mut items = items.borrow_mut();
                        let idx = resolve_index(&index, items.len())?;
                        items[idx] = value;
                        Ok(())
                    }
                    Value::Dict(entries) => {
                        let key = dict_key(&index)?;
                        entries.borrow_mut().insert(key, value);
                        Ok(())
                    }
                    other => Err(ExecError::type_error(format!(
                        "'{}' object does not support item assignment",
                        other.type_name()
                    ))),
                }
            }
        }
    }

    fn eval(&mut self, expr: &Expr) -> ExecResult<Value> {
        match expr {
            Expr::None => Ok(Value::None),
            Expr::True => Ok(Value::Bool(true)),
            Expr::False => Ok(Value::Bool(false)),
            Expr::Int(value) => Ok(Value::Int(*value)),
            Expr::Float(value) => Ok(Value::Float(*value)),
            Expr::Str(value) => Ok(Value::str(value.clone())),
            Expr::Name(name) => self.lookup(name),
            Expr::List(items) => {
                let items = items
                    .iter()
                    .map(|item| self.eval(item))
                    .collect::<ExecResult<Vec<_>>>()?;
                Ok(Value::list(items))
            }
            Expr::Tuple(items) => {
                let items = items
                    .iter()
                    .map(|item| self.eval(item))
                    .collect::<ExecResult<Vec<_>>>()?;
                Ok(Value::Tuple(Rc::new(items)))
            }
            Expr::Dict(entries) => {
                let mut map = IndexMap::new();
                for (key, value) in entries {
                    let key = dict_key(&self.eval(key)?)?;
                    let value = self.eval(value)?;
                    map.insert(key, value);
                }
                Ok(Value::dict(map))
            }
            Expr::Attr { value, name } => {
                let object = self.eval(value)?;
                self.get_attr(&object, name)
            }
            Expr::Subscript { value, index } => {
                let object = self.eval(value)?;
                let index = self.eval(index)?;
                self.get_item(&object, &index)
            }
            Expr::Call { func, args } => {
                let func = self.eval(func)?;
                let args = args
                    .iter()
                    .map(|arg| self.eval(arg))
                    .collect::<ExecResult<Vec<_>>>()?;
                self.call(func, args)
            }
            Expr::Unary { op, operand } => {
                let operand = self.eval(operand)?;
                match op {
                    UnaryOp::Not => Ok(Value::Bool(!operand.truthy())),
                    UnaryOp::Neg => match operand {
                        Value::Int(i) => i
                            .checked_neg()
                            .map(Value::Int)
                            .ok_or_else(|| ExecError::new("OverflowError", "integer overflow")),
                        Value::Float(f) => Ok(Value::Float(-f)),
                        Value::Bool(b) => Ok(Value::Int(if b { -1 } else { 0 })),
                        other => Err(ExecError::type_error(format!(
                            "bad operand type for unary -: '{}'",
                            other.type_name()
                        ))),
                    },
                }
            }
            Expr::Binary { op, left, right } => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                binary_op(*op, &left, &right)
            }
            Expr::Compare { op, left, right } => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                compare_op(*op, &left, &right)
            }
            Expr::Bool { op, left, right } => {
                let left = self.eval(left)?;
                match op {
                    BoolOp::And if !left.truthy() => Ok(left),
                    BoolOp::Or if left.truthy() => Ok(left),
                    _ => self.eval(right),
                }
            }
        }
    }

    /// Name resolution order: locals, then globals, then builtins.
    fn lookup(&self, name: &str) -> ExecResult<Value> {
        if let Some(value) = self.locals.borrow().get(name) {
            return Ok(value.clone());
        }
        if !same_namespace(&self.locals, &self.globals) {
            if let Some(value) = self.globals.borrow().get(name) {
                return Ok(value.clone());
            }
        }
        if let Some(builtin) = Builtin::from_name(name) {
            return Ok(Value::Builtin(builtin));
        }
        Err(ExecError::name_error(name))
    }

    fn get_attr(&self, object: &Value, name: &str) -> ExecResult<Value> {
        match object {
            Value::ScopeProxy(proxy) => match proxy.scope.borrow().get(name) {
                Some(value) => Ok(value.clone()),
                None => Err(ExecError::new(
                    "AttributeError",
                    format!("parent scope has no attribute '{}'", name),
                )),
            },
            Value::List(_) if name == "append" => Ok(Value::BoundMethod {
                receiver: Box::new(object.clone()),
                method: Method::ListAppend,
            }),
            Value::Dict(_) if name == "get" => Ok(Value::BoundMethod {
                receiver: Box::new(object.clone()),
                method: Method::DictGet,
            }),
            other => Err(ExecError::new(
                "AttributeError",
                format!("'{}' object has no attribute '{}'", other.type_name(), name),
            )),
        }
    }

    fn get_item(&self, object: &Value, index: &Value) -> ExecResult<Value> {
        match object {
            Value::List(items) => {
                let items = items.borrow();
                let idx = resolve_index(index, items.len())?;
                Ok(items[idx].clone())
            }
            Value::Tuple(items) => {
                let idx = resolve_index(index, items.len())?;
                Ok(items[idx].clone())
            }
            Value::Str(s) => {
                let chars: Vec<char> = s.chars().collect();
                let idx = resolve_index(index, chars.len())?;
                Ok(Value::str(chars[idx].to_string()))
            }
            Value::Dict(entries) => {
                let key = dict_key(index)?;
                entries
                    .borrow()
                    .get(&key)
                    .cloned()
                    .ok_or_else(|| ExecError::new("KeyError", str_repr(&key)))
            }
            other => Err(ExecError::type_error(format!(
                "'{}' object is not subscriptable",
                other.type_name()
            ))),
        }
    }

    fn call(&mut self, func: Value, args: Vec<Value>) -> ExecResult<Value> {
        match func {
            Value::Builtin(builtin) => self.call_builtin(builtin, args),
            Value::BoundMethod { receiver, method } => match (method, &*receiver) {
                (Method::ListAppend, Value::List(items)) => {
                    expect_arity("append", &args, 1)?;
                    items.borrow_mut().push(args.into_iter().next().unwrap());
                    Ok(Value::None)
                }
                (Method::DictGet, Value::Dict(entries)) => {
                    if args.is_empty() || args.len() > 2 {
                        return Err(ExecError::type_error(format!(
                            "get expected 1 or 2 arguments, got {}",
                            args.len()
                        )));
                    }
                    let key = dict_key(&args[0])?;
                    match entries.borrow().get(&key) {
                        Some(value) => Ok(value.clone()),
                        None => Ok(args.into_iter().nth(1).unwrap_or(Value::None)),
                    }
                }
                _ => Err(ExecError::type_error("invalid bound method")),
            },
            other => Err(ExecError::type_error(format!(
                "'{}' object is not callable",
                other.type_name()
            ))),
        }
    }

    fn call_builtin(&mut self, builtin: Builtin, args: Vec<Value>) -> ExecResult<Value> {
        match builtin {
            Builtin::Print => {
                let text = args
                    .iter()
                    .map(|arg| arg.str_value())
                    .collect::<Vec<_>>()
                    .join(" ");
                // Two writes, as Python's print performs: the text, then
                // the line terminator. Each becomes its own output chunk.
                (self.sink)(&text);
                (self.sink)("\n");
                Ok(Value::None)
            }
            Builtin::Len => {
                expect_arity("len", &args, 1)?;
                let len = match &args[0] {
                    Value::Str(s) => s.chars().count(),
                    Value::List(items) => items.borrow().len(),
                    Value::Tuple(items) => items.len(),
                    Value::Dict(entries) => entries.borrow().len(),
                    other => {
                        return Err(ExecError::type_error(format!(
                            "object of type '{}' has no len()",
                            other.type_name()
                        )));
                    }
                };
                Ok(Value::Int(len as i64))
            }
            Builtin::Repr => {
                expect_arity("repr", &args, 1)?;
                Ok(Value::str(args[0].repr()))
            }
            Builtin::Str => {
                expect_arity("str", &args, 1)?;
                Ok(Value::str(args[0].str_value()))
            }
            Builtin::Range => {
                let (start, stop) = match args.len() {
                    1 => (0, int_arg("range", &args[0])?),
                    2 => (int_arg("range", &args[0])?, int_arg("range", &args[1])?),
                    n => {
                        return Err(ExecError::type_error(format!(
                            "range expected 1 or 2 arguments, got {}",
                            n
                        )));
                    }
                };
                Ok(Value::list((start..stop).map(Value::Int).collect()))
            }
        }
    }

    fn iterate(&self, value: &Value) -> ExecResult<Vec<Value>> {
        match value {
            Value::List(items) => Ok(items.borrow().clone()),
            Value::Tuple(items) => Ok(items.as_ref().clone()),
            Value::Str(s) => Ok(s.chars().map(|c| Value::str(c.to_string())).collect()),
            Value::Dict(entries) => Ok(entries
                .borrow()
                .keys()
                .map(|key| Value::str(key.clone()))
                .collect()),
            other => Err(ExecError::type_error(format!(
                "'{}' object is not iterable",
                other.type_name()
            ))),
        }
    }
}

fn expect_arity(name: &str, args: &[Value], arity: usize) -> ExecResult<()> {
    if args.len() != arity {
        return Err(ExecError::type_error(format!(
            "{}() takes exactly {} argument ({} given)",
            name,
            arity,
            args.len()
        )));
    }
    Ok(())
}

fn int_arg(name: &str, value: &Value) -> ExecResult<i64> {
    match value {
        Value::Int(i) => Ok(*i),
        Value::Bool(b) => Ok(if *b { 1 } else { 0 }),
        other => Err(ExecError::type_error(format!(
            "'{}' object cannot be interpreted as an integer (in {})",
            other.type_name(),
            name
        ))),
    }
}

fn resolve_index(index: &Value, len: usize) -> ExecResult<usize> {
    let idx = match index {
        Value::Int(i) => *i,
        Value::Bool(b) => {
            if *b {
                1
            } else {
                0
            }
        }
        other => {
            return Err(ExecError::type_error(format!(
                "indices must be integers, not '{}'",
                other.type_name()
            )));
        }
    };
    let resolved = if idx < 0 {
        idx.checked_add(len as i64).unwrap_or(-1)
    } else {
        idx
    };
    if resolved < 0 || resolved as usize >= len {
        return Err(ExecError::new("IndexError", "index out of range"));
    }
    Ok(resolved as usize)
}

fn dict_key(value: &Value) -> ExecResult<String> {
    match value {
        Value::Str(s) => Ok(s.to_string()),
        other => Err(ExecError::type_error(format!(
            "dict keys must be strings, not '{}'",
            other.type_name()
        ))),
    }
}

fn binary_op(op: BinOp, left: &Value, right: &Value) -> ExecResult<Value> {
    // Non-numeric `+` concatenates sequences.
    if op == BinOp::Add {
        match (left, right) {
            (Value::Str(a), Value::Str(b)) => {
                return Ok(Value::str(format!("{}{}", a, b)));
            }
            (Value::List(a), Value::List(b)) => {
                let mut items = a.borrow().clone();
                items.extend(b.borrow().iter().cloned());
                return Ok(Value::list(items));
            }
            (Value::Tuple(a), Value::Tuple(b)) => {
                let mut items = a.as_ref().clone();
                items.extend(b.iter().cloned());
                return Ok(Value::Tuple(Rc::new(items)));
            }
            _ => {}
        }
    }

    let type_error = || {
        ExecError::type_error(format!(
            "unsupported operand type(s) for {}: '{}' and '{}'",
            op.symbol(),
            left.type_name(),
            right.type_name()
        ))
    };

    match (as_int(left), as_int(right)) {
        (Some(a), Some(b)) => int_binary_op(op, a, b),
        _ => {
            let a = left.as_number().ok_or_else(type_error)?;
            let b = right.as_number().ok_or_else(type_error)?;
            float_binary_op(op, a, b)
        }
    }
}

/// Integer view of ints and bools (Python bools are ints).
fn as_int(value: &Value) -> Option<i64> {
    match value {
        Value::Int(i) => Some(*i),
        Value::Bool(b) => Some(if *b { 1 } else { 0 }),
        _ => None,
    }
}

fn int_binary_op(op: BinOp, a: i64, b: i64) -> ExecResult<Value> {
    let overflow = || ExecError::new("OverflowError", "integer overflow");
    match op {
        BinOp::Add => a.checked_add(b).map(Value::Int).ok_or_else(overflow),
        BinOp::Sub => a.checked_sub(b).map(Value::Int).ok_or_else(overflow),
        BinOp::Mul => a.checked_mul(b).map(Value::Int).ok_or_else(overflow),
        BinOp::Div => {
            if b == 0 {
                Err(ExecError::new("ZeroDivisionError", "division by zero"))
            } else {
                Ok(Value::Float(a as f64 / b as f64))
            }
        }
        BinOp::FloorDiv => {
            if b == 0 {
                return Err(ExecError::new(
                    "ZeroDivisionError",
                    "integer division or modulo by zero",
                ));
            }
            let q = a.checked_div(b).ok_or_else(overflow)?;
            let r = a - q * b;
            // Floor toward negative infinity, as Python does.
            Ok(Value::Int(if r != 0 && (r < 0) != (b < 0) { q - 1 } else { q }))
        }
        BinOp::Mod => {
            if b == 0 {
                return Err(ExecError::new(
                    "ZeroDivisionError",
                    "integer division or modulo by zero",
                ));
            }
            let m = a.checked_rem(b).ok_or_else(overflow)?;
            // Python modulo takes the divisor's sign.
            Ok(Value::Int(if m != 0 && (m < 0) != (b < 0) { m + b } else { m }))
        }
    }
}

fn float_binary_op(op: BinOp, a: f64, b: f64) -> ExecResult<Value> {
    match op {
        BinOp::Add => Ok(Value::Float(a + b)),
        BinOp::Sub => Ok(Value::Float(a - b)),
        BinOp::Mul => Ok(Value::Float(a * b)),
        BinOp::Div => {
            if b == 0.0 {
                Err(ExecError::new("ZeroDivisionError", "float division by zero"))
            } else {
                Ok(Value::Float(a / b))
            }
        }
        BinOp::FloorDiv => {
            if b == 0.0 {
                Err(ExecError::new("ZeroDivisionError", "float floor division by zero"))
            } else {
                Ok(Value::Float((a / b).floor()))
            }
        }
        BinOp::Mod => {
            if b == 0.0 {
                Err(ExecError::new("ZeroDivisionError", "float modulo"))
            } else {
                let m = a % b;
                Ok(Value::Float(if m != 0.0 && (m < 0.0) != (b < 0.0) {
                    m + b
                } else {
                    m
                }))
            }
        }
    }
}

fn compare_op(op: CmpOp, left: &Value, right: &Value) -> ExecResult<Value> {
    match op {
        CmpOp::Eq => return Ok(Value::Bool(left.py_eq(right))),
        CmpOp::NotEq => return Ok(Value::Bool(!left.py_eq(right))),
        _ => {}
    }

    let ordering = match (left, right) {
        (Value::Str(a), Value::Str(b)) => a.partial_cmp(b),
        _ => match (left.as_number(), right.as_number()) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => {
                return Err(ExecError::type_error(format!(
                    "'<' not supported between instances of '{}' and '{}'",
                    left.type_name(),
                    right.type_name()
                )));
            }
        },
    };

    let result = match (op, ordering) {
        (_, None) => false,
        (CmpOp::Lt, Some(ord)) => ord.is_lt(),
        (CmpOp::LtEq, Some(ord)) => ord.is_le(),
        (CmpOp::Gt, Some(ord)) => ord.is_gt(),
        (CmpOp::GtEq, Some(ord)) => ord.is_ge(),
        (CmpOp::Eq | CmpOp::NotEq, _) => unreachable!(),
    };
    Ok(Value::Bool(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::new_namespace;

    /// Run a fragment in a single shared namespace, collecting stdout.
    fn run(source: &str) -> (ExecResult<Option<Value>>, Vec<String>) {
        let ns = new_namespace();
        run_in(source, &ns)
    }

    fn run_in(source: &str, ns: &Namespace) -> (ExecResult<Option<Value>>, Vec<String>) {
        let mut chunks = Vec::new();
        let mut sink = |text: &str| chunks.push(text.to_string());
        let result = run_code(source, ns, None, ns, &mut sink, true);
        (result, chunks)
    }

    fn value_of(source: &str) -> Value {
        let (result, _) = run(source);
        result.unwrap().expect("expected a trailing expression value")
    }

    #[test]
    fn test_trailing_expression_is_captured() {
        assert!(matches!(value_of("1 + 2"), Value::Int(3)));
    }

    #[test]
    fn test_no_trailing_expression_returns_none() {
        let (result, _) = run("x = 5");
        assert_eq!(result.unwrap(), None);
    }

    #[test]
    fn test_empty_program_returns_none() {
        let (result, _) = run("");
        assert_eq!(result.unwrap(), None);
    }

    #[test]
    fn test_capture_last_false_discards_value() {
        let ns = new_namespace();
        let mut sink = |_: &str| {};
        let result = run_code("1 + 2", &ns, None, &ns, &mut sink, false).unwrap();
        assert_eq!(result, None);
    }

    #[test]
    fn test_print_produces_two_chunks_per_call() {
        let (_, chunks) = run("print('Hello')\nprint('World')");
        assert_eq!(chunks, vec!["Hello", "\n", "World", "\n"]);
    }

    #[test]
    fn test_print_joins_arguments_with_spaces() {
        let (_, chunks) = run("print(1, 'two', 3.0)");
        assert_eq!(chunks, vec!["1 two 3.0", "\n"]);
    }

    #[test]
    fn test_statements_share_namespace() {
        assert!(matches!(value_of("x = 10\nx"), Value::Int(10)));
    }

    #[test]
    fn test_locals_fall_back_to_globals() {
        let globals = new_namespace();
        globals.borrow_mut().insert("x".to_string(), Value::Int(7));
        let locals = new_namespace();
        let mut sink = |_: &str| {};
        let result = run_code("x + 1", &globals, None, &locals, &mut sink, true)
            .unwrap()
            .unwrap();
        assert!(matches!(result, Value::Int(8)));
    }

    #[test]
    fn test_assignments_go_to_locals_not_globals() {
        let globals = new_namespace();
        let locals = new_namespace();
        let mut sink = |_: &str| {};
        run_code("y = 1", &globals, None, &locals, &mut sink, false).unwrap();
        assert!(locals.borrow().contains_key("y"));
        assert!(!globals.borrow().contains_key("y"));
    }

    #[test]
    fn test_parent_scope_reads_parent_and_writes_both() {
        let globals = new_namespace();
        let parent = new_namespace();
        parent.borrow_mut().insert("x".to_string(), Value::Int(3));
        let locals = new_namespace();
        let mut sink = |_: &str| {};

        let result = run_code(
            "parent_scope.x = 10; x = x - 6",
            &globals,
            Some(&parent),
            &locals,
            &mut sink,
            false,
        );
        result.unwrap();

        assert!(matches!(parent.borrow()["x"], Value::Int(10)));
        assert!(matches!(globals.borrow()["x"], Value::Int(10)));
        assert!(matches!(locals.borrow()["x"], Value::Int(4)));
    }

    #[test]
    fn test_parent_scope_is_removed_after_execution() {
        let globals = new_namespace();
        let parent = new_namespace();
        let locals = new_namespace();
        let mut sink = |_: &str| {};
        run_code("x = 1", &globals, Some(&parent), &locals, &mut sink, false).unwrap();
        assert!(!locals.borrow().contains_key("parent_scope"));
    }

    #[test]
    fn test_parent_scope_is_removed_on_error_paths() {
        let globals = new_namespace();
        let parent = new_namespace();
        let locals = new_namespace();
        let mut sink = |_: &str| {};
        let result = run_code(
            "no_such_name",
            &globals,
            Some(&parent),
            &locals,
            &mut sink,
            true,
        );
        assert!(result.is_err());
        assert!(!locals.borrow().contains_key("parent_scope"));
    }

    #[test]
    fn test_user_rebound_parent_scope_is_kept() {
        let globals = new_namespace();
        let parent = new_namespace();
        let locals = new_namespace();
        let mut sink = |_: &str| {};
        run_code(
            "parent_scope = 5",
            &globals,
            Some(&parent),
            &locals,
            &mut sink,
            false,
        )
        .unwrap();
        assert!(matches!(locals.borrow()["parent_scope"], Value::Int(5)));
    }

    #[test]
    fn test_missing_parent_attribute_is_attribute_error() {
        let globals = new_namespace();
        let parent = new_namespace();
        let locals = new_namespace();
        let mut sink = |_: &str| {};
        let err = run_code(
            "parent_scope.missing",
            &globals,
            Some(&parent),
            &locals,
            &mut sink,
            true,
        )
        .unwrap_err();
        assert_eq!(err.kind, "AttributeError");
    }

    #[test]
    fn test_name_error() {
        let (result, _) = run("undefined_name");
        let err = result.unwrap_err();
        assert_eq!(err.kind, "NameError");
        assert_eq!(err.message, "name 'undefined_name' is not defined");
    }

    #[test]
    fn test_syntax_error_from_parse() {
        let (result, _) = run("x = ");
        assert_eq!(result.unwrap_err().kind, "SyntaxError");
    }

    #[test]
    fn test_division_semantics() {
        assert!(matches!(value_of("7 / 2"), Value::Float(f) if f == 3.5));
        assert!(matches!(value_of("7 // 2"), Value::Int(3)));
        assert!(matches!(value_of("-7 // 2"), Value::Int(-4)));
        assert!(matches!(value_of("7 % 3"), Value::Int(1)));
        assert!(matches!(value_of("-7 % 3"), Value::Int(2)));
    }

    #[test]
    fn test_zero_division() {
        let (result, _) = run("1 / 0");
        assert_eq!(result.unwrap_err().kind, "ZeroDivisionError");
    }

    #[test]
    fn test_integer_overflow_raises() {
        let (result, _) = run("9223372036854775807 + 1");
        assert_eq!(result.unwrap_err().kind, "OverflowError");
    }

    #[test]
    fn test_type_error_mentions_operand_types() {
        let (result, _) = run("1 + 'a'");
        let err = result.unwrap_err();
        assert_eq!(err.kind, "TypeError");
        assert!(err.message.contains("'int'"));
        assert!(err.message.contains("'str'"));
    }

    #[test]
    fn test_string_concat_and_comparison() {
        assert!(matches!(value_of("'ab' + 'cd'"), Value::Str(s) if &*s == "abcd"));
        assert!(matches!(value_of("'a' < 'b'"), Value::Bool(true)));
    }

    #[test]
    fn test_boolean_operators_return_operands() {
        assert!(matches!(value_of("0 or 5"), Value::Int(5)));
        assert!(matches!(value_of("3 and 7"), Value::Int(7)));
        assert!(matches!(value_of("0 and 7"), Value::Int(0)));
        assert!(matches!(value_of("not 0"), Value::Bool(true)));
    }

    #[test]
    fn test_inline_if_and_while() {
        assert!(matches!(
            value_of("x = 5\nif x > 3: y = 'big'\nelse: y = 'small'\ny"),
            Value::Str(s) if &*s == "big"
        ));
        assert!(matches!(
            value_of("total = 0\nwhile total < 5: total = total + 2\ntotal"),
            Value::Int(6)
        ));
    }

    #[test]
    fn test_for_loop_over_list_and_range() {
        assert!(matches!(
            value_of("total = 0\nfor i in [1, 2, 3]: total = total + i\ntotal"),
            Value::Int(6)
        ));
        assert!(matches!(
            value_of("total = 0\nfor i in range(4): total = total + i\ntotal"),
            Value::Int(6)
        ));
    }

    #[test]
    fn test_list_operations() {
        assert!(matches!(value_of("xs = [1, 2]\nxs.append(3)\nxs[2]"), Value::Int(3)));
        assert!(matches!(value_of("len([1, 2, 3])"), Value::Int(3)));
        assert!(matches!(value_of("[1, 2][-1]"), Value::Int(2)));

        let (result, _) = run("[1, 2][5]");
        assert_eq!(result.unwrap_err().kind, "IndexError");
    }

    #[test]
    fn test_dict_operations() {
        assert!(matches!(
            value_of("d = {'a': 1}\nd['b'] = 2\nd['b']"),
            Value::Int(2)
        ));
        assert!(matches!(
            value_of("{'a': 1}.get('missing', 9)"),
            Value::Int(9)
        ));

        let (result, _) = run("{'a': 1}['b']");
        let err = result.unwrap_err();
        assert_eq!(err.kind, "KeyError");
        assert_eq!(err.message, "'b'");
    }

    #[test]
    fn test_calling_non_callable() {
        let (result, _) = run("x = 4\nx()");
        let err = result.unwrap_err();
        assert_eq!(err.kind, "TypeError");
        assert!(err.message.contains("not callable"));
    }

    #[test]
    fn test_traceback_format() {
        let err = ExecError::name_error("x");
        let traceback = err.traceback();
        assert!(traceback.starts_with("Traceback (most recent call last):"));
        assert!(traceback.contains("File \"<cell>\""));
        assert!(traceback.ends_with("NameError: name 'x' is not defined"));
    }

    #[test]
    fn test_repr_and_str_builtins() {
        assert!(matches!(value_of("repr('hi')"), Value::Str(s) if &*s == "'hi'"));
        assert!(matches!(value_of("str(5.0)"), Value::Str(s) if &*s == "5.0"));
    }
}
