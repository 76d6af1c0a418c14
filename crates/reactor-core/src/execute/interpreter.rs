//! A tree-walking evaluator for the Python-subset grammar, over the AST
//! produced by [`crate::analyzer::parser`].
//!
//! Grounded on `original_source/Backend/executor.py::_execute_python_cell`,
//! which simply calls CPython's own `exec()` against a shared namespace dict.
//! This crate has no CPython to delegate to, so the statements and
//! expressions are walked directly against [`crate::env::Environment`].
//! Coverage is a deliberately practical subset rather than full language
//! fidelity — see `DESIGN.md` for exactly which builtins and attribute
//! methods are implemented versus left as a runtime `NameError`/
//! `AttributeError`-style failure.

use std::rc::Rc;

use crate::analyzer::ast::{BinOp, BoolOp, CmpOp, Comprehension, Expr, Stmt, UnaryOp};
use crate::env::{Environment, UserFunction};
use crate::value::{Table, Value};

/// A runtime failure, carrying both the user-facing message (`result.error`
/// in the prototype) and a short traceback-style frame list (`result.
/// error_traceback`). Frames are pushed as evaluation descends and are
/// displayed in that same order — outermost first, most recent last — the
/// way `traceback.format_exc()` reads.
#[derive(Debug, Clone)]
pub struct EvalError {
    pub message: String,
    pub frames: Vec<String>,
}

impl EvalError {
    pub fn new(message: impl Into<String>) -> Self {
        EvalError {
            message: message.into(),
            frames: Vec::new(),
        }
    }

    pub fn with_frame(mut self, frame: impl Into<String>) -> Self {
        self.frames.push(frame.into());
        self
    }

    pub fn format_trace(&self) -> String {
        let mut lines = vec!["Traceback (most recent call last):".to_string()];
        for frame in &self.frames {
            lines.push(format!("  {frame}"));
        }
        lines.push(self.message.clone());
        lines.join("\n")
    }
}

/// Non-local control flow raised while executing a statement block.
pub(crate) enum Flow {
    Error(EvalError),
    Break,
    Continue,
    Return(Value),
}

impl From<EvalError> for Flow {
    fn from(e: EvalError) -> Self {
        Flow::Error(e)
    }
}

type ExprResult = Result<Value, EvalError>;
type StmtResult = Result<(), Flow>;

/// Holds the mutable state threaded through one cell's evaluation: the
/// shared environment and the stdout buffer `print` writes into (the
/// in-process equivalent of the prototype's `contextlib.redirect_stdout`).
pub(crate) struct Interpreter<'a> {
    env: &'a mut Environment,
    pub stdout: String,
}

impl<'a> Interpreter<'a> {
    pub fn new(env: &'a mut Environment) -> Self {
        Interpreter {
            env,
            stdout: String::new(),
        }
    }

    pub fn run_block(&mut self, stmts: &[Stmt]) -> StmtResult {
        for stmt in stmts {
            self.exec_stmt(stmt)?;
        }
        Ok(())
    }

    fn exec_stmt(&mut self, stmt: &Stmt) -> StmtResult {
        match stmt {
            Stmt::Assign { targets, value } => {
                let v = self.eval(value)?;
                for t in targets {
                    self.assign(t, v.clone())?;
                }
                Ok(())
            }
            Stmt::AugAssign { target, op, value } => {
                let rhs = self.eval(value)?;
                if let Expr::Name(name) = target {
                    let current = self
                        .env
                        .get(name)
                        .cloned()
                        .ok_or_else(|| EvalError::new(format!("name '{name}' is not defined")))?;
                    let result = apply_binop(&current, op, &rhs)
                        .map_err(|e| e.with_frame(format!("{name} {op_text} ...", op_text = binop_text(op))))?;
                    self.env.set(name.clone(), result);
                    Ok(())
                } else {
                    Err(EvalError::new("augmented assignment target must be a name").into())
                }
            }
            Stmt::Expr(e) => {
                self.eval(e)?;
                Ok(())
            }
            Stmt::For { target, iter, body } => {
                let iterable = self.eval(iter)?;
                for item in iterate(&iterable)? {
                    self.assign(target, item)?;
                    match self.run_block(body) {
                        Ok(()) => {}
                        Err(Flow::Break) => break,
                        Err(Flow::Continue) => continue,
                        other => return other,
                    }
                }
                Ok(())
            }
            Stmt::While { test, body } => {
                while self.eval(test)?.is_truthy() {
                    match self.run_block(body) {
                        Ok(()) => {}
                        Err(Flow::Break) => break,
                        Err(Flow::Continue) => continue,
                        other => return other,
                    }
                }
                Ok(())
            }
            Stmt::If { test, body, orelse } => {
                if self.eval(test)?.is_truthy() {
                    self.run_block(body)
                } else {
                    self.run_block(orelse)
                }
            }
            Stmt::FunctionDef { name, params, body } => {
                self.env.set_function(
                    name.clone(),
                    UserFunction {
                        name: name.clone(),
                        params: params.clone(),
                        body: body.clone(),
                    },
                );
                Ok(())
            }
            Stmt::ClassDef { name, bases, body } => {
                let _ = body;
                for base in bases {
                    self.eval(base)?;
                }
                self.env.set(name.clone(), Value::Class(name.clone()));
                Ok(())
            }
            Stmt::Import { modules } => {
                for (module, alias) in modules {
                    let bound =
                        alias.clone().unwrap_or_else(|| module.split('.').next().unwrap_or(module).to_string());
                    if !self.env.contains(&bound) {
                        self.env.set(bound, Value::Module(module.clone()));
                    }
                }
                Ok(())
            }
            Stmt::ImportFrom { module, names } => {
                for (name, alias) in names {
                    if name == "*" {
                        continue;
                    }
                    let bound = alias.clone().unwrap_or_else(|| name.clone());
                    self.env.set(bound, Value::Module(format!("{module}.{name}")));
                }
                Ok(())
            }
            Stmt::Return(expr) => {
                let v = match expr {
                    Some(e) => self.eval(e)?,
                    None => Value::Null,
                };
                Err(Flow::Return(v))
            }
            Stmt::Pass => Ok(()),
            Stmt::Break => Err(Flow::Break),
            Stmt::Continue => Err(Flow::Continue),
        }
    }

    fn assign(&mut self, target: &Expr, value: Value) -> StmtResult {
        match target {
            Expr::Name(n) => {
                self.env.set(n.clone(), value);
                Ok(())
            }
            Expr::Tuple(items) | Expr::List(items) => {
                let values = match value {
                    Value::List(v) => v,
                    other => vec![other],
                };
                if values.len() != items.len() {
                    return Err(EvalError::new(format!(
                        "cannot unpack {} values into {} targets",
                        values.len(),
                        items.len()
                    ))
                    .into());
                }
                for (t, v) in items.iter().zip(values) {
                    self.assign(t, v)?;
                }
                Ok(())
            }
            other => Err(EvalError::new(format!("cannot assign to {other:?}")).into()),
        }
    }

    fn eval(&mut self, expr: &Expr) -> ExprResult {
        match expr {
            Expr::Name(n) => self
                .env
                .get(n)
                .cloned()
                .ok_or_else(|| EvalError::new(format!("name '{n}' is not defined"))),
            Expr::Int(i) => Ok(Value::Int(*i)),
            Expr::Float(f) => Ok(Value::Float(*f)),
            Expr::Str(s) => Ok(Value::String(s.clone())),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::NoneLit => Ok(Value::Null),
            Expr::Tuple(items) | Expr::List(items) => {
                let values = items.iter().map(|e| self.eval(e)).collect::<Result<_, _>>()?;
                Ok(Value::List(values))
            }
            Expr::Dict(pairs) => {
                let mut out = Vec::with_capacity(pairs.len());
                for (k, v) in pairs {
                    let key = self.eval(k)?.to_string();
                    let val = self.eval(v)?;
                    out.push((key, val));
                }
                Ok(Value::Map(out))
            }
            Expr::BinOp(l, op, r) => {
                let lv = self.eval(l)?;
                let rv = self.eval(r)?;
                apply_binop(&lv, op, &rv)
            }
            Expr::UnaryOp(op, e) => {
                let v = self.eval(e)?;
                apply_unary(op, &v)
            }
            Expr::Compare(first, rest) => {
                let mut left = self.eval(first)?;
                for (op, next_expr) in rest {
                    let right = self.eval(next_expr)?;
                    if !apply_cmp(op, &left, &right)? {
                        return Ok(Value::Bool(false));
                    }
                    left = right;
                }
                Ok(Value::Bool(true))
            }
            Expr::BoolOp(op, items) => {
                match op {
                    BoolOp::And => {
                        let mut last = Value::Bool(true);
                        for e in items {
                            last = self.eval(e)?;
                            if !last.is_truthy() {
                                return Ok(last);
                            }
                        }
                        Ok(last)
                    }
                    BoolOp::Or => {
                        let mut last = Value::Bool(false);
                        for e in items {
                            last = self.eval(e)?;
                            if last.is_truthy() {
                                return Ok(last);
                            }
                        }
                        Ok(last)
                    }
                }
            }
            Expr::Call { func, args } => self.eval_call(func, args),
            Expr::Attribute(base, name) => {
                let v = self.eval(base)?;
                builtins::attribute_value(&v, name)
            }
            Expr::Subscript(base, idx) => {
                let v = self.eval(base)?;
                let i = self.eval(idx)?;
                builtins::subscript(&v, &i)
            }
            Expr::ListComp { element, generators } => {
                let mut out = Vec::new();
                self.eval_comprehension(generators, &mut |me| {
                    out.push(me.eval(element)?);
                    Ok(())
                })?;
                Ok(Value::List(out))
            }
            Expr::SetComp { element, generators } => {
                let mut out: Vec<Value> = Vec::new();
                self.eval_comprehension(generators, &mut |me| {
                    let v = me.eval(element)?;
                    if !out.contains(&v) {
                        out.push(v);
                    }
                    Ok(())
                })?;
                Ok(Value::List(out))
            }
            Expr::DictComp { key, value, generators } => {
                let mut out: Vec<(String, Value)> = Vec::new();
                self.eval_comprehension(generators, &mut |me| {
                    let k = me.eval(key)?.to_string();
                    let v = me.eval(value)?;
                    out.retain(|(ek, _)| ek != &k);
                    out.push((k, v));
                    Ok(())
                })?;
                Ok(Value::Map(out))
            }
        }
    }

    fn eval_comprehension(
        &mut self,
        generators: &[Comprehension],
        body: &mut dyn FnMut(&mut Self) -> Result<(), EvalError>,
    ) -> Result<(), EvalError> {
        let Some((first, rest)) = generators.split_first() else {
            return body(self);
        };
        let iterable = self.eval(&first.iter)?;
        for item in iterate(&iterable)? {
            self.assign(&first.target, item).map_err(|flow| match flow {
                Flow::Error(e) => e,
                _ => EvalError::new("invalid comprehension target"),
            })?;
            let mut keep = true;
            for cond in &first.ifs {
                if !self.eval(cond)?.is_truthy() {
                    keep = false;
                    break;
                }
            }
            if keep {
                self.eval_comprehension(rest, body)?;
            }
        }
        Ok(())
    }

    fn eval_call(&mut self, func: &Expr, args: &[Expr]) -> ExprResult {
        // `base.method(args)` - dispatch mutating/derived methods before
        // falling back to a plain call of whatever `func` evaluates to.
        if let Expr::Attribute(base, method) = func {
            if let Expr::Name(var) = base.as_ref() {
                if let Some(current) = self.env.get(var).cloned() {
                    let arg_values = args.iter().map(|a| self.eval(a)).collect::<Result<Vec<_>, _>>()?;
                    if let Some(result) = builtins::try_method_call(&current, method, &arg_values)? {
                        if let builtins::MethodOutcome::Mutated(new_value, ret) = result {
                            self.env.set(var.clone(), new_value);
                            return Ok(ret);
                        }
                        if let builtins::MethodOutcome::Value(v) = result {
                            return Ok(v);
                        }
                    }
                }
            }
            let base_value = self.eval(base)?;
            let arg_values = args.iter().map(|a| self.eval(a)).collect::<Result<Vec<_>, _>>()?;
            if let Some(result) = builtins::try_method_call(&base_value, method, &arg_values)? {
                return Ok(result.into_value());
            }
            return Err(EvalError::new(format!(
                "'{}' object has no attribute '{method}'",
                base_value.repr()
            )));
        }

        if let Expr::Name(name) = func {
            let arg_values = args.iter().map(|a| self.eval(a)).collect::<Result<Vec<_>, _>>()?;
            if name == "print" {
                let line = arg_values.iter().map(Value::to_string).collect::<Vec<_>>().join(" ");
                self.stdout.push_str(&line);
                self.stdout.push('\n');
                return Ok(Value::Null);
            }
            if let Some(user_fn) = self.env.get_function(name) {
                return self.call_user_function(&user_fn, &arg_values);
            }
            if let Some(result) = builtins::call_builtin(name, &arg_values)? {
                return Ok(result);
            }
            return Err(EvalError::new(format!("name '{name}' is not defined")));
        }

        let callee = self.eval(func)?;
        let _ = callee;
        Err(EvalError::new("expression is not callable"))
    }

    fn call_user_function(&mut self, func: &Rc<UserFunction>, args: &[Value]) -> ExprResult {
        let mut locals: Vec<(String, Value)> = Vec::new();
        for (i, param) in func.params.iter().enumerate() {
            let value = if let Some(v) = args.get(i) {
                v.clone()
            } else if let Some(default) = &param.default {
                self.eval(default)?
            } else {
                return Err(EvalError::new(format!(
                    "{}() missing required argument: '{}'",
                    func.name, param.name
                )));
            };
            locals.push((param.name.clone(), value));
        }

        // Scalars only: save/restore shadowed bindings around the call so
        // parameter names don't leak into the caller's scope. This crate
        // has no first-class call-stack frames, so the shared Environment
        // doubles as the function's local scope for the call's duration.
        let saved: Vec<(String, Option<Value>)> = locals
            .iter()
            .map(|(name, _)| (name.clone(), self.env.get(name).cloned()))
            .collect();
        for (name, value) in locals {
            self.env.set(name, value);
        }

        let result = match self.run_block(&func.body) {
            Ok(()) => Value::Null,
            Err(Flow::Return(v)) => v,
            Err(Flow::Error(e)) => {
                restore(self.env, saved);
                return Err(e.with_frame(format!("in {}(...)", func.name)));
            }
            Err(Flow::Break) | Err(Flow::Continue) => {
                restore(self.env, saved);
                return Err(EvalError::new("'break'/'continue' outside loop"));
            }
        };
        restore(self.env, saved);
        Ok(result)
    }
}

fn restore(env: &mut Environment, saved: Vec<(String, Option<Value>)>) {
    for (name, value) in saved {
        match value {
            Some(v) => env.set(name, v),
            None => {
                env.remove(&name);
            }
        }
    }
}

fn iterate(value: &Value) -> Result<Vec<Value>, EvalError> {
    match value {
        Value::List(items) => Ok(items.clone()),
        Value::Map(pairs) => Ok(pairs.iter().map(|(k, _)| Value::String(k.clone())).collect()),
        Value::String(s) => Ok(s.chars().map(|c| Value::String(c.to_string())).collect()),
        Value::Table(t) => Ok((0..t.row_count()).map(|i| Value::Int(i as i64)).collect()),
        other => Err(EvalError::new(format!("'{}' object is not iterable", other.repr()))),
    }
}

fn binop_text(op: &BinOp) -> &'static str {
    match op {
        BinOp::Add => "+",
        BinOp::Sub => "-",
        BinOp::Mul => "*",
        BinOp::Div => "/",
        BinOp::FloorDiv => "//",
        BinOp::Mod => "%",
        BinOp::Pow => "**",
    }
}

fn as_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Int(i) => Some(*i as f64),
        Value::Float(f) => Some(*f),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn apply_binop(l: &Value, op: &BinOp, r: &Value) -> ExprResult {
    if let (Value::String(a), BinOp::Add, Value::String(b)) = (l, op, r) {
        return Ok(Value::String(format!("{a}{b}")));
    }
    if let (Value::List(a), BinOp::Add, Value::List(b)) = (l, op, r) {
        let mut out = a.clone();
        out.extend(b.clone());
        return Ok(Value::List(out));
    }
    let (Some(a), Some(b)) = (as_f64(l), as_f64(r)) else {
        return Err(EvalError::new(format!(
            "unsupported operand type(s) for {}: '{}' and '{}'",
            binop_text(op),
            l.repr(),
            r.repr()
        )));
    };
    let both_int = matches!((l, r), (Value::Int(_) | Value::Bool(_), Value::Int(_) | Value::Bool(_)));
    match op {
        BinOp::Add => Ok(numeric(a + b, both_int)),
        BinOp::Sub => Ok(numeric(a - b, both_int)),
        BinOp::Mul => Ok(numeric(a * b, both_int)),
        BinOp::Div => {
            if b == 0.0 {
                return Err(EvalError::new("division by zero"));
            }
            Ok(Value::Float(a / b))
        }
        BinOp::FloorDiv => {
            if b == 0.0 {
                return Err(EvalError::new("division by zero"));
            }
            Ok(numeric((a / b).floor(), both_int))
        }
        BinOp::Mod => {
            if b == 0.0 {
                return Err(EvalError::new("division by zero"));
            }
            Ok(numeric(a.rem_euclid(b), both_int))
        }
        BinOp::Pow => Ok(numeric(a.powf(b), both_int && b >= 0.0)),
    }
}

fn numeric(v: f64, as_int: bool) -> Value {
    if as_int && v.fract() == 0.0 {
        Value::Int(v as i64)
    } else {
        Value::Float(v)
    }
}

fn apply_unary(op: &UnaryOp, v: &Value) -> ExprResult {
    match op {
        UnaryOp::Not => Ok(Value::Bool(!v.is_truthy())),
        UnaryOp::Neg | UnaryOp::Pos => {
            let f = as_f64(v).ok_or_else(|| {
                EvalError::new(format!("bad operand type for unary operator: '{}'", v.repr()))
            })?;
            let f = if matches!(op, UnaryOp::Neg) { -f } else { f };
            Ok(numeric(f, matches!(v, Value::Int(_) | Value::Bool(_))))
        }
    }
}

fn apply_cmp(op: &CmpOp, l: &Value, r: &Value) -> Result<bool, EvalError> {
    if matches!(op, CmpOp::Eq) {
        return Ok(values_equal(l, r));
    }
    if matches!(op, CmpOp::NotEq) {
        return Ok(!values_equal(l, r));
    }
    let ordering = match (as_f64(l), as_f64(r)) {
        (Some(a), Some(b)) => a.partial_cmp(&b),
        _ => match (l, r) {
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            _ => None,
        },
    };
    let Some(ordering) = ordering else {
        return Err(EvalError::new(format!(
            "'{}' not supported between instances of '{}' and '{}'",
            cmp_text(op),
            l.repr(),
            r.repr()
        )));
    };
    Ok(match op {
        CmpOp::Lt => ordering.is_lt(),
        CmpOp::LtEq => ordering.is_le(),
        CmpOp::Gt => ordering.is_gt(),
        CmpOp::GtEq => ordering.is_ge(),
        CmpOp::Eq | CmpOp::NotEq => unreachable!(),
    })
}

fn cmp_text(op: &CmpOp) -> &'static str {
    match op {
        CmpOp::Eq => "==",
        CmpOp::NotEq => "!=",
        CmpOp::Lt => "<",
        CmpOp::LtEq => "<=",
        CmpOp::Gt => ">",
        CmpOp::GtEq => ">=",
    }
}

fn values_equal(l: &Value, r: &Value) -> bool {
    if let (Some(a), Some(b)) = (as_f64(l), as_f64(r)) {
        return a == b;
    }
    l == r
}

/// Builtins and attribute-method dispatch. Kept as a submodule to separate
/// "the language" (statement/expression evaluation above) from "the
/// standard library subset" below.
mod builtins {
    use super::*;

    pub enum MethodOutcome {
        Value(Value),
        Mutated(Value, Value),
    }

    impl MethodOutcome {
        pub fn into_value(self) -> Value {
            match self {
                MethodOutcome::Value(v) => v,
                MethodOutcome::Mutated(_, ret) => ret,
            }
        }
    }

    pub fn attribute_value(base: &Value, name: &str) -> ExprResult {
        if let Value::Module(_) = base {
            // Bare attribute reference on a module (e.g. `math.pi`), not a
            // call — only a handful of constants are known.
            if name == "pi" {
                return Ok(Value::Float(std::f64::consts::PI));
            }
        }
        Err(EvalError::new(format!("'{}' object has no attribute '{name}'", base.repr())))
    }

    pub fn subscript(base: &Value, index: &Value) -> ExprResult {
        match (base, index) {
            (Value::List(items), Value::Int(i)) => {
                let idx = normalize_index(*i, items.len())
                    .ok_or_else(|| EvalError::new("list index out of range"))?;
                Ok(items[idx].clone())
            }
            (Value::Map(pairs), key) => {
                let key = key.to_string();
                pairs
                    .iter()
                    .find(|(k, _)| *k == key)
                    .map(|(_, v)| v.clone())
                    .ok_or_else(|| EvalError::new(format!("'{key}'")))
            }
            (Value::String(s), Value::Int(i)) => {
                let chars: Vec<char> = s.chars().collect();
                let idx = normalize_index(*i, chars.len())
                    .ok_or_else(|| EvalError::new("string index out of range"))?;
                Ok(Value::String(chars[idx].to_string()))
            }
            _ => Err(EvalError::new(format!("'{}' object is not subscriptable", base.repr()))),
        }
    }

    fn normalize_index(i: i64, len: usize) -> Option<usize> {
        let idx = if i < 0 { len as i64 + i } else { i };
        if idx < 0 || idx as usize >= len {
            None
        } else {
            Some(idx as usize)
        }
    }

    pub fn try_method_call(
        base: &Value,
        method: &str,
        args: &[Value],
    ) -> Result<Option<MethodOutcome>, EvalError> {
        match base {
            Value::List(items) => list_method(items, method, args).map(Some),
            Value::Map(pairs) => map_method(pairs, method, args).map(Some),
            Value::String(s) => string_method(s, method, args).map(Some),
            Value::Module(name) if name == "pd" => pandas_method(method, args).map(Some),
            Value::Module(name) if name == "math" || name.ends_with(".math") => {
                math_method(method, args).map(Some)
            }
            _ => Ok(None),
        }
    }

    fn list_method(items: &[Value], method: &str, args: &[Value]) -> Result<MethodOutcome, EvalError> {
        let mut out = items.to_vec();
        match method {
            "append" => {
                let v = args.first().cloned().ok_or_else(|| EvalError::new("append() requires an argument"))?;
                out.push(v);
                Ok(MethodOutcome::Mutated(Value::List(out), Value::Null))
            }
            "extend" => {
                let other = args.first().cloned().unwrap_or(Value::List(vec![]));
                if let Value::List(more) = other {
                    out.extend(more);
                }
                Ok(MethodOutcome::Mutated(Value::List(out), Value::Null))
            }
            "pop" => {
                let popped = out.pop().ok_or_else(|| EvalError::new("pop from empty list"))?;
                Ok(MethodOutcome::Mutated(Value::List(out), popped))
            }
            "sort" => {
                out.sort_by(|a, b| {
                    as_f64(a)
                        .zip(as_f64(b))
                        .and_then(|(x, y)| x.partial_cmp(&y))
                        .unwrap_or(std::cmp::Ordering::Equal)
                });
                Ok(MethodOutcome::Mutated(Value::List(out), Value::Null))
            }
            "copy" => Ok(MethodOutcome::Value(Value::List(out))),
            other => Err(EvalError::new(format!("'list' object has no attribute '{other}'"))),
        }
    }

    fn map_method(
        pairs: &[(String, Value)],
        method: &str,
        args: &[Value],
    ) -> Result<MethodOutcome, EvalError> {
        match method {
            "items" => Ok(MethodOutcome::Value(Value::List(
                pairs
                    .iter()
                    .map(|(k, v)| Value::List(vec![Value::String(k.clone()), v.clone()]))
                    .collect(),
            ))),
            "keys" => Ok(MethodOutcome::Value(Value::List(
                pairs.iter().map(|(k, _)| Value::String(k.clone())).collect(),
            ))),
            "values" => Ok(MethodOutcome::Value(Value::List(
                pairs.iter().map(|(_, v)| v.clone()).collect(),
            ))),
            "get" => {
                let key = args.first().map(|v| v.to_string()).unwrap_or_default();
                let found = pairs.iter().find(|(k, _)| *k == key).map(|(_, v)| v.clone());
                Ok(MethodOutcome::Value(found.or_else(|| args.get(1).cloned()).unwrap_or(Value::Null)))
            }
            other => Err(EvalError::new(format!("'dict' object has no attribute '{other}'"))),
        }
    }

    fn string_method(s: &str, method: &str, args: &[Value]) -> Result<MethodOutcome, EvalError> {
        match method {
            "upper" => Ok(MethodOutcome::Value(Value::String(s.to_uppercase()))),
            "lower" => Ok(MethodOutcome::Value(Value::String(s.to_lowercase()))),
            "strip" => Ok(MethodOutcome::Value(Value::String(s.trim().to_string()))),
            "split" => {
                let sep = args.first().map(|v| v.to_string());
                let parts: Vec<Value> = match sep {
                    Some(sep) if !sep.is_empty() => {
                        s.split(sep.as_str()).map(|p| Value::String(p.to_string())).collect()
                    }
                    _ => s.split_whitespace().map(|p| Value::String(p.to_string())).collect(),
                };
                Ok(MethodOutcome::Value(Value::List(parts)))
            }
            "join" => {
                let Some(Value::List(items)) = args.first() else {
                    return Err(EvalError::new("join() requires a list argument"));
                };
                let joined = items.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(s);
                Ok(MethodOutcome::Value(Value::String(joined)))
            }
            "format" => {
                let mut result = String::new();
                let mut arg_iter = args.iter();
                let mut chars = s.chars().peekable();
                while let Some(c) = chars.next() {
                    if c == '{' && chars.peek() == Some(&'}') {
                        chars.next();
                        result.push_str(&arg_iter.next().cloned().unwrap_or(Value::Null).to_string());
                    } else {
                        result.push(c);
                    }
                }
                Ok(MethodOutcome::Value(Value::String(result)))
            }
            other => Err(EvalError::new(format!("'str' object has no attribute '{other}'"))),
        }
    }

    fn pandas_method(method: &str, args: &[Value]) -> Result<MethodOutcome, EvalError> {
        if method != "DataFrame" {
            return Err(EvalError::new(format!("module 'pd' has no attribute '{method}'")));
        }
        let Some(Value::List(rows)) = args.first() else {
            return Err(EvalError::new("pd.DataFrame() requires a list of row dicts"));
        };
        let mut columns: Vec<String> = Vec::new();
        if let Some(Value::Map(first)) = rows.first() {
            columns = first.iter().map(|(k, _)| k.clone()).collect();
        }
        let mut table_rows = Vec::with_capacity(rows.len());
        for row in rows {
            let Value::Map(pairs) = row else {
                return Err(EvalError::new("pd.DataFrame() rows must be dicts"));
            };
            let mut out_row = Vec::with_capacity(columns.len());
            for col in &columns {
                let v = pairs.iter().find(|(k, _)| k == col).map(|(_, v)| v.clone()).unwrap_or(Value::Null);
                out_row.push(v);
            }
            table_rows.push(out_row);
        }
        Ok(MethodOutcome::Value(Value::Table(Table::new(columns, table_rows))))
    }

    fn math_method(method: &str, args: &[Value]) -> Result<MethodOutcome, EvalError> {
        let x = args.first().and_then(as_f64).ok_or_else(|| EvalError::new(format!("math.{method}() requires a numeric argument")))?;
        let result = match method {
            "sqrt" => x.sqrt(),
            "floor" => x.floor(),
            "ceil" => x.ceil(),
            "fabs" => x.abs(),
            other => return Err(EvalError::new(format!("module 'math' has no attribute '{other}'"))),
        };
        Ok(MethodOutcome::Value(Value::Float(result)))
    }

    pub fn call_builtin(name: &str, args: &[Value]) -> Result<Option<Value>, EvalError> {
        let value = match name {
            "print" => {
                // stdout capture is handled by the caller: print() here just
                // formats, the Interpreter appends to `self.stdout`.
                return Ok(Some(Value::Null));
            }
            "len" => Value::Int(length_of(args.first())? as i64),
            "str" => Value::String(args.first().map(|v| v.to_string()).unwrap_or_default()),
            "bool" => Value::Bool(args.first().map(Value::is_truthy).unwrap_or(false)),
            "int" => to_int(args.first())?,
            "float" => Value::Float(args.first().and_then(as_f64).ok_or_else(|| EvalError::new("float() requires a numeric or numeric-string argument"))?),
            "list" => Value::List(coerce_iterable(args.first())?),
            "tuple" => Value::List(coerce_iterable(args.first())?),
            "set" => {
                let mut out: Vec<Value> = Vec::new();
                for v in coerce_iterable(args.first())? {
                    if !out.contains(&v) {
                        out.push(v);
                    }
                }
                Value::List(out)
            }
            "dict" => match args.first() {
                Some(Value::Map(m)) => Value::Map(m.clone()),
                None => Value::Map(vec![]),
                _ => return Err(EvalError::new("dict() requires a mapping argument")),
            },
            "range" => Value::List(range_values(args)?),
            "sum" => {
                let items = coerce_iterable(args.first())?;
                let mut acc = 0.0;
                let mut all_int = true;
                for v in &items {
                    acc += as_f64(v).ok_or_else(|| EvalError::new("sum() requires numeric items"))?;
                    all_int &= matches!(v, Value::Int(_));
                }
                numeric(acc, all_int)
            }
            "min" | "max" => {
                let items = coerce_iterable(args.first())?;
                let mut best = items.first().cloned().ok_or_else(|| EvalError::new(format!("{name}() arg is an empty sequence")))?;
                for v in &items[1..] {
                    let better = if name == "min" {
                        as_f64(v) < as_f64(&best)
                    } else {
                        as_f64(v) > as_f64(&best)
                    };
                    if better {
                        best = v.clone();
                    }
                }
                best
            }
            "abs" => {
                let f = args.first().and_then(as_f64).ok_or_else(|| EvalError::new("abs() requires a numeric argument"))?;
                numeric(f.abs(), matches!(args.first(), Some(Value::Int(_))))
            }
            "round" => {
                let f = args.first().and_then(as_f64).ok_or_else(|| EvalError::new("round() requires a numeric argument"))?;
                match args.get(1) {
                    Some(v) => {
                        let digits = match v { Value::Int(i) => *i, _ => 0 };
                        let mul = 10f64.powi(digits as i32);
                        Value::Float((f * mul).round() / mul)
                    }
                    None => Value::Int(f.round() as i64),
                }
            }
            "sorted" => {
                let mut items = coerce_iterable(args.first())?;
                items.sort_by(|a, b| as_f64(a).zip(as_f64(b)).and_then(|(x, y)| x.partial_cmp(&y)).unwrap_or(std::cmp::Ordering::Equal));
                Value::List(items)
            }
            "reversed" => {
                let mut items = coerce_iterable(args.first())?;
                items.reverse();
                Value::List(items)
            }
            "enumerate" => {
                let items = coerce_iterable(args.first())?;
                Value::List(
                    items
                        .into_iter()
                        .enumerate()
                        .map(|(i, v)| Value::List(vec![Value::Int(i as i64), v]))
                        .collect(),
                )
            }
            "zip" => {
                let lists: Vec<Vec<Value>> =
                    args.iter().map(|a| coerce_iterable(Some(a))).collect::<Result<_, _>>()?;
                let min_len = lists.iter().map(Vec::len).min().unwrap_or(0);
                let mut out = Vec::with_capacity(min_len);
                for i in 0..min_len {
                    out.push(Value::List(lists.iter().map(|l| l[i].clone()).collect()));
                }
                Value::List(out)
            }
            "any" => Value::Bool(coerce_iterable(args.first())?.iter().any(Value::is_truthy)),
            "all" => Value::Bool(coerce_iterable(args.first())?.iter().all(Value::is_truthy)),
            "type" => Value::String(type_name(args.first()).to_string()),
            _ => return Ok(None),
        };
        Ok(Some(value))
    }

    fn type_name(v: Option<&Value>) -> &'static str {
        match v {
            Some(Value::Null) | None => "NoneType",
            Some(Value::Bool(_)) => "bool",
            Some(Value::Int(_)) => "int",
            Some(Value::Float(_)) => "float",
            Some(Value::String(_)) => "str",
            Some(Value::List(_)) => "list",
            Some(Value::Map(_)) => "dict",
            Some(Value::Table(_)) => "DataFrame",
            Some(Value::Figure(_)) => "Figure",
            Some(Value::Module(_)) => "module",
            Some(Value::Callable(_)) => "function",
            Some(Value::Class(_)) => "type",
        }
    }

    fn length_of(v: Option<&Value>) -> Result<usize, EvalError> {
        match v {
            Some(Value::List(items)) => Ok(items.len()),
            Some(Value::Map(items)) => Ok(items.len()),
            Some(Value::String(s)) => Ok(s.chars().count()),
            Some(Value::Table(t)) => Ok(t.row_count()),
            _ => Err(EvalError::new("object of this type has no len()")),
        }
    }

    fn to_int(v: Option<&Value>) -> ExprResult {
        match v {
            Some(Value::Int(i)) => Ok(Value::Int(*i)),
            Some(Value::Float(f)) => Ok(Value::Int(*f as i64)),
            Some(Value::Bool(b)) => Ok(Value::Int(if *b { 1 } else { 0 })),
            Some(Value::String(s)) => s
                .trim()
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| EvalError::new(format!("invalid literal for int(): '{s}'"))),
            None => Ok(Value::Int(0)),
            _ => Err(EvalError::new("int() requires a numeric or numeric-string argument")),
        }
    }

    fn coerce_iterable(v: Option<&Value>) -> Result<Vec<Value>, EvalError> {
        match v {
            None => Ok(vec![]),
            Some(Value::List(items)) => Ok(items.clone()),
            Some(Value::Map(pairs)) => Ok(pairs.iter().map(|(k, _)| Value::String(k.clone())).collect()),
            Some(Value::String(s)) => Ok(s.chars().map(|c| Value::String(c.to_string())).collect()),
            Some(other) => Err(EvalError::new(format!("'{}' object is not iterable", other.repr()))),
        }
    }

    fn range_values(args: &[Value]) -> Result<Vec<Value>, EvalError> {
        let ints: Vec<i64> = args
            .iter()
            .map(|v| match v {
                Value::Int(i) => Ok(*i),
                _ => Err(EvalError::new("range() requires integer arguments")),
            })
            .collect::<Result<_, _>>()?;
        let (start, stop, step) = match ints.as_slice() {
            [stop] => (0, *stop, 1),
            [start, stop] => (*start, *stop, 1),
            [start, stop, step] => (*start, *stop, *step),
            _ => return Err(EvalError::new("range() takes 1 to 3 arguments")),
        };
        if step == 0 {
            return Err(EvalError::new("range() arg 3 must not be zero"));
        }
        let mut out = Vec::new();
        let mut i = start;
        while (step > 0 && i < stop) || (step < 0 && i > stop) {
            out.push(Value::Int(i));
            i += step;
        }
        Ok(out)
    }
}
