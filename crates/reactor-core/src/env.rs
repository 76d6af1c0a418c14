//! The shared, mutable evaluation environment.
//!
//! Grounded on `spec.md` §3 ("a mapping from name to value, shared across
//! all code cells... preseeded with standard numeric/data-table libraries
//! at construction") and on the prototype's `executor.py::_setup_namespace`,
//! which pre-`exec`s `import pandas as pd` / `import numpy as np` into the
//! namespace dict. This crate has no real pandas/numpy to import, so the
//! seeded bindings are [`Value::Module`] placeholders under the same names
//! — present so cell source that merely references `pd`/`np` resolves, and
//! so `reset_environment` has faithful "seeded state" semantics to restore.

use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::analyzer::ast::{Param, Stmt};
use crate::value::Value;

/// Names seeded into every fresh [`Environment`], mirroring the prototype's
/// pre-imported `pandas`/`numpy` namespace entries.
pub const SEEDED_MODULES: &[&str] = &["pd", "np"];

/// A user-defined function captured at `def` time: the Executor Adapter's
/// tree-walking evaluator calls back into this when the bound name (stored
/// as [`Value::Callable`]) is invoked from a later statement, possibly in a
/// different cell.
#[derive(Debug, Clone, PartialEq)]
pub struct UserFunction {
    pub name: String,
    pub params: Vec<Param>,
    pub body: Vec<Stmt>,
}

/// The notebook-wide name→value store shared by all code cells.
///
/// Callables (`def`-bound functions) live in a side table keyed by name
/// rather than inside [`Value`] itself, since `Value` derives `Serialize`
/// and an AST can't cross that boundary cleanly; the binding visible under
/// `bindings` is just a [`Value::Callable`] label naming it.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    bindings: FxHashMap<String, Value>,
    functions: FxHashMap<String, Rc<UserFunction>>,
}

impl Environment {
    /// A fresh environment with the seeded module bindings installed.
    pub fn new() -> Self {
        let mut env = Environment {
            bindings: FxHashMap::default(),
            functions: FxHashMap::default(),
        };
        env.seed();
        env
    }

    fn seed(&mut self) {
        for name in SEEDED_MODULES {
            self.bindings
                .insert((*name).to_string(), Value::Module((*name).to_string()));
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bindings.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.bindings.insert(name.into(), value);
    }

    /// Distinct from [`Environment::set`] only in caller intent: the
    /// external query executor uses this to make a data-query cell's
    /// result visible. Mirrors `executor.py::inject_sql_result`.
    pub fn inject(&mut self, name: impl Into<String>, value: Value) {
        self.set(name, value);
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.functions.remove(name);
        self.bindings.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    pub fn set_function(&mut self, name: impl Into<String>, func: UserFunction) {
        let name = name.into();
        self.functions.insert(name.clone(), Rc::new(func));
        self.bindings.insert(name.clone(), Value::Callable(name));
    }

    pub fn get_function(&self, name: &str) -> Option<Rc<UserFunction>> {
        self.functions.get(name).cloned()
    }

    /// Clears all bindings and restores the seeded state.
    pub fn reset(&mut self) {
        self.bindings.clear();
        self.functions.clear();
        self.seed();
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_environment_has_seeded_modules() {
        let env = Environment::new();
        assert!(matches!(env.get("pd"), Some(Value::Module(_))));
        assert!(matches!(env.get("np"), Some(Value::Module(_))));
    }

    #[test]
    fn reset_restores_seeded_state_only() {
        let mut env = Environment::new();
        env.set("x", Value::Int(1));
        assert!(env.contains("x"));
        env.reset();
        assert!(!env.contains("x"));
        assert!(env.contains("pd"));
    }

    #[test]
    fn inject_behaves_like_set() {
        let mut env = Environment::new();
        env.inject("df", Value::Int(42));
        assert_eq!(env.get("df"), Some(&Value::Int(42)));
    }
}
