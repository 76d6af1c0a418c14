//! The Executor Adapter (`spec.md` §4.3): the persistent shared binding
//! environment plus the code that runs a single cell's source against it.
//!
//! `executor` holds the public [`Executor`]/[`ExecutionResult`] surface;
//! `interpreter` is the tree-walking evaluator `Executor` delegates to for
//! code cells, grounded on `original_source/Backend/executor.py`'s use of
//! CPython's own `exec()`.

mod executor;
mod interpreter;

pub use executor::{Executor, ExecutionResult, OutputKind};
