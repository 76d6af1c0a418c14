//! Error types for reactor-core.

use thiserror::Error;

use crate::cell::CellId;

/// Result type for reactor-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in reactor-core.
///
/// This is distinct from a cell's own execution failure: a failed
/// user-code evaluation is captured as data in [`crate::executor::ExecutionResult`]
/// and [`crate::reactor::CellState`], never raised as an `Error`. `Error`
/// covers failures of the library's own API surface.
#[derive(Debug, Error)]
pub enum Error {
    /// Failed to parse notebook source text (the marker/cell codec, not cell code).
    #[error("parse error: {0}")]
    Parse(String),

    /// Cyclic dependency detected in the cell graph.
    #[error("Circular dependency detected: {}", .cycle.iter().map(CellId::as_str).collect::<Vec<_>>().join(" → "))]
    CyclicDependency { cycle: Vec<CellId> },

    /// Cell not found.
    #[error("cell not found: {0}")]
    CellNotFound(CellId),

    /// Execution error surfaced through the library API rather than as cell state
    /// (e.g. a caller-programming error, not a user-code failure).
    #[error("execution error for cell {cell}: {message}")]
    Execution {
        cell: CellId,
        message: String,
        trace: Option<String>,
    },

    /// A data-query cell was run with no query executor installed.
    #[error("no database connection configured")]
    NoQueryExecutor,

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid operation requested of the API.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
}
