//! The small tagged union of values producible by cell evaluation.
//!
//! `spec.md` §9 calls for "a string-keyed map of tagged values; the set of
//! producible value shapes (number, table, figure, arbitrary) is a small
//! tagged union at the system boundary, opaque within the store." This
//! mirrors the shape of `GlobalValue` in the `ruchy-notebook` example
//! (`paiml-ruchy/ruchy-notebook/src/state/global.rs`), not the teacher's own
//! `rkyv`/`BoxedOutput` type-erasure scheme in `venus-core::state::output`,
//! which is built for serializing compiled-native outputs to disk across
//! process restarts — exactly what this spec's Non-goals exclude.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A tabular value: column headers plus row-major cells.
///
/// Produced by cell code that wants dataframe-style HTML rendering (see
/// [`crate::executor::render`]) without requiring an actual `polars`
/// dependency in the default build. When the `polars` feature is enabled,
/// [`Table::from_polars`] converts a real `polars::frame::DataFrame`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Table { columns, rows }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    #[cfg(feature = "polars")]
    pub fn from_polars(df: &polars::frame::DataFrame) -> Self {
        let columns = df
            .get_column_names()
            .into_iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>();
        let height = df.height();
        let mut rows = Vec::with_capacity(height);
        for i in 0..height {
            let mut row = Vec::with_capacity(columns.len());
            for series in df.get_columns() {
                let text = series
                    .get(i)
                    .map(|v| v.to_string())
                    .unwrap_or_default();
                row.push(Value::String(text));
            }
            rows.push(row);
        }
        Table { columns, rows }
    }
}

/// A figure: raw encoded image bytes plus the format they're encoded in.
///
/// Cell code that wants figure rendering (see [`crate::executor::render`])
/// produces one of these directly. When the `image` feature is enabled the
/// renderer validates the bytes decode before encoding the `<img>` tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Figure {
    pub png_bytes: Vec<u8>,
}

impl Figure {
    pub fn from_png_bytes(bytes: Vec<u8>) -> Self {
        Figure { png_bytes: bytes }
    }
}

/// A value bound in the [`crate::env::Environment`] or produced by a cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Map(Vec<(String, Value)>),
    Table(Table),
    Figure(Figure),
    /// A library/module placeholder bound at Environment construction
    /// (e.g. the seeded `pd`/`np`-style names); never produced by evaluation.
    Module(String),
    /// A `def`-bound function name. The callable body lives in
    /// [`crate::env::Environment`]'s function table, keyed by this name.
    Callable(String),
    /// A `class`-bound name. This interpreter does not model instances or
    /// methods; a class definition is recorded only so that later code
    /// referencing the name resolves and dependency tracking sees a write.
    Class(String),
}

impl Value {
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Map(items) => !items.is_empty(),
            Value::Table(t) => !t.rows.is_empty(),
            Value::Figure(_) => true,
            Value::Module(_) => true,
            Value::Callable(_) => true,
            Value::Class(_) => true,
        }
    }

    /// The canonical textual ("repr") representation used for plain-text rendering.
    pub fn repr(&self) -> String {
        match self {
            Value::Null => "None".to_string(),
            Value::Bool(b) => if *b { "True".to_string() } else { "False".to_string() },
            Value::Int(i) => i.to_string(),
            Value::Float(f) => format!("{f}"),
            Value::String(s) => format!("'{s}'"),
            Value::List(items) => {
                let inner = items.iter().map(Value::repr).collect::<Vec<_>>().join(", ");
                format!("[{inner}]")
            }
            Value::Map(items) => {
                let inner = items
                    .iter()
                    .map(|(k, v)| format!("'{k}': {}", v.repr()))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{{{inner}}}")
            }
            Value::Table(t) => format!("<Table {}x{}>", t.row_count(), t.columns.len()),
            Value::Figure(_) => "<Figure>".to_string(),
            Value::Module(name) => format!("<module '{name}'>"),
            Value::Callable(name) => format!("<function {name}>"),
            Value::Class(name) => format!("<class '{name}'>"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => f.write_str(s),
            other => f.write_str(&other.repr()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repr_matches_python_literal_style() {
        assert_eq!(Value::Bool(true).repr(), "True");
        assert_eq!(Value::Null.repr(), "None");
        assert_eq!(Value::String("hi".into()).repr(), "'hi'");
        assert_eq!(
            Value::List(vec![Value::Int(1), Value::Int(2)]).repr(),
            "[1, 2]"
        );
    }

    #[test]
    fn display_unwraps_strings() {
        assert_eq!(format!("{}", Value::String("hi".into())), "hi");
        assert_eq!(format!("{}", Value::Int(3)), "3");
    }
}
