//! Cell identity and the immutable-per-run cell record.

use std::fmt;

use serde::{Deserialize, Serialize};

/// An opaque, globally-unique-within-a-notebook cell identifier.
///
/// Generated as 8 lowercase hex characters drawn from a uniformly random
/// source (see [`crate::notebook::generate_cell_id`]), mirroring the
/// prototype's `uuid4().hex[:8]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellId(pub String);

impl CellId {
    pub fn new(id: impl Into<String>) -> Self {
        CellId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CellId {
    fn from(s: &str) -> Self {
        CellId(s.to_string())
    }
}

impl From<String> for CellId {
    fn from(s: String) -> Self {
        CellId(s)
    }
}

/// The kind of a cell, determining how the Reactor dispatches it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellKind {
    /// Ordinary source evaluated against the shared [`crate::env::Environment`].
    Code,
    /// Dispatched to an externally-supplied query executor (e.g. a database client);
    /// see `spec.md` §6.
    DataQuery,
}

impl Default for CellKind {
    fn default() -> Self {
        CellKind::Code
    }
}

/// An immutable-per-run record describing one notebook cell.
///
/// `output_name` is only meaningful for [`CellKind::DataQuery`] cells: the
/// name under which the query executor's result is injected into the
/// environment. If unset for a data-query cell, the Analyzer derives a
/// synthetic name (`_query_<id>`) so the write set is never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    pub id: CellId,
    pub kind: CellKind,
    pub source: String,
    pub output_name: Option<String>,
}

impl Cell {
    pub fn code(id: impl Into<CellId>, source: impl Into<String>) -> Self {
        Cell {
            id: id.into(),
            kind: CellKind::Code,
            source: source.into(),
            output_name: None,
        }
    }

    pub fn data_query(
        id: impl Into<CellId>,
        source: impl Into<String>,
        output_name: Option<String>,
    ) -> Self {
        Cell {
            id: id.into(),
            kind: CellKind::DataQuery,
            source: source.into(),
            output_name,
        }
    }

    /// The name a data-query cell writes if no explicit `output_name` was configured.
    pub fn synthetic_output_name(&self) -> String {
        format!("_query_{}", self.id.as_str())
    }

    /// The name a data-query cell actually writes: `output_name` if set, else synthetic.
    pub fn resolved_output_name(&self) -> String {
        self.output_name
            .clone()
            .unwrap_or_else(|| self.synthetic_output_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolved_output_name_falls_back_to_synthetic() {
        let c = Cell::data_query("abcd1234", "SELECT 1", None);
        assert_eq!(c.resolved_output_name(), "_query_abcd1234");
    }

    #[test]
    fn resolved_output_name_prefers_configured_name() {
        let c = Cell::data_query("abcd1234", "SELECT 1", Some("df".to_string()));
        assert_eq!(c.resolved_output_name(), "df");
    }
}
