//! The plain-text notebook format: parsing and serializing `.py`-style
//! files with cell marker comments.
//!
//! Grounded directly on `original_source/Backend/parser.py`. A cell marker
//! is a standalone comment line:
//!
//! ```text
//! # %% [id: abc123, type: sql, as: users_df]
//! ```
//!
//! `id` is the only required key; `type` defaults to `python` (this crate's
//! [`CellKind::Code`]) and `as` is the data-query output name. Everything
//! between one marker and the next (trimmed) is that cell's source.

use crate::cell::{Cell, CellId, CellKind};

/// Parse marker bracket contents (`id: abc123, type: sql, as: users_df`)
/// into key/value pairs, mirroring `parser.py::parse_marker`.
fn parse_marker(marker_content: &str) -> Vec<(String, String)> {
    marker_content
        .split(',')
        .filter_map(|part| {
            let part = part.trim();
            part.split_once(':')
                .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        })
        .collect()
}

fn marker_value<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

/// Match a line against `# %% [...]`, returning the bracket contents.
fn match_marker_line(line: &str) -> Option<&str> {
    let trimmed = line.trim_end();
    let rest = trimmed.strip_prefix("# %%")?;
    let rest = rest.trim_start();
    let inner = rest.strip_prefix('[')?.strip_suffix(']')?;
    Some(inner)
}

/// Generate a fresh cell ID: 8 lowercase hex characters from a random
/// uuid v4, mirroring the prototype's `uuid.uuid4().hex[:8]`.
pub fn generate_cell_id() -> CellId {
    let id = uuid::Uuid::new_v4().simple().to_string();
    CellId::new(id[..8].to_string())
}

/// Parse notebook source text into an ordered list of cells.
///
/// A marker with no recognized `id` key gets a freshly generated one, same
/// as `parser.py::parse_notebook`'s `marker_data.get('id', generate_cell_id())`.
pub fn parse_notebook(content: &str) -> Vec<Cell> {
    let mut cells = Vec::new();
    let mut current: Option<(CellId, CellKind, Option<String>)> = None;
    let mut current_lines: Vec<&str> = Vec::new();

    let flush = |current: &mut Option<(CellId, CellKind, Option<String>)>,
                 current_lines: &mut Vec<&str>,
                 cells: &mut Vec<Cell>| {
        if let Some((id, kind, output_name)) = current.take() {
            let source = current_lines.join("\n").trim().to_string();
            cells.push(Cell {
                id,
                kind,
                source,
                output_name,
            });
        }
        current_lines.clear();
    };

    for line in content.split('\n') {
        if let Some(marker_content) = match_marker_line(line) {
            flush(&mut current, &mut current_lines, &mut cells);

            let pairs = parse_marker(marker_content);
            let id = marker_value(&pairs, "id")
                .map(CellId::new)
                .unwrap_or_else(generate_cell_id);
            let kind = match marker_value(&pairs, "type") {
                Some("sql") => CellKind::DataQuery,
                _ => CellKind::Code,
            };
            let output_name = marker_value(&pairs, "as").map(|s| s.to_string());

            current = Some((id, kind, output_name));
        } else if current.is_some() {
            current_lines.push(line);
        }
    }
    flush(&mut current, &mut current_lines, &mut cells);

    cells
}

/// Parse a notebook file from disk.
pub fn parse_notebook_file(path: &std::path::Path) -> std::io::Result<Vec<Cell>> {
    let content = std::fs::read_to_string(path)?;
    Ok(parse_notebook(&content))
}

fn cell_type_str(kind: CellKind) -> &'static str {
    match kind {
        CellKind::Code => "python",
        CellKind::DataQuery => "sql",
    }
}

/// Serialize a single cell back to marker-plus-source text.
pub fn serialize_cell(cell: &Cell) -> String {
    let mut parts = vec![format!("id: {}", cell.id)];
    if cell.kind != CellKind::Code {
        parts.push(format!("type: {}", cell_type_str(cell.kind)));
    }
    if let Some(name) = &cell.output_name {
        parts.push(format!("as: {name}"));
    }
    let marker = format!("# %% [{}]", parts.join(", "));
    format!("{marker}\n{}", cell.source)
}

/// Serialize an ordered list of cells to complete notebook text.
pub fn serialize_notebook(cells: &[Cell]) -> String {
    if cells.is_empty() {
        return String::new();
    }
    let body = cells
        .iter()
        .map(serialize_cell)
        .collect::<Vec<_>>()
        .join("\n\n");
    format!("{body}\n")
}

/// Serialize cells and write them to a notebook file.
pub fn serialize_notebook_file(cells: &[Cell], path: &std::path::Path) -> std::io::Result<()> {
    std::fs::write(path, serialize_notebook(cells))
}

/// Create a new cell with a freshly generated ID.
pub fn create_cell(kind: CellKind, source: impl Into<String>, output_name: Option<String>) -> Cell {
    Cell {
        id: generate_cell_id(),
        kind,
        source: source.into(),
        output_name,
    }
}

/// Find a cell by ID.
pub fn find_cell_by_id<'a>(cells: &'a [Cell], id: &CellId) -> Option<&'a Cell> {
    cells.iter().find(|c| &c.id == id)
}

/// Remove a cell by ID in place. Returns `true` if a cell was found and removed.
pub fn remove_cell_by_id(cells: &mut Vec<Cell>, id: &CellId) -> bool {
    if let Some(pos) = cells.iter().position(|c| &c.id == id) {
        cells.remove(pos);
        true
    } else {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_python_cell() {
        let content = "# %% [id: abc123]\nx = 1\ny = 2\n";
        let cells = parse_notebook(content);
        assert_eq!(cells.len(), 1);
        assert_eq!(cells[0].id.as_str(), "abc123");
        assert_eq!(cells[0].kind, CellKind::Code);
        assert_eq!(cells[0].source, "x = 1\ny = 2");
    }

    #[test]
    fn parses_sql_cell_with_as_var() {
        let content = "# %% [id: q1, type: sql, as: users_df]\nSELECT * FROM users\n";
        let cells = parse_notebook(content);
        assert_eq!(cells.len(), 1);
        assert_eq!(cells[0].kind, CellKind::DataQuery);
        assert_eq!(cells[0].output_name.as_deref(), Some("users_df"));
    }

    #[test]
    fn missing_id_generates_one() {
        let content = "# %% [type: sql]\nSELECT 1\n";
        let cells = parse_notebook(content);
        assert_eq!(cells.len(), 1);
        assert_eq!(cells[0].id.as_str().len(), 8);
    }

    #[test]
    fn multiple_cells_split_on_markers() {
        let content = "# %% [id: a]\nx = 1\n\n# %% [id: b]\ny = x + 1\n";
        let cells = parse_notebook(content);
        assert_eq!(cells.len(), 2);
        assert_eq!(cells[0].id.as_str(), "a");
        assert_eq!(cells[1].id.as_str(), "b");
        assert_eq!(cells[1].source, "y = x + 1");
    }

    #[test]
    fn content_before_first_marker_is_ignored() {
        let content = "# just a comment\nprint('orphan')\n# %% [id: a]\nx = 1\n";
        let cells = parse_notebook(content);
        assert_eq!(cells.len(), 1);
        assert_eq!(cells[0].source, "x = 1");
    }

    #[test]
    fn round_trips_through_serialize_and_parse() {
        let cells = vec![
            Cell::code("a", "x = 1"),
            Cell::data_query("b", "SELECT 1", Some("df".to_string())),
        ];
        let text = serialize_notebook(&cells);
        let parsed = parse_notebook(&text);
        assert_eq!(parsed, cells);
    }

    #[test]
    fn empty_notebook_serializes_to_empty_string() {
        assert_eq!(serialize_notebook(&[]), "");
    }

    #[test]
    fn find_and_remove_by_id() {
        let mut cells = vec![Cell::code("a", "1"), Cell::code("b", "2")];
        assert!(find_cell_by_id(&cells, &CellId::new("b")).is_some());
        assert!(remove_cell_by_id(&mut cells, &CellId::new("a")));
        assert_eq!(cells.len(), 1);
        assert!(!remove_cell_by_id(&mut cells, &CellId::new("missing")));
    }

    #[test]
    fn notebook_file_round_trips_through_serialize_and_parse() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let path = dir.path().join("notebook.py");

        let cells = vec![
            Cell::code("a", "x = 1"),
            Cell::data_query("b", "SELECT * FROM t", Some("t_df".to_string())),
            Cell::code("c", "y = x + 1"),
        ];
        serialize_notebook_file(&cells, &path).expect("failed to write notebook file");

        let parsed = parse_notebook_file(&path).expect("failed to read notebook file");
        assert_eq!(parsed, cells);
    }

    #[test]
    fn parse_notebook_file_surfaces_io_errors_for_missing_files() {
        let missing = std::path::Path::new("/nonexistent/does-not-exist.py");
        assert!(parse_notebook_file(missing).is_err());
    }
}
