//! The Executor Adapter: holds the persistent [`Environment`] and turns one
//! [`Cell`]'s source into an [`ExecutionResult`] (`spec.md` §4.3).
//!
//! Grounded directly on `original_source/Backend/executor.py`'s `Executor`
//! class. That prototype delegates the actual running of a cell's code to
//! CPython's `exec()` against a shared namespace dict; this crate has no
//! CPython to call out to, so [`super::interpreter::Interpreter`] walks the
//! parsed statements itself. Everything else — stdout capture, the
//! `_result` sentinel convention, DataFrame/figure rendering, the
//! exception-to-`ExecutionResult` mapping — mirrors `executor.py` as
//! closely as a statically-typed host allows.

use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::analyzer::parser;
use crate::cell::{Cell, CellKind};
use crate::env::Environment;
use crate::value::{Figure, Table, Value};

use super::interpreter::{Flow, Interpreter};

/// The shape a rendered result takes, mirroring `executor.py::_render_result`'s
/// `(rendered_string, type)` tuple plus the error case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputKind {
    Text,
    Html,
    Error,
}

impl Default for OutputKind {
    fn default() -> Self {
        OutputKind::Text
    }
}

/// The outcome of running one cell: `spec.md` §4.3's
/// `{success, stdout, rendered, rendered_kind, error, trace}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub stdout: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rendered: Option<String>,
    pub rendered_kind: OutputKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<String>,
}

impl ExecutionResult {
    /// A bare failure with no captured stdout, used for dispatch-level
    /// failures that never reach the interpreter (a data-query cell with no
    /// query executor installed, a cell kind routed to the wrong method).
    pub fn failure(message: impl Into<String>) -> Self {
        ExecutionResult {
            success: false,
            stdout: String::new(),
            rendered: None,
            rendered_kind: OutputKind::Error,
            error: Some(message.into()),
            trace: None,
        }
    }

    fn success(stdout: String, rendered: Option<String>, rendered_kind: OutputKind) -> Self {
        ExecutionResult {
            success: true,
            stdout,
            rendered,
            rendered_kind,
            error: None,
            trace: None,
        }
    }
}

/// Holds the notebook's shared, persistent [`Environment`] and runs code
/// cells against it. Data-query cells are *not* executed here (`spec.md`
/// §4.3): the Reactor routes them to an externally-supplied query executor
/// that calls [`Executor::inject`] itself.
#[derive(Debug, Default)]
pub struct Executor {
    env: Environment,
}

impl Executor {
    pub fn new() -> Self {
        Executor {
            env: Environment::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.env.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.env.set(name, value);
    }

    /// Distinct from [`Executor::set`] only in caller intent: the query
    /// executor uses this to make a data-query cell's result visible.
    pub fn inject(&mut self, name: impl Into<String>, value: Value) {
        self.env.inject(name, value);
    }

    pub fn reset_environment(&mut self) {
        self.env.reset();
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    pub fn environment_mut(&mut self) -> &mut Environment {
        &mut self.env
    }

    /// Execute one code cell's source against the shared environment.
    ///
    /// Data-query cells are rejected here exactly as `executor.py::execute_cell`
    /// rejects `cell_type == "sql"`: the Reactor is responsible for routing
    /// those to the query executor instead.
    pub fn execute(&mut self, cell: &Cell) -> ExecutionResult {
        if cell.kind != CellKind::Code {
            return ExecutionResult::failure(
                "data-query cells must be executed through the query executor",
            );
        }

        let source = cell.source.trim();
        if source.is_empty() {
            return ExecutionResult::success(String::new(), None, OutputKind::Text);
        }

        let stmts = match parser::parse(source) {
            Ok(stmts) => stmts,
            Err(message) => {
                return ExecutionResult {
                    success: false,
                    stdout: String::new(),
                    rendered: None,
                    rendered_kind: OutputKind::Error,
                    error: Some(message.clone()),
                    trace: Some(format!("SyntaxError: {message}")),
                };
            }
        };

        let mut interp = Interpreter::new(&mut self.env);
        let outcome = interp.run_block(&stmts);
        let stdout = interp.stdout;

        match outcome {
            Ok(()) => {
                let result_value = self.env.get("_result").cloned();
                if let Some(value) = result_value {
                    self.env.remove("_result");
                    let (rendered, kind) = render(&value);
                    ExecutionResult::success(stdout, Some(rendered), kind)
                } else {
                    ExecutionResult::success(stdout, None, OutputKind::Text)
                }
            }
            Err(Flow::Error(e)) => ExecutionResult {
                success: false,
                stdout,
                rendered: None,
                rendered_kind: OutputKind::Error,
                error: Some(e.message.clone()),
                trace: Some(e.format_trace()),
            },
            Err(Flow::Break) | Err(Flow::Continue) | Err(Flow::Return(_)) => ExecutionResult {
                success: false,
                stdout,
                rendered: None,
                rendered_kind: OutputKind::Error,
                error: Some("'break'/'continue'/'return' outside of a loop or function".to_string()),
                trace: None,
            },
        }
    }
}

/// Render a value for display (`spec.md` §4.3 Rendering rules), mirroring
/// `executor.py::_render_result`.
fn render(value: &Value) -> (String, OutputKind) {
    match value {
        Value::Table(t) => (render_table(t), OutputKind::Html),
        Value::Figure(fig) => match render_figure(fig) {
            Ok(html) => (html, OutputKind::Html),
            Err(()) => (value.repr(), OutputKind::Text),
        },
        other => (other.repr(), OutputKind::Text),
    }
}

const MAX_TABLE_ROWS: usize = 50;

fn render_table(table: &Table) -> String {
    let truncated = table.row_count() > MAX_TABLE_ROWS;
    let rows = if truncated {
        &table.rows[..MAX_TABLE_ROWS]
    } else {
        &table.rows[..]
    };

    let mut html = String::from("<table class=\"dataframe\">\n  <thead>\n    <tr>\n      <th></th>\n");
    for col in &table.columns {
        html.push_str(&format!("      <th>{}</th>\n", escape_html(col)));
    }
    html.push_str("    </tr>\n  </thead>\n  <tbody>\n");
    for (i, row) in rows.iter().enumerate() {
        html.push_str(&format!("    <tr>\n      <th>{i}</th>\n"));
        for cell in row {
            html.push_str(&format!("      <td>{}</td>\n", escape_html(&cell.to_string())));
        }
        html.push_str("    </tr>\n");
    }
    html.push_str("  </tbody>\n</table>");

    if truncated {
        html.push_str(&format!(
            "<p><em>Showing {MAX_TABLE_ROWS} of {} rows</em></p>",
            table.row_count()
        ));
    }
    html
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Encode a figure's PNG bytes as a base64 `<img>` tag. When the `image`
/// feature is enabled, the bytes are validated as a decodable image first;
/// a decode failure falls back to plain-text rendering, mirroring
/// `executor.py::_render_result`'s `except Exception: pass` fallthrough.
fn render_figure(fig: &Figure) -> Result<String, ()> {
    #[cfg(feature = "image")]
    {
        image::load_from_memory(&fig.png_bytes).map_err(|_| ())?;
    }
    let encoded = base64::engine::general_purpose::STANDARD.encode(&fig.png_bytes);
    Ok(format!("<img src=\"data:image/png;base64,{encoded}\" />"))
}
