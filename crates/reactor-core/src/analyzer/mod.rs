//! Read/write-set extraction for a single cell (`spec.md` §4.1).
//!
//! Grounded directly on `original_source/Backend/dependency.py`'s
//! `VariableVisitor` and `analyze_python_code`/`analyze_cell`: walk the cell's
//! AST collecting every `Name` load as a candidate read and every binding
//! occurrence (assignment target, for-loop/comprehension target, `def`/`class`
//! name, import alias) as a write, then apply the normative filter
//!
//! ```text
//! final_reads = (collected_reads - exclusions - collected_writes) | required_reads
//! ```
//!
//! `required_reads` exists only for augmented-assignment targets, which are
//! simultaneously a read (of the prior value) and a write.

pub mod ast;
pub mod lexer;
pub mod parser;

use std::collections::BTreeSet;

use crate::cell::{Cell, CellId, CellKind};
use ast::{Expr, Stmt};

/// The result of analyzing one cell: the names it reads from (and so depends
/// on) and the names it writes (and so may satisfy downstream reads of).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellAnalysis {
    pub cell_id: CellId,
    pub reads: BTreeSet<String>,
    pub writes: BTreeSet<String>,
}

/// The normative exclusion set from `spec.md` §4.1: identifiers that are
/// never treated as a dependency even when they appear as a `Name` load,
/// because they denote Python builtins rather than notebook-cell state.
/// Hand-maintained, not derived from any runtime's actual builtin list —
/// see `DESIGN.md`'s Open Question decisions.
pub const BUILTIN_EXCLUSIONS: &[&str] = &[
    "print", "len", "range", "str", "int", "float", "list", "dict", "set", "tuple", "bool",
    "type", "isinstance", "hasattr", "getattr", "setattr", "open", "file", "input", "output",
    "sum", "min", "max", "abs", "round", "sorted", "reversed", "enumerate", "zip", "map",
    "filter", "any", "all", "None", "True", "False", "Exception", "ValueError", "TypeError",
    "KeyError", "__name__", "__file__", "__doc__",
];

/// Analyze a cell's source, returning its read and write sets.
///
/// Data-query cells never read Python names (`spec.md` §4.1): they write a
/// single name, either the configured `output_name` or the synthetic
/// `_query_<id>` fallback. A code cell that fails to parse contributes empty
/// reads and writes, per the Failure clause — it simply never participates
/// in the dependency graph until its source is corrected.
pub fn analyze(cell: &Cell) -> CellAnalysis {
    match cell.kind {
        CellKind::DataQuery => {
            let mut writes = BTreeSet::new();
            writes.insert(cell.resolved_output_name());
            CellAnalysis {
                cell_id: cell.id.clone(),
                reads: BTreeSet::new(),
                writes,
            }
        }
        CellKind::Code => match parser::parse(&cell.source) {
            Ok(stmts) => {
                let mut collector = Collector::default();
                collector.visit_block(&stmts);
                let final_reads = collector
                    .reads
                    .iter()
                    .filter(|n| {
                        !BUILTIN_EXCLUSIONS.contains(&n.as_str()) && !collector.writes.contains(*n)
                    })
                    .cloned()
                    .chain(collector.required_reads.iter().cloned())
                    .collect();
                CellAnalysis {
                    cell_id: cell.id.clone(),
                    reads: final_reads,
                    writes: collector.writes,
                }
            }
            Err(_) => CellAnalysis {
                cell_id: cell.id.clone(),
                reads: BTreeSet::new(),
                writes: BTreeSet::new(),
            },
        },
    }
}

#[derive(Default)]
struct Collector {
    reads: BTreeSet<String>,
    writes: BTreeSet<String>,
    required_reads: BTreeSet<String>,
}

impl Collector {
    fn visit_block(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            self.visit_stmt(stmt);
        }
    }

    fn visit_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Assign { targets, value } => {
                self.visit_expr(value);
                for t in targets {
                    self.visit_write_target(t);
                }
            }
            Stmt::AugAssign { target, value, .. } => {
                if let Expr::Name(n) = target {
                    self.reads.insert(n.clone());
                    self.required_reads.insert(n.clone());
                    self.writes.insert(n.clone());
                } else {
                    self.visit_expr(target);
                }
                self.visit_expr(value);
            }
            Stmt::Expr(e) => self.visit_expr(e),
            Stmt::For { target, iter, body } => {
                self.visit_write_target(target);
                self.visit_expr(iter);
                self.visit_block(body);
            }
            Stmt::While { test, body } => {
                self.visit_expr(test);
                self.visit_block(body);
            }
            Stmt::If { test, body, orelse } => {
                self.visit_expr(test);
                self.visit_block(body);
                self.visit_block(orelse);
            }
            Stmt::FunctionDef { name, params, body } => {
                let _ = body;
                self.writes.insert(name.clone());
                for p in params {
                    if let Some(d) = &p.default {
                        self.visit_expr(d);
                    }
                }
                // Function bodies are not descended into: their locals are
                // not notebook-cell state (spec.md §4.1).
            }
            Stmt::ClassDef { name, bases, body } => {
                let _ = body;
                self.writes.insert(name.clone());
                for b in bases {
                    self.visit_expr(b);
                }
            }
            Stmt::Import { modules } => {
                for (module, alias) in modules {
                    let name = alias
                        .clone()
                        .unwrap_or_else(|| module.split('.').next().unwrap_or(module).to_string());
                    self.writes.insert(name);
                }
            }
            Stmt::ImportFrom { names, .. } => {
                for (name, alias) in names {
                    if name != "*" {
                        self.writes.insert(alias.clone().unwrap_or_else(|| name.clone()));
                    }
                }
            }
            Stmt::Return(Some(e)) => self.visit_expr(e),
            Stmt::Return(None) | Stmt::Pass | Stmt::Break | Stmt::Continue => {}
        }
    }

    fn visit_write_target(&mut self, target: &Expr) {
        match target {
            Expr::Name(n) => {
                self.writes.insert(n.clone());
            }
            Expr::Tuple(items) | Expr::List(items) => {
                for it in items {
                    self.visit_write_target(it);
                }
            }
            other => self.visit_expr(other),
        }
    }

    fn visit_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Name(n) => {
                self.reads.insert(n.clone());
            }
            Expr::Int(_) | Expr::Float(_) | Expr::Str(_) | Expr::Bool(_) | Expr::NoneLit => {}
            Expr::Tuple(items) | Expr::List(items) => {
                for it in items {
                    self.visit_expr(it);
                }
            }
            Expr::Dict(pairs) => {
                for (k, v) in pairs {
                    self.visit_expr(k);
                    self.visit_expr(v);
                }
            }
            Expr::BinOp(l, _, r) => {
                self.visit_expr(l);
                self.visit_expr(r);
            }
            Expr::UnaryOp(_, e) => self.visit_expr(e),
            Expr::Compare(first, rest) => {
                self.visit_expr(first);
                for (_, e) in rest {
                    self.visit_expr(e);
                }
            }
            Expr::BoolOp(_, items) => {
                for it in items {
                    self.visit_expr(it);
                }
            }
            Expr::Call { func, args } => {
                self.visit_expr(func);
                for a in args {
                    self.visit_expr(a);
                }
            }
            Expr::Attribute(base, _) => self.visit_expr(base),
            Expr::Subscript(base, idx) => {
                self.visit_expr(base);
                self.visit_expr(idx);
            }
            Expr::ListComp { element, generators } | Expr::SetComp { element, generators } => {
                self.visit_comprehensions(generators);
                self.visit_expr(element);
            }
            Expr::DictComp {
                key,
                value,
                generators,
            } => {
                self.visit_comprehensions(generators);
                self.visit_expr(key);
                self.visit_expr(value);
            }
        }
    }

    fn visit_comprehensions(&mut self, generators: &[ast::Comprehension]) {
        for g in generators {
            self.visit_write_target(&g.target);
            self.visit_expr(&g.iter);
            for cond in &g.ifs {
                self.visit_expr(cond);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::Cell;

    fn analysis_of(src: &str) -> CellAnalysis {
        analyze(&Cell::code("c1", src))
    }

    #[test]
    fn simple_assignment_is_write_only() {
        let a = analysis_of("x = 10");
        assert!(a.writes.contains("x"));
        assert!(a.reads.is_empty());
    }

    #[test]
    fn read_and_write() {
        let a = analysis_of("y = x + 5");
        assert!(a.reads.contains("x"));
        assert!(a.writes.contains("y"));
    }

    #[test]
    fn function_definition_hides_parameter() {
        let a = analysis_of("def greet(name):\n    return name\n");
        assert!(a.writes.contains("greet"));
        assert!(!a.reads.contains("name"));
    }

    #[test]
    fn builtin_excluded_from_reads() {
        let a = analysis_of("x = len(data)");
        assert!(!a.reads.contains("len"));
        assert!(a.reads.contains("data"));
        assert!(a.writes.contains("x"));
    }

    #[test]
    fn syntax_error_returns_empty_sets() {
        let a = analysis_of("def broken(");
        assert!(a.reads.is_empty());
        assert!(a.writes.is_empty());
    }

    #[test]
    fn chained_assignment_writes_all_targets() {
        let a = analysis_of("a = b = c = 10");
        assert!(a.writes.contains("a"));
        assert!(a.writes.contains("b"));
        assert!(a.writes.contains("c"));
    }

    #[test]
    fn augmented_assignment_requires_upstream_read() {
        let a = analysis_of("x += 1");
        assert!(a.reads.contains("x"));
        assert!(a.writes.contains("x"));
    }

    #[test]
    fn list_comprehension_tracks_iterable_read_and_target_write() {
        let a = analysis_of("squares = [x**2 for x in numbers]");
        assert!(a.reads.contains("numbers"));
        assert!(a.writes.contains("squares"));
    }

    #[test]
    fn import_statement_writes_alias() {
        let a = analysis_of("import pandas as pd");
        assert!(a.writes.contains("pd"));
    }

    #[test]
    fn data_query_cell_has_no_reads_and_writes_output_name() {
        let cell = Cell::data_query("q1", "SELECT * FROM users", Some("users_df".into()));
        let a = analyze(&cell);
        assert!(a.reads.is_empty());
        assert!(a.writes.contains("users_df"));
    }

    #[test]
    fn data_query_cell_without_as_uses_synthetic_name() {
        let cell = Cell::data_query("q1", "SELECT 1", None);
        let a = analyze(&cell);
        assert!(a.writes.contains("_query_q1"));
    }
}
