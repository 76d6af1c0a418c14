//! The Reactor: orchestration of reactive re-execution (`spec.md` §4.4).
//!
//! Grounded directly on `original_source/Backend/reactor.py`'s `Reactor`
//! class. Given a changed cell, the Reactor computes which cells need to
//! re-run (the changed cell plus everything downstream of it, in dependency
//! order), executes each in turn, and propagates failure as a `blocked`
//! status down the rest of that run rather than attempting to execute past
//! a broken upstream cell.

use std::collections::HashSet;

use crate::analyzer;
use crate::cell::{Cell, CellId, CellKind};
use crate::execute::{Executor, ExecutionResult, OutputKind};
use crate::graph;
use crate::notebook::find_cell_by_id;

/// A cell's lifecycle state, mirroring `reactor.py`'s `CellStatus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Idle,
    Running,
    Success,
    Error,
    Blocked,
}

/// Runtime state of one cell, mirroring `reactor.py`'s `CellState` dataclass.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CellState {
    pub cell_id: CellId,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    pub output_type: OutputKind,
    pub stdout: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_traceback: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked_by: Option<CellId>,
}

impl CellState {
    fn idle(cell_id: CellId) -> Self {
        CellState {
            cell_id,
            status: Status::Idle,
            output: None,
            output_type: OutputKind::Text,
            stdout: String::new(),
            error: None,
            error_traceback: None,
            blocked_by: None,
        }
    }
}

/// Called back on every status transition, the in-process analogue of the
/// prototype's WebSocket-notifying `StatusCallback`.
pub type StatusSubscriber = Box<dyn FnMut(&CellId, &CellState)>;

/// Dispatches a data-query cell to an external source of truth (a database
/// client, say) and returns its result. Takes `&mut Executor` so the
/// callback can call [`Executor::inject`] to publish its result into the
/// shared environment — the literal one-argument form in `spec.md` §6 can't
/// satisfy its own requirement that query executors call `inject` before
/// returning success, since that needs a live reference to the Executor
/// Adapter. Keeping this out of a captured global matches `spec.md` §9's
/// explicit anti-singleton design note.
pub type QueryExecutor<'a> = dyn FnMut(&Cell, &mut Executor) -> ExecutionResult + 'a;

/// Orchestrates reactive execution over a fixed set of cells, holding the
/// shared [`Executor`] and the latest [`CellState`] per cell.
pub struct Reactor {
    executor: Executor,
    cells: Vec<Cell>,
    states: std::collections::HashMap<CellId, CellState>,
    status_subscriber: Option<StatusSubscriber>,
}

impl Default for Reactor {
    fn default() -> Self {
        Self::new()
    }
}

impl Reactor {
    pub fn new() -> Self {
        Reactor {
            executor: Executor::new(),
            cells: Vec::new(),
            states: std::collections::HashMap::new(),
            status_subscriber: None,
        }
    }

    pub fn with_executor(executor: Executor) -> Self {
        Reactor {
            executor,
            cells: Vec::new(),
            states: std::collections::HashMap::new(),
            status_subscriber: None,
        }
    }

    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    pub fn executor_mut(&mut self) -> &mut Executor {
        &mut self.executor
    }

    /// Replace the managed cell set, initializing state for newly-seen
    /// cells and dropping state for cells no longer present.
    pub fn set_cells(&mut self, cells: Vec<Cell>) {
        for cell in &cells {
            self.states
                .entry(cell.id.clone())
                .or_insert_with(|| CellState::idle(cell.id.clone()));
        }
        let live: HashSet<&CellId> = cells.iter().map(|c| &c.id).collect();
        self.states.retain(|id, _| live.contains(id));
        self.cells = cells;
    }

    pub fn clear_cell_state(&mut self, id: &CellId) {
        self.states.remove(id);
    }

    pub fn set_status_subscriber(&mut self, subscriber: StatusSubscriber) {
        self.status_subscriber = Some(subscriber);
    }

    pub fn get_cell_state(&self, id: &CellId) -> Option<&CellState> {
        self.states.get(id)
    }

    pub fn all_states(&self) -> &std::collections::HashMap<CellId, CellState> {
        &self.states
    }

    fn notify(&mut self, id: &CellId) {
        if let Some(state) = self.states.get(id).cloned() {
            if let Some(subscriber) = self.status_subscriber.as_mut() {
                subscriber(id, &state);
            }
        }
    }

    fn update<F: FnOnce(&mut CellState)>(&mut self, id: &CellId, f: F) {
        if let Some(state) = self.states.get_mut(id) {
            f(state);
            tracing::trace!(cell = %id, status = ?state.status, "cell state transition");
        } else {
            return;
        }
        self.notify(id);
    }

    /// Run `cell_id` and everything downstream of it, in dependency order.
    ///
    /// Returns the [`CellState`] for every cell actually touched by this
    /// run (`spec.md` §4.4). A cycle anywhere in the notebook — not just
    /// reachable from `cell_id` — aborts the whole run and reports error
    /// states for the cells forming that cycle, mirroring
    /// `get_execution_order`'s graph-wide cycle check.
    pub fn run(&mut self, cell_id: &CellId, query_executor: Option<&mut QueryExecutor<'_>>) -> Vec<CellState> {
        let _span = tracing::debug_span!("reactor_run", cell = %cell_id).entered();
        let graph = graph::build(&self.cells);

        if let Some(cycle) = graph::detect_cycle(&graph) {
            tracing::warn!(cycle = ?cycle, "circular dependency blocks run");
            let message = format!(
                "Circular dependency detected: {}",
                cycle
                    .iter()
                    .map(CellId::as_str)
                    .collect::<Vec<_>>()
                    .join(" → ")
            );
            for cid in &cycle {
                self.update(cid, |state| {
                    state.status = Status::Error;
                    state.error = Some(message.clone());
                });
            }
            return cycle
                .iter()
                .filter_map(|cid| self.states.get(cid).cloned())
                .collect();
        }

        let downstream = graph::downstream(&graph, cell_id);
        // Seed the subset from `graph.cell_order()` rather than the
        // `HashSet`'s own iteration order, so sibling tie-breaking inside
        // `topo_sort` is deterministic run to run (spec.md §4.2 Tie-breaks).
        let to_execute: Vec<CellId> = graph
            .cell_order()
            .iter()
            .filter(|id| *id == cell_id || downstream.contains(id))
            .cloned()
            .collect();
        let order = graph::topo_sort(&graph, &to_execute);

        self.run_order(&graph, &order, query_executor)
    }

    /// Run every cell, starting from cells with no upstream dependencies
    /// (or the first cell, if every cell has one), mirroring
    /// `reactor.py::run_all_cells`.
    pub fn run_all(&mut self, mut query_executor: Option<&mut QueryExecutor<'_>>) -> Vec<CellState> {
        let _span = tracing::debug_span!("reactor_run_all", cells = self.cells.len()).entered();
        if self.cells.is_empty() {
            return Vec::new();
        }

        let graph = graph::build(&self.cells);
        let mut roots: Vec<CellId> = self
            .cells
            .iter()
            .filter(|c| graph.upstream_of(&c.id).is_empty())
            .map(|c| c.id.clone())
            .collect();
        if roots.is_empty() {
            roots.push(self.cells[0].id.clone());
        }

        let mut all_results = Vec::new();
        let mut executed: HashSet<CellId> = HashSet::new();

        for root in roots {
            if executed.contains(&root) {
                continue;
            }
            let results = self.run(&root, query_executor.as_deref_mut());
            for state in results {
                if executed.insert(state.cell_id.clone()) {
                    all_results.push(state);
                }
            }
        }

        all_results
    }

    fn run_order(
        &mut self,
        graph: &graph::DependencyGraph,
        order: &[CellId],
        mut query_executor: Option<&mut QueryExecutor<'_>>,
    ) -> Vec<CellState> {
        let mut results = Vec::new();
        let mut failed: HashSet<CellId> = HashSet::new();

        for cid in order {
            let Some(cell) = find_cell_by_id(&self.cells, cid).cloned() else {
                continue;
            };

            let blocking = graph
                .upstream_of(cid)
                .iter()
                .find(|dep| failed.contains(*dep))
                .cloned();

            if let Some(blocking_cell) = blocking {
                self.update(cid, |state| {
                    state.status = Status::Blocked;
                    state.blocked_by = Some(blocking_cell.clone());
                    state.error = Some(format!("Blocked by failed cell: {blocking_cell}"));
                });
                failed.insert(cid.clone());
                if let Some(state) = self.states.get(cid).cloned() {
                    results.push(state);
                }
                continue;
            }

            self.update(cid, |state| {
                state.status = Status::Running;
                state.blocked_by = None;
            });

            let exec_result = match cell.kind {
                CellKind::DataQuery => match query_executor.as_deref_mut() {
                    Some(run_query) => run_query(&cell, &mut self.executor),
                    None => {
                        tracing::warn!(cell = %cid, "data-query cell has no query executor configured");
                        ExecutionResult::failure("No database connection configured")
                    }
                },
                CellKind::Code => self.executor.execute(&cell),
            };

            if exec_result.success {
                self.update(cid, |state| {
                    state.status = Status::Success;
                    state.output = exec_result.rendered.clone();
                    state.output_type = exec_result.rendered_kind;
                    state.stdout = exec_result.stdout.clone();
                    state.error = None;
                    state.error_traceback = None;
                    state.blocked_by = None;
                });
            } else {
                self.update(cid, |state| {
                    state.status = Status::Error;
                    state.output = None;
                    state.stdout = exec_result.stdout.clone();
                    state.error = exec_result.error.clone();
                    state.error_traceback = exec_result.trace.clone();
                    state.blocked_by = None;
                });
                failed.insert(cid.clone());
            }

            if let Some(state) = self.states.get(cid).cloned() {
                results.push(state);
            }
        }

        results
    }

    /// Reset all cell states to idle and clear the shared environment back
    /// to its seeded state.
    pub fn reset(&mut self) {
        self.executor.reset_environment();
        for state in self.states.values_mut() {
            state.status = Status::Idle;
            state.output = None;
            state.output_type = OutputKind::Text;
            state.stdout.clear();
            state.error = None;
            state.error_traceback = None;
            state.blocked_by = None;
        }
    }

    /// Remove a cell from the managed set entirely, cleaning up after it.
    ///
    /// Mirrors `spec.md` §4.4's delete-cell cleanup algorithm: the cell's
    /// writes are computed (via the Analyzer, while it's still present in
    /// the cell list so its source is still reachable), the cell is removed
    /// from the list, each name it wrote is deleted from the shared
    /// Environment so no stale binding outlives it, and its `CellState` is
    /// dropped along with everyone else's reindexing via `set_cells`.
    pub fn delete_cell(&mut self, id: &CellId) {
        let Some(cell) = find_cell_by_id(&self.cells, id) else {
            return;
        };
        let analysis = analyzer::analyze(cell);

        let remaining: Vec<Cell> = self.cells.iter().filter(|c| &c.id != id).cloned().collect();

        for name in &analysis.writes {
            self.executor.environment_mut().remove(name);
        }

        self.clear_cell_state(id);
        self.set_cells(remaining);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_reactor(cells: Vec<Cell>) -> Reactor {
        let mut r = Reactor::new();
        r.set_cells(cells);
        r
    }

    #[test]
    fn spreadsheet_style_propagation_runs_downstream() {
        let mut r = new_reactor(vec![
            Cell::code("a", "x = 10"),
            Cell::code("b", "y = x + 5"),
        ]);
        let results = r.run(&CellId::new("a"), None);
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|s| s.status == Status::Success));
        assert_eq!(r.executor().get("y"), Some(&crate::value::Value::Int(15)));
    }

    #[test]
    fn error_blocks_downstream_cells() {
        let mut r = new_reactor(vec![
            Cell::code("a", "x = 1 / 0"),
            Cell::code("b", "y = x + 1"),
        ]);
        let results = r.run(&CellId::new("a"), None);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].status, Status::Error);
        assert_eq!(results[1].status, Status::Blocked);
        assert_eq!(results[1].blocked_by, Some(CellId::new("a")));
    }

    #[test]
    fn independent_cell_is_untouched_by_unrelated_run() {
        let mut r = new_reactor(vec![
            Cell::code("a", "x = 1"),
            Cell::code("b", "y = 2"),
        ]);
        let results = r.run(&CellId::new("a"), None);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].cell_id, CellId::new("a"));
    }

    #[test]
    fn cycle_blocks_the_whole_run_with_error_states() {
        let mut r = new_reactor(vec![Cell::code("a", "x = y"), Cell::code("b", "y = x")]);
        let results = r.run(&CellId::new("a"), None);
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|s| s.status == Status::Error));
        assert!(results[0].error.as_deref().unwrap().contains("Circular dependency detected"));
    }

    #[test]
    fn data_query_without_executor_fails_with_no_connection_message() {
        let mut r = new_reactor(vec![Cell::data_query("q1", "SELECT 1", Some("df".into()))]);
        let results = r.run(&CellId::new("q1"), None);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].status, Status::Error);
        assert_eq!(
            results[0].error.as_deref(),
            Some("No database connection configured")
        );
    }

    #[test]
    fn data_query_executor_can_inject_a_value() {
        let mut r = new_reactor(vec![
            Cell::data_query("q1", "SELECT 1", Some("df".into())),
            Cell::code("c2", "n = df + 1"),
        ]);
        let mut executor: Box<dyn FnMut(&Cell, &mut Executor) -> ExecutionResult> = Box::new(|cell, ex| {
            ex.inject(cell.resolved_output_name(), crate::value::Value::Int(41));
            ExecutionResult {
                success: true,
                stdout: String::new(),
                rendered: None,
                rendered_kind: OutputKind::Text,
                error: None,
                trace: None,
            }
        });
        let results = r.run(&CellId::new("q1"), Some(&mut executor));
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|s| s.status == Status::Success));
        assert_eq!(r.executor().get("n"), Some(&crate::value::Value::Int(42)));
    }

    #[test]
    fn run_all_covers_every_cell_from_roots() {
        let mut r = new_reactor(vec![
            Cell::code("a", "x = 1"),
            Cell::code("b", "y = 2"),
            Cell::code("c", "z = x + y"),
        ]);
        let results = r.run_all(None);
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|s| s.status == Status::Success));
    }

    #[test]
    fn reset_restores_idle_state_and_environment() {
        let mut r = new_reactor(vec![Cell::code("a", "x = 1")]);
        r.run(&CellId::new("a"), None);
        r.reset();
        let state = r.get_cell_state(&CellId::new("a")).unwrap();
        assert_eq!(state.status, Status::Idle);
        assert!(r.executor().get("x").is_none());
    }

    #[test]
    fn last_writer_wins_on_re_run() {
        let mut r = new_reactor(vec![
            Cell::code("a", "x = 1"),
            Cell::code("b", "x = 2"),
            Cell::code("c", "y = x"),
        ]);
        r.run_all(None);
        assert_eq!(r.executor().get("y"), Some(&crate::value::Value::Int(2)));
    }

    #[test]
    fn delete_cell_removes_its_written_names_from_the_environment() {
        let mut r = new_reactor(vec![Cell::code("a", "x = 1"), Cell::code("b", "y = 2")]);
        r.run_all(None);
        assert!(r.executor().get("x").is_some());

        r.delete_cell(&CellId::new("a"));

        assert!(r.executor().get("x").is_none());
        assert!(r.executor().get("y").is_some());
        assert!(r.get_cell_state(&CellId::new("a")).is_none());
        assert_eq!(r.all_states().len(), 1);
    }

    #[test]
    fn delete_cell_on_unknown_id_is_a_no_op() {
        let mut r = new_reactor(vec![Cell::code("a", "x = 1")]);
        r.delete_cell(&CellId::new("missing"));
        assert_eq!(r.all_states().len(), 1);
    }
}
