//! End-to-end tests of the full notebook pipeline: parse notebook text,
//! build the dependency graph implied by its cells, run it reactively
//! through a [`Reactor`], and check the resulting cell states and shared
//! environment.

use reactor_core::{Cell, CellId, Reactor, Status, Value};
use reactor_core::notebook;

fn reactor_with(notebook_source: &str) -> (Reactor, Vec<CellId>) {
    let cells = notebook::parse_notebook(notebook_source);
    let ids = cells.iter().map(|c| c.id.clone()).collect();
    let mut reactor = Reactor::new();
    reactor.set_cells(cells);
    (reactor, ids)
}

#[test]
fn spreadsheet_style_change_propagates_to_dependents() {
    let source = "\
# %% [id: a]
x = 10

# %% [id: b]
y = x + 5

# %% [id: c]
z = y * 2
";
    let (mut reactor, _ids) = reactor_with(source);
    let results = reactor.run_all(None);

    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|s| s.status == Status::Success));
    assert_eq!(reactor.executor().get("z"), Some(&Value::Int(30)));

    // Re-running from `a` alone after changing it downstream should repropagate.
    let results = reactor.run(&CellId::new("a"), None);
    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|s| s.status == Status::Success));
}

#[test]
fn error_in_upstream_cell_blocks_downstream_cells() {
    let source = "\
# %% [id: a]
x = 1 / 0

# %% [id: b]
y = x + 1

# %% [id: c]
z = y + 1
";
    let (mut reactor, _ids) = reactor_with(source);
    let results = reactor.run(&CellId::new("a"), None);

    assert_eq!(results.len(), 3);
    let by_id = |id: &str| results.iter().find(|s| s.cell_id.as_str() == id).unwrap();
    assert_eq!(by_id("a").status, Status::Error);
    assert_eq!(by_id("b").status, Status::Blocked);
    assert_eq!(by_id("b").blocked_by, Some(CellId::new("a")));
    assert_eq!(by_id("c").status, Status::Blocked);
}

#[test]
fn independent_cell_is_not_touched_by_an_unrelated_run() {
    let source = "\
# %% [id: a]
x = 1

# %% [id: b]
y = x + 1

# %% [id: c]
unrelated = 42
";
    let (mut reactor, _ids) = reactor_with(source);
    let results = reactor.run(&CellId::new("a"), None);

    let touched: Vec<&str> = results.iter().map(|s| s.cell_id.as_str()).collect();
    assert!(touched.contains(&"a"));
    assert!(touched.contains(&"b"));
    assert!(!touched.contains(&"c"));

    // `c`'s state remains idle since it was never run.
    let state_c = reactor.get_cell_state(&CellId::new("c")).unwrap();
    assert_eq!(state_c.status, Status::Idle);
}

#[test]
fn last_writer_of_a_name_wins_the_dependency_edge() {
    let source = "\
# %% [id: a]
x = 1

# %% [id: b]
x = 2

# %% [id: c]
y = x
";
    let (mut reactor, _ids) = reactor_with(source);
    reactor.run_all(None);
    assert_eq!(reactor.executor().get("y"), Some(&Value::Int(2)));
}

#[test]
fn circular_dependency_reports_error_states_for_every_cell_in_the_cycle() {
    let source = "\
# %% [id: a]
x = y

# %% [id: b]
y = x
";
    let (mut reactor, _ids) = reactor_with(source);
    let results = reactor.run(&CellId::new("a"), None);

    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|s| s.status == Status::Error));
    assert!(results
        .iter()
        .all(|s| s.error.as_deref().unwrap().starts_with("Circular dependency detected:")));
}

#[test]
fn augmented_assignment_requires_rerun_when_upstream_changes() {
    let source = "\
# %% [id: a]
x = 10

# %% [id: b]
x += 5
";
    let (mut reactor, _ids) = reactor_with(source);
    let results = reactor.run_all(None);
    assert!(results.iter().all(|s| s.status == Status::Success));
    assert_eq!(reactor.executor().get("x"), Some(&Value::Int(15)));
}

#[test]
fn deleting_an_upstream_cell_errors_its_former_dependents_on_next_run() {
    let source = "\
# %% [id: a]
counter = 0

# %% [id: b]
counter += 1
";
    let (mut reactor, _ids) = reactor_with(source);
    let results = reactor.run_all(None);
    assert!(results.iter().all(|s| s.status == Status::Success));
    assert_eq!(reactor.executor().get("counter"), Some(&Value::Int(1)));

    reactor.delete_cell(&CellId::new("a"));
    assert!(reactor.executor().get("counter").is_none());

    let results = reactor.run(&CellId::new("b"), None);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].status, Status::Error);
    assert!(results[0].error.as_deref().unwrap().contains("counter"));
}

#[test]
fn notebook_round_trips_through_serialize_and_parse() {
    let cells = vec![
        Cell::code("a", "x = 1"),
        Cell::data_query("b", "SELECT * FROM t", Some("t_df".to_string())),
        Cell::code("c", "y = x + 1"),
    ];
    let text = notebook::serialize_notebook(&cells);
    let parsed = notebook::parse_notebook(&text);
    assert_eq!(parsed, cells);
}

#[test]
fn data_query_cell_result_is_injected_and_usable_downstream() {
    let source = "\
# %% [id: q1, type: sql, as: total]
SELECT count(*) FROM users

# %% [id: c2]
n = total + 1
";
    let (mut reactor, _ids) = reactor_with(source);

    let mut query_executor =
        |cell: &Cell, executor: &mut reactor_core::Executor| -> reactor_core::ExecutionResult {
            executor.inject(cell.resolved_output_name(), Value::Int(9));
            reactor_core::ExecutionResult {
                success: true,
                stdout: String::new(),
                rendered: None,
                rendered_kind: reactor_core::OutputKind::Text,
                error: None,
                trace: None,
            }
        };

    let results = reactor.run(&CellId::new("q1"), Some(&mut query_executor));
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|s| s.status == Status::Success));
    assert_eq!(reactor.executor().get("n"), Some(&Value::Int(10)));
}

#[test]
fn data_query_cell_without_executor_fails_cleanly() {
    let source = "\
# %% [id: q1, type: sql]
SELECT 1
";
    let (mut reactor, _ids) = reactor_with(source);
    let results = reactor.run(&CellId::new("q1"), None);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].status, Status::Error);
    assert_eq!(
        results[0].error.as_deref(),
        Some("No database connection configured")
    );
}

#[test]
fn reset_clears_environment_and_cell_state() {
    let source = "\
# %% [id: a]
x = 10
";
    let (mut reactor, _ids) = reactor_with(source);
    reactor.run_all(None);
    assert!(reactor.executor().get("x").is_some());

    reactor.reset();
    assert!(reactor.executor().get("x").is_none());
    let state = reactor.get_cell_state(&CellId::new("a")).unwrap();
    assert_eq!(state.status, Status::Idle);
}

#[test]
fn deleting_a_cell_removes_it_from_future_runs() {
    let source = "\
# %% [id: a]
x = 1

# %% [id: b]
y = 2
";
    let (mut reactor, _ids) = reactor_with(source);
    reactor.delete_cell(&CellId::new("b"));
    let results = reactor.run_all(None);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].cell_id, CellId::new("a"));
    assert!(reactor.get_cell_state(&CellId::new("b")).is_none());
}
