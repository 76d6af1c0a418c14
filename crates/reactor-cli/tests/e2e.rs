//! End-to-end tests for the `reactor` CLI binary.
//!
//! These tests verify the CLI produces expected output when run against
//! real notebook files on disk, rather than exercising `Reactor` directly.

use std::fs;
use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// A temp directory holding a single notebook file.
struct TestNotebook {
    _temp_dir: TempDir,
    notebook_path: PathBuf,
}

impl TestNotebook {
    fn new(filename: &str, source: &str) -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp directory");
        let notebook_path = temp_dir.path().join(filename);
        fs::write(&notebook_path, source).expect("failed to write notebook");

        Self {
            _temp_dir: temp_dir,
            notebook_path,
        }
    }

    fn path(&self) -> &PathBuf {
        &self.notebook_path
    }
}

fn spreadsheet_notebook() -> String {
    "\
# %% [id: a]
x = 10

# %% [id: b]
y = x + 5

# %% [id: c]
z = y * 2
"
    .to_string()
}

#[test]
fn run_all_executes_every_cell_in_order() {
    let notebook = TestNotebook::new("spreadsheet.py", &spreadsheet_notebook());

    Command::cargo_bin("reactor")
        .expect("failed to find reactor binary")
        .args([notebook.path().to_str().unwrap(), "run-all"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[ok] a"))
        .stdout(predicate::str::contains("[ok] b"))
        .stdout(predicate::str::contains("[ok] c"));
}

#[test]
fn run_defaults_to_run_all_when_no_subcommand_is_given() {
    let notebook = TestNotebook::new("default.py", &spreadsheet_notebook());

    Command::cargo_bin("reactor")
        .expect("failed to find reactor binary")
        .arg(notebook.path().to_str().unwrap())
        .assert()
        .success()
        .stdout(predicate::str::contains("[ok] a"))
        .stdout(predicate::str::contains("[ok] c"));
}

#[test]
fn run_single_cell_only_touches_itself_and_its_downstream() {
    // `b` is a root (no reads), `c` reads `y` so depends on `b`, and `a` is
    // an unrelated root that shares no names with either. `run b` must
    // execute `{b} ∪ downstream(b)` = `{b, c}` and never touch `a`
    // (spec.md §4.4) — running a cell never pulls in its own upstream.
    let source = "\
# %% [id: a]
x = 10

# %% [id: b]
y = 5

# %% [id: c]
z = y * 2
";
    let notebook = TestNotebook::new("partial.py", source);

    Command::cargo_bin("reactor")
        .expect("failed to find reactor binary")
        .args([notebook.path().to_str().unwrap(), "run", "b"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[ok] b"))
        .stdout(predicate::str::contains("[ok] c"))
        .stdout(predicate::str::contains("[ok] a").not());
}

#[test]
fn error_in_a_cell_reports_error_and_blocks_downstream() {
    let source = "\
# %% [id: a]
x = 1 / 0

# %% [id: b]
y = x + 1
";
    let notebook = TestNotebook::new("failing.py", source);

    Command::cargo_bin("reactor")
        .expect("failed to find reactor binary")
        .args([notebook.path().to_str().unwrap(), "run-all"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("[error] a"))
        .stdout(predicate::str::contains("division by zero"))
        .stdout(predicate::str::contains("[blocked] b"))
        .stdout(predicate::str::contains("blocked by: a"));
}

#[test]
fn notebook_with_no_cells_reports_nothing_to_run() {
    let notebook = TestNotebook::new("empty.py", "# just a comment, no cell markers\n");

    Command::cargo_bin("reactor")
        .expect("failed to find reactor binary")
        .args([notebook.path().to_str().unwrap(), "run-all"])
        .assert()
        .success()
        .stderr(predicate::str::contains("no cells"));
}

#[test]
fn nonexistent_notebook_path_fails_with_an_io_error() {
    Command::cargo_bin("reactor")
        .expect("failed to find reactor binary")
        .args(["/nonexistent/notebook.py", "run-all"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
fn help_lists_the_run_and_run_all_subcommands() {
    Command::cargo_bin("reactor")
        .expect("failed to find reactor binary")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run-all"));
}
