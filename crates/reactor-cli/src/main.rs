//! `reactor`: a headless runner for reactor notebook files.
//!
//! Loads a notebook's plain-text cells, runs them against a
//! [`reactor_core::Reactor`], and prints each cell's resulting status and
//! output to the terminal. No server, no file watching — just load, run,
//! report.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use reactor_core::{CellId, CellState, Reactor, Status};

#[derive(Parser)]
#[command(name = "reactor", about = "Run a reactor notebook headlessly")]
struct Cli {
    /// Path to the notebook file (`.py` with `# %%` cell markers).
    notebook: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,

    /// Enable verbose tracing output.
    #[arg(long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Run one cell and everything downstream of it (default if omitted).
    Run {
        /// The cell ID to run.
        cell: String,
    },
    /// Run every cell in the notebook, in dependency order.
    RunAll,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .init();
    }

    match run(cli) {
        Ok(had_failure) => {
            if had_failure {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<bool> {
    let cells = reactor_core::notebook::parse_notebook_file(&cli.notebook)?;
    if cells.is_empty() {
        eprintln!("notebook has no cells");
        return Ok(false);
    }

    let mut reactor = Reactor::new();
    reactor.set_cells(cells);

    let results = match cli.command {
        Some(Command::Run { cell }) => reactor.run(&CellId::new(cell), None),
        Some(Command::RunAll) | None => reactor.run_all(None),
    };

    let mut had_failure = false;
    for state in &results {
        print_state(state);
        if matches!(state.status, Status::Error | Status::Blocked) {
            had_failure = true;
        }
    }

    Ok(had_failure)
}

fn print_state(state: &CellState) {
    let marker = match state.status {
        Status::Success => "ok",
        Status::Error => "error",
        Status::Blocked => "blocked",
        Status::Running => "running",
        Status::Idle => "idle",
    };
    println!("[{marker}] {}", state.cell_id);

    if !state.stdout.is_empty() {
        for line in state.stdout.lines() {
            println!("  | {line}");
        }
    }
    if let Some(output) = &state.output {
        println!("  => {output}");
    }
    if let Some(error) = &state.error {
        println!("  ! {error}");
    }
    if let Some(blocked_by) = &state.blocked_by {
        println!("  blocked by: {blocked_by}");
    }
}
