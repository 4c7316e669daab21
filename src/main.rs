//! CLI binary for `goal_forest`.
//!
//! This binary is a thin wrapper that parses arguments and delegates to the library.

use std::process::ExitCode;

use clap::Parser;
use goal_forest::cli::{run, Cli};
use goal_forest::config::ForestConfig;
use goal_forest::logging;

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.command.needs_store() {
        init_logging();
    }

    let output = run(cli.command);

    for msg in output.stdout {
        println!("{msg}");
    }
    for msg in output.stderr {
        eprintln!("{msg}");
    }

    output.exit_code
}

/// Best effort: a missing home directory or unwritable log must not stop the command.
fn init_logging() {
    let Ok(cwd) = std::env::current_dir() else {
        return;
    };
    let config = ForestConfig::load_from(&cwd).ok().flatten().unwrap_or_default();
    let result = config
        .resolved_log_path(&cwd)
        .and_then(|path| logging::init(&path, config.log_level()));
    if let Err(e) = result {
        eprintln!("Warning: logging init failed: {e}");
    }
}
