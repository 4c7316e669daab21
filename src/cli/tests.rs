//! Tests for the CLI module.

use super::*;
use crate::config::ForestConfig;
use std::path::Path;
use std::process::ExitCode;
use tempfile::TempDir;

/// A project directory whose config points the database into the temp dir.
fn project() -> TempDir {
    let dir = TempDir::new().unwrap();
    let config = ForestConfig { database_path: Some("forest.sqlite3".into()), log_level: None };
    config.save_to(dir.path()).unwrap();
    dir
}

fn add(node_type: &str, title: &str, parent: Option<i64>) -> Command {
    Command::Add {
        node_type: node_type.to_string(),
        title: title.to_string(),
        parent,
        description: None,
        frequency: "once".to_string(),
        days: vec![],
        date: None,
        measurement: None,
    }
}

fn ok(command: Command, dir: &Path) -> Vec<String> {
    let output = run_in(command, dir);
    assert_eq!(output.exit_code, ExitCode::SUCCESS, "stderr: {:?}", output.stderr);
    output.stdout
}

fn list(dir: &Path) -> Vec<String> {
    ok(Command::List { json: false }, dir)
}

#[test]
fn test_command_needs_store() {
    assert!(!Command::Version.needs_store());
    assert!(!Command::EnsureConfig.needs_store());
    assert!(Command::List { json: false }.needs_store());
    assert!(Command::Toggle { id: 1 }.needs_store());
}

#[test]
fn test_cli_parses_add() {
    use clap::Parser;
    let cli = Cli::try_parse_from([
        "goal-forest", "add", "task", "Run", "--parent", "2", "--frequency", "weekly", "--days", "1,3",
    ])
    .unwrap();
    match cli.command {
        Command::Add { node_type, parent, days, frequency, .. } => {
            assert_eq!(node_type, "task");
            assert_eq!(parent, Some(2));
            assert_eq!(days, vec![1, 3]);
            assert_eq!(frequency, "weekly");
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn test_cli_reorder_requires_ids() {
    use clap::Parser;
    assert!(Cli::try_parse_from(["goal-forest", "reorder"]).is_err());
    let cli = Cli::try_parse_from(["goal-forest", "reorder", "-t", "task", "3", "1"]).unwrap();
    assert!(matches!(cli.command, Command::Reorder { ref ids, .. } if ids == &[3, 1]));
}

#[test]
fn test_version() {
    let output = run_in(Command::Version, Path::new("."));
    assert_eq!(output.exit_code, ExitCode::SUCCESS);
    assert!(output.stdout[0].starts_with("goal-forest v"));
}

#[test]
fn test_ensure_config_creates_file() {
    let dir = TempDir::new().unwrap();
    let output = run_in(Command::EnsureConfig, dir.path());
    assert_eq!(output.exit_code, ExitCode::SUCCESS);
    assert!(dir.path().join(crate::config::CONFIG_FILE_PATH).exists());
}

#[test]
fn test_empty_forest_lists_placeholder() {
    let dir = project();
    assert_eq!(list(dir.path()), vec!["No goals yet."]);
}

#[test]
fn test_add_and_list_tree() {
    let dir = project();
    ok(add("goal", "Buy a House", None), dir.path());
    ok(add("milestone", "Financial Prep", Some(1)), dir.path());
    let created = ok(add("task", "Save money", Some(2)), dir.path());
    assert!(created[0].contains("\"nodeType\": \"task\""));

    assert_eq!(
        list(dir.path()),
        vec![
            "goal #1: Buy a House (active)",
            "  milestone #2: Financial Prep (active)",
            "    task #1: Save money [ ] (once)",
        ]
    );
}

#[test]
fn test_add_rejects_bad_input() {
    let dir = project();
    let blank = run_in(add("goal", "   ", None), dir.path());
    assert_eq!(blank.exit_code, ExitCode::from(1));

    let orphan_task = run_in(add("task", "Run", None), dir.path());
    assert!(orphan_task.stderr[0].contains("--parent"));

    let bad_type = run_in(add("epic", "x", None), dir.path());
    assert!(bad_type.stderr[0].contains("invalid node type"));

    let missing_parent = run_in(add("milestone", "x", Some(42)), dir.path());
    assert!(missing_parent.stderr[0].contains("parent not found: 42"));
}

#[test]
fn test_toggle_status_and_update() {
    let dir = project();
    ok(add("goal", "Fitness", None), dir.path());
    ok(add("task", "Run", Some(1)), dir.path());

    assert_eq!(ok(Command::Toggle { id: 1 }, dir.path()), vec!["Task 1 is now done"]);
    ok(Command::Status { id: 1, status: "completed".to_string() }, dir.path());
    ok(
        Command::Update {
            node_type: "goal".to_string(),
            id: 1,
            title: Some("Health".to_string()),
            description: None,
        },
        dir.path(),
    );

    assert_eq!(list(dir.path()), vec!["goal #1: Health (completed)", "  task #1: Run [x]"]);
    assert_eq!(ok(Command::Toggle { id: 1 }, dir.path()), vec!["Task 1 is now not done"]);
}

#[test]
fn test_move_reorder_and_delete() {
    let dir = project();
    ok(add("goal", "G1", None), dir.path());
    ok(add("goal", "G2", None), dir.path());
    ok(add("goal", "G3", None), dir.path());

    ok(Command::Reorder { parent: None, node_type: "goal".to_string(), ids: vec![3, 1, 2] }, dir.path());
    let lines = list(dir.path());
    assert!(lines[0].contains("G3") && lines[1].contains("G1") && lines[2].contains("G2"));

    let cycle = run_in(
        Command::Move { node_type: "goal".to_string(), id: 1, parent: Some(1) },
        dir.path(),
    );
    assert!(cycle.stderr[0].contains("own descendant"));

    ok(Command::Move { node_type: "goal".to_string(), id: 2, parent: Some(1) }, dir.path());
    assert_eq!(
        ok(Command::Delete { node_type: "goal".to_string(), id: 1 }, dir.path()),
        vec!["Deleted 2 nodes"]
    );
    assert_eq!(list(dir.path()), vec!["goal #3: G3 (active)"]);
}

#[test]
fn test_list_json() {
    let dir = project();
    ok(add("goal", "G", None), dir.path());
    let json = ok(Command::List { json: true }, dir.path());
    let value: serde_json::Value = serde_json::from_str(&json[0]).unwrap();
    assert_eq!(value[0]["title"], "G");
    assert_eq!(value[0]["children"], serde_json::json!([]));
}
