//! Command execution for the CLI.
//!
//! This module handles running CLI commands and producing output.

use crate::cli::Command;
use crate::config::{self, ForestConfig};
use crate::error::{Error, Result};
use crate::forest::{
    validate_title, ForestNode, Frequency, GoalKind, GoalStatus, GoalUpdate, NewGoal, NewTask,
    NodeKind, NodeStore, NodeType, SqliteStore, TaskUpdate, WeekdaySet,
};
use chrono::NaiveDate;
use serde::Serialize;
use std::path::Path;
use std::process::ExitCode;

/// Output from running the CLI, with separate stdout and stderr messages.
#[derive(Debug)]
pub struct CliOutput {
    /// Exit code for the process.
    pub exit_code: ExitCode,
    /// Messages to print to stdout.
    pub stdout: Vec<String>,
    /// Messages to print to stderr.
    pub stderr: Vec<String>,
}

/// Run a CLI command against the project in the current directory.
pub fn run(command: Command) -> CliOutput {
    match std::env::current_dir() {
        Ok(cwd) => run_in(command, &cwd),
        Err(e) => error_output(format!("Error: cannot determine current directory: {e}")),
    }
}

/// Run a CLI command against the project rooted at `base_dir`.
pub fn run_in(command: Command, base_dir: &Path) -> CliOutput {
    match command {
        Command::Version => run_version(),
        Command::EnsureConfig => run_ensure_config(base_dir),
        command => run_store_cmd(command, base_dir),
    }
}

// === Utility Commands ===

fn run_version() -> CliOutput {
    success_output(format!("goal-forest v{}", crate::VERSION))
}

fn run_ensure_config(base_dir: &Path) -> CliOutput {
    let config = match config::ensure_config(base_dir) {
        Ok(config) => config,
        Err(e) => return error_output(format!("Error ensuring config: {e}")),
    };
    let mut messages = vec![format!("Config ensured at {}", config::CONFIG_FILE_PATH)];
    match config.resolved_database_path(base_dir) {
        Ok(path) => messages.push(format!("  database: {}", path.display())),
        Err(e) => messages.push(format!("  database: ({e})")),
    }
    messages.push(format!("  log_level: {}", config.log_level()));
    CliOutput { exit_code: ExitCode::SUCCESS, stdout: vec![], stderr: messages }
}

// === Forest Commands ===

fn run_store_cmd(command: Command, base_dir: &Path) -> CliOutput {
    let runtime = match tokio::runtime::Builder::new_current_thread().build() {
        Ok(runtime) => runtime,
        Err(e) => return error_output(format!("Error starting runtime: {e}")),
    };

    runtime.block_on(async {
        let store = match open_store(base_dir).await {
            Ok(store) => store,
            Err(e) => return error_output(format!("Error opening forest: {e}")),
        };
        execute(&store, command).await.unwrap_or_else(|e| error_output(format!("Error: {e}")))
    })
}

async fn open_store(base_dir: &Path) -> Result<NodeStore<SqliteStore>> {
    let config = ForestConfig::load_from(base_dir)?.unwrap_or_default();
    let db_path = config.resolved_database_path(base_dir)?;
    let store = NodeStore::new(SqliteStore::new(db_path)?);
    store.initialize().await?;
    Ok(store)
}

async fn execute(store: &NodeStore<SqliteStore>, command: Command) -> Result<CliOutput> {
    match command {
        Command::Add { node_type, title, parent, description, frequency, days, date, measurement } => {
            let input = AddInput { title, parent, description, frequency, days, date, measurement };
            forest_add(store, NodeType::from_str(&node_type)?, input).await
        }
        Command::List { json } => Ok(forest_list(store, json)),
        Command::Update { node_type, id, title, description } => {
            forest_update(store, NodeType::from_str(&node_type)?, id, title, description).await
        }
        Command::Toggle { id } => {
            let done = store.toggle_task_completion(id).await?;
            let state = if done { "done" } else { "not done" };
            Ok(success_output(format!("Task {id} is now {state}")))
        }
        Command::Status { id, status } => {
            let status = GoalStatus::from_str(&status)?;
            store.update_goal_status(id, status).await?;
            Ok(success_output(format!("Node {id} is now {}", status.as_str())))
        }
        Command::Move { node_type, id, parent } => {
            store.move_node(id, NodeType::from_str(&node_type)?, parent).await?;
            let target = parent.map_or_else(|| "the root level".to_string(), |p| format!("node {p}"));
            Ok(success_output(format!("Moved {node_type} {id} under {target}")))
        }
        Command::Reorder { parent, node_type, ids } => {
            store.reorder_siblings(parent, &ids, NodeType::from_str(&node_type)?).await?;
            Ok(success_output(format!("Reordered {} nodes", ids.len())))
        }
        Command::Delete { node_type, id } => {
            let deleted = store.delete_node(id, NodeType::from_str(&node_type)?).await?;
            Ok(success_output(format!("Deleted {deleted} nodes")))
        }
        Command::EnsureConfig | Command::Version => {
            Err(Error::InvalidInput("command does not use the forest".to_string()))
        }
    }
}

struct AddInput {
    title: String,
    parent: Option<i64>,
    description: Option<String>,
    frequency: String,
    days: Vec<u8>,
    date: Option<String>,
    measurement: Option<String>,
}

async fn forest_add(
    store: &NodeStore<SqliteStore>,
    node_type: NodeType,
    input: AddInput,
) -> Result<CliOutput> {
    let title = validate_title(&input.title)?;
    let description = input.description.filter(|d| !d.trim().is_empty());

    let id = if let Some(kind) = GoalKind::from_node_type(node_type) {
        let new = NewGoal { title, description, parent_id: input.parent };
        store.add_goal_like(kind, new).await?
    } else {
        let parent_id = input
            .parent
            .ok_or_else(|| Error::InvalidInput("tasks need a --parent".to_string()))?;
        let weekly_days =
            if input.days.is_empty() { None } else { Some(WeekdaySet::from_days(&input.days)?) };
        let scheduled_date = input.date.as_deref().map(parse_date).transpose()?;
        let new = NewTask {
            title,
            description,
            parent_id,
            frequency: Frequency::from_str(&input.frequency)?,
            weekly_days,
            scheduled_date,
            measurement: input.measurement,
        };
        store.add_task(new).await?
    };

    match store.get_node(id, node_type) {
        Some(node) => Ok(json_output(&node)),
        None => Ok(success_output(format!("Added {node_type} {id}"))),
    }
}

async fn forest_update(
    store: &NodeStore<SqliteStore>,
    node_type: NodeType,
    id: i64,
    title: Option<String>,
    description: Option<String>,
) -> Result<CliOutput> {
    let title = title.as_deref().map(validate_title).transpose()?;
    let description = description.map(|d| Some(d).filter(|d| !d.trim().is_empty()));

    if node_type == NodeType::Task {
        store.update_task(id, TaskUpdate { title, description, ..TaskUpdate::default() }).await?;
    } else {
        store.update_goal(id, GoalUpdate { title, description, ..GoalUpdate::default() }).await?;
    }
    Ok(success_output(format!("Updated {node_type} {id}")))
}

fn forest_list(store: &NodeStore<SqliteStore>, json: bool) -> CliOutput {
    let snapshot = store.snapshot();
    if json {
        return json_output(snapshot.root_goals.as_ref());
    }
    if snapshot.root_goals.is_empty() {
        return success_output("No goals yet.".to_string());
    }
    let mut lines = Vec::new();
    for root in snapshot.root_goals.iter() {
        render_tree(root, 0, &mut lines);
    }
    CliOutput { exit_code: ExitCode::SUCCESS, stdout: lines, stderr: vec![] }
}

fn render_tree(tree: &ForestNode, depth: usize, lines: &mut Vec<String>) {
    let node = &tree.node;
    let marker = match &node.kind {
        NodeKind::Task(details) if details.is_completed => "[x]".to_string(),
        NodeKind::Task(details) => format!("[ ] ({})", details.frequency.as_str()),
        _ => format!("({})", node.status().unwrap_or_default().as_str()),
    };
    lines.push(format!(
        "{}{} #{}: {} {marker}",
        "  ".repeat(depth),
        node.node_type(),
        node.id,
        node.title
    ));
    for child in &tree.children {
        render_tree(child, depth + 1, lines);
    }
}

fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| Error::InvalidInput(format!("invalid date: '{value}' (expected YYYY-MM-DD)")))
}

fn json_output<T: Serialize + ?Sized>(value: &T) -> CliOutput {
    match serde_json::to_string_pretty(value) {
        Ok(json) => CliOutput { exit_code: ExitCode::SUCCESS, stdout: vec![json], stderr: vec![] },
        Err(e) => error_output(e.to_string()),
    }
}

fn success_output(message: String) -> CliOutput {
    CliOutput { exit_code: ExitCode::SUCCESS, stdout: vec![message], stderr: vec![] }
}

fn error_output(message: String) -> CliOutput {
    CliOutput { exit_code: ExitCode::from(1), stdout: vec![], stderr: vec![message] }
}
