//! `SQLite` durable store.
//!
//! Goal-like nodes and tasks live in two separate tables (`goals`, `tasks`),
//! next to an unrelated `settings` key-value table. Each operation opens its
//! own connection on a blocking worker thread; the store itself only holds
//! the database path, which keeps it `Clone` and free of locking.

use crate::error::{Error, Result};
use crate::forest::adapter::{DurableStore, GoalIndex, Table, TaskIndex};
use crate::forest::models::{
    Frequency, GoalKind, GoalPatch, GoalRecord, GoalStatus, NodeId, SettingRecord, TaskPatch,
    TaskRecord, WeekdaySet,
};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, ToSql};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const GOAL_COLUMNS: &str =
    "id, title, description, type, status, parent_id, sort_order, created_at";

const TASK_COLUMNS: &str = "id, parent_id, title, description, frequency, weekly_days, \
     scheduled_date, measurement, is_completed, sort_order, created_at";

/// SQLite-based durable store.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    db_path: Arc<PathBuf>,
    goals: SqliteGoals,
    tasks: SqliteTasks,
}

impl SqliteStore {
    /// Open (creating if needed) a store at the given database path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialized.
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = Arc::new(db_path.as_ref().to_path_buf());
        let conn = open(&db_path)?;
        init_schema(&conn)?;
        Ok(Self {
            goals: SqliteGoals { db_path: Arc::clone(&db_path) },
            tasks: SqliteTasks { db_path: Arc::clone(&db_path) },
            db_path,
        })
    }

    /// Get the database path.
    #[must_use]
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }
}

impl DurableStore for SqliteStore {
    type Goals = SqliteGoals;
    type Tasks = SqliteTasks;

    fn goals(&self) -> &Self::Goals {
        &self.goals
    }

    fn tasks(&self) -> &Self::Tasks {
        &self.tasks
    }

    async fn get_setting(&self, key: &str) -> Result<Option<SettingRecord>> {
        let key = key.to_string();
        with_connection(&self.db_path, move |conn| {
            let record = conn
                .query_row(
                    "SELECT key, value FROM settings WHERE key = ?1",
                    params![key],
                    |row| Ok(SettingRecord { key: row.get(0)?, value: row.get(1)? }),
                )
                .optional()?;
            Ok(record)
        })
        .await
    }

    async fn set_setting(&self, record: SettingRecord) -> Result<()> {
        with_connection(&self.db_path, move |conn| {
            conn.execute(
                "INSERT INTO settings (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![record.key, record.value],
            )?;
            Ok(())
        })
        .await
    }
}

/// The `goals` table.
#[derive(Debug, Clone)]
pub struct SqliteGoals {
    db_path: Arc<PathBuf>,
}

/// The `tasks` table.
#[derive(Debug, Clone)]
pub struct SqliteTasks {
    db_path: Arc<PathBuf>,
}

/// Open a connection to the database.
fn open(db_path: &Path) -> Result<Connection> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode = WAL;")?;
    Ok(conn)
}

/// Initialize the database schema.
fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r"
        -- Goals, milestones and requirements
        CREATE TABLE IF NOT EXISTS goals (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            description TEXT,
            type TEXT NOT NULL CHECK (type IN ('goal', 'milestone', 'requirement')),
            status TEXT NOT NULL DEFAULT 'active' CHECK (status IN ('active', 'completed')),
            parent_id INTEGER,
            sort_order INTEGER,
            created_at TEXT NOT NULL
        );

        -- Tasks (always leaves; parent_id points into goals)
        CREATE TABLE IF NOT EXISTS tasks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            parent_id INTEGER,
            title TEXT NOT NULL,
            description TEXT,
            frequency TEXT NOT NULL CHECK (frequency IN ('once', 'daily', 'weekly', 'custom')),
            weekly_days INTEGER,
            scheduled_date TEXT,
            measurement TEXT,
            is_completed INTEGER NOT NULL DEFAULT 0,
            sort_order INTEGER,
            created_at TEXT NOT NULL
        );

        -- Key-value settings
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_goals_parent_id ON goals(parent_id);
        CREATE INDEX IF NOT EXISTS idx_goals_type ON goals(type);
        CREATE INDEX IF NOT EXISTS idx_tasks_parent_id ON tasks(parent_id);
        ",
    )?;
    Ok(())
}

/// Run `f` against a fresh connection on the blocking thread pool.
async fn with_connection<T, F>(db_path: &Arc<PathBuf>, f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&Connection) -> Result<T> + Send + 'static,
{
    let db_path = Arc::clone(db_path);
    tokio::task::spawn_blocking(move || {
        let conn = open(&db_path)?;
        f(&conn)
    })
    .await
    .map_err(|e| Error::Backend(format!("storage worker failed: {e}")))?
}

/// Execute a dynamic `UPDATE ... SET` built from `(column, value)` pairs.
fn execute_update(
    conn: &Connection,
    table: &str,
    id: NodeId,
    sets: Vec<(&'static str, Box<dyn ToSql>)>,
) -> Result<bool> {
    if sets.is_empty() {
        let exists: bool = conn.query_row(
            &format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE id = ?1)"),
            params![id],
            |row| row.get(0),
        )?;
        return Ok(exists);
    }

    let assignments: Vec<String> = sets.iter().map(|(column, _)| format!("{column} = ?")).collect();
    let mut values: Vec<Box<dyn ToSql>> = sets.into_iter().map(|(_, value)| value).collect();
    values.push(Box::new(id));

    let sql = format!("UPDATE {table} SET {} WHERE id = ?", assignments.join(", "));
    let rows = conn.execute(&sql, params_from_iter(values.iter()))?;
    Ok(rows > 0)
}

fn bulk_delete_rows(conn: &mut Connection, table: &str, ids: &[NodeId]) -> Result<()> {
    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare(&format!("DELETE FROM {table} WHERE id = ?1"))?;
        for id in ids {
            stmt.execute(params![id])?;
        }
    }
    tx.commit()?;
    Ok(())
}

/// Parse a goal from a row selected with [`GOAL_COLUMNS`].
fn parse_goal(row: &rusqlite::Row) -> rusqlite::Result<GoalRecord> {
    let kind: String = row.get(3)?;
    let status: String = row.get(4)?;
    Ok(GoalRecord {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        kind: parse_goal_kind(&kind),
        status: GoalStatus::from_str(&status).unwrap_or_default(),
        parent_id: row.get(5)?,
        order: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn parse_goal_kind(s: &str) -> GoalKind {
    match s {
        "milestone" => GoalKind::Milestone,
        "requirement" => GoalKind::Requirement,
        _ => GoalKind::Goal,
    }
}

/// Parse a task from a row selected with [`TASK_COLUMNS`].
fn parse_task(row: &rusqlite::Row) -> rusqlite::Result<TaskRecord> {
    let frequency: String = row.get(4)?;
    let weekly_days: Option<u8> = row.get(5)?;
    Ok(TaskRecord {
        id: row.get(0)?,
        parent_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        frequency: Frequency::from_str(&frequency).unwrap_or_default(),
        weekly_days: weekly_days.map(WeekdaySet::from_bits),
        scheduled_date: row.get(6)?,
        measurement: row.get(7)?,
        is_completed: row.get(8)?,
        order: row.get(9)?,
        created_at: row.get(10)?,
    })
}

fn goal_sets(patch: &GoalPatch) -> Vec<(&'static str, Box<dyn ToSql>)> {
    let mut sets: Vec<(&'static str, Box<dyn ToSql>)> = Vec::new();
    if let Some(ref title) = patch.title {
        sets.push(("title", Box::new(title.clone())));
    }
    if let Some(ref description) = patch.description {
        sets.push(("description", Box::new(description.clone())));
    }
    if let Some(status) = patch.status {
        sets.push(("status", Box::new(status.as_str())));
    }
    if let Some(parent_id) = patch.parent_id {
        sets.push(("parent_id", Box::new(parent_id)));
    }
    if let Some(order) = patch.order {
        sets.push(("sort_order", Box::new(order)));
    }
    sets
}

fn task_sets(patch: &TaskPatch) -> Vec<(&'static str, Box<dyn ToSql>)> {
    let mut sets: Vec<(&'static str, Box<dyn ToSql>)> = Vec::new();
    if let Some(ref title) = patch.title {
        sets.push(("title", Box::new(title.clone())));
    }
    if let Some(ref description) = patch.description {
        sets.push(("description", Box::new(description.clone())));
    }
    if let Some(frequency) = patch.frequency {
        sets.push(("frequency", Box::new(frequency.as_str())));
    }
    if let Some(weekly_days) = patch.weekly_days {
        sets.push(("weekly_days", Box::new(weekly_days.map(WeekdaySet::bits))));
    }
    if let Some(scheduled_date) = patch.scheduled_date {
        sets.push(("scheduled_date", Box::new(scheduled_date)));
    }
    if let Some(ref measurement) = patch.measurement {
        sets.push(("measurement", Box::new(measurement.clone())));
    }
    if let Some(is_completed) = patch.is_completed {
        sets.push(("is_completed", Box::new(is_completed)));
    }
    if let Some(parent_id) = patch.parent_id {
        sets.push(("parent_id", Box::new(parent_id)));
    }
    if let Some(order) = patch.order {
        sets.push(("sort_order", Box::new(order)));
    }
    sets
}

impl Table<GoalRecord> for SqliteGoals {
    async fn add(&self, record: GoalRecord) -> Result<NodeId> {
        with_connection(&self.db_path, move |conn| {
            conn.execute(
                "INSERT INTO goals (title, description, type, status, parent_id, sort_order, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    record.title,
                    record.description,
                    record.kind.as_str(),
                    record.status.as_str(),
                    record.parent_id,
                    record.order,
                    record.created_at,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    async fn get(&self, id: NodeId) -> Result<Option<GoalRecord>> {
        with_connection(&self.db_path, move |conn| {
            let record = conn
                .query_row(
                    &format!("SELECT {GOAL_COLUMNS} FROM goals WHERE id = ?1"),
                    params![id],
                    parse_goal,
                )
                .optional()?;
            Ok(record)
        })
        .await
    }

    async fn update(&self, id: NodeId, patch: &GoalPatch) -> Result<bool> {
        // Boxed ToSql values are not Send; the SET list is built on the worker.
        let patch = patch.clone();
        with_connection(&self.db_path, move |conn| {
            execute_update(conn, "goals", id, goal_sets(&patch))
        })
        .await
    }

    async fn delete(&self, id: NodeId) -> Result<()> {
        with_connection(&self.db_path, move |conn| {
            conn.execute("DELETE FROM goals WHERE id = ?1", params![id])?;
            Ok(())
        })
        .await
    }

    async fn bulk_delete(&self, ids: &[NodeId]) -> Result<()> {
        let ids = ids.to_vec();
        let db_path = Arc::clone(&self.db_path);
        tokio::task::spawn_blocking(move || {
            let mut conn = open(&db_path)?;
            bulk_delete_rows(&mut conn, "goals", &ids)
        })
        .await
        .map_err(|e| Error::Backend(format!("storage worker failed: {e}")))?
    }

    async fn to_vec(&self) -> Result<Vec<GoalRecord>> {
        with_connection(&self.db_path, |conn| {
            let mut stmt = conn.prepare(&format!("SELECT {GOAL_COLUMNS} FROM goals ORDER BY id"))?;
            let records = stmt.query_map([], parse_goal)?.collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(records)
        })
        .await
    }

    async fn where_equals(&self, index: &GoalIndex) -> Result<Vec<GoalRecord>> {
        let index = *index;
        with_connection(&self.db_path, move |conn| {
            let (clause, value): (&str, Option<Box<dyn ToSql>>) = match index {
                GoalIndex::ParentId(None) => ("parent_id IS NULL", None),
                GoalIndex::ParentId(Some(id)) => ("parent_id = ?1", Some(Box::new(id))),
                GoalIndex::Kind(kind) => ("type = ?1", Some(Box::new(kind.as_str()))),
                GoalIndex::Status(status) => ("status = ?1", Some(Box::new(status.as_str()))),
            };
            let sql = format!("SELECT {GOAL_COLUMNS} FROM goals WHERE {clause} ORDER BY id");
            let mut stmt = conn.prepare(&sql)?;
            let records = stmt
                .query_map(params_from_iter(value.iter()), parse_goal)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(records)
        })
        .await
    }
}

impl Table<TaskRecord> for SqliteTasks {
    async fn add(&self, record: TaskRecord) -> Result<NodeId> {
        with_connection(&self.db_path, move |conn| {
            conn.execute(
                "INSERT INTO tasks (parent_id, title, description, frequency, weekly_days,
                                    scheduled_date, measurement, is_completed, sort_order, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    record.parent_id,
                    record.title,
                    record.description,
                    record.frequency.as_str(),
                    record.weekly_days.map(WeekdaySet::bits),
                    record.scheduled_date,
                    record.measurement,
                    record.is_completed,
                    record.order,
                    record.created_at,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    async fn get(&self, id: NodeId) -> Result<Option<TaskRecord>> {
        with_connection(&self.db_path, move |conn| {
            let record = conn
                .query_row(
                    &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
                    params![id],
                    parse_task,
                )
                .optional()?;
            Ok(record)
        })
        .await
    }

    async fn update(&self, id: NodeId, patch: &TaskPatch) -> Result<bool> {
        let patch = patch.clone();
        with_connection(&self.db_path, move |conn| {
            execute_update(conn, "tasks", id, task_sets(&patch))
        })
        .await
    }

    async fn delete(&self, id: NodeId) -> Result<()> {
        with_connection(&self.db_path, move |conn| {
            conn.execute("DELETE FROM tasks WHERE id = ?1", params![id])?;
            Ok(())
        })
        .await
    }

    async fn bulk_delete(&self, ids: &[NodeId]) -> Result<()> {
        let ids = ids.to_vec();
        let db_path = Arc::clone(&self.db_path);
        tokio::task::spawn_blocking(move || {
            let mut conn = open(&db_path)?;
            bulk_delete_rows(&mut conn, "tasks", &ids)
        })
        .await
        .map_err(|e| Error::Backend(format!("storage worker failed: {e}")))?
    }

    async fn to_vec(&self) -> Result<Vec<TaskRecord>> {
        with_connection(&self.db_path, |conn| {
            let mut stmt = conn.prepare(&format!("SELECT {TASK_COLUMNS} FROM tasks ORDER BY id"))?;
            let records = stmt.query_map([], parse_task)?.collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(records)
        })
        .await
    }

    async fn where_equals(&self, index: &TaskIndex) -> Result<Vec<TaskRecord>> {
        let index = *index;
        with_connection(&self.db_path, move |conn| {
            let (clause, value): (&str, Option<Box<dyn ToSql>>) = match index {
                TaskIndex::ParentId(None) => ("parent_id IS NULL", None),
                TaskIndex::ParentId(Some(id)) => ("parent_id = ?1", Some(Box::new(id))),
                TaskIndex::Frequency(frequency) => {
                    ("frequency = ?1", Some(Box::new(frequency.as_str())))
                }
                TaskIndex::IsCompleted(done) => ("is_completed = ?1", Some(Box::new(done))),
            };
            let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE {clause} ORDER BY id");
            let mut stmt = conn.prepare(&sql)?;
            let records = stmt
                .query_map(params_from_iter(value.iter()), parse_task)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(records)
        })
        .await
    }
}
