//! In-memory [`DurableStore`] backed by shared maps.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{Error, Result};
use crate::forest::adapter::{DurableStore, Record, Table};
use crate::forest::models::{GoalRecord, NodeId, SettingRecord, TaskRecord};

/// In-memory durable store for tests and throwaway sessions.
///
/// Clones share the same tables, so a clone handed to a second node store
/// sees the same data (useful for simulating another writer).
#[derive(Clone, Debug)]
pub struct MemoryStore {
    goals: MemoryTable<GoalRecord>,
    tasks: MemoryTable<TaskRecord>,
    settings: Arc<Mutex<HashMap<String, String>>>,
    fail_writes: Arc<AtomicBool>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        let fail_writes = Arc::new(AtomicBool::new(false));
        Self {
            goals: MemoryTable::with_flag(Arc::clone(&fail_writes)),
            tasks: MemoryTable::with_flag(Arc::clone(&fail_writes)),
            settings: Arc::default(),
            fail_writes,
        }
    }

    /// Make every subsequent write fail with a storage error (reads still work).
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DurableStore for MemoryStore {
    type Goals = MemoryTable<GoalRecord>;
    type Tasks = MemoryTable<TaskRecord>;

    fn goals(&self) -> &Self::Goals {
        &self.goals
    }

    fn tasks(&self) -> &Self::Tasks {
        &self.tasks
    }

    async fn get_setting(&self, key: &str) -> Result<Option<SettingRecord>> {
        let settings = self.settings.lock().map_err(|_| poisoned("settings"))?;
        Ok(settings.get(key).map(|value| SettingRecord { key: key.to_string(), value: value.clone() }))
    }

    async fn set_setting(&self, record: SettingRecord) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(write_failure("settings"));
        }
        let mut settings = self.settings.lock().map_err(|_| poisoned("settings"))?;
        settings.insert(record.key, record.value);
        Ok(())
    }
}

/// One in-memory table with auto-increment ids starting at 1.
#[derive(Debug)]
pub struct MemoryTable<R> {
    inner: Arc<Mutex<TableData<R>>>,
    fail_writes: Arc<AtomicBool>,
}

#[derive(Debug)]
struct TableData<R> {
    rows: BTreeMap<NodeId, R>,
    next_id: NodeId,
}

impl<R> Default for MemoryTable<R> {
    fn default() -> Self {
        Self::with_flag(Arc::new(AtomicBool::new(false)))
    }
}

impl<R> Clone for MemoryTable<R> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner), fail_writes: Arc::clone(&self.fail_writes) }
    }
}

impl<R> MemoryTable<R> {
    fn with_flag(fail_writes: Arc<AtomicBool>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(TableData { rows: BTreeMap::new(), next_id: 1 })),
            fail_writes,
        }
    }
}

impl<R: Record> MemoryTable<R> {
    fn lock(&self) -> Result<MutexGuard<'_, TableData<R>>> {
        self.inner.lock().map_err(|_| poisoned(R::TABLE))
    }

    fn lock_for_write(&self) -> Result<MutexGuard<'_, TableData<R>>> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(write_failure(R::TABLE));
        }
        self.lock()
    }
}

impl<R: Record> Table<R> for MemoryTable<R> {
    async fn add(&self, record: R) -> Result<NodeId> {
        let mut data = self.lock_for_write()?;
        let id = data.next_id;
        data.next_id += 1;
        data.rows.insert(id, record.with_id(id));
        Ok(id)
    }

    async fn get(&self, id: NodeId) -> Result<Option<R>> {
        Ok(self.lock()?.rows.get(&id).cloned())
    }

    async fn update(&self, id: NodeId, patch: &R::Patch) -> Result<bool> {
        let mut data = self.lock_for_write()?;
        let Some(row) = data.rows.get_mut(&id) else {
            return Ok(false);
        };
        row.apply(patch);
        Ok(true)
    }

    async fn delete(&self, id: NodeId) -> Result<()> {
        self.lock_for_write()?.rows.remove(&id);
        Ok(())
    }

    async fn bulk_delete(&self, ids: &[NodeId]) -> Result<()> {
        let mut data = self.lock_for_write()?;
        for id in ids {
            data.rows.remove(id);
        }
        Ok(())
    }

    async fn to_vec(&self) -> Result<Vec<R>> {
        Ok(self.lock()?.rows.values().cloned().collect())
    }

    async fn where_equals(&self, index: &R::Index) -> Result<Vec<R>> {
        Ok(self.lock()?.rows.values().filter(|row| row.matches(index)).cloned().collect())
    }
}

fn poisoned(table: &str) -> Error {
    Error::Backend(format!("{table} table lock poisoned"))
}

fn write_failure(table: &str) -> Error {
    Error::Backend(format!("write to {table} rejected"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forest::adapter::{GoalIndex, TaskIndex};
    use crate::forest::models::{Frequency, GoalKind, GoalPatch, GoalStatus};
    use chrono::Utc;

    fn goal(title: &str, parent_id: Option<NodeId>) -> GoalRecord {
        GoalRecord {
            id: None,
            title: title.to_string(),
            description: None,
            kind: GoalKind::Goal,
            status: GoalStatus::Active,
            parent_id,
            order: None,
            created_at: Utc::now(),
        }
    }

    fn task(title: &str, parent_id: NodeId) -> TaskRecord {
        TaskRecord {
            id: None,
            parent_id: Some(parent_id),
            title: title.to_string(),
            description: None,
            frequency: Frequency::Daily,
            weekly_days: None,
            scheduled_date: None,
            measurement: None,
            is_completed: false,
            order: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_add_assigns_increasing_ids_per_table() {
        let store = MemoryStore::new();
        assert_eq!(store.goals().add(goal("a", None)).await.unwrap(), 1);
        assert_eq!(store.goals().add(goal("b", None)).await.unwrap(), 2);
        // The tasks table counts independently.
        assert_eq!(store.tasks().add(task("t", 1)).await.unwrap(), 1);

        let fetched = store.goals().get(2).await.unwrap().unwrap();
        assert_eq!(fetched.id, Some(2));
        assert_eq!(fetched.title, "b");
    }

    #[tokio::test]
    async fn test_ids_are_not_reused_after_delete() {
        let store = MemoryStore::new();
        let id = store.goals().add(goal("a", None)).await.unwrap();
        store.goals().delete(id).await.unwrap();
        assert!(store.goals().get(id).await.unwrap().is_none());
        assert_eq!(store.goals().add(goal("b", None)).await.unwrap(), id + 1);
    }

    #[tokio::test]
    async fn test_update_missing_row_reports_false() {
        let store = MemoryStore::new();
        let patch = GoalPatch { title: Some("x".to_string()), ..GoalPatch::default() };
        assert!(!store.goals().update(5, &patch).await.unwrap());

        let id = store.goals().add(goal("a", None)).await.unwrap();
        assert!(store.goals().update(id, &patch).await.unwrap());
        assert_eq!(store.goals().get(id).await.unwrap().unwrap().title, "x");
    }

    #[tokio::test]
    async fn test_where_equals_and_bulk_delete() {
        let store = MemoryStore::new();
        let root = store.goals().add(goal("root", None)).await.unwrap();
        store.goals().add(goal("child", Some(root))).await.unwrap();
        let t1 = store.tasks().add(task("t1", root)).await.unwrap();
        let t2 = store.tasks().add(task("t2", root)).await.unwrap();

        let roots = store.goals().where_equals(&GoalIndex::ParentId(None)).await.unwrap();
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].title, "root");

        let under_root =
            store.tasks().where_equals(&TaskIndex::ParentId(Some(root))).await.unwrap();
        assert_eq!(under_root.len(), 2);

        store.tasks().bulk_delete(&[t1, t2, 99]).await.unwrap();
        assert!(store.tasks().to_vec().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fail_writes_rejects_writes_but_not_reads() {
        let store = MemoryStore::new();
        let id = store.goals().add(goal("a", None)).await.unwrap();
        store.fail_writes(true);

        assert!(matches!(store.goals().add(goal("b", None)).await, Err(Error::Backend(_))));
        assert!(store.tasks().bulk_delete(&[1]).await.is_err());
        assert!(store.goals().get(id).await.unwrap().is_some());

        store.fail_writes(false);
        assert!(store.goals().add(goal("b", None)).await.is_ok());
    }

    #[tokio::test]
    async fn test_clones_share_tables() {
        let store = MemoryStore::new();
        let other = store.clone();
        other.goals().add(goal("shared", None)).await.unwrap();
        assert_eq!(store.goals().to_vec().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_settings() {
        let store = MemoryStore::new();
        assert!(store.get_setting("theme").await.unwrap().is_none());
        store
            .set_setting(SettingRecord { key: "theme".to_string(), value: "dark".to_string() })
            .await
            .unwrap();
        assert_eq!(store.get_setting("theme").await.unwrap().unwrap().value, "dark");
    }
}
