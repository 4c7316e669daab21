//! Durable store traits.
//!
//! The node store never talks to a database directly. It goes through a
//! [`DurableStore`], which exposes one [`Table`] per physical table. Each
//! table offers the small set of operations the node store needs: add, get,
//! partial update, delete, bulk delete, full scan and an equality query on an
//! indexed field.

use crate::error::Result;
use crate::forest::models::{
    Frequency, GoalKind, GoalPatch, GoalRecord, GoalStatus, NodeId, SettingRecord, TaskPatch,
    TaskRecord,
};

/// A row type that can be kept in a [`Table`].
pub trait Record: Clone + Send + 'static {
    /// Partial update applied by [`Table::update`].
    type Patch: Clone + Send + Sync + 'static;
    /// Indexed-field equality used by [`Table::where_equals`].
    type Index: Clone + Send + Sync + 'static;

    /// Physical table name.
    const TABLE: &'static str;

    /// Store-assigned id, if the row has been persisted.
    fn id(&self) -> Option<NodeId>;

    /// The same row carrying `id`.
    #[must_use]
    fn with_id(self, id: NodeId) -> Self;

    /// Parent id column.
    fn parent_id(&self) -> Option<NodeId>;

    /// Merge a patch into the row.
    fn apply(&mut self, patch: &Self::Patch);

    /// Whether the row satisfies an index equality.
    fn matches(&self, index: &Self::Index) -> bool;
}

/// Indexed fields of the goals table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoalIndex {
    /// `parentId == value` (`None` matches roots).
    ParentId(Option<NodeId>),
    /// `type == value`.
    Kind(GoalKind),
    /// `status == value`.
    Status(GoalStatus),
}

/// Indexed fields of the tasks table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskIndex {
    /// `parentId == value`.
    ParentId(Option<NodeId>),
    /// `frequency == value`.
    Frequency(Frequency),
    /// `isCompleted == value`.
    IsCompleted(bool),
}

impl Record for GoalRecord {
    type Patch = GoalPatch;
    type Index = GoalIndex;

    const TABLE: &'static str = "goals";

    fn id(&self) -> Option<NodeId> {
        self.id
    }

    fn with_id(mut self, id: NodeId) -> Self {
        self.id = Some(id);
        self
    }

    fn parent_id(&self) -> Option<NodeId> {
        self.parent_id
    }

    fn apply(&mut self, patch: &GoalPatch) {
        Self::apply(self, patch);
    }

    fn matches(&self, index: &GoalIndex) -> bool {
        match *index {
            GoalIndex::ParentId(parent_id) => self.parent_id == parent_id,
            GoalIndex::Kind(kind) => self.kind == kind,
            GoalIndex::Status(status) => self.status == status,
        }
    }
}

impl Record for TaskRecord {
    type Patch = TaskPatch;
    type Index = TaskIndex;

    const TABLE: &'static str = "tasks";

    fn id(&self) -> Option<NodeId> {
        self.id
    }

    fn with_id(mut self, id: NodeId) -> Self {
        self.id = Some(id);
        self
    }

    fn parent_id(&self) -> Option<NodeId> {
        self.parent_id
    }

    fn apply(&mut self, patch: &TaskPatch) {
        Self::apply(self, patch);
    }

    fn matches(&self, index: &TaskIndex) -> bool {
        match *index {
            TaskIndex::ParentId(parent_id) => self.parent_id == parent_id,
            TaskIndex::Frequency(frequency) => self.frequency == frequency,
            TaskIndex::IsCompleted(done) => self.is_completed == done,
        }
    }
}

/// One physical table of a durable store.
///
/// All methods return a `Result` and may fail with storage errors.
#[allow(async_fn_in_trait, clippy::missing_errors_doc)]
pub trait Table<R: Record> {
    /// Insert a row, returning its newly assigned id. Any id on `record` is ignored.
    async fn add(&self, record: R) -> Result<NodeId>;

    /// Fetch a row by id.
    async fn get(&self, id: NodeId) -> Result<Option<R>>;

    /// Merge `patch` into the row. Returns `false` if no row has that id.
    async fn update(&self, id: NodeId, patch: &R::Patch) -> Result<bool>;

    /// Delete a row by id. Deleting a missing row is not an error.
    async fn delete(&self, id: NodeId) -> Result<()>;

    /// Delete every listed row in one operation.
    async fn bulk_delete(&self, ids: &[NodeId]) -> Result<()>;

    /// Every row, in ascending id order.
    async fn to_vec(&self) -> Result<Vec<R>>;

    /// Rows matching an indexed-field equality, in ascending id order.
    async fn where_equals(&self, index: &R::Index) -> Result<Vec<R>>;
}

/// A persistence engine holding the goals, tasks and settings tables.
#[allow(async_fn_in_trait, clippy::missing_errors_doc)]
pub trait DurableStore {
    /// The goals table type.
    type Goals: Table<GoalRecord>;
    /// The tasks table type.
    type Tasks: Table<TaskRecord>;

    /// The goals table (goals, milestones, requirements).
    fn goals(&self) -> &Self::Goals;

    /// The tasks table.
    fn tasks(&self) -> &Self::Tasks;

    /// Read a setting.
    async fn get_setting(&self, key: &str) -> Result<Option<SettingRecord>>;

    /// Insert or replace a setting.
    async fn set_setting(&self, record: SettingRecord) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn task(parent_id: Option<NodeId>, done: bool) -> TaskRecord {
        TaskRecord {
            id: None,
            parent_id,
            title: "Run".to_string(),
            description: None,
            frequency: Frequency::Weekly,
            weekly_days: None,
            scheduled_date: None,
            measurement: None,
            is_completed: done,
            order: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_task_index_matching() {
        let record = task(Some(2), true);
        assert!(record.matches(&TaskIndex::ParentId(Some(2))));
        assert!(!record.matches(&TaskIndex::ParentId(None)));
        assert!(record.matches(&TaskIndex::IsCompleted(true)));
        assert!(record.matches(&TaskIndex::Frequency(Frequency::Weekly)));
        assert!(!record.matches(&TaskIndex::Frequency(Frequency::Daily)));
    }

    #[test]
    fn test_with_id_sets_id() {
        let record = task(None, false).with_id(12);
        assert_eq!(Record::id(&record), Some(12));
        assert_eq!(Record::parent_id(&record), None);
    }

    #[test]
    fn test_goal_index_matching() {
        let record = GoalRecord {
            id: Some(1),
            title: "G".to_string(),
            description: None,
            kind: GoalKind::Milestone,
            status: GoalStatus::Completed,
            parent_id: None,
            order: None,
            created_at: Utc::now(),
        };
        assert!(record.matches(&GoalIndex::ParentId(None)));
        assert!(record.matches(&GoalIndex::Kind(GoalKind::Milestone)));
        assert!(!record.matches(&GoalIndex::Status(GoalStatus::Active)));
    }
}
