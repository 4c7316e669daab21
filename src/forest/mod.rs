//! The goal forest: goals, milestones, requirements and tasks as one tree.
//!
//! Goal-like nodes live in the `goals` table and tasks in the `tasks` table.
//! [`NodeStore`] loads both, links them through `parent_id` into a forest of
//! [`ForestNode`]s and keeps that forest in step with every mutation it
//! writes back.
//!
//! # Example
//!
//! ```
//! use goal_forest::forest::{MemoryStore, NewGoal, NewTask, NodeStore, NodeType};
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let store = NodeStore::new(MemoryStore::new());
//! store.initialize().await?;
//!
//! let house = store.add_goal(NewGoal::titled("Buy a House")).await?;
//! let prep = store.add_milestone(NewGoal::titled("Financial Prep").under(house)).await?;
//! store.add_task(NewTask::titled("Save money", prep)).await?;
//!
//! assert_eq!(store.delete_node(house, NodeType::Goal).await?, 3);
//! # Ok::<(), goal_forest::Error>(())
//! # }).unwrap();
//! ```

pub mod adapter;
pub mod memory;
pub mod models;
pub mod sqlite;
pub mod store;
pub mod tree;

pub use adapter::{DurableStore, GoalIndex, Record, Table, TaskIndex};
pub use memory::{MemoryStore, MemoryTable};
pub use models::{
    validate_title, Frequency, GoalKind, GoalPatch, GoalRecord, GoalStatus, GoalUpdate, NewGoal,
    NewTask, Node, NodeGroup, NodeId, NodeKey, NodeKind, NodeType, SettingRecord, TaskDetails,
    TaskPatch, TaskRecord, TaskUpdate, WeekdaySet,
};
pub use sqlite::SqliteStore;
pub use store::{NodeStore, Snapshot};
pub use tree::{ForestNode, NodeIndex};
