//! The node store: canonical in-memory forest kept in step with a [`DurableStore`].
//!
//! Every mutation follows the same sequence: validate against the in-memory
//! index, write to the durable store, apply the same change to the index,
//! then publish a freshly built [`Snapshot`]. Because storage is written
//! first, a failed write leaves the index at its last known-good state.
//! Failures are returned to the caller and mirrored into `Snapshot::error`.
//!
//! Mutations are serialised through an internal async gate, so two callers
//! issuing writes concurrently observe them applied one after the other.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tokio::sync::{watch, OnceCell};

use crate::error::{Error, Result};
use crate::forest::adapter::{DurableStore, Table};
use crate::forest::models::{
    GoalKind, GoalPatch, GoalRecord, GoalStatus, GoalUpdate, NewGoal, NewTask, Node, NodeGroup,
    NodeId, NodeKey, NodeType, TaskPatch, TaskRecord, TaskUpdate,
};
use crate::forest::tree::{ForestNode, NodeIndex};

/// Immutable view of the forest published after every operation.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    /// Root nodes with their nested children.
    pub root_goals: Arc<Vec<ForestNode>>,
    /// Whether a load from the durable store is in flight.
    pub is_loading: bool,
    /// Message of the most recent failed operation, cleared by the next success.
    pub error: Option<String>,
    /// Whether the forest has been loaded at least once.
    pub is_initialized: bool,
}

/// Hierarchical node store over a durable backend.
pub struct NodeStore<S> {
    backend: S,
    index: Mutex<NodeIndex>,
    snapshot: watch::Sender<Snapshot>,
    initialized: OnceCell<()>,
    write_gate: tokio::sync::Mutex<()>,
}

impl<S> NodeStore<S> {
    fn lock_index(&self) -> MutexGuard<'_, NodeIndex> {
        // The index is only mutated between awaits with no panicking calls in
        // between, so a poisoned lock still holds a consistent index.
        self.index.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<S: std::fmt::Debug> std::fmt::Debug for NodeStore<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeStore")
            .field("backend", &self.backend)
            .field("nodes", &self.lock_index().len())
            .finish_non_exhaustive()
    }
}

impl<S: DurableStore> NodeStore<S> {
    /// Create a store over `backend`. Nothing is read until [`Self::initialize`].
    pub fn new(backend: S) -> Self {
        let (snapshot, _) = watch::channel(Snapshot::default());
        Self {
            backend,
            index: Mutex::new(NodeIndex::new()),
            snapshot,
            initialized: OnceCell::new(),
            write_gate: tokio::sync::Mutex::new(()),
        }
    }

    /// The durable backend.
    pub const fn backend(&self) -> &S {
        &self.backend
    }

    /// Receive every snapshot published from now on.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshot.subscribe()
    }

    /// The current snapshot.
    pub fn snapshot(&self) -> Snapshot {
        self.snapshot.borrow().clone()
    }

    // === Initialization ===

    /// Load the forest from the durable store once.
    ///
    /// Later calls are no-ops. A call made while the first load is in flight
    /// waits for that load instead of starting another. If the load fails the
    /// store stays uninitialized and the next call tries again.
    ///
    /// # Errors
    ///
    /// Returns an error if either table cannot be read.
    pub async fn initialize(&self) -> Result<()> {
        self.initialized
            .get_or_try_init(|| async {
                let _gate = self.write_gate.lock().await;
                self.load().await
            })
            .await?;
        Ok(())
    }

    /// Re-read both tables and rebuild the forest, picking up external changes.
    ///
    /// # Errors
    ///
    /// Returns an error if either table cannot be read.
    pub async fn refresh(&self) -> Result<()> {
        let _gate = self.write_gate.lock().await;
        self.load().await?;
        let _ = self.initialized.set(());
        Ok(())
    }

    async fn load(&self) -> Result<()> {
        self.snapshot.send_modify(|snapshot| snapshot.is_loading = true);

        let records = async {
            let goals = self.backend.goals().to_vec().await?;
            let tasks = self.backend.tasks().to_vec().await?;
            Ok::<_, Error>((goals, tasks))
        }
        .await;

        match records {
            Ok((goals, tasks)) => {
                let index = NodeIndex::from_records(goals, tasks);
                let roots = Arc::new(index.build_forest());
                tracing::info!(nodes = index.len(), roots = roots.len(), "loaded goal forest");
                *self.lock_index() = index;
                self.snapshot.send_modify(|snapshot| {
                    snapshot.root_goals = roots;
                    snapshot.is_loading = false;
                    snapshot.error = None;
                    snapshot.is_initialized = true;
                });
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to load goal forest");
                let message = e.to_string();
                self.snapshot.send_modify(|snapshot| {
                    snapshot.is_loading = false;
                    snapshot.error = Some(message);
                });
                Err(e)
            }
        }
    }

    // === Adding nodes ===

    /// Add a goal. Returns the new id.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent does not exist or the write fails.
    pub async fn add_goal(&self, input: NewGoal) -> Result<NodeId> {
        self.add_goal_like(GoalKind::Goal, input).await
    }

    /// Add a milestone. Returns the new id.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent does not exist or the write fails.
    pub async fn add_milestone(&self, input: NewGoal) -> Result<NodeId> {
        self.add_goal_like(GoalKind::Milestone, input).await
    }

    /// Add a requirement. Returns the new id.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent does not exist or the write fails.
    pub async fn add_requirement(&self, input: NewGoal) -> Result<NodeId> {
        self.add_goal_like(GoalKind::Requirement, input).await
    }

    /// Add a goal-like node of the given kind. Returns the new id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for an empty title, [`Error::ParentNotFound`]
    /// if the parent does not exist, or a storage error.
    pub async fn add_goal_like(&self, kind: GoalKind, input: NewGoal) -> Result<NodeId> {
        let _gate = self.write_gate.lock().await;
        let result = self.insert_goal_like(kind, input).await;
        self.settle(result)
    }

    /// Add a task under a goal-like node. Returns the new id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for an empty title, [`Error::ParentNotFound`]
    /// if the parent is not a goal-like node, or a storage error.
    pub async fn add_task(&self, input: NewTask) -> Result<NodeId> {
        let _gate = self.write_gate.lock().await;
        let result = self.insert_task(input).await;
        self.settle(result)
    }

    async fn insert_goal_like(&self, kind: GoalKind, input: NewGoal) -> Result<NodeId> {
        require_title(&input.title)?;
        let order = self.order_for_new_child(input.parent_id)?;
        let record = GoalRecord {
            id: None,
            title: input.title,
            description: input.description,
            kind,
            status: GoalStatus::Active,
            parent_id: input.parent_id,
            order: Some(order),
            created_at: Utc::now(),
        };

        let id = self.backend.goals().add(record.clone()).await?;
        tracing::debug!(id, kind = kind.as_str(), parent_id = ?record.parent_id, "added node");
        self.lock_index().insert(Node::from_goal(id, record));
        Ok(id)
    }

    async fn insert_task(&self, input: NewTask) -> Result<NodeId> {
        require_title(&input.title)?;
        let order = self.order_for_new_child(Some(input.parent_id))?;
        let record = TaskRecord {
            id: None,
            parent_id: Some(input.parent_id),
            title: input.title,
            description: input.description,
            frequency: input.frequency,
            weekly_days: input.weekly_days,
            scheduled_date: input.scheduled_date,
            measurement: input.measurement,
            is_completed: false,
            order: Some(order),
            created_at: Utc::now(),
        };

        let id = self.backend.tasks().add(record.clone()).await?;
        tracing::debug!(id, kind = "task", parent_id = ?record.parent_id, "added node");
        self.lock_index().insert(Node::from_task(id, record));
        Ok(id)
    }

    /// Check the parent and pick an order after the current last sibling.
    fn order_for_new_child(&self, parent_id: Option<NodeId>) -> Result<i64> {
        let index = self.lock_index();
        if let Some(parent) = parent_id {
            if !index.contains(NodeKey::goal(parent)) {
                return Err(Error::ParentNotFound(parent));
            }
        }
        Ok(index.next_order(parent_id))
    }

    // === Updating nodes ===

    /// Merge fields into a goal, milestone or requirement.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if `id` is not a goal-like node, or a storage error.
    pub async fn update_goal(&self, id: NodeId, update: GoalUpdate) -> Result<()> {
        let _gate = self.write_gate.lock().await;
        let result = self.patch_goal(id, GoalPatch::from(update)).await;
        self.settle(result)
    }

    /// Set the status of a goal, milestone or requirement.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if `id` is not a goal-like node, or a storage error.
    pub async fn update_goal_status(&self, id: NodeId, status: GoalStatus) -> Result<()> {
        let _gate = self.write_gate.lock().await;
        let patch = GoalPatch { status: Some(status), ..GoalPatch::default() };
        let result = self.patch_goal(id, patch).await;
        self.settle(result)
    }

    /// Merge fields into a task.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if `id` is not a task, or a storage error.
    pub async fn update_task(&self, id: NodeId, update: TaskUpdate) -> Result<()> {
        let _gate = self.write_gate.lock().await;
        let result = self.patch_task(id, TaskPatch::from(update)).await;
        self.settle(result)
    }

    /// Flip a task's completion flag. Returns the new value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if `id` is not a task, or a storage error.
    pub async fn toggle_task_completion(&self, id: NodeId) -> Result<bool> {
        let _gate = self.write_gate.lock().await;
        let result = self.toggle(id).await;
        self.settle(result)
    }

    async fn toggle(&self, id: NodeId) -> Result<bool> {
        let completed = self
            .lock_index()
            .get(NodeKey::task(id))
            .and_then(Node::task)
            .map(|details| !details.is_completed)
            .ok_or(Error::NotFound { node_type: NodeType::Task, id })?;
        let patch = TaskPatch { is_completed: Some(completed), ..TaskPatch::default() };
        self.patch_task(id, patch).await?;
        Ok(completed)
    }

    async fn patch_goal(&self, id: NodeId, patch: GoalPatch) -> Result<()> {
        let key = NodeKey::goal(id);
        let not_found = || Error::NotFound { node_type: NodeType::Goal, id };
        if !self.lock_index().contains(key) {
            return Err(not_found());
        }
        if patch.is_empty() {
            return Ok(());
        }

        if !self.backend.goals().update(id, &patch).await? {
            return Err(not_found());
        }
        if let Some(node) = self.lock_index().get_mut(key) {
            node.apply_goal_patch(&patch);
        }
        tracing::debug!(id, "updated goal-like node");
        Ok(())
    }

    async fn patch_task(&self, id: NodeId, patch: TaskPatch) -> Result<()> {
        let key = NodeKey::task(id);
        let not_found = || Error::NotFound { node_type: NodeType::Task, id };
        if !self.lock_index().contains(key) {
            return Err(not_found());
        }
        if patch.is_empty() {
            return Ok(());
        }

        if !self.backend.tasks().update(id, &patch).await? {
            return Err(not_found());
        }
        if let Some(node) = self.lock_index().get_mut(key) {
            node.apply_task_patch(&patch);
        }
        tracing::debug!(id, "updated task");
        Ok(())
    }

    // === Structural operations ===

    /// Delete a node and all of its descendants from both tables.
    ///
    /// Returns how many nodes were removed (the node itself plus descendants),
    /// or 0 if there is no node of `node_type` with this id. The descendants
    /// are the ones shown under the node in the snapshot.
    ///
    /// # Errors
    ///
    /// Returns a storage error if a bulk delete fails. Rows the store did
    /// delete before the failure are also dropped from memory.
    pub async fn delete_node(&self, id: NodeId, node_type: NodeType) -> Result<usize> {
        let _gate = self.write_gate.lock().await;
        let result = self.delete_subtree(id, node_type).await;
        self.settle(result)
    }

    async fn delete_subtree(&self, id: NodeId, node_type: NodeType) -> Result<usize> {
        let keys = {
            let index = self.lock_index();
            match resolve(&index, id, node_type) {
                Some(key) => index.subtree_keys(key),
                None => Vec::new(),
            }
        };
        let Some(&key) = keys.first() else {
            tracing::debug!(id, %node_type, "delete of unknown node ignored");
            return Ok(0);
        };

        let (goal_ids, task_ids): (Vec<NodeKey>, Vec<NodeKey>) =
            keys.iter().partition(|k| k.group == NodeGroup::Goals);
        let goal_ids: Vec<NodeId> = goal_ids.into_iter().map(|k| k.id).collect();
        let task_ids: Vec<NodeId> = task_ids.into_iter().map(|k| k.id).collect();

        if !task_ids.is_empty() {
            self.backend.tasks().bulk_delete(&task_ids).await?;
            let mut index = self.lock_index();
            for &id in &task_ids {
                index.remove(NodeKey::task(id));
            }
        }
        if !goal_ids.is_empty() {
            self.backend.goals().bulk_delete(&goal_ids).await?;
            let mut index = self.lock_index();
            for &id in &goal_ids {
                index.remove(NodeKey::goal(id));
            }
        }

        tracing::info!(?key, deleted = keys.len(), "deleted subtree");
        Ok(keys.len())
    }

    /// Reparent a node. `None` moves it to the root level.
    ///
    /// The node keeps its `order` value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cycle`] if `new_parent_id` is the node itself or one of
    /// its descendants, [`Error::NotFound`] if there is no node of `node_type`
    /// with this id, [`Error::ParentNotFound`] for an unknown parent, or a
    /// storage error. Nothing changes on error.
    pub async fn move_node(
        &self,
        id: NodeId,
        node_type: NodeType,
        new_parent_id: Option<NodeId>,
    ) -> Result<()> {
        let _gate = self.write_gate.lock().await;
        let result = self.reparent(NodeKey::of(node_type, id), node_type, new_parent_id).await;
        self.settle(result)
    }

    async fn reparent(
        &self,
        key: NodeKey,
        node_type: NodeType,
        new_parent_id: Option<NodeId>,
    ) -> Result<()> {
        {
            let index = self.lock_index();
            if resolve(&index, key.id, node_type).is_none() {
                return Err(Error::NotFound { node_type, id: key.id });
            }
            if let Some(parent_id) = new_parent_id {
                let parent = NodeKey::goal(parent_id);
                if parent == key || index.is_descendant(key, parent) {
                    return Err(Error::Cycle { id: key.id, new_parent: parent_id });
                }
                if !index.contains(parent) {
                    return Err(Error::ParentNotFound(parent_id));
                }
            }
        }

        match key.group {
            NodeGroup::Goals => {
                let patch = GoalPatch { parent_id: Some(new_parent_id), ..GoalPatch::default() };
                if !self.backend.goals().update(key.id, &patch).await? {
                    return Err(Error::NotFound { node_type, id: key.id });
                }
                if let Some(node) = self.lock_index().get_mut(key) {
                    node.apply_goal_patch(&patch);
                }
            }
            NodeGroup::Tasks => {
                let patch = TaskPatch { parent_id: Some(new_parent_id), ..TaskPatch::default() };
                if !self.backend.tasks().update(key.id, &patch).await? {
                    return Err(Error::NotFound { node_type, id: key.id });
                }
                if let Some(node) = self.lock_index().get_mut(key) {
                    node.apply_task_patch(&patch);
                }
            }
        }

        tracing::debug!(?key, ?new_parent_id, "moved node");
        Ok(())
    }

    /// Give each listed node an `order` equal to its position in `ordered_ids`.
    ///
    /// `parent_id` names the sibling group (`None` for roots) and `node_type`
    /// the table the ids belong to. The list is not checked against the actual
    /// group: a listed node with a different parent is still reordered (and
    /// logged). Ids with no node of `node_type` are skipped. Nodes already at
    /// their target position are not rewritten.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if a listed row has vanished from storage,
    /// or a storage error. Orders written before the failure are kept.
    pub async fn reorder_siblings(
        &self,
        parent_id: Option<NodeId>,
        ordered_ids: &[NodeId],
        node_type: NodeType,
    ) -> Result<()> {
        let _gate = self.write_gate.lock().await;
        let result = self.reorder(parent_id, ordered_ids, node_type).await;
        self.settle(result)
    }

    async fn reorder(
        &self,
        parent_id: Option<NodeId>,
        ordered_ids: &[NodeId],
        node_type: NodeType,
    ) -> Result<()> {
        for (position, &id) in ordered_ids.iter().enumerate() {
            let key = NodeKey::of(node_type, id);
            let order = i64::try_from(position).unwrap_or(i64::MAX);

            let current = {
                let index = self.lock_index();
                resolve(&index, id, node_type)
                    .and_then(|resolved| index.get(resolved))
                    .map(|node| (node.order, index.parent_of(key).map(|p| p.id)))
            };
            let Some((current_order, current_parent)) = current else {
                tracing::warn!(?key, %node_type, "reorder skipped id with no node of this type");
                continue;
            };
            if current_parent != parent_id {
                tracing::warn!(?key, ?parent_id, ?current_parent, "reordering node outside its sibling group");
            }
            if current_order == order {
                continue;
            }

            let written = match key.group {
                NodeGroup::Goals => {
                    let patch = GoalPatch { order: Some(order), ..GoalPatch::default() };
                    self.backend.goals().update(id, &patch).await?
                }
                NodeGroup::Tasks => {
                    let patch = TaskPatch { order: Some(order), ..TaskPatch::default() };
                    self.backend.tasks().update(id, &patch).await?
                }
            };
            if !written {
                return Err(Error::NotFound { node_type, id });
            }
            if let Some(node) = self.lock_index().get_mut(key) {
                node.order = order;
            }
        }
        tracing::debug!(?parent_id, count = ordered_ids.len(), "reordered siblings");
        Ok(())
    }

    // === Reads ===

    /// Look up a node by id and type.
    pub fn get_node(&self, id: NodeId, node_type: NodeType) -> Option<Node> {
        let index = self.lock_index();
        resolve(&index, id, node_type).and_then(|key| index.get(key)).cloned()
    }

    /// Children of a goal-like node in display order. Empty for unknown ids.
    pub fn get_children(&self, id: NodeId) -> Vec<Node> {
        self.lock_index().children(id).into_iter().cloned().collect()
    }

    /// Ancestors of a node, nearest first (a breadcrumb trail reversed).
    pub fn ancestors(&self, id: NodeId, node_type: NodeType) -> Vec<Node> {
        let index = self.lock_index();
        index
            .ancestors(NodeKey::of(node_type, id))
            .into_iter()
            .filter_map(|key| index.get(key).cloned())
            .collect()
    }

    /// Number of nodes currently loaded.
    pub fn node_count(&self) -> usize {
        self.lock_index().len()
    }

    // === Internals ===

    /// Publish the post-operation snapshot and pass the result through.
    fn settle<T>(&self, result: Result<T>) -> Result<T> {
        let roots = Arc::new(self.lock_index().build_forest());
        let error = result.as_ref().err().map(ToString::to_string);
        if let Some(message) = &error {
            tracing::warn!(error = %message, "node store operation failed");
        }
        self.snapshot.send_modify(|snapshot| {
            snapshot.root_goals = roots;
            snapshot.error = error;
        });
        result
    }
}

/// The key of `id` if the index holds it with exactly this node type.
///
/// A goal-table id may be a milestone or requirement rather than the requested type.
fn resolve(index: &NodeIndex, id: NodeId, node_type: NodeType) -> Option<NodeKey> {
    let key = NodeKey::of(node_type, id);
    index.get(key).filter(|node| node.node_type() == node_type).map(|_| key)
}

fn require_title(title: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(Error::InvalidInput("title must not be empty".to_string()));
    }
    Ok(())
}
