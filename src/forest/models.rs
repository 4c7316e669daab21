//! Record and node types for the goal forest.
//!
//! Two persisted record shapes exist: [`GoalRecord`] for goals, milestones and
//! requirements (the "goal-like" nodes) and [`TaskRecord`] for tasks. Both are
//! merged into the [`Node`] tagged union once loaded, so task-only fields can
//! never appear on a goal-like node.

use crate::error::{Error, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Identifier assigned by the durable store. Unique within one table only.
pub type NodeId = i64;

/// The four node variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    /// Top-level objective.
    Goal,
    /// Intermediate checkpoint towards a goal.
    Milestone,
    /// Something that must hold for a milestone or goal to be reached.
    Requirement,
    /// A concrete, schedulable unit of work. Always a leaf.
    Task,
}

impl NodeType {
    /// Parse a node type from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not a valid node type.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "goal" => Ok(Self::Goal),
            "milestone" => Ok(Self::Milestone),
            "requirement" => Ok(Self::Requirement),
            "task" => Ok(Self::Task),
            _ => Err(Error::InvalidInput(format!(
                "invalid node type: '{s}' (must be one of: goal, milestone, requirement, task)"
            ))),
        }
    }

    /// Get the string representation of the node type.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Goal => "goal",
            Self::Milestone => "milestone",
            Self::Requirement => "requirement",
            Self::Task => "task",
        }
    }

    /// The physical table this node type is stored in.
    #[must_use]
    pub const fn group(self) -> NodeGroup {
        match self {
            Self::Task => NodeGroup::Tasks,
            Self::Goal | Self::Milestone | Self::Requirement => NodeGroup::Goals,
        }
    }
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The physical table a node lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeGroup {
    /// The `goals` table: goals, milestones and requirements.
    Goals,
    /// The `tasks` table.
    Tasks,
}

/// Arena key for a node. Ids are only unique per table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeKey {
    /// Which table the id belongs to.
    pub group: NodeGroup,
    /// Store-assigned id.
    pub id: NodeId,
}

impl NodeKey {
    /// Key of a row in the goals table.
    #[must_use]
    pub const fn goal(id: NodeId) -> Self {
        Self { group: NodeGroup::Goals, id }
    }

    /// Key of a row in the tasks table.
    #[must_use]
    pub const fn task(id: NodeId) -> Self {
        Self { group: NodeGroup::Tasks, id }
    }

    /// Key for an id of the given node type.
    #[must_use]
    pub const fn of(node_type: NodeType, id: NodeId) -> Self {
        Self { group: node_type.group(), id }
    }
}

/// The goal-like variants stored in the goals table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GoalKind {
    /// See [`NodeType::Goal`].
    Goal,
    /// See [`NodeType::Milestone`].
    Milestone,
    /// See [`NodeType::Requirement`].
    Requirement,
}

impl GoalKind {
    /// The matching [`NodeType`].
    #[must_use]
    pub const fn node_type(self) -> NodeType {
        match self {
            Self::Goal => NodeType::Goal,
            Self::Milestone => NodeType::Milestone,
            Self::Requirement => NodeType::Requirement,
        }
    }

    /// Convert a node type into a goal kind, if it is goal-like.
    #[must_use]
    pub const fn from_node_type(node_type: NodeType) -> Option<Self> {
        match node_type {
            NodeType::Goal => Some(Self::Goal),
            NodeType::Milestone => Some(Self::Milestone),
            NodeType::Requirement => Some(Self::Requirement),
            NodeType::Task => None,
        }
    }

    /// Get the string representation of the kind.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        self.node_type().as_str()
    }
}

/// Status of a goal-like node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GoalStatus {
    /// Still being worked towards.
    #[default]
    Active,
    /// Reached.
    Completed,
}

impl GoalStatus {
    /// Parse a status from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not a valid status.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            _ => Err(Error::InvalidInput(format!(
                "invalid status: '{s}' (must be one of: active, completed)"
            ))),
        }
    }

    /// Get the string representation of the status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
        }
    }
}

/// How often a task recurs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    /// A single occurrence, optionally on [`TaskRecord::scheduled_date`].
    #[default]
    Once,
    /// Every day.
    Daily,
    /// On the days in [`TaskRecord::weekly_days`].
    Weekly,
    /// User-defined cadence.
    Custom,
}

impl Frequency {
    /// Parse a frequency from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not a valid frequency.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "once" => Ok(Self::Once),
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "custom" => Ok(Self::Custom),
            _ => Err(Error::InvalidInput(format!(
                "invalid frequency: '{s}' (must be one of: once, daily, weekly, custom)"
            ))),
        }
    }

    /// Get the string representation of the frequency.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Once => "once",
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Custom => "custom",
        }
    }
}

/// A set of weekday indices (0 = Sunday .. 6 = Saturday), stored as a bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<u8>", into = "Vec<u8>")]
pub struct WeekdaySet(u8);

impl WeekdaySet {
    /// Build a set from day indices.
    ///
    /// # Errors
    ///
    /// Returns an error if any index is greater than 6.
    pub fn from_days(days: &[u8]) -> Result<Self> {
        let mut bits = 0u8;
        for &day in days {
            if day > 6 {
                return Err(Error::InvalidInput(format!("invalid weekday: {day} (must be 0-6)")));
            }
            bits |= 1 << day;
        }
        Ok(Self(bits))
    }

    /// Rebuild a set from its stored bitmask, ignoring unknown high bits.
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & 0x7f)
    }

    /// The raw bitmask.
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Whether the given day index is in the set.
    #[must_use]
    pub const fn contains(self, day: u8) -> bool {
        day <= 6 && self.0 & (1 << day) != 0
    }

    /// Day indices in ascending order.
    #[must_use]
    pub fn days(self) -> Vec<u8> {
        (0..=6).filter(|&d| self.contains(d)).collect()
    }
}

impl TryFrom<Vec<u8>> for WeekdaySet {
    type Error = Error;

    fn try_from(days: Vec<u8>) -> Result<Self> {
        Self::from_days(&days)
    }
}

impl From<WeekdaySet> for Vec<u8> {
    fn from(set: WeekdaySet) -> Self {
        set.days()
    }
}

/// A row of the `goals` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalRecord {
    /// Store-assigned id; `None` before the first write.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<NodeId>,
    /// Display title.
    pub title: String,
    /// Optional longer description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Which goal-like variant this row is.
    #[serde(rename = "type")]
    pub kind: GoalKind,
    /// Completion status.
    pub status: GoalStatus,
    /// Parent row in the goals table, `None` for roots.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<NodeId>,
    /// Sibling ordering key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
    /// Creation time, never changed.
    pub created_at: DateTime<Utc>,
}

impl GoalRecord {
    /// Merge a patch into this record.
    pub fn apply(&mut self, patch: &GoalPatch) {
        if let Some(title) = &patch.title {
            self.title.clone_from(title);
        }
        if let Some(description) = &patch.description {
            self.description.clone_from(description);
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(parent_id) = patch.parent_id {
            self.parent_id = parent_id;
        }
        if let Some(order) = patch.order {
            self.order = Some(order);
        }
    }
}

/// A row of the `tasks` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    /// Store-assigned id; `None` before the first write.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<NodeId>,
    /// Parent row in the goals table. Tasks normally have one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<NodeId>,
    /// Display title.
    pub title: String,
    /// Optional longer description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Recurrence.
    pub frequency: Frequency,
    /// Days of the week, meaningful for [`Frequency::Weekly`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weekly_days: Option<WeekdaySet>,
    /// Date of a one-off task, meaningful for [`Frequency::Once`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_date: Option<NaiveDate>,
    /// Free-text quantity label ("30 minutes", "5 km").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub measurement: Option<String>,
    /// Whether the task has been done.
    pub is_completed: bool,
    /// Sibling ordering key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
    /// Creation time, never changed.
    pub created_at: DateTime<Utc>,
}

impl TaskRecord {
    /// Merge a patch into this record.
    pub fn apply(&mut self, patch: &TaskPatch) {
        if let Some(title) = &patch.title {
            self.title.clone_from(title);
        }
        if let Some(description) = &patch.description {
            self.description.clone_from(description);
        }
        if let Some(frequency) = patch.frequency {
            self.frequency = frequency;
        }
        if let Some(weekly_days) = patch.weekly_days {
            self.weekly_days = weekly_days;
        }
        if let Some(scheduled_date) = patch.scheduled_date {
            self.scheduled_date = scheduled_date;
        }
        if let Some(measurement) = &patch.measurement {
            self.measurement.clone_from(measurement);
        }
        if let Some(is_completed) = patch.is_completed {
            self.is_completed = is_completed;
        }
        if let Some(parent_id) = patch.parent_id {
            self.parent_id = parent_id;
        }
        if let Some(order) = patch.order {
            self.order = Some(order);
        }
    }
}

/// A row of the `settings` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingRecord {
    /// Setting name.
    pub key: String,
    /// Setting value, stored verbatim.
    pub value: String,
}

/// Partial update of a [`GoalRecord`]. `None` leaves a field untouched.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct GoalPatch {
    /// New title (if Some).
    pub title: Option<String>,
    /// New description (if Some); `Some(None)` clears it.
    pub description: Option<Option<String>>,
    /// New status (if Some).
    pub status: Option<GoalStatus>,
    /// New parent (if Some); `Some(None)` makes the node a root.
    pub parent_id: Option<Option<NodeId>>,
    /// New sibling order (if Some).
    pub order: Option<i64>,
}

impl GoalPatch {
    /// Check if any fields are set for update.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.status.is_none()
            && self.parent_id.is_none()
            && self.order.is_none()
    }
}

/// Partial update of a [`TaskRecord`]. `None` leaves a field untouched.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TaskPatch {
    /// New title (if Some).
    pub title: Option<String>,
    /// New description (if Some); `Some(None)` clears it.
    pub description: Option<Option<String>>,
    /// New frequency (if Some).
    pub frequency: Option<Frequency>,
    /// New weekday set (if Some).
    pub weekly_days: Option<Option<WeekdaySet>>,
    /// New scheduled date (if Some).
    pub scheduled_date: Option<Option<NaiveDate>>,
    /// New measurement label (if Some).
    pub measurement: Option<Option<String>>,
    /// New completion flag (if Some).
    pub is_completed: Option<bool>,
    /// New parent (if Some).
    pub parent_id: Option<Option<NodeId>>,
    /// New sibling order (if Some).
    pub order: Option<i64>,
}

impl TaskPatch {
    /// Check if any fields are set for update.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.frequency.is_none()
            && self.weekly_days.is_none()
            && self.scheduled_date.is_none()
            && self.measurement.is_none()
            && self.is_completed.is_none()
            && self.parent_id.is_none()
            && self.order.is_none()
    }
}

/// Input for adding a goal, milestone or requirement.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NewGoal {
    /// Display title. Must not be empty; callers trim.
    pub title: String,
    /// Optional description.
    pub description: Option<String>,
    /// Parent goal-like node, `None` for a root.
    pub parent_id: Option<NodeId>,
}

impl NewGoal {
    /// A root node with just a title.
    #[must_use]
    pub fn titled(title: impl Into<String>) -> Self {
        Self { title: title.into(), ..Self::default() }
    }

    /// The same input placed under `parent_id`.
    #[must_use]
    pub const fn under(mut self, parent_id: NodeId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }
}

/// Input for adding a task. Tasks always sit under a goal-like node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    /// Display title. Must not be empty; callers trim.
    pub title: String,
    /// Optional description.
    pub description: Option<String>,
    /// Parent goal-like node.
    pub parent_id: NodeId,
    /// Recurrence.
    pub frequency: Frequency,
    /// Days of the week for weekly tasks.
    pub weekly_days: Option<WeekdaySet>,
    /// Date for one-off tasks.
    pub scheduled_date: Option<NaiveDate>,
    /// Quantity label.
    pub measurement: Option<String>,
}

impl NewTask {
    /// A one-off task under `parent_id`.
    #[must_use]
    pub fn titled(title: impl Into<String>, parent_id: NodeId) -> Self {
        Self {
            title: title.into(),
            description: None,
            parent_id,
            frequency: Frequency::default(),
            weekly_days: None,
            scheduled_date: None,
            measurement: None,
        }
    }

    /// The same input with a different frequency.
    #[must_use]
    pub const fn with_frequency(mut self, frequency: Frequency) -> Self {
        self.frequency = frequency;
        self
    }
}

/// Fields of a goal-like node that can be changed through `update_goal`.
///
/// Parent and order are changed through `move_node` and `reorder_siblings`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct GoalUpdate {
    /// New title (if Some).
    pub title: Option<String>,
    /// New description (if Some); `Some(None)` clears it.
    pub description: Option<Option<String>>,
    /// New status (if Some).
    pub status: Option<GoalStatus>,
}

impl From<GoalUpdate> for GoalPatch {
    fn from(update: GoalUpdate) -> Self {
        Self {
            title: update.title,
            description: update.description,
            status: update.status,
            ..Self::default()
        }
    }
}

/// Fields of a task that can be changed through `update_task`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TaskUpdate {
    /// New title (if Some).
    pub title: Option<String>,
    /// New description (if Some); `Some(None)` clears it.
    pub description: Option<Option<String>>,
    /// New frequency (if Some).
    pub frequency: Option<Frequency>,
    /// New weekday set (if Some).
    pub weekly_days: Option<Option<WeekdaySet>>,
    /// New scheduled date (if Some).
    pub scheduled_date: Option<Option<NaiveDate>>,
    /// New measurement label (if Some).
    pub measurement: Option<Option<String>>,
    /// New completion flag (if Some).
    pub is_completed: Option<bool>,
}

impl From<TaskUpdate> for TaskPatch {
    fn from(update: TaskUpdate) -> Self {
        Self {
            title: update.title,
            description: update.description,
            frequency: update.frequency,
            weekly_days: update.weekly_days,
            scheduled_date: update.scheduled_date,
            measurement: update.measurement,
            is_completed: update.is_completed,
            ..Self::default()
        }
    }
}

/// Task-only fields of a [`Node`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDetails {
    /// Recurrence.
    pub frequency: Frequency,
    /// Days of the week for weekly tasks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weekly_days: Option<WeekdaySet>,
    /// Date for one-off tasks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_date: Option<NaiveDate>,
    /// Quantity label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub measurement: Option<String>,
    /// Whether the task has been done.
    pub is_completed: bool,
}

/// Variant-specific part of a [`Node`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "nodeType", rename_all = "lowercase")]
pub enum NodeKind {
    /// A goal.
    Goal {
        /// Completion status.
        status: GoalStatus,
    },
    /// A milestone.
    Milestone {
        /// Completion status.
        status: GoalStatus,
    },
    /// A requirement.
    Requirement {
        /// Completion status.
        status: GoalStatus,
    },
    /// A task.
    Task(TaskDetails),
}

/// One node of the forest, as held in memory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Store-assigned id, unique within the node's table.
    pub id: NodeId,
    /// Display title.
    pub title: String,
    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Parent goal-like node, `None` for roots.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<NodeId>,
    /// Sibling ordering key (missing orders read as 0).
    pub order: i64,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Variant and variant-only fields.
    #[serde(flatten)]
    pub kind: NodeKind,
}

impl Node {
    /// Build a node from a stored goal row.
    #[must_use]
    pub fn from_goal(id: NodeId, record: GoalRecord) -> Self {
        let kind = match record.kind {
            GoalKind::Goal => NodeKind::Goal { status: record.status },
            GoalKind::Milestone => NodeKind::Milestone { status: record.status },
            GoalKind::Requirement => NodeKind::Requirement { status: record.status },
        };
        Self {
            id,
            title: record.title,
            description: record.description,
            parent_id: record.parent_id,
            order: record.order.unwrap_or(0),
            created_at: record.created_at,
            kind,
        }
    }

    /// Build a node from a stored task row.
    #[must_use]
    pub fn from_task(id: NodeId, record: TaskRecord) -> Self {
        Self {
            id,
            title: record.title,
            description: record.description,
            parent_id: record.parent_id,
            order: record.order.unwrap_or(0),
            created_at: record.created_at,
            kind: NodeKind::Task(TaskDetails {
                frequency: record.frequency,
                weekly_days: record.weekly_days,
                scheduled_date: record.scheduled_date,
                measurement: record.measurement,
                is_completed: record.is_completed,
            }),
        }
    }

    /// The node's variant.
    #[must_use]
    pub const fn node_type(&self) -> NodeType {
        match self.kind {
            NodeKind::Goal { .. } => NodeType::Goal,
            NodeKind::Milestone { .. } => NodeType::Milestone,
            NodeKind::Requirement { .. } => NodeType::Requirement,
            NodeKind::Task(_) => NodeType::Task,
        }
    }

    /// Arena key of this node.
    #[must_use]
    pub const fn key(&self) -> NodeKey {
        NodeKey::of(self.node_type(), self.id)
    }

    /// Status of a goal-like node, `None` for tasks.
    #[must_use]
    pub const fn status(&self) -> Option<GoalStatus> {
        match self.kind {
            NodeKind::Goal { status }
            | NodeKind::Milestone { status }
            | NodeKind::Requirement { status } => Some(status),
            NodeKind::Task(_) => None,
        }
    }

    /// Task fields, `None` for goal-like nodes.
    #[must_use]
    pub const fn task(&self) -> Option<&TaskDetails> {
        match &self.kind {
            NodeKind::Task(details) => Some(details),
            _ => None,
        }
    }

    /// Whether this node is done (completed status or completed task).
    #[must_use]
    pub fn is_done(&self) -> bool {
        match &self.kind {
            NodeKind::Task(details) => details.is_completed,
            _ => self.status() == Some(GoalStatus::Completed),
        }
    }

    /// Merge a goal patch into an in-memory goal-like node.
    pub(crate) fn apply_goal_patch(&mut self, patch: &GoalPatch) {
        self.apply_common(patch.title.as_ref(), patch.description.as_ref(), patch.parent_id, patch.order);
        if let Some(new_status) = patch.status {
            match &mut self.kind {
                NodeKind::Goal { status }
                | NodeKind::Milestone { status }
                | NodeKind::Requirement { status } => *status = new_status,
                NodeKind::Task(_) => {}
            }
        }
    }

    /// Merge a task patch into an in-memory task node.
    pub(crate) fn apply_task_patch(&mut self, patch: &TaskPatch) {
        self.apply_common(patch.title.as_ref(), patch.description.as_ref(), patch.parent_id, patch.order);
        if let NodeKind::Task(details) = &mut self.kind {
            if let Some(frequency) = patch.frequency {
                details.frequency = frequency;
            }
            if let Some(weekly_days) = patch.weekly_days {
                details.weekly_days = weekly_days;
            }
            if let Some(scheduled_date) = patch.scheduled_date {
                details.scheduled_date = scheduled_date;
            }
            if let Some(measurement) = &patch.measurement {
                details.measurement.clone_from(measurement);
            }
            if let Some(is_completed) = patch.is_completed {
                details.is_completed = is_completed;
            }
        }
    }

    fn apply_common(
        &mut self,
        title: Option<&String>,
        description: Option<&Option<String>>,
        parent_id: Option<Option<NodeId>>,
        order: Option<i64>,
    ) {
        if let Some(title) = title {
            self.title.clone_from(title);
        }
        if let Some(description) = description {
            self.description.clone_from(description);
        }
        if let Some(parent_id) = parent_id {
            self.parent_id = parent_id;
        }
        if let Some(order) = order {
            self.order = order;
        }
    }
}

/// Trim a user-supplied title and reject blank ones.
///
/// The store accepts any title; this is for callers that collect titles from users.
///
/// # Errors
///
/// Returns an error if the title is empty after trimming.
pub fn validate_title(title: &str) -> Result<String> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidInput("title must not be empty".to_string()));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn goal_record(kind: GoalKind) -> GoalRecord {
        GoalRecord {
            id: None,
            title: "Buy a House".to_string(),
            description: None,
            kind,
            status: GoalStatus::Active,
            parent_id: None,
            order: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_node_type_round_trips_through_strings() {
        for node_type in
            [NodeType::Goal, NodeType::Milestone, NodeType::Requirement, NodeType::Task]
        {
            assert_eq!(NodeType::from_str(node_type.as_str()).unwrap(), node_type);
        }
        assert!(NodeType::from_str("epic").is_err());
    }

    #[test]
    fn test_node_type_groups() {
        assert_eq!(NodeType::Goal.group(), NodeGroup::Goals);
        assert_eq!(NodeType::Requirement.group(), NodeGroup::Goals);
        assert_eq!(NodeType::Task.group(), NodeGroup::Tasks);
    }

    #[test]
    fn test_weekday_set() {
        let set = WeekdaySet::from_days(&[1, 3, 5, 3]).unwrap();
        assert_eq!(set.days(), vec![1, 3, 5]);
        assert!(set.contains(3));
        assert!(!set.contains(0));
        assert!(!set.contains(9));
        assert_eq!(WeekdaySet::from_bits(set.bits()), set);
        assert!(WeekdaySet::from_days(&[7]).is_err());
    }

    #[test]
    fn test_weekday_set_serializes_as_day_list() {
        let set = WeekdaySet::from_days(&[0, 6]).unwrap();
        assert_eq!(serde_json::to_string(&set).unwrap(), "[0,6]");
        let parsed: WeekdaySet = serde_json::from_str("[2]").unwrap();
        assert!(parsed.contains(2));
        assert!(serde_json::from_str::<WeekdaySet>("[8]").is_err());
    }

    #[test]
    fn test_goal_record_apply_is_partial() {
        let mut record = goal_record(GoalKind::Goal);
        record.description = Some("keep me".to_string());
        record.apply(&GoalPatch { status: Some(GoalStatus::Completed), ..GoalPatch::default() });
        assert_eq!(record.status, GoalStatus::Completed);
        assert_eq!(record.title, "Buy a House");
        assert_eq!(record.description.as_deref(), Some("keep me"));

        record.apply(&GoalPatch { description: Some(None), ..GoalPatch::default() });
        assert!(record.description.is_none());
    }

    #[test]
    fn test_goal_record_serializes_with_persisted_field_names() {
        let mut record = goal_record(GoalKind::Milestone);
        record.parent_id = Some(4);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["type"], "milestone");
        assert_eq!(json["parentId"], 4);
        assert!(json.get("createdAt").is_some());
        assert!(json.get("id").is_none());
    }

    #[test]
    fn test_node_from_goal_has_no_task_fields() {
        let node = Node::from_goal(3, goal_record(GoalKind::Requirement));
        assert_eq!(node.node_type(), NodeType::Requirement);
        assert_eq!(node.key(), NodeKey::goal(3));
        assert!(node.task().is_none());
        assert_eq!(node.status(), Some(GoalStatus::Active));
        assert_eq!(node.order, 0);

        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["nodeType"], "requirement");
        assert!(json.get("frequency").is_none());
    }

    #[test]
    fn test_node_task_patch() {
        let record = TaskRecord {
            id: Some(1),
            parent_id: Some(2),
            title: "Save money".to_string(),
            description: None,
            frequency: Frequency::Daily,
            weekly_days: None,
            scheduled_date: None,
            measurement: None,
            is_completed: false,
            order: Some(5),
            created_at: Utc::now(),
        };
        let mut node = Node::from_task(1, record);
        node.apply_task_patch(&TaskPatch {
            is_completed: Some(true),
            measurement: Some(Some("100 USD".to_string())),
            ..TaskPatch::default()
        });
        let details = node.task().unwrap();
        assert!(details.is_completed);
        assert_eq!(details.measurement.as_deref(), Some("100 USD"));
        assert_eq!(details.frequency, Frequency::Daily);
        assert_eq!(node.order, 5);
        assert!(node.is_done());
    }

    #[test]
    fn test_updates_never_touch_structure() {
        let patch: GoalPatch = GoalUpdate { title: Some("x".into()), ..GoalUpdate::default() }.into();
        assert!(patch.parent_id.is_none());
        assert!(patch.order.is_none());
        assert!(!patch.is_empty());
        assert!(TaskPatch::from(TaskUpdate::default()).is_empty());
    }

    #[test]
    fn test_validate_title() {
        assert_eq!(validate_title("  Run  ").unwrap(), "Run");
        assert!(validate_title("   ").is_err());
    }
}
