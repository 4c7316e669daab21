//! Tree builder and flat node index.
//!
//! [`NodeIndex`] is the in-memory arena: every node keyed by [`NodeKey`].
//! Siblings sort by `(order, created_at, group, id)`, all of which are stored,
//! so a reload shows the same order as the live index.
//! [`NodeIndex::build_forest`] turns the arena into nested [`ForestNode`]s
//! from scratch each time; there is no incremental patching. At the size of
//! one person's goal tree (hundreds of nodes) the full rebuild is cheap and
//! leaves no room for the nested view to drift from the index.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::forest::models::{GoalRecord, Node, NodeGroup, NodeId, NodeKey, TaskRecord};

/// A node together with its ordered children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForestNode {
    /// The node itself.
    #[serde(flatten)]
    pub node: Node,
    /// Children sorted by `order`, then creation time.
    pub children: Vec<ForestNode>,
}

impl ForestNode {
    /// Total number of nodes in this subtree, including this one.
    #[must_use]
    pub fn subtree_len(&self) -> usize {
        1 + self.children.iter().map(Self::subtree_len).sum::<usize>()
    }

    /// Depth-first search for a node in this subtree.
    #[must_use]
    pub fn find(&self, key: NodeKey) -> Option<&Self> {
        if self.node.key() == key {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(key))
    }
}

type SiblingKey = (i64, DateTime<Utc>, NodeGroup, NodeId);

fn sibling_key(node: &Node) -> SiblingKey {
    (node.order, node.created_at, node.key().group, node.id)
}

/// Roots and parent-to-children lists after orphans and cycles are resolved.
struct Layout {
    roots: Vec<NodeKey>,
    children: HashMap<NodeId, Vec<NodeKey>>,
}

/// Flat id-indexed arena of every loaded node.
#[derive(Debug, Clone, Default)]
pub struct NodeIndex {
    entries: HashMap<NodeKey, Node>,
}

impl NodeIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Index the rows of both tables. Rows without an id are skipped.
    #[must_use]
    pub fn from_records(goals: Vec<GoalRecord>, tasks: Vec<TaskRecord>) -> Self {
        let mut index = Self::new();
        for record in goals {
            match record.id {
                Some(id) => index.insert(Node::from_goal(id, record)),
                None => tracing::warn!(title = %record.title, "skipping goal row without id"),
            }
        }
        for record in tasks {
            match record.id {
                Some(id) => index.insert(Node::from_task(id, record)),
                None => tracing::warn!(title = %record.title, "skipping task row without id"),
            }
        }
        index
    }

    /// Insert or replace a node.
    pub fn insert(&mut self, node: Node) {
        self.entries.insert(node.key(), node);
    }

    /// Remove a node, returning it if present.
    pub fn remove(&mut self, key: NodeKey) -> Option<Node> {
        self.entries.remove(&key)
    }

    /// Look up a node.
    #[must_use]
    pub fn get(&self, key: NodeKey) -> Option<&Node> {
        self.entries.get(&key)
    }

    pub(crate) fn get_mut(&mut self, key: NodeKey) -> Option<&mut Node> {
        self.entries.get_mut(&key)
    }

    /// Whether the index holds this node.
    #[must_use]
    pub fn contains(&self, key: NodeKey) -> bool {
        self.entries.contains_key(&key)
    }

    /// Number of indexed nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The parent of a node, if its `parent_id` resolves to an indexed goal-like node.
    #[must_use]
    pub fn parent_of(&self, key: NodeKey) -> Option<NodeKey> {
        let parent = NodeKey::goal(self.get(key)?.parent_id?);
        self.contains(parent).then_some(parent)
    }

    /// Members of a sibling group in display order, as the forest shows them.
    ///
    /// `None` selects the roots, which include orphans and nodes cut out of a cycle.
    #[must_use]
    pub fn siblings(&self, parent_id: Option<NodeId>) -> Vec<&Node> {
        let mut layout = self.layout();
        let keys = match parent_id {
            None => layout.roots,
            Some(id) => layout.children.remove(&id).unwrap_or_default(),
        };
        keys.into_iter().filter_map(|key| self.get(key)).collect()
    }

    /// Children of a goal-like node in display order.
    #[must_use]
    pub fn children(&self, parent_id: NodeId) -> Vec<&Node> {
        if !self.contains(NodeKey::goal(parent_id)) {
            return Vec::new();
        }
        self.siblings(Some(parent_id))
    }

    /// Order value that places a new node after every current member of the group.
    #[must_use]
    pub fn next_order(&self, parent_id: Option<NodeId>) -> i64 {
        self.siblings(parent_id).iter().map(|node| node.order).max().map_or(0, |max| max + 1)
    }

    /// Ancestors of a node, nearest first.
    #[must_use]
    pub fn ancestors(&self, key: NodeKey) -> Vec<NodeKey> {
        let mut seen = HashSet::from([key]);
        let mut chain = Vec::new();
        let mut current = key;
        while let Some(parent) = self.parent_of(current) {
            if !seen.insert(parent) {
                break;
            }
            chain.push(parent);
            current = parent;
        }
        chain
    }

    /// Whether `candidate` lies strictly below `ancestor` along stored parent links.
    #[must_use]
    pub fn is_descendant(&self, ancestor: NodeKey, candidate: NodeKey) -> bool {
        self.ancestors(candidate).contains(&ancestor)
    }

    /// A node and every node below it in the built forest, the node itself first.
    ///
    /// Follows the same cycle-cut links as [`Self::build_forest`], so the
    /// result matches the subtree a caller sees in the snapshot.
    #[must_use]
    pub fn subtree_keys(&self, key: NodeKey) -> Vec<NodeKey> {
        if !self.contains(key) {
            return Vec::new();
        }
        let children = self.layout().children;
        let mut collected = vec![key];
        let mut cursor = 0;
        while cursor < collected.len() {
            let current = collected[cursor];
            cursor += 1;
            if current.group == NodeGroup::Goals {
                collected.extend(children.get(&current.id).into_iter().flatten().copied());
            }
        }
        collected
    }

    /// Build the nested forest.
    ///
    /// Every indexed node appears exactly once. Nodes whose parent does not
    /// resolve become roots. Nodes trapped in a parent cycle (only possible if
    /// the tables were edited externally) are promoted to roots, earliest
    /// created first, which cuts each cycle at its oldest member.
    #[must_use]
    pub fn build_forest(&self) -> Vec<ForestNode> {
        let layout = self.layout();
        layout.roots.iter().map(|&key| self.assemble(key, &layout.children)).collect()
    }

    fn layout(&self) -> Layout {
        let mut children: HashMap<NodeId, Vec<NodeKey>> = HashMap::new();
        let mut roots = Vec::new();
        for node in self.entries.values() {
            match self.parent_of(node.key()) {
                Some(parent) => children.entry(parent.id).or_default().push(node.key()),
                None => roots.push(node.key()),
            }
        }

        let mut reached = HashSet::new();
        for &root in &roots {
            Self::mark_reachable(root, &children, &mut reached);
        }

        if reached.len() < self.entries.len() {
            let mut stranded: Vec<&Node> =
                self.entries.values().filter(|node| !reached.contains(&node.key())).collect();
            stranded.sort_by_key(|node| (node.created_at, node.key()));
            for node in stranded {
                let key = node.key();
                if reached.contains(&key) {
                    continue;
                }
                tracing::warn!(?key, "parent chain forms a cycle; treating node as a root");
                if let Some(list) = node.parent_id.and_then(|id| children.get_mut(&id)) {
                    list.retain(|child| *child != key);
                }
                roots.push(key);
                Self::mark_reachable(key, &children, &mut reached);
            }
        }

        self.sort_keys(&mut roots);
        for list in children.values_mut() {
            self.sort_keys(list);
        }
        Layout { roots, children }
    }

    fn sort_keys(&self, keys: &mut [NodeKey]) {
        keys.sort_by_key(|key| self.entries.get(key).map(sibling_key));
    }

    fn mark_reachable(
        root: NodeKey,
        children: &HashMap<NodeId, Vec<NodeKey>>,
        reached: &mut HashSet<NodeKey>,
    ) {
        let mut stack = vec![root];
        while let Some(key) = stack.pop() {
            if !reached.insert(key) || key.group != NodeGroup::Goals {
                continue;
            }
            stack.extend(children.get(&key.id).into_iter().flatten().copied());
        }
    }

    fn assemble(&self, key: NodeKey, children: &HashMap<NodeId, Vec<NodeKey>>) -> ForestNode {
        let node = self.entries[&key].clone();
        let kids = if key.group == NodeGroup::Goals {
            children
                .get(&key.id)
                .map(|list| list.iter().map(|&child| self.assemble(child, children)).collect())
                .unwrap_or_default()
        } else {
            Vec::new()
        };
        ForestNode { node, children: kids }
    }
}
