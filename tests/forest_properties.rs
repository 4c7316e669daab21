//! Property tests: the forest stays a forest under random mutation sequences.

use goal_forest::forest::{
    ForestNode, MemoryStore, NewGoal, NewTask, NodeGroup, NodeKey, NodeStore, NodeType,
};
use proptest::prelude::*;
use std::collections::HashSet;

#[derive(Debug, Clone)]
enum Op {
    AddGoal { parent: Option<usize> },
    AddTask { parent: usize },
    Move { node: usize, parent: Option<usize> },
    Delete { node: usize },
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => proptest::option::of(any::<usize>()).prop_map(|parent| Op::AddGoal { parent }),
        2 => any::<usize>().prop_map(|parent| Op::AddTask { parent }),
        3 => (any::<usize>(), proptest::option::of(any::<usize>()))
            .prop_map(|(node, parent)| Op::Move { node, parent }),
        1 => any::<usize>().prop_map(|node| Op::Delete { node }),
    ]
}

fn node_type_of(key: NodeKey) -> NodeType {
    match key.group {
        NodeGroup::Goals => NodeType::Goal,
        NodeGroup::Tasks => NodeType::Task,
    }
}

/// Every node key in the forest, checking parent links along the way.
fn collect(
    parent: Option<&ForestNode>,
    nodes: &[ForestNode],
    seen: &mut HashSet<NodeKey>,
) -> Result<(), TestCaseError> {
    for tree in nodes {
        let key = tree.node.key();
        prop_assert!(seen.insert(key), "{:?} appears twice", key);
        match parent {
            Some(parent) => {
                prop_assert_eq!(parent.node.key().group, NodeGroup::Goals);
                prop_assert_eq!(tree.node.parent_id, Some(parent.node.id));
            }
            None => prop_assert_eq!(tree.node.parent_id, None),
        }
        collect(Some(tree), &tree.children, seen)?;
    }
    Ok(())
}

async fn apply(store: &NodeStore<MemoryStore>, keys: &mut Vec<NodeKey>, op: Op) {
    let goal_ids: Vec<i64> =
        keys.iter().filter(|k| k.group == NodeGroup::Goals).map(|k| k.id).collect();
    let pick_goal = |i: usize| (!goal_ids.is_empty()).then(|| goal_ids[i % goal_ids.len()]);

    match op {
        Op::AddGoal { parent } => {
            let input = NewGoal { parent_id: parent.and_then(pick_goal), ..NewGoal::titled("g") };
            if let Ok(id) = store.add_goal(input).await {
                keys.push(NodeKey::goal(id));
            }
        }
        Op::AddTask { parent } => {
            if let Some(parent_id) = pick_goal(parent) {
                if let Ok(id) = store.add_task(NewTask::titled("t", parent_id)).await {
                    keys.push(NodeKey::task(id));
                }
            }
        }
        Op::Move { node, parent } => {
            if keys.is_empty() {
                return;
            }
            let key = keys[node % keys.len()];
            // Cycles are rejected; that is part of what is being exercised.
            let _ = store.move_node(key.id, node_type_of(key), parent.and_then(pick_goal)).await;
        }
        Op::Delete { node } => {
            if keys.is_empty() {
                return;
            }
            let key = keys[node % keys.len()];
            let _ = store.delete_node(key.id, node_type_of(key)).await;
            keys.retain(|k| store.get_node(k.id, node_type_of(*k)).is_some());
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Every stored node is reachable exactly once with consistent parent links.
    #[test]
    fn forest_integrity(ops in proptest::collection::vec(arb_op(), 1..40)) {
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        rt.block_on(async {
            let store = NodeStore::new(MemoryStore::new());
            store.initialize().await.unwrap();
            let mut keys = Vec::new();
            for op in ops {
                apply(&store, &mut keys, op).await;
            }

            let snapshot = store.snapshot();
            let mut seen = HashSet::new();
            collect(None, &snapshot.root_goals, &mut seen)?;
            prop_assert_eq!(seen.len(), store.node_count());
            prop_assert_eq!(seen, keys.iter().copied().collect::<HashSet<_>>());

            for key in &keys {
                let ancestors = store.ancestors(key.id, node_type_of(*key));
                prop_assert!(ancestors.iter().all(|n| n.key() != *key));
            }

            // Storage holds the same forest.
            let before = snapshot.root_goals;
            store.refresh().await.unwrap();
            prop_assert_eq!(store.snapshot().root_goals.len(), before.len());
            prop_assert_eq!(store.node_count(), keys.len());
            Ok::<(), TestCaseError>(())
        })?;
    }
}
