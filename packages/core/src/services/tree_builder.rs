//! In-memory tree construction
//!
//! Builds nested `MenuTreeNode`s from a flat node list using an adjacency list
//! (`parent_id → children`), which keeps data fetching (one `find_all`) apart
//! from tree construction.

use crate::models::{MenuNode, MenuTreeNode};
use std::collections::HashMap;

type Adjacency = HashMap<Option<i64>, Vec<MenuNode>>;

fn adjacency_list(nodes: Vec<MenuNode>) -> Adjacency {
    let mut adjacency: Adjacency = HashMap::new();
    for node in nodes {
        adjacency.entry(node.parent_id).or_default().push(node);
    }

    // Sort children by order for each parent; id breaks ties
    for children in adjacency.values_mut() {
        children.sort_by_key(|n| (n.order, n.id));
    }

    adjacency
}

/// Recursively attach children, consuming entries from the adjacency list
///
/// Consuming guarantees every node is emitted at most once even if stored
/// data contains a parent cycle.
fn attach_children(node: MenuNode, adjacency: &mut Adjacency) -> MenuTreeNode {
    let children = adjacency
        .remove(&Some(node.id))
        .unwrap_or_default()
        .into_iter()
        .map(|child| attach_children(child, adjacency))
        .collect();

    MenuTreeNode { node, children }
}

/// Build the whole forest: root-group nodes with recursively nested children
///
/// Nodes unreachable from the root group (dangling parent ids, or members of a
/// stored cycle) are left out and reported with a warning.
pub fn build_forest(nodes: Vec<MenuNode>) -> Vec<MenuTreeNode> {
    let total = nodes.len();
    let mut adjacency = adjacency_list(nodes);

    let roots = adjacency.remove(&None).unwrap_or_default();
    let forest: Vec<MenuTreeNode> = roots
        .into_iter()
        .map(|root| attach_children(root, &mut adjacency))
        .collect();

    let unreachable: usize = adjacency.values().map(Vec::len).sum();
    if unreachable > 0 {
        tracing::warn!(
            "{} of {} menu nodes are unreachable from the root group",
            unreachable,
            total
        );
    }

    forest
}

/// Build the subtree rooted at `root` out of a flat list of candidate nodes
///
/// `nodes` may contain unrelated nodes; only descendants of `root` are used.
pub fn build_subtree(root: MenuNode, nodes: Vec<MenuNode>) -> MenuTreeNode {
    let root_id = root.id;
    let mut adjacency = adjacency_list(nodes.into_iter().filter(|n| n.id != root_id).collect());
    attach_children(root, &mut adjacency)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::forest_node_count;
    use chrono::Utc;

    fn node(id: i64, parent_id: Option<i64>, order: i64) -> MenuNode {
        MenuNode {
            id,
            title: format!("Menu {}", id),
            url: None,
            order,
            parent_id,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_build_forest_orders_each_level() {
        let nodes = vec![
            node(1, None, 1),
            node(2, None, 0),
            node(3, Some(1), 1),
            node(4, Some(1), 0),
            node(5, Some(4), 0),
        ];

        let forest = build_forest(nodes);

        assert_eq!(forest.len(), 2);
        assert_eq!(forest[0].node.id, 2);
        assert_eq!(forest[1].node.id, 1);
        assert_eq!(forest[1].preorder_ids(), vec![1, 4, 5, 3]);
        assert_eq!(forest_node_count(&forest), 5);
    }

    #[test]
    fn test_children_carry_enclosing_parent_id() {
        let forest = build_forest(vec![
            node(1, None, 0),
            node(2, Some(1), 0),
            node(3, Some(2), 0),
            node(4, Some(2), 1),
        ]);

        fn check(tree: &MenuTreeNode) {
            for child in &tree.children {
                assert_eq!(child.node.parent_id, Some(tree.node.id));
                check(child);
            }
        }
        forest.iter().for_each(check);
    }

    #[test]
    fn test_empty_collection_yields_empty_forest() {
        assert!(build_forest(Vec::new()).is_empty());
    }

    #[test]
    fn test_stored_cycle_is_left_out() {
        // 2 and 3 point at each other and never reach the root group
        let forest = build_forest(vec![node(1, None, 0), node(2, Some(3), 0), node(3, Some(2), 0)]);
        assert_eq!(forest_node_count(&forest), 1);
    }

    #[test]
    fn test_build_subtree_ignores_unrelated_nodes() {
        let subtree = build_subtree(
            node(2, Some(1), 0),
            vec![
                node(1, None, 0),
                node(2, Some(1), 0),
                node(3, Some(2), 0),
                node(4, Some(1), 1),
            ],
        );

        assert_eq!(subtree.preorder_ids(), vec![2, 3]);
    }
}
