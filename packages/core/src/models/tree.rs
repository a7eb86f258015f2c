//! Tree-shaped read models
//!
//! Nodes are stored flat; these types are assembled per request and never
//! persisted. Each response is a fresh object graph with no node shared
//! between branches.

use super::MenuNode;
use serde::{Deserialize, Serialize};

/// A node with its recursively nested, `order`-ascending children
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuTreeNode {
    #[serde(flatten)]
    pub node: MenuNode,

    /// Always present, empty for leaves
    #[serde(default)]
    pub children: Vec<MenuTreeNode>,
}

impl MenuTreeNode {
    /// Number of nodes in this subtree, including `self`
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(MenuTreeNode::node_count).sum::<usize>()
    }

    /// Depth-first search for a node by id
    pub fn find(&self, id: i64) -> Option<&MenuTreeNode> {
        if self.node.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(id))
    }

    /// Ids in pre-order (parent before children, siblings by `order`)
    pub fn preorder_ids(&self) -> Vec<i64> {
        let mut ids = Vec::with_capacity(self.node_count());
        self.collect_ids(&mut ids);
        ids
    }

    fn collect_ids(&self, ids: &mut Vec<i64>) {
        ids.push(self.node.id);
        for child in &self.children {
            child.collect_ids(ids);
        }
    }
}

/// Total node count of a forest
pub fn forest_node_count(forest: &[MenuTreeNode]) -> usize {
    forest.iter().map(MenuTreeNode::node_count).sum()
}

/// A single node with its parent and direct children
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuNodeDetail {
    #[serde(flatten)]
    pub node: MenuNode,

    pub parent: Option<MenuNode>,

    /// Direct children, `order` ascending
    pub children: Vec<MenuNode>,
}
