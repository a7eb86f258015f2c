//! InMemoryStore - arena-backed MenuStore
//!
//! Nodes live in a flat `id → MenuNode` map; a derived `parent → children`
//! index answers sibling-group queries without scanning. No node owns another,
//! so cascade delete is a walk over the index.
//!
//! The whole arena sits behind one `tokio::sync::RwLock`, which makes every
//! method (including `save_many` and `delete` with its renumbered siblings)
//! atomic.

use crate::db::node_store::MenuStore;
use crate::models::{MenuNode, NewMenuNode};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct Arena {
    nodes: HashMap<i64, MenuNode>,
    /// Children ids per parent (`None` = root group)
    children: HashMap<Option<i64>, BTreeSet<i64>>,
    next_id: i64,
}

impl Arena {
    fn link(&mut self, parent_id: Option<i64>, id: i64) {
        self.children.entry(parent_id).or_default().insert(id);
    }

    fn unlink(&mut self, parent_id: Option<i64>, id: i64) {
        if let Some(ids) = self.children.get_mut(&parent_id) {
            ids.remove(&id);
            if ids.is_empty() {
                self.children.remove(&parent_id);
            }
        }
    }

    fn sorted(mut nodes: Vec<MenuNode>) -> Vec<MenuNode> {
        nodes.sort_by_key(|n| (n.order, n.id));
        nodes
    }

    fn group(&self, parent_id: Option<i64>) -> Vec<MenuNode> {
        let nodes = self
            .children
            .get(&parent_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.nodes.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default();
        Self::sorted(nodes)
    }

    /// Reject a batch before any of it is applied
    ///
    /// Every row must exist and point at an existing parent; ids in `doomed`
    /// count as already gone.
    fn check_batch(&self, nodes: &[MenuNode], doomed: &HashSet<i64>) -> Result<()> {
        let present = |id: &i64| self.nodes.contains_key(id) && !doomed.contains(id);

        for node in nodes {
            node.validate()
                .with_context(|| format!("Refusing to write menu {}", node.id))?;
            if !present(&node.id) {
                return Err(anyhow::anyhow!("Node not found: {}", node.id));
            }
            if let Some(parent_id) = node.parent_id {
                if !present(&parent_id) {
                    return Err(anyhow::anyhow!(
                        "Foreign key violation: parent {} does not exist",
                        parent_id
                    ));
                }
            }
        }
        Ok(())
    }

    /// Replace a stored row, keeping the parent index in sync
    fn replace(&mut self, mut node: MenuNode) -> Result<MenuNode> {
        let previous = self
            .nodes
            .get(&node.id)
            .ok_or_else(|| anyhow::anyhow!("Node not found: {}", node.id))?;

        if let Some(parent_id) = node.parent_id {
            if !self.nodes.contains_key(&parent_id) {
                return Err(anyhow::anyhow!(
                    "Foreign key violation: parent {} does not exist",
                    parent_id
                ));
            }
        }

        let old_parent = previous.parent_id;
        node.created_at = previous.created_at;
        node.updated_at = Utc::now();

        if old_parent != node.parent_id {
            self.unlink(old_parent, node.id);
            self.link(node.parent_id, node.id);
        }
        self.nodes.insert(node.id, node.clone());
        Ok(node)
    }
}

/// Arena-with-parent-ids store kept entirely in memory
#[derive(Debug, Default)]
pub struct InMemoryStore {
    arena: RwLock<Arena>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored nodes
    pub async fn len(&self) -> usize {
        self.arena.read().await.nodes.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Insert rows verbatim, bypassing every check
    ///
    /// Lets tests seed states the service would never produce (gaps,
    /// duplicate orders, parent cycles).
    pub async fn insert_raw(&self, nodes: Vec<MenuNode>) {
        let mut arena = self.arena.write().await;
        for node in nodes {
            if let Some(previous) = arena.nodes.get(&node.id) {
                let old_parent = previous.parent_id;
                arena.unlink(old_parent, node.id);
            }
            arena.next_id = arena.next_id.max(node.id);
            arena.link(node.parent_id, node.id);
            arena.nodes.insert(node.id, node);
        }
    }
}

#[async_trait]
impl MenuStore for InMemoryStore {
    async fn find_by_id(&self, id: i64) -> Result<Option<MenuNode>> {
        Ok(self.arena.read().await.nodes.get(&id).cloned())
    }

    async fn find_by_parent(&self, parent_id: Option<i64>) -> Result<Vec<MenuNode>> {
        Ok(self.arena.read().await.group(parent_id))
    }

    async fn find_all(&self) -> Result<Vec<MenuNode>> {
        let arena = self.arena.read().await;
        Ok(Arena::sorted(arena.nodes.values().cloned().collect()))
    }

    async fn insert(&self, node: NewMenuNode, order: i64) -> Result<MenuNode> {
        let mut arena = self.arena.write().await;

        if let Some(parent_id) = node.parent_id {
            if !arena.nodes.contains_key(&parent_id) {
                return Err(anyhow::anyhow!(
                    "Foreign key violation: parent {} does not exist",
                    parent_id
                ));
            }
        }

        arena.next_id += 1;
        let now = Utc::now();
        let created = MenuNode {
            id: arena.next_id,
            title: node.title,
            url: node.url,
            order,
            parent_id: node.parent_id,
            created_at: now,
            updated_at: now,
        };

        arena.link(created.parent_id, created.id);
        arena.nodes.insert(created.id, created.clone());
        Ok(created)
    }

    async fn save(&self, node: MenuNode) -> Result<MenuNode> {
        node.validate()
            .with_context(|| format!("Refusing to write menu {}", node.id))?;
        self.arena.write().await.replace(node)
    }

    async fn save_many(&self, nodes: Vec<MenuNode>) -> Result<()> {
        let mut arena = self.arena.write().await;
        arena.check_batch(&nodes, &HashSet::new())?;

        for node in nodes {
            arena.replace(node)?;
        }
        Ok(())
    }

    async fn delete(&self, id: i64, renumbered: Vec<MenuNode>) -> Result<Vec<i64>> {
        let mut arena = self.arena.write().await;

        let Some(target) = arena.nodes.get(&id) else {
            return Ok(Vec::new());
        };
        let target_parent = target.parent_id;

        // Breadth-first over the parent index: target first, then each level.
        // `seen` stops a stored parent cycle from being walked twice.
        let mut removed = Vec::new();
        let mut seen = HashSet::from([id]);
        let mut queue = VecDeque::from([id]);
        while let Some(current) = queue.pop_front() {
            removed.push(current);
            if let Some(child_ids) = arena.children.get(&Some(current)) {
                queue.extend(child_ids.iter().copied().filter(|c| seen.insert(*c)));
            }
        }

        let survivors: Vec<MenuNode> = renumbered
            .into_iter()
            .filter(|n| !seen.contains(&n.id))
            .collect();
        arena.check_batch(&survivors, &seen)?;

        for removed_id in &removed {
            arena.children.remove(&Some(*removed_id));
            arena.nodes.remove(removed_id);
        }
        arena.unlink(target_parent, id);

        for node in survivors {
            arena.replace(node)?;
        }

        Ok(removed)
    }
}
