//! Menu Service - Tree Store Engine
//!
//! `MenuService` is the one canonical engine over the menu tree. It owns no
//! nodes between calls: every operation re-fetches what it needs from the
//! `MenuStore`, validates, and commits its writes.
//!
//! # Invariants
//!
//! After every operation returns successfully:
//!
//! - Following `parent_id` from any node reaches a root in finitely many steps
//! - No node is its own parent
//! - Every sibling group has orders exactly `0..k-1`
//!
//! Structural changes (moved node plus the renormalized old and new groups)
//! are computed in memory and persisted with a single atomic `save_many`; a
//! cascading delete hands its renumbered siblings to the same `delete` call.
//! The last two invariants therefore hold at every commit boundary.
//!
//! # Concurrency
//!
//! Each write runs inside a `StructuralScope` from [`SiblingLocks`]; see that
//! module for the locking rules. Reads take no locks.
//!
//! # Examples
//!
//! ```no_run
//! use menutree_core::db::InMemoryStore;
//! use menutree_core::models::NewMenuNode;
//! use menutree_core::services::MenuService;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let service = MenuService::new(Arc::new(InMemoryStore::new()));
//!
//! let home = service.create_node(NewMenuNode::new("Home")).await?;
//! let about = service
//!     .create_node(NewMenuNode::new("About").with_url("/about").with_parent(home.id))
//!     .await?;
//!
//! service.move_node(about.id, None).await?;
//! let forest = service.list_tree().await?;
//! assert_eq!(forest.len(), 2);
//! # Ok(())
//! # }
//! ```

use crate::config::EngineConfig;
use crate::db::{MenuEvent, MenuStore};
use crate::models::{
    validate_id, validate_order, DeleteResult, MenuNode, MenuNodeDetail, MenuNodeUpdate,
    MenuTreeNode, NewMenuNode,
};
use crate::operations::{GroupKey, SiblingLocks, StructuralScope};
use crate::services::error::MenuServiceError;
use crate::services::hierarchy::{ancestors_of, ensure_acyclic};
use crate::services::sibling_order::{is_dense, normalized_orders, place_at};
use crate::services::tree_builder::{build_forest, build_subtree};
use std::sync::Arc;
use tokio::sync::broadcast;

type Result<T> = std::result::Result<T, MenuServiceError>;

fn storage(err: anyhow::Error) -> MenuServiceError {
    MenuServiceError::query_failed(err.to_string())
}

/// Apply the title/url parts of an update to a fetched node
fn apply_fields(node: &mut MenuNode, update: &MenuNodeUpdate) {
    if let Some(title) = &update.title {
        node.title = title.clone();
    }
    if let Some(url) = &update.url {
        node.url = url.clone();
    }
}

/// Tree Store Engine
pub struct MenuService {
    store: Arc<dyn MenuStore>,
    locks: SiblingLocks,
    event_tx: broadcast::Sender<MenuEvent>,
    max_tree_depth: usize,
}

impl MenuService {
    /// Create a service with default configuration
    pub fn new(store: Arc<dyn MenuStore>) -> Self {
        Self::with_config(store, &EngineConfig::default())
    }

    pub fn with_config(store: Arc<dyn MenuStore>, config: &EngineConfig) -> Self {
        let (event_tx, _) = broadcast::channel(config.event_channel_capacity.max(1));
        Self {
            store,
            locks: SiblingLocks::new(),
            event_tx,
            max_tree_depth: config.max_tree_depth,
        }
    }

    /// Subscribe to events emitted after successful writes
    ///
    /// Events sent while no receiver exists are dropped; a receiver that falls
    /// more than the channel capacity behind sees `RecvError::Lagged`.
    pub fn subscribe_to_events(&self) -> broadcast::Receiver<MenuEvent> {
        self.event_tx.subscribe()
    }

    fn emit_event(&self, event: MenuEvent) {
        tracing::debug!("Emitting {}", event.event_type());
        let _ = self.event_tx.send(event);
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// The whole forest, roots and every level of children in ascending order
    pub async fn list_tree(&self) -> Result<Vec<MenuTreeNode>> {
        let nodes = self.store.find_all().await.map_err(storage)?;
        tracing::debug!("Building menu forest from {} nodes", nodes.len());
        Ok(build_forest(nodes))
    }

    /// A node with its parent and direct children
    pub async fn get_node(&self, id: i64) -> Result<MenuNodeDetail> {
        validate_id(id)?;
        let node = self.fetch(id).await?;

        let parent = match node.parent_id {
            Some(parent_id) => self.store.find_by_id(parent_id).await.map_err(storage)?,
            None => None,
        };
        let children = self.store.find_by_parent(Some(id)).await.map_err(storage)?;

        Ok(MenuNodeDetail {
            node,
            parent,
            children,
        })
    }

    /// The nested tree rooted at `id`
    pub async fn get_subtree(&self, id: i64) -> Result<MenuTreeNode> {
        validate_id(id)?;
        let root = self.fetch(id).await?;
        let nodes = self.store.find_all().await.map_err(storage)?;
        Ok(build_subtree(root, nodes))
    }

    /// Ancestors of `id` from the root down to its parent
    pub async fn get_ancestors(&self, id: i64) -> Result<Vec<MenuNode>> {
        validate_id(id)?;
        ancestors_of(self.store.as_ref(), id, self.max_tree_depth).await
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Create a node at the end of its sibling group
    ///
    /// Other siblings are left untouched.
    ///
    /// # Errors
    ///
    /// - `ValidationFailed` for a blank title or non-positive parent id
    /// - `NodeNotFound` if `parent_id` doesn't exist
    pub async fn create_node(&self, new_node: NewMenuNode) -> Result<MenuNode> {
        new_node.validate()?;

        let parent_id = new_node.parent_id;
        let _scope = self.locks.shared([GroupKey::of(parent_id)]).await;

        if let Some(parent_id) = parent_id {
            self.fetch(parent_id).await?;
        }

        let order = self
            .store
            .max_order(parent_id)
            .await
            .map_err(storage)?
            .map_or(0, |max| max + 1);

        let node = self.store.insert(new_node, order).await.map_err(storage)?;
        tracing::info!(
            "Created menu {} '{}' under {:?} at order {}",
            node.id,
            node.title,
            node.parent_id,
            node.order
        );

        self.emit_event(MenuEvent::NodeCreated { node: node.clone() });
        Ok(node)
    }

    /// Update title, url and/or parent
    ///
    /// A parent change behaves like [`move_node`](Self::move_node): the node is
    /// appended to the new group and both groups are renormalized in the same
    /// write as the field changes. Setting the current parent again leaves the
    /// ordering alone.
    pub async fn update_node(&self, id: i64, update: MenuNodeUpdate) -> Result<MenuNode> {
        validate_id(id)?;
        update.validate()?;

        if update.is_empty() {
            tracing::debug!("Empty update for menu {}", id);
            return self.fetch(id).await;
        }

        if let Some(new_parent_id) = update.parent_id {
            let _scope = self.locks.exclusive().await;
            let mut node = self.fetch(id).await?;

            if node.parent_id != new_parent_id {
                let old_parent_id = node.parent_id;
                apply_fields(&mut node, &update);
                let updated = self.relocate(node, new_parent_id).await?;

                tracing::info!(
                    "Updated menu {} and moved it from {:?} to {:?}",
                    id,
                    old_parent_id,
                    new_parent_id
                );
                self.emit_event(MenuEvent::NodeUpdated {
                    node: updated.clone(),
                });
                self.emit_event(MenuEvent::NodeMoved {
                    id,
                    old_parent_id,
                    new_parent_id,
                });
                return Ok(updated);
            }

            apply_fields(&mut node, &update);
            return self.save_fields(node).await;
        }

        let (_scope, mut node) = self.lock_own_group(id).await?;
        apply_fields(&mut node, &update);
        self.save_fields(node).await
    }

    /// Delete a node and its whole subtree, closing the gap it left
    ///
    /// Descendants are removed by the store's cascade, not by the engine. The
    /// surviving siblings are renumbered in the same atomic write as the
    /// delete.
    pub async fn delete_node(&self, id: i64) -> Result<DeleteResult> {
        validate_id(id)?;

        let _scope = self.locks.exclusive().await;
        let node = self.fetch(id).await?;

        let remaining: Vec<MenuNode> = self
            .siblings(node.parent_id)
            .await?
            .into_iter()
            .filter(|n| n.id != id)
            .collect();
        let renumbered = normalized_orders(remaining);
        let repaired = renumbered.len();

        let deleted_ids = self.store.delete(id, renumbered).await.map_err(storage)?;
        if deleted_ids.is_empty() {
            return Err(MenuServiceError::node_not_found(id));
        }

        tracing::info!(
            "Deleted menu {} with {} descendants, renumbered {} siblings",
            id,
            deleted_ids.len() - 1,
            repaired
        );

        self.emit_event(MenuEvent::NodeDeleted {
            ids: deleted_ids.clone(),
        });
        Ok(DeleteResult { deleted_ids })
    }

    /// Re-parent a node (`None` = root), appending it to the new group
    ///
    /// # Errors
    ///
    /// - `NodeNotFound` if the node or the new parent doesn't exist
    /// - `InvalidOperation` for a self-parent, a descendant as parent, or a
    ///   corrupt ancestor chain
    pub async fn move_node(&self, id: i64, new_parent_id: Option<i64>) -> Result<MenuNode> {
        validate_id(id)?;
        if let Some(parent_id) = new_parent_id {
            validate_id(parent_id)?;
        }

        let _scope = self.locks.exclusive().await;
        let node = self.fetch(id).await?;
        let old_parent_id = node.parent_id;

        let moved = self.relocate(node, new_parent_id).await?;
        tracing::info!(
            "Moved menu {} from {:?} to {:?} at order {}",
            id,
            old_parent_id,
            new_parent_id,
            moved.order
        );

        self.emit_event(MenuEvent::NodeMoved {
            id,
            old_parent_id,
            new_parent_id,
        });
        Ok(moved)
    }

    /// Move a node to position `new_order` within its current group
    ///
    /// Positions past the end clamp to the last slot; the other siblings keep
    /// their relative order and the group ends up dense.
    pub async fn reorder_node(&self, id: i64, new_order: i64) -> Result<MenuNode> {
        validate_id(id)?;
        validate_order(new_order)?;

        let (_scope, node) = self.lock_own_group(id).await?;
        let parent_id = node.parent_id;

        let siblings = self.siblings(parent_id).await?;
        if !is_dense(&siblings) {
            tracing::warn!("Repairing non-dense sibling group {:?} during reorder", parent_id);
        }

        let position = usize::try_from(new_order).unwrap_or(usize::MAX);
        let changes = place_at(siblings, node, position);

        if changes.is_empty() {
            tracing::debug!("Menu {} already at position {}", id, new_order);
            return self.fetch(id).await;
        }

        tracing::debug!(
            "Reordering menu {} to {} ({} rows changed)",
            id,
            new_order,
            changes.len()
        );
        self.store.save_many(changes).await.map_err(storage)?;

        self.emit_event(MenuEvent::SiblingsReordered { parent_id });
        self.fetch(id).await
    }

    /// Rewrite one sibling group to dense `0..k-1` orders
    ///
    /// Returns the number of rows changed. Useful to repair data written
    /// outside the engine.
    pub async fn normalize_group(&self, parent_id: Option<i64>) -> Result<usize> {
        if let Some(parent_id) = parent_id {
            validate_id(parent_id)?;
        }

        let _scope = self.locks.shared([GroupKey::of(parent_id)]).await;
        let changed = self.normalize_locked(parent_id).await?;
        if changed > 0 {
            tracing::warn!("Normalized {} orders in sibling group {:?}", changed, parent_id);
            self.emit_event(MenuEvent::SiblingsReordered { parent_id });
        }
        Ok(changed)
    }

    // ------------------------------------------------------------------
    // Helpers (callers hold the appropriate scope)
    // ------------------------------------------------------------------

    async fn fetch(&self, id: i64) -> Result<MenuNode> {
        self.store
            .find_by_id(id)
            .await
            .map_err(storage)?
            .ok_or_else(|| MenuServiceError::node_not_found(id))
    }

    async fn siblings(&self, parent_id: Option<i64>) -> Result<Vec<MenuNode>> {
        self.store.find_by_parent(parent_id).await.map_err(storage)
    }

    /// Lock the group `id` currently lives in and return the node as seen
    /// under that lock
    ///
    /// If the node was re-parented between the first read and acquiring the
    /// group lock, fall back to the exclusive scope.
    async fn lock_own_group(&self, id: i64) -> Result<(StructuralScope, MenuNode)> {
        let seen = self.fetch(id).await?;
        let scope = self.locks.shared([GroupKey::of(seen.parent_id)]).await;

        let current = self.fetch(id).await?;
        if current.parent_id == seen.parent_id {
            return Ok((scope, current));
        }
        drop(scope);

        tracing::debug!("Menu {} changed group while waiting for its lock", id);
        let scope = self.locks.exclusive().await;
        let current = self.fetch(id).await?;
        Ok((scope, current))
    }

    async fn save_fields(&self, node: MenuNode) -> Result<MenuNode> {
        let id = node.id;
        let saved = self.store.save(node).await.map_err(storage)?;
        tracing::info!("Updated menu {}", id);
        self.emit_event(MenuEvent::NodeUpdated {
            node: saved.clone(),
        });
        Ok(saved)
    }

    /// Attach `node` under `new_parent_id` and renormalize both groups in one
    /// atomic write. Requires the exclusive scope.
    async fn relocate(&self, node: MenuNode, new_parent_id: Option<i64>) -> Result<MenuNode> {
        ensure_acyclic(self.store.as_ref(), node.id, new_parent_id, self.max_tree_depth).await?;

        let id = node.id;
        let old_parent_id = node.parent_id;

        let mut moved = node;
        moved.parent_id = new_parent_id;

        let target_group = self.siblings(new_parent_id).await?;
        let mut batch = place_at(target_group, moved.clone(), usize::MAX);
        if !batch.iter().any(|n| n.id == id) {
            batch.push(moved);
        }

        if old_parent_id != new_parent_id {
            let remaining: Vec<MenuNode> = self
                .siblings(old_parent_id)
                .await?
                .into_iter()
                .filter(|n| n.id != id)
                .collect();
            batch.extend(normalized_orders(remaining));
        }

        tracing::debug!("Relocating menu {} ({} rows)", id, batch.len());
        self.store.save_many(batch).await.map_err(storage)?;
        self.fetch(id).await
    }

    async fn normalize_locked(&self, parent_id: Option<i64>) -> Result<usize> {
        let changes = normalized_orders(self.siblings(parent_id).await?);
        let changed = changes.len();
        if changed > 0 {
            self.store.save_many(changes).await.map_err(storage)?;
        }
        Ok(changed)
    }
}

// Comprehensive tests in separate module
#[cfg(test)]
#[path = "menu_service_test.rs"]
mod menu_service_test;
