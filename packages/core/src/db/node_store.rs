//! MenuStore Trait - Node Repository Abstraction
//!
//! This module defines the `MenuStore` trait, the persistence collaborator of
//! `MenuService`. It is CRUD only: no ordering rules, no cycle checks, no
//! normalization. All tree invariants are enforced by the service.
//!
//! # Design Decisions
//!
//! 1. **Async-First**: All methods are async so embedded (libsql) and in-memory
//!    backends share one interface
//! 2. **Ownership Semantics**: Methods take ownership of values to avoid
//!    unnecessary cloning
//! 3. **Error Handling**: Uses `anyhow::Result`; the service maps failures to
//!    `MenuServiceError::QueryFailed`
//! 4. **Atomic Batches**: `save_many` writes all rows or none, which is how the
//!    service commits a structural change (moved node plus renormalized
//!    groups) as a single unit; `delete` carries its sibling renumbering the
//!    same way
//!
//! # Examples
//!
//! ```rust,no_run
//! use menutree_core::db::{MenuStore, TursoStore, DatabaseService};
//! use menutree_core::models::NewMenuNode;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let db = Arc::new(DatabaseService::new_in_memory().await?);
//!     let store: Arc<dyn MenuStore> = Arc::new(TursoStore::new(db));
//!
//!     let created = store.insert(NewMenuNode::new("Home"), 0).await?;
//!     println!("Created node {}", created.id);
//!     Ok(())
//! }
//! ```

use crate::models::{MenuNode, NewMenuNode};
use anyhow::Result;
use async_trait::async_trait;

/// Abstraction layer for menu node persistence
///
/// # Ordering Contract
///
/// `find_by_parent` and `find_all` return nodes ordered by `order` ascending,
/// ties broken by `id` ascending. Normalization relies on this to resolve
/// duplicate orders by insertion order.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` so the service can be shared across
/// tasks.
#[async_trait]
pub trait MenuStore: Send + Sync {
    /// Get node by ID
    ///
    /// - `Ok(Some(node))` if the node exists
    /// - `Ok(None)` if it doesn't (not an error)
    async fn find_by_id(&self, id: i64) -> Result<Option<MenuNode>>;

    /// Get the direct children of `parent_id` (`None` = root group)
    async fn find_by_parent(&self, parent_id: Option<i64>) -> Result<Vec<MenuNode>>;

    /// Get every node
    async fn find_all(&self) -> Result<Vec<MenuNode>>;

    /// Insert a new node at `order`
    ///
    /// The store assigns `id`, `created_at` and `updated_at` and returns the
    /// persisted node.
    ///
    /// # Errors
    ///
    /// Returns error if the parent doesn't exist (foreign key violation).
    async fn insert(&self, node: NewMenuNode, order: i64) -> Result<MenuNode>;

    /// Overwrite an existing node's mutable fields
    ///
    /// # Errors
    ///
    /// Returns error if the node no longer exists.
    async fn save(&self, node: MenuNode) -> Result<MenuNode>;

    /// Overwrite many existing nodes atomically
    ///
    /// Either every row is written or none is. An empty batch is a no-op.
    async fn save_many(&self, nodes: Vec<MenuNode>) -> Result<()>;

    /// Delete a node and, transitively, all of its descendants, writing
    /// `renumbered` in the same atomic unit
    ///
    /// `renumbered` carries the surviving siblings with their new orders.
    /// Rows that belong to the removed subtree are skipped; any other missing
    /// row fails the call and nothing is deleted.
    ///
    /// # Returns
    ///
    /// The ids removed, the target first. Empty if the node didn't exist
    /// (idempotent delete), in which case `renumbered` is not written.
    async fn delete(&self, id: i64, renumbered: Vec<MenuNode>) -> Result<Vec<i64>>;

    /// Highest `order` among the children of `parent_id`, `None` for an empty group
    async fn max_order(&self, parent_id: Option<i64>) -> Result<Option<i64>> {
        let siblings = self.find_by_parent(parent_id).await?;
        Ok(siblings.iter().map(|n| n.order).max())
    }
}
