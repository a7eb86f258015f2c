//! TursoStore - MenuStore Implementation for Turso/libsql Backend
//!
//! Thin wrapper around `DatabaseService`: every method delegates to a `db_*`
//! helper and converts libsql rows into `MenuNode`s. No business logic lives
//! here.
//!
//! # Examples
//!
//! ```rust,no_run
//! use menutree_core::db::{MenuStore, TursoStore, DatabaseService};
//! use std::sync::Arc;
//! use std::path::PathBuf;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let db = Arc::new(DatabaseService::new(PathBuf::from("./data/menus.db")).await?);
//!     let store: Arc<dyn MenuStore> = Arc::new(TursoStore::new(db));
//!
//!     let roots = store.find_by_parent(None).await?;
//!     println!("{} root menus", roots.len());
//!     Ok(())
//! }
//! ```

use crate::db::node_store::MenuStore;
use crate::db::DatabaseService;
use crate::models::{MenuNode, NewMenuNode};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use libsql::{Row, Rows};
use std::sync::Arc;

/// TursoStore implements `MenuStore` for the libsql backend
pub struct TursoStore {
    /// Underlying database service (SQL operations)
    db: Arc<DatabaseService>,
}

impl TursoStore {
    /// Create a new TursoStore wrapper
    pub fn new(db: Arc<DatabaseService>) -> Self {
        Self { db }
    }

    /// Parse timestamp from database - handles both SQLite and RFC3339 formats
    ///
    /// SQLite CURRENT_TIMESTAMP returns: "YYYY-MM-DD HH:MM:SS"
    /// Imported data might use RFC3339: "YYYY-MM-DDTHH:MM:SSZ"
    fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
            return Ok(naive.and_utc());
        }

        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Ok(dt.with_timezone(&Utc));
        }

        Err(anyhow::anyhow!(
            "Unable to parse timestamp '{}' as SQLite or RFC3339 format",
            s
        ))
    }

    /// Convert libsql::Row to MenuNode
    ///
    /// # Row Format
    ///
    /// Expected columns (in order):
    /// - id (INTEGER)
    /// - title (TEXT)
    /// - url (TEXT, nullable)
    /// - order (INTEGER)
    /// - parent_id (INTEGER, nullable)
    /// - created_at (TEXT)
    /// - updated_at (TEXT)
    fn row_to_node(row: &Row) -> Result<MenuNode> {
        let id: i64 = row.get(0).context("Failed to get id")?;
        let title: String = row.get(1).context("Failed to get title")?;
        let url: Option<String> = row.get(2).context("Failed to get url")?;
        let order: i64 = row.get(3).context("Failed to get order")?;
        let parent_id: Option<i64> = row.get(4).context("Failed to get parent_id")?;
        let created_at_str: String = row.get(5).context("Failed to get created_at")?;
        let updated_at_str: String = row.get(6).context("Failed to get updated_at")?;

        let created_at =
            Self::parse_timestamp(&created_at_str).context("Failed to parse created_at")?;
        let updated_at =
            Self::parse_timestamp(&updated_at_str).context("Failed to parse updated_at")?;

        Ok(MenuNode {
            id,
            title,
            url,
            order,
            parent_id,
            created_at,
            updated_at,
        })
    }

    fn validate_batch(nodes: &[MenuNode]) -> Result<()> {
        for node in nodes {
            node.validate()
                .with_context(|| format!("Refusing to write menu {}", node.id))?;
        }
        Ok(())
    }

    /// Drain a row cursor, converting each row as it is read
    async fn collect_nodes(mut rows: Rows) -> Result<Vec<MenuNode>> {
        let mut nodes = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to read row: {}", e))?
        {
            nodes.push(Self::row_to_node(&row)?);
        }
        Ok(nodes)
    }
}

#[async_trait]
impl MenuStore for TursoStore {
    async fn find_by_id(&self, id: i64) -> Result<Option<MenuNode>> {
        let _gate = self.db.read_gate().await;
        match self
            .db
            .db_get_node(id)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to get node: {}", e))?
        {
            Some(row) => Ok(Some(Self::row_to_node(&row)?)),
            None => Ok(None),
        }
    }

    async fn find_by_parent(&self, parent_id: Option<i64>) -> Result<Vec<MenuNode>> {
        let _gate = self.db.read_gate().await;
        let rows = self
            .db
            .db_get_children(parent_id)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to get children: {}", e))?;

        Self::collect_nodes(rows).await
    }

    async fn find_all(&self) -> Result<Vec<MenuNode>> {
        let _gate = self.db.read_gate().await;
        let rows = self
            .db
            .db_get_all_nodes()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to get nodes: {}", e))?;

        Self::collect_nodes(rows).await
    }

    async fn insert(&self, node: NewMenuNode, order: i64) -> Result<MenuNode> {
        let id = self
            .db
            .db_insert_node(&node.title, node.url.as_deref(), order, node.parent_id)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to create node: {}", e))?;

        self.find_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Node not found after creation"))
    }

    async fn save(&self, node: MenuNode) -> Result<MenuNode> {
        node.validate()
            .with_context(|| format!("Refusing to write menu {}", node.id))?;

        let rows_affected = self
            .db
            .db_update_node(&node)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to update node: {}", e))?;

        if rows_affected == 0 {
            return Err(anyhow::anyhow!("Node not found: {}", node.id));
        }

        self.find_by_id(node.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Node not found after update"))
    }

    async fn save_many(&self, nodes: Vec<MenuNode>) -> Result<()> {
        Self::validate_batch(&nodes)?;

        self.db
            .db_update_nodes(&nodes)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to update nodes: {}", e))
    }

    async fn delete(&self, id: i64, renumbered: Vec<MenuNode>) -> Result<Vec<i64>> {
        Self::validate_batch(&renumbered)?;

        self.db
            .db_delete_node(id, &renumbered)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to delete node: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    fn renumbered(mut node: MenuNode, order: i64) -> MenuNode {
        node.order = order;
        node
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let sqlite = TursoStore::parse_timestamp("2026-02-01 10:30:00").unwrap();
        let rfc = TursoStore::parse_timestamp("2026-02-01T10:30:00Z").unwrap();
        assert_eq!(sqlite, rfc);
        assert!(TursoStore::parse_timestamp("yesterday").is_err());
    }

    #[tokio::test]
    async fn test_insert_assigns_sequential_ids() {
        let db = Arc::new(DatabaseService::new_in_memory().await.unwrap());
        let store = TursoStore::new(db);

        let first = store.insert(NewMenuNode::new("First"), 0).await.unwrap();
        let second = store
            .insert(NewMenuNode::new("Second").with_parent(first.id), 0)
            .await
            .unwrap();

        assert!(second.id > first.id);
        assert_eq!(second.parent_id, Some(first.id));
        assert_eq!(store.max_order(None).await.unwrap(), Some(0));
        assert_eq!(store.max_order(Some(second.id)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_insert_rejects_missing_parent() {
        let db = Arc::new(DatabaseService::new_in_memory().await.unwrap());
        let store = TursoStore::new(db);

        let result = store
            .insert(NewMenuNode::new("Orphan").with_parent(999), 0)
            .await;
        assert!(result.is_err(), "foreign key should reject unknown parent");
    }

    #[tokio::test]
    async fn test_delete_cascades_and_reports_subtree() {
        let db = Arc::new(DatabaseService::new_in_memory().await.unwrap());
        let store = TursoStore::new(db.clone());

        let root = store.insert(NewMenuNode::new("Root"), 0).await.unwrap();
        let child = store
            .insert(NewMenuNode::new("Child").with_parent(root.id), 0)
            .await
            .unwrap();
        let grandchild = store
            .insert(NewMenuNode::new("Grandchild").with_parent(child.id), 0)
            .await
            .unwrap();
        let other = store.insert(NewMenuNode::new("Other"), 1).await.unwrap();

        let removed = store.delete(root.id, Vec::new()).await.unwrap();
        assert_eq!(removed, vec![root.id, child.id, grandchild.id]);
        assert_eq!(db.db_count_nodes().await.unwrap(), 1);
        assert!(store.find_by_id(other.id).await.unwrap().is_some());

        // Idempotent
        assert!(store.delete(root.id, Vec::new()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_many_is_all_or_nothing() {
        let db = Arc::new(DatabaseService::new_in_memory().await.unwrap());
        let store = TursoStore::new(db);

        let a = store.insert(NewMenuNode::new("A"), 0).await.unwrap();
        let mut renamed = a.clone();
        renamed.title = "A2".to_string();
        let mut ghost = a.clone();
        ghost.id = 4242;

        let result = store.save_many(vec![renamed, ghost]).await;
        assert!(result.is_err());

        let reloaded = store.find_by_id(a.id).await.unwrap().unwrap();
        assert_eq!(reloaded.title, "A", "rolled back batch must not apply");
    }

    #[tokio::test]
    async fn test_delete_terminates_on_stored_parent_cycle() {
        let db = Arc::new(DatabaseService::new_in_memory().await.unwrap());
        let store = TursoStore::new(db.clone());

        let a = store.insert(NewMenuNode::new("A"), 0).await.unwrap();
        let b = store
            .insert(NewMenuNode::new("B").with_parent(a.id), 0)
            .await
            .unwrap();

        // Close the loop behind the engine's back: A -> B -> A
        let conn = db.connect_with_timeout().await.unwrap();
        conn.execute("UPDATE menus SET parent_id = ? WHERE id = ?", [b.id, a.id])
            .await
            .unwrap();

        let removed = timeout(Duration::from_secs(5), store.delete(a.id, Vec::new()))
            .await
            .expect("delete must not hang on a parent cycle")
            .unwrap();

        assert_eq!(removed, vec![a.id, b.id]);
        assert_eq!(db.db_count_nodes().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_writes_renumbered_siblings_in_same_commit() {
        let db = Arc::new(DatabaseService::new_in_memory().await.unwrap());
        let store = TursoStore::new(db);

        let x = store.insert(NewMenuNode::new("X"), 0).await.unwrap();
        let y = store.insert(NewMenuNode::new("Y"), 1).await.unwrap();
        let z = store.insert(NewMenuNode::new("Z"), 2).await.unwrap();

        let removed = store
            .delete(y.id, vec![renumbered(z.clone(), 1)])
            .await
            .unwrap();
        assert_eq!(removed, vec![y.id]);

        let orders: Vec<(i64, i64)> = store
            .find_by_parent(None)
            .await
            .unwrap()
            .into_iter()
            .map(|n| (n.id, n.order))
            .collect();
        assert_eq!(orders, vec![(x.id, 0), (z.id, 1)]);
    }

    #[tokio::test]
    async fn test_delete_rolls_back_when_renumbering_fails() {
        let db = Arc::new(DatabaseService::new_in_memory().await.unwrap());
        let store = TursoStore::new(db.clone());

        let x = store.insert(NewMenuNode::new("X"), 0).await.unwrap();
        let y = store.insert(NewMenuNode::new("Y"), 1).await.unwrap();
        let z = store.insert(NewMenuNode::new("Z"), 2).await.unwrap();
        let mut ghost = renumbered(z.clone(), 2);
        ghost.id = 4242;

        let result = store
            .delete(y.id, vec![renumbered(z.clone(), 1), ghost])
            .await;
        assert!(result.is_err());

        // Nothing deleted, nothing renumbered
        assert_eq!(db.db_count_nodes().await.unwrap(), 3);
        let orders: Vec<(i64, i64)> = store
            .find_by_parent(None)
            .await
            .unwrap()
            .into_iter()
            .map(|n| (n.id, n.order))
            .collect();
        assert_eq!(orders, vec![(x.id, 0), (y.id, 1), (z.id, 2)]);
    }

    #[tokio::test]
    async fn test_writes_reject_invalid_rows() {
        let db = Arc::new(DatabaseService::new_in_memory().await.unwrap());
        let store = TursoStore::new(db);

        let a = store.insert(NewMenuNode::new("A"), 0).await.unwrap();

        let mut blank = a.clone();
        blank.title = "  ".to_string();
        assert!(store.save(blank).await.is_err());

        let mut self_parent = a.clone();
        self_parent.parent_id = Some(a.id);
        assert!(store.save_many(vec![self_parent]).await.is_err());

        assert!(store
            .delete(a.id, vec![renumbered(a.clone(), -1)])
            .await
            .is_err());
        assert_eq!(store.find_by_id(a.id).await.unwrap(), Some(a));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_in_memory_reads_never_see_open_transaction() {
        let db = Arc::new(DatabaseService::new_in_memory().await.unwrap());
        let store = Arc::new(TursoStore::new(db));

        let first = store.insert(NewMenuNode::new("First"), 0).await.unwrap();
        let second = store.insert(NewMenuNode::new("Second"), 1).await.unwrap();

        // Swap the pair repeatedly; half-way through each batch both rows
        // share the same order
        let writer = {
            let store = store.clone();
            let (mut p, mut q) = (first, second);
            tokio::spawn(async move {
                for _ in 0..50 {
                    std::mem::swap(&mut p.order, &mut q.order);
                    store.save_many(vec![p.clone(), q.clone()]).await.unwrap();
                }
            })
        };

        let mut readers = Vec::new();
        for _ in 0..3 {
            let store = store.clone();
            readers.push(tokio::spawn(async move {
                for _ in 0..50 {
                    let mut orders: Vec<i64> = store
                        .find_by_parent(None)
                        .await
                        .unwrap()
                        .into_iter()
                        .map(|n| n.order)
                        .collect();
                    orders.sort_unstable();
                    assert_eq!(orders, vec![0, 1]);
                }
            }));
        }

        writer.await.unwrap();
        for reader in readers {
            reader.await.unwrap();
        }
    }
}
