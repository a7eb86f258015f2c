//! Database Connection Management
//!
//! This module provides the database connection and schema initialization
//! for the menu tree using libsql (embedded, SQLite-compatible).
//!
//! # Architecture
//!
//! - **Path-agnostic**: Accepts any valid PathBuf, or runs fully in memory
//! - **WAL mode**: Write-Ahead Logging for file databases
//! - **Foreign keys**: Enabled on every connection, so `ON DELETE CASCADE`
//!   removes a deleted node's whole subtree
//! - **Raw rows**: The `db_*` helpers return libsql rows; `TursoStore` owns the
//!   row → `MenuNode` conversion
//!
//! # Database Connection Patterns
//!
//! **ALWAYS use `connect_with_timeout()` in async functions.** It configures the
//! busy timeout so concurrent writers wait instead of failing with
//! `SQLITE_BUSY`, and turns on foreign key enforcement, which SQLite tracks per
//! connection.
//!
//! ```no_run
//! # use menutree_core::db::DatabaseService;
//! # use std::path::PathBuf;
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let db_service = DatabaseService::new(PathBuf::from("./data/menus.db")).await?;
//! let conn = db_service.connect_with_timeout().await?;
//! # Ok(())
//! # }
//! ```
//!
//! # In-memory databases
//!
//! Every libsql connection to `:memory:` opens a distinct, empty database, so
//! `new_in_memory()` pins a single connection and hands out clones of it.
//! Reads on that connection go through [`DatabaseService::read_gate`] so they
//! never observe a half-written transaction.

use crate::db::error::DatabaseError;
use crate::models::MenuNode;
use libsql::{Builder, Connection, Database};
use std::path::PathBuf;
use std::sync::Arc;

/// Default SQLite busy timeout in milliseconds
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5000;

/// Column list shared by every node query (matches `TursoStore::row_to_node`)
const NODE_COLUMNS: &str =
    r#"id, title, url, "order", parent_id, created_at, updated_at"#;

/// Database service for managing the libsql connection and schema
///
/// # Examples
///
/// ```no_run
/// use menutree_core::db::DatabaseService;
/// use std::path::PathBuf;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let db_path = PathBuf::from("/path/to/menus.db");
///     let db_service = DatabaseService::new(db_path).await?;
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct DatabaseService {
    /// libsql database handle (wrapped in Arc for sharing)
    pub db: Arc<Database>,

    /// Path to the database file (`:memory:` for in-memory databases)
    pub db_path: PathBuf,

    /// Busy timeout applied to every connection
    busy_timeout_ms: u64,

    /// Pinned connection for in-memory databases
    shared_conn: Option<Connection>,

    /// Serializes writes issued by this service (required for the shared
    /// in-memory connection, where a second BEGIN would fail)
    write_gate: Arc<tokio::sync::Mutex<()>>,
}

impl std::fmt::Debug for DatabaseService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseService")
            .field("db_path", &self.db_path)
            .field("busy_timeout_ms", &self.busy_timeout_ms)
            .field("in_memory", &self.shared_conn.is_some())
            .finish()
    }
}

impl DatabaseService {
    /// Create a new DatabaseService with the specified database path
    ///
    /// This will:
    /// 1. Ensure the parent directory exists (create if needed)
    /// 2. Open/create the database file
    /// 3. Initialize the schema (CREATE TABLE IF NOT EXISTS)
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if:
    /// - Parent directory cannot be created
    /// - Database connection fails
    /// - Schema initialization fails
    pub async fn new(db_path: PathBuf) -> Result<Self, DatabaseError> {
        Self::new_with_timeout(db_path, DEFAULT_BUSY_TIMEOUT_MS).await
    }

    /// Same as [`DatabaseService::new`] with an explicit busy timeout
    pub async fn new_with_timeout(
        db_path: PathBuf,
        busy_timeout_ms: u64,
    ) -> Result<Self, DatabaseError> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    if e.kind() == std::io::ErrorKind::PermissionDenied {
                        DatabaseError::permission_denied(db_path.clone())
                    } else {
                        DatabaseError::DirectoryCreationFailed(e)
                    }
                })?;
            }
        }

        let db = Builder::new_local(&db_path)
            .build()
            .await
            .map_err(|e| DatabaseError::connection_failed(db_path.clone(), e))?;

        let service = Self {
            db: Arc::new(db),
            db_path,
            busy_timeout_ms,
            shared_conn: None,
            write_gate: Arc::new(tokio::sync::Mutex::new(())),
        };

        service.initialize_schema(true).await?;
        tracing::debug!("Opened menu database at {}", service.db_path.display());

        Ok(service)
    }

    /// Create an in-memory database (tests, `menu-admin --in-memory`)
    pub async fn new_in_memory() -> Result<Self, DatabaseError> {
        let db_path = PathBuf::from(":memory:");
        let db = Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| DatabaseError::connection_failed(db_path.clone(), e))?;
        let conn = db.connect()?;

        let service = Self {
            db: Arc::new(db),
            db_path,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            shared_conn: Some(conn),
            write_gate: Arc::new(tokio::sync::Mutex::new(())),
        };

        service.initialize_schema(false).await?;

        Ok(service)
    }

    /// Execute a PRAGMA statement
    ///
    /// PRAGMA statements may return rows, so we must use query() instead of execute().
    async fn execute_pragma(&self, conn: &Connection, pragma: &str) -> Result<(), DatabaseError> {
        let mut stmt = conn.prepare(pragma).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute '{}': {}", pragma, e))
        })?;
        let _ = stmt.query(()).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute '{}': {}", pragma, e))
        })?;
        Ok(())
    }

    /// Initialize database schema and configuration
    ///
    /// Idempotent: safe to call against an existing database.
    ///
    /// # Schema
    ///
    /// - `menus` table: one row per node, `parent_id` cascades on delete
    /// - `idx_menus_parent_order`: sibling group scans ordered by position
    async fn initialize_schema(&self, use_wal: bool) -> Result<(), DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        if use_wal {
            self.execute_pragma(&conn, "PRAGMA journal_mode = WAL")
                .await?;
        }

        conn.execute(
            r#"CREATE TABLE IF NOT EXISTS menus (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                url TEXT,
                "order" INTEGER NOT NULL DEFAULT 0,
                parent_id INTEGER,
                created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
                -- Parent deletion cascades to the whole subtree
                FOREIGN KEY (parent_id) REFERENCES menus(id) ON DELETE CASCADE
            )"#,
            (),
        )
        .await
        .map_err(|e| {
            DatabaseError::initialization_failed(format!("Failed to create menus table: {}", e))
        })?;

        conn.execute(
            r#"CREATE INDEX IF NOT EXISTS idx_menus_parent_order ON menus(parent_id, "order")"#,
            (),
        )
        .await
        .map_err(|e| {
            DatabaseError::initialization_failed(format!(
                "Failed to create index 'idx_menus_parent_order': {}",
                e
            ))
        })?;

        Ok(())
    }

    /// Get a connection with busy timeout and foreign keys configured
    ///
    /// For in-memory databases this returns a clone of the pinned connection.
    pub async fn connect_with_timeout(&self) -> Result<Connection, DatabaseError> {
        if let Some(conn) = &self.shared_conn {
            self.execute_pragma(conn, "PRAGMA foreign_keys = ON").await?;
            return Ok(conn.clone());
        }

        let conn = self.db.connect()?;

        self.execute_pragma(&conn, &format!("PRAGMA busy_timeout = {}", self.busy_timeout_ms))
            .await?;
        self.execute_pragma(&conn, "PRAGMA foreign_keys = ON")
            .await?;

        Ok(conn)
    }

    /// Serialize a read with the writers when the connection is pinned
    ///
    /// Readers of a pinned in-memory connection share it with any open
    /// transaction and would see its uncommitted rows. Hold the returned guard
    /// until the rows are consumed. File databases give each reader its own
    /// connection and return `None`.
    pub async fn read_gate(&self) -> Option<tokio::sync::MutexGuard<'_, ()>> {
        match self.shared_conn {
            Some(_) => Some(self.write_gate.lock().await),
            None => None,
        }
    }

    //
    // NODE OPERATIONS
    // Pure SQL, no business rules. Wrapped by `TursoStore`.
    //

    /// Insert a node row and return the id SQLite assigned
    pub async fn db_insert_node(
        &self,
        title: &str,
        url: Option<&str>,
        order: i64,
        parent_id: Option<i64>,
    ) -> Result<i64, DatabaseError> {
        let _gate = self.write_gate.lock().await;
        let conn = self.connect_with_timeout().await?;

        // RETURNING keeps id assignment correct on the shared in-memory connection
        let mut rows = conn
            .query(
                r#"INSERT INTO menus (title, url, "order", parent_id) VALUES (?, ?, ?, ?) RETURNING id"#,
                (title, url, order, parent_id),
            )
            .await
            .map_err(|e| DatabaseError::sql_execution(format!("Failed to insert node: {}", e)))?;

        match rows.next().await? {
            Some(row) => Ok(row.get::<i64>(0)?),
            None => Err(DatabaseError::sql_execution(
                "Insert returned no id".to_string(),
            )),
        }
    }

    /// Retrieve a single node row by ID
    ///
    /// * `Ok(Some(row))` - node found
    /// * `Ok(None)` - no such node
    pub async fn db_get_node(&self, id: i64) -> Result<Option<libsql::Row>, DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        let mut rows = conn
            .query(
                &format!("SELECT {} FROM menus WHERE id = ?", NODE_COLUMNS),
                [id],
            )
            .await
            .map_err(|e| {
                DatabaseError::sql_execution(format!("Failed to execute get_node query: {}", e))
            })?;

        rows.next()
            .await
            .map_err(|e| DatabaseError::sql_execution(e.to_string()))
    }

    /// Get the direct children of a parent (`None` = root group)
    ///
    /// `parent_id IS ?` matches NULL for the root group. Rows are ordered by
    /// position, ties broken by id (insertion order).
    pub async fn db_get_children(
        &self,
        parent_id: Option<i64>,
    ) -> Result<libsql::Rows, DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        conn.query(
            &format!(
                r#"SELECT {} FROM menus WHERE parent_id IS ? ORDER BY "order" ASC, id ASC"#,
                NODE_COLUMNS
            ),
            [parent_id],
        )
        .await
        .map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute get_children query: {}", e))
        })
    }

    /// Get every node, ordered by position then id
    pub async fn db_get_all_nodes(&self) -> Result<libsql::Rows, DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        conn.query(
            &format!(
                r#"SELECT {} FROM menus ORDER BY "order" ASC, id ASC"#,
                NODE_COLUMNS
            ),
            (),
        )
        .await
        .map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute get_all query: {}", e))
        })
    }

    /// Update one node row
    ///
    /// Returns the number of rows affected (0 = node didn't exist).
    pub async fn db_update_node(&self, node: &MenuNode) -> Result<u64, DatabaseError> {
        let _gate = self.write_gate.lock().await;
        let conn = self.connect_with_timeout().await?;
        Self::update_row(&conn, node).await
    }

    /// Update many node rows in a single transaction
    ///
    /// All rows are written or none are: if any row is missing the transaction
    /// is rolled back and `RowVanished` is returned.
    pub async fn db_update_nodes(&self, nodes: &[MenuNode]) -> Result<(), DatabaseError> {
        if nodes.is_empty() {
            return Ok(());
        }

        let _gate = self.write_gate.lock().await;
        let conn = self.connect_with_timeout().await?;
        let tx = conn.transaction().await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to begin transaction: {}", e))
        })?;

        for node in nodes {
            match Self::update_row(&tx, node).await {
                Ok(0) => {
                    tx.rollback().await?;
                    return Err(DatabaseError::RowVanished { id: node.id });
                }
                Ok(_) => {}
                Err(e) => {
                    tx.rollback().await?;
                    return Err(e);
                }
            }
        }

        tx.commit().await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to commit batch update: {}", e))
        })?;

        Ok(())
    }

    async fn update_row(conn: &Connection, node: &MenuNode) -> Result<u64, DatabaseError> {
        conn.execute(
            r#"UPDATE menus SET title = ?, url = ?, "order" = ?, parent_id = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?"#,
            (
                node.title.as_str(),
                node.url.as_deref(),
                node.order,
                node.parent_id,
                node.id,
            ),
        )
        .await
        .map_err(|e| DatabaseError::sql_execution(format!("Failed to update node {}: {}", node.id, e)))
    }

    /// Delete a node and its subtree, then write `renumbered` in the same
    /// transaction
    ///
    /// The subtree ids are collected with a recursive CTE bounded by the row
    /// count, so a stored parent cycle cannot make the walk run forever. The
    /// target is detached before the DELETE, which leaves `ON DELETE CASCADE`
    /// nothing circular to follow. Rows of `renumbered` that fell inside the
    /// removed subtree are skipped; any other missing row rolls the whole
    /// delete back with `RowVanished`.
    ///
    /// Returns the removed ids (target first, then by depth), or an empty
    /// list if the node didn't exist.
    pub async fn db_delete_node(
        &self,
        id: i64,
        renumbered: &[MenuNode],
    ) -> Result<Vec<i64>, DatabaseError> {
        let _gate = self.write_gate.lock().await;
        let conn = self.connect_with_timeout().await?;
        let tx = conn.transaction().await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to begin transaction: {}", e))
        })?;

        let mut ids = Vec::new();
        {
            let mut rows = tx
                .query(
                    "WITH RECURSIVE subtree(id, depth) AS (
                        SELECT id, 0 FROM menus WHERE id = ?
                        UNION
                        SELECT m.id, s.depth + 1 FROM menus m JOIN subtree s ON m.parent_id = s.id
                        WHERE s.depth < (SELECT COUNT(*) FROM menus)
                     )
                     SELECT id FROM subtree GROUP BY id ORDER BY MIN(depth) ASC, id ASC",
                    [id],
                )
                .await
                .map_err(|e| {
                    DatabaseError::sql_execution(format!("Failed to collect subtree: {}", e))
                })?;

            while let Some(row) = rows.next().await? {
                ids.push(row.get::<i64>(0)?);
            }
        }

        if ids.is_empty() {
            tx.rollback().await?;
            return Ok(ids);
        }

        let statements = async {
            tx.execute("UPDATE menus SET parent_id = NULL WHERE id = ?", [id])
                .await
                .map_err(|e| {
                    DatabaseError::sql_execution(format!("Failed to detach node: {}", e))
                })?;
            tx.execute("DELETE FROM menus WHERE id = ?", [id])
                .await
                .map_err(|e| {
                    DatabaseError::sql_execution(format!("Failed to delete node: {}", e))
                })?;

            for node in renumbered.iter().filter(|n| !ids.contains(&n.id)) {
                if Self::update_row(&tx, node).await? == 0 {
                    return Err(DatabaseError::RowVanished { id: node.id });
                }
            }
            Ok(())
        };

        let outcome = statements.await;
        if let Err(e) = outcome {
            tx.rollback().await?;
            return Err(e);
        }

        tx.commit().await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to commit delete: {}", e))
        })?;

        Ok(ids)
    }

    /// Count rows (diagnostics and tests)
    pub async fn db_count_nodes(&self) -> Result<i64, DatabaseError> {
        let conn = self.connect_with_timeout().await?;
        let mut rows = conn.query("SELECT COUNT(*) FROM menus", ()).await?;
        match rows.next().await? {
            Some(row) => Ok(row.get::<i64>(0)?),
            None => Ok(0),
        }
    }
}
