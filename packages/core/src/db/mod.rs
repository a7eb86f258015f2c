//! Database Layer
//!
//! This module handles all persistence for the menu tree:
//!
//! - Database initialization and connection management (libsql)
//! - The `MenuStore` repository trait consumed by `MenuService`
//! - Two implementations: `TursoStore` (libsql) and `InMemoryStore` (arena)
//! - Domain events emitted after successful writes
//!
//! # Architecture
//!
//! Stores are CRUD only. Cascading delete is the one structural guarantee
//! they provide (`ON DELETE CASCADE` in SQL, an index walk in memory); every
//! ordering and acyclicity rule belongs to the service layer.

mod database;
mod error;
pub mod events;
mod memory_store;
mod node_store;
mod turso_store;

pub use database::{DatabaseService, DEFAULT_BUSY_TIMEOUT_MS};
pub use error::DatabaseError;
pub use events::MenuEvent;
pub use memory_store::InMemoryStore;
pub use node_store::MenuStore;
pub use turso_store::TursoStore;
