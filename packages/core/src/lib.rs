//! Menu Tree Core Business Logic Layer
//!
//! This crate provides the tree store engine for hierarchical navigation
//! menus: nodes with a title, an optional url, a position among their
//! siblings, and an optional parent.
//!
//! # Architecture
//!
//! - **Arena with parent ids**: nodes are stored flat; children are always
//!   derived by querying `parent_id`, never owned
//! - **libsql/Turso**: embedded SQLite-compatible database with cascading
//!   foreign keys
//! - **One engine**: `MenuService` enforces acyclicity and dense sibling
//!   ordering; stores only persist
//!
//! # Modules
//!
//! - [`models`] - Data structures (MenuNode, updates, tree views)
//! - [`db`] - Database layer with libsql integration and an in-memory store
//! - [`operations`] - Sibling-group locking for structural operations
//! - [`services`] - The `MenuService` engine and its pure helpers
//! - [`config`] - Engine configuration from defaults or environment

pub mod config;
pub mod db;
pub mod models;
pub mod operations;
pub mod services;

// Re-export commonly used types
pub use config::EngineConfig;
pub use models::*;
pub use services::*;
