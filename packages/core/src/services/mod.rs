//! Business Services
//!
//! This module contains the tree store engine:
//!
//! - `MenuService` - the canonical engine: list, get, create, update, delete,
//!   move and reorder, each leaving the hierarchy acyclic and every sibling
//!   group densely ordered
//! - Pure helpers for tree construction and sibling ordering
//!
//! Services coordinate between the database layer and callers, enforcing every
//! tree invariant; stores only persist.

pub mod error;
mod hierarchy;
pub mod menu_service;
pub mod sibling_order;
pub mod tree_builder;

pub use error::{ErrorKind, MenuServiceError};
pub use menu_service::MenuService;
pub use sibling_order::{is_dense, normalized_orders, place_at};
pub use tree_builder::{build_forest, build_subtree};
