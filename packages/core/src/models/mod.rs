//! Data Models
//!
//! This module contains the data structures of the menu tree:
//!
//! - `MenuNode` - the single persisted entity
//! - `NewMenuNode` / `MenuNodeUpdate` - create and patch inputs
//! - `MenuTreeNode` / `MenuNodeDetail` - tree-shaped read models built per request

mod node;
mod tree;

pub use node::{
    validate_id, validate_order, validate_title, DeleteResult, MenuNode, MenuNodeUpdate,
    NewMenuNode, ValidationError,
};
pub use tree::{forest_node_count, MenuNodeDetail, MenuTreeNode};
