//! Domain Events for the menu tree
//!
//! Events are emitted by `MenuService` after an operation's writes have
//! succeeded, using tokio's broadcast channel so any number of observers
//! (a UI bridge, a cache invalidator) can follow changes without coupling to
//! the persistence layer.
//!
//! # Event Flow
//!
//! 1. `MenuService` validates and persists a structural change
//! 2. One domain event is emitted via the broadcast channel
//! 3. Subscribers receive the event asynchronously
//!
//! Sending never fails an operation: with no subscribers the event is dropped.

use crate::models::MenuNode;
use serde::{Deserialize, Serialize};

/// Domain events emitted by `MenuService`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum MenuEvent {
    /// A node was appended to a sibling group
    #[serde(rename = "node:created")]
    NodeCreated { node: MenuNode },

    /// Title or url changed (parent unchanged)
    #[serde(rename = "node:updated")]
    NodeUpdated { node: MenuNode },

    /// A node changed parent; both groups were renormalized
    #[serde(rename = "node:moved", rename_all = "camelCase")]
    NodeMoved {
        id: i64,
        old_parent_id: Option<i64>,
        new_parent_id: Option<i64>,
    },

    /// A node and its descendants were removed
    #[serde(rename = "node:deleted")]
    NodeDeleted { ids: Vec<i64> },

    /// A sibling group received new dense orders
    #[serde(rename = "siblings:reordered", rename_all = "camelCase")]
    SiblingsReordered { parent_id: Option<i64> },
}

impl MenuEvent {
    /// Get a string representation of the event type
    pub fn event_type(&self) -> &'static str {
        match self {
            MenuEvent::NodeCreated { .. } => "node:created",
            MenuEvent::NodeUpdated { .. } => "node:updated",
            MenuEvent::NodeMoved { .. } => "node:moved",
            MenuEvent::NodeDeleted { .. } => "node:deleted",
            MenuEvent::SiblingsReordered { .. } => "siblings:reordered",
        }
    }
}
