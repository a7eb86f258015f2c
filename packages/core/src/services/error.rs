//! Service Layer Error Types
//!
//! This module defines the errors returned by `MenuService`. Every early exit
//! of an operation maps to exactly one of these; nothing is swallowed and
//! nothing is retried by the service.

use crate::models::ValidationError;
use thiserror::Error;

/// Coarse error classification for the request-handling layer
///
/// Lets a transport map errors to responses (404 / 409 / 400 / 500) without
/// matching on every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidOperation,
    Validation,
    Storage,
}

/// Service operation errors
#[derive(Error, Debug)]
pub enum MenuServiceError {
    /// Referenced node or parent does not exist
    #[error("Menu node not found: {id}")]
    NodeNotFound { id: i64 },

    /// Self-parent assignment, cycle, or corrupt ancestor chain
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Input rejected before any read
    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),

    /// Repository failure
    #[error("Query failed: {0}")]
    QueryFailed(String),
}

impl MenuServiceError {
    /// Create a node not found error
    pub fn node_not_found(id: i64) -> Self {
        Self::NodeNotFound { id }
    }

    /// Create an invalid operation error
    pub fn invalid_operation(msg: impl Into<String>) -> Self {
        Self::InvalidOperation(msg.into())
    }

    /// Reject making a node its own parent
    pub fn self_parent(id: i64) -> Self {
        Self::InvalidOperation(format!("self-parent: menu {} cannot be its own parent", id))
    }

    /// Reject attaching a node under one of its descendants
    pub fn cycle(id: i64, proposed_parent_id: i64) -> Self {
        Self::InvalidOperation(format!(
            "cycle: menu {} cannot be moved under its descendant {}",
            id, proposed_parent_id
        ))
    }

    /// Create a query failed error
    pub fn query_failed(msg: impl Into<String>) -> Self {
        Self::QueryFailed(msg.into())
    }

    /// Classify this error for the request layer
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NodeNotFound { .. } => ErrorKind::NotFound,
            Self::InvalidOperation(_) => ErrorKind::InvalidOperation,
            Self::ValidationFailed(_) => ErrorKind::Validation,
            Self::QueryFailed(_) => ErrorKind::Storage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds_and_messages() {
        let err = MenuServiceError::cycle(1, 2);
        assert_eq!(err.kind(), ErrorKind::InvalidOperation);
        assert!(err.to_string().contains("cycle"));

        let err = MenuServiceError::self_parent(4);
        assert!(err.to_string().contains("self-parent"));

        let err: MenuServiceError = ValidationError::EmptyTitle.into();
        assert_eq!(err.kind(), ErrorKind::Validation);

        assert_eq!(
            MenuServiceError::node_not_found(9).kind(),
            ErrorKind::NotFound
        );
    }
}
