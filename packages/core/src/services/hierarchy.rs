//! Ancestor chain walks
//!
//! One bounded walk up the `parent_id` chain serves both the cycle check for
//! re-parenting and `get_ancestors`. The walk fails closed: a revisited node,
//! a chain longer than the configured depth, or a dangling parent reference is
//! reported as corrupt data instead of looping or guessing.

use crate::db::MenuStore;
use crate::models::MenuNode;
use crate::services::error::MenuServiceError;
use std::collections::HashSet;

/// Result of walking up from a starting node
#[derive(Debug)]
pub(crate) enum AncestorWalk {
    /// Reached the root group; the chain runs from the start node to the root
    Root(Vec<MenuNode>),
    /// Hit the target id somewhere on the chain
    Reached,
}

/// Walk from `start` towards the root, stopping early if `target` appears
///
/// `start` itself is part of the chain. Returns `NodeNotFound` if `start`
/// doesn't exist.
pub(crate) async fn walk_ancestors(
    store: &dyn MenuStore,
    start: i64,
    target: Option<i64>,
    max_depth: usize,
) -> Result<AncestorWalk, MenuServiceError> {
    let mut chain: Vec<MenuNode> = Vec::new();
    let mut visited: HashSet<i64> = HashSet::new();
    let mut current = Some(start);

    while let Some(id) = current {
        if target == Some(id) {
            return Ok(AncestorWalk::Reached);
        }

        if !visited.insert(id) {
            tracing::error!("Ancestor chain of menu {} revisits menu {}", start, id);
            return Err(MenuServiceError::invalid_operation(format!(
                "corrupt hierarchy: ancestor chain of menu {} loops at menu {}",
                start, id
            )));
        }

        if visited.len() > max_depth {
            tracing::error!(
                "Ancestor chain of menu {} exceeds max depth {}",
                start,
                max_depth
            );
            return Err(MenuServiceError::invalid_operation(format!(
                "corrupt hierarchy: ancestor chain of menu {} exceeds depth {}",
                start, max_depth
            )));
        }

        let node = store
            .find_by_id(id)
            .await
            .map_err(|e| MenuServiceError::query_failed(e.to_string()))?;

        let node = match node {
            Some(node) => node,
            None if chain.is_empty() => return Err(MenuServiceError::node_not_found(id)),
            None => {
                return Err(MenuServiceError::invalid_operation(format!(
                    "corrupt hierarchy: menu {} references missing parent {}",
                    chain.last().map_or(start, |n| n.id),
                    id
                )))
            }
        };

        current = node.parent_id;
        chain.push(node);
    }

    Ok(AncestorWalk::Root(chain))
}

/// Ancestors of `id`, root first, excluding the node itself
pub(crate) async fn ancestors_of(
    store: &dyn MenuStore,
    id: i64,
    max_depth: usize,
) -> Result<Vec<MenuNode>, MenuServiceError> {
    match walk_ancestors(store, id, None, max_depth).await? {
        AncestorWalk::Root(chain) => Ok(chain.into_iter().skip(1).rev().collect()),
        // No target, so the walk can only end at the root
        AncestorWalk::Reached => Ok(Vec::new()),
    }
}

/// Check that giving `id` the parent `proposed` keeps the hierarchy acyclic
///
/// `None` (move to root) is always allowed. A missing proposed parent is
/// `NodeNotFound`.
pub(crate) async fn ensure_acyclic(
    store: &dyn MenuStore,
    id: i64,
    proposed: Option<i64>,
    max_depth: usize,
) -> Result<(), MenuServiceError> {
    let Some(parent_id) = proposed else {
        return Ok(());
    };

    if parent_id == id {
        return Err(MenuServiceError::self_parent(id));
    }

    match walk_ancestors(store, parent_id, Some(id), max_depth).await? {
        AncestorWalk::Reached => Err(MenuServiceError::cycle(id, parent_id)),
        AncestorWalk::Root(_) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::InMemoryStore;
    use chrono::Utc;

    fn node(id: i64, parent_id: Option<i64>) -> MenuNode {
        MenuNode {
            id,
            title: format!("Menu {}", id),
            url: None,
            order: 0,
            parent_id,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    /// 1 → 2 → 3 (chain), 4 at root
    async fn chain_store() -> InMemoryStore {
        let store = InMemoryStore::new();
        store
            .insert_raw(vec![
                node(1, None),
                node(2, Some(1)),
                node(3, Some(2)),
                node(4, None),
            ])
            .await;
        store
    }

    #[tokio::test]
    async fn test_walk_returns_chain_to_root() {
        let store = chain_store().await;
        let walk = walk_ancestors(&store, 3, None, 100).await.unwrap();
        match walk {
            AncestorWalk::Root(chain) => {
                let ids: Vec<i64> = chain.iter().map(|n| n.id).collect();
                assert_eq!(ids, vec![3, 2, 1]);
            }
            AncestorWalk::Reached => panic!("no target was given"),
        }
    }

    #[tokio::test]
    async fn test_ancestors_are_root_first() {
        let store = chain_store().await;
        let ids: Vec<i64> = ancestors_of(&store, 3, 100)
            .await
            .unwrap()
            .iter()
            .map(|n| n.id)
            .collect();
        assert_eq!(ids, vec![1, 2]);
        assert!(ancestors_of(&store, 4, 100).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_descendant_parent_is_cycle() {
        let store = chain_store().await;
        let err = ensure_acyclic(&store, 1, Some(3), 100).await.unwrap_err();
        assert!(err.to_string().contains("cycle"));

        let err = ensure_acyclic(&store, 2, Some(2), 100).await.unwrap_err();
        assert!(err.to_string().contains("self-parent"));
    }

    #[tokio::test]
    async fn test_unrelated_parent_is_allowed() {
        let store = chain_store().await;
        ensure_acyclic(&store, 2, Some(4), 100).await.unwrap();
        ensure_acyclic(&store, 3, None, 100).await.unwrap();
        // Moving up the own chain is fine
        ensure_acyclic(&store, 3, Some(1), 100).await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_parent_is_not_found() {
        let store = chain_store().await;
        let err = ensure_acyclic(&store, 2, Some(99), 100).await.unwrap_err();
        assert!(matches!(err, MenuServiceError::NodeNotFound { id: 99 }));
    }

    #[tokio::test]
    async fn test_corrupt_chains_fail_closed() {
        let store = InMemoryStore::new();
        store
            .insert_raw(vec![node(10, Some(11)), node(11, Some(10)), node(20, Some(21))])
            .await;

        // Loop not involving the moved node
        let err = ensure_acyclic(&store, 5, Some(10), 100).await.unwrap_err();
        assert!(err.to_string().contains("loops"));

        // Dangling parent reference
        let err = walk_ancestors(&store, 20, None, 100).await.unwrap_err();
        assert!(err.to_string().contains("missing parent"));
    }

    #[tokio::test]
    async fn test_depth_limit() {
        let store = chain_store().await;
        let err = walk_ancestors(&store, 3, None, 2).await.unwrap_err();
        assert!(err.to_string().contains("exceeds depth"));
    }
}
