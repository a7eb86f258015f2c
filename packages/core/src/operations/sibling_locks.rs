//! Sibling-group locking for structural operations
//!
//! Every structural operation runs read → validate → mutate → normalize. To
//! keep concurrent requests from interleaving those steps on the same sibling
//! group, the service runs each operation inside a [`StructuralScope`]:
//!
//! - **Hierarchy lock** (`RwLock`): re-parenting and delete take it
//!   exclusively, so an ancestor walk and the write that depends on it see one
//!   stable parent graph. Everything else takes it shared.
//! - **Group locks** (`Mutex` per [`GroupKey`]): held for each sibling group an
//!   operation reads and rewrites, acquired in sorted order so two scopes can
//!   never wait on each other.
//!
//! Reads (`list_tree`, `get_node`) take no locks and may observe any committed
//! state.
//!
//! # Example
//!
//! ```rust
//! use menutree_core::operations::{GroupKey, SiblingLocks};
//!
//! # async fn example() {
//! let locks = SiblingLocks::new();
//!
//! // Reorder inside the children of node 7
//! let scope = locks.shared([GroupKey::of(Some(7))]).await;
//! assert_eq!(scope.groups(), &[GroupKey::of(Some(7))]);
//! drop(scope);
//!
//! // Move: exclusive over the whole hierarchy
//! let _scope = locks.exclusive().await;
//! # }
//! ```

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use tokio::sync::{
    Mutex as AsyncMutex, OwnedMutexGuard, OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock,
};

/// Identifies a sibling group by its parent (`None` = root group)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupKey(Option<i64>);

impl GroupKey {
    pub fn of(parent_id: Option<i64>) -> Self {
        Self(parent_id)
    }
}

enum HierarchyGuard {
    Shared(#[allow(dead_code)] OwnedRwLockReadGuard<()>),
    Exclusive(#[allow(dead_code)] OwnedRwLockWriteGuard<()>),
}

/// Guards held for the duration of one structural operation
///
/// Dropping the scope releases every lock.
pub struct StructuralScope {
    // Field order matters: group guards drop before the hierarchy guard.
    _group_guards: Vec<OwnedMutexGuard<()>>,
    groups: Vec<GroupKey>,
    hierarchy: HierarchyGuard,
}

impl StructuralScope {
    /// Sibling groups locked by this scope, sorted
    pub fn groups(&self) -> &[GroupKey] {
        &self.groups
    }

    /// Whether the scope holds the hierarchy lock exclusively
    pub fn is_exclusive(&self) -> bool {
        matches!(self.hierarchy, HierarchyGuard::Exclusive(_))
    }
}

/// Lock registry shared by all operations of one `MenuService`
#[derive(Default)]
pub struct SiblingLocks {
    hierarchy: Arc<RwLock<()>>,
    groups: Mutex<HashMap<GroupKey, Arc<AsyncMutex<()>>>>,
}

impl SiblingLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exclusive scope: no other structural operation runs concurrently
    ///
    /// Used by re-parenting and delete, which depend on the ancestor chain or
    /// remove whole subtrees.
    pub async fn exclusive(&self) -> StructuralScope {
        let guard = self.hierarchy.clone().write_owned().await;
        StructuralScope {
            _group_guards: Vec::new(),
            groups: Vec::new(),
            hierarchy: HierarchyGuard::Exclusive(guard),
        }
    }

    /// Shared hierarchy plus exclusive access to the given sibling groups
    ///
    /// Duplicate keys are collapsed; groups are locked in ascending key order.
    pub async fn shared(&self, keys: impl IntoIterator<Item = GroupKey>) -> StructuralScope {
        let hierarchy = self.hierarchy.clone().read_owned().await;

        let groups: Vec<GroupKey> = keys
            .into_iter()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let mutexes = self.group_mutexes(&groups);

        let mut guards = Vec::with_capacity(mutexes.len());
        for mutex in mutexes {
            guards.push(mutex.lock_owned().await);
        }

        StructuralScope {
            _group_guards: guards,
            groups,
            hierarchy: HierarchyGuard::Shared(hierarchy),
        }
    }

    /// Number of group entries currently tracked (idle entries included)
    pub fn tracked_groups(&self) -> usize {
        self.groups.lock().map(|g| g.len()).unwrap_or(0)
    }

    fn group_mutexes(&self, keys: &[GroupKey]) -> Vec<Arc<AsyncMutex<()>>> {
        let mut registry = match self.groups.lock() {
            Ok(registry) => registry,
            Err(poisoned) => poisoned.into_inner(),
        };

        // Drop entries nobody holds or waits on
        registry.retain(|key, mutex| keys.contains(key) || Arc::strong_count(mutex) > 1);

        keys.iter()
            .map(|key| registry.entry(*key).or_default().clone())
            .collect()
    }
}
