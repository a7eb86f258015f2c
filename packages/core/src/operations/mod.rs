//! Operation scoping
//!
//! Concurrency primitives that turn each structural `MenuService` operation
//! into a single serialized unit per affected sibling group.

pub mod sibling_locks;

pub use sibling_locks::{GroupKey, SiblingLocks, StructuralScope};
