//! Dense sibling ordering
//!
//! Pure functions that compute the rows a sibling group needs rewritten so
//! its `order` values are exactly `0..k-1`. They return only rows whose
//! `order` actually changed; callers persist them with one `save_many`.

use crate::models::MenuNode;

/// Sort a group by current position, ties broken by id (insertion order)
fn sort_group(nodes: &mut [MenuNode]) {
    nodes.sort_by_key(|n| (n.order, n.id));
}

/// Assign `order = index` along the given sequence, keeping changed rows
fn renumber(ordered: Vec<MenuNode>) -> Vec<MenuNode> {
    ordered
        .into_iter()
        .zip(0_i64..)
        .filter_map(|(mut node, index)| {
            if node.order == index {
                None
            } else {
                node.order = index;
                Some(node)
            }
        })
        .collect()
}

/// Whether a group's orders are already exactly `0..k-1`
pub fn is_dense(siblings: &[MenuNode]) -> bool {
    let mut orders: Vec<i64> = siblings.iter().map(|n| n.order).collect();
    orders.sort_unstable();
    orders.into_iter().zip(0_i64..).all(|(order, index)| order == index)
}

/// Rows to rewrite so the group becomes dense, preserving current order
pub fn normalized_orders(mut siblings: Vec<MenuNode>) -> Vec<MenuNode> {
    sort_group(&mut siblings);
    renumber(siblings)
}

/// Rows to rewrite so `node` sits at `position` and the group is dense
///
/// `siblings` is the target group; if it already contains `node` that copy is
/// ignored. `position` past the end clamps to the last slot. The returned rows
/// include `node` only when its `order` changed.
pub fn place_at(siblings: Vec<MenuNode>, node: MenuNode, position: usize) -> Vec<MenuNode> {
    let mut others: Vec<MenuNode> = siblings.into_iter().filter(|s| s.id != node.id).collect();
    sort_group(&mut others);

    let index = position.min(others.len());
    others.insert(index, node);
    renumber(others)
}
