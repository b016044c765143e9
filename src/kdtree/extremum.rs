//! Per-axis extremum search over a subtree of the flat layout.

use crate::indexable::Indexable;
use crate::kdtree::storage::Slots;

/// Find the slot with the smallest point along `fixed_axis` within the
/// subtree rooted at `node`, which must be a valid slot.
///
/// Descends the left child recursively; the right side is visited only
/// while the node axis differs from the searched axis, since on a matching
/// axis nothing to the right can order below the node. Ties keep the
/// earlier best.
pub(crate) fn minimum<I: Indexable>(
    index: &I,
    slots: &Slots<I::Value>,
    fixed_axis: usize,
    mut node_axis: usize,
    mut node_offset: usize,
    mut node: usize,
) -> usize {
    debug_assert!(slots.is_valid(node));
    let mut best = node;
    while node_offset > 1 {
        let child_axis = (node_axis + 1) % I::K;
        let child_offset = node_offset / 2;
        let lnode = node - node_offset;
        if slots.is_valid(lnode) {
            let child = minimum(index, slots, fixed_axis, child_axis, child_offset, lnode);
            if index.less(fixed_axis, slots.value(child), slots.value(best)) {
                best = child;
            }
        }
        if node_axis == fixed_axis {
            return best;
        }
        let rnode = node + node_offset;
        if !slots.is_valid(rnode) {
            return best;
        }
        if index.less(fixed_axis, slots.value(rnode), slots.value(best)) {
            best = rnode;
        }
        node = rnode;
        node_axis = child_axis;
        node_offset = child_offset;
    }
    if node_offset == 1 {
        let child = node - 1;
        if slots.is_valid(child) && index.less(fixed_axis, slots.value(child), slots.value(best)) {
            best = child;
        }
        let child = node + 1;
        if slots.is_valid(child) && index.less(fixed_axis, slots.value(child), slots.value(best)) {
            best = child;
        }
    }
    best
}

/// Find the slot with the largest point along `fixed_axis` within the
/// subtree rooted at `node`, which must be a valid slot. Mirror of
/// [`minimum`].
pub(crate) fn maximum<I: Indexable>(
    index: &I,
    slots: &Slots<I::Value>,
    fixed_axis: usize,
    mut node_axis: usize,
    mut node_offset: usize,
    mut node: usize,
) -> usize {
    debug_assert!(slots.is_valid(node));
    let mut best = node;
    while node_offset > 1 {
        let child_axis = (node_axis + 1) % I::K;
        let child_offset = node_offset / 2;
        let rnode = node + node_offset;
        if slots.is_valid(rnode) {
            let child = maximum(index, slots, fixed_axis, child_axis, child_offset, rnode);
            if index.less(fixed_axis, slots.value(best), slots.value(child)) {
                best = child;
            }
        }
        if node_axis == fixed_axis {
            return best;
        }
        let lnode = node - node_offset;
        if !slots.is_valid(lnode) {
            return best;
        }
        if index.less(fixed_axis, slots.value(best), slots.value(lnode)) {
            best = lnode;
        }
        node = lnode;
        node_axis = child_axis;
        node_offset = child_offset;
    }
    if node_offset == 1 {
        let child = node - 1;
        if slots.is_valid(child) && index.less(fixed_axis, slots.value(best), slots.value(child)) {
            best = child;
        }
        let child = node + 1;
        if slots.is_valid(child) && index.less(fixed_axis, slots.value(best), slots.value(child)) {
            best = child;
        }
    }
    best
}
