use std::fmt;
use std::mem;

use tinyvec::TinyVec;

use crate::indexable::Indexable;
use crate::kdtree::extremum::{maximum, minimum};
use crate::kdtree::slot::{Iter, Slot};
use crate::kdtree::state::State;
use crate::kdtree::storage::{root, root_offset, Slots};

/// A mutable K-D tree over a flat slot array.
///
/// See the [module docs][crate::kdtree] for the layout. All operations are
/// driven by the [`Indexable`] the tree was built with; the indexable must
/// order consistently and must not panic (see [`insert`][KDTree::insert]).
pub struct KDTree<I: Indexable> {
    pub(crate) slots: Slots<I::Value>,
    pub(crate) count: usize,
    pub(crate) full_state: State,
    pub(crate) index: I,
}

impl<I: Indexable> KDTree<I> {
    /// Create an empty tree. No storage is allocated until the first
    /// insert.
    pub fn new(index: I) -> Self {
        debug_assert!(I::K > 0);
        Self {
            slots: Slots::new(),
            count: 0,
            full_state: State::Heads,
            index,
        }
    }

    /// Create an empty tree with room for at least `n` points. The
    /// capacity is rounded up to the next `2^n - 1` so a perfectly
    /// balanced tree fits exactly.
    pub fn with_capacity(n: usize, index: I) -> Self {
        debug_assert!(I::K > 0);
        Self {
            slots: Slots::with_capacity(n),
            count: 0,
            full_state: State::Heads,
            index,
        }
    }

    /// Number of live points.
    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Total number of slots allocated; always 0 or of the form `2^n - 1`.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.capacity()
    }

    /// The indexable ordering the tree was built with.
    #[inline]
    pub fn index(&self) -> &I {
        &self.index
    }

    /// Iterate the live prefix slot by slot, empty slots included.
    pub fn iter(&self) -> Iter<'_, I::Value> {
        Iter::new(&self.slots)
    }

    /// View one slot of the live prefix.
    pub fn slot(&self, offset: usize) -> Option<Slot<'_, I::Value>> {
        (offset < self.slots.len()).then(|| self.slots.slot(offset))
    }

    /// The point in slot `offset`, if that slot currently holds one.
    pub fn get(&self, offset: usize) -> Option<&I::Value> {
        self.slot(offset)?.value()
    }

    /// Drop every live point. Capacity is untouched.
    pub fn clear(&mut self) {
        if self.count != 0 {
            self.count = 0;
            self.slots.clear();
        }
    }

    /// Insert a point, growing the tree by one level when the live prefix
    /// is full. Returns the offset of the slot the point landed in; slot
    /// offsets are only meaningful until the next mutation.
    ///
    /// Settled points shift within their windows to keep the per-axis
    /// ordering, and a packed subtree sheds its extremum to the opposite
    /// side before accepting the newcomer, so no rebuild ever happens.
    ///
    /// If the indexable panics mid-insert the tree is emptied and its
    /// points are leaked; they are never dropped twice.
    pub fn insert(&mut self, value: I::Value) -> usize {
        self.prepare_insert();
        self.count += 1;
        let len = self.slots.len();
        self.with_leak_guard(move |tree| {
            tree.single_insert(0, root_offset(len), root(len), value)
        })
    }

    /// Look up a point comparing equal to `value` on every axis. Returns
    /// the slot offset, or `None` when no such point is stored.
    pub fn find(&self, value: &I::Value) -> Option<usize> {
        if self.count == 0 {
            return None;
        }
        let len = self.slots.len();
        // node / offset / axis triplets; heap-free for shallow trees
        let mut stack: TinyVec<[usize; 33]> = TinyVec::new();
        stack.push(root(len));
        stack.push(root_offset(len));
        stack.push(0);
        while !stack.is_empty() {
            let node_axis = stack.pop().unwrap_or(0);
            let node_offset = stack.pop().unwrap_or(0);
            let node = stack.pop().unwrap_or(0);
            if !self.slots.is_valid(node) {
                continue;
            }
            let left_only = self.index.less(node_axis, value, self.slots.value(node));
            let right_only = self.index.less(node_axis, self.slots.value(node), value);
            if !left_only && !right_only && self.equal_on_other_axes(value, node, node_axis) {
                return Some(node);
            }
            if node_offset != 0 {
                let child_axis = (node_axis + 1) % I::K;
                let child_offset = node_offset / 2;
                // an equal axis may hide the point on either side
                if !left_only {
                    stack.push(node + node_offset);
                    stack.push(child_offset);
                    stack.push(child_axis);
                }
                if !right_only {
                    stack.push(node - node_offset);
                    stack.push(child_offset);
                    stack.push(child_axis);
                }
            }
        }
        None
    }

    /// The point with the smallest coordinate on `axis`, or `None` for an
    /// empty tree.
    pub fn min(&self, axis: usize) -> Option<&I::Value> {
        debug_assert!(axis < I::K, "axis out of range");
        if self.count == 0 {
            return None;
        }
        let len = self.slots.len();
        let best = minimum(&self.index, &self.slots, axis, 0, root_offset(len), root(len));
        Some(self.slots.value(best))
    }

    /// The point with the largest coordinate on `axis`, or `None` for an
    /// empty tree.
    pub fn max(&self, axis: usize) -> Option<&I::Value> {
        debug_assert!(axis < I::K, "axis out of range");
        if self.count == 0 {
            return None;
        }
        let len = self.slots.len();
        let best = maximum(&self.index, &self.slots, axis, 0, root_offset(len), root(len));
        Some(self.slots.value(best))
    }

    /// Remove one point comparing equal to `value` on every axis and
    /// return it, or `None` when the tree holds no such point.
    ///
    /// The hole is repaired by promoting per-axis minima along the spine
    /// below it, and every subtree on the way down loses its known-packed
    /// status. Like [`insert`][KDTree::insert], a panicking indexable
    /// leaves the tree empty rather than risking a double drop.
    pub fn remove(&mut self, value: &I::Value) -> Option<I::Value> {
        let erased = self.find(value)?;
        let len = self.slots.len();
        let taken = self.with_leak_guard(|tree| {
            let taken = tree.slots.take_value(erased);
            tree.erase_slot(0, root_offset(len), root(len), erased);
            taken
        });
        self.count -= 1;
        Some(taken)
    }

    /// Make room for one more point: allocate the minimum storage for the
    /// first insert, or open a new leaf level when the live prefix is
    /// full. Growing flips the parity epoch, which silently demotes every
    /// stale "packed" stamp to unsure.
    fn prepare_insert(&mut self) {
        if self.count == 0 {
            if self.slots.capacity() == 0 {
                self.slots = Slots::with_capacity(1);
            }
            self.slots.set_len(1);
        } else if self.count == self.slots.len() {
            self.grow();
        }
    }

    pub(crate) fn grow(&mut self) {
        if self.count == self.slots.capacity() {
            self.slots.expand_realloc();
        } else {
            self.slots.expand();
        }
        self.full_state = self.full_state.flip();
    }

    /// Drop the (empty) leaf level, halving the live prefix, and restamp.
    /// Exercised by the property suite; the mutation path never shrinks.
    #[cfg(test)]
    pub(crate) fn collapse(&mut self) {
        self.slots.collapse();
        self.full_state = self.full_state.flip();
        let full = self.full_state;
        self.slots.restamp(full);
    }

    /// Find a position for `value` in the subtree rooted at `node`,
    /// shifting and displacing settled points to make room, and keeping
    /// every state byte exact on the way back out.
    fn single_insert(
        &mut self,
        node_axis: usize,
        offset: usize,
        node: usize,
        value: I::Value,
    ) -> usize {
        let full = self.full_state;
        if offset == 0 {
            // a leaf slot, necessarily empty
            self.slots.write(node, value);
            self.slots.set_state(node, full);
            return node;
        }
        if !self.slots.is_valid(node) {
            // a hole left by removal owns an empty subtree
            debug_assert!(!self.slots.is_valid(node - offset));
            debug_assert!(!self.slots.is_valid(node + offset));
            self.slots.write(node, value);
            self.slots.set_state(node, State::Unsure);
            return node;
        }
        if offset == 1 {
            return self.frontier_insert(node_axis, node, value);
        }

        let child_axis = (node_axis + 1) % I::K;
        let child_offset = offset / 2;
        let lnode = node - offset;
        let rnode = node + offset;
        let inserted = if self.index.less(node_axis, &value, self.slots.value(node)) {
            if self.slots.state(lnode) == full {
                // the left side is packed: hand the node's point to the
                // right, then pull the left maximum up unless the newcomer
                // itself orders above it
                let node_value = self.slots.take_value(node);
                self.single_insert(child_axis, child_offset, rnode, node_value);
                let tmp = maximum(&self.index, &self.slots, node_axis, child_axis, child_offset, lnode);
                if self.index.less(node_axis, &value, self.slots.value(tmp)) {
                    self.slots.move_value(tmp, node);
                    self.erase_when_full(child_axis, child_offset, lnode, tmp);
                    self.single_insert(child_axis, child_offset, lnode, value)
                } else {
                    self.slots.write(node, value);
                    node
                }
            } else {
                self.single_insert(child_axis, child_offset, lnode, value)
            }
        } else if self.index.less(node_axis, self.slots.value(node), &value) {
            if self.slots.state(rnode) == full {
                let node_value = self.slots.take_value(node);
                self.single_insert(child_axis, child_offset, lnode, node_value);
                let tmp = minimum(&self.index, &self.slots, node_axis, child_axis, child_offset, rnode);
                if self.index.less(node_axis, self.slots.value(tmp), &value) {
                    self.slots.move_value(tmp, node);
                    self.erase_when_full(child_axis, child_offset, rnode, tmp);
                    self.single_insert(child_axis, child_offset, rnode, value)
                } else {
                    self.slots.write(node, value);
                    node
                }
            } else {
                self.single_insert(child_axis, child_offset, rnode, value)
            }
        } else {
            // neither side wins the axis: duplicates gravitate rightward
            if self.slots.state(rnode) == full {
                self.single_insert(child_axis, child_offset, lnode, value)
            } else {
                self.single_insert(child_axis, child_offset, rnode, value)
            }
        };
        let merged = self.slots.state(lnode).merge(self.slots.state(rnode));
        self.slots.set_state(node, merged);
        inserted
    }

    /// Insert at the leaf frontier: `node` has two direct leaf slots, at
    /// most one of them occupied. The node slides down to the free side
    /// and the remaining pair re-sorts around the newcomer.
    fn frontier_insert(&mut self, node_axis: usize, node: usize, value: I::Value) -> usize {
        let full = self.full_state;
        let lnode = node - 1;
        let rnode = node + 1;
        if self.index.less(node_axis, &value, self.slots.value(node)) {
            if self.slots.is_valid(lnode) {
                self.slots.move_value(node, rnode);
                self.slots.set_state(rnode, full);
                self.slots.set_state(node, full);
                if self.index.less(node_axis, &value, self.slots.value(lnode)) {
                    self.slots.move_value(lnode, node);
                    self.slots.write(lnode, value);
                    lnode
                } else {
                    self.slots.write(node, value);
                    node
                }
            } else {
                self.slots.write(lnode, value);
                self.slots.set_state(lnode, full);
                if self.slots.is_valid(rnode) {
                    self.slots.set_state(node, full);
                }
                lnode
            }
        } else if self.slots.is_valid(rnode) {
            self.slots.move_value(node, lnode);
            self.slots.set_state(lnode, full);
            self.slots.set_state(node, full);
            if self.index.less(node_axis, self.slots.value(rnode), &value) {
                self.slots.move_value(rnode, node);
                self.slots.write(rnode, value);
                rnode
            } else {
                self.slots.write(node, value);
                node
            }
        } else {
            self.slots.write(rnode, value);
            self.slots.set_state(rnode, full);
            if self.slots.is_valid(lnode) {
                self.slots.set_state(node, full);
            }
            rnode
        }
    }

    /// Remove `erased` from the packed subtree rooted at `node` without
    /// dropping it — its point has already been moved out. Only the insert
    /// displacement calls this, so every slot of the subtree is occupied.
    fn erase_when_full(
        &mut self,
        node_axis: usize,
        node_offset: usize,
        node: usize,
        erased: usize,
    ) {
        if node_offset > 1 {
            let child_axis = (node_axis + 1) % I::K;
            let child_offset = node_offset / 2;
            if node == erased {
                let rnode = node + node_offset;
                let tmp = minimum(&self.index, &self.slots, node_axis, child_axis, child_offset, rnode);
                self.slots.move_value(tmp, erased);
                self.erase_when_full(child_axis, child_offset, rnode, tmp);
            } else if node < erased {
                // find the erased slot by its position in the plane
                self.erase_when_full(child_axis, child_offset, node + node_offset, erased);
            } else {
                self.erase_when_full(child_axis, child_offset, node - node_offset, erased);
            }
            self.slots.set_state(node, State::Unsure);
        } else if node_offset == 1 {
            let rnode = node + 1;
            if node == erased {
                self.slots.move_value(rnode, node);
                self.slots.set_state(rnode, State::Invalid);
            } else {
                self.slots.set_state(erased, State::Invalid);
            }
            self.slots.set_state(node, State::Unsure);
        } else {
            self.slots.set_state(node, State::Invalid);
        }
    }

    /// Remove slot `erased` from the live subtree rooted at `node`,
    /// closing the hole with a per-axis minimum so the ordering around it
    /// survives.
    fn erase_slot(&mut self, node_axis: usize, node_offset: usize, node: usize, erased: usize) {
        if node != erased {
            let child_axis = (node_axis + 1) % I::K;
            let child_offset = node_offset / 2;
            let child = if node < erased {
                node + node_offset
            } else {
                node - node_offset
            };
            self.erase_slot(child_axis, child_offset, child, erased);
            self.slots.set_state(node, State::Unsure);
            return;
        }
        if node_offset == 0 {
            self.slots.set_state(node, State::Invalid);
            return;
        }
        let child_axis = (node_axis + 1) % I::K;
        let child_offset = node_offset / 2;
        let lnode = node - node_offset;
        let rnode = node + node_offset;
        if self.slots.is_valid(rnode) {
            let tmp = minimum(&self.index, &self.slots, node_axis, child_axis, child_offset, rnode);
            self.slots.move_value(tmp, node);
            self.slots.set_state(node, State::Unsure);
            self.erase_slot(child_axis, child_offset, rnode, tmp);
        } else if self.slots.is_valid(lnode) {
            // only the left remains: promote its minimum, then carry the
            // whole left window over to the right side, where "not less
            // than the node" now holds for all of it
            let tmp = minimum(&self.index, &self.slots, node_axis, child_axis, child_offset, lnode);
            self.slots.move_value(tmp, node);
            self.slots.set_state(node, State::Unsure);
            self.erase_slot(child_axis, child_offset, lnode, tmp);
            self.slots.move_window(lnode, rnode, child_offset);
        } else {
            self.slots.set_state(node, State::Invalid);
        }
    }

    fn equal_on_other_axes(&self, value: &I::Value, node: usize, skip: usize) -> bool {
        (0..I::K).all(|axis| {
            axis == skip
                || (!self.index.less(axis, value, self.slots.value(node))
                    && !self.index.less(axis, self.slots.value(node), value))
        })
    }

    /// Run `f`; if it unwinds (only the indexable can), abandon every live
    /// point so no point is ever dropped twice.
    fn with_leak_guard<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        struct Guard<'a, I: Indexable>(&'a mut KDTree<I>);
        impl<I: Indexable> Drop for Guard<'_, I> {
            fn drop(&mut self) {
                self.0.slots.leak();
                self.0.count = 0;
            }
        }
        let mut guard = Guard(self);
        let result = f(&mut *guard.0);
        mem::forget(guard);
        result
    }
}

impl<I: Indexable + Clone> Clone for KDTree<I>
where
    I::Value: Clone,
{
    fn clone(&self) -> Self {
        Self {
            slots: self.slots.duplicate(),
            count: self.count,
            full_state: self.full_state,
            index: self.index.clone(),
        }
    }
}

impl<I: Indexable + Default> Default for KDTree<I> {
    fn default() -> Self {
        Self::new(I::default())
    }
}

impl<'a, I: Indexable> IntoIterator for &'a KDTree<I> {
    type Item = Slot<'a, I::Value>;
    type IntoIter = Iter<'a, I::Value>;

    fn into_iter(self) -> Iter<'a, I::Value> {
        self.iter()
    }
}

impl<I: Indexable> fmt::Debug for KDTree<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KDTree")
            .field("len", &self.count)
            .field("capacity", &self.capacity())
            .finish()
    }
}
