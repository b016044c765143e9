use std::cmp::Ordering;
use std::fmt;
use std::ptr;

use geo_traits::{CoordTrait, PointTrait};

use crate::error::{KDIndexError, Result};
use crate::indexable::{Indexable, PointIndexable};
use crate::kdtree::state::State;
use crate::kdtree::storage::{root, root_offset};
use crate::kdtree::KDTree;
use crate::r#type::IndexableNum;

/// A builder to bulk-load a [`KDTree`].
///
/// Queue points with [`add`][KDTreeBuilder::add] and call
/// [`finish`][KDTreeBuilder::finish]: the points are partitioned around
/// per-axis medians in O(n log n), landing in the same flat shape an insert
/// sequence settles into, with every state byte packed.
pub struct KDTreeBuilder<I: Indexable> {
    values: Vec<I::Value>,
    index: I,
}

impl<I: Indexable> KDTreeBuilder<I> {
    pub fn new(index: I) -> Self {
        Self {
            values: Vec::new(),
            index,
        }
    }

    pub fn with_capacity(n: usize, index: I) -> Self {
        Self {
            values: Vec::with_capacity(n),
            index,
        }
    }

    /// Queue a point for the bulk load.
    #[inline]
    pub fn add(&mut self, value: I::Value) {
        self.values.push(value);
    }

    /// Consume the builder, partitioning the queued points into a ready
    /// tree.
    pub fn finish(self) -> KDTree<I> {
        let Self { mut values, index } = self;
        let n = values.len();
        let mut tree = KDTree::with_capacity(n, index);
        if n == 0 {
            return tree;
        }
        let len = tree.slots.capacity();
        tree.slots.set_len(len);

        // decide a slot for every queued point, reordering in place
        let mut slot_of = vec![0usize; n];
        partition(
            &tree.index,
            &mut values,
            &mut slot_of,
            root(len),
            root_offset(len),
            0,
        );

        // every point is now some window's median; move each into its slot
        unsafe {
            values.set_len(0);
            for (i, &slot) in slot_of.iter().enumerate() {
                let value = ptr::read(values.as_ptr().add(i));
                tree.slots.write(slot, value);
                tree.slots.set_state(slot, State::Unsure);
            }
        }
        tree.count = n;
        let full = tree.full_state;
        tree.slots.restamp(full);
        tree
    }
}

/// Select the median of `values` on `axis` as the point for `node`, then
/// recurse into each half with the axis advanced. Both halves always fit
/// their child windows because a window of child step `w` spans `4w - 1`
/// slots.
fn partition<I: Indexable>(
    index: &I,
    values: &mut [I::Value],
    slot_of: &mut [usize],
    node: usize,
    offset: usize,
    axis: usize,
) {
    let m = values.len();
    if m == 0 {
        return;
    }
    if m == 1 {
        slot_of[0] = node;
        return;
    }
    let k = (m - 1) / 2;
    values.select_nth_unstable_by(k, |a, b| {
        if index.less(axis, a, b) {
            Ordering::Less
        } else if index.less(axis, b, a) {
            Ordering::Greater
        } else {
            Ordering::Equal
        }
    });
    slot_of[k] = node;

    let child_axis = (axis + 1) % I::K;
    let (left_values, rest) = values.split_at_mut(k);
    let (left_slots, rest_slots) = slot_of.split_at_mut(k);
    partition(
        index,
        left_values,
        left_slots,
        node - offset,
        offset / 2,
        child_axis,
    );
    partition(
        index,
        &mut rest[1..],
        &mut rest_slots[1..],
        node + offset,
        offset / 2,
        child_axis,
    );
}

impl<N: IndexableNum> KDTreeBuilder<PointIndexable<N, 2>> {
    /// Queue a coord for the bulk load.
    #[inline]
    pub fn add_coord(&mut self, coord: &impl CoordTrait<T = N>) {
        self.add([coord.x(), coord.y()]);
    }

    /// Queue a point for the bulk load.
    ///
    /// ## Errors
    ///
    /// - If the point is empty.
    #[inline]
    pub fn add_point(&mut self, point: &impl PointTrait<T = N>) -> Result<()> {
        let coord = point.coord().ok_or(KDIndexError::General(
            "Unable to add empty point to KDTree".to_string(),
        ))?;
        self.add_coord(&coord);
        Ok(())
    }
}

impl<I: Indexable + fmt::Debug> fmt::Debug for KDTreeBuilder<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KDTreeBuilder")
            .field("queued", &self.values.len())
            .field("index", &self.index)
            .finish()
    }
}
