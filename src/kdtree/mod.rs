//! A mutable K-D tree stored in a single flat allocation.
//!
//! ## Creation
//!
//! Use [`KDTree::new`] (or [`KDTree::with_capacity`]) and feed points
//! through [`KDTree::insert`], or bulk-load with a [`KDTreeBuilder`]. The
//! tree reorganizes itself in place as it grows: whenever the live slot
//! range fills, an in-place interleave opens a fresh leaf level below the
//! existing nodes.
//!
//! ## Search
//!
//! Use [`KDTree::find`] for equality lookup over every axis, and
//! [`KDTree::min`] / [`KDTree::max`] for the extremum along one axis.
//! Points can be taken back out with [`KDTree::remove`].
//!
//! ## Layout
//!
//! There are no nodes and no links. Slots live in two parallel planes, one
//! holding points and one holding a [`State`] byte per slot, and the live
//! prefix of length `2^n - 1` is read as a complete binary tree: the root
//! sits at the midpoint and the children of a slot sit half a window away
//! on either side. Iteration walks that prefix slot by slot — empty slots
//! included, so bulk scans can see the layout — and each [`Slot`] gates its
//! point behind [`Slot::is_valid`].
//!
//! ## Point types
//!
//! The tree is parametric over an [`Indexable`][crate::Indexable]: plain
//! coordinate arrays index with
//! [`PointIndexable`][crate::PointIndexable], and arbitrary types index
//! with a per-axis comparator ([`AxisCompare`][crate::AxisCompare]) or an
//! accessor plus scalar order ([`AccessorCompare`][crate::AccessorCompare]).
//!
//! ## Example
//!
//! ```
//! use kd_index::{KDTree, PointIndexable};
//!
//! let mut tree = KDTree::new(PointIndexable::<i32, 2>::new());
//! tree.insert([2, 3]);
//! tree.insert([5, 4]);
//! tree.insert([9, 6]);
//!
//! assert!(tree.find(&[5, 4]).is_some());
//! assert!(tree.find(&[5, 5]).is_none());
//! assert_eq!(tree.min(0), Some(&[2, 3]));
//! assert_eq!(tree.max(1), Some(&[9, 6]));
//! ```

mod builder;
mod extremum;
mod index;
mod slot;
mod state;
pub(crate) mod storage;

pub use builder::KDTreeBuilder;
pub use index::KDTree;
pub use slot::{Iter, Slot};
pub use state::State;
