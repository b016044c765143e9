pub mod bits;
mod error;
mod indexable;
pub mod kdtree;
pub mod r#type;

pub use error::{KDIndexError, Result};
pub use indexable::{AccessorCompare, AxisCompare, Indexable, PointIndexable};
pub use kdtree::{KDTree, KDTreeBuilder};

#[cfg(test)]
pub(crate) mod proptests;
