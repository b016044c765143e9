use std::fmt::Debug;

use num_traits::{Num, NumCast};

/// Scalar coordinate types usable with
/// [`PointIndexable`][crate::PointIndexable] and the coordinate ingestion
/// helpers on [`KDTreeBuilder`][crate::KDTreeBuilder].
///
/// Note that float `NaN` breaks the per-axis ordering and is not supported.
pub trait IndexableNum:
    Num + NumCast + PartialOrd + Copy + Debug + Send + Sync
{
}

impl<T> IndexableNum for T where T: Num + NumCast + PartialOrd + Copy + Debug + Send + Sync {}
