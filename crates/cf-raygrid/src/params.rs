//! Grid construction parameters.

use crate::dimension::Averaging;
use crate::error::{AccelError, AccelResult};
use crate::splitter::SplitStrategy;

/// Parameters for building voxel spaces.
///
/// # Example
///
/// ```
/// use cf_raygrid::{Averaging, GridParams, SplitStrategy};
///
/// let params = GridParams::default();
/// assert_eq!(params.split_strategy, SplitStrategy::InFourAverageSize);
///
/// let fine = GridParams::fine().with_averaging(Averaging::MedianMaxExtent);
/// assert!((fine.dimension_scale - 0.5).abs() < 1e-12);
/// assert!(fine.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct GridParams {
    /// Box measure the dimension evaluator averages.
    pub averaging: Averaging,

    /// Multiplier applied to the evaluated cell dimension.
    pub dimension_scale: f64,

    /// Bucketing used by `MultiVoxelSpace`. `VoxelSpace` always uses
    /// [`SplitStrategy::BoxAndNoBox`].
    pub split_strategy: SplitStrategy,

    /// A primitive whose box covers more cells than this is tested
    /// linearly instead of being inserted into the grid.
    pub max_cells_per_primitive: u64,
}

impl Default for GridParams {
    fn default() -> Self {
        Self {
            averaging: Averaging::MaxExtent,
            dimension_scale: 1.0,
            split_strategy: SplitStrategy::InFourAverageSize,
            max_cells_per_primitive: 4096,
        }
    }
}

impl GridParams {
    /// Cells half the evaluated size: more cells, fewer primitives per cell.
    #[must_use]
    pub fn fine() -> Self {
        Self {
            dimension_scale: 0.5,
            ..Self::default()
        }
    }

    /// Cells twice the evaluated size.
    #[must_use]
    pub fn coarse() -> Self {
        Self {
            dimension_scale: 2.0,
            ..Self::default()
        }
    }

    /// Set the averaging strategy.
    #[must_use]
    pub const fn with_averaging(mut self, averaging: Averaging) -> Self {
        self.averaging = averaging;
        self
    }

    /// Set the dimension scale.
    #[must_use]
    pub const fn with_dimension_scale(mut self, scale: f64) -> Self {
        self.dimension_scale = scale;
        self
    }

    /// Set the split strategy.
    #[must_use]
    pub const fn with_split_strategy(mut self, strategy: SplitStrategy) -> Self {
        self.split_strategy = strategy;
        self
    }

    /// Set the per-primitive cell cap.
    #[must_use]
    pub const fn with_max_cells_per_primitive(mut self, cells: u64) -> Self {
        self.max_cells_per_primitive = cells;
        self
    }

    /// Checks that the parameters can build a grid.
    ///
    /// # Errors
    ///
    /// Returns [`AccelError::InvalidParams`] if the scale is not positive and
    /// finite or the cell cap is zero.
    pub fn validate(&self) -> AccelResult<()> {
        if !(self.dimension_scale.is_finite() && self.dimension_scale > 0.0) {
            return Err(AccelError::InvalidParams(
                "dimension_scale must be positive and finite",
            ));
        }
        if self.max_cells_per_primitive == 0 {
            return Err(AccelError::InvalidParams(
                "max_cells_per_primitive must be at least 1",
            ));
        }
        Ok(())
    }
}
