//! Sparse voxel grid of primitive ids.

use std::collections::HashMap;

use nalgebra::Point3;
use tracing::{debug, warn};

use crate::bounds::BoundingBox;
use crate::dimension::{DimensionEvaluator, cell_dimension};
use crate::error::AccelResult;
use crate::params::GridParams;
use crate::primitive::PrimitiveId;
use crate::ray::Ray;
use crate::traversal::FastTraversal;
use crate::voxel::{Voxel, VoxelBuilder, VoxelRange};

/// A frozen mapping from voxels to the primitives whose boxes overlap them.
///
/// Only occupied cells are stored. The extremum voxel bounds the magnitude of
/// every occupied coordinate and is what keeps traversals finite.
///
/// # Example
///
/// ```
/// use cf_raygrid::{BoundingBox, PrimitiveGrid, PrimitiveId, Voxel, VoxelBuilder};
/// use nalgebra::Point3;
///
/// let mut grid = PrimitiveGrid::new(VoxelBuilder::new(1.0).unwrap());
/// let bounds = BoundingBox::new(
///     Point3::new(0.5, 0.5, 0.5),
///     Point3::new(1.5, 0.8, 0.8),
///     PrimitiveId::new(0),
/// );
/// grid.insert(&bounds);
///
/// assert_eq!(grid.len(), 2);
/// assert_eq!(grid.cell(Voxel::new(1, 0, 0)), &[PrimitiveId::new(0)]);
/// assert_eq!(grid.extremum(), Voxel::new(1, 0, 0));
/// ```
#[derive(Debug, Clone)]
pub struct PrimitiveGrid {
    builder: VoxelBuilder,
    cells: HashMap<Voxel, Vec<PrimitiveId>>,
    extremum: Voxel,
    primitives: usize,
}

impl PrimitiveGrid {
    /// Creates an empty grid.
    #[must_use]
    pub fn new(builder: VoxelBuilder) -> Self {
        Self {
            builder,
            cells: HashMap::new(),
            extremum: Voxel::origin(),
            primitives: 0,
        }
    }

    /// Builds a grid for one size bucket.
    ///
    /// The cell dimension comes from `evaluator`, scaled by the params.
    /// Primitives whose box would cover more than
    /// `params.max_cells_per_primitive` cells, or reach past the `i32` voxel
    /// coordinates, are left out and returned.
    ///
    /// # Errors
    ///
    /// Returns [`AccelError::InvalidDimension`](crate::AccelError::InvalidDimension)
    /// if the evaluated cell size is unusable.
    pub fn from_bucket(
        boxes: &[BoundingBox],
        evaluator: &dyn DimensionEvaluator,
        params: &GridParams,
    ) -> AccelResult<(Self, Vec<PrimitiveId>)> {
        let dimension = cell_dimension(
            evaluator,
            boxes,
            params.averaging,
            params.dimension_scale,
        )?;
        let mut grid = Self::new(VoxelBuilder::new(dimension)?);
        let mut demoted = Vec::new();

        for bounds in boxes {
            let Some(range) = grid.builder.try_voxel_range(bounds) else {
                warn!(
                    primitive = %bounds.primitive,
                    dimension,
                    "primitive lies beyond the voxel coordinate range, testing it linearly"
                );
                demoted.push(bounds.primitive);
                continue;
            };
            let cells = range.cell_count();
            if cells > params.max_cells_per_primitive {
                warn!(
                    primitive = %bounds.primitive,
                    cells,
                    limit = params.max_cells_per_primitive,
                    "primitive covers too many cells, testing it linearly"
                );
                demoted.push(bounds.primitive);
            } else {
                grid.insert_range(range, bounds.primitive);
            }
        }

        debug!(
            dimension,
            primitives = grid.primitive_count(),
            cells = grid.len(),
            occupancy = grid.average_occupancy(),
            demoted = demoted.len(),
            "built voxel grid"
        );

        Ok((grid, demoted))
    }

    /// Inserts the box's primitive into every voxel the box overlaps.
    ///
    /// Returns `false`, leaving the grid unchanged, if a corner of the box
    /// falls outside the representable voxel range.
    pub fn insert(&mut self, bounds: &BoundingBox) -> bool {
        match self.builder.try_voxel_range(bounds) {
            Some(range) => {
                self.insert_range(range, bounds.primitive);
                true
            }
            None => false,
        }
    }

    fn insert_range(&mut self, range: VoxelRange, id: PrimitiveId) {
        for voxel in range {
            self.insert_at(voxel, id);
        }
        self.primitives += 1;
    }

    fn insert_at(&mut self, voxel: Voxel, id: PrimitiveId) {
        self.cells.entry(voxel).or_default().push(id);
        self.extremum = voxel.extend_extremum(self.extremum);
    }

    /// Primitives stored at `voxel`.
    #[must_use]
    pub fn cell(&self, voxel: Voxel) -> &[PrimitiveId] {
        self.cells.get(&voxel).map(Vec::as_slice).unwrap_or_default()
    }

    /// Primitives stored at the voxel holding `point`.
    #[must_use]
    pub fn cell_at(&self, point: &Point3<f64>) -> &[PrimitiveId] {
        self.builder
            .try_build_voxel(point)
            .map(|voxel| self.cell(voxel))
            .unwrap_or_default()
    }

    /// Starts a traversal of `ray` through this grid, up to `t_max`.
    #[must_use]
    pub fn traverse(&self, ray: &Ray, t_max: f64) -> FastTraversal {
        FastTraversal::new(ray, self.builder, t_max, self.extremum)
    }

    /// The voxel builder (and thus cell dimension) of this grid.
    #[must_use]
    pub const fn builder(&self) -> &VoxelBuilder {
        &self.builder
    }

    /// Cell edge length.
    #[must_use]
    pub const fn dimension(&self) -> f64 {
        self.builder.dimension()
    }

    /// Component-wise maximum of `|coordinate|` over occupied voxels.
    #[must_use]
    pub const fn extremum(&self) -> Voxel {
        self.extremum
    }

    /// Number of occupied cells.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether no primitive was inserted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Number of primitives inserted.
    #[must_use]
    pub const fn primitive_count(&self) -> usize {
        self.primitives
    }

    /// Mean number of primitive entries per occupied cell.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn average_occupancy(&self) -> f64 {
        if self.cells.is_empty() {
            return 0.0;
        }
        let entries: usize = self.cells.values().map(Vec::len).sum();
        entries as f64 / self.cells.len() as f64
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    use super::*;
    use crate::dimension::MeanSizeEvaluator;

    fn cube(min: [f64; 3], side: f64, id: usize) -> BoundingBox {
        let min = Point3::from(min);
        BoundingBox::new(min, min + Vector3::repeat(side), PrimitiveId::new(id))
    }

    #[test]
    fn test_insert_covers_overlapped_voxels() {
        let mut grid = PrimitiveGrid::new(VoxelBuilder::new(1.0).unwrap());
        grid.insert(&cube([-0.5, -0.5, -0.5], 1.0, 7));

        assert_eq!(grid.len(), 8);
        assert_eq!(grid.primitive_count(), 1);
        assert_eq!(grid.cell(Voxel::new(-1, -1, -1)), &[PrimitiveId::new(7)]);
        assert_eq!(grid.cell(Voxel::new(0, 0, 0)), &[PrimitiveId::new(7)]);
        assert!(grid.cell(Voxel::new(1, 0, 0)).is_empty());
        assert_eq!(grid.extremum(), Voxel::new(1, 1, 1));
    }

    #[test]
    fn test_extremum_tracks_magnitude() {
        let mut grid = PrimitiveGrid::new(VoxelBuilder::new(1.0).unwrap());
        grid.insert(&cube([2.2, 0.1, 0.1], 0.5, 0));
        grid.insert(&cube([-5.5, 0.1, -3.5], 0.2, 1));
        assert_eq!(grid.extremum(), Voxel::new(6, 0, 4));
    }

    #[test]
    fn test_cell_at_point() {
        let mut grid = PrimitiveGrid::new(VoxelBuilder::new(2.0).unwrap());
        grid.insert(&cube([0.1, 0.1, 0.1], 0.5, 3));
        assert_eq!(grid.cell_at(&Point3::new(1.9, 1.0, 0.0)), &[PrimitiveId::new(3)]);
        assert!(grid.cell_at(&Point3::new(2.1, 1.0, 0.0)).is_empty());
    }

    #[test]
    fn test_average_occupancy() {
        let mut grid = PrimitiveGrid::new(VoxelBuilder::new(1.0).unwrap());
        assert_eq!(grid.average_occupancy(), 0.0);
        grid.insert(&cube([0.1, 0.1, 0.1], 0.2, 0));
        grid.insert(&cube([0.5, 0.5, 0.5], 0.2, 1));
        grid.insert(&cube([1.1, 0.1, 0.1], 0.2, 2));
        assert_relative_eq!(grid.average_occupancy(), 1.5);
    }

    #[test]
    fn test_from_bucket_demotes_large_boxes() {
        let boxes = [
            cube([0.0, 0.0, 0.0], 1.0, 0),
            cube([5.0, 5.0, 5.0], 1.0, 1),
            cube([-20.0, -20.0, -20.0], 40.0, 2),
        ];
        let params = GridParams::default()
            .with_dimension_scale(0.1)
            .with_max_cells_per_primitive(1000);
        let (grid, demoted) =
            PrimitiveGrid::from_bucket(&boxes, &MeanSizeEvaluator, &params).unwrap();

        assert_eq!(demoted, vec![PrimitiveId::new(2)]);
        assert_eq!(grid.primitive_count(), 2);
        // Mean max extent is 14.
        assert_relative_eq!(grid.dimension(), 1.4, epsilon = 1e-12);
    }

    #[test]
    fn test_from_bucket_demotes_boxes_beyond_voxel_range() {
        // Cells of 2e-4 put x = 1e6 at voxel 5e9, past i32.
        let boxes = [
            cube([1e6, 0.0, 0.0], 2e-4, 0),
            cube([1e6, 5.0, 0.0], 2e-4, 1),
            cube([0.0, 5.0, 0.0], 2e-4, 2),
        ];
        let (grid, demoted) =
            PrimitiveGrid::from_bucket(&boxes, &MeanSizeEvaluator, &GridParams::default())
                .unwrap();

        assert_eq!(demoted, vec![PrimitiveId::new(0), PrimitiveId::new(1)]);
        assert_eq!(grid.primitive_count(), 1);
        assert!(grid.extremum().x < 10);
        assert!(grid.extremum().y < 30_000);
        assert!(grid.cell_at(&Point3::new(1e6, 0.0, 0.0)).is_empty());
    }

    #[test]
    fn test_insert_rejects_unrepresentable_box() {
        let mut grid = PrimitiveGrid::new(VoxelBuilder::new(1e-3).unwrap());
        assert!(!grid.insert(&cube([1e9, 0.0, 0.0], 1e-3, 0)));
        assert!(grid.is_empty());
        assert_eq!(grid.extremum(), Voxel::origin());
        assert!(grid.insert(&cube([1.0, 0.0, 0.0], 1e-3, 1)));
        assert_eq!(grid.primitive_count(), 1);
    }

    #[test]
    fn test_traverse_visits_occupied_cell() {
        let mut grid = PrimitiveGrid::new(VoxelBuilder::new(1.0).unwrap());
        grid.insert(&cube([3.2, 0.2, 0.2], 0.5, 0));
        let ray = Ray::new(Point3::new(0.5, 0.5, 0.5), Vector3::x());
        let hit_cell = grid
            .traverse(&ray, f64::INFINITY)
            .find(|step| !grid.cell(step.voxel).is_empty())
            .unwrap();
        assert_eq!(hit_cell.voxel, Voxel::new(3, 0, 0));
        assert_relative_eq!(hit_cell.entry, 2.5);
    }
}
