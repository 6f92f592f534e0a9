//! Voxel coordinates and the world-to-grid mapping.

use nalgebra::Point3;

use crate::bounds::BoundingBox;
use crate::error::{AccelError, AccelResult};

/// An integer grid-cell coordinate.
///
/// Voxels are pure values used as map keys; the cell they name depends on the
/// dimension of the [`VoxelBuilder`] that produced them.
///
/// # Example
///
/// ```
/// use cf_raygrid::Voxel;
///
/// let voxel = Voxel::new(-2, 0, 7);
/// assert_eq!(voxel.abs(), Voxel::new(2, 0, 7));
/// assert_eq!(voxel.axis(2), 7);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Voxel {
    /// X index.
    pub x: i32,
    /// Y index.
    pub y: i32,
    /// Z index.
    pub z: i32,
}

impl Voxel {
    /// Creates a voxel coordinate.
    #[must_use]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// The voxel at (0, 0, 0).
    #[must_use]
    pub const fn origin() -> Self {
        Self::new(0, 0, 0)
    }

    /// Returns the coordinates as an array.
    #[must_use]
    pub const fn as_array(self) -> [i32; 3] {
        [self.x, self.y, self.z]
    }

    /// Coordinate along `axis` (0 = x, 1 = y, 2 = z).
    ///
    /// # Panics
    ///
    /// Panics if `axis > 2`.
    #[must_use]
    pub const fn axis(self, axis: usize) -> i32 {
        self.as_array()[axis]
    }

    /// Component-wise absolute value, saturating at `i32::MAX`.
    #[must_use]
    pub const fn abs(self) -> Self {
        Self::new(
            self.x.saturating_abs(),
            self.y.saturating_abs(),
            self.z.saturating_abs(),
        )
    }

    /// Component-wise maximum.
    #[must_use]
    pub fn max(self, other: Self) -> Self {
        Self::new(
            self.x.max(other.x),
            self.y.max(other.y),
            self.z.max(other.z),
        )
    }

    /// Grows a running extremum so that it bounds `|self|` on every axis.
    #[must_use]
    pub fn extend_extremum(self, extremum: Self) -> Self {
        extremum.max(self.abs())
    }
}

impl From<[i32; 3]> for Voxel {
    fn from([x, y, z]: [i32; 3]) -> Self {
        Self::new(x, y, z)
    }
}

impl From<Voxel> for [i32; 3] {
    fn from(voxel: Voxel) -> Self {
        voxel.as_array()
    }
}

/// Inclusive box of voxels, iterated x fastest, then y, then z.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VoxelRange {
    /// Minimum corner (inclusive).
    pub min: Voxel,
    /// Maximum corner (inclusive).
    pub max: Voxel,
}

impl VoxelRange {
    /// Creates a range from two corners, ordering them per axis.
    #[must_use]
    pub fn new(a: Voxel, b: Voxel) -> Self {
        Self {
            min: Voxel::new(a.x.min(b.x), a.y.min(b.y), a.z.min(b.z)),
            max: Voxel::new(a.x.max(b.x), a.y.max(b.y), a.z.max(b.z)),
        }
    }

    /// Number of voxels in the range, saturating.
    #[must_use]
    pub fn cell_count(&self) -> u64 {
        let side = |lo: i32, hi: i32| u64::from(hi.abs_diff(lo)) + 1;
        side(self.min.x, self.max.x)
            .saturating_mul(side(self.min.y, self.max.y))
            .saturating_mul(side(self.min.z, self.max.z))
    }

    /// Whether `voxel` lies inside the range.
    #[must_use]
    pub const fn contains(&self, voxel: Voxel) -> bool {
        voxel.x >= self.min.x
            && voxel.x <= self.max.x
            && voxel.y >= self.min.y
            && voxel.y <= self.max.y
            && voxel.z >= self.min.z
            && voxel.z <= self.max.z
    }

    /// Iterates over every voxel in the range.
    #[must_use]
    pub const fn iter(&self) -> VoxelRangeIter {
        VoxelRangeIter {
            range: *self,
            current: Some(self.min),
        }
    }
}

impl IntoIterator for VoxelRange {
    type Item = Voxel;
    type IntoIter = VoxelRangeIter;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over a [`VoxelRange`].
#[derive(Debug, Clone)]
pub struct VoxelRangeIter {
    range: VoxelRange,
    current: Option<Voxel>,
}

impl Iterator for VoxelRangeIter {
    type Item = Voxel;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.current?;
        let VoxelRange { min, max } = self.range;

        let mut next = current;
        if next.x < max.x {
            next.x += 1;
        } else if next.y < max.y {
            next.x = min.x;
            next.y += 1;
        } else if next.z < max.z {
            next.x = min.x;
            next.y = min.y;
            next.z += 1;
        } else {
            self.current = None;
            return Some(current);
        }
        self.current = Some(next);
        Some(current)
    }
}

/// Maps world-space points and boxes to voxels of a fixed edge length.
///
/// # Example
///
/// ```
/// use cf_raygrid::{Voxel, VoxelBuilder};
/// use nalgebra::Point3;
///
/// let builder = VoxelBuilder::new(0.5).unwrap();
/// assert_eq!(
///     builder.build_voxel(&Point3::new(0.7, -0.2, 1.0)),
///     Voxel::new(1, -1, 2)
/// );
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoxelBuilder {
    dimension: f64,
}

impl VoxelBuilder {
    /// Creates a builder for cells of edge length `dimension`.
    ///
    /// # Errors
    ///
    /// Returns [`AccelError::InvalidDimension`] if `dimension` is not
    /// positive and finite.
    pub fn new(dimension: f64) -> AccelResult<Self> {
        if dimension.is_finite() && dimension > 0.0 {
            Ok(Self { dimension })
        } else {
            Err(AccelError::InvalidDimension(dimension))
        }
    }

    /// Cell edge length.
    #[must_use]
    pub const fn dimension(&self) -> f64 {
        self.dimension
    }

    /// `floor(point / dimension)` per axis.
    ///
    /// Coordinates beyond the `i32` range saturate; use
    /// [`try_build_voxel`](Self::try_build_voxel) where that matters.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn build_voxel(&self, point: &Point3<f64>) -> Voxel {
        let cell = |v: f64| (v / self.dimension).floor() as i32;
        Voxel::new(cell(point.x), cell(point.y), cell(point.z))
    }

    /// Like [`build_voxel`](Self::build_voxel), but `None` unless every
    /// coordinate is strictly inside `(-i32::MAX, i32::MAX)`.
    ///
    /// Voxels in that range can be negated and stepped by one without
    /// overflow, which traversal relies on.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn try_build_voxel(&self, point: &Point3<f64>) -> Option<Voxel> {
        let limit = f64::from(i32::MAX);
        let cell = |v: f64| {
            let c = (v / self.dimension).floor();
            (c.abs() < limit).then_some(c as i32)
        };
        Some(Voxel::new(cell(point.x)?, cell(point.y)?, cell(point.z)?))
    }

    /// The voxel holding the box's min corner.
    #[must_use]
    pub fn build_voxel_for_box(&self, bounds: &BoundingBox) -> Voxel {
        self.build_voxel(&bounds.min)
    }

    /// Every voxel the box overlaps.
    #[must_use]
    pub fn voxel_range(&self, bounds: &BoundingBox) -> VoxelRange {
        VoxelRange::new(self.build_voxel(&bounds.min), self.build_voxel(&bounds.max))
    }

    /// Every voxel the box overlaps, or `None` if a corner lies outside the
    /// representable voxel range.
    #[must_use]
    pub fn try_voxel_range(&self, bounds: &BoundingBox) -> Option<VoxelRange> {
        Some(VoxelRange::new(
            self.try_build_voxel(&bounds.min)?,
            self.try_build_voxel(&bounds.max)?,
        ))
    }

    /// World-space minimum corner of a voxel.
    #[must_use]
    pub fn voxel_min(&self, voxel: Voxel) -> Point3<f64> {
        Point3::new(
            f64::from(voxel.x) * self.dimension,
            f64::from(voxel.y) * self.dimension,
            f64::from(voxel.z) * self.dimension,
        )
    }
}
