//! Axis-aligned bounding boxes around primitives.

use std::cmp::Ordering;

use nalgebra::{Point3, Vector3};

use crate::primitive::{Primitive, PrimitiveId};
use crate::ray::EPSILON;

/// Relative (and, at zero, absolute) outward nudge for a collapsed axis.
const DEGENERATE_NUDGE: f64 = 10.0 * EPSILON;

/// Axis-aligned box wrapping one primitive.
///
/// Boxes produced by [`BoundingBoxBuilder`] never have a zero extent on any
/// axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    /// Minimum corner.
    pub min: Point3<f64>,
    /// Maximum corner.
    pub max: Point3<f64>,
    /// The wrapped primitive.
    pub primitive: PrimitiveId,
}

impl BoundingBox {
    /// Creates a box from two corners, ordering them per axis.
    #[must_use]
    pub fn new(a: Point3<f64>, b: Point3<f64>, primitive: PrimitiveId) -> Self {
        Self {
            min: a.inf(&b),
            max: a.sup(&b),
            primitive,
        }
    }

    /// Edge lengths along x, y and z.
    #[must_use]
    pub fn extents(&self) -> Vector3<f64> {
        self.max - self.min
    }

    /// Product of the three extents.
    #[must_use]
    pub fn volume(&self) -> f64 {
        self.extents().product()
    }

    /// Mean of the three extents.
    #[must_use]
    pub fn average_extent(&self) -> f64 {
        self.extents().sum() / 3.0
    }

    /// Largest of the three extents.
    #[must_use]
    pub fn max_extent(&self) -> f64 {
        self.extents().max()
    }

    /// Total order on [`max_extent`](Self::max_extent).
    #[must_use]
    pub fn cmp_max_extent(&self, other: &Self) -> Ordering {
        self.max_extent().total_cmp(&other.max_extent())
    }
}

/// Produces bounding boxes for primitives whose kind supports one.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoundingBoxBuilder;

impl BoundingBoxBuilder {
    /// Boxes `primitive`, or returns `None` if its kind is not boundable or it
    /// reports no vertices.
    ///
    /// Collapsed axes are pushed outward so every extent is positive.
    ///
    /// # Example
    ///
    /// ```
    /// use cf_raygrid::{BoundingBoxBuilder, PrimitiveId, shapes::{Plane, Triangle}};
    /// use nalgebra::{Point3, Vector3};
    ///
    /// // Flat in z: the builder still gives the box some thickness.
    /// let triangle = Triangle::new(
    ///     Point3::new(0.0, 0.0, 1.0),
    ///     Point3::new(1.0, 0.0, 1.0),
    ///     Point3::new(0.0, 1.0, 1.0),
    /// );
    /// let bounds = BoundingBoxBuilder::build(PrimitiveId::new(0), &triangle).unwrap();
    /// assert!(bounds.extents().z > 0.0);
    ///
    /// let plane = Plane::new(Point3::origin(), Vector3::z());
    /// assert!(BoundingBoxBuilder::build(PrimitiveId::new(1), &plane).is_none());
    /// ```
    #[must_use]
    pub fn build(id: PrimitiveId, primitive: &dyn Primitive) -> Option<BoundingBox> {
        if !primitive.kind().is_boundable() {
            return None;
        }
        let vertices = primitive.bounding_vertices()?;
        let (first, rest) = vertices.split_first()?;

        let (mut min, mut max) = rest
            .iter()
            .fold((*first, *first), |(lo, hi), v| (lo.inf(v), hi.sup(v)));

        for axis in 0..3 {
            if min[axis] == max[axis] {
                min[axis] = nudge_down(min[axis]);
                max[axis] = nudge_up(max[axis]);
            }
        }

        Some(BoundingBox {
            min,
            max,
            primitive: id,
        })
    }
}

fn nudge_down(v: f64) -> f64 {
    if v == 0.0 {
        -DEGENERATE_NUDGE
    } else {
        DEGENERATE_NUDGE.mul_add(-v.abs(), v)
    }
}

fn nudge_up(v: f64) -> f64 {
    if v == 0.0 {
        DEGENERATE_NUDGE
    } else {
        DEGENERATE_NUDGE.mul_add(v.abs(), v)
    }
}
