//! Rays and their intersection outcome.
//!
//! A [`Ray`] is an immutable value: `origin + t * direction`, the refractive
//! index of the medium it travels through, and an optional [`Intersection`].
//! Recording a hit produces a *new* ray; a ray can be intersected at most once.
//!
//! # Example
//!
//! ```
//! use cf_raygrid::{PrimitiveId, Ray, SurfaceHit};
//! use nalgebra::{Point3, Vector3};
//!
//! let ray = Ray::new(Point3::new(0.0, 0.0, 10.0), -Vector3::z());
//! assert!(ray.t().is_infinite());
//!
//! let hit = SurfaceHit::new(9.0, Vector3::z());
//! let hit_ray = ray.intersected(PrimitiveId::new(0), hit).unwrap();
//! assert_eq!(hit_ray.t(), 9.0);
//!
//! // A second hit on the same ray value is a precondition violation.
//! assert!(hit_ray.intersected(PrimitiveId::new(1), hit).is_err());
//! ```

use std::cmp::Ordering;

use nalgebra::{Point2, Point3, Vector3};

use crate::error::{AccelError, AccelResult};
use crate::primitive::PrimitiveId;

/// Smallest hit time a primitive may report, and the base unit for
/// degenerate-box corrections.
pub const EPSILON: f64 = 1.0e-6;

/// Geometry of a hit as reported by a primitive, before it is attached to a ray.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceHit {
    /// Ray parameter of the hit.
    pub t: f64,
    /// Surface normal at the hit, facing the incoming ray.
    pub normal: Vector3<f64>,
    /// Texture coordinate at the hit, when the primitive provides one.
    pub texture: Option<Point2<f64>>,
    /// Whether the ray hit the surface from inside the primitive.
    pub inside: bool,
}

impl SurfaceHit {
    /// Creates an outside hit without texture coordinates.
    #[must_use]
    pub const fn new(t: f64, normal: Vector3<f64>) -> Self {
        Self {
            t,
            normal,
            texture: None,
            inside: false,
        }
    }

    /// Sets the texture coordinate.
    #[must_use]
    pub const fn with_texture(mut self, texture: Option<Point2<f64>>) -> Self {
        self.texture = texture;
        self
    }

    /// Marks the hit as coming from inside the primitive.
    #[must_use]
    pub const fn from_inside(mut self, inside: bool) -> Self {
        self.inside = inside;
        self
    }
}

/// A recorded hit: which primitive was hit and where.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Intersection {
    /// The primitive that was hit.
    pub primitive: PrimitiveId,
    /// Ray parameter of the hit, always `>= EPSILON`.
    pub t: f64,
    /// Surface normal at the hit.
    pub normal: Vector3<f64>,
    /// Optional texture coordinate.
    pub texture: Option<Point2<f64>>,
    /// Whether the hit was from inside the primitive.
    pub inside: bool,
}

/// A ray with an optional intersection outcome.
///
/// The direction is used as given; hit times are in units of its length.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    origin: Point3<f64>,
    direction: Vector3<f64>,
    refractive_index: f64,
    intersection: Option<Intersection>,
}

impl Ray {
    /// Creates an unintersected ray travelling through vacuum.
    #[must_use]
    pub const fn new(origin: Point3<f64>, direction: Vector3<f64>) -> Self {
        Self {
            origin,
            direction,
            refractive_index: 1.0,
            intersection: None,
        }
    }

    /// Returns a copy travelling through a medium with the given refractive index.
    #[must_use]
    pub const fn with_refractive_index(mut self, refractive_index: f64) -> Self {
        self.refractive_index = refractive_index;
        self
    }

    /// Origin of the ray.
    #[must_use]
    pub const fn origin(&self) -> &Point3<f64> {
        &self.origin
    }

    /// Direction of the ray (not necessarily normalized).
    #[must_use]
    pub const fn direction(&self) -> &Vector3<f64> {
        &self.direction
    }

    /// Refractive index of the medium the ray travels through.
    #[must_use]
    pub const fn refractive_index(&self) -> f64 {
        self.refractive_index
    }

    /// The recorded hit, if any.
    #[must_use]
    pub const fn intersection(&self) -> Option<&Intersection> {
        self.intersection.as_ref()
    }

    /// Whether a hit has been recorded.
    #[must_use]
    pub const fn is_intersected(&self) -> bool {
        self.intersection.is_some()
    }

    /// The primitive that was hit, if any.
    #[must_use]
    pub fn primitive(&self) -> Option<PrimitiveId> {
        self.intersection.map(|hit| hit.primitive)
    }

    /// Hit time, or `+∞` for an unintersected ray.
    #[must_use]
    pub fn t(&self) -> f64 {
        self.intersection.map_or(f64::INFINITY, |hit| hit.t)
    }

    /// Point along the ray at parameter `t`.
    #[must_use]
    pub fn point_at(&self, t: f64) -> Point3<f64> {
        self.origin + self.direction * t
    }

    /// The hit point, if any.
    #[must_use]
    pub fn hit_point(&self) -> Option<Point3<f64>> {
        self.intersection.map(|hit| self.point_at(hit.t))
    }

    /// Returns the unintersected ray with the same origin, direction and medium.
    #[must_use]
    pub const fn unintersected(&self) -> Self {
        Self {
            intersection: None,
            ..*self
        }
    }

    /// Records a hit on a new ray value.
    ///
    /// # Errors
    ///
    /// Returns [`AccelError::AlreadyIntersected`] if this ray already carries a
    /// hit, and [`AccelError::InvalidHitTime`] if `hit.t` is below [`EPSILON`]
    /// or not finite.
    pub fn intersected(&self, primitive: PrimitiveId, hit: SurfaceHit) -> AccelResult<Self> {
        if self.intersection.is_some() {
            return Err(AccelError::AlreadyIntersected);
        }
        if !hit.t.is_finite() || hit.t < EPSILON {
            return Err(AccelError::InvalidHitTime(hit.t));
        }
        Ok(Self {
            intersection: Some(Intersection {
                primitive,
                t: hit.t,
                normal: hit.normal,
                texture: hit.texture,
                inside: hit.inside,
            }),
            ..*self
        })
    }

    /// Total order on hit time, ascending. Unintersected rays sort last.
    #[must_use]
    pub fn cmp_time(&self, other: &Self) -> Ordering {
        self.t().total_cmp(&other.t())
    }
}

/// Returns whichever ray has the smaller hit time, preferring `a` on ties.
#[must_use]
pub fn nearer(a: Ray, b: Ray) -> Ray {
    if b.cmp_time(&a) == Ordering::Less { b } else { a }
}
