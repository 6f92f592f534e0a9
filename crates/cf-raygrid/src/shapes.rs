//! Reference primitives: sphere, infinite plane, triangle.
//!
//! These are small, self-contained implementations of [`Primitive`] used to
//! exercise the acceleration structures. Renderers usually bring their own.

use std::f64::consts::PI;

use nalgebra::{Point2, Point3, Vector3};

use crate::error::GeometryError;
use crate::primitive::{Primitive, PrimitiveKind};
use crate::ray::{EPSILON, Ray, SurfaceHit};

/// Sphere given by center and radius.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sphere {
    /// Center in world coordinates.
    pub center: Point3<f64>,
    /// Radius, never negative.
    pub radius: f64,
    /// Whether the surface is transparent.
    pub transparent: bool,
}

impl Sphere {
    /// Creates an opaque sphere. Negative radii are clamped to zero.
    #[must_use]
    pub fn new(center: Point3<f64>, radius: f64) -> Self {
        Self {
            center,
            radius: radius.max(0.0),
            transparent: false,
        }
    }

    /// Sets the transparency flag.
    #[must_use]
    pub const fn with_transparency(mut self, transparent: bool) -> Self {
        self.transparent = transparent;
        self
    }
}

impl Primitive for Sphere {
    fn kind(&self) -> PrimitiveKind {
        PrimitiveKind::Sphere
    }

    fn is_closed_surface(&self) -> bool {
        true
    }

    fn is_transparent(&self) -> bool {
        self.transparent
    }

    fn contains_point(&self, point: &Point3<f64>) -> bool {
        (point - self.center).norm_squared() < self.radius * self.radius
    }

    fn intersect(&self, ray: &Ray) -> Option<SurfaceHit> {
        let oc = self.center - ray.origin();
        let a = ray.direction().norm_squared();
        if a < f64::EPSILON {
            return None;
        }
        let h = ray.direction().dot(&oc);
        let c = self.radius.mul_add(-self.radius, oc.norm_squared());

        let discriminant = h.mul_add(h, -(a * c));
        if discriminant < 0.0 {
            return None;
        }
        let sqrtd = discriminant.sqrt();

        let near = (h - sqrtd) / a;
        let (t, inside) = if near >= EPSILON {
            (near, false)
        } else {
            let far = (h + sqrtd) / a;
            if far < EPSILON {
                return None;
            }
            (far, true)
        };

        let point = ray.point_at(t);
        let outward = (point - self.center) / self.radius.max(f64::EPSILON);
        let normal = if inside { -outward } else { outward };
        Some(
            SurfaceHit::new(t, normal)
                .from_inside(inside)
                .with_texture(self.texture_coordinate(&point).ok()),
        )
    }

    fn bounding_vertices(&self) -> Option<Vec<Point3<f64>>> {
        let r = Vector3::repeat(self.radius);
        Some(vec![self.center - r, self.center + r])
    }

    fn texture_coordinate(&self, point: &Point3<f64>) -> Result<Point2<f64>, GeometryError> {
        let p = (point - self.center) / self.radius.max(f64::EPSILON);
        let theta = (-p.z).clamp(-1.0, 1.0).acos();
        let phi = (-p.y).atan2(p.x) + PI;
        Ok(Point2::new(phi / (2.0 * PI), theta / PI))
    }
}

/// Infinite plane through `point` with unit `normal`.
///
/// A plane has no bounding box; acceleration structures keep it on their
/// fallback list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    /// Any point on the plane.
    pub point: Point3<f64>,
    /// Unit normal.
    pub normal: Vector3<f64>,
    /// Whether the surface is transparent.
    pub transparent: bool,
}

impl Plane {
    /// Creates an opaque plane. The normal is normalized.
    #[must_use]
    pub fn new(point: Point3<f64>, normal: Vector3<f64>) -> Self {
        Self {
            point,
            normal: normal.try_normalize(f64::EPSILON).unwrap_or_else(Vector3::z),
            transparent: false,
        }
    }

    /// Sets the transparency flag.
    #[must_use]
    pub const fn with_transparency(mut self, transparent: bool) -> Self {
        self.transparent = transparent;
        self
    }
}

impl Primitive for Plane {
    fn kind(&self) -> PrimitiveKind {
        PrimitiveKind::Plane
    }

    fn is_closed_surface(&self) -> bool {
        false
    }

    fn is_transparent(&self) -> bool {
        self.transparent
    }

    fn contains_point(&self, _point: &Point3<f64>) -> bool {
        false
    }

    fn intersect(&self, ray: &Ray) -> Option<SurfaceHit> {
        let denom = self.normal.dot(ray.direction());
        if denom.abs() < f64::EPSILON {
            return None;
        }
        let t = self.normal.dot(&(self.point - ray.origin())) / denom;
        if t < EPSILON {
            return None;
        }
        // Hitting the back face counts as hitting from inside.
        let inside = denom > 0.0;
        let normal = if inside { -self.normal } else { self.normal };
        Some(SurfaceHit::new(t, normal).from_inside(inside))
    }
}

/// Single triangle with vertices `a`, `b`, `c`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    /// First vertex.
    pub a: Point3<f64>,
    /// Second vertex.
    pub b: Point3<f64>,
    /// Third vertex.
    pub c: Point3<f64>,
    /// Whether the surface is transparent.
    pub transparent: bool,
}

impl Triangle {
    /// Creates an opaque triangle.
    #[must_use]
    pub const fn new(a: Point3<f64>, b: Point3<f64>, c: Point3<f64>) -> Self {
        Self {
            a,
            b,
            c,
            transparent: false,
        }
    }

    /// Sets the transparency flag.
    #[must_use]
    pub const fn with_transparency(mut self, transparent: bool) -> Self {
        self.transparent = transparent;
        self
    }

    fn edges(&self) -> (Vector3<f64>, Vector3<f64>) {
        (self.b - self.a, self.c - self.a)
    }
}

impl Primitive for Triangle {
    fn kind(&self) -> PrimitiveKind {
        PrimitiveKind::Triangle
    }

    fn is_closed_surface(&self) -> bool {
        false
    }

    fn is_transparent(&self) -> bool {
        self.transparent
    }

    fn contains_point(&self, _point: &Point3<f64>) -> bool {
        false
    }

    // Möller–Trumbore
    fn intersect(&self, ray: &Ray) -> Option<SurfaceHit> {
        let (e1, e2) = self.edges();
        let p = ray.direction().cross(&e2);
        let det = e1.dot(&p);
        if det.abs() < f64::EPSILON {
            return None;
        }
        let inv_det = 1.0 / det;

        let s = ray.origin() - self.a;
        let u = s.dot(&p) * inv_det;
        if !(0.0..=1.0).contains(&u) {
            return None;
        }
        let q = s.cross(&e1);
        let v = ray.direction().dot(&q) * inv_det;
        if v < 0.0 || u + v > 1.0 {
            return None;
        }
        let t = e2.dot(&q) * inv_det;
        if t < EPSILON {
            return None;
        }

        let face = e1.cross(&e2).normalize();
        let inside = face.dot(ray.direction()) > 0.0;
        let normal = if inside { -face } else { face };
        Some(
            SurfaceHit::new(t, normal)
                .from_inside(inside)
                .with_texture(Some(Point2::new(u, v))),
        )
    }

    fn bounding_vertices(&self) -> Option<Vec<Point3<f64>>> {
        Some(vec![self.a, self.b, self.c])
    }

    fn texture_coordinate(&self, point: &Point3<f64>) -> Result<Point2<f64>, GeometryError> {
        // Barycentric (u, v) of the point projected on the triangle plane.
        let (e1, e2) = self.edges();
        let w = point - self.a;
        let d11 = e1.dot(&e1);
        let d12 = e1.dot(&e2);
        let d22 = e2.dot(&e2);
        let denom = d11.mul_add(d22, -(d12 * d12));
        if denom.abs() < f64::EPSILON {
            return Err(GeometryError::NotSupported {
                kind: PrimitiveKind::Triangle,
                feature: "texture coordinates on a degenerate triangle",
            });
        }
        let w1 = w.dot(&e1);
        let w2 = w.dot(&e2);
        let u = d22.mul_add(w1, -(d12 * w2)) / denom;
        let v = d11.mul_add(w2, -(d12 * w1)) / denom;
        Ok(Point2::new(u, v))
    }
}
