//! The primitive capability contract and the scene registry.
//!
//! The acceleration structures never look at shape-specific geometry. They
//! only use the [`Primitive`] trait: a kind tag, closed/transparent flags,
//! point containment, ray intersection, and the vertex set that bounds the
//! primitive on the axes.
//!
//! Primitives live in a [`Scene`] arena and are referred to by [`PrimitiveId`].

use std::fmt;
use std::sync::Arc;

use nalgebra::{Point2, Point3};

use crate::error::{AccelError, AccelResult, GeometryError};
use crate::ray::{Ray, SurfaceHit};

/// Index of a primitive inside its [`Scene`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PrimitiveId(usize);

impl PrimitiveId {
    /// Wraps a raw scene index.
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// The raw scene index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for PrimitiveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Closed set of primitive kinds known to the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum PrimitiveKind {
    /// Sphere given by center and radius.
    Sphere,
    /// Infinite plane.
    Plane,
    /// Single triangle.
    Triangle,
    /// Infinite cone.
    Cone,
    /// Lens made of two spherical caps.
    Lens,
}

impl PrimitiveKind {
    /// Whether primitives of this kind have a finite defining vertex set and
    /// can therefore be wrapped in a bounding box.
    #[must_use]
    pub const fn is_boundable(self) -> bool {
        matches!(self, Self::Sphere | Self::Triangle | Self::Lens)
    }
}

/// Capabilities a primitive exposes to the acceleration structures.
///
/// Implementations must be free of side effects: queries may call them from
/// several threads at once.
pub trait Primitive: fmt::Debug + Send + Sync {
    /// Kind tag of this primitive.
    fn kind(&self) -> PrimitiveKind;

    /// Whether the primitive encloses a volume (point containment is meaningful).
    fn is_closed_surface(&self) -> bool;

    /// Whether light partially passes through the surface.
    fn is_transparent(&self) -> bool;

    /// Whether `point` lies inside the primitive. Always false for open surfaces.
    fn contains_point(&self, point: &Point3<f64>) -> bool;

    /// Nearest hit with `t >= EPSILON`, if the ray meets the surface.
    ///
    /// The ray is guaranteed to be unintersected; the scene checks this
    /// before calling.
    fn intersect(&self, ray: &Ray) -> Option<SurfaceHit>;

    /// Defining vertices whose component-wise min/max bound the primitive.
    ///
    /// Only consulted when [`PrimitiveKind::is_boundable`] holds.
    fn bounding_vertices(&self) -> Option<Vec<Point3<f64>>> {
        None
    }

    /// Texture coordinate of a surface point.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::NotSupported`] when the primitive has no
    /// texture mapping.
    fn texture_coordinate(&self, _point: &Point3<f64>) -> Result<Point2<f64>, GeometryError> {
        Err(GeometryError::NotSupported {
            kind: self.kind(),
            feature: "texture coordinates",
        })
    }
}

/// Arena of primitives assembled by a scene loader.
///
/// Ids are handed out on insertion and stay valid for the life of the scene.
/// Once a scene is shared with an acceleration structure it is frozen.
///
/// # Example
///
/// ```
/// use cf_raygrid::{Scene, shapes::Sphere};
/// use nalgebra::Point3;
///
/// let mut scene = Scene::new();
/// let id = scene.insert(Sphere::new(Point3::origin(), 1.0));
/// assert_eq!(id.index(), 0);
/// assert_eq!(scene.len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Scene {
    primitives: Vec<Arc<dyn Primitive>>,
}

impl Scene {
    /// Creates an empty scene.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a primitive and returns its id.
    pub fn insert<P: Primitive + 'static>(&mut self, primitive: P) -> PrimitiveId {
        self.insert_shared(Arc::new(primitive))
    }

    /// Adds an already shared primitive and returns its id.
    pub fn insert_shared(&mut self, primitive: Arc<dyn Primitive>) -> PrimitiveId {
        let id = PrimitiveId::new(self.primitives.len());
        self.primitives.push(primitive);
        id
    }

    /// Number of primitives.
    #[must_use]
    pub fn len(&self) -> usize {
        self.primitives.len()
    }

    /// Whether the scene has no primitives.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.primitives.is_empty()
    }

    /// Looks up a primitive.
    #[must_use]
    pub fn get(&self, id: PrimitiveId) -> Option<&dyn Primitive> {
        self.primitives.get(id.index()).map(|primitive| &**primitive)
    }

    /// Looks up a primitive, failing for ids from another scene.
    ///
    /// # Errors
    ///
    /// Returns [`AccelError::UnknownPrimitive`] if `id` is out of range.
    pub fn primitive(&self, id: PrimitiveId) -> AccelResult<&dyn Primitive> {
        self.get(id).ok_or(AccelError::UnknownPrimitive(id))
    }

    /// All ids in insertion order.
    pub fn ids(&self) -> impl ExactSizeIterator<Item = PrimitiveId> + '_ {
        (0..self.primitives.len()).map(PrimitiveId::new)
    }

    /// Iterates over `(id, primitive)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (PrimitiveId, &dyn Primitive)> + '_ {
        self.primitives
            .iter()
            .enumerate()
            .map(|(index, primitive)| (PrimitiveId::new(index), &**primitive))
    }

    /// Tests `ray` against one primitive and records the hit on a new ray.
    ///
    /// Returns `Ok(None)` when the primitive is missed.
    ///
    /// # Errors
    ///
    /// Returns [`AccelError::AlreadyIntersected`] if `ray` already carries a
    /// hit, [`AccelError::UnknownPrimitive`] for a foreign id, and
    /// [`AccelError::InvalidHitTime`] if the primitive breaks its contract.
    pub fn intersect(&self, id: PrimitiveId, ray: &Ray) -> AccelResult<Option<Ray>> {
        if ray.is_intersected() {
            return Err(AccelError::AlreadyIntersected);
        }
        let primitive = self.primitive(id)?;
        primitive
            .intersect(ray)
            .map(|hit| ray.intersected(id, hit))
            .transpose()
    }
}
