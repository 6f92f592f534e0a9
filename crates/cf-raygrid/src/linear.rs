//! Brute-force accelerator: every query tests every primitive.

use std::collections::BTreeSet;
use std::sync::Arc;

use nalgebra::Point3;
use tracing::info;

use crate::accelerator::{Accelerator, check_ray_query};
use crate::error::{AccelError, AccelResult};
use crate::hits::{NearestHit, OpaqueHits, Probe, inside_among};
use crate::primitive::{PrimitiveId, Scene};
use crate::ray::Ray;

/// Linear scan over the whole scene.
///
/// Slow but trivially correct; the grids are checked against it.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use cf_raygrid::{Accelerator, LinearSpace, Ray, Scene, shapes::Sphere};
/// use nalgebra::{Point3, Vector3};
///
/// let mut scene = Scene::new();
/// scene.insert(Sphere::new(Point3::origin(), 1.0));
///
/// let mut space = LinearSpace::new(Arc::new(scene));
/// space.initialize().unwrap();
///
/// let ray = Ray::new(Point3::new(0.0, 0.0, 10.0), -Vector3::z());
/// let hit = space.nearest_intersection(&ray, f64::INFINITY).unwrap();
/// assert!((hit.t() - 9.0).abs() < 1e-9);
/// ```
#[derive(Debug, Clone)]
pub struct LinearSpace {
    scene: Arc<Scene>,
    initialized: bool,
}

impl LinearSpace {
    /// Creates an unbuilt linear space over `scene`.
    #[must_use]
    pub const fn new(scene: Arc<Scene>) -> Self {
        Self {
            scene,
            initialized: false,
        }
    }
}

impl Accelerator for LinearSpace {
    fn scene(&self) -> &Scene {
        &self.scene
    }

    fn initialize(&mut self) -> AccelResult<()> {
        if self.initialized {
            return Err(AccelError::AlreadyInitialized);
        }
        self.initialized = true;
        info!(primitives = self.scene.len(), "initialized linear space");
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn nearest_intersection(&self, ray: &Ray, t_max: f64) -> AccelResult<Ray> {
        check_ray_query(ray, t_max, self.initialized)?;
        let mut best = NearestHit::new(ray);
        Probe::new(&self.scene, ray, t_max).nearest_among(self.scene.ids(), &mut best)?;
        Ok(best.into_ray())
    }

    fn nearest_opaque_intersection(&self, ray: &Ray, t_max: f64) -> AccelResult<Vec<Ray>> {
        check_ray_query(ray, t_max, self.initialized)?;
        let mut hits = OpaqueHits::default();
        Probe::new(&self.scene, ray, t_max).opaque_among(self.scene.ids(), &mut hits)?;
        Ok(hits.into_sorted_list())
    }

    fn list_inside_geometry(&self, point: &Point3<f64>) -> AccelResult<BTreeSet<PrimitiveId>> {
        if !self.initialized {
            return Err(AccelError::NotInitialized);
        }
        let mut inside = BTreeSet::new();
        inside_among(&self.scene, self.scene.ids(), point, &mut inside)?;
        Ok(inside)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    use super::*;
    use crate::shapes::{Plane, Sphere};

    fn space() -> LinearSpace {
        let mut scene = Scene::new();
        scene.insert(Sphere::new(Point3::origin(), 1.0));
        scene.insert(Plane::new(Point3::new(0.0, 0.0, -5.0), Vector3::z()));
        scene.insert(Sphere::new(Point3::new(0.0, 0.0, 3.0), 0.5).with_transparency(true));
        let mut space = LinearSpace::new(Arc::new(scene));
        space.initialize().unwrap();
        space
    }

    #[test]
    fn test_nearest() {
        let space = space();
        let ray = Ray::new(Point3::new(0.0, 0.0, 10.0), -Vector3::z());
        let hit = space.nearest_intersection(&ray, f64::INFINITY).unwrap();
        assert_eq!(hit.primitive(), Some(PrimitiveId::new(2)));
        assert_relative_eq!(hit.t(), 6.5, epsilon = 1e-9);

        let short = space.nearest_intersection(&ray, 6.0).unwrap();
        assert!(!short.is_intersected());
    }

    #[test]
    fn test_opaque_list() {
        let space = space();
        let ray = Ray::new(Point3::new(0.0, 0.0, 10.0), -Vector3::z());
        let list = space.nearest_opaque_intersection(&ray, f64::INFINITY).unwrap();
        let ids: Vec<_> = list.iter().filter_map(Ray::primitive).collect();
        assert_eq!(ids, vec![PrimitiveId::new(0), PrimitiveId::new(2)]);
        assert_relative_eq!(list[0].t(), 9.0, epsilon = 1e-9);
    }

    #[test]
    fn test_inside() {
        let space = space();
        let inside = space.list_inside_geometry(&Point3::new(0.0, 0.0, 0.5)).unwrap();
        assert_eq!(inside.into_iter().collect::<Vec<_>>(), vec![PrimitiveId::new(0)]);
    }

    #[test]
    fn test_lifecycle() {
        let mut space = LinearSpace::new(Arc::new(Scene::new()));
        let ray = Ray::new(Point3::origin(), Vector3::x());
        assert_eq!(
            space.nearest_intersection(&ray, 1.0),
            Err(AccelError::NotInitialized)
        );
        space.initialize().unwrap();
        assert!(space.is_initialized());
        assert_eq!(space.initialize(), Err(AccelError::AlreadyInitialized));
        assert!(!space.nearest_intersection(&ray, 1.0).unwrap().is_intersected());
    }
}
