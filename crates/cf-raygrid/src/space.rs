//! Single-grid accelerator.

use std::collections::BTreeSet;
use std::sync::Arc;

use nalgebra::Point3;
use tracing::info;

use crate::accelerator::{Accelerator, check_ray_query};
use crate::dimension::{DimensionEvaluator, MeanSizeEvaluator};
use crate::error::{AccelError, AccelResult};
use crate::grid::PrimitiveGrid;
use crate::hits::{Mailbox, NearestHit, OpaqueHits, Probe, inside_among};
use crate::params::GridParams;
use crate::primitive::{PrimitiveId, Scene};
use crate::ray::Ray;
use crate::splitter::{GeometryCollectionSplitter, SplitStrategy};

/// One voxel grid holding every boxed primitive, plus a linear fallback list
/// for primitives without a box.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use cf_raygrid::{Accelerator, Ray, Scene, VoxelSpace};
/// use cf_raygrid::shapes::{Plane, Sphere};
/// use nalgebra::{Point3, Vector3};
///
/// let mut scene = Scene::new();
/// let sphere = scene.insert(Sphere::new(Point3::origin(), 1.0));
/// let ground = scene.insert(Plane::new(Point3::new(0.0, 0.0, -5.0), Vector3::z()));
///
/// let mut space = VoxelSpace::new(Arc::new(scene));
/// space.initialize().unwrap();
///
/// let down = Ray::new(Point3::new(0.0, 0.0, 10.0), -Vector3::z());
/// assert_eq!(space.nearest_intersection(&down, f64::INFINITY).unwrap().primitive(), Some(sphere));
///
/// let past = Ray::new(Point3::new(3.0, 0.0, 10.0), -Vector3::z());
/// assert_eq!(space.nearest_intersection(&past, f64::INFINITY).unwrap().primitive(), Some(ground));
/// ```
#[derive(Debug)]
pub struct VoxelSpace {
    scene: Arc<Scene>,
    params: GridParams,
    evaluator: Box<dyn DimensionEvaluator>,
    built: Option<Built>,
}

#[derive(Debug)]
struct Built {
    /// `None` when no primitive could be boxed.
    grid: Option<PrimitiveGrid>,
    fallback: Vec<PrimitiveId>,
}

impl VoxelSpace {
    /// Creates an unbuilt space with default parameters.
    #[must_use]
    pub fn new(scene: Arc<Scene>) -> Self {
        Self {
            scene,
            params: GridParams::default(),
            evaluator: Box::new(MeanSizeEvaluator),
            built: None,
        }
    }

    /// Replaces the grid parameters. The split strategy is ignored: a single
    /// grid always uses [`SplitStrategy::BoxAndNoBox`].
    #[must_use]
    pub fn with_params(mut self, params: GridParams) -> Self {
        self.params = params;
        self
    }

    /// Replaces the cell dimension policy.
    #[must_use]
    pub fn with_evaluator(mut self, evaluator: impl DimensionEvaluator + 'static) -> Self {
        self.evaluator = Box::new(evaluator);
        self
    }

    /// The grid, once built and if any primitive was boxed.
    #[must_use]
    pub fn grid(&self) -> Option<&PrimitiveGrid> {
        self.built.as_ref().and_then(|built| built.grid.as_ref())
    }

    /// Primitives tested linearly on every query.
    #[must_use]
    pub fn fallback(&self) -> &[PrimitiveId] {
        self.built
            .as_ref()
            .map(|built| built.fallback.as_slice())
            .unwrap_or_default()
    }

    fn built(&self) -> AccelResult<&Built> {
        self.built.as_ref().ok_or(AccelError::NotInitialized)
    }
}

impl Accelerator for VoxelSpace {
    fn scene(&self) -> &Scene {
        &self.scene
    }

    fn initialize(&mut self) -> AccelResult<()> {
        if self.built.is_some() {
            return Err(AccelError::AlreadyInitialized);
        }
        self.params.validate()?;

        let (buckets, mut fallback) =
            GeometryCollectionSplitter::new(&self.scene, SplitStrategy::BoxAndNoBox).into_parts();

        let mut grid = None;
        if let Some(boxes) = buckets.first() {
            let (built, demoted) =
                PrimitiveGrid::from_bucket(boxes, self.evaluator.as_ref(), &self.params)?;
            fallback.extend(demoted);
            grid = Some(built).filter(|g| !g.is_empty());
        }

        info!(
            primitives = self.scene.len(),
            gridded = grid.as_ref().map_or(0, PrimitiveGrid::primitive_count),
            fallback = fallback.len(),
            dimension = grid.as_ref().map_or(0.0, PrimitiveGrid::dimension),
            occupancy = grid.as_ref().map_or(0.0, PrimitiveGrid::average_occupancy),
            "initialized voxel space"
        );

        self.built = Some(Built { grid, fallback });
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.built.is_some()
    }

    fn nearest_intersection(&self, ray: &Ray, t_max: f64) -> AccelResult<Ray> {
        check_ray_query(ray, t_max, self.built.is_some())?;
        let built = self.built()?;
        let probe = Probe::new(&self.scene, ray, t_max);
        let mut best = NearestHit::new(ray);

        // The fallback hit, if any, bounds how far the walk must go.
        probe.nearest_among(built.fallback.iter().copied(), &mut best)?;

        if let Some(grid) = &built.grid {
            let mut mailbox = Mailbox::default();
            for step in grid.traverse(ray, t_max.min(best.t())) {
                probe.nearest_among(mailbox.unseen(grid.cell(step.voxel)), &mut best)?;
                if best.t() <= step.exit {
                    break;
                }
            }
        }

        Ok(best.into_ray())
    }

    fn nearest_opaque_intersection(&self, ray: &Ray, t_max: f64) -> AccelResult<Vec<Ray>> {
        check_ray_query(ray, t_max, self.built.is_some())?;
        let built = self.built()?;
        let probe = Probe::new(&self.scene, ray, t_max);
        let mut hits = OpaqueHits::default();

        probe.opaque_among(built.fallback.iter().copied(), &mut hits)?;

        if let Some(grid) = &built.grid {
            let mut mailbox = Mailbox::default();
            for step in grid.traverse(ray, t_max.min(hits.bound())) {
                probe.opaque_among(mailbox.unseen(grid.cell(step.voxel)), &mut hits)?;
                if hits.bound() <= step.exit {
                    break;
                }
            }
        }

        Ok(hits.into_sorted_list())
    }

    fn list_inside_geometry(&self, point: &Point3<f64>) -> AccelResult<BTreeSet<PrimitiveId>> {
        let built = self.built()?;
        let mut inside = BTreeSet::new();
        if let Some(grid) = &built.grid {
            inside_among(&self.scene, grid.cell_at(point).iter().copied(), point, &mut inside)?;
        }
        inside_among(&self.scene, built.fallback.iter().copied(), point, &mut inside)?;
        Ok(inside)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    use super::*;
    use crate::bounds::BoundingBox;
    use crate::dimension::Averaging;
    use crate::shapes::{Plane, Sphere, Triangle};

    fn build(scene: Scene) -> VoxelSpace {
        let mut space = VoxelSpace::new(Arc::new(scene));
        space.initialize().unwrap();
        space
    }

    fn down(x: f64) -> Ray {
        Ray::new(Point3::new(x, 0.0, 10.0), -Vector3::z())
    }

    #[test]
    fn test_sphere_before_plane() {
        let mut scene = Scene::new();
        let sphere = scene.insert(Sphere::new(Point3::origin(), 1.0));
        let plane = scene.insert(Plane::new(Point3::new(0.0, 0.0, -5.0), Vector3::z()));
        let space = build(scene);

        assert_eq!(space.fallback(), &[plane]);
        let hit = space.nearest_intersection(&down(0.0), f64::INFINITY).unwrap();
        assert_eq!(hit.primitive(), Some(sphere));
        assert_relative_eq!(hit.t(), 9.0, epsilon = 1e-9);

        let miss = space.nearest_intersection(&down(2.0), f64::INFINITY).unwrap();
        assert_eq!(miss.primitive(), Some(plane));
        assert_relative_eq!(miss.t(), 15.0, epsilon = 1e-9);
    }

    #[test]
    fn test_time_bound_applies_to_grid_and_fallback() {
        let mut scene = Scene::new();
        scene.insert(Sphere::new(Point3::origin(), 1.0));
        scene.insert(Plane::new(Point3::new(0.0, 0.0, -5.0), Vector3::z()));
        let space = build(scene);

        assert!(!space.nearest_intersection(&down(0.0), 8.0).unwrap().is_intersected());
        assert!(!space.nearest_intersection(&down(2.0), 14.0).unwrap().is_intersected());
        assert!(space.nearest_intersection(&down(0.0), 9.5).unwrap().is_intersected());
    }

    #[test]
    fn test_tiny_primitives_far_from_origin() {
        // Cell size 2e-4 puts x = 1e6 beyond the i32 voxel range.
        let mut scene = Scene::new();
        let near = scene.insert(Sphere::new(Point3::new(1e6, 0.0, 0.0), 1e-4));
        let aside = scene.insert(Sphere::new(Point3::new(1e6, 5.0, 0.0), 1e-4));
        let space = build(scene);

        assert_eq!(space.fallback(), &[near, aside]);
        let ray = Ray::new(Point3::new(1e6, 0.0, 10.0), -Vector3::z());
        let hit = space.nearest_intersection(&ray, f64::INFINITY).unwrap();
        assert_eq!(hit.primitive(), Some(near));
        assert_relative_eq!(hit.t(), 9.9999, epsilon = 1e-7);

        let inside = space.list_inside_geometry(&Point3::new(1e6, 5.0, 0.0)).unwrap();
        assert_eq!(inside.into_iter().collect::<Vec<_>>(), vec![aside]);
    }

    #[test]
    fn test_large_primitive_spanning_cells() {
        // Small spheres set a fine cell size; the big one spans many cells and
        // must still be found where the ray first meets it.
        let mut scene = Scene::new();
        for i in 0..10 {
            scene.insert(Sphere::new(Point3::new(f64::from(i) * 0.3 - 20.0, 5.0, 0.0), 0.1));
        }
        let big = scene.insert(Sphere::new(Point3::new(0.0, 0.0, 0.0), 3.0));
        let space = build(scene);

        let ray = Ray::new(Point3::new(-10.0, 0.0, 0.0), Vector3::x());
        let hit = space.nearest_intersection(&ray, f64::INFINITY).unwrap();
        assert_eq!(hit.primitive(), Some(big));
        assert_relative_eq!(hit.t(), 7.0, epsilon = 1e-9);
    }

    #[test]
    fn test_nearest_of_several_candidates_in_one_cell() {
        let mut scene = Scene::new();
        let wall = scene.insert(Triangle::new(
            Point3::new(6.0, -10.0, -10.0),
            Point3::new(6.0, 10.0, -10.0),
            Point3::new(6.0, 0.0, 10.0),
        ));
        let sphere = scene.insert(Sphere::new(Point3::new(3.0, 0.0, 0.0), 0.5));
        let space = build(scene);

        let ray = Ray::new(Point3::origin(), Vector3::x());
        let hit = space.nearest_intersection(&ray, f64::INFINITY).unwrap();
        assert_eq!(hit.primitive(), Some(sphere));

        let list = space.nearest_opaque_intersection(&ray, f64::INFINITY).unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].primitive(), Some(sphere));

        let beside = Ray::new(Point3::new(0.0, 2.0, 0.0), Vector3::x());
        let hit = space.nearest_intersection(&beside, f64::INFINITY).unwrap();
        assert_eq!(hit.primitive(), Some(wall));
        assert_relative_eq!(hit.t(), 6.0, epsilon = 1e-9);
    }

    #[test]
    fn test_opaque_list_collects_transparent_hits() {
        let mut scene = Scene::new();
        let glass_a =
            scene.insert(Sphere::new(Point3::new(0.0, 0.0, 6.0), 0.5).with_transparency(true));
        let glass_b =
            scene.insert(Sphere::new(Point3::new(0.0, 0.0, 3.0), 0.5).with_transparency(true));
        let wall = scene.insert(Sphere::new(Point3::origin(), 1.0));
        scene.insert(Sphere::new(Point3::new(0.0, 0.0, -3.0), 0.5).with_transparency(true));
        let ground = scene.insert(Plane::new(Point3::new(0.0, 0.0, -5.0), Vector3::z()));
        let space = build(scene);

        let list = space.nearest_opaque_intersection(&down(0.0), f64::INFINITY).unwrap();
        let ids: Vec<_> = list.iter().filter_map(Ray::primitive).collect();
        assert_eq!(ids, vec![wall, glass_b, glass_a]);
        assert!(list.windows(2).all(|w| w[0].t() >= w[1].t()));

        let past = space.nearest_opaque_intersection(&down(4.0), f64::INFINITY).unwrap();
        assert_eq!(past.len(), 1);
        assert_eq!(past[0].primitive(), Some(ground));
    }

    #[test]
    fn test_list_inside() {
        let mut scene = Scene::new();
        let a = scene.insert(Sphere::new(Point3::origin(), 1.0));
        let b = scene.insert(Sphere::new(Point3::new(0.5, 0.0, 0.0), 1.0));
        scene.insert(Sphere::new(Point3::new(10.0, 0.0, 0.0), 1.0));
        scene.insert(Plane::new(Point3::origin(), Vector3::z()));
        let space = build(scene);

        let inside = space.list_inside_geometry(&Point3::new(0.25, 0.0, 0.0)).unwrap();
        assert_eq!(inside.into_iter().collect::<Vec<_>>(), vec![a, b]);
        assert!(space.list_inside_geometry(&Point3::new(5.0, 0.0, 0.0)).unwrap().is_empty());
    }

    #[test]
    fn test_only_unboxed_primitives() {
        let mut scene = Scene::new();
        let plane = scene.insert(Plane::new(Point3::origin(), Vector3::z()));
        let space = build(scene);

        assert!(space.grid().is_none());
        let hit = space.nearest_intersection(&down(0.0), f64::INFINITY).unwrap();
        assert_eq!(hit.primitive(), Some(plane));
    }

    #[test]
    fn test_empty_scene() {
        let space = build(Scene::new());
        assert!(space.grid().is_none());
        assert!(!space.nearest_intersection(&down(0.0), f64::INFINITY).unwrap().is_intersected());
        assert!(space.nearest_opaque_intersection(&down(0.0), 1.0).unwrap().is_empty());
    }

    #[test]
    fn test_preconditions() {
        let mut scene = Scene::new();
        scene.insert(Sphere::new(Point3::origin(), 1.0));
        let mut space = VoxelSpace::new(Arc::new(scene));

        assert_eq!(
            space.nearest_intersection(&down(0.0), 1.0),
            Err(AccelError::NotInitialized)
        );
        assert_eq!(
            space.list_inside_geometry(&Point3::origin()),
            Err(AccelError::NotInitialized)
        );

        space.initialize().unwrap();
        assert_eq!(space.initialize(), Err(AccelError::AlreadyInitialized));
        assert_eq!(
            space.nearest_intersection(&down(0.0), -1.0),
            Err(AccelError::InvalidTimeBound(-1.0))
        );

        let hit = space.nearest_intersection(&down(0.0), f64::INFINITY).unwrap();
        assert_eq!(
            space.nearest_intersection(&hit, f64::INFINITY),
            Err(AccelError::AlreadyIntersected)
        );
        assert_eq!(
            space.nearest_opaque_intersection(&hit, f64::INFINITY),
            Err(AccelError::AlreadyIntersected)
        );
    }

    #[derive(Debug)]
    struct FixedDimension(f64);

    impl DimensionEvaluator for FixedDimension {
        fn evaluate(&self, _boxes: &[BoundingBox], _averaging: Averaging) -> f64 {
            self.0
        }
    }

    #[test]
    fn test_custom_evaluator_and_params() {
        let mut scene = Scene::new();
        scene.insert(Sphere::new(Point3::origin(), 1.0));
        let mut space = VoxelSpace::new(Arc::new(scene))
            .with_evaluator(FixedDimension(4.0))
            .with_params(GridParams::coarse());
        space.initialize().unwrap();
        assert_relative_eq!(space.grid().unwrap().dimension(), 8.0);

        let mut scene = Scene::new();
        scene.insert(Sphere::new(Point3::origin(), 1.0));
        let mut bad = VoxelSpace::new(Arc::new(scene)).with_evaluator(FixedDimension(-1.0));
        assert_eq!(bad.initialize(), Err(AccelError::InvalidDimension(-1.0)));
        assert!(!bad.is_initialized());
    }
}
