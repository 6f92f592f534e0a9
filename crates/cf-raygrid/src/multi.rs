//! Multi-resolution accelerator: one grid per primitive size bucket.
//!
//! Each grid is walked by its own traversal. The walks are merged through a
//! min-heap keyed on each walk's next voxel entry time, so voxels from all
//! grids are visited in global entry-time order. The merge stops as soon as
//! the smallest pending entry time is not before the best hit: no voxel from
//! any grid can then hold a nearer one.

use std::cmp::Ordering;
use std::collections::{BTreeSet, BinaryHeap};
use std::sync::Arc;

use nalgebra::Point3;
use tracing::{debug, info};

use crate::accelerator::{Accelerator, check_ray_query};
use crate::dimension::{DimensionEvaluator, MeanSizeEvaluator};
use crate::error::{AccelError, AccelResult};
use crate::grid::PrimitiveGrid;
use crate::hits::{Mailbox, NearestHit, OpaqueHits, Probe, inside_among};
use crate::params::GridParams;
use crate::primitive::{PrimitiveId, Scene};
use crate::ray::Ray;
use crate::splitter::GeometryCollectionSplitter;
use crate::traversal::FastTraversal;

/// Several grids of different cell sizes plus a shared fallback list.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use cf_raygrid::{Accelerator, MultiVoxelSpace, Ray, Scene};
/// use cf_raygrid::shapes::Sphere;
/// use nalgebra::{Point3, Vector3};
///
/// let mut scene = Scene::new();
/// scene.insert(Sphere::new(Point3::new(0.0, 0.0, 0.0), 0.1));
/// let big = scene.insert(Sphere::new(Point3::new(0.0, 0.0, -10.0), 5.0));
///
/// let mut space = MultiVoxelSpace::new(Arc::new(scene));
/// space.initialize().unwrap();
/// assert_eq!(space.grids().len(), 2);
///
/// let ray = Ray::new(Point3::new(1.0, 0.0, 10.0), -Vector3::z());
/// let hit = space.nearest_intersection(&ray, f64::INFINITY).unwrap();
/// assert_eq!(hit.primitive(), Some(big));
/// ```
#[derive(Debug)]
pub struct MultiVoxelSpace {
    scene: Arc<Scene>,
    params: GridParams,
    evaluator: Box<dyn DimensionEvaluator>,
    built: Option<Built>,
}

#[derive(Debug)]
struct Built {
    grids: Vec<PrimitiveGrid>,
    fallback: Vec<PrimitiveId>,
}

/// Heap entry: a walk and the entry time of its next voxel.
#[derive(Debug, Clone, Copy)]
struct Pending {
    entry: f64,
    walk: usize,
}

impl PartialEq for Pending {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Pending {}

impl PartialOrd for Pending {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Pending {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: BinaryHeap is a max-heap and we pop the earliest entry.
        other
            .entry
            .total_cmp(&self.entry)
            .then_with(|| other.walk.cmp(&self.walk))
    }
}

/// Walks of every grid, merged in entry-time order.
struct MergedWalk<'g> {
    grids: &'g [PrimitiveGrid],
    walks: Vec<FastTraversal>,
    heap: BinaryHeap<Pending>,
}

impl<'g> MergedWalk<'g> {
    fn new(grids: &'g [PrimitiveGrid], ray: &Ray, t_max: f64) -> Self {
        let walks: Vec<FastTraversal> = grids.iter().map(|g| g.traverse(ray, t_max)).collect();
        let heap = walks
            .iter()
            .enumerate()
            .filter_map(|(walk, w)| w.next_entry_time().map(|entry| Pending { entry, walk }))
            .collect();
        Self { grids, walks, heap }
    }

    /// Next non-empty cell, in entry order, whose entry lies before `bound`.
    fn next_before(&mut self, bound: f64) -> Option<&'g [PrimitiveId]> {
        let grids = self.grids;
        loop {
            let Pending { entry, walk } = self.heap.pop()?;
            if entry >= bound {
                // Every other pending walk enters later still.
                self.heap.clear();
                return None;
            }
            let traversal = &mut self.walks[walk];
            let Some(step) = traversal.next() else {
                continue;
            };
            if let Some(entry) = traversal.next_entry_time() {
                self.heap.push(Pending { entry, walk });
            }
            let cell = grids[walk].cell(step.voxel);
            if !cell.is_empty() {
                return Some(cell);
            }
        }
    }
}

impl MultiVoxelSpace {
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

    /// Replaces the grid parameters, including the split strategy.
    #[must_use]
    pub fn with_params(mut self, params: GridParams) -> Self {
        self.params = params;
        self
    }

    /// Replaces the cell dimension policy used for every bucket.
    #[must_use]
    pub fn with_evaluator(mut self, evaluator: impl DimensionEvaluator + 'static) -> Self {
        self.evaluator = Box::new(evaluator);
        self
    }

    /// The non-empty grids, empty before `initialize`.
    #[must_use]
    pub fn grids(&self) -> &[PrimitiveGrid] {
        self.built
            .as_ref()
            .map(|built| built.grids.as_slice())
            .unwrap_or_default()
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

impl Accelerator for MultiVoxelSpace {
    fn scene(&self) -> &Scene {
        &self.scene
    }

    fn initialize(&mut self) -> AccelResult<()> {
        if self.built.is_some() {
            return Err(AccelError::AlreadyInitialized);
        }
        self.params.validate()?;

        let (buckets, mut fallback) =
            GeometryCollectionSplitter::new(&self.scene, self.params.split_strategy).into_parts();

        let mut grids = Vec::with_capacity(buckets.len());
        for (bucket, boxes) in buckets.iter().enumerate() {
            let (grid, demoted) =
                PrimitiveGrid::from_bucket(boxes, self.evaluator.as_ref(), &self.params)?;
            debug!(
                bucket,
                dimension = grid.dimension(),
                primitives = grid.primitive_count(),
                "bucket grid ready"
            );
            fallback.extend(demoted);
            if !grid.is_empty() {
                grids.push(grid);
            }
        }

        info!(
            primitives = self.scene.len(),
            strategy = %self.params.split_strategy,
            grids = grids.len(),
            dimensions = ?grids.iter().map(PrimitiveGrid::dimension).collect::<Vec<_>>(),
            fallback = fallback.len(),
            "initialized multi voxel space"
        );

        self.built = Some(Built { grids, fallback });
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

        probe.nearest_among(built.fallback.iter().copied(), &mut best)?;

        let mut merged = MergedWalk::new(&built.grids, ray, t_max.min(best.t()));
        let mut mailbox = Mailbox::default();
        while let Some(cell) = merged.next_before(best.t()) {
            probe.nearest_among(mailbox.unseen(cell), &mut best)?;
        }

        Ok(best.into_ray())
    }

    fn nearest_opaque_intersection(&self, ray: &Ray, t_max: f64) -> AccelResult<Vec<Ray>> {
        check_ray_query(ray, t_max, self.built.is_some())?;
        let built = self.built()?;
        let probe = Probe::new(&self.scene, ray, t_max);
        let mut hits = OpaqueHits::default();

        probe.opaque_among(built.fallback.iter().copied(), &mut hits)?;

        let mut merged = MergedWalk::new(&built.grids, ray, t_max.min(hits.bound()));
        let mut mailbox = Mailbox::default();
        while let Some(cell) = merged.next_before(hits.bound()) {
            probe.opaque_among(mailbox.unseen(cell), &mut hits)?;
        }

        Ok(hits.into_sorted_list())
    }

    fn list_inside_geometry(&self, point: &Point3<f64>) -> AccelResult<BTreeSet<PrimitiveId>> {
        let built = self.built()?;
        let mut inside = BTreeSet::new();
        for grid in &built.grids {
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
    use crate::linear::LinearSpace;
    use crate::shapes::{Plane, Sphere, Triangle};
    use crate::splitter::SplitStrategy;

    fn build(scene: Scene) -> MultiVoxelSpace {
        let mut space = MultiVoxelSpace::new(Arc::new(scene));
        space.initialize().unwrap();
        space
    }

    /// Tiny, small, medium and huge spheres scattered along the x axis.
    fn mixed_scene() -> Scene {
        let mut scene = Scene::new();
        for i in 0..8 {
            let x = f64::from(i) * 3.0 - 12.0;
            scene.insert(Sphere::new(Point3::new(x, 0.3, 0.0), 0.05));
            scene.insert(Sphere::new(Point3::new(x + 1.0, -0.4, 0.2), 0.3));
        }
        scene.insert(Sphere::new(Point3::new(0.0, 8.0, 0.0), 2.0));
        scene.insert(Sphere::new(Point3::new(30.0, 0.0, 0.0), 10.0));
        scene.insert(Plane::new(Point3::new(0.0, 0.0, -20.0), Vector3::z()));
        scene
    }

    #[test]
    fn test_heap_pops_earliest_entry() {
        let mut heap = BinaryHeap::new();
        heap.push(Pending { entry: 3.0, walk: 0 });
        heap.push(Pending { entry: 1.0, walk: 2 });
        heap.push(Pending { entry: 1.0, walk: 1 });
        heap.push(Pending { entry: 2.0, walk: 3 });
        let order: Vec<_> = std::iter::from_fn(|| heap.pop()).map(|p| p.walk).collect();
        assert_eq!(order, vec![1, 2, 3, 0]);
    }

    #[test]
    fn test_builds_one_grid_per_bucket() {
        let space = build(mixed_scene());
        assert!(space.grids().len() >= 2);
        assert_eq!(space.fallback().len(), 1);
        let total: usize = space.grids().iter().map(PrimitiveGrid::primitive_count).sum();
        assert_eq!(total, 18);
    }

    #[test]
    fn test_matches_linear_scan() {
        let scene = Arc::new(mixed_scene());
        let mut multi = MultiVoxelSpace::new(Arc::clone(&scene));
        multi.initialize().unwrap();
        let mut linear = LinearSpace::new(Arc::clone(&scene));
        linear.initialize().unwrap();

        let rays = [
            Ray::new(Point3::new(-20.0, 0.0, 0.0), Vector3::x()),
            Ray::new(Point3::new(-20.0, -0.4, 0.2), Vector3::x()),
            Ray::new(Point3::new(50.0, 0.1, 0.0), -Vector3::x()),
            Ray::new(Point3::new(0.0, 20.0, 0.0), Vector3::new(0.0, -1.0, -0.05)),
            Ray::new(Point3::new(-3.0, 0.3, 10.0), -Vector3::z()),
            Ray::new(Point3::new(5.0, 5.0, 5.0), Vector3::new(0.3, -0.2, -1.0)),
        ];
        for ray in &rays {
            let expected = linear.nearest_intersection(ray, f64::INFINITY).unwrap();
            let actual = multi.nearest_intersection(ray, f64::INFINITY).unwrap();
            assert_eq!(actual.primitive(), expected.primitive(), "ray {ray:?}");
            assert_eq!(actual.t(), expected.t());
        }
    }

    #[test]
    fn test_small_grid_hit_beats_coarse_grid_hit() {
        let mut scene = Scene::new();
        let near = scene.insert(Sphere::new(Point3::new(2.0, 0.0, 0.0), 0.1));
        scene.insert(Sphere::new(Point3::new(5.0, 0.0, 0.0), 0.1));
        scene.insert(Sphere::new(Point3::new(12.0, 0.0, 0.0), 4.0));
        let space = build(scene);

        let ray = Ray::new(Point3::origin(), Vector3::x());
        let hit = space.nearest_intersection(&ray, f64::INFINITY).unwrap();
        assert_eq!(hit.primitive(), Some(near));
        assert_relative_eq!(hit.t(), 1.9, epsilon = 1e-9);
    }

    #[test]
    fn test_far_tiny_primitives_fall_back() {
        let mut scene = Scene::new();
        let far = scene.insert(Sphere::new(Point3::new(1e6, 0.0, 0.0), 1e-4));
        scene.insert(Sphere::new(Point3::new(1e6, 5.0, 0.0), 1e-4));
        scene.insert(Sphere::new(Point3::new(0.0, 0.0, 0.0), 1.0));
        scene.insert(Sphere::new(Point3::new(0.0, 8.0, 0.0), 2.0));
        let space = build(scene);

        assert!(space.fallback().contains(&far));
        let ray = Ray::new(Point3::new(1e6, 0.0, 10.0), -Vector3::z());
        let hit = space.nearest_intersection(&ray, f64::INFINITY).unwrap();
        assert_eq!(hit.primitive(), Some(far));
        assert_relative_eq!(hit.t(), 9.9999, epsilon = 1e-7);
    }

    #[test]
    fn test_opaque_list_across_grids() {
        let mut scene = Scene::new();
        let glass =
            scene.insert(Sphere::new(Point3::new(0.0, 0.0, 5.0), 0.2).with_transparency(true));
        let fog =
            scene.insert(Sphere::new(Point3::new(0.0, 0.0, 2.0), 0.1).with_transparency(true));
        let block = scene.insert(Sphere::new(Point3::new(0.0, 0.0, -6.0), 4.0));
        scene.insert(Sphere::new(Point3::new(0.0, 0.0, -15.0), 0.2).with_transparency(true));
        let space = build(scene);

        let ray = Ray::new(Point3::new(0.0, 0.0, 10.0), -Vector3::z());
        let list = space.nearest_opaque_intersection(&ray, f64::INFINITY).unwrap();
        let ids: Vec<_> = list.iter().filter_map(Ray::primitive).collect();
        assert_eq!(ids, vec![block, fog, glass]);
        assert_relative_eq!(list[0].t(), 12.0, epsilon = 1e-9);
    }

    #[test]
    fn test_list_inside_across_buckets() {
        let mut scene = Scene::new();
        let small = scene.insert(Sphere::new(Point3::new(0.1, 0.0, 0.0), 0.3));
        let large = scene.insert(Sphere::new(Point3::origin(), 6.0));
        scene.insert(Sphere::new(Point3::new(20.0, 0.0, 0.0), 0.3));
        let space = build(scene);

        let inside = space.list_inside_geometry(&Point3::new(0.2, 0.0, 0.0)).unwrap();
        assert_eq!(inside.into_iter().collect::<Vec<_>>(), vec![small, large]);
    }

    #[test]
    fn test_every_strategy_agrees() {
        let scene = Arc::new(mixed_scene());
        let ray = Ray::new(Point3::new(-20.0, -0.4, 0.2), Vector3::x());
        let mut answers = Vec::new();
        for strategy in SplitStrategy::ALL {
            let mut space = MultiVoxelSpace::new(Arc::clone(&scene))
                .with_params(GridParams::default().with_split_strategy(strategy));
            space.initialize().unwrap();
            answers.push(space.nearest_intersection(&ray, f64::INFINITY).unwrap().primitive());
        }
        assert!(answers.windows(2).all(|w| w[0] == w[1]));
        assert!(answers[0].is_some());
    }

    #[test]
    fn test_flat_triangles_and_time_bound() {
        let mut scene = Scene::new();
        let floor = scene.insert(Triangle::new(
            Point3::new(-50.0, -50.0, 0.0),
            Point3::new(50.0, -50.0, 0.0),
            Point3::new(0.0, 50.0, 0.0),
        ));
        scene.insert(Sphere::new(Point3::new(0.0, 0.0, 3.0), 0.25));
        let space = build(scene);

        let ray = Ray::new(Point3::new(1.0, 0.0, 10.0), -Vector3::z());
        let hit = space.nearest_intersection(&ray, f64::INFINITY).unwrap();
        assert_eq!(hit.primitive(), Some(floor));
        assert!(!space.nearest_intersection(&ray, 9.0).unwrap().is_intersected());
    }

    #[test]
    fn test_lifecycle_errors() {
        let mut space = MultiVoxelSpace::new(Arc::new(mixed_scene()));
        assert!(space.grids().is_empty());
        let ray = Ray::new(Point3::origin(), Vector3::x());
        assert_eq!(
            space.nearest_opaque_intersection(&ray, 1.0),
            Err(AccelError::NotInitialized)
        );
        space.initialize().unwrap();
        assert_eq!(space.initialize(), Err(AccelError::AlreadyInitialized));
        assert!(matches!(
            space.nearest_intersection(&ray, f64::NAN),
            Err(AccelError::InvalidTimeBound(t)) if t.is_nan()
        ));
    }
}
