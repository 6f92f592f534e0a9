//! Per-query hit bookkeeping shared by every accelerator.

use std::collections::{BTreeSet, HashSet};

use nalgebra::Point3;

use crate::error::AccelResult;
use crate::primitive::{PrimitiveId, Scene};
use crate::ray::{Ray, nearer};

/// A ray and its time bound, tested against primitives of one scene.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Probe<'a> {
    scene: &'a Scene,
    ray: &'a Ray,
    t_max: f64,
}

impl<'a> Probe<'a> {
    pub(crate) const fn new(scene: &'a Scene, ray: &'a Ray, t_max: f64) -> Self {
        Self { scene, ray, t_max }
    }

    /// Hit of `id`, dropped if it lies beyond the time bound.
    pub(crate) fn hit(&self, id: PrimitiveId) -> AccelResult<Option<Ray>> {
        Ok(self
            .scene
            .intersect(id, self.ray)?
            .filter(|hit| hit.t() <= self.t_max))
    }

    pub(crate) fn is_transparent(&self, id: PrimitiveId) -> AccelResult<bool> {
        Ok(self.scene.primitive(id)?.is_transparent())
    }

    /// Keeps the nearer of `best` and every hit among `ids`.
    pub(crate) fn nearest_among(
        &self,
        ids: impl IntoIterator<Item = PrimitiveId>,
        best: &mut NearestHit,
    ) -> AccelResult<()> {
        for id in ids {
            if let Some(hit) = self.hit(id)? {
                best.offer(hit);
            }
        }
        Ok(())
    }

    /// Records every hit among `ids` in `hits`.
    pub(crate) fn opaque_among(
        &self,
        ids: impl IntoIterator<Item = PrimitiveId>,
        hits: &mut OpaqueHits,
    ) -> AccelResult<()> {
        for id in ids {
            if let Some(hit) = self.hit(id)? {
                hits.offer(hit, self.is_transparent(id)?);
            }
        }
        Ok(())
    }
}

/// Closed primitives among `ids` that contain `point`.
pub(crate) fn inside_among(
    scene: &Scene,
    ids: impl IntoIterator<Item = PrimitiveId>,
    point: &Point3<f64>,
    inside: &mut BTreeSet<PrimitiveId>,
) -> AccelResult<()> {
    for id in ids {
        let primitive = scene.primitive(id)?;
        if primitive.is_closed_surface() && primitive.contains_point(point) {
            inside.insert(id);
        }
    }
    Ok(())
}

/// Set of primitives already tested during one query.
///
/// A primitive spanning several voxels is met once per voxel; only the first
/// meeting runs the intersection test.
#[derive(Debug, Default)]
pub(crate) struct Mailbox {
    seen: HashSet<PrimitiveId>,
}

impl Mailbox {
    /// Returns true the first time `id` is offered.
    pub(crate) fn first_visit(&mut self, id: PrimitiveId) -> bool {
        self.seen.insert(id)
    }

    /// Ids of `cell` not seen before, marking them seen.
    pub(crate) fn unseen<'c>(
        &'c mut self,
        cell: &'c [PrimitiveId],
    ) -> impl Iterator<Item = PrimitiveId> + 'c {
        cell.iter().copied().filter(move |id| self.first_visit(*id))
    }
}

/// Running nearest hit. Starts as the unintersected query ray.
#[derive(Debug, Clone, Copy)]
pub(crate) struct NearestHit {
    best: Ray,
}

impl NearestHit {
    pub(crate) const fn new(ray: &Ray) -> Self {
        Self { best: *ray }
    }

    pub(crate) fn offer(&mut self, hit: Ray) {
        self.best = nearer(self.best, hit);
    }

    /// Time of the best hit so far, `+∞` if none.
    pub(crate) fn t(&self) -> f64 {
        self.best.t()
    }

    pub(crate) const fn into_ray(self) -> Ray {
        self.best
    }
}

/// The nearest opaque hit and the transparent hits seen so far.
#[derive(Debug, Clone, Default)]
pub(crate) struct OpaqueHits {
    opaque: Option<Ray>,
    transparent: Vec<Ray>,
}

impl OpaqueHits {
    pub(crate) fn offer(&mut self, hit: Ray, transparent: bool) {
        if transparent {
            if hit.t() < self.bound() {
                self.transparent.push(hit);
            }
        } else {
            self.opaque = Some(match self.opaque {
                Some(current) => nearer(current, hit),
                None => hit,
            });
        }
    }

    /// Time of the nearest opaque hit, `+∞` if none. Nothing at or beyond it
    /// can appear in the result.
    pub(crate) fn bound(&self) -> f64 {
        self.opaque.map_or(f64::INFINITY, |hit| hit.t())
    }

    /// Opaque hit first, then transparent hits in front of it, by decreasing `t`.
    pub(crate) fn into_sorted_list(self) -> Vec<Ray> {
        let bound = self.bound();
        let mut list: Vec<Ray> = self
            .transparent
            .into_iter()
            .filter(|hit| hit.t() < bound)
            .collect();
        list.extend(self.opaque);
        list.sort_by(|a, b| b.cmp_time(a));
        list
    }
}
