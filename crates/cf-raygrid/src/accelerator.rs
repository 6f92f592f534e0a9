//! The query interface shared by every acceleration structure.

use std::collections::BTreeSet;

use nalgebra::Point3;

use crate::error::{AccelError, AccelResult};
use crate::primitive::{PrimitiveId, Scene};
use crate::ray::Ray;

/// Ray and point queries over a frozen scene.
///
/// `initialize` must complete exactly once before any query. After that the
/// structure is immutable and queries may run from several threads at once.
pub trait Accelerator: Send + Sync {
    /// The scene this structure answers for.
    fn scene(&self) -> &Scene;

    /// Builds the structure.
    ///
    /// # Errors
    ///
    /// Returns [`AccelError::AlreadyInitialized`] on a second call, and
    /// propagates parameter or dimension errors from the build.
    fn initialize(&mut self) -> AccelResult<()>;

    /// Whether `initialize` has completed.
    fn is_initialized(&self) -> bool;

    /// Nearest hit of `ray` with `t <= t_max`, recorded on a new ray.
    ///
    /// Returns the unintersected ray when nothing is hit.
    ///
    /// # Errors
    ///
    /// Returns [`AccelError::AlreadyIntersected`], [`AccelError::InvalidTimeBound`]
    /// or [`AccelError::NotInitialized`] on precondition violations.
    fn nearest_intersection(&self, ray: &Ray, t_max: f64) -> AccelResult<Ray>;

    /// The nearest opaque hit followed by every transparent hit in front of
    /// it, sorted by decreasing `t`. Without an opaque hit the list holds only
    /// transparent hits.
    ///
    /// # Errors
    ///
    /// Same preconditions as [`nearest_intersection`](Self::nearest_intersection).
    fn nearest_opaque_intersection(&self, ray: &Ray, t_max: f64) -> AccelResult<Vec<Ray>>;

    /// Every closed primitive containing `point`.
    ///
    /// # Errors
    ///
    /// Returns [`AccelError::NotInitialized`] before `initialize`.
    fn list_inside_geometry(&self, point: &Point3<f64>) -> AccelResult<BTreeSet<PrimitiveId>>;
}

/// Validates the preconditions shared by ray queries.
pub(crate) fn check_ray_query(ray: &Ray, t_max: f64, initialized: bool) -> AccelResult<()> {
    if ray.is_intersected() {
        return Err(AccelError::AlreadyIntersected);
    }
    if t_max.is_nan() || t_max < 0.0 {
        return Err(AccelError::InvalidTimeBound(t_max));
    }
    if !initialized {
        return Err(AccelError::NotInitialized);
    }
    Ok(())
}
