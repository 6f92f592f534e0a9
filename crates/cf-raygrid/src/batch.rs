//! Parallel ray batches.
//!
//! Accelerators are immutable once built, so a batch of rays can be answered
//! from every rayon worker at once. Results keep the order of the input rays.

use rayon::prelude::*;
use tracing::debug;

use crate::accelerator::Accelerator;
use crate::error::AccelResult;
use crate::ray::Ray;

/// [`Accelerator::nearest_intersection`] for every ray of `rays`, in parallel.
///
/// # Errors
///
/// Returns the first precondition error met by any ray.
pub fn nearest_intersections<A>(accelerator: &A, rays: &[Ray], t_max: f64) -> AccelResult<Vec<Ray>>
where
    A: Accelerator + ?Sized,
{
    debug!(rays = rays.len(), t_max, "nearest intersection batch");
    rays.par_iter()
        .map(|ray| accelerator.nearest_intersection(ray, t_max))
        .collect()
}

/// [`Accelerator::nearest_opaque_intersection`] for every ray of `rays`, in
/// parallel.
///
/// # Errors
///
/// Returns the first precondition error met by any ray.
pub fn nearest_opaque_intersections<A>(
    accelerator: &A,
    rays: &[Ray],
    t_max: f64,
) -> AccelResult<Vec<Vec<Ray>>>
where
    A: Accelerator + ?Sized,
{
    debug!(rays = rays.len(), t_max, "opaque intersection batch");
    rays.par_iter()
        .map(|ray| accelerator.nearest_opaque_intersection(ray, t_max))
        .collect()
}
