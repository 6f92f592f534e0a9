//! Ray-voxel traversal (Amanatides & Woo 3-D DDA).
//!
//! [`FastTraversal`] enumerates, in order of increasing ray parameter, the
//! voxels a ray crosses together with the time it enters and leaves each one.
//!
//! The walk is clipped to the region of the grid that can hold primitives:
//! the voxels whose coordinates are bounded in magnitude by the grid's
//! extremum voxel. A ray that starts outside that region jumps straight to
//! where it enters it, and a ray that never meets it yields nothing. Together
//! with the caller's time bound this keeps every walk finite, even for an
//! unbounded `t_max`.
//!
//! When boundary times tie on several axes, x steps before y, and y before z.
//!
//! # Example
//!
//! ```
//! use cf_raygrid::{FastTraversal, Ray, Voxel, VoxelBuilder};
//! use nalgebra::{Point3, Vector3};
//!
//! let ray = Ray::new(Point3::origin(), Vector3::x());
//! let builder = VoxelBuilder::new(1.0).unwrap();
//! let walk = FastTraversal::new(&ray, builder, 5.5, Voxel::new(10, 10, 10));
//!
//! let xs: Vec<i32> = walk.map(|step| step.voxel.x).collect();
//! assert_eq!(xs, vec![0, 1, 2, 3, 4, 5]);
//! ```

use crate::ray::Ray;
use crate::voxel::{Voxel, VoxelBuilder};

/// One voxel of a traversal and the ray times bounding it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TraversalStep {
    /// The voxel crossed.
    pub voxel: Voxel,
    /// Ray parameter where the ray enters the voxel.
    pub entry: f64,
    /// Ray parameter where the ray leaves the voxel (or the walk ends).
    pub exit: f64,
}

/// Iterator over the voxels a ray crosses.
#[derive(Debug, Clone)]
pub struct FastTraversal {
    /// Voxel the next call to `next` returns.
    current: Voxel,
    /// Step direction for each axis (-1, 0 or 1).
    step: [i32; 3],
    /// Ray parameter of the next boundary crossing on each axis.
    t_max: [f64; 3],
    /// Ray parameter needed to cross one full cell on each axis.
    t_delta: [f64; 3],
    /// Entry time of `current`.
    entry: f64,
    /// Caller's time bound clipped to the exit from the extremum region.
    limit: f64,
    extremum: Voxel,
    open: bool,
    last: Option<TraversalStep>,
}

impl FastTraversal {
    /// Starts a walk of `ray` through cells of `builder`'s dimension, up to
    /// ray time `t_max` and within the voxels bounded by `extremum`.
    ///
    /// A negative or NaN `t_max` produces an empty walk.
    #[must_use]
    pub fn new(ray: &Ray, builder: VoxelBuilder, t_max: f64, extremum: Voxel) -> Self {
        if t_max.is_nan() || t_max < 0.0 {
            return Self::closed(extremum);
        }
        let dimension = builder.dimension();
        let origin = ray.origin();
        let direction = ray.direction();

        // Slab clip against the world box [-e * dim, (e + 1) * dim] per axis.
        let mut t_enter = 0.0_f64;
        let mut t_exit = t_max;
        for axis in 0..3 {
            let e = f64::from(extremum.axis(axis));
            let lo = -e * dimension;
            let hi = (e + 1.0) * dimension;
            let o = origin[axis];
            let d = direction[axis];
            if d == 0.0 {
                if o < lo || o > hi {
                    return Self::closed(extremum);
                }
            } else {
                let a = (lo - o) / d;
                let b = (hi - o) / d;
                t_enter = t_enter.max(a.min(b));
                t_exit = t_exit.min(a.max(b));
            }
        }
        if t_enter.is_nan() || t_exit.is_nan() || t_enter > t_exit {
            return Self::closed(extremum);
        }

        let start = builder.build_voxel(&ray.point_at(t_enter));
        let clamp = |c: i32, e: i32| c.clamp(e.saturating_neg(), e);
        let current = Voxel::new(
            clamp(start.x, extremum.x),
            clamp(start.y, extremum.y),
            clamp(start.z, extremum.z),
        );

        let mut step = [0_i32; 3];
        let mut t_next = [f64::INFINITY; 3];
        let mut t_delta = [f64::INFINITY; 3];
        for axis in 0..3 {
            let d = direction[axis];
            if d == 0.0 {
                continue;
            }
            let cell = f64::from(current.axis(axis));
            let boundary = if d > 0.0 {
                step[axis] = 1;
                (cell + 1.0) * dimension
            } else {
                step[axis] = -1;
                cell * dimension
            };
            t_next[axis] = (boundary - origin[axis]) / d;
            t_delta[axis] = (dimension / d).abs();
        }

        Self {
            current,
            step,
            t_max: t_next,
            t_delta,
            entry: t_enter,
            limit: t_exit,
            extremum,
            open: true,
            last: None,
        }
    }

    fn closed(extremum: Voxel) -> Self {
        Self {
            current: Voxel::origin(),
            step: [0; 3],
            t_max: [f64::INFINITY; 3],
            t_delta: [f64::INFINITY; 3],
            entry: f64::INFINITY,
            limit: f64::NEG_INFINITY,
            extremum,
            open: false,
            last: None,
        }
    }

    /// Whether another voxel remains.
    #[must_use]
    pub const fn has_next(&self) -> bool {
        self.open
    }

    /// Entry time of the voxel that `next` would return.
    #[must_use]
    pub const fn next_entry_time(&self) -> Option<f64> {
        if self.open { Some(self.entry) } else { None }
    }

    /// The voxel last returned, with its times.
    #[must_use]
    pub const fn last_step(&self) -> Option<TraversalStep> {
        self.last
    }

    /// Entry time of the voxel last returned, or of the first voxel before
    /// any has been returned.
    #[must_use]
    pub fn entry_time(&self) -> f64 {
        self.last.map_or(self.entry, |step| step.entry)
    }

    /// Exit time of the voxel last returned, or the first entry time before
    /// any has been returned.
    #[must_use]
    pub fn exit_time(&self) -> f64 {
        self.last.map_or(self.entry, |step| step.exit)
    }

    /// Ends the walk; `next` returns `None` from now on.
    pub fn close(&mut self) {
        self.open = false;
    }

    fn min_axis(&self) -> usize {
        let [x, y, z] = self.t_max;
        if x <= y && x <= z {
            0
        } else if y <= z {
            1
        } else {
            2
        }
    }
}

impl Iterator for FastTraversal {
    type Item = TraversalStep;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.open {
            return None;
        }

        let axis = self.min_axis();
        let boundary = self.t_max[axis];
        let step = TraversalStep {
            voxel: self.current,
            entry: self.entry,
            exit: boundary.min(self.limit).max(self.entry),
        };
        self.last = Some(step);

        if !boundary.is_finite() || boundary > self.limit {
            self.open = false;
            return Some(step);
        }

        let coord = self.current.axis(axis).saturating_add(self.step[axis]);
        match axis {
            0 => self.current.x = coord,
            1 => self.current.y = coord,
            _ => self.current.z = coord,
        }
        if coord.saturating_abs() > self.extremum.axis(axis) {
            self.open = false;
        }
        self.entry = boundary.max(self.entry);
        self.t_max[axis] += self.t_delta[axis];

        Some(step)
    }
}
