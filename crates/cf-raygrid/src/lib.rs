//! Voxel-grid acceleration for ray and point queries.
//!
//! This crate answers three questions about a static set of geometric
//! primitives far faster than testing every primitive:
//!
//! - which primitive does a ray hit first ([`Accelerator::nearest_intersection`])
//! - what does a ray pass through before its first opaque hit
//!   ([`Accelerator::nearest_opaque_intersection`])
//! - which closed primitives contain a point ([`Accelerator::list_inside_geometry`])
//!
//! Three accelerators implement the same [`Accelerator`] trait:
//!
//! - [`LinearSpace`] - brute force, the reference answer
//! - [`VoxelSpace`] - one uniform grid plus a fallback list for unbounded primitives
//! - [`MultiVoxelSpace`] - one grid per size bucket, walked together in entry-time order
//!
//! # Building Blocks
//!
//! - [`Voxel`], [`VoxelBuilder`] - integer cell coordinates and world-to-cell mapping
//! - [`BoundingBox`], [`BoundingBoxBuilder`] - primitive bounds, nudged so no axis is flat
//! - [`GeometryCollectionSplitter`] - buckets primitives by size per [`SplitStrategy`]
//! - [`DimensionEvaluator`] - picks the cell size of a bucket
//! - [`PrimitiveGrid`] - sparse map from voxel to the primitives overlapping it
//! - [`FastTraversal`] - 3-D DDA walk of the voxels a ray crosses
//!
//! # Coordinate Systems
//!
//! World coordinates are continuous `f64` values. Voxel coordinates are discrete
//! `i32` values; voxel `(i, j, k)` covers `[i·d, (i+1)·d)` on each axis for cell
//! dimension `d`, so cells straddling zero are never shared between signs.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use cf_raygrid::{Accelerator, Ray, Scene, VoxelSpace};
//! use cf_raygrid::shapes::{Plane, Sphere};
//! use nalgebra::{Point3, Vector3};
//!
//! let mut scene = Scene::new();
//! let ball = scene.insert(Sphere::new(Point3::new(0.0, 0.0, 2.0), 1.0));
//! let floor = scene.insert(Plane::new(Point3::origin(), Vector3::z()));
//!
//! let mut space = VoxelSpace::new(Arc::new(scene));
//! space.initialize().unwrap();
//!
//! // Straight down through the ball.
//! let ray = Ray::new(Point3::new(0.0, 0.0, 10.0), -Vector3::z());
//! let hit = space.nearest_intersection(&ray, f64::INFINITY).unwrap();
//! assert_eq!(hit.primitive(), Some(ball));
//! assert!((hit.t() - 7.0).abs() < 1e-9);
//!
//! // Beside the ball, only the floor is left.
//! let ray = Ray::new(Point3::new(5.0, 0.0, 10.0), -Vector3::z());
//! let hit = space.nearest_intersection(&ray, f64::INFINITY).unwrap();
//! assert_eq!(hit.primitive(), Some(floor));
//!
//! // Point containment only reports closed surfaces.
//! let inside = space.list_inside_geometry(&Point3::new(0.0, 0.0, 2.5)).unwrap();
//! assert!(inside.contains(&ball));
//! assert!(!inside.contains(&floor));
//! ```
//!
//! # Parallel Queries
//!
//! Built accelerators are immutable and `Sync`. [`nearest_intersections`]
//! answers a batch of rays on the rayon thread pool.
//!
//! # Features
//!
//! - `serde` - serialization for [`GridParams`], [`Averaging`], [`SplitStrategy`] and [`Voxel`]

// Safety: Deny unwrap/expect in library code. Tests may use them (workspace warns).
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod accelerator;
mod batch;
mod bounds;
mod dimension;
mod error;
mod grid;
mod hits;
mod linear;
mod multi;
mod params;
mod primitive;
mod ray;
pub mod shapes;
mod space;
mod splitter;
mod traversal;
mod voxel;

// Re-export core types
pub use accelerator::Accelerator;
pub use batch::{nearest_intersections, nearest_opaque_intersections};
pub use bounds::{BoundingBox, BoundingBoxBuilder};
pub use dimension::{Averaging, DimensionEvaluator, MeanSizeEvaluator, cell_dimension};
pub use error::{AccelError, AccelResult, GeometryError};
pub use grid::PrimitiveGrid;
pub use linear::LinearSpace;
pub use multi::MultiVoxelSpace;
pub use params::GridParams;
pub use primitive::{Primitive, PrimitiveId, PrimitiveKind, Scene};
pub use ray::{EPSILON, Intersection, Ray, SurfaceHit, nearer};
pub use space::VoxelSpace;
pub use splitter::{GeometryCollectionSplitter, SplitStrategy};
pub use traversal::{FastTraversal, TraversalStep};
pub use voxel::{Voxel, VoxelBuilder, VoxelRange, VoxelRangeIter};

// Re-export nalgebra types for convenience
pub use nalgebra::{Point3, Vector3};
