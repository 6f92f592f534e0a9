//! Error types for acceleration structures and primitive contracts.

use crate::primitive::{PrimitiveId, PrimitiveKind};

/// Errors raised by the acceleration structures.
///
/// Every variant except [`AccelError::Geometry`] is a precondition violation:
/// the caller broke a contract and the operation was not attempted.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum AccelError {
    /// A hit was recorded on a ray that already carries one.
    #[error("ray is already intersected")]
    AlreadyIntersected,

    /// The time bound of a query is negative or NaN.
    #[error("time bound must be non-negative, got {0}")]
    InvalidTimeBound(f64),

    /// A query ran before `initialize()` completed.
    #[error("acceleration structure queried before initialize()")]
    NotInitialized,

    /// `initialize()` was called a second time.
    #[error("acceleration structure is already initialized")]
    AlreadyInitialized,

    /// A split strategy code or name was not recognized.
    #[error("unknown split strategy: {0}")]
    UnknownSplitStrategy(String),

    /// A grid cell dimension is not positive and finite.
    #[error("grid cell dimension must be positive and finite, got {0}")]
    InvalidDimension(f64),

    /// A primitive reported a hit time below `EPSILON` or not finite.
    #[error("hit time must be finite and at least EPSILON, got {0}")]
    InvalidHitTime(f64),

    /// A primitive id does not belong to the scene.
    #[error("primitive {0} is not part of the scene")]
    UnknownPrimitive(PrimitiveId),

    /// Grid parameters failed validation.
    #[error("invalid grid parameters: {0}")]
    InvalidParams(&'static str),

    /// A primitive could not answer a geometry request.
    #[error(transparent)]
    Geometry(#[from] GeometryError),
}

/// Errors raised by primitives for geometry features they do not provide.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum GeometryError {
    /// The primitive kind does not implement the requested feature.
    #[error("{feature} is not supported for {kind:?} primitives")]
    NotSupported {
        /// Kind of the primitive that was asked.
        kind: PrimitiveKind,
        /// Name of the missing feature.
        feature: &'static str,
    },
}

/// Result type for acceleration structure operations.
pub type AccelResult<T> = std::result::Result<T, AccelError>;
