//! Grid cell size selection.
//!
//! The cell edge length is a policy decision: a [`DimensionEvaluator`] looks at
//! the box-size distribution of one bucket and returns a scalar.
//! [`MeanSizeEvaluator`] is the default policy.

use std::fmt;

use crate::bounds::BoundingBox;
use crate::error::{AccelError, AccelResult};

/// Which box measure the evaluator averages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Averaging {
    /// Mean of the largest extent of each box.
    #[default]
    MaxExtent,
    /// Mean of the mean extent of each box.
    AverageExtent,
    /// Mean of the cube root of each box volume.
    VolumeRoot,
    /// Median of the largest extent of each box.
    MedianMaxExtent,
}

/// Policy that picks a cell edge length for a set of boxes.
pub trait DimensionEvaluator: fmt::Debug + Send + Sync {
    /// Raw cell dimension for `boxes`. May return a non-positive or
    /// non-finite value for an empty slice; callers validate.
    fn evaluate(&self, boxes: &[BoundingBox], averaging: Averaging) -> f64;
}

/// Averages a size measure over all boxes.
#[derive(Debug, Clone, Copy, Default)]
pub struct MeanSizeEvaluator;

impl DimensionEvaluator for MeanSizeEvaluator {
    #[allow(clippy::cast_precision_loss)]
    fn evaluate(&self, boxes: &[BoundingBox], averaging: Averaging) -> f64 {
        if boxes.is_empty() {
            return 0.0;
        }
        let n = boxes.len() as f64;
        match averaging {
            Averaging::MaxExtent => boxes.iter().map(BoundingBox::max_extent).sum::<f64>() / n,
            Averaging::AverageExtent => {
                boxes.iter().map(BoundingBox::average_extent).sum::<f64>() / n
            }
            Averaging::VolumeRoot => boxes.iter().map(|b| b.volume().cbrt()).sum::<f64>() / n,
            Averaging::MedianMaxExtent => {
                let mut extents: Vec<f64> = boxes.iter().map(BoundingBox::max_extent).collect();
                extents.sort_by(f64::total_cmp);
                let mid = extents.len() / 2;
                if extents.len() % 2 == 0 {
                    (extents[mid - 1] + extents[mid]) * 0.5
                } else {
                    extents[mid]
                }
            }
        }
    }
}

/// Evaluates and scales a cell dimension, rejecting unusable values.
///
/// # Errors
///
/// Returns [`AccelError::InvalidDimension`] if the scaled result is not
/// positive and finite.
pub fn cell_dimension(
    evaluator: &dyn DimensionEvaluator,
    boxes: &[BoundingBox],
    averaging: Averaging,
    scale: f64,
) -> AccelResult<f64> {
    let dimension = evaluator.evaluate(boxes, averaging) * scale;
    if dimension.is_finite() && dimension > 0.0 {
        Ok(dimension)
    } else {
        Err(AccelError::InvalidDimension(dimension))
    }
}
