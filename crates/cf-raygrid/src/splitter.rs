//! Size-based partitioning of a scene into grid buckets.
//!
//! Primitives of very different sizes share a grid badly: a cell size that
//! suits small triangles makes a large sphere cover thousands of cells. The
//! splitter groups boxed primitives by box size so each group gets its own
//! grid, and sets aside primitives that cannot be boxed at all.

use std::fmt;
use std::str::FromStr;

use tracing::debug;

use crate::bounds::{BoundingBox, BoundingBoxBuilder};
use crate::error::AccelError;
use crate::primitive::{PrimitiveId, Scene};

/// How boxed primitives are grouped into buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SplitStrategy {
    /// A single bucket holding every boxed primitive.
    BoxAndNoBox,
    /// Smaller half and larger half by max extent.
    HalfAndHalf,
    /// Below and at-or-above the mean max extent.
    AtAverageSize,
    /// [`AtAverageSize`](Self::AtAverageSize) applied twice, up to four buckets.
    #[default]
    InFourAverageSize,
}

impl SplitStrategy {
    /// Every strategy, in code order.
    pub const ALL: [Self; 4] = [
        Self::BoxAndNoBox,
        Self::HalfAndHalf,
        Self::AtAverageSize,
        Self::InFourAverageSize,
    ];

    /// Numeric code of the strategy (0 to 3).
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::BoxAndNoBox => 0,
            Self::HalfAndHalf => 1,
            Self::AtAverageSize => 2,
            Self::InFourAverageSize => 3,
        }
    }

    /// Strategy for a numeric code.
    ///
    /// # Errors
    ///
    /// Returns [`AccelError::UnknownSplitStrategy`] for codes above 3.
    pub fn from_code(code: u8) -> Result<Self, AccelError> {
        Self::ALL
            .into_iter()
            .find(|strategy| strategy.code() == code)
            .ok_or_else(|| AccelError::UnknownSplitStrategy(code.to_string()))
    }

    /// Canonical name, as accepted by [`FromStr`].
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::BoxAndNoBox => "box-and-no-box",
            Self::HalfAndHalf => "half-and-half",
            Self::AtAverageSize => "at-average-size",
            Self::InFourAverageSize => "in-four-average-size",
        }
    }
}

impl fmt::Display for SplitStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SplitStrategy {
    type Err = AccelError;

    /// Accepts a numeric code or a name; names ignore case, `-` and `_`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(code) = trimmed.parse::<u8>() {
            return Self::from_code(code);
        }
        let key: String = trimmed
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .map(|c| c.to_ascii_lowercase())
            .collect();
        Self::ALL
            .into_iter()
            .find(|strategy| strategy.name().replace('-', "") == key)
            .ok_or_else(|| AccelError::UnknownSplitStrategy(s.to_string()))
    }
}

/// Partition of a scene into size buckets plus a no-box residual.
///
/// Every primitive of the scene lands in exactly one bucket or in
/// [`no_box_list`](Self::no_box_list). Buckets are never empty.
///
/// # Example
///
/// ```
/// use cf_raygrid::{GeometryCollectionSplitter, Scene, SplitStrategy};
/// use cf_raygrid::shapes::{Plane, Sphere};
/// use nalgebra::{Point3, Vector3};
///
/// let mut scene = Scene::new();
/// scene.insert(Sphere::new(Point3::origin(), 0.1));
/// scene.insert(Sphere::new(Point3::new(5.0, 0.0, 0.0), 3.0));
/// scene.insert(Plane::new(Point3::origin(), Vector3::z()));
///
/// let split = GeometryCollectionSplitter::new(&scene, SplitStrategy::HalfAndHalf);
/// assert_eq!(split.split_buckets().len(), 2);
/// assert_eq!(split.no_box_list().len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct GeometryCollectionSplitter {
    buckets: Vec<Vec<BoundingBox>>,
    no_box: Vec<PrimitiveId>,
}

impl GeometryCollectionSplitter {
    /// Boxes every primitive of `scene` and splits the boxes by `strategy`.
    #[must_use]
    pub fn new(scene: &Scene, strategy: SplitStrategy) -> Self {
        let mut boxed = Vec::new();
        let mut no_box = Vec::new();
        for (id, primitive) in scene.iter() {
            match BoundingBoxBuilder::build(id, primitive) {
                Some(bounds) => boxed.push(bounds),
                None => no_box.push(id),
            }
        }
        Self::from_boxes(boxed, no_box, strategy)
    }

    /// Splits already computed boxes; `no_box` is passed through unchanged.
    #[must_use]
    pub fn from_boxes(
        boxes: Vec<BoundingBox>,
        no_box: Vec<PrimitiveId>,
        strategy: SplitStrategy,
    ) -> Self {
        let boxed_count = boxes.len();
        let buckets = match strategy {
            SplitStrategy::BoxAndNoBox => non_empty(vec![boxes]),
            SplitStrategy::HalfAndHalf => half_and_half(boxes),
            SplitStrategy::AtAverageSize => at_average_size(boxes),
            SplitStrategy::InFourAverageSize => at_average_size(boxes)
                .into_iter()
                .flat_map(at_average_size)
                .collect(),
        };

        debug!(
            strategy = %strategy,
            boxed = boxed_count,
            no_box = no_box.len(),
            buckets = buckets.len(),
            "split primitive collection"
        );

        Self { buckets, no_box }
    }

    /// Size buckets, each non-empty.
    #[must_use]
    pub fn split_buckets(&self) -> &[Vec<BoundingBox>] {
        &self.buckets
    }

    /// Primitives without a bounding box.
    #[must_use]
    pub fn no_box_list(&self) -> &[PrimitiveId] {
        &self.no_box
    }

    /// Consumes the splitter, returning buckets and the no-box list.
    #[must_use]
    pub fn into_parts(self) -> (Vec<Vec<BoundingBox>>, Vec<PrimitiveId>) {
        (self.buckets, self.no_box)
    }
}

fn non_empty(buckets: Vec<Vec<BoundingBox>>) -> Vec<Vec<BoundingBox>> {
    buckets.into_iter().filter(|b| !b.is_empty()).collect()
}

fn half_and_half(mut boxes: Vec<BoundingBox>) -> Vec<Vec<BoundingBox>> {
    // Stable: equal extents keep scene order.
    boxes.sort_by(BoundingBox::cmp_max_extent);
    let upper = boxes.split_off(boxes.len() / 2);
    non_empty(vec![boxes, upper])
}

fn at_average_size(boxes: Vec<BoundingBox>) -> Vec<Vec<BoundingBox>> {
    if boxes.is_empty() {
        return Vec::new();
    }
    #[allow(clippy::cast_precision_loss)]
    let mean = boxes.iter().map(BoundingBox::max_extent).sum::<f64>() / boxes.len() as f64;
    let (below, above): (Vec<_>, Vec<_>) = boxes.into_iter().partition(|b| b.max_extent() < mean);
    non_empty(vec![below, above])
}
