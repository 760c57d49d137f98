//! R-tree nodes for spatial indexing.
//!
//! All nodes hold metric coordinates. The R-tree only narrows candidates by
//! bounding box; exact tests (polygon containment, collinearity) run on the
//! candidates it returns.

use geo::{BoundingRect, Line, Point, Polygon};
use rstar::{RTreeObject, AABB};

// ============================================================================
// Buffer Polygon Node
// ============================================================================

/// A buffer polygon around one station
#[derive(Clone, Debug)]
pub struct BufferNode {
    /// Index of the station the buffer belongs to
    pub station: usize,
    pub polygon: Polygon,
    aabb: AABB<[f64; 2]>,
}

impl BufferNode {
    /// Returns `None` for an empty polygon
    pub fn new(station: usize, polygon: Polygon) -> Option<Self> {
        let rect = polygon.bounding_rect()?;
        let aabb = AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]);

        Some(Self {
            station,
            polygon,
            aabb,
        })
    }
}

impl RTreeObject for BufferNode {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.aabb
    }
}

// ============================================================================
// Path Segment Node
// ============================================================================

/// One segment of a metric path
#[derive(Clone, Copy, Debug)]
pub struct SegmentNode {
    pub segment: Line,
    aabb: AABB<[f64; 2]>,
}

impl SegmentNode {
    pub fn new(segment: Line) -> Self {
        let start = [segment.start.x, segment.start.y];
        let end = [segment.end.x, segment.end.y];

        Self {
            segment,
            aabb: AABB::from_corners(start, end),
        }
    }
}

impl RTreeObject for SegmentNode {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.aabb
    }
}

/// Envelope of a single point, for point-in-envelope queries
pub fn point_envelope(point: Point) -> AABB<[f64; 2]> {
    AABB::from_point([point.x(), point.y()])
}
