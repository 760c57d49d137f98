//! Planar geometry helpers shared by the engines.
//!
//! All inputs are expected in metric coordinates.

use std::f64::consts::TAU;

use geo::{BooleanOps, Coord, Line, LineString, MultiLineString, MultiPolygon, Polygon};

/// Vertices used to approximate a full circle
pub const CIRCLE_SEGMENTS: usize = 64;

/// Euclidean length of a polyline
pub fn planar_length(line: &LineString) -> f64 {
    line.lines().map(segment_length).sum()
}

/// Offset from a carrier line within which a segment is taken to lie on it
pub const COLLINEAR_TOLERANCE_M: f64 = 1e-6;

/// Length of ground covered by `segments`, counting a stretch once however
/// many segments retrace it.
///
/// Segments are grouped by the straight line they lie on; within each group
/// the spans are projected onto that line and merged.
pub fn covered_length(segments: impl IntoIterator<Item = Line>) -> f64 {
    let mut carriers: Vec<Carrier> = Vec::new();

    for segment in segments {
        let length = segment_length(segment);
        if length == 0.0 || !length.is_finite() {
            continue;
        }

        let index = match carriers.iter().position(|c| c.supports(segment)) {
            Some(i) => i,
            None => {
                carriers.push(Carrier::along(segment, length));
                carriers.len() - 1
            }
        };
        carriers[index].add(segment);
    }

    carriers.iter_mut().map(Carrier::covered).sum()
}

/// Length of every part of a multi-polyline, overlapping parts counted once
pub fn multi_covered_length(lines: &MultiLineString) -> f64 {
    covered_length(lines.iter().flat_map(|line| line.lines()))
}

/// A straight line with the spans of the segments found on it, measured in
/// units of the first segment's length
struct Carrier {
    origin: Coord,
    delta: Coord,
    length: f64,
    spans: Vec<(f64, f64)>,
}

impl Carrier {
    fn along(segment: Line, length: f64) -> Self {
        Self {
            origin: segment.start,
            delta: segment.delta(),
            length,
            spans: Vec::new(),
        }
    }

    fn offset(&self, point: Coord) -> f64 {
        let (px, py) = (point.x - self.origin.x, point.y - self.origin.y);
        (self.delta.x * py - self.delta.y * px) / self.length
    }

    fn position(&self, point: Coord) -> f64 {
        let (px, py) = (point.x - self.origin.x, point.y - self.origin.y);
        (self.delta.x * px + self.delta.y * py) / (self.length * self.length)
    }

    fn supports(&self, segment: Line) -> bool {
        self.offset(segment.start).abs() <= COLLINEAR_TOLERANCE_M
            && self.offset(segment.end).abs() <= COLLINEAR_TOLERANCE_M
    }

    fn add(&mut self, segment: Line) {
        let a = self.position(segment.start);
        let b = self.position(segment.end);
        self.spans.push((a.min(b), a.max(b)));
    }

    fn covered(&mut self) -> f64 {
        self.spans.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut total = 0.0;
        let mut current: Option<(f64, f64)> = None;
        for &(start, end) in &self.spans {
            current = match current {
                Some((lo, hi)) if start <= hi => Some((lo, hi.max(end))),
                Some((lo, hi)) => {
                    total += hi - lo;
                    Some((start, end))
                }
                None => Some((start, end)),
            };
        }
        if let Some((lo, hi)) = current {
            total += hi - lo;
        }

        total * self.length
    }
}

pub fn segment_length(segment: Line) -> f64 {
    segment.dx().hypot(segment.dy())
}

/// Regular polygon inscribed in the circle of `radius` around `center`
pub fn circle_polygon(center: Coord, radius: f64) -> Polygon {
    let mut ring: Vec<Coord> = (0..CIRCLE_SEGMENTS)
        .map(|i| {
            let angle = TAU * i as f64 / CIRCLE_SEGMENTS as f64;
            Coord {
                x: center.x + radius * angle.cos(),
                y: center.y + radius * angle.sin(),
            }
        })
        .collect();
    ring.push(ring[0]);

    Polygon::new(LineString::new(ring), vec![])
}

/// Rectangle covering every point within `radius` of the segment, squared off
/// at both ends. Returns `None` for zero-length segments.
pub fn segment_rectangle(segment: Line, radius: f64) -> Option<Polygon> {
    let length = segment_length(segment);
    if length == 0.0 || !length.is_finite() {
        return None;
    }

    // Left-hand unit normal scaled to the radius
    let nx = -segment.dy() / length * radius;
    let ny = segment.dx() / length * radius;

    let (a, b) = (segment.start, segment.end);
    let ring = vec![
        Coord { x: a.x - nx, y: a.y - ny },
        Coord { x: b.x - nx, y: b.y - ny },
        Coord { x: b.x + nx, y: b.y + ny },
        Coord { x: a.x + nx, y: a.y + ny },
        Coord { x: a.x - nx, y: a.y - ny },
    ];

    Some(Polygon::new(LineString::new(ring), vec![]))
}

/// Union all polygons into a single MultiPolygon.
///
/// Unions pairwise in rounds so intermediate geometries stay balanced rather
/// than growing one large accumulator.
pub fn union_all(polygons: Vec<Polygon>) -> MultiPolygon {
    log::debug!("Unioning {} polygons", polygons.len());

    let mut current: Vec<MultiPolygon> = polygons
        .into_iter()
        .map(|p| MultiPolygon::new(vec![p]))
        .collect();

    while current.len() > 1 {
        let mut next = Vec::with_capacity(current.len().div_ceil(2));
        let mut pieces = current.into_iter();
        while let Some(a) = pieces.next() {
            match pieces.next() {
                Some(b) => next.push(a.union(&b)),
                None => next.push(a),
            }
        }
        current = next;
    }

    current.pop().unwrap_or_else(|| MultiPolygon::new(vec![]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geo::{coord, line_string, Area};

    #[test]
    fn test_planar_length() {
        let line = line_string![(x: 0.0, y: 0.0), (x: 3.0, y: 4.0), (x: 3.0, y: 10.0)];
        assert_relative_eq!(planar_length(&line), 11.0);
        assert_relative_eq!(planar_length(&LineString::new(vec![])), 0.0);
    }

    #[test]
    fn test_covered_length_merges_retraced_stretches() {
        let segment = |x0: f64, y0: f64, x1: f64, y1: f64| Line::new(coord! { x: x0, y: y0 }, coord! { x: x1, y: y1 });

        // Out and back along one road
        let loop_back = [segment(0.0, 0.0, 1000.0, 0.0), segment(1000.0, 0.0, 0.0, 0.0)];
        assert_relative_eq!(covered_length(loop_back), 1000.0);

        // Partial overlap, split pieces and a separate perpendicular leg
        let mixed = [
            segment(0.0, 0.0, 600.0, 0.0),
            segment(400.0, 0.0, 1000.0, 0.0),
            segment(1200.0, 0.0, 1300.0, 0.0),
            segment(0.0, 0.0, 0.0, 500.0),
            segment(5.0, 5.0, 5.0, 5.0),
        ];
        assert_relative_eq!(covered_length(mixed), 1000.0 + 100.0 + 500.0, epsilon = 1e-9);

        // Parallel roads are separate ground
        let parallel = [segment(0.0, 0.0, 100.0, 0.0), segment(0.0, 10.0, 100.0, 10.0)];
        assert_relative_eq!(covered_length(parallel), 200.0);
    }

    #[test]
    fn test_circle_polygon_area() {
        let circle = circle_polygon(coord! { x: 10.0, y: 10.0 }, 100.0);
        // Inscribed 64-gon: n/2 * r^2 * sin(2pi/n)
        let expected = 32.0 * 100.0 * 100.0 * (TAU / 64.0).sin();
        assert_relative_eq!(circle.unsigned_area(), expected, max_relative = 1e-9);
    }

    #[test]
    fn test_segment_rectangle() {
        let segment = Line::new(coord! { x: 0.0, y: 0.0 }, coord! { x: 100.0, y: 0.0 });
        let rect = segment_rectangle(segment, 10.0).unwrap();
        assert_relative_eq!(rect.unsigned_area(), 2000.0, max_relative = 1e-9);

        let point = Line::new(coord! { x: 1.0, y: 1.0 }, coord! { x: 1.0, y: 1.0 });
        assert!(segment_rectangle(point, 10.0).is_none());
    }

    #[test]
    fn test_union_all() {
        let a = segment_rectangle(Line::new(coord! { x: 0.0, y: 0.0 }, coord! { x: 2.0, y: 0.0 }), 1.0).unwrap();
        let b = segment_rectangle(Line::new(coord! { x: 1.0, y: 0.0 }, coord! { x: 3.0, y: 0.0 }), 1.0).unwrap();
        let c = segment_rectangle(Line::new(coord! { x: 10.0, y: 0.0 }, coord! { x: 11.0, y: 0.0 }), 1.0).unwrap();

        let result = union_all(vec![a, b, c]);

        // Overlapping pair merges, the far one stays separate
        assert_eq!(result.0.len(), 2);
        assert_relative_eq!(result.unsigned_area(), 8.0, max_relative = 1e-6);
        assert!(union_all(vec![]).0.is_empty());
    }
}
