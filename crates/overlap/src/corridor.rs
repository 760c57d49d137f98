//! Rail corridors: rail line paths dilated by a buffer radius.
//!
//! Each segment becomes a rectangle (flat caps at the line ends) and every
//! interior vertex gets a disc (round joins). The pieces are unioned so that
//! overlapping parts of the corridor are only counted once.

use geo::{Area, LineString, MultiPolygon, Polygon};

use crate::geometry::{circle_polygon, segment_rectangle, union_all};
use crate::identifiers::LineCode;
use crate::models::types::*;
use crate::params::validate_radius;
use crate::projection::Projection;

/// A buffered rail corridor in metric coordinates
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Corridor {
    /// Lines this corridor was built from
    pub lines: Vec<LineCode>,
    pub radius_m: f64,
    pub polygon: MultiPolygon,
}

impl Corridor {
    pub fn area_m2(&self) -> f64 {
        self.polygon.unsigned_area()
    }

    /// The corridor outline in longitude / latitude
    pub fn to_geographic(&self, projection: &impl Projection) -> MultiPolygon {
        projection.to_geographic(&self.polygon)
    }
}

/// Buffer one metric rail path by `radius_m`.
pub fn build_corridor(line: LineCode, path_metric: &LineString, radius_m: f64) -> Result<Corridor> {
    build_combined_corridor(vec![line], std::slice::from_ref(path_metric), radius_m)
}

/// Buffer several metric paths by `radius_m` and union them into one corridor.
pub fn build_combined_corridor(
    lines: Vec<LineCode>,
    paths_metric: &[LineString],
    radius_m: f64,
) -> Result<Corridor> {
    let radius_m = validate_radius(radius_m)?;

    let pieces: Vec<Polygon> = paths_metric
        .iter()
        .flat_map(|path| path_pieces(path, radius_m))
        .collect();

    if pieces.is_empty() {
        return Err(AnalysisError::InvalidData(format!(
            "Corridor for {} has no segment of non-zero length",
            describe(&lines)
        )));
    }

    log::debug!(
        "Building {} m corridor for {} from {} pieces",
        radius_m,
        describe(&lines),
        pieces.len()
    );

    Ok(Corridor {
        lines,
        radius_m,
        polygon: union_all(pieces),
    })
}

fn path_pieces(path: &LineString, radius_m: f64) -> Vec<Polygon> {
    let rectangles: Vec<Polygon> = path
        .lines()
        .filter_map(|segment| segment_rectangle(segment, radius_m))
        .collect();

    if rectangles.is_empty() {
        return rectangles;
    }

    // Round joins at interior vertices only; the ends stay flat
    let interior = path.0.len().saturating_sub(2);
    let joins = path.0.iter().skip(1).take(interior).map(|c| circle_polygon(*c, radius_m));

    rectangles.into_iter().chain(joins).collect()
}

fn describe(lines: &[LineCode]) -> String {
    let names: Vec<&str> = lines.iter().map(LineCode::as_str).collect();
    names.join("+")
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geo::{line_string, point, Contains};
    use std::f64::consts::PI;

    fn te() -> LineCode {
        LineCode::new("TE")
    }

    #[test]
    fn test_straight_corridor_has_flat_caps() {
        let path = line_string![(x: 0.0, y: 0.0), (x: 1000.0, y: 0.0)];
        let corridor = build_corridor(te(), &path, 100.0).unwrap();

        assert_relative_eq!(corridor.area_m2(), 200_000.0, max_relative = 1e-6);
        assert!(corridor.polygon.contains(&point!(x: 500.0, y: 99.0)));
        assert!(!corridor.polygon.contains(&point!(x: -50.0, y: 0.0)));
        assert!(!corridor.polygon.contains(&point!(x: 1050.0, y: 0.0)));
    }

    #[test]
    fn test_bent_corridor_has_round_join() {
        let path = line_string![(x: 0.0, y: 0.0), (x: 1000.0, y: 0.0), (x: 1000.0, y: 1000.0)];
        let corridor = build_corridor(te(), &path, 100.0).unwrap();

        // Outer corner of the bend, inside the join disc but outside both rectangles
        assert!(corridor.polygon.contains(&point!(x: 1060.0, y: -60.0)));
        // Square corner beyond the disc stays outside
        assert!(!corridor.polygon.contains(&point!(x: 1095.0, y: -95.0)));

        // Two rectangles sharing a 100 m square, plus the outer quarter of the join disc
        let expected = 2.0 * 200_000.0 - 100.0 * 100.0 + 0.25 * PI * 100.0 * 100.0;
        assert_relative_eq!(corridor.area_m2(), expected, max_relative = 1e-2);
    }

    #[test]
    fn test_combined_corridor_unions_disjoint_paths() {
        let a = line_string![(x: 0.0, y: 0.0), (x: 1000.0, y: 0.0)];
        let b = line_string![(x: 0.0, y: 5000.0), (x: 1000.0, y: 5000.0)];
        let c = line_string![(x: 500.0, y: 0.0), (x: 1500.0, y: 0.0)];

        let corridor = build_combined_corridor(vec![te(), LineCode::new("DT")], &[a, b, c], 50.0).unwrap();

        assert_eq!(corridor.polygon.0.len(), 2);
        // a and c overlap for 500 m, which must not be counted twice
        assert_relative_eq!(corridor.area_m2(), 1500.0 * 100.0 + 1000.0 * 100.0, max_relative = 1e-6);
    }

    #[test]
    fn test_invalid_radius_is_rejected() {
        let path = line_string![(x: 0.0, y: 0.0), (x: 1000.0, y: 0.0)];
        for radius in [0.0, -400.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                build_corridor(te(), &path, radius),
                Err(AnalysisError::InvalidParameter { name: "buffer radius", .. })
            ));
        }
    }

    #[test]
    fn test_zero_length_path_is_rejected() {
        let path = line_string![(x: 5.0, y: 5.0), (x: 5.0, y: 5.0)];
        assert!(matches!(build_corridor(te(), &path, 100.0), Err(AnalysisError::InvalidData(_))));
    }
}
