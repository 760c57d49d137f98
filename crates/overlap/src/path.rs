//! Ordered paths for bus routes and rail lines.
//!
//! Bus stop tables arrive unordered and mixed across services; station tables
//! only order themselves through the ordinal in each station code. The
//! builders here sort records into polylines and refuse anything with fewer
//! than two points, so callers never hand a degenerate geometry downstream.

use std::collections::{BTreeMap, HashMap};

use geo::{Coord, LineString};

use crate::identifiers::LineCode;
use crate::models::types::*;
use crate::projection::Projection;

/// Points needed before a sequence of records forms a path
pub const MIN_PATH_POINTS: usize = 2;

/// Build the polyline of one route (one service, one direction).
///
/// Stops are ordered by sequence index; equal indices keep their input order.
pub fn build_route_path(stops: &[StopRecord]) -> Result<LineString> {
    let Some(first) = stops.first() else {
        return Err(AnalysisError::NotPlottable {
            what: "Route".into(),
            points: 0,
        });
    };

    let key = first.route_key();
    if let Some(other) = stops.iter().find(|s| s.service != key.service || s.direction != key.direction) {
        return Err(AnalysisError::InvalidData(format!(
            "Stops of {} mixed into route {}",
            other.route_key(),
            key
        )));
    }

    if stops.len() < MIN_PATH_POINTS {
        return Err(AnalysisError::NotPlottable {
            what: format!("Route {key}"),
            points: stops.len(),
        });
    }

    let mut ordered: Vec<&StopRecord> = stops.iter().collect();
    ordered.sort_by_key(|s| s.sequence);

    Ok(ordered.iter().map(|s| Coord::from(s.location)).collect())
}

/// Build the polyline of one rail line, ordered by station ordinal.
pub fn build_line_path(stations: &[StationRecord]) -> Result<LineString> {
    let Some(first) = stations.first() else {
        return Err(AnalysisError::NotPlottable {
            what: "Line".into(),
            points: 0,
        });
    };

    if let Some(other) = stations.iter().find(|s| s.line != first.line) {
        return Err(AnalysisError::InvalidData(format!(
            "Station {} mixed into line {}",
            other.code, first.line
        )));
    }

    if stations.len() < MIN_PATH_POINTS {
        return Err(AnalysisError::NotPlottable {
            what: format!("Line {}", first.line),
            points: stations.len(),
        });
    }

    let mut ordered: Vec<&StationRecord> = stations.iter().collect();
    ordered.sort_by_key(|s| s.ordinal);

    Ok(ordered.iter().map(|s| Coord::from(s.location)).collect())
}

/// Split a stop table into per-route groups, in order of first appearance.
pub fn group_route_stops(stops: impl IntoIterator<Item = StopRecord>) -> Vec<(RouteKey, Vec<StopRecord>)> {
    let mut index: HashMap<RouteKey, usize> = HashMap::new();
    let mut groups: Vec<(RouteKey, Vec<StopRecord>)> = Vec::new();

    for stop in stops {
        let key = stop.route_key();
        let slot = *index.entry(key.clone()).or_insert_with(|| {
            groups.push((key, Vec::new()));
            groups.len() - 1
        });
        groups[slot].1.push(stop);
    }

    groups
}

/// Split a station table into lines, keyed by exact line code.
pub fn group_line_stations(
    stations: impl IntoIterator<Item = StationRecord>,
) -> BTreeMap<LineCode, Vec<StationRecord>> {
    let mut lines: BTreeMap<LineCode, Vec<StationRecord>> = BTreeMap::new();
    for station in stations {
        lines.entry(station.line.clone()).or_default().push(station);
    }
    lines
}

/// A path held in both coordinate systems
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ProjectedPath {
    /// Longitude / latitude, for display
    pub geographic: LineString,
    /// UTM metres, for measurement
    pub metric: LineString,
}

impl ProjectedPath {
    pub fn new(geographic: LineString, projection: &impl Projection) -> Self {
        let metric = projection.to_metric(&geographic);
        Self { geographic, metric }
    }

    /// Length in metres
    pub fn length_m(&self) -> f64 {
        crate::geometry::planar_length(&self.metric)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{coord, point};

    fn stop(service: &str, direction: Direction, sequence: u32, x: f64, y: f64) -> StopRecord {
        StopRecord::new(service, direction, sequence, point!(x: x, y: y))
    }

    fn station(code: &str, x: f64, y: f64) -> StationRecord {
        StationRecord::from_code(code, point!(x: x, y: y)).unwrap()
    }

    #[test]
    fn test_route_path_sorted_by_sequence() {
        let stops = vec![
            stop("36", Direction::Outbound, 3, 3.0, 0.0),
            stop("36", Direction::Outbound, 1, 1.0, 0.0),
            stop("36", Direction::Outbound, 2, 2.0, 0.0),
        ];

        let path = build_route_path(&stops).unwrap();
        let xs: Vec<f64> = path.coords().map(|c| c.x).collect();
        assert_eq!(xs, [1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_route_path_ties_keep_input_order() {
        let stops = vec![
            stop("36", Direction::Outbound, 1, 0.0, 0.0),
            stop("36", Direction::Outbound, 2, 5.0, 0.0),
            stop("36", Direction::Outbound, 2, 6.0, 0.0),
        ];

        let path = build_route_path(&stops).unwrap();
        assert_eq!(path.0[1], coord! { x: 5.0, y: 0.0 });
        assert_eq!(path.0[2], coord! { x: 6.0, y: 0.0 });
    }

    #[test]
    fn test_single_stop_route_is_not_plottable() {
        let stops = vec![stop("36", Direction::Outbound, 1, 0.0, 0.0)];
        assert!(matches!(
            build_route_path(&stops),
            Err(AnalysisError::NotPlottable { points: 1, .. })
        ));
        assert!(matches!(
            build_route_path(&[]),
            Err(AnalysisError::NotPlottable { points: 0, .. })
        ));
    }

    #[test]
    fn test_mixed_route_is_rejected() {
        let stops = vec![
            stop("36", Direction::Outbound, 1, 0.0, 0.0),
            stop("36", Direction::Inbound, 2, 1.0, 0.0),
        ];
        assert!(matches!(build_route_path(&stops), Err(AnalysisError::InvalidData(_))));
    }

    #[test]
    fn test_line_path_sorted_by_ordinal() {
        let stations = vec![
            station("TE10", 10.0, 0.0),
            station("TE2", 2.0, 0.0),
            station("TE1", 1.0, 0.0),
        ];

        let path = build_line_path(&stations).unwrap();
        let xs: Vec<f64> = path.coords().map(|c| c.x).collect();
        // Numeric, not lexicographic: TE2 comes before TE10
        assert_eq!(xs, [1.0, 2.0, 10.0]);
    }

    #[test]
    fn test_one_station_line_is_excluded() {
        let stations = vec![station("CG1", 0.0, 0.0)];
        assert!(matches!(
            build_line_path(&stations),
            Err(AnalysisError::NotPlottable { points: 1, .. })
        ));
    }

    #[test]
    fn test_grouping() {
        let stops = vec![
            stop("67", Direction::Outbound, 1, 0.0, 0.0),
            stop("36", Direction::Outbound, 1, 0.0, 0.0),
            stop("67", Direction::Outbound, 2, 0.0, 0.0),
            stop("67", Direction::Inbound, 1, 0.0, 0.0),
        ];
        let groups = group_route_stops(stops);
        let keys: Vec<String> = groups.iter().map(|(k, _)| k.to_string()).collect();
        assert_eq!(keys, ["67 (direction 1)", "36 (direction 1)", "67 (direction 2)"]);
        assert_eq!(groups[0].1.len(), 2);

        let lines = group_line_stations(vec![
            station("TE1", 0.0, 0.0),
            station("CC1", 0.0, 0.0),
            station("TE2", 0.0, 0.0),
        ]);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[&LineCode::new("TE")].len(), 2);
    }
}
