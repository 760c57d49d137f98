//! Bus route / rail corridor overlap.
//!
//! A route is a line, so its intersection with a corridor polygon is itself a
//! (possibly empty) set of lines; the overlap length is the ground those
//! pieces cover, a retraced stretch counted once, and the percentage is taken
//! against the full route length.

use std::collections::HashSet;

use geo::{BooleanOps, LineString, MultiLineString, MultiPolygon};

use crate::corridor::{build_corridor, Corridor};
use crate::dataset::Dataset;
use crate::geometry::{multi_covered_length, planar_length};
use crate::identifiers::*;
use crate::models::types::*;
use crate::params::{RankBy, RouteFilter};
use crate::path::ProjectedPath;

/// Length and share of a route lying inside a corridor
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct OverlapMeasure {
    pub length_m: f64,
    pub percentage: f64,
}

/// One row of an overlap table
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct OverlapResult {
    pub line: LineCode,
    pub route: RouteKey,
    pub length_m: f64,
    pub percentage: f64,
}

/// Measure how much of `route_metric` lies inside `corridor`.
///
/// Zero-length routes and empty intersections both give `(0, 0)`. A route
/// that runs out and back along the same road inside the corridor has that
/// road counted once, against its full out-and-back length.
pub fn compute_overlap(route_metric: &LineString, corridor: &Corridor) -> OverlapMeasure {
    compute_polygon_overlap(route_metric, &corridor.polygon)
}

fn compute_polygon_overlap(route_metric: &LineString, polygon: &MultiPolygon) -> OverlapMeasure {
    let route_length = planar_length(route_metric);
    if route_length == 0.0 || polygon.0.is_empty() {
        return OverlapMeasure::default();
    }

    let inside = polygon.clip(&MultiLineString::new(vec![route_metric.clone()]), false);
    let length_m = multi_covered_length(&inside);

    OverlapMeasure {
        length_m,
        percentage: length_m / route_length * 100.0,
    }
}

/// Sort descending, keep the first row per service, truncate to `top_n`.
///
/// Rows with equal keys keep their input order, so when several lines are
/// evaluated the earlier line wins a tie.
pub fn rank_routes(mut results: Vec<OverlapResult>, top_n: usize, rank_by: RankBy) -> Vec<OverlapResult> {
    match rank_by {
        RankBy::Length => results.sort_by(|a, b| b.length_m.total_cmp(&a.length_m)),
        RankBy::Percentage => results.sort_by(|a, b| b.percentage.total_cmp(&a.percentage)),
    }

    let mut seen = HashSet::new();
    results
        .into_iter()
        .filter(|r| seen.insert(r.route.service.clone()))
        .take(top_n)
        .collect()
}

/// Keep only rows whose service is in `services`, preserving order
pub fn select_services(results: &[OverlapResult], services: &[ServiceIdentifier]) -> Vec<OverlapResult> {
    let wanted: HashSet<&ServiceIdentifier> = services.iter().collect();
    results
        .iter()
        .filter(|r| wanted.contains(&r.route.service))
        .cloned()
        .collect()
}

/// A selected rail line with its corridor, in both coordinate systems
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct LineCorridor {
    pub line: LineCode,
    pub path: ProjectedPath,
    pub corridor: Corridor,
    /// Corridor outline in longitude / latitude
    pub geographic: MultiPolygon,
}

/// Every route measured against every selected line
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct OverlapReport {
    pub corridors: Vec<LineCorridor>,
    /// One row per (line, route), lines in selection order
    pub results: Vec<OverlapResult>,
}

impl OverlapReport {
    pub fn ranked(&self, top_n: usize, rank_by: RankBy) -> Vec<OverlapResult> {
        rank_routes(self.results.clone(), top_n, rank_by)
    }

    /// The ranked table narrowed to `services`, or all of it when none are given
    pub fn selected(&self, top_n: usize, rank_by: RankBy, services: &[ServiceIdentifier]) -> Vec<OverlapResult> {
        let ranked = self.ranked(top_n, rank_by);
        if services.is_empty() {
            ranked
        } else {
            select_services(&ranked, services)
        }
    }
}

/// Measure every plottable route passing `filter` against each line's corridor.
///
/// Each line is buffered on its own and every result is tagged with its line,
/// so the combined set can be ranked across lines.
pub fn line_overlaps(
    dataset: &Dataset,
    lines: &[LineCode],
    radius_m: f64,
    filter: RouteFilter,
) -> Result<OverlapReport> {
    let mut report = OverlapReport::default();

    for code in lines {
        let line = dataset.line(code)?;
        let path = line.projected_path()?;
        let corridor = build_corridor(code.clone(), &path.metric, radius_m)?;

        let before = report.results.len();
        for route in dataset.plottable_routes(filter) {
            let Some(route_path) = &route.path else {
                continue;
            };
            let measure = compute_overlap(&route_path.metric, &corridor);
            report.results.push(OverlapResult {
                line: code.clone(),
                route: route.key.clone(),
                length_m: measure.length_m,
                percentage: measure.percentage,
            });
        }

        log::info!(
            "Line {}: {} routes measured against {} m corridor",
            code,
            report.results.len() - before,
            radius_m
        );

        report.corridors.push(LineCorridor {
            line: code.clone(),
            path: path.clone(),
            geographic: corridor.to_geographic(dataset.projection()),
            corridor,
        });
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::tests::sample_dataset;
    use approx::assert_relative_eq;
    use geo::line_string;

    fn corridor_along(path: LineString, radius_m: f64) -> Corridor {
        build_corridor(LineCode::new("TE"), &path, radius_m).unwrap()
    }

    fn result(service: &str, line: &str, length_m: f64, percentage: f64) -> OverlapResult {
        OverlapResult {
            line: LineCode::new(line),
            route: RouteKey::new(service, Direction::Outbound),
            length_m,
            percentage,
        }
    }

    #[test]
    fn test_route_fully_inside_corridor() {
        // Three stops on a straight 1000 m line
        let route = line_string![(x: 0.0, y: 0.0), (x: 500.0, y: 0.0), (x: 1000.0, y: 0.0)];
        let corridor = corridor_along(line_string![(x: -500.0, y: 0.0), (x: 1500.0, y: 0.0)], 400.0);

        let measure = compute_overlap(&route, &corridor);
        assert_relative_eq!(measure.length_m, 1000.0, epsilon = 1e-3);
        assert_relative_eq!(measure.percentage, 100.0, epsilon = 1e-4);
    }

    #[test]
    fn test_route_outside_corridor() {
        let route = line_string![(x: 0.0, y: 5000.0), (x: 1000.0, y: 5000.0)];
        let corridor = corridor_along(line_string![(x: 0.0, y: 0.0), (x: 1000.0, y: 0.0)], 400.0);

        assert_eq!(compute_overlap(&route, &corridor), OverlapMeasure::default());
    }

    #[test]
    fn test_zero_length_route() {
        let route = line_string![(x: 10.0, y: 0.0), (x: 10.0, y: 0.0)];
        let corridor = corridor_along(line_string![(x: 0.0, y: 0.0), (x: 1000.0, y: 0.0)], 400.0);

        let measure = compute_overlap(&route, &corridor);
        assert_eq!(measure.length_m, 0.0);
        assert_eq!(measure.percentage, 0.0);
    }

    #[test]
    fn test_partial_overlap() {
        // Crosses the corridor at right angles: 200 m of 1000 m inside
        let crossing = line_string![(x: 500.0, y: -500.0), (x: 500.0, y: 500.0)];
        let corridor = corridor_along(line_string![(x: 0.0, y: 0.0), (x: 1000.0, y: 0.0)], 100.0);

        let measure = compute_overlap(&crossing, &corridor);
        assert_relative_eq!(measure.length_m, 200.0, epsilon = 1e-3);
        assert_relative_eq!(measure.percentage, 20.0, epsilon = 1e-4);

        // Runs past the flat end of the corridor
        let along = line_string![(x: 0.0, y: 0.0), (x: 2000.0, y: 0.0)];
        let measure = compute_overlap(&along, &corridor);
        assert_relative_eq!(measure.percentage, 50.0, epsilon = 1e-4);
    }

    #[test]
    fn test_out_and_back_route_counts_road_once() {
        let route = line_string![(x: 0.0, y: 0.0), (x: 1000.0, y: 0.0), (x: 0.0, y: 0.0)];
        let corridor = corridor_along(line_string![(x: -500.0, y: 0.0), (x: 1500.0, y: 0.0)], 400.0);

        let measure = compute_overlap(&route, &corridor);
        assert_relative_eq!(measure.length_m, 1000.0, epsilon = 1e-3);
        assert_relative_eq!(measure.percentage, 50.0, epsilon = 1e-4);
    }

    #[test]
    fn test_percentage_bounds() {
        let corridor = corridor_along(line_string![(x: 0.0, y: 0.0), (x: 1000.0, y: 0.0), (x: 1000.0, y: 1000.0)], 250.0);
        let routes = [
            line_string![(x: -300.0, y: 100.0), (x: 1200.0, y: 100.0)],
            line_string![(x: 0.0, y: 0.0), (x: 1000.0, y: 1000.0)],
            line_string![(x: 900.0, y: -900.0), (x: 900.0, y: 900.0), (x: 2000.0, y: 900.0)],
            line_string![(x: 3000.0, y: 3000.0), (x: 3100.0, y: 3000.0)],
        ];

        for route in &routes {
            let measure = compute_overlap(route, &corridor);
            assert!(measure.percentage >= 0.0);
            assert!(measure.percentage <= 100.0 + 1e-6, "got {}", measure.percentage);
        }
    }

    #[test]
    fn test_rank_routes_dedupes_and_truncates() {
        let results = vec![
            result("36", "TE", 1500.0, 30.0),
            result("67", "TE", 2500.0, 50.0),
            result("36", "DT", 3000.0, 60.0),
            result("961", "DT", 100.0, 90.0),
            result("5", "TE", 0.0, 0.0),
        ];

        let ranked = rank_routes(results.clone(), 10, RankBy::Length);
        let rows: Vec<(String, String)> = ranked
            .iter()
            .map(|r| (r.route.service.to_string(), r.line.to_string()))
            .collect();
        assert_eq!(
            rows,
            [
                ("36".to_string(), "DT".to_string()),
                ("67".to_string(), "TE".to_string()),
                ("961".to_string(), "DT".to_string()),
                ("5".to_string(), "TE".to_string()),
            ]
        );
        assert!(ranked.windows(2).all(|w| w[0].length_m >= w[1].length_m));

        let top2 = rank_routes(results.clone(), 2, RankBy::Length);
        assert_eq!(top2.len(), 2);

        let by_pct = rank_routes(results, 1, RankBy::Percentage);
        assert_eq!(by_pct[0].route.service.as_str(), "961");
    }

    #[test]
    fn test_rank_ties_keep_input_order() {
        let results = vec![result("36", "TE", 1000.0, 50.0), result("36", "DT", 1000.0, 50.0)];
        let ranked = rank_routes(results, 10, RankBy::Length);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].line.as_str(), "TE");
    }

    #[test]
    fn test_select_services() {
        let results = vec![result("36", "TE", 1.0, 1.0), result("67", "TE", 1.0, 1.0), result("961", "DT", 1.0, 1.0)];
        let selected = select_services(&results, &[ServiceIdentifier::new("961"), ServiceIdentifier::new("36")]);
        let services: Vec<&str> = selected.iter().map(|r| r.route.service.as_str()).collect();
        assert_eq!(services, ["36", "961"]);
    }

    #[test]
    fn test_line_overlaps_across_lines() {
        let dataset = sample_dataset();
        let lines = [LineCode::new("TE"), LineCode::new("DT")];

        let report = line_overlaps(&dataset, &lines, 100.0, RouteFilter::TrunkOnly).unwrap();

        // 4 plottable trunk routes against 2 lines
        assert_eq!(report.results.len(), 8);
        assert_eq!(report.corridors.len(), 2);
        assert!(report.results.iter().all(|r| r.route.service.as_str() != "36A"));

        let ranked = report.ranked(10, RankBy::Length);
        let services: Vec<&str> = ranked.iter().map(|r| r.route.service.as_str()).collect();
        assert_eq!(services, ["36", "67", "961"]);

        assert!(ranked[0].percentage > 99.0);
        assert_eq!(ranked[2].line.as_str(), "DT");
        assert_relative_eq!(ranked[2].percentage, 25.0, epsilon = 0.5);
    }

    #[test]
    fn test_selection_narrows_the_ranked_table() {
        let dataset = sample_dataset();
        let lines = [LineCode::new("TE"), LineCode::new("DT")];
        let report = line_overlaps(&dataset, &lines, 100.0, RouteFilter::TrunkOnly).unwrap();
        let wanted = [ServiceIdentifier::new("961"), ServiceIdentifier::new("36")];

        // One row per service, in ranking order, even though 36 runs both ways on both lines
        let rows = report.selected(10, RankBy::Length, &wanted);
        let picked: Vec<(&str, &str)> = rows.iter().map(|r| (r.route.service.as_str(), r.line.as_str())).collect();
        assert_eq!(picked, [("36", "TE"), ("961", "DT")]);

        // Services outside the top N stay out
        let rows = report.selected(2, RankBy::Length, &wanted);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].route.service.as_str(), "36");

        assert_eq!(report.selected(10, RankBy::Length, &[]), report.ranked(10, RankBy::Length));
    }

    #[test]
    fn test_line_overlaps_errors() {
        let dataset = sample_dataset();

        assert!(matches!(
            line_overlaps(&dataset, &[LineCode::new("XX")], 400.0, RouteFilter::All),
            Err(AnalysisError::LineNotFound(_))
        ));
        assert!(matches!(
            line_overlaps(&dataset, &[LineCode::new("CG")], 400.0, RouteFilter::All),
            Err(AnalysisError::NotPlottable { .. })
        ));
        assert!(matches!(
            line_overlaps(&dataset, &[LineCode::new("TE")], 0.0, RouteFilter::All),
            Err(AnalysisError::InvalidParameter { .. })
        ));
    }
}
