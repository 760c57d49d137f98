//! In-memory bus and rail dataset.
//!
//! Built once from loaded records, then passed by reference into every
//! analysis. Paths are reconstructed and projected at build time; routes and
//! lines that cannot form a path are kept (so lookups can tell "not found"
//! from "found but not plottable") with `path: None`.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use geo::Point;

use crate::identifiers::*;
use crate::models::types::*;
use crate::params::{RouteFilter, TRUNK_CATEGORY};
use crate::path::{build_line_path, build_route_path, group_line_stations, group_route_stops, ProjectedPath};
use crate::projection::{Projection, Utm};

// ============================================================================
// Entities
// ============================================================================

#[derive(Clone, Debug)]
pub struct BusStop {
    pub record: StopRecord,
    pub metric: Point,
}

#[derive(Clone, Debug)]
pub struct BusRoute {
    pub key: RouteKey,
    pub category: Option<Arc<str>>,
    /// Ordered by stop sequence
    pub stops: Vec<BusStop>,
    pub path: Option<ProjectedPath>,
}

impl BusRoute {
    pub fn service(&self) -> &ServiceIdentifier {
        &self.key.service
    }

    pub fn is_plottable(&self) -> bool {
        self.path.is_some()
    }

    /// The route's path, or `NotPlottable` when it has fewer than two stops
    pub fn projected_path(&self) -> Result<&ProjectedPath> {
        self.path.as_ref().ok_or_else(|| AnalysisError::NotPlottable {
            what: format!("Route {}", self.key),
            points: self.stops.len(),
        })
    }

    /// Whether the route passes `filter`. With `TrunkOnly`, a route that
    /// carries a category must also be categorised `TRUNK`.
    pub fn matches(&self, filter: RouteFilter) -> bool {
        match filter {
            RouteFilter::All => true,
            RouteFilter::TrunkOnly => {
                self.key.service.is_trunk()
                    && self
                        .category
                        .as_deref()
                        .map_or(true, |c| c.trim().eq_ignore_ascii_case(TRUNK_CATEGORY))
            }
        }
    }
}

#[derive(Clone, Debug)]
pub struct RailStation {
    pub record: StationRecord,
    pub metric: Point,
}

#[derive(Clone, Debug)]
pub struct RailLine {
    pub code: LineCode,
    /// Ordered by station ordinal
    pub stations: Vec<RailStation>,
    pub path: Option<ProjectedPath>,
}

impl RailLine {
    pub fn is_plottable(&self) -> bool {
        self.path.is_some()
    }

    /// The line's path, or `NotPlottable` when it has fewer than two stations
    pub fn projected_path(&self) -> Result<&ProjectedPath> {
        self.path.as_ref().ok_or_else(|| AnalysisError::NotPlottable {
            what: format!("Line {}", self.code),
            points: self.stations.len(),
        })
    }
}

// ============================================================================
// Dataset
// ============================================================================

/// Immutable bus + rail dataset with lookups
///
/// Cloning shares the underlying routes and lines.
#[derive(Clone)]
pub struct Dataset {
    projection: Utm,

    routes: Vec<Arc<BusRoute>>,
    route_map: HashMap<RouteKey, Arc<BusRoute>>,
    service_map: HashMap<ServiceIdentifier, Vec<Arc<BusRoute>>>,

    lines: BTreeMap<LineCode, Arc<RailLine>>,
    stations: Arc<[RailStation]>,
}

impl Dataset {
    /// Build a dataset projected into UTM zone 48N
    pub fn from_records(stops: Vec<StopRecord>, stations: Vec<StationRecord>) -> Self {
        Self::with_projection(stops, stations, Utm::singapore())
    }

    pub fn with_projection(stops: Vec<StopRecord>, stations: Vec<StationRecord>, projection: Utm) -> Self {
        let routes: Vec<Arc<BusRoute>> = group_route_stops(stops)
            .into_iter()
            .map(|(key, records)| Arc::new(build_route(key, records, &projection)))
            .collect();

        let route_map: HashMap<_, _> = routes.iter().map(|r| (r.key.clone(), r.clone())).collect();

        let mut service_map: HashMap<ServiceIdentifier, Vec<Arc<BusRoute>>> = HashMap::new();
        for route in &routes {
            service_map.entry(route.key.service.clone()).or_default().push(route.clone());
        }

        let all_stations: Arc<[RailStation]> = stations
            .iter()
            .map(|record| RailStation {
                metric: projection.to_metric(&record.location),
                record: record.clone(),
            })
            .collect();

        let lines: BTreeMap<_, _> = group_line_stations(stations)
            .into_iter()
            .map(|(code, records)| {
                let line = build_line(code.clone(), records, &projection);
                (code, Arc::new(line))
            })
            .collect();

        let unplottable_routes = routes.iter().filter(|r| !r.is_plottable()).count();
        let unplottable_lines = lines.values().filter(|l| !l.is_plottable()).count();
        log::info!(
            "Loaded {} routes ({} not plottable), {} lines ({} not plottable), {} stations",
            routes.len(),
            unplottable_routes,
            lines.len(),
            unplottable_lines,
            all_stations.len()
        );

        Self {
            projection,
            routes,
            route_map,
            service_map,
            lines,
            stations: all_stations,
        }
    }

    pub fn projection(&self) -> &Utm {
        &self.projection
    }

    // ---- Routes ----

    /// Every route in order of first appearance in the stop table
    pub fn routes(&self) -> &[Arc<BusRoute>] {
        &self.routes
    }

    /// Plottable routes passing `filter`
    pub fn plottable_routes(&self, filter: RouteFilter) -> impl Iterator<Item = &Arc<BusRoute>> {
        self.routes
            .iter()
            .filter(move |r| r.is_plottable() && r.matches(filter))
    }

    /// Routes that were found but cannot form a path
    pub fn unplottable_routes(&self) -> impl Iterator<Item = &Arc<BusRoute>> {
        self.routes.iter().filter(|r| !r.is_plottable())
    }

    pub fn route(&self, key: &RouteKey) -> Result<&Arc<BusRoute>> {
        self.route_map
            .get(key)
            .ok_or_else(|| AnalysisError::RouteNotFound(key.clone()))
    }

    /// Both directions of a service, in order of first appearance
    pub fn service_routes(&self, service: &ServiceIdentifier) -> Result<&[Arc<BusRoute>]> {
        self.service_map
            .get(service)
            .map(Vec::as_slice)
            .ok_or_else(|| AnalysisError::ServiceNotFound(service.clone()))
    }

    /// Sorted, de-duplicated service numbers
    pub fn services(&self) -> Vec<ServiceIdentifier> {
        let mut services: Vec<_> = self.service_map.keys().cloned().collect();
        services.sort();
        services
    }

    // ---- Rail ----

    pub fn lines(&self) -> impl Iterator<Item = &Arc<RailLine>> {
        self.lines.values()
    }

    pub fn line(&self, code: &LineCode) -> Result<&Arc<RailLine>> {
        self.lines
            .get(code)
            .ok_or_else(|| AnalysisError::LineNotFound(code.clone()))
    }

    /// Every station of every line, in input order
    pub fn stations(&self) -> &[RailStation] {
        &self.stations
    }
}

fn build_route(key: RouteKey, mut records: Vec<StopRecord>, projection: &Utm) -> BusRoute {
    records.sort_by_key(|s| s.sequence);

    let path = match build_route_path(&records) {
        Ok(path) => Some(ProjectedPath::new(path, projection)),
        Err(e) => {
            log::debug!("Skipping path: {e}");
            None
        }
    };

    BusRoute {
        category: records.iter().find_map(|s| s.category.clone()),
        stops: records
            .into_iter()
            .map(|record| BusStop {
                metric: projection.to_metric(&record.location),
                record,
            })
            .collect(),
        key,
        path,
    }
}

fn build_line(code: LineCode, mut records: Vec<StationRecord>, projection: &Utm) -> RailLine {
    records.sort_by_key(|s| s.ordinal);

    let path = match build_line_path(&records) {
        Ok(path) => Some(ProjectedPath::new(path, projection)),
        Err(e) => {
            log::warn!("Excluding line from corridor building: {e}");
            None
        }
    };

    RailLine {
        code,
        stations: records
            .into_iter()
            .map(|record| RailStation {
                metric: projection.to_metric(&record.location),
                record,
            })
            .collect(),
        path,
    }
}
