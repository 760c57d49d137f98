//! Bus stop proximity to rail stations.
//!
//! Every station gets a circular buffer; a stop counts as "within" when it
//! touches any buffer, not just the nearest one.

use geo::{Intersects, Point, Polygon};
use rstar::RTree;

use crate::dataset::{BusStop, Dataset};
use crate::geometry::circle_polygon;
use crate::models::types::*;
use crate::params::{validate_radius, RouteFilter};
use crate::projection::Projection;
use crate::spatial::{point_envelope, BufferNode};

/// Circular buffers around a set of stations, in metric coordinates
pub struct StationBuffers {
    radius_m: f64,
    tree: RTree<BufferNode>,
}

impl StationBuffers {
    pub fn new(stations_metric: &[Point], radius_m: f64) -> Result<Self> {
        let radius_m = validate_radius(radius_m)?;

        let nodes: Vec<BufferNode> = stations_metric
            .iter()
            .enumerate()
            .filter_map(|(i, p)| BufferNode::new(i, circle_polygon(p.0, radius_m)))
            .collect();

        Ok(Self {
            radius_m,
            tree: RTree::bulk_load(nodes),
        })
    }

    /// Buffers around every station in the dataset
    pub fn from_dataset(dataset: &Dataset, radius_m: f64) -> Result<Self> {
        let points: Vec<Point> = dataset.stations().iter().map(|s| s.metric).collect();
        Self::new(&points, radius_m)
    }

    pub fn radius_m(&self) -> f64 {
        self.radius_m
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Whether `point` (metric) touches any buffer
    pub fn contains_any(&self, point: &Point) -> bool {
        self.tree
            .locate_in_envelope_intersecting(&point_envelope(*point))
            .any(|node| node.polygon.intersects(point))
    }

    /// Buffer polygons in longitude / latitude, in station order
    pub fn to_geographic(&self, projection: &impl Projection) -> Vec<Polygon> {
        let mut nodes: Vec<&BufferNode> = self.tree.iter().collect();
        nodes.sort_by_key(|n| n.station);
        nodes.iter().map(|n| projection.to_geographic(&n.polygon)).collect()
    }
}

/// One stop and whether it lies within a station buffer
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct StopProximity {
    pub sequence: u32,
    pub stop_code: Option<String>,
    pub description: Option<String>,
    /// Longitude / latitude
    pub location: Point,
    pub metric: Point,
    pub within_buffer: bool,
}

/// Proximity of one route's stops to the station buffers
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ProximitySummary {
    pub route: RouteKey,
    pub stops: Vec<StopProximity>,
    pub within_count: usize,
    pub total: usize,
    pub percentage: f64,
}

/// Flag each metric point that touches a buffer
pub fn classify_points(points_metric: &[Point], buffers: &StationBuffers) -> Vec<bool> {
    points_metric.iter().map(|p| buffers.contains_any(p)).collect()
}

/// Classify one route's stops and aggregate the counts
pub fn classify_stops(route: RouteKey, stops: &[BusStop], buffers: &StationBuffers) -> ProximitySummary {
    let stops: Vec<StopProximity> = stops
        .iter()
        .map(|stop| StopProximity {
            sequence: stop.record.sequence,
            stop_code: stop.record.stop_code.as_ref().map(|c| c.to_string()),
            description: stop.record.description.as_deref().map(str::to_owned),
            location: stop.record.location,
            metric: stop.metric,
            within_buffer: buffers.contains_any(&stop.metric),
        })
        .collect();

    let total = stops.len();
    let within_count = stops.iter().filter(|s| s.within_buffer).count();
    let percentage = if total > 0 {
        within_count as f64 / total as f64 * 100.0
    } else {
        0.0
    };

    ProximitySummary {
        route,
        stops,
        within_count,
        total,
        percentage,
    }
}

/// Stops of one route within `radius_m` of any station
pub fn route_proximity(dataset: &Dataset, key: &RouteKey, radius_m: f64) -> Result<ProximitySummary> {
    let route = dataset.route(key)?;
    let buffers = StationBuffers::from_dataset(dataset, radius_m)?;
    Ok(classify_stops(route.key.clone(), &route.stops, &buffers))
}

/// Stops of every route passing `filter` within `radius_m` of any station.
///
/// Routes that cannot form a path still have stops and are included.
pub fn network_proximity(dataset: &Dataset, radius_m: f64, filter: RouteFilter) -> Result<Vec<ProximitySummary>> {
    let buffers = StationBuffers::from_dataset(dataset, radius_m)?;

    let summaries: Vec<ProximitySummary> = dataset
        .routes()
        .iter()
        .filter(|r| r.matches(filter))
        .map(|r| classify_stops(r.key.clone(), &r.stops, &buffers))
        .collect();

    log::info!(
        "Classified stops of {} routes against {} station buffers of {} m",
        summaries.len(),
        buffers.len(),
        radius_m
    );

    Ok(summaries)
}
